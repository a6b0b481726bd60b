//! The builtin functions and the builtin name table scripts resolve
//! against after locals, closures and globals.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::loader;
use crate::object::issub;
use crate::ops;
use crate::types::{core, dict::Table};
use crate::value::{Payload, Value};

fn print(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&ops::str_string(vm, arg)?);
    }
    line.push('\n');

    let stdout = vm.machine.stdout.clone();
    let stream = stdout
        .as_stream()
        .ok_or_else(|| vm.throw(&core().internal_error, "stdout is not a stream"))?;
    stream
        .lock()
        .write(line.as_bytes())
        .map_err(|e| vm.throw(&core().io_error, e.to_string()))?;
    Ok(Value::none())
}

fn len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "len(obj) takes one argument"))?;
    Ok(Value::int(ops::len_of(vm, v)?))
}

fn repr(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "repr(obj) takes one argument"))?;
    ops::repr_of(vm, v)
}

fn hash(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "hash(obj) takes one argument"))?;
    Ok(Value::int(ops::hash_of(vm, v)? as i64))
}

fn iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "iter(obj) takes one argument"))?;
    ops::iter_new(vm, v)
}

fn next(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "next(it) takes one argument"))?;
    ops::iter_next(vm, v)
}

fn abs(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "abs(x) takes one argument"))?;
    ops::unary(vm, ops::UnOp::Abs, v)
}

fn sleep(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let seconds = match args.first().map(Value::payload) {
        Some(Payload::Int(i)) => i.to_f64(),
        Some(Payload::Float(f)) => *f,
        _ => {
            return Err(vm.throw(
                &core().arg_error,
                "sleep(seconds) takes a number of seconds",
            ))
        }
    };
    vm.machine.gil.sleep(seconds);
    Ok(Value::none())
}

fn import(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let name = args
        .first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| vm.throw(&core().arg_error, "__import__(name) takes a module name"))?
        .to_owned();
    loader::import(vm, &name)
}

fn throw(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .cloned()
        .unwrap_or_else(|| crate::error::new_error(&core().error, ""));
    Err(vm.throw_value(v))
}

/// Loop-exit filter for the `for` lowering: true for the
/// end-of-iteration sentinel, re-raise anything else.
fn iterdone(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let v = args
        .first()
        .cloned()
        .ok_or_else(|| vm.throw(&core().internal_error, "__iterdone__ takes the caught value"))?;
    if issub(v.ty(), &core().out_of_iter_error) {
        Ok(Value::bool_(true))
    } else {
        Err(vm.throw_value(v))
    }
}

/// Build the builtins dictionary.
pub fn table() -> Value {
    let c = core();
    let mut t = Table::new();

    let mut func = |name: &'static str, sig: &'static str, f: crate::value::NativeImpl| {
        t.insert_str(name, Value::native(name, sig, f));
    };
    func("print", "print(*args)", print);
    func("len", "len(obj)", len);
    func("repr", "repr(obj)", repr);
    func("hash", "hash(obj)", hash);
    func("iter", "iter(obj)", iter);
    func("next", "next(it)", next);
    func("abs", "abs(x)", abs);
    func("sleep", "sleep(seconds)", sleep);
    func("__import__", "__import__(name)", import);
    func("__throw__", "__throw__(obj)", throw);
    func("__iterdone__", "__iterdone__(exc)", iterdone);

    let mut ty = |name: &str, ty: &crate::object::Type| {
        t.insert_str(name, Value::type_value(ty.clone()));
    };
    ty("object", &c.object);
    ty("type", &c.type_);
    ty("bool", &c.bool_);
    ty("int", &c.int);
    ty("float", &c.float);
    ty("complex", &c.complex);
    ty("str", &c.str_);
    ty("bytes", &c.bytes);
    ty("tuple", &c.tuple);
    ty("list", &c.list);
    ty("dict", &c.dict);
    ty("set", &c.set);
    ty("slice", &c.slice);
    ty("range", &c.range);
    ty("Enum", &c.enum_);
    ty("thread", &c.thread);
    ty("ios", &c.stream);

    for kind in c.error_kinds() {
        let name = kind.name();
        t.insert_str(&name, Value::type_value(kind));
    }

    Value::dict_from(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_functions_types_and_error_kinds() {
        let b = table();
        let t = b.as_dict().unwrap().read();
        for name in [
            "print", "len", "type", "repr", "hash", "iter", "next", "abs", "sleep",
            "__import__", "__throw__", "__iterdone__", "int", "str", "list", "dict", "range",
            "Enum", "thread", "ios", "Error", "KeyError", "OutOfIterError",
        ] {
            assert!(t.get_str(name).is_some(), "missing builtin {name}");
        }
    }
}
