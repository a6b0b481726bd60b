//! Function values: native, compiled and partial.
//!
//! A partial function wraps any callable with a sparse array of
//! pre-filled positional arguments. Binding a method to an instance is
//! partial application of argument zero, which is what lets user code
//! pull unbound methods off a type.

use std::sync::Arc;

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::types::code::Code;
use crate::types::{core, CoreTypes};
use crate::value::{NativeImpl, Payload, Value};

/// A host function with its advertised signature.
#[derive(Clone)]
pub struct NativeFunc {
    /// Bare name.
    pub name: &'static str,
    /// Signature string shown in diagnostics.
    pub sig: &'static str,
    /// The implementation.
    pub func: NativeImpl,
}

/// A function compiled from source: bytecode plus captured environment.
#[derive(Clone)]
pub struct CompiledFunc {
    /// Function name.
    pub name: String,
    /// Body.
    pub code: Arc<Code>,
    /// Parameter names, bound positionally.
    pub params: Vec<String>,
    /// Enclosing locals dictionaries, innermost first. Empty on the
    /// prototype stored in a constant pool; filled when the constant is
    /// loaded.
    pub closure: Vec<Value>,
    /// Module globals of the defining frame.
    pub globals: Option<Value>,
}

/// A callable with some positional arguments fixed in advance.
#[derive(Clone)]
pub struct PartialFunc {
    /// The wrapped callable.
    pub target: Value,
    /// `(position, value)` pairs, position-ascending.
    pub filled: Vec<(usize, Value)>,
}

/// Callable payload.
#[derive(Clone)]
pub enum Func {
    /// Wraps a host callable.
    Native(NativeFunc),
    /// Wraps a bytecode object and its closure.
    Compiled(CompiledFunc),
    /// Wraps another callable with pre-filled arguments.
    Partial(PartialFunc),
}

impl Func {
    /// Native payload constructor.
    pub fn native(name: &'static str, sig: &'static str, func: NativeImpl) -> Func {
        Func::Native(NativeFunc { name, sig, func })
    }

    /// Display name of the callable.
    pub fn name(&self) -> String {
        match self {
            Func::Native(n) => n.name.to_owned(),
            Func::Compiled(c) => c.name.clone(),
            Func::Partial(p) => p
                .target
                .as_func()
                .map(Func::name)
                .unwrap_or_else(|| "<partial>".into()),
        }
    }
}

impl std::fmt::Debug for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<func '{}'>", self.name())
    }
}

/// Bind `this` as argument zero of `method`.
pub fn bind_method(method: Value, this: Value) -> Value {
    Value::func(Func::Partial(PartialFunc {
        target: method,
        filled: vec![(0, this)],
    }))
}

/// Splice pre-filled arguments with call-site arguments.
pub fn splice(partial: &PartialFunc, args: &[Value]) -> Vec<Value> {
    let total = partial.filled.len() + args.len();
    let mut out: Vec<Option<Value>> = vec![None; total];
    for (pos, v) in &partial.filled {
        if *pos < total {
            out[*pos] = Some(v.clone());
        }
    }
    let mut supplied = args.iter();
    for slot in out.iter_mut() {
        if slot.is_none() {
            *slot = supplied.next().cloned();
        }
    }
    let mut spliced: Vec<Value> = out.into_iter().flatten().collect();
    // anything that did not fit a hole goes at the end
    spliced.extend(supplied.cloned());
    spliced
}

fn func_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Func(Func::Native(n))) => {
            Ok(Value::str(format!("<native function '{}'>", n.name)))
        }
        Some(Payload::Func(Func::Compiled(c))) => {
            Ok(Value::str(format!("<function '{}'>", c.name)))
        }
        Some(Payload::Func(Func::Partial(p))) => Ok(Value::str(format!(
            "<partial of '{}' ({} filled)>",
            p.target.as_func().map(Func::name).unwrap_or_default(),
            p.filled.len()
        ))),
        _ => Err(vm.throw(&core().type_error, "expected a function receiver")),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    for ty in [&c.cfunc, &c.func, &c.pfunc] {
        ty.define("__str__", "func.__str__(self)", func_str);
        ty.define("__repr__", "func.__repr__(self)", func_str);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(_vm: &mut Vm, _args: &[Value]) -> Result<Value, Thrown> {
        Ok(Value::none())
    }

    #[test]
    fn splice_places_bound_receiver_first() {
        let target = Value::native("probe", "probe()", probe);
        let bound = bind_method(target, Value::int(42));
        let Some(Func::Partial(p)) = bound.as_func().cloned() else {
            panic!("expected a partial");
        };
        let out = splice(&p, &[Value::int(1), Value::int(2)]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], Value::int(42));
        assert_eq!(out[1], Value::int(1));
        assert_eq!(out[2], Value::int(2));
    }

    #[test]
    fn splice_with_gap() {
        let target = Value::native("probe", "probe()", probe);
        let p = PartialFunc {
            target,
            filled: vec![(0, Value::str("a")), (2, Value::str("c"))],
        };
        let out = splice(&p, &[Value::str("b"), Value::str("d")]);
        let texts: Vec<&str> = out.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
    }
}
