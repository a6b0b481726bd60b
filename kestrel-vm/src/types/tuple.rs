//! Immutable fixed-length sequences.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, iter::IterState, slice, CoreTypes};
use crate::value::{Payload, Value};

fn expect_tuple<'v>(vm: &Vm, args: &'v [Value]) -> Result<&'v [Value], Thrown> {
    args.first()
        .and_then(|v| v.as_tuple())
        .ok_or_else(|| vm.throw(&core().type_error, "expected a 'tuple' receiver"))
}

fn tuple_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.get(1) {
        None => Ok(Value::tuple(Vec::new())),
        Some(v) if v.is_none() => Ok(Value::tuple(Vec::new())),
        Some(v) => Ok(Value::tuple(ops::collect(vm, v)?)),
    }
}

fn tuple_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let elems: Vec<Value> = expect_tuple(vm, args)?.to_vec();
    let mut out = String::from("(");
    for (i, e) in elems.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&ops::repr_string(vm, e)?);
    }
    if elems.len() == 1 {
        out.push(',');
    }
    out.push(')');
    Ok(Value::str(out))
}

fn tuple_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::int(expect_tuple(vm, args)?.len() as i64))
}

fn tuple_getitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let idx = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "tuple subscript takes an index"))?
        .clone();

    if let Payload::Slice(s) = idx.payload() {
        let elems = expect_tuple(vm, args)?;
        let (first, last, delta) = slice::resolve(vm, s, elems.len() as i64)?;
        let mut out = Vec::new();
        let mut i = first;
        while i != last {
            if let Some(e) = elems.get(i as usize) {
                out.push(e.clone());
            }
            i += delta;
        }
        return Ok(Value::tuple(out));
    }

    let elems = expect_tuple(vm, args)?;
    let n = elems.len() as i64;
    let mut i = idx
        .as_i64()
        .ok_or_else(|| vm.throw(&core().type_error, "tuple index must be an integer"))?;
    if i < 0 {
        i += n;
    }
    if i < 0 || i >= n {
        return Err(vm.throw(&core().key_error, format!("tuple index {i} out of range")));
    }
    Ok(elems[i as usize].clone())
}

fn tuple_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_tuple(vm, args)?;
    Ok(Value::iter_state(
        core().tuple_iter.clone(),
        IterState::Seq {
            target: args[0].clone(),
            pos: 0,
        },
    ))
}

fn tuple_add(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    match (l.as_tuple(), r.as_tuple()) {
        (Some(a), Some(b)) => {
            let mut out = Vec::with_capacity(a.len() + b.len());
            out.extend_from_slice(a);
            out.extend_from_slice(b);
            Ok(Value::tuple(out))
        }
        _ => Err(vm.throw(
            &core().op_error,
            format!(
                "binary '+' is not defined between '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ),
        )),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.tuple;
    t.define("__new__", "tuple.__new__(objs=none)", tuple_new);
    t.define("__str__", "tuple.__str__(self)", tuple_str);
    t.define("__repr__", "tuple.__repr__(self)", tuple_str);
    t.define("__len__", "tuple.__len__(self)", tuple_len);
    t.define("__getitem__", "tuple.__getitem__(self, idx)", tuple_getitem);
    t.define("__iter__", "tuple.__iter__(self)", tuple_iter);
    t.define("__add__", "tuple.__add__(l, r)", tuple_add);
}
