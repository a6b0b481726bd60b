//! Mutable growable sequences.
//!
//! Appends reserve `1.25·n + 8` the way every growing buffer here does.
//! Iterators keep a cursor into the live list, so mutation during
//! iteration is allowed; walking past the current length ends the
//! iteration.

use itertools::Itertools;

use crate::consts::grown_capacity;
use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, iter::IterState, slice, CoreTypes};
use crate::value::{Payload, Value};

fn expect_list<'v>(
    vm: &Vm,
    args: &'v [Value],
) -> Result<&'v parking_lot::RwLock<Vec<Value>>, Thrown> {
    args.first()
        .and_then(|v| v.as_list())
        .ok_or_else(|| vm.throw(&core().type_error, "expected a 'list' receiver"))
}

/// Append with the engine's amortized growth pattern.
pub fn push(list: &parking_lot::RwLock<Vec<Value>>, v: Value) {
    let mut elems = list.write();
    if elems.len() == elems.capacity() {
        let len = elems.len();
        let want = grown_capacity(len);
        elems.reserve_exact(want - len);
    }
    elems.push(v);
}

fn list_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.get(1) {
        None => Ok(Value::list(Vec::new())),
        Some(v) if v.is_none() => Ok(Value::list(Vec::new())),
        Some(v) => Ok(Value::list(ops::collect(vm, v)?)),
    }
}

fn list_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let elems: Vec<Value> = expect_list(vm, args)?.read().clone();
    let shown: Vec<String> = elems
        .iter()
        .map(|e| ops::repr_string(vm, e))
        .collect::<Result<_, _>>()?;
    Ok(Value::str(format!("[{}]", shown.iter().join(", "))))
}

fn list_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::int(expect_list(vm, args)?.read().len() as i64))
}

fn list_getitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let idx = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "list subscript takes an index"))?
        .clone();

    if let Payload::Slice(s) = idx.payload() {
        let elems: Vec<Value> = expect_list(vm, args)?.read().clone();
        let (first, last, delta) = slice::resolve(vm, s, elems.len() as i64)?;
        let mut out = Vec::new();
        let mut i = first;
        while i != last {
            if let Some(e) = elems.get(i as usize) {
                out.push(e.clone());
            }
            i += delta;
        }
        return Ok(Value::list(out));
    }

    let list = expect_list(vm, args)?.read();
    let n = list.len() as i64;
    let mut i = idx
        .as_i64()
        .ok_or_else(|| vm.throw(&core().type_error, "list index must be an integer"))?;
    if i < 0 {
        i += n;
    }
    if i < 0 || i >= n {
        return Err(vm.throw(&core().key_error, format!("list index {i} out of range")));
    }
    Ok(list[i as usize].clone())
}

fn list_setitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    if args.len() != 3 {
        return Err(vm.throw(&core().arg_error, "list subscript assignment takes one index"));
    }
    let (idx, val) = (&args[1], &args[2]);
    let list = expect_list(vm, args)?;
    let n = list.read().len() as i64;
    let mut i = idx
        .as_i64()
        .ok_or_else(|| vm.throw(&core().type_error, "list index must be an integer"))?;
    if i < 0 {
        i += n;
    }
    if i < 0 || i >= n {
        return Err(vm.throw(&core().key_error, format!("list index {i} out of range")));
    }
    list.write()[i as usize] = val.clone();
    Ok(Value::none())
}

fn list_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_list(vm, args)?;
    Ok(Value::iter_state(
        core().list_iter.clone(),
        IterState::Seq {
            target: args[0].clone(),
            pos: 0,
        },
    ))
}

fn list_add(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    match (l.as_list(), r.as_list()) {
        (Some(a), Some(b)) => {
            let mut out = a.read().clone();
            out.extend(b.read().iter().cloned());
            Ok(Value::list(out))
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

fn list_push(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let item = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "list.push(item) takes one argument"))?;
    push(expect_list(vm, args)?, item.clone());
    Ok(Value::none())
}

fn list_pop(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let popped = expect_list(vm, args)?.write().pop();
    popped.ok_or_else(|| vm.throw(&core().size_error, "pop from an empty list"))
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.list;
    t.define("__new__", "list.__new__(objs=none)", list_new);
    t.define("__str__", "list.__str__(self)", list_str);
    t.define("__repr__", "list.__repr__(self)", list_str);
    t.define("__len__", "list.__len__(self)", list_len);
    t.define("__getitem__", "list.__getitem__(self, idx)", list_getitem);
    t.define("__setitem__", "list.__setitem__(self, idx, val)", list_setitem);
    t.define("__iter__", "list.__iter__(self)", list_iter);
    t.define("__add__", "list.__add__(l, r)", list_add);
    t.define("push", "list.push(self, item)", list_push);
    t.define("pop", "list.pop(self)", list_pop);
}
