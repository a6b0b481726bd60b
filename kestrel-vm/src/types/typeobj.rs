//! The `object` root and the `type` type.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::object::{issub, same_type};
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

fn object_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let this = args
        .first()
        .ok_or_else(|| vm.throw(&core().type_error, "expected a receiver"))?;
    Ok(Value::str(format!(
        "<'{}' obj @ {:#x}>",
        this.type_name(),
        this.addr()
    )))
}

fn none_str(_vm: &mut Vm, _args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::str("none"))
}

fn type_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Type(t)) => Ok(Value::str(t.name())),
        _ => Err(vm.throw(&core().type_error, "expected a 'type' receiver")),
    }
}

// type(obj) is the type-of inspection, not a construction
fn type_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let obj = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "type(obj) takes one argument"))?;
    Ok(Value::type_value(obj.ty().clone()))
}

fn type_cmp_pair<'v>(vm: &Vm, args: &'v [Value]) -> Result<(&'v crate::object::Type, &'v crate::object::Type), Thrown> {
    match (
        args.first().and_then(|v| v.as_type()),
        args.get(1).and_then(|v| v.as_type()),
    ) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(vm.throw(&core().op_error, "type comparison takes two types")),
    }
}

// parenting order: a type is "less" than its ancestors
fn type_lt(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = type_cmp_pair(vm, args)?;
    Ok(Value::bool_(!same_type(l, r) && issub(l, r)))
}

fn type_le(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = type_cmp_pair(vm, args)?;
    Ok(Value::bool_(issub(l, r)))
}

fn type_gt(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = type_cmp_pair(vm, args)?;
    Ok(Value::bool_(!same_type(l, r) && issub(r, l)))
}

fn type_ge(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = type_cmp_pair(vm, args)?;
    Ok(Value::bool_(issub(r, l)))
}

fn type_eq(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = type_cmp_pair(vm, args)?;
    Ok(Value::bool_(same_type(l, r)))
}

fn type_ne(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = type_cmp_pair(vm, args)?;
    Ok(Value::bool_(!same_type(l, r)))
}

pub(crate) fn init(c: &CoreTypes) {
    let o = &c.object;
    o.define("__str__", "object.__str__(self)", object_str);
    o.define("__repr__", "object.__repr__(self)", object_str);

    let n = &c.none;
    n.define("__str__", "none_type.__str__(self)", none_str);
    n.define("__repr__", "none_type.__repr__(self)", none_str);

    let t = &c.type_;
    t.define("__new__", "type.__new__(obj)", type_new);
    t.define("__str__", "type.__str__(self)", type_str);
    t.define("__repr__", "type.__repr__(self)", type_str);
    t.define("__lt__", "type.__lt__(l, r)", type_lt);
    t.define("__le__", "type.__le__(l, r)", type_le);
    t.define("__gt__", "type.__gt__(l, r)", type_gt);
    t.define("__ge__", "type.__ge__(l, r)", type_ge);
    t.define("__eq__", "type.__eq__(l, r)", type_eq);
    t.define("__ne__", "type.__ne__(l, r)", type_ne);
}
