//! Lazy integer ranges.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, iter::IterState, CoreTypes};
use crate::value::{Payload, Value};

fn int_arg(vm: &Vm, v: &Value, what: &str) -> Result<Value, Thrown> {
    match v.payload() {
        Payload::Int(_) => Ok(v.clone()),
        Payload::Bool(b) => Ok(Value::int(*b as i64)),
        _ => Err(vm.throw(
            &core().type_error,
            format!("range {what} must be an integer, not '{}'", v.type_name()),
        )),
    }
}

fn range_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (start, stop, step) = match args.len() {
        2 => (
            Value::int(0),
            int_arg(vm, &args[1], "stop")?,
            Value::int(1),
        ),
        3 => (
            int_arg(vm, &args[1], "start")?,
            int_arg(vm, &args[2], "stop")?,
            Value::int(1),
        ),
        4 => (
            int_arg(vm, &args[1], "start")?,
            int_arg(vm, &args[2], "stop")?,
            int_arg(vm, &args[3], "step")?,
        ),
        _ => {
            return Err(vm.throw(
                &core().arg_error,
                "range() takes 1 to 3 integer arguments",
            ))
        }
    };
    if step.as_i64() == Some(0) {
        return Err(vm.throw(&core().arg_error, "range step must be non-zero"));
    }
    Ok(Value::range(start, stop, step))
}

fn range_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Range(r)) => {
            let start = ops::repr_string(vm, &r.start)?;
            let stop = ops::repr_string(vm, &r.stop)?;
            if r.step.as_i64() == Some(1) {
                Ok(Value::str(format!("range({start}, {stop})")))
            } else {
                let step = ops::repr_string(vm, &r.step)?;
                Ok(Value::str(format!("range({start}, {stop}, {step})")))
            }
        }
        _ => Err(vm.throw(&core().type_error, "expected a 'range' receiver")),
    }
}

fn range_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Range(r)) => Ok(Value::iter_state(
            core().range_iter.clone(),
            IterState::Range {
                cur: r.start.clone(),
                stop: r.stop.clone(),
                step: r.step.clone(),
            },
        )),
        _ => Err(vm.throw(&core().type_error, "expected a 'range' receiver")),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.range;
    t.define("__new__", "range.__new__(start, stop=none, step=none)", range_new);
    t.define("__str__", "range.__str__(self)", range_str);
    t.define("__repr__", "range.__repr__(self)", range_str);
    t.define("__iter__", "range.__iter__(self)", range_iter);
}
