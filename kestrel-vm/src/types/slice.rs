//! Subscript slices and their resolution against a sequence length.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Slice, Value};

fn component(vm: &Vm, v: &Value, what: &str) -> Result<Option<i64>, Thrown> {
    if v.is_none() {
        return Ok(None);
    }
    v.as_i64().map(Some).ok_or_else(|| {
        vm.throw(
            &core().type_error,
            format!("slice {what} must be an integer or none"),
        )
    })
}

/// Resolve a slice against a sequence of `len` elements.
///
/// Returns `(first, last, delta)` such that walking `i = first; i != last;
/// i += delta` visits exactly the selected indices. Negative components
/// wrap modulo `len`; a zero step is rejected.
pub fn resolve(vm: &Vm, s: &Slice, len: i64) -> Result<(i64, i64, i64), Thrown> {
    let step = component(vm, &s.step, "step")?.unwrap_or(1);
    if step == 0 {
        return Err(vm.throw(&core().arg_error, "slices cannot have step == 0"));
    }
    if len <= 0 {
        return Ok((0, 0, 1));
    }

    let first = match component(vm, &s.start, "start")? {
        None => {
            if step > 0 {
                0
            } else {
                len - 1
            }
        }
        Some(v) => ((v % len) + len) % len,
    };
    let mut last = match component(vm, &s.stop, "stop")? {
        None => {
            if step > 0 {
                len
            } else {
                -1
            }
        }
        Some(v) => ((v % len) + len) % len,
    };

    let mut delta = step;
    if step >= len || step <= -len {
        // a stride past the whole sequence selects one element
        delta = 1;
        last = first + delta;
        return Ok((first, last, delta));
    }
    if (step > 0 && last < first) || (step < 0 && last > first) {
        return Ok((first, first, 1));
    }

    let diff = last - first;
    if diff % delta != 0 {
        last = first + delta * (diff / delta + 1);
    }
    Ok((first, last, delta))
}

fn slice_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let start = args.get(1).cloned().unwrap_or_else(Value::none);
    let stop = args.get(2).cloned().unwrap_or_else(Value::none);
    let step = args.get(3).cloned().unwrap_or_else(Value::none);
    // validate eagerly so a bad step fails at construction
    for (v, what) in [(&start, "start"), (&stop, "stop"), (&step, "step")] {
        component(vm, v, what)?;
    }
    if step.as_i64() == Some(0) {
        return Err(vm.throw(&core().arg_error, "slices cannot have step == 0"));
    }
    Ok(Value::slice(start, stop, step))
}

fn slice_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Slice(s)) => {
            let start = ops::repr_string(vm, &s.start)?;
            let stop = ops::repr_string(vm, &s.stop)?;
            let step = ops::repr_string(vm, &s.step)?;
            Ok(Value::str(format!("slice({start}, {stop}, {step})")))
        }
        _ => Err(vm.throw(&core().type_error, "expected a 'slice' receiver")),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.slice;
    t.define("__new__", "slice.__new__(start=none, stop=none, step=none)", slice_new);
    t.define("__str__", "slice.__str__(self)", slice_str);
    t.define("__repr__", "slice.__repr__(self)", slice_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    fn resolve_nums(
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
        len: i64,
    ) -> Result<(i64, i64, i64), Thrown> {
        let vm = Vm::new(Machine::new());
        let v = |o: Option<i64>| o.map(Value::int).unwrap_or_else(Value::none);
        let s = Slice {
            start: v(start),
            stop: v(stop),
            step: v(step),
        };
        resolve(&vm, &s, len)
    }

    fn indices(sl: (i64, i64, i64)) -> Vec<i64> {
        let (first, last, delta) = sl;
        let mut out = Vec::new();
        let mut i = first;
        while i != last {
            out.push(i);
            i += delta;
        }
        out
    }

    #[test]
    fn forward_slices() {
        assert_eq!(indices(resolve_nums(Some(2), Some(8), Some(2), 10).unwrap()), vec![2, 4, 6]);
        assert_eq!(indices(resolve_nums(None, None, None, 4).unwrap()), vec![0, 1, 2, 3]);
        assert_eq!(indices(resolve_nums(Some(1), Some(3), None, 10).unwrap()), vec![1, 2]);
    }

    #[test]
    fn backward_and_wrapped() {
        assert_eq!(
            indices(resolve_nums(None, None, Some(-1), 4).unwrap()),
            vec![3, 2, 1, 0]
        );
        // negative indices wrap modulo len
        assert_eq!(indices(resolve_nums(Some(-3), Some(-1), None, 5).unwrap()), vec![2, 3]);
    }

    #[test]
    fn empty_selections() {
        assert_eq!(indices(resolve_nums(Some(3), Some(1), Some(1), 5).unwrap()), vec![]);
        assert_eq!(indices(resolve_nums(None, None, None, 0).unwrap()), vec![]);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(resolve_nums(None, None, Some(0), 5).is_err());
    }
}
