//! Iterator objects shared by the builtin containers.
//!
//! All iterator types carry the same payload: a cursor over their
//! target. Exhaustion is signalled with `OutOfIterError`, the sentinel
//! kind the `for` lowering catches to end a loop.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::numeric;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

/// Cursor state of an in-progress iteration.
#[derive(Debug)]
pub enum IterState {
    /// Positional cursor over a list, tuple or byte string.
    Seq {
        /// The sequence being walked.
        target: Value,
        /// Next index to produce.
        pos: usize,
    },
    /// Byte cursor over a string's UTF-8, yielding code points.
    Str {
        /// The string being walked.
        target: Value,
        /// Byte offset of the next code point.
        byte_pos: usize,
    },
    /// Entry-array cursor over a dict or set, yielding keys.
    Entries {
        /// The table being walked.
        target: Value,
        /// Next entry index to inspect.
        pos: usize,
    },
    /// Arithmetic cursor of a range.
    Range {
        /// Next value to produce.
        cur: Value,
        /// Exclusive bound.
        stop: Value,
        /// Stride (non-zero).
        step: Value,
    },
}

fn out_of_iter(vm: &Vm) -> Thrown {
    vm.throw(&core().out_of_iter_error, "")
}

/// Produce the next element of `iter`, or `OutOfIterError`.
pub fn advance(vm: &mut Vm, iter: &Value) -> Result<Value, Thrown> {
    let state = match iter.payload() {
        Payload::Iter(state) => state,
        _ => {
            return Err(vm.throw(
                &core().type_error,
                format!("'{}' is not an iterator", iter.type_name()),
            ))
        }
    };
    let mut state = state.lock();
    match &mut *state {
        IterState::Seq { target, pos } => {
            if let Some(list) = target.as_list() {
                let list = list.read();
                if *pos >= list.len() {
                    return Err(out_of_iter(vm));
                }
                let item = list[*pos].clone();
                *pos += 1;
                return Ok(item);
            }
            if let Some(elems) = target.as_tuple() {
                if *pos >= elems.len() {
                    return Err(out_of_iter(vm));
                }
                let item = elems[*pos].clone();
                *pos += 1;
                return Ok(item);
            }
            if let Some(data) = target.as_bytes() {
                if *pos >= data.len() {
                    return Err(out_of_iter(vm));
                }
                let item = Value::bytes(vec![data[*pos]]);
                *pos += 1;
                return Ok(item);
            }
            Err(out_of_iter(vm))
        }
        IterState::Str { target, byte_pos } => {
            let text = target.as_str().unwrap_or("");
            match text[*byte_pos..].chars().next() {
                None => Err(out_of_iter(vm)),
                Some(c) => {
                    *byte_pos += c.len_utf8();
                    Ok(Value::char_str(c))
                }
            }
        }
        IterState::Entries { target, pos } => {
            let table = target
                .as_dict()
                .or_else(|| target.as_set())
                .ok_or_else(|| out_of_iter(vm))?;
            let table = table.read();
            while *pos < table.entries_len() {
                let i = *pos;
                *pos += 1;
                if let Some((key, _)) = table.entry_pair(i) {
                    return Ok(key);
                }
            }
            Err(out_of_iter(vm))
        }
        IterState::Range { cur, stop, step } => {
            let up = step.as_i64().map(|s| s > 0).unwrap_or(true);
            let done = match numeric::cmp_numbers(cur.payload(), stop.payload()) {
                Some(std::cmp::Ordering::Equal) => true,
                Some(std::cmp::Ordering::Greater) => up,
                Some(std::cmp::Ordering::Less) => !up,
                None => true,
            };
            if done {
                return Err(out_of_iter(vm));
            }
            let item = cur.clone();
            *cur = numeric::arith(vm, numeric::ArithOp::Add, cur, step)?;
            Ok(item)
        }
    }
}

fn iter_next(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let this = args
        .first()
        .cloned()
        .ok_or_else(|| vm.throw(&core().type_error, "expected an iterator receiver"))?;
    advance(vm, &this)
}

fn iter_self(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    args.first()
        .cloned()
        .ok_or_else(|| vm.throw(&core().type_error, "expected an iterator receiver"))
}

pub(crate) fn init(c: &CoreTypes) {
    for ty in [
        &c.list_iter,
        &c.tuple_iter,
        &c.str_iter,
        &c.bytes_iter,
        &c.dict_iter,
        &c.set_iter,
        &c.range_iter,
    ] {
        ty.define("__next__", "iter.__next__(self)", iter_next);
        ty.define("__iter__", "iter.__iter__(self)", iter_self);
    }
}
