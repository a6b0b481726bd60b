//! Strings and byte strings.
//!
//! Both are immutable with a content hash computed at construction.
//! String length is stored in bytes; character-oriented operations
//! (indexing, iteration) walk UTF-8 code points.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, iter::IterState, slice, CoreTypes};
use crate::value::{Payload, Value};

/// Byte-wise FNV-1a mix; never 0 so tables can reserve hash 0.
pub fn hash_bytes(data: impl AsRef<[u8]>) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in data.as_ref() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    if h == 0 {
        1
    } else {
        h
    }
}

/// Quote and escape for `repr`.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn expect_str<'v>(vm: &Vm, args: &'v [Value]) -> Result<&'v str, Thrown> {
    args.first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| vm.throw(&core().type_error, "expected a 'str' receiver"))
}

// ---- str methods ----

fn str_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let val = match args.get(1) {
        None => return Ok(Value::str("")),
        Some(v) => v,
    };
    if let Some(base) = args.get(2) {
        let base = base
            .as_i64()
            .filter(|b| (2..=crate::consts::MAX_INT_BASE as i64).contains(b))
            .ok_or_else(|| vm.throw(&core().arg_error, "base must be an integer in [2, 36]"))?;
        if let Payload::Int(i) = val.payload() {
            return Ok(Value::str(i.to_str_radix(base as u32)));
        }
        return Err(vm.throw(&core().arg_error, "str(val, base) expects an integer val"));
    }
    ops::str_of(vm, val)
}

fn str_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_str(vm, args)?;
    Ok(args[0].clone())
}

fn str_repr(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::str(quote(expect_str(vm, args)?)))
}

fn str_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::int(expect_str(vm, args)?.len() as i64))
}

fn str_getitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let text = expect_str(vm, args)?;
    let idx = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "str subscript takes an index"))?;

    if let Payload::Slice(s) = idx.payload() {
        let n = text.chars().count() as i64;
        let (first, last, delta) = slice::resolve(vm, s, n)?;
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::new();
        let mut i = first;
        while i != last {
            if let Some(&c) = chars.get(i as usize) {
                out.push(c);
            }
            i += delta;
        }
        return Ok(Value::str(out));
    }

    let n = text.chars().count() as i64;
    let mut i = idx
        .as_i64()
        .ok_or_else(|| vm.throw(&core().type_error, "str index must be an integer"))?;
    if i < 0 {
        i += n;
    }
    if i < 0 || i >= n {
        return Err(vm.throw(&core().key_error, format!("str index {i} out of range")));
    }
    let c = text.chars().nth(i as usize).expect("index checked");
    Ok(Value::char_str(c))
}

fn str_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_str(vm, args)?;
    Ok(Value::iter_state(
        core().str_iter.clone(),
        IterState::Str {
            target: args[0].clone(),
            byte_pos: 0,
        },
    ))
}

fn str_add(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    match (l.as_str(), r.as_str()) {
        (Some(a), Some(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::str(out))
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

fn str_mul(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    match (l.as_str(), r.as_i64()) {
        (Some(a), Some(n)) => Ok(Value::str(a.repeat(n.max(0) as usize))),
        _ => Err(vm.throw(
            &core().op_error,
            format!(
                "binary '*' is not defined between '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ),
        )),
    }
}

fn str_cmp(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    match (l.as_str(), r.as_str()) {
        (Some(a), Some(b)) => Ok(Value::int(match a.cmp(b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        })),
        _ => Err(vm.throw(
            &core().op_error,
            format!(
                "comparison is not defined between '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ),
        )),
    }
}

// ---- bytes methods ----

fn expect_bytes<'v>(vm: &Vm, args: &'v [Value]) -> Result<&'v [u8], Thrown> {
    args.first()
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| vm.throw(&core().type_error, "expected a 'bytes' receiver"))
}

fn bytes_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let val = match args.get(1) {
        None => return Ok(Value::bytes(Vec::new())),
        Some(v) => v,
    };
    match val.payload() {
        Payload::None => Ok(Value::bytes(Vec::new())),
        Payload::Bytes(b) => Ok(Value::bytes(b.data.to_vec())),
        Payload::Str(s) => Ok(Value::bytes(s.text.as_bytes().to_vec())),
        Payload::List(_) | Payload::Tuple(_) => {
            let items = ops::collect(vm, val)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let b = item
                    .as_i64()
                    .filter(|v| (0..=255).contains(v))
                    .ok_or_else(|| {
                        vm.throw(&core().arg_error, "bytes() items must be integers in [0, 255]")
                    })?;
                out.push(b as u8);
            }
            Ok(Value::bytes(out))
        }
        _ => Err(vm.throw(
            &core().type_error,
            format!("cannot convert '{}' to bytes", val.type_name()),
        )),
    }
}

fn bytes_repr(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let data = expect_bytes(vm, args)?;
    let mut out = String::from("b'");
    for &b in data {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('\'');
    Ok(Value::str(out))
}

fn bytes_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::int(expect_bytes(vm, args)?.len() as i64))
}

fn bytes_getitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let data = expect_bytes(vm, args)?;
    let n = data.len() as i64;
    let mut i = args
        .get(1)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| vm.throw(&core().type_error, "bytes index must be an integer"))?;
    if i < 0 {
        i += n;
    }
    if i < 0 || i >= n {
        return Err(vm.throw(&core().key_error, format!("bytes index {i} out of range")));
    }
    Ok(Value::bytes(vec![data[i as usize]]))
}

fn bytes_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_bytes(vm, args)?;
    Ok(Value::iter_state(
        core().bytes_iter.clone(),
        IterState::Seq {
            target: args[0].clone(),
            pos: 0,
        },
    ))
}

fn bytes_add(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    match (l.as_bytes(), r.as_bytes()) {
        (Some(a), Some(b)) => {
            let mut out = Vec::with_capacity(a.len() + b.len());
            out.extend_from_slice(a);
            out.extend_from_slice(b);
            Ok(Value::bytes(out))
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
    let t = &c.str_;
    t.define("__new__", "str.__new__(val=none, base=none)", str_new);
    t.define("__str__", "str.__str__(self)", str_str);
    t.define("__repr__", "str.__repr__(self)", str_repr);
    t.define("__len__", "str.__len__(self)", str_len);
    t.define("__getitem__", "str.__getitem__(self, idx)", str_getitem);
    t.define("__iter__", "str.__iter__(self)", str_iter);
    t.define("__add__", "str.__add__(l, r)", str_add);
    t.define("__mul__", "str.__mul__(l, r)", str_mul);
    t.define("__cmp__", "str.__cmp__(l, r)", str_cmp);

    let b = &c.bytes;
    b.define("__new__", "bytes.__new__(val=none)", bytes_new);
    b.define("__str__", "bytes.__str__(self)", bytes_repr);
    b.define("__repr__", "bytes.__repr__(self)", bytes_repr);
    b.define("__len__", "bytes.__len__(self)", bytes_len);
    b.define("__getitem__", "bytes.__getitem__(self, idx)", bytes_getitem);
    b.define("__iter__", "bytes.__iter__(self)", bytes_iter);
    b.define("__add__", "bytes.__add__(l, r)", bytes_add);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_only_on_content_and_is_nonzero() {
        assert_eq!(hash_bytes("abc"), hash_bytes("abc"));
        assert_ne!(hash_bytes("abc"), hash_bytes("abd"));
        assert_ne!(hash_bytes("abc"), 0);
        assert_ne!(hash_bytes(""), 0);
        assert_ne!(hash_bytes([0u8]), 0);
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("abc"), "'abc'");
        assert_eq!(quote("a'b"), r"'a\'b'");
        assert_eq!(quote("a\nb"), r"'a\nb'");
    }
}
