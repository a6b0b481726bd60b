//! The string builder: an owned, amortized-growth byte buffer with a
//! `printf`-flavored formatter used throughout the engine.
//!
//! Specifiers: `%i` / `%l` (integers), `%p` (pointer), `%s` (plain
//! string), `%O` (simplified object form), `%T` (type name), `%S`
//! (`str(obj)`), `%R` (`repr(obj)`), `%%`. Field flags: `-` left align,
//! `+` always sign, space for positive values, `0` zero pad; a `*`
//! consumes a width argument.

use crate::consts::grown_capacity;
use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::value::Value;

/// Growable byte buffer.
#[derive(Debug, Default)]
pub struct StrBuf {
    data: Vec<u8>,
}

impl StrBuf {
    /// Empty buffer.
    pub fn new() -> StrBuf {
        StrBuf::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append raw bytes, growing with the engine's amortization.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let want = grown_capacity(needed);
            self.data.reserve_exact(want - self.data.len());
        }
        self.data.extend_from_slice(bytes);
    }

    /// Append UTF-8 text.
    pub fn push_str(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    /// The accumulated text (lossy on invalid UTF-8 from raw bytes).
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// One argument consumed by a format specifier.
#[derive(Debug, Clone)]
pub enum FmtArg<'a> {
    /// `%i` / `%l`.
    Int(i64),
    /// `%p`.
    Ptr(usize),
    /// `%s`.
    Str(&'a str),
    /// `%O`, `%T`, `%S`, `%R`.
    Obj(&'a Value),
    /// Consumed by a `*` width in the field.
    Width(i64),
}

#[derive(Debug, Default, Clone, Copy)]
struct Field {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    width: usize,
}

const DIGITS: &[u8] = b"0123456789abcdef";

fn push_int(buf: &mut StrBuf, field: Field, mut val: i64, base: u64) {
    let neg = val < 0;
    let mut digits = [0u8; 64];
    let mut n = 0;
    loop {
        let d = (val % base as i64).unsigned_abs() as usize;
        digits[n] = DIGITS[d];
        n += 1;
        val /= base as i64;
        if val == 0 {
            break;
        }
    }

    let mut body = Vec::with_capacity(n + 1);
    if neg {
        body.push(b'-');
    } else if field.plus {
        body.push(b'+');
    } else if field.space {
        body.push(b' ');
    }
    for i in (0..n).rev() {
        body.push(digits[i]);
    }

    if body.len() >= field.width {
        buf.push_bytes(&body);
        return;
    }
    let pad = field.width - body.len();
    if field.left {
        buf.push_bytes(&body);
        buf.push_bytes(&vec![b' '; pad]);
    } else if field.zero {
        // sign stays ahead of the zero padding
        let sign_len = usize::from(!body.is_empty() && !body[0].is_ascii_digit());
        buf.push_bytes(&body[..sign_len]);
        buf.push_bytes(&vec![b'0'; pad]);
        buf.push_bytes(&body[sign_len..]);
    } else {
        buf.push_bytes(&vec![b' '; pad]);
        buf.push_bytes(&body);
    }
}

/// Append `fmt` with `args` substituted into `buf`.
pub fn format_into(
    vm: &mut Vm,
    buf: &mut StrBuf,
    fmt: &str,
    args: &[FmtArg<'_>],
) -> Result<(), Thrown> {
    let mut next_arg = 0usize;
    let bytes = fmt.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i] != b'%' {
            i += 1;
        }
        buf.push_bytes(&bytes[start..i]);
        if i >= bytes.len() {
            break;
        }
        i += 1; // skip '%'
        if bytes.get(i) == Some(&b'%') {
            buf.push_bytes(b"%");
            i += 1;
            continue;
        }

        // parse the field up to the specifier letter
        let mut field = Field::default();
        let mut starred = false;
        while let Some(&c) = bytes.get(i) {
            match c {
                b'-' => field.left = true,
                b'+' => field.plus = true,
                b' ' => field.space = true,
                b'0' => field.zero = true,
                b'*' => starred = true,
                c if c.is_ascii_alphabetic() => break,
                _ => {}
            }
            i += 1;
        }
        if starred {
            if let Some(FmtArg::Width(w)) = args.get(next_arg).cloned() {
                field.width = w.max(0) as usize;
            }
            next_arg += 1;
        }

        let spec = *bytes.get(i).ok_or_else(|| {
            vm.throw(
                &crate::types::core().internal_error,
                "dangling '%' in format string",
            )
        })?;
        i += 1;

        let arg = args.get(next_arg).cloned();
        next_arg += 1;
        match (spec, arg) {
            (b'i', Some(FmtArg::Int(v))) | (b'l', Some(FmtArg::Int(v))) => {
                push_int(buf, field, v, 10);
            }
            (b'p', Some(FmtArg::Ptr(v))) => {
                buf.push_bytes(b"0x");
                push_int(buf, field, v as i64, 16);
            }
            (b's', Some(FmtArg::Str(s))) => {
                if field.width > 0 && field.width < s.len() {
                    buf.push_bytes(&s.as_bytes()[..field.width]);
                } else {
                    buf.push_str(s);
                }
            }
            (b'O', Some(FmtArg::Obj(v))) => {
                buf.push_str(&format!("<'{}' obj @ {:#x}>", v.type_name(), v.addr()));
            }
            (b'T', Some(FmtArg::Obj(v))) => {
                buf.push_str(&v.type_name());
            }
            (b'S', Some(FmtArg::Obj(v))) => {
                let v = v.clone();
                buf.push_str(&ops::str_string(vm, &v)?);
            }
            (b'R', Some(FmtArg::Obj(v))) => {
                let v = v.clone();
                buf.push_str(&ops::repr_string(vm, &v)?);
            }
            (spec, _) => {
                return Err(vm.throw(
                    &crate::types::core().internal_error,
                    format!("unknown format specifier '%{}'", spec as char),
                ));
            }
        }
    }
    Ok(())
}

/// Format into a fresh string.
pub fn format(vm: &mut Vm, fmt: &str, args: &[FmtArg<'_>]) -> Result<String, Thrown> {
    let mut buf = StrBuf::new();
    format_into(vm, &mut buf, fmt, args)?;
    Ok(buf.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    fn fmt(text: &str, args: &[FmtArg<'_>]) -> String {
        let mut vm = Vm::new(Machine::new());
        format(&mut vm, text, args).unwrap()
    }

    #[test]
    fn integers_and_signs() {
        assert_eq!(fmt("%i", &[FmtArg::Int(42)]), "42");
        assert_eq!(fmt("%i", &[FmtArg::Int(-42)]), "-42");
        assert_eq!(fmt("%+i", &[FmtArg::Int(42)]), "+42");
        assert_eq!(fmt("% i", &[FmtArg::Int(42)]), " 42");
        assert_eq!(fmt("%l", &[FmtArg::Int(i64::MIN + 1)]), "-9223372036854775807");
    }

    #[test]
    fn widths() {
        assert_eq!(fmt("%0*i", &[FmtArg::Width(5), FmtArg::Int(42)]), "00042");
        assert_eq!(fmt("%0*i", &[FmtArg::Width(5), FmtArg::Int(-42)]), "-0042");
        assert_eq!(fmt("%-*i|", &[FmtArg::Width(4), FmtArg::Int(7)]), "7   |");
        assert_eq!(fmt("%*i", &[FmtArg::Width(4), FmtArg::Int(7)]), "   7");
    }

    #[test]
    fn strings_pointers_percent() {
        assert_eq!(fmt("a%sb", &[FmtArg::Str("--")]), "a--b");
        assert_eq!(fmt("%%", &[]), "%");
        assert!(fmt("%p", &[FmtArg::Ptr(0x10)]).starts_with("0x"));
    }

    #[test]
    fn object_specifiers() {
        let v = Value::int(5);
        assert_eq!(fmt("%T", &[FmtArg::Obj(&v)]), "int");
        assert_eq!(fmt("%S", &[FmtArg::Obj(&v)]), "5");
        let s = Value::str("hi");
        assert_eq!(fmt("%S", &[FmtArg::Obj(&s)]), "hi");
        assert_eq!(fmt("%R", &[FmtArg::Obj(&s)]), "'hi'");
    }

    #[test]
    fn buffer_grows_amortized() {
        let mut b = StrBuf::new();
        for _ in 0..100 {
            b.push_str("0123456789");
        }
        assert_eq!(b.len(), 1000);
        assert_eq!(&b.to_string_lossy()[..10], "0123456789");
    }
}
