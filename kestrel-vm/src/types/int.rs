//! Integers: machine 64-bit fast path with arbitrary-precision overflow.

use std::fmt;

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};

use crate::consts::MAX_INT_BASE;
use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::numeric;
use crate::ops;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

/// Tagged integer representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Int {
    /// Fits a machine signed 64-bit word.
    Small(i64),
    /// Arbitrary precision.
    Big(BigInt),
}

impl Int {
    /// Collapse to the small representation when the value fits.
    pub fn shrink(self) -> Int {
        match self {
            Int::Big(b) => match b.to_i64() {
                Some(v) => Int::Small(v),
                None => Int::Big(b),
            },
            small => small,
        }
    }

    /// Machine view, if the value fits 64 bits.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Int::Small(v) => Some(*v),
            Int::Big(b) => b.to_i64(),
        }
    }

    /// Nearest double.
    pub fn to_f64(&self) -> f64 {
        match self {
            Int::Small(v) => *v as f64,
            Int::Big(b) => b.to_f64().unwrap_or(f64::INFINITY),
        }
    }

    /// Widened view for mixed-representation arithmetic.
    pub fn to_big(&self) -> BigInt {
        match self {
            Int::Small(v) => BigInt::from(*v),
            Int::Big(b) => b.clone(),
        }
    }

    /// Sign of the value: -1, 0 or +1.
    pub fn sign(&self) -> i32 {
        match self {
            Int::Small(v) => (*v > 0) as i32 - (*v < 0) as i32,
            Int::Big(b) => match b.sign() {
                Sign::Minus => -1,
                Sign::NoSign => 0,
                Sign::Plus => 1,
            },
        }
    }

    /// Whether the value is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Int::Small(v) => *v == 0,
            Int::Big(b) => b.is_zero(),
        }
    }

    /// Magnitude is exactly one.
    pub fn is_unit(&self) -> bool {
        match self {
            Int::Small(v) => *v == 1 || *v == -1,
            Int::Big(b) => b.abs() == BigInt::from(1),
        }
    }

    /// Parse digits in `base` (2..=36). The 64-bit accumulator falls
    /// through to big parsing on overflow.
    pub fn from_str_radix(text: &str, base: u32) -> Option<Int> {
        let (neg, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if digits.is_empty() {
            return None;
        }

        let mut acc: i64 = 0;
        let mut overflowed = false;
        for c in digits.chars() {
            let d = c.to_digit(MAX_INT_BASE)?;
            if d >= base {
                return None;
            }
            if !overflowed {
                match acc
                    .checked_mul(base as i64)
                    .and_then(|v| v.checked_add(d as i64))
                {
                    Some(v) => acc = v,
                    None => overflowed = true,
                }
            }
        }

        if !overflowed {
            return Some(Int::Small(if neg { -acc } else { acc }));
        }
        BigInt::parse_bytes(text.as_bytes(), base).map(|b| Int::Big(b).shrink())
    }

    /// Render in `base` with lowercase digits.
    pub fn to_str_radix(&self, base: u32) -> String {
        match self {
            Int::Small(v) if base == 10 => v.to_string(),
            Int::Small(v) => BigInt::from(*v).to_str_radix(base),
            Int::Big(b) => b.to_str_radix(base),
        }
    }

    /// Hash: the value itself modulo the machine word, except zero which
    /// hashes to 1 (the table's reserved sentinel).
    pub fn hash64(&self) -> u64 {
        let low = match self {
            Int::Small(v) => *v as u64,
            Int::Big(b) => {
                let low = b.iter_u64_digits().next().unwrap_or(0);
                if b.sign() == Sign::Minus {
                    low.wrapping_neg()
                } else {
                    low
                }
            }
        };
        if low == 0 {
            1
        } else {
            low
        }
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Int::Small(v) => write!(f, "{v}"),
            Int::Big(b) => write!(f, "{b}"),
        }
    }
}

// ---- int type methods ----

fn check_base(vm: &Vm, base: i64) -> Result<u32, Thrown> {
    if (2..=MAX_INT_BASE as i64).contains(&base) {
        Ok(base as u32)
    } else {
        Err(vm.throw(
            &core().arg_error,
            format!("integer base must be in [2, {MAX_INT_BASE}], got {base}"),
        ))
    }
}

fn int_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let val = args.get(1).cloned().unwrap_or_else(Value::none);
    let base = match args.get(2) {
        None => None,
        Some(b) => Some(check_base(
            vm,
            b.as_i64()
                .ok_or_else(|| vm.throw(&core().arg_error, "base must be an integer"))?,
        )?),
    };

    match val.payload() {
        Payload::None => Ok(Value::int(0)),
        Payload::Bool(b) => Ok(Value::int(*b as i64)),
        Payload::Int(_) if base.is_none() => Ok(val.clone()),
        Payload::Float(f) if base.is_none() => Ok(Value::int(*f as i64)),
        Payload::Str(s) => {
            let base = base.unwrap_or(10);
            match Int::from_str_radix(&s.text, base) {
                Some(i) => Ok(Value::int_from(i)),
                None => Err(vm.throw(
                    &core().arg_error,
                    format!("invalid format for base {} integer: {}", base, &*s.text),
                )),
            }
        }
        _ => Err(vm.throw(
            &core().type_error,
            format!("cannot convert '{}' to int", val.type_name()),
        )),
    }
}

fn int_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Int(i)) => Ok(Value::str(i.to_str_radix(10))),
        Some(Payload::Bool(b)) => Ok(Value::str(if *b { "true" } else { "false" })),
        _ => Err(vm.throw(&core().type_error, "expected an 'int' receiver")),
    }
}

fn int_neg(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Neg, args)
}

fn int_pos(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Pos, args)
}

fn int_abs(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Abs, args)
}

fn int_sqig(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Sqig, args)
}

fn bool_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.get(1) {
        None => Ok(Value::bool_(false)),
        Some(v) => Ok(Value::bool_(ops::truthy(vm, v)?)),
    }
}

// bitwise hooks have no dedicated instructions; they dispatch through
// the slot table only

fn int_pair(vm: &Vm, args: &[Value]) -> Result<(Int, Int), Thrown> {
    let (l, r) = ops::operands(vm, args)?;
    let as_int = |v: &Value| match v.payload() {
        Payload::Int(i) => Some(i.clone()),
        Payload::Bool(b) => Some(Int::Small(*b as i64)),
        _ => None,
    };
    match (as_int(l), as_int(r)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(vm.throw(
            &core().op_error,
            format!(
                "bitwise operation is not defined between '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ),
        )),
    }
}

fn int_binor(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (a, b) = int_pair(vm, args)?;
    Ok(match (&a, &b) {
        (Int::Small(x), Int::Small(y)) => Value::int(x | y),
        _ => Value::big(a.to_big() | b.to_big()),
    })
}

fn int_binand(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (a, b) = int_pair(vm, args)?;
    Ok(match (&a, &b) {
        (Int::Small(x), Int::Small(y)) => Value::int(x & y),
        _ => Value::big(a.to_big() & b.to_big()),
    })
}

fn int_binxor(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (a, b) = int_pair(vm, args)?;
    Ok(match (&a, &b) {
        (Int::Small(x), Int::Small(y)) => Value::int(x ^ y),
        _ => Value::big(a.to_big() ^ b.to_big()),
    })
}

fn shift_amount(vm: &Vm, b: &Int) -> Result<usize, Thrown> {
    b.to_i64()
        .filter(|v| *v >= 0)
        .map(|v| v as usize)
        .ok_or_else(|| vm.throw(&core().arg_error, "shift amount must be a non-negative integer"))
}

fn int_lshift(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (a, b) = int_pair(vm, args)?;
    let sh = shift_amount(vm, &b)?;
    Ok(Value::big(a.to_big() << sh))
}

fn int_rshift(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (a, b) = int_pair(vm, args)?;
    let sh = shift_amount(vm, &b)?;
    Ok(Value::big(a.to_big() >> sh))
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.int;
    t.define("__new__", "int.__new__(val=none, base=none)", int_new);
    t.define("__str__", "int.__str__(self)", int_str);
    t.define("__repr__", "int.__repr__(self)", int_str);
    t.define("__neg__", "int.__neg__(self)", int_neg);
    t.define("__pos__", "int.__pos__(self)", int_pos);
    t.define("__abs__", "int.__abs__(self)", int_abs);
    t.define("__sqig__", "int.__sqig__(self)", int_sqig);
    t.define("__binor__", "int.__binor__(l, r)", int_binor);
    t.define("__binand__", "int.__binand__(l, r)", int_binand);
    t.define("__binxor__", "int.__binxor__(l, r)", int_binxor);
    t.define("__lshift__", "int.__lshift__(l, r)", int_lshift);
    t.define("__rshift__", "int.__rshift__(l, r)", int_rshift);

    // booleans are small integers with their own printing
    let b = &c.bool_;
    b.define("__new__", "bool.__new__(val=none)", bool_new);
    b.define("__str__", "bool.__str__(self)", int_str);
    b.define("__repr__", "bool.__repr__(self)", int_str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_base() {
        for &v in &[0i64, 1, -1, 255, -256, 4096, i64::MAX, i64::MIN + 1] {
            for base in 2..=36 {
                let text = Int::Small(v).to_str_radix(base);
                let parsed = Int::from_str_radix(&text, base).unwrap();
                assert_eq!(parsed.to_i64(), Some(v), "base {base}, value {v}");
            }
        }
    }

    #[test]
    fn overflowing_parse_promotes() {
        let text = "123456789012345678901234567890";
        let parsed = Int::from_str_radix(text, 10).unwrap();
        assert!(matches!(parsed, Int::Big(_)));
        assert_eq!(parsed.to_str_radix(10), text);
    }

    #[test]
    fn invalid_digits_rejected() {
        assert!(Int::from_str_radix("12a", 10).is_none());
        assert!(Int::from_str_radix("", 10).is_none());
        assert!(Int::from_str_radix("-", 10).is_none());
        assert!(Int::from_str_radix("ff", 16).is_some());
        assert!(Int::from_str_radix("fg", 16).is_none());
    }

    #[test]
    fn shrink_normalizes() {
        let big = Int::Big(BigInt::from(42));
        assert_eq!(big.shrink(), Int::Small(42));
        let really_big = Int::Big(BigInt::from(u128::MAX));
        assert!(matches!(really_big.shrink(), Int::Big(_)));
    }

    #[test]
    fn hash_is_value_with_zero_remapped() {
        assert_eq!(Int::Small(0).hash64(), 1);
        assert_eq!(Int::Small(7).hash64(), 7);
        assert_eq!(Int::Small(-1).hash64(), u64::MAX);
        assert_eq!(
            Int::Big(BigInt::from(7)).hash64(),
            Int::Small(7).hash64()
        );
        // congruent modulo 2^64
        let wrapped = Int::Big(BigInt::from(7u128) + (BigInt::from(1u8) << 64));
        assert_eq!(wrapped.hash64(), 7);
    }
}
