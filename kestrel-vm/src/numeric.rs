//! The numeric tower: mixed-mode arithmetic, comparison and hashing.
//!
//! Binary arithmetic between two numeric kinds promotes to the narrower
//! enclosing domain, integer ⊂ float ⊂ complex. Small-integer arithmetic
//! is checked 64-bit; overflow promotes both operands to the big
//! representation and produces the exact result. Modulus carries the
//! divisor's sign; integer power is by repeated squaring. Hashes agree
//! across kinds whenever the mathematical values agree.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::FromPrimitive;

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::types::core;
use crate::types::int::Int;
use crate::value::{Payload, Value};

/// Arithmetic operator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Unary numeric operator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Pos,
    Neg,
    Abs,
    Sqig,
}

enum Num {
    Int(Int),
    Float(f64),
    Complex { re: f64, im: f64 },
}

fn classify(p: &Payload) -> Option<Num> {
    match p {
        Payload::Bool(b) => Some(Num::Int(Int::Small(*b as i64))),
        Payload::Int(i) => Some(Num::Int(i.clone())),
        Payload::Float(f) => Some(Num::Float(*f)),
        Payload::Complex { re, im } => Some(Num::Complex { re: *re, im: *im }),
        _ => None,
    }
}

/// Whether the payload belongs to the numeric tower.
pub fn is_number(p: &Payload) -> bool {
    matches!(
        p,
        Payload::Bool(_) | Payload::Int(_) | Payload::Float(_) | Payload::Complex { .. }
    )
}

fn float_eq_int(f: f64, i: &Int) -> bool {
    f.is_finite()
        && f.fract() == 0.0
        && BigInt::from_f64(f).is_some_and(|b| b == i.to_big())
}

/// Exact cross-kind numeric equality. NaN is unequal to everything,
/// itself included.
pub fn eq_numbers(a: &Payload, b: &Payload) -> bool {
    let (a, b) = match (classify(a), classify(b)) {
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.to_big() == y.to_big(),
        (Num::Int(x), Num::Float(y)) | (Num::Float(y), Num::Int(x)) => float_eq_int(y, &x),
        (Num::Float(x), Num::Float(y)) => x == y,
        (Num::Complex { re, im }, Num::Complex { re: r2, im: i2 }) => re == r2 && im == i2,
        (Num::Complex { re, im }, Num::Float(y)) | (Num::Float(y), Num::Complex { re, im }) => {
            im == 0.0 && re == y
        }
        (Num::Complex { re, im }, Num::Int(x)) | (Num::Int(x), Num::Complex { re, im }) => {
            im == 0.0 && float_eq_int(re, &x)
        }
    }
}

/// Three-way numeric comparison; `None` for complex operands or NaN.
pub fn cmp_numbers(a: &Payload, b: &Payload) -> Option<Ordering> {
    let (a, b) = (classify(a)?, classify(b)?);
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => match (&x, &y) {
            (Int::Small(l), Int::Small(r)) => Some(l.cmp(r)),
            _ => Some(x.to_big().cmp(&y.to_big())),
        },
        (Num::Int(x), Num::Float(y)) => x.to_f64().partial_cmp(&y),
        (Num::Float(x), Num::Int(y)) => x.partial_cmp(&y.to_f64()),
        (Num::Float(x), Num::Float(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

/// Hash obeying the tower invariants: equal values of any numeric kind
/// hash equal, integers hash to themselves (mod machine word, zero → 1),
/// NaN hashes to one canonical pattern.
pub fn hash_number(p: &Payload) -> Option<u64> {
    fn nonzero(h: u64) -> u64 {
        if h == 0 {
            1
        } else {
            h
        }
    }
    fn float_hash(f: f64) -> u64 {
        if f.is_nan() {
            return f64::NAN.to_bits();
        }
        if f.is_finite() && f.fract() == 0.0 {
            if let Some(b) = BigInt::from_f64(f) {
                return Int::Big(b).hash64();
            }
        }
        nonzero(f.to_bits())
    }
    match p {
        Payload::Bool(b) => Some(Int::Small(*b as i64).hash64()),
        Payload::Int(i) => Some(i.hash64()),
        Payload::Float(f) => Some(float_hash(*f)),
        Payload::Complex { re, im } => {
            if *im == 0.0 {
                Some(float_hash(*re))
            } else {
                Some(nonzero(
                    float_hash(*re).rotate_left(17) ^ float_hash(*im).wrapping_mul(3),
                ))
            }
        }
        _ => None,
    }
}

fn int_add(a: &Int, b: &Int) -> Int {
    match (a, b) {
        (Int::Small(x), Int::Small(y)) => match x.checked_add(*y) {
            Some(v) => Int::Small(v),
            None => Int::Big(BigInt::from(*x) + BigInt::from(*y)),
        },
        _ => Int::Big(a.to_big() + b.to_big()).shrink(),
    }
}

fn int_sub(a: &Int, b: &Int) -> Int {
    match (a, b) {
        (Int::Small(x), Int::Small(y)) => match x.checked_sub(*y) {
            Some(v) => Int::Small(v),
            None => Int::Big(BigInt::from(*x) - BigInt::from(*y)),
        },
        _ => Int::Big(a.to_big() - b.to_big()).shrink(),
    }
}

fn int_mul(a: &Int, b: &Int) -> Int {
    match (a, b) {
        (Int::Small(x), Int::Small(y)) => match x.checked_mul(*y) {
            Some(v) => Int::Small(v),
            None => Int::Big(BigInt::from(*x) * BigInt::from(*y)),
        },
        _ => Int::Big(a.to_big() * b.to_big()).shrink(),
    }
}

fn int_div_floor(a: &Int, b: &Int) -> Int {
    match (a, b) {
        (Int::Small(x), Int::Small(y)) => match x.checked_div_euclid(*y) {
            Some(_) => Int::Small(Integer::div_floor(x, y)),
            None => Int::Big(Integer::div_floor(&a.to_big(), &b.to_big())).shrink(),
        },
        _ => Int::Big(Integer::div_floor(&a.to_big(), &b.to_big())).shrink(),
    }
}

fn int_mod_floor(a: &Int, b: &Int) -> Int {
    match (a, b) {
        (Int::Small(x), Int::Small(y)) if *x != i64::MIN => {
            Int::Small(Integer::mod_floor(x, y))
        }
        _ => Int::Big(Integer::mod_floor(&a.to_big(), &b.to_big())).shrink(),
    }
}

/// Integer power by repeated squaring; `exp` is non-negative.
fn int_pow(base: &Int, mut exp: u64) -> Int {
    let mut acc = Int::Small(1);
    let mut sq = base.clone();
    while exp > 0 {
        if exp & 1 == 1 {
            acc = int_mul(&acc, &sq);
        }
        exp >>= 1;
        if exp > 0 {
            sq = int_mul(&sq, &sq);
        }
    }
    acc
}

fn float_mod(a: f64, b: f64) -> f64 {
    // remainder with the divisor's sign
    a - b * (a / b).floor()
}

fn complex_mul(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
}

fn complex_div(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    let denom = b.0 * b.0 + b.1 * b.1;
    (
        (a.0 * b.0 + a.1 * b.1) / denom,
        (a.1 * b.0 - a.0 * b.1) / denom,
    )
}

fn complex_exp(z: (f64, f64)) -> (f64, f64) {
    let r = z.0.exp();
    (r * z.1.cos(), r * z.1.sin())
}

fn complex_ln(z: (f64, f64)) -> (f64, f64) {
    (z.0.hypot(z.1).ln(), z.1.atan2(z.0))
}

fn complex_pow(vm: &Vm, z: (f64, f64), w: (f64, f64)) -> Result<(f64, f64), Thrown> {
    if z == (0.0, 0.0) {
        if w == (0.0, 0.0) {
            return Ok((1.0, 0.0));
        }
        if w.1 == 0.0 && w.0 > 0.0 {
            return Ok((0.0, 0.0));
        }
        return Err(vm.throw(&core().math_error, "0 cannot be raised to that power"));
    }
    Ok(complex_exp(complex_mul(w, complex_ln(z))))
}

/// Mixed-mode binary arithmetic over the numeric tower.
pub fn arith(vm: &Vm, op: ArithOp, l: &Value, r: &Value) -> Result<Value, Thrown> {
    let (a, b) = match (classify(l.payload()), classify(r.payload())) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(vm.throw(
                &core().internal_error,
                "numeric operation on non-numeric operands",
            ))
        }
    };

    // promote to the narrower enclosing domain
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => match op {
            ArithOp::Add => Ok(Value::int_from(int_add(&x, &y))),
            ArithOp::Sub => Ok(Value::int_from(int_sub(&x, &y))),
            ArithOp::Mul => Ok(Value::int_from(int_mul(&x, &y))),
            ArithOp::Div => {
                if y.is_zero() {
                    Err(vm.throw(&core().math_error, "division by zero"))
                } else {
                    Ok(Value::int_from(int_div_floor(&x, &y)))
                }
            }
            ArithOp::Mod => {
                if y.is_zero() {
                    Err(vm.throw(&core().math_error, "modulo by zero"))
                } else {
                    Ok(Value::int_from(int_mod_floor(&x, &y)))
                }
            }
            ArithOp::Pow => {
                if y.sign() < 0 {
                    if x.is_zero() {
                        return Err(vm.throw(
                            &core().math_error,
                            "0 cannot be raised to a negative power",
                        ));
                    }
                    // floor of 1 / x**|y|
                    if x.is_unit() {
                        let neg_base = x.sign() < 0;
                        let odd_exp =
                            Integer::mod_floor(&y.to_big(), &BigInt::from(2)) == BigInt::from(1);
                        return Ok(Value::int(if neg_base && odd_exp { -1 } else { 1 }));
                    }
                    return Ok(Value::int(0));
                }
                match y.to_i64().map(|v| v as u64) {
                    Some(exp) => Ok(Value::int_from(int_pow(&x, exp))),
                    None => Err(vm.throw(&core().math_error, "exponent too large")),
                }
            }
        },
        (Num::Complex { re, im }, other) | (other, Num::Complex { re, im })
            if !matches!(other, Num::Complex { .. }) =>
        {
            // lift the narrower operand and retry in complex
            let lifted = match other {
                Num::Int(i) => (i.to_f64(), 0.0),
                Num::Float(f) => (f, 0.0),
                Num::Complex { .. } => unreachable!(),
            };
            let (za, zb) = if matches!(l.payload(), Payload::Complex { .. }) {
                ((re, im), lifted)
            } else {
                (lifted, (re, im))
            };
            complex_arith(vm, op, za, zb)
        }
        (Num::Complex { re, im }, Num::Complex { re: r2, im: i2 }) => {
            complex_arith(vm, op, (re, im), (r2, i2))
        }
        (a, b) => {
            let x = match a {
                Num::Int(i) => i.to_f64(),
                Num::Float(f) => f,
                Num::Complex { .. } => unreachable!(),
            };
            let y = match b {
                Num::Int(i) => i.to_f64(),
                Num::Float(f) => f,
                Num::Complex { .. } => unreachable!(),
            };
            let out = match op {
                ArithOp::Add => x + y,
                ArithOp::Sub => x - y,
                ArithOp::Mul => x * y,
                ArithOp::Div => x / y,
                ArithOp::Mod => float_mod(x, y),
                ArithOp::Pow => x.powf(y),
            };
            Ok(Value::float(out))
        }
    }
}

fn complex_arith(
    vm: &Vm,
    op: ArithOp,
    a: (f64, f64),
    b: (f64, f64),
) -> Result<Value, Thrown> {
    let (re, im) = match op {
        ArithOp::Add => (a.0 + b.0, a.1 + b.1),
        ArithOp::Sub => (a.0 - b.0, a.1 - b.1),
        ArithOp::Mul => complex_mul(a, b),
        ArithOp::Div => complex_div(a, b),
        ArithOp::Mod => {
            return Err(vm.throw(&core().op_error, "modulo is not defined for complex"))
        }
        ArithOp::Pow => complex_pow(vm, a, b)?,
    };
    Ok(Value::complex(re, im))
}

/// Unary numeric operation on a method receiver (`args[0]`).
pub fn unary_method(vm: &Vm, op: UnaryOp, args: &[Value]) -> Result<Value, Thrown> {
    let this = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "unary method takes a receiver"))?;
    unary(vm, op, this)
}

/// Unary numeric operation.
pub fn unary(vm: &Vm, op: UnaryOp, v: &Value) -> Result<Value, Thrown> {
    let n = classify(v.payload()).ok_or_else(|| {
        vm.throw(
            &core().type_error,
            format!("unary operation on non-numeric '{}'", v.type_name()),
        )
    })?;
    Ok(match (op, n) {
        (UnaryOp::Pos, _) => v.clone(),
        (UnaryOp::Neg, Num::Int(i)) => Value::int_from(int_sub(&Int::Small(0), &i)),
        (UnaryOp::Neg, Num::Float(f)) => Value::float(-f),
        (UnaryOp::Neg, Num::Complex { re, im }) => Value::complex(-re, -im),
        (UnaryOp::Abs, Num::Int(i)) => {
            if i.sign() < 0 {
                Value::int_from(int_sub(&Int::Small(0), &i))
            } else {
                Value::int_from(i)
            }
        }
        (UnaryOp::Abs, Num::Float(f)) => Value::float(f.abs()),
        (UnaryOp::Abs, Num::Complex { re, im }) => Value::float(re.hypot(im)),
        (UnaryOp::Sqig, Num::Int(i)) => {
            // bitwise complement: -(x + 1)
            Value::int_from(int_sub(&Int::Small(-1), &i))
        }
        (UnaryOp::Sqig, Num::Complex { re, im }) => Value::complex(re, -im),
        (UnaryOp::Sqig, Num::Float(_)) => {
            return Err(vm.throw(
                &core().op_error,
                "unary '~' is not defined for 'float'",
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    fn vm() -> Vm {
        Vm::new(Machine::new())
    }

    fn int_op(op: ArithOp, a: i64, b: i64) -> Value {
        arith(&vm(), op, &Value::int(a), &Value::int(b)).unwrap()
    }

    #[test]
    fn small_arithmetic() {
        assert_eq!(int_op(ArithOp::Add, 2, 3), Value::int(5));
        assert_eq!(int_op(ArithOp::Sub, 2, 3), Value::int(-1));
        assert_eq!(int_op(ArithOp::Mul, 7, 6), Value::int(42));
        assert_eq!(int_op(ArithOp::Div, 7, 2), Value::int(3));
        assert_eq!(int_op(ArithOp::Pow, 2, 10), Value::int(1024));
    }

    #[test]
    fn overflow_promotes_exactly() {
        let v = int_op(ArithOp::Mul, i64::MAX, 2);
        let expected = BigInt::from(i64::MAX) * 2;
        match v.payload() {
            Payload::Int(Int::Big(b)) => assert_eq!(*b, expected),
            other => panic!("expected big int, got {other:?}"),
        }
        let back = arith(&vm(), ArithOp::Sub, &v, &Value::int(i64::MAX)).unwrap();
        assert_eq!(back.as_i64(), Some(i64::MAX));
    }

    #[test]
    fn modulus_has_divisor_sign() {
        assert_eq!(int_op(ArithOp::Mod, 7, 3), Value::int(1));
        assert_eq!(int_op(ArithOp::Mod, -7, 3), Value::int(2));
        assert_eq!(int_op(ArithOp::Mod, 7, -3), Value::int(-2));
        assert_eq!(int_op(ArithOp::Mod, -7, -3), Value::int(-1));
    }

    #[test]
    fn division_is_floor_and_checked() {
        assert_eq!(int_op(ArithOp::Div, -7, 2), Value::int(-4));
        assert!(arith(&vm(), ArithOp::Div, &Value::int(1), &Value::int(0)).is_err());
        assert!(arith(&vm(), ArithOp::Mod, &Value::int(1), &Value::int(0)).is_err());
    }

    #[test]
    fn pow_edges() {
        assert_eq!(int_op(ArithOp::Pow, 0, 0), Value::int(1));
        assert_eq!(int_op(ArithOp::Pow, 0, 5), Value::int(0));
        assert!(arith(&vm(), ArithOp::Pow, &Value::int(0), &Value::int(-1)).is_err());
        assert_eq!(int_op(ArithOp::Pow, 5, -2), Value::int(0));
        assert_eq!(int_op(ArithOp::Pow, 1, -5), Value::int(1));
        assert_eq!(int_op(ArithOp::Pow, -1, -5), Value::int(-1));
        assert_eq!(int_op(ArithOp::Pow, -1, -4), Value::int(1));
        // float base keeps IEEE semantics
        let f = arith(&vm(), ArithOp::Pow, &Value::float(0.0), &Value::int(0)).unwrap();
        assert!(eq_numbers(f.payload(), Value::int(1).payload()));
    }

    #[test]
    fn mixed_mode_promotes() {
        let f = arith(&vm(), ArithOp::Add, &Value::int(1), &Value::float(0.5)).unwrap();
        assert!(matches!(f.payload(), Payload::Float(v) if *v == 1.5));
        let c = arith(&vm(), ArithOp::Mul, &Value::complex(0.0, 1.0), &Value::complex(0.0, 1.0))
            .unwrap();
        assert!(matches!(c.payload(), Payload::Complex { re, im } if *re == -1.0 && im.abs() < 1e-12));
        let c2 = arith(&vm(), ArithOp::Add, &Value::int(1), &Value::complex(1.0, 2.0)).unwrap();
        assert!(matches!(c2.payload(), Payload::Complex { re, im } if *re == 2.0 && *im == 2.0));
    }

    #[test]
    fn nan_follows_ieee() {
        let nan = Value::float(f64::NAN);
        assert!(!eq_numbers(nan.payload(), nan.payload()));
        assert_eq!(cmp_numbers(nan.payload(), Value::int(1).payload()), None);
        // but its hash is canonical
        assert_eq!(hash_number(nan.payload()), hash_number(nan.payload()));
    }

    #[test]
    fn cross_kind_hash_equality() {
        let pairs = [
            (Value::int(7), Value::float(7.0)),
            (Value::int(0), Value::float(0.0)),
            (Value::int(0), Value::float(-0.0)),
            (Value::bool_(true), Value::int(1)),
            (Value::float(2.0), Value::complex(2.0, 0.0)),
        ];
        for (a, b) in pairs {
            assert!(eq_numbers(a.payload(), b.payload()), "{a:?} == {b:?}");
            assert_eq!(
                hash_number(a.payload()),
                hash_number(b.payload()),
                "hash {a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            cmp_numbers(Value::int(1).payload(), Value::float(1.5).payload()),
            Some(Ordering::Less)
        );
        assert_eq!(
            cmp_numbers(Value::int(2).payload(), Value::int(2).payload()),
            Some(Ordering::Equal)
        );
        assert_eq!(
            cmp_numbers(Value::complex(1.0, 0.0).payload(), Value::int(1).payload()),
            None
        );
    }

    #[test]
    fn unary_ops() {
        let v = vm();
        assert_eq!(unary(&v, UnaryOp::Neg, &Value::int(5)).unwrap(), Value::int(-5));
        assert_eq!(unary(&v, UnaryOp::Abs, &Value::int(-5)).unwrap(), Value::int(5));
        assert_eq!(unary(&v, UnaryOp::Sqig, &Value::int(0)).unwrap(), Value::int(-1));
        let mag = unary(&v, UnaryOp::Abs, &Value::complex(3.0, 4.0)).unwrap();
        assert!(matches!(mag.payload(), Payload::Float(f) if *f == 5.0));
    }
}
