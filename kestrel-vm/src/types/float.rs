//! IEEE 754 double floats.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::numeric;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

/// Render a double: nine fractional digits with trailing zeros trimmed,
/// always keeping one digit after the point.
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let mut s = format!("{v:.9}");
    while s.len() > 1 && s.ends_with('0') && !s[..s.len() - 1].ends_with('.') {
        s.pop();
    }
    s
}

fn expect_float(vm: &Vm, args: &[Value]) -> Result<f64, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Float(f)) => Ok(*f),
        _ => Err(vm.throw(&core().type_error, "expected a 'float' receiver")),
    }
}

fn float_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let val = match args.get(1) {
        None => return Ok(Value::float(0.0)),
        Some(v) => v,
    };
    match val.payload() {
        Payload::None => Ok(Value::float(0.0)),
        Payload::Bool(b) => Ok(Value::float(*b as i64 as f64)),
        Payload::Int(i) => Ok(Value::float(i.to_f64())),
        Payload::Float(_) => Ok(val.clone()),
        Payload::Str(s) => s.text.trim().parse::<f64>().map(Value::float).map_err(|_| {
            vm.throw(
                &core().arg_error,
                format!("invalid float literal: {}", &*s.text),
            )
        }),
        _ => Err(vm.throw(
            &core().type_error,
            format!("cannot convert '{}' to float", val.type_name()),
        )),
    }
}

fn float_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::str(format_f64(expect_float(vm, args)?)))
}

fn float_int(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::int(expect_float(vm, args)? as i64))
}

fn float_neg(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Neg, args)
}

fn float_pos(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Pos, args)
}

fn float_abs(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Abs, args)
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.float;
    t.define("__new__", "float.__new__(val=none)", float_new);
    t.define("__str__", "float.__str__(self)", float_str);
    t.define("__repr__", "float.__repr__(self)", float_str);
    t.define("__int__", "float.__int__(self)", float_int);
    t.define("__neg__", "float.__neg__(self)", float_neg);
    t.define("__pos__", "float.__pos__(self)", float_pos);
    t.define("__abs__", "float.__abs__(self)", float_abs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_trims_trailing_zeros() {
        assert_eq!(format_f64(1.5), "1.5");
        assert_eq!(format_f64(7.0), "7.0");
        assert_eq!(format_f64(0.0), "0.0");
        assert_eq!(format_f64(-2.25), "-2.25");
        assert_eq!(format_f64(0.125), "0.125");
        assert_eq!(format_f64(f64::NAN), "nan");
        assert_eq!(format_f64(f64::INFINITY), "inf");
        assert_eq!(format_f64(f64::NEG_INFINITY), "-inf");
    }
}
