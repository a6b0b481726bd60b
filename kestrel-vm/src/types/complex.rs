//! Complex numbers: a pair of doubles with `real`/`imag` pseudo-attributes.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::numeric;
use crate::types::float::format_f64;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

fn expect_complex(vm: &Vm, args: &[Value]) -> Result<(f64, f64), Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Complex { re, im }) => Ok((*re, *im)),
        _ => Err(vm.throw(&core().type_error, "expected a 'complex' receiver")),
    }
}

fn to_f64(vm: &Vm, v: &Value, what: &str) -> Result<f64, Thrown> {
    match v.payload() {
        Payload::None => Ok(0.0),
        Payload::Bool(b) => Ok(*b as i64 as f64),
        Payload::Int(i) => Ok(i.to_f64()),
        Payload::Float(f) => Ok(*f),
        _ => Err(vm.throw(
            &core().type_error,
            format!("complex {what} must be a real number"),
        )),
    }
}

fn complex_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    if let Some(v) = args.get(1) {
        if let Payload::Complex { .. } = v.payload() {
            return Ok(v.clone());
        }
    }
    let re = match args.get(1) {
        None => 0.0,
        Some(v) => to_f64(vm, v, "real part")?,
    };
    let im = match args.get(2) {
        None => 0.0,
        Some(v) => to_f64(vm, v, "imaginary part")?,
    };
    Ok(Value::complex(re, im))
}

/// `(1.0+2.0i)`, `(1.0-2.0i)`.
pub fn format_complex(re: f64, im: f64) -> String {
    if im >= 0.0 || im.is_nan() {
        format!("({}+{}i)", format_f64(re), format_f64(im))
    } else {
        format!("({}-{}i)", format_f64(re), format_f64(-im))
    }
}

fn complex_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let (re, im) = expect_complex(vm, args)?;
    Ok(Value::str(format_complex(re, im)))
}

fn complex_neg(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Neg, args)
}

fn complex_abs(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    numeric::unary_method(vm, numeric::UnaryOp::Abs, args)
}

fn complex_sqig(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    // conjugate
    numeric::unary_method(vm, numeric::UnaryOp::Sqig, args)
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.complex;
    t.define("__new__", "complex.__new__(real=none, imag=none)", complex_new);
    t.define("__str__", "complex.__str__(self)", complex_str);
    t.define("__repr__", "complex.__repr__(self)", complex_str);
    t.define("__neg__", "complex.__neg__(self)", complex_neg);
    t.define("__abs__", "complex.__abs__(self)", complex_abs);
    t.define("__sqig__", "complex.__sqig__(self)", complex_sqig);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting() {
        assert_eq!(format_complex(1.0, 2.0), "(1.0+2.0i)");
        assert_eq!(format_complex(1.5, -0.5), "(1.5-0.5i)");
        assert_eq!(format_complex(0.0, 0.0), "(0.0+0.0i)");
    }
}
