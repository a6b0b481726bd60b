//! The error-kind types.
//!
//! Every kind is an ordinary type descending from `Error`; instances
//! carry an attribute dictionary that always holds `what`. Construction
//! goes through the shared `__new__`, which instantiates whichever kind
//! was called.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::object::issub;
use crate::ops;
use crate::types::{core, dict::Table, CoreTypes};
use crate::value::{Payload, Value};

fn error_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let ty = args
        .first()
        .and_then(|v| v.as_type())
        .filter(|t| issub(t, &core().error))
        .ok_or_else(|| vm.throw(&core().type_error, "expected an error type"))?
        .clone();

    let what = match args.get(1) {
        None => Value::str(""),
        Some(v) if v.as_str().is_some() => v.clone(),
        Some(v) => ops::str_of(vm, v)?,
    };

    let mut attrs = Table::new();
    attrs.insert_str("what", what);
    Ok(Value::instance(ty, attrs))
}

fn error_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let this = args
        .first()
        .ok_or_else(|| vm.throw(&core().type_error, "expected an error receiver"))?;
    let what = match this.payload() {
        Payload::Instance(attrs) => attrs.read().get_str("what"),
        _ => None,
    };
    match what.as_ref().and_then(|w| w.as_str()) {
        Some("") | None => Ok(Value::str(this.type_name())),
        Some(text) => Ok(Value::str(format!("{}: {}", this.type_name(), text))),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.error;
    t.define("__new__", "Error.__new__(what=none)", error_new);
    t.define("__str__", "Error.__str__(self)", error_str);
    t.define("__repr__", "Error.__repr__(self)", error_str);
}
