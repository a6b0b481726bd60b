//! Dynamically-created enumeration types.
//!
//! `Enum.create(name, members)` builds a fresh type whose attribute
//! dictionary maps member names to interned member instances, and which
//! carries bidirectional `_enum_name2num` / `_enum_num2name` maps.
//! Calling the created type with a name or a number looks the member up.

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::object::{issub, TypeDesc};
use crate::ops;
use crate::types::{core, dict::Table, CoreTypes};
use crate::value::{EnumVal, Payload, Value};

fn member_spec(vm: &Vm, item: &Value, auto: i64) -> Result<(String, i64), Thrown> {
    if let Some(name) = item.as_str() {
        return Ok((name.to_owned(), auto));
    }
    if let Some(pair) = item.as_tuple() {
        if let [name, num] = pair {
            if let (Some(name), Some(num)) = (name.as_str(), num.as_i64()) {
                return Ok((name.to_owned(), num));
            }
        }
    }
    Err(vm.throw(
        &core().arg_error,
        "enum members must be names or (name, value) pairs",
    ))
}

fn enum_create(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let name = args
        .first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| vm.throw(&core().arg_error, "Enum.create(name, members) takes a name"))?
        .to_owned();
    let members = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "Enum.create(name, members) takes members"))?;

    let ty = TypeDesc::bare(name, false);
    let mut name2num = Table::new();
    let mut num2name = Table::new();

    let mut auto = 0i64;
    for item in ops::collect(vm, members)? {
        let (mname, mval) = member_spec(vm, &item, auto)?;
        auto = mval + 1;

        let name_v = Value::str(mname.clone());
        let val_v = Value::int(mval);
        let member = Value::alloc(
            ty.clone(),
            Payload::EnumVal(EnumVal {
                name: name_v.clone(),
                value: val_v.clone(),
            }),
        );
        ty.set_attr(&mname, member);

        let name_hash = name_v.builtin_hash().expect("strings hash");
        let val_hash = val_v.builtin_hash().expect("ints hash");
        name2num.insert(name_hash, name_v.clone(), Some(val_v.clone()));
        num2name.insert(val_hash, val_v, Some(name_v));
    }

    ty.set_attr("_enum_name2num", Value::dict_from(name2num));
    ty.set_attr("_enum_num2name", Value::dict_from(num2name));
    ty.add_parent(&core().enum_);

    Ok(Value::type_value(ty))
}

fn enum_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let ty = args
        .first()
        .and_then(|v| v.as_type())
        .filter(|t| issub(t, &core().enum_))
        .ok_or_else(|| vm.throw(&core().type_error, "expected an enumeration type"))?
        .clone();
    let key = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "enumeration lookup takes one argument"))?;

    if let Some(name) = key.as_str() {
        if let Some(member) = ty.attr(name) {
            if matches!(member.payload(), Payload::EnumVal(_)) {
                return Ok(member);
            }
        }
        return Err(vm.throw(
            &core().key_error,
            format!("enumeration '{}' has no member '{}'", ty.name(), name),
        ));
    }

    if key.as_i64().is_some() {
        let map = ty
            .attr("_enum_num2name")
            .and_then(|d| d.as_dict().map(|t| t.read().get(
                key.builtin_hash().expect("ints hash"),
                key,
            )))
            .flatten();
        if let Some(name_v) = map {
            if let Some(name) = name_v.as_str() {
                if let Some(member) = ty.attr(name) {
                    return Ok(member);
                }
            }
        }
        return Err(vm.throw(
            &core().key_error,
            format!("enumeration '{}' has no member with that value", ty.name()),
        ));
    }

    Err(vm.throw(
        &core().arg_error,
        "enumeration lookup takes a name or an integer",
    ))
}

fn enum_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::EnumVal(ev)) => {
            let ty_name = args[0].type_name();
            let member = ev.name.as_str().unwrap_or("?");
            Ok(Value::str(format!("{ty_name}.{member}")))
        }
        _ => Err(vm.throw(&core().type_error, "expected an enumeration member")),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.enum_;
    t.define("create", "Enum.create(name, members)", enum_create);
    t.define("__new__", "Enum.__new__(key)", enum_new);
    t.define("__str__", "Enum.__str__(self)", enum_str);
    t.define("__repr__", "Enum.__repr__(self)", enum_str);
}
