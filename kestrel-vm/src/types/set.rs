//! Sets: the dict table without values.

use itertools::Itertools;

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, dict::Table, iter::IterState, CoreTypes};
use crate::value::Value;

fn expect_set<'v>(
    vm: &Vm,
    args: &'v [Value],
) -> Result<&'v parking_lot::RwLock<Table>, Thrown> {
    args.first()
        .and_then(|v| v.as_set())
        .ok_or_else(|| vm.throw(&core().type_error, "expected a 'set' receiver"))
}

fn set_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let out = Value::set_from(Table::new());
    if let Some(objs) = args.get(1).filter(|v| !v.is_none()) {
        let items = ops::collect(vm, objs)?;
        for item in items {
            let hash = ops::hash_of(vm, &item)?;
            if let Some(t) = out.as_set() {
                t.write().insert(hash, item, None);
            }
        }
    }
    Ok(out)
}

fn set_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let keys: Vec<Value> = {
        let table = expect_set(vm, args)?.read();
        table.iter_live().map(|(k, _)| k.clone()).collect()
    };
    if keys.is_empty() {
        // distinguish from an empty dict
        return Ok(Value::str("set()"));
    }
    let shown: Vec<String> = keys
        .iter()
        .map(|k| ops::repr_string(vm, k))
        .collect::<Result<_, _>>()?;
    Ok(Value::str(format!("{{{}}}", shown.iter().join(", "))))
}

fn set_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::int(expect_set(vm, args)?.read().len() as i64))
}

fn set_add(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let item = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "set.add(item) takes one argument"))?;
    let hash = ops::hash_of(vm, item)?;
    expect_set(vm, args)?.write().insert(hash, item.clone(), None);
    Ok(Value::none())
}

fn set_has(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let item = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "set.has(item) takes one argument"))?;
    let hash = ops::hash_of(vm, item)?;
    let present = expect_set(vm, args)?.read().contains(hash, item);
    Ok(Value::bool_(present))
}

fn set_del(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let item = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "set.del(item) takes one argument"))?;
    let hash = ops::hash_of(vm, item)?;
    expect_set(vm, args)?.write().remove(hash, item);
    Ok(Value::none())
}

fn set_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_set(vm, args)?;
    Ok(Value::iter_state(
        core().set_iter.clone(),
        IterState::Entries {
            target: args[0].clone(),
            pos: 0,
        },
    ))
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.set;
    t.define("__new__", "set.__new__(objs=none)", set_new);
    t.define("__str__", "set.__str__(self)", set_str);
    t.define("__repr__", "set.__repr__(self)", set_str);
    t.define("__len__", "set.__len__(self)", set_len);
    t.define("__iter__", "set.__iter__(self)", set_iter);
    t.define("add", "set.add(self, item)", set_add);
    t.define("has", "set.has(self, item)", set_has);
    t.define("del", "set.del(self, item)", set_del);
}
