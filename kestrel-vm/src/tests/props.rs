use quickcheck_macros::quickcheck;
use std::collections::HashMap;

use crate::types::dict::Table;
use crate::types::int::Int;
use crate::types::strings::hash_bytes;
use crate::value::Value;

#[quickcheck]
fn int_str_round_trips(v: i64, base: u8) -> bool {
    let base = 2 + (base as u32) % 35; // [2, 36]
    let text = Int::Small(v).to_str_radix(base);
    Int::from_str_radix(&text, base).and_then(|i| i.to_i64()) == Some(v)
}

#[quickcheck]
fn string_hash_never_zero_and_content_only(data: Vec<u8>) -> bool {
    let h = hash_bytes(&data);
    h != 0 && h == hash_bytes(data.clone())
}

#[quickcheck]
fn integral_floats_hash_like_ints(v: i32) -> bool {
    let i = Value::int(v as i64);
    let f = Value::float(v as f64);
    i.equals(&f) && i.builtin_hash() == f.builtin_hash()
}

#[quickcheck]
fn list_push_pop_is_identity(xs: Vec<i64>, x: i64) -> bool {
    let list = Value::list(xs.iter().copied().map(Value::int).collect());
    let handle = list.as_list().unwrap();
    let before = handle.read().len();
    crate::types::list::push(handle, Value::int(x));
    let popped = handle.write().pop();
    popped.map(|v| v.as_i64()) == Some(Some(x)) && handle.read().len() == before
}

#[quickcheck]
fn table_tracks_a_model_map(ops: Vec<(u8, u8)>) -> bool {
    // first byte selects insert/remove, second picks a small key space so
    // collisions, tombstones and rehashes all happen
    let mut table = Table::new();
    let mut model: HashMap<String, i64> = HashMap::new();
    for (i, (op, key)) in ops.iter().enumerate() {
        let name = format!("k{}", key % 32);
        if op % 3 == 0 {
            table.remove_str(&name);
            model.remove(&name);
        } else {
            table.insert_str(&name, Value::int(i as i64));
            model.insert(name, i as i64);
        }
    }
    if table.len() != model.len() {
        return false;
    }
    model.iter().all(|(name, v)| {
        table.get_str(name).and_then(|val| val.as_i64()) == Some(*v)
    })
}

#[quickcheck]
fn table_iteration_order_is_insertion_order(keys: Vec<u8>) -> bool {
    let mut table = Table::new();
    let mut expected: Vec<String> = Vec::new();
    for k in keys {
        let name = format!("key{k}");
        if !expected.contains(&name) {
            expected.push(name.clone());
        }
        table.insert_str(&name, Value::int(k as i64));
    }
    let order: Vec<String> = table
        .iter_live()
        .map(|(k, _)| k.as_str().unwrap().to_owned())
        .collect();
    order == expected
}

#[quickcheck]
fn tuple_equality_is_elementwise(xs: Vec<i64>) -> bool {
    let a = Value::tuple(xs.iter().copied().map(Value::int).collect());
    let b = Value::tuple(xs.iter().copied().map(Value::int).collect());
    a.equals(&b) && a.builtin_hash() == b.builtin_hash()
}
