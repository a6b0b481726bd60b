//! Dictionaries, and the open-addressed table shared with sets,
//! attribute dictionaries and module namespaces.
//!
//! The table keeps a prime-sized bucket array of indices into an
//! insertion-ordered entry array. Lookups probe linearly from
//! `hash % n`, skipping tombstones and stopping at the first empty
//! bucket. Deletion tombstones both the bucket (`-2`) and the entry
//! (key slot emptied); a rehash compacts tombstoned entries away while
//! preserving insertion order. A load factor above 0.3 triggers a rehash
//! targeting 0.15. Hash `0` is reserved for "empty" and rewritten to `1`
//! on the way in.

use crate::consts::{TABLE_MAX_LOAD, TABLE_NEW_LOAD};
use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::ops;
use crate::types::{core, iter::IterState, strings, CoreTypes};
use crate::value::{Payload, Value};

const BUCKET_EMPTY: isize = -1;
const BUCKET_DELETED: isize = -2;

/// One slot of the entry array. A `None` key marks a tombstone.
#[derive(Debug)]
pub struct Entry {
    /// Cached key hash (never 0).
    pub hash: u64,
    /// The key, or `None` once deleted.
    pub key: Option<Value>,
    /// The value; `None` for set-like tables.
    pub val: Option<Value>,
}

/// Insertion-ordered open-addressed hash table.
#[derive(Debug, Default)]
pub struct Table {
    buckets: Vec<isize>,
    entries: Vec<Entry>,
    live: usize,
}

fn is_prime(x: usize) -> bool {
    if x < 2 {
        return false;
    }
    if x == 2 || x == 3 || x == 5 {
        return true;
    }
    if x % 2 == 0 || x % 3 == 0 || x % 5 == 0 {
        return false;
    }
    let mut i = 3;
    while i * i <= x {
        if x % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

/// Smallest odd prime strictly greater than `x`.
pub(crate) fn next_prime(x: usize) -> usize {
    let mut i = if x % 2 == 0 { x + 1 } else { x + 2 };
    while !is_prime(i) {
        i += 2;
    }
    i
}

fn nonzero(hash: u64) -> u64 {
    if hash == 0 {
        1
    } else {
        hash
    }
}

impl Table {
    /// Empty table; buckets are allocated on first insert.
    pub fn new() -> Table {
        Table::default()
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Current load factor: total entries (tombstones included) over
    /// buckets.
    pub fn load(&self) -> f64 {
        if self.buckets.is_empty() {
            0.0
        } else {
            self.entries.len() as f64 / self.buckets.len() as f64
        }
    }

    /// Length of the entry array, tombstones included. Iteration cursors
    /// index into this.
    pub fn entries_len(&self) -> usize {
        self.entries.len()
    }

    /// Key/value pair of entry `i`, or `None` if it is a tombstone.
    pub fn entry_pair(&self, i: usize) -> Option<(Value, Option<Value>)> {
        let e = self.entries.get(i)?;
        let key = e.key.clone()?;
        Some((key, e.val.clone()))
    }

    fn probe_find(&self, hash: u64, matches: impl Fn(&Entry) -> bool) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let hash = nonzero(hash);
        let n = self.buckets.len();
        let bi0 = (hash as usize) % n;
        let mut t = 0;
        loop {
            let bi = (bi0 + t) % n;
            match self.buckets[bi] {
                BUCKET_EMPTY => return None,
                BUCKET_DELETED => {}
                ei => {
                    let e = &self.entries[ei as usize];
                    if e.hash == hash && e.key.is_some() && matches(e) {
                        return Some(ei as usize);
                    }
                }
            }
            t += 1;
            if t >= n {
                return None;
            }
        }
    }

    fn rebuild(&mut self, min_buckets: usize) {
        // compact out tombstoned entries, keeping insertion order
        self.entries.retain(|e| e.key.is_some());
        self.live = self.entries.len();

        let want = min_buckets.max(self.entries.len() * 4).max(1);
        let n = next_prime(want.saturating_sub(1));
        self.buckets = vec![BUCKET_EMPTY; n];

        for (i, e) in self.entries.iter().enumerate() {
            let bi0 = (e.hash as usize) % n;
            let mut t = 0;
            loop {
                let bi = (bi0 + t) % n;
                if self.buckets[bi] == BUCKET_EMPTY {
                    self.buckets[bi] = i as isize;
                    break;
                }
                t += 1;
                debug_assert!(t < n, "table rebuild ran out of buckets");
            }
        }
    }

    /// Insert or replace `key` (with the given content hash). `val` is
    /// `None` for set-like use.
    pub fn insert(&mut self, hash: u64, key: Value, val: Option<Value>) {
        if self.buckets.is_empty() || self.load() > TABLE_MAX_LOAD {
            let target = (self.entries.len() as f64 / TABLE_NEW_LOAD) as usize;
            self.rebuild(target);
        }

        let hash = nonzero(hash);
        let n = self.buckets.len();
        let bi0 = (hash as usize) % n;
        let mut t = 0;
        loop {
            let bi = (bi0 + t) % n;
            match self.buckets[bi] {
                BUCKET_EMPTY => {
                    self.buckets[bi] = self.entries.len() as isize;
                    self.entries.push(Entry {
                        hash,
                        key: Some(key),
                        val,
                    });
                    self.live += 1;
                    return;
                }
                BUCKET_DELETED => {}
                ei => {
                    let e = &mut self.entries[ei as usize];
                    if e.hash == hash {
                        if let Some(k) = &e.key {
                            if k.is(&key) || k.equals(&key) {
                                e.val = val;
                                return;
                            }
                        }
                    }
                }
            }
            t += 1;
            if t >= n {
                // probe sequence exhausted; grow and retry
                self.rebuild(n * 2);
                return self.insert(hash, key, val);
            }
        }
    }

    /// Dictionary lookup: the value stored under `key`.
    pub fn get(&self, hash: u64, key: &Value) -> Option<Value> {
        self.probe_find(hash, |e| {
            e.key.as_ref().is_some_and(|k| k.is(key) || k.equals(key))
        })
        .and_then(|ei| self.entries[ei].val.clone())
    }

    /// Whether `key` is present.
    pub fn contains(&self, hash: u64, key: &Value) -> bool {
        self.probe_find(hash, |e| {
            e.key.as_ref().is_some_and(|k| k.is(key) || k.equals(key))
        })
        .is_some()
    }

    /// Delete `key`, tombstoning its bucket and entry. Returns whether a
    /// live entry was removed.
    pub fn remove(&mut self, hash: u64, key: &Value) -> bool {
        if self.buckets.is_empty() {
            return false;
        }
        let hash = nonzero(hash);
        let n = self.buckets.len();
        let bi0 = (hash as usize) % n;
        let mut t = 0;
        loop {
            let bi = (bi0 + t) % n;
            match self.buckets[bi] {
                BUCKET_EMPTY => return false,
                BUCKET_DELETED => {}
                ei => {
                    let e = &mut self.entries[ei as usize];
                    if e.hash == hash {
                        let hit = e.key.as_ref().is_some_and(|k| k.is(key) || k.equals(key));
                        if hit {
                            e.key = None;
                            e.val = None;
                            self.buckets[bi] = BUCKET_DELETED;
                            self.live -= 1;
                            return true;
                        }
                    }
                }
            }
            t += 1;
            if t >= n {
                return false;
            }
        }
    }

    /// Live `(key, value)` pairs in insertion order.
    pub fn iter_live(&self) -> impl Iterator<Item = (&Value, Option<&Value>)> {
        self.entries
            .iter()
            .filter_map(|e| e.key.as_ref().map(|k| (k, e.val.as_ref())))
    }

    // ---- string-keyed convenience (attribute dictionaries) ----

    /// Lookup under a string key.
    pub fn get_str(&self, name: &str) -> Option<Value> {
        let hash = strings::hash_bytes(name.as_bytes());
        self.probe_find(hash, |e| {
            e.key.as_ref().and_then(|k| k.as_str()) == Some(name)
        })
        .and_then(|ei| self.entries[ei].val.clone())
    }

    /// Insert under a string key.
    pub fn insert_str(&mut self, name: &str, val: Value) {
        let key = Value::str(name);
        let hash = strings::hash_bytes(name.as_bytes());
        self.insert(hash, key, Some(val));
    }

    /// Delete a string key.
    pub fn remove_str(&mut self, name: &str) -> bool {
        let key = Value::str(name);
        let hash = strings::hash_bytes(name.as_bytes());
        self.remove(hash, &key)
    }
}

// ---- dict type methods ----

fn expect_dict<'v>(
    vm: &Vm,
    args: &'v [Value],
) -> Result<&'v parking_lot::RwLock<Table>, Thrown> {
    args.first()
        .and_then(|v| v.as_dict())
        .ok_or_else(|| vm.throw(&core().type_error, "expected a 'dict' receiver"))
}

fn dict_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let out = Value::dict();
    if let Some(pairs) = args.get(1).filter(|p| !p.is_none()) {
        let items = ops::collect(vm, pairs)?;
        for item in items {
            let pair = item.as_tuple().map(<[Value]>::to_vec).or_else(|| {
                item.as_list().map(|l| l.read().clone())
            });
            match pair.as_deref() {
                Some([k, v]) => {
                    let hash = ops::hash_of(vm, k)?;
                    if let Payload::Dict(t) = out.payload() {
                        t.write().insert(hash, k.clone(), Some(v.clone()));
                    }
                }
                _ => {
                    return Err(vm.throw(
                        &core().arg_error,
                        "dict() expects an iterable of (key, value) pairs",
                    ))
                }
            }
        }
    }
    Ok(out)
}

fn dict_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let pairs: Vec<(Value, Value)> = {
        let table = expect_dict(vm, args)?.read();
        table
            .iter_live()
            .map(|(k, v)| (k.clone(), v.cloned().unwrap_or_else(Value::none)))
            .collect()
    };
    let mut out = String::from("{");
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&ops::repr_string(vm, k)?);
        out.push_str(": ");
        out.push_str(&ops::repr_string(vm, v)?);
    }
    out.push('}');
    Ok(Value::str(out))
}

fn dict_len(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let n = expect_dict(vm, args)?.read().len();
    Ok(Value::int(n as i64))
}

fn dict_getitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    if args.len() != 2 {
        return Err(vm.throw(&core().arg_error, "dict subscript takes exactly one key"));
    }
    let key = &args[1];
    let hash = ops::hash_of(vm, key)?;
    let found = expect_dict(vm, args)?.read().get(hash, key);
    match found {
        Some(v) => Ok(v),
        None => {
            let shown = ops::repr_string(vm, key)?;
            Err(vm.throw(&core().key_error, format!("key {shown} not found")))
        }
    }
}

fn dict_setitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    if args.len() != 3 {
        return Err(vm.throw(&core().arg_error, "dict subscript assignment takes one key"));
    }
    let (key, val) = (&args[1], &args[2]);
    let hash = ops::hash_of(vm, key)?;
    expect_dict(vm, args)?
        .write()
        .insert(hash, key.clone(), Some(val.clone()));
    Ok(Value::none())
}

fn dict_get(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let key = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "dict.get(key, default=none) takes a key"))?;
    let hash = ops::hash_of(vm, key)?;
    let found = expect_dict(vm, args)?.read().get(hash, key);
    match found {
        Some(v) => Ok(v),
        None => match args.get(2) {
            Some(default) => Ok(default.clone()),
            None => {
                let shown = ops::repr_string(vm, key)?;
                Err(vm.throw(&core().key_error, format!("key {shown} not found")))
            }
        },
    }
}

fn dict_set(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    if args.len() != 3 {
        return Err(vm.throw(&core().arg_error, "dict.set(key, val) takes two arguments"));
    }
    dict_setitem(vm, args)
}

fn dict_del(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let key = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "dict.del(key) takes a key"))?;
    let hash = ops::hash_of(vm, key)?;
    expect_dict(vm, args)?.write().remove(hash, key);
    Ok(Value::none())
}

fn dict_has(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let key = args
        .get(1)
        .ok_or_else(|| vm.throw(&core().arg_error, "dict.has(key) takes a key"))?;
    let hash = ops::hash_of(vm, key)?;
    let present = expect_dict(vm, args)?.read().contains(hash, key);
    Ok(Value::bool_(present))
}

fn dict_iter(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_dict(vm, args)?;
    Ok(Value::iter_state(
        core().dict_iter.clone(),
        IterState::Entries {
            target: args[0].clone(),
            pos: 0,
        },
    ))
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.dict;
    t.define("__new__", "dict.__new__(pairs=none)", dict_new);
    t.define("__str__", "dict.__str__(self)", dict_str);
    t.define("__repr__", "dict.__repr__(self)", dict_str);
    t.define("__len__", "dict.__len__(self)", dict_len);
    t.define("__getitem__", "dict.__getitem__(self, key)", dict_getitem);
    t.define("__setitem__", "dict.__setitem__(self, key, val)", dict_setitem);
    t.define("__iter__", "dict.__iter__(self)", dict_iter);
    t.define("get", "dict.get(self, key, default=none)", dict_get);
    t.define("set", "dict.set(self, key, val)", dict_set);
    t.define("del", "dict.del(self, key)", dict_del);
    t.define("has", "dict.has(self, key)", dict_has);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(text: &str) -> (u64, Value) {
        (strings::hash_bytes(text.as_bytes()), Value::str(text))
    }

    #[test]
    fn insert_get_remove() {
        let mut t = Table::new();
        let (h, key) = k("alpha");
        t.insert(h, key.clone(), Some(Value::int(1)));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(h, &key), Some(Value::int(1)));

        t.insert(h, key.clone(), Some(Value::int(2)));
        assert_eq!(t.len(), 1, "replacement keeps one live entry");
        assert_eq!(t.get(h, &key), Some(Value::int(2)));

        assert!(t.remove(h, &key));
        assert!(!t.remove(h, &key));
        assert_eq!(t.get(h, &key), None);
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn bucket_count_stays_prime_and_loaded_below_max() {
        let mut t = Table::new();
        for i in 0..500 {
            let (h, key) = k(&format!("key{i}"));
            t.insert(h, key, Some(Value::int(i)));
        }
        assert_eq!(t.len(), 500);
        assert!(is_prime(t.buckets.len()), "bucket count {}", t.buckets.len());
        // the rehash triggers when load exceeds the max, so the resting
        // load sits at most one insert above it
        assert!(t.load() <= TABLE_MAX_LOAD + 1.0 / t.buckets.len() as f64);
        for i in 0..500 {
            let (h, key) = k(&format!("key{i}"));
            assert_eq!(t.get(h, &key), Some(Value::int(i)), "key{i}");
        }
    }

    #[test]
    fn delete_then_reinsert_moves_key_last_and_keeps_order() {
        let mut t = Table::new();
        for name in ["a", "b", "c", "d"] {
            let (h, key) = k(name);
            t.insert(h, key, Some(Value::str(name)));
        }
        let (hb, b) = k("b");
        assert!(t.remove(hb, &b));
        t.insert(hb, b, Some(Value::str("b2")));

        let order: Vec<String> = t
            .iter_live()
            .map(|(key, _)| key.as_str().unwrap().to_owned())
            .collect();
        assert_eq!(order, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn rehash_compacts_tombstones_preserving_order() {
        let mut t = Table::new();
        for i in 0..40 {
            let (h, key) = k(&format!("k{i}"));
            t.insert(h, key, Some(Value::int(i)));
        }
        for i in (0..40).step_by(2) {
            let (h, key) = k(&format!("k{i}"));
            assert!(t.remove(h, &key));
        }
        // force a rebuild
        for i in 40..200 {
            let (h, key) = k(&format!("k{i}"));
            t.insert(h, key, Some(Value::int(i)));
        }
        let order: Vec<i64> = t
            .iter_live()
            .map(|(_, v)| v.unwrap().as_i64().unwrap())
            .collect();
        let expected: Vec<i64> = (1..40).step_by(2).chain(40..200).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn zero_hash_is_rewritten() {
        let mut t = Table::new();
        t.insert(0, Value::int(0), Some(Value::str("zero")));
        assert_eq!(t.get(0, &Value::int(0)), Some(Value::str("zero")));
        assert_eq!(t.get(1, &Value::int(0)), Some(Value::str("zero")));
    }

    #[test]
    fn next_prime_is_prime_and_greater() {
        for x in 0..200 {
            let p = next_prime(x);
            assert!(p > x);
            assert!(is_prime(p));
        }
    }

    #[test]
    fn string_helpers() {
        let mut t = Table::new();
        t.insert_str("what", Value::str("boom"));
        assert_eq!(t.get_str("what"), Some(Value::str("boom")));
        assert!(t.remove_str("what"));
        assert_eq!(t.get_str("what"), None);
    }
}
