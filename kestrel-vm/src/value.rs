//! The uniform value representation.
//!
//! Every runtime value is a [`Value`]: a counted handle to an [`Obj`]
//! carrying a type-descriptor reference and a type-specific payload. The
//! handle's strong count is the reference count of the object model;
//! cloning a `Value` is `incref`, dropping one is `decref`, and dropping
//! the last handle releases the payload's owned references in turn.
//!
//! Common small values are interned singletons: `none`, the booleans, the
//! `nan` float, integers in `[-SMALL_INT_MAX, SMALL_INT_MAX]`, the 256
//! single-character strings and the 256 single-byte byte-strings. Their
//! statics are never dropped, so a decrement can never free them.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::consts::SMALL_INT_MAX;
use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::mem;
use crate::numeric;
use crate::object::Type;
use crate::strbuf::StrBuf;
use crate::types::code::Code;
use crate::types::dict::Table;
use crate::types::func::Func;
use crate::types::int::Int;
use crate::types::iter::IterState;
use crate::types::stream::Stream;
use crate::types::thread::ThreadObj;
use crate::types::{self, core_raw};

/// Host function signature behind native callables.
pub type NativeImpl = fn(&mut Vm, &[Value]) -> Result<Value, Thrown>;

/// Immutable UTF-8 string payload with its precomputed hash.
#[derive(Debug)]
pub struct Str {
    /// The characters, owned.
    pub text: Box<str>,
    /// 64-bit content hash; never 0 for non-empty text.
    pub hash: u64,
}

/// Immutable byte-string payload with its precomputed hash.
#[derive(Debug)]
pub struct ByteStr {
    /// The bytes, owned.
    pub data: Box<[u8]>,
    /// 64-bit content hash.
    pub hash: u64,
}

/// Slice payload; any component may be `none`.
#[derive(Debug)]
pub struct Slice {
    /// First index, or `none`.
    pub start: Value,
    /// One-past-last index, or `none`.
    pub stop: Value,
    /// Stride, or `none`.
    pub step: Value,
}

/// Range payload; all components are integers, `step` non-zero.
#[derive(Debug)]
pub struct Range {
    /// First value produced.
    pub start: Value,
    /// Exclusive bound.
    pub stop: Value,
    /// Stride.
    pub step: Value,
}

/// One member of a dynamically created enumeration.
#[derive(Debug)]
pub struct EnumVal {
    /// Member name (a string value).
    pub name: Value,
    /// Member value (an integer value).
    pub value: Value,
}

/// Module payload: a name plus an attribute dictionary.
#[derive(Debug)]
pub struct Module {
    /// Module name (a string value).
    pub name: Value,
    /// Attribute dictionary (a dict value).
    pub attrs: Value,
}

/// Type-specific payload of an object.
#[derive(Debug)]
pub enum Payload {
    /// The `none` singleton's payload.
    None,
    /// A boolean singleton's payload.
    Bool(bool),
    /// Integer, small or arbitrary-precision.
    Int(Int),
    /// IEEE 754 double.
    Float(f64),
    /// Pair of doubles.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
    /// Immutable string.
    Str(Str),
    /// Immutable byte string.
    Bytes(ByteStr),
    /// Immutable fixed-length sequence.
    Tuple(Box<[Value]>),
    /// Mutable sequence.
    List(RwLock<Vec<Value>>),
    /// Insertion-ordered hash table with values.
    Dict(RwLock<Table>),
    /// Insertion-ordered hash table without values.
    Set(RwLock<Table>),
    /// Subscript slice.
    Slice(Slice),
    /// Lazy integer range.
    Range(Range),
    /// Enumeration member.
    EnumVal(EnumVal),
    /// Compiled bytecode object.
    Code(Arc<Code>),
    /// Callable (native, compiled or partial).
    Func(Func),
    /// Module.
    Module(Module),
    /// OS thread wrapper.
    Thread(ThreadObj),
    /// File-backed or standard stream.
    Stream(Mutex<Stream>),
    /// Growable formatting buffer.
    StrBuilder(Mutex<StrBuf>),
    /// In-progress iteration.
    Iter(Mutex<IterState>),
    /// A type used as a value.
    Type(Type),
    /// Instance of a user-visible type (errors, user objects): attr table.
    Instance(RwLock<Table>),
}

/// Object header: type descriptor plus payload. Heap-only, always behind
/// a [`Value`].
pub struct Obj {
    ty: Type,
    payload: Payload,
    tracked: usize,
}

impl Drop for Obj {
    fn drop(&mut self) {
        mem::on_free(self.tracked);
    }
}

/// Counted handle to an object.
#[derive(Clone)]
pub struct Value {
    obj: Arc<Obj>,
}

fn payload_estimate(payload: &Payload) -> usize {
    let extra = match payload {
        Payload::Str(s) => s.text.len(),
        Payload::Bytes(b) => b.data.len(),
        Payload::Tuple(t) => t.len() * std::mem::size_of::<Value>(),
        Payload::List(l) => l.read().capacity() * std::mem::size_of::<Value>(),
        Payload::Int(Int::Big(b)) => (b.bits() as usize) / 8,
        _ => 0,
    };
    std::mem::size_of::<Obj>() + extra
}

impl Value {
    /// Allocate a fresh object with an explicit type descriptor.
    pub fn alloc(ty: Type, payload: Payload) -> Value {
        let tracked = payload_estimate(&payload);
        mem::on_alloc(tracked);
        Value {
            obj: Arc::new(Obj {
                ty,
                payload,
                tracked,
            }),
        }
    }

    /// The value's type descriptor.
    pub fn ty(&self) -> &Type {
        &self.obj.ty
    }

    /// The value's payload.
    pub fn payload(&self) -> &Payload {
        &self.obj.payload
    }

    /// Identity: whether both handles refer to the same object.
    pub fn is(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.obj, &other.obj)
    }

    /// Address of the object, for `%p`-style formatting.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.obj) as usize
    }

    /// Current reference count of the object.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.obj)
    }

    /// Name of the value's type.
    pub fn type_name(&self) -> String {
        self.obj.ty.name()
    }

    // ---- constructors ----

    /// The `none` singleton.
    pub fn none() -> Value {
        NONE.clone()
    }

    /// A boolean singleton.
    pub fn bool_(b: bool) -> Value {
        if b {
            TRUE.clone()
        } else {
            FALSE.clone()
        }
    }

    /// An integer; small magnitudes come from the singleton pool.
    pub fn int(v: i64) -> Value {
        if (-SMALL_INT_MAX..=SMALL_INT_MAX).contains(&v) {
            return SMALL_INTS[(v + SMALL_INT_MAX) as usize].clone();
        }
        Value::alloc(core_raw().int.clone(), Payload::Int(Int::Small(v)))
    }

    /// An integer from an arbitrary-precision value, normalized to the
    /// small representation when it fits.
    pub fn int_from(i: Int) -> Value {
        match i.shrink() {
            Int::Small(v) => Value::int(v),
            big => Value::alloc(core_raw().int.clone(), Payload::Int(big)),
        }
    }

    /// An integer from a big value.
    pub fn big(v: BigInt) -> Value {
        Value::int_from(Int::Big(v))
    }

    /// A float; NaN maps to the interned `nan`.
    pub fn float(v: f64) -> Value {
        if v.is_nan() {
            return NAN.clone();
        }
        Value::alloc(core_raw().float.clone(), Payload::Float(v))
    }

    /// A complex number.
    pub fn complex(re: f64, im: f64) -> Value {
        Value::alloc(core_raw().complex.clone(), Payload::Complex { re, im })
    }

    /// A string; single characters below U+0100 are interned.
    pub fn str(text: impl Into<String>) -> Value {
        let text: String = text.into();
        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if (c as u32) < 256 {
                return CHAR_STRS[c as u32 as usize].clone();
            }
        }
        let hash = types::strings::hash_bytes(text.as_bytes());
        Value::alloc(
            core_raw().str_.clone(),
            Payload::Str(Str {
                text: text.into_boxed_str(),
                hash,
            }),
        )
    }

    /// The interned single-character string for `c` when below U+0100.
    pub fn char_str(c: char) -> Value {
        if (c as u32) < 256 {
            CHAR_STRS[c as u32 as usize].clone()
        } else {
            Value::str(c.to_string())
        }
    }

    /// A byte string; single bytes are interned.
    pub fn bytes(data: Vec<u8>) -> Value {
        if data.len() == 1 {
            return BYTE_STRS[data[0] as usize].clone();
        }
        let hash = types::strings::hash_bytes(&data);
        Value::alloc(
            core_raw().bytes.clone(),
            Payload::Bytes(ByteStr {
                data: data.into_boxed_slice(),
                hash,
            }),
        )
    }

    /// A tuple owning its elements.
    pub fn tuple(elems: Vec<Value>) -> Value {
        Value::alloc(
            core_raw().tuple.clone(),
            Payload::Tuple(elems.into_boxed_slice()),
        )
    }

    /// A list owning its elements.
    pub fn list(elems: Vec<Value>) -> Value {
        Value::alloc(core_raw().list.clone(), Payload::List(RwLock::new(elems)))
    }

    /// An empty dictionary.
    pub fn dict() -> Value {
        Value::dict_from(Table::new())
    }

    /// A dictionary from an existing table.
    pub fn dict_from(table: Table) -> Value {
        Value::alloc(core_raw().dict.clone(), Payload::Dict(RwLock::new(table)))
    }

    /// A set from an existing table.
    pub fn set_from(table: Table) -> Value {
        Value::alloc(core_raw().set.clone(), Payload::Set(RwLock::new(table)))
    }

    /// A slice triple.
    pub fn slice(start: Value, stop: Value, step: Value) -> Value {
        Value::alloc(
            core_raw().slice.clone(),
            Payload::Slice(Slice { start, stop, step }),
        )
    }

    /// A range triple; the caller validates `step != 0`.
    pub fn range(start: Value, stop: Value, step: Value) -> Value {
        Value::alloc(
            core_raw().range.clone(),
            Payload::Range(Range { start, stop, step }),
        )
    }

    /// A bytecode object.
    pub fn code(code: Arc<Code>) -> Value {
        Value::alloc(core_raw().code.clone(), Payload::Code(code))
    }

    /// A native function.
    pub fn native(name: &'static str, sig: &'static str, func: NativeImpl) -> Value {
        Value::alloc(
            core_raw().cfunc.clone(),
            Payload::Func(Func::native(name, sig, func)),
        )
    }

    /// A callable from an explicit [`Func`] payload.
    pub fn func(f: Func) -> Value {
        let ty = match &f {
            Func::Native(_) => core_raw().cfunc.clone(),
            Func::Compiled(_) => core_raw().func.clone(),
            Func::Partial(_) => core_raw().pfunc.clone(),
        };
        Value::alloc(ty, Payload::Func(f))
    }

    /// A fresh module with the given name.
    pub fn module(name: impl Into<String>) -> Value {
        let name = Value::str(name);
        let attrs = Value::dict();
        if let Payload::Dict(t) = attrs.payload() {
            t.write().insert_str("__name__", name.clone());
        }
        Value::alloc(
            core_raw().module.clone(),
            Payload::Module(Module { name, attrs }),
        )
    }

    /// A stream value.
    pub fn stream(stream: Stream) -> Value {
        Value::alloc(core_raw().stream.clone(), Payload::Stream(Mutex::new(stream)))
    }

    /// An empty string builder.
    pub fn str_builder() -> Value {
        Value::alloc(
            core_raw().str_builder.clone(),
            Payload::StrBuilder(Mutex::new(StrBuf::new())),
        )
    }

    /// An iterator of the given iterator type.
    pub fn iter_state(ty: Type, state: IterState) -> Value {
        Value::alloc(ty, Payload::Iter(Mutex::new(state)))
    }

    /// A type used as a value.
    pub fn type_value(ty: Type) -> Value {
        Value::alloc(core_raw().type_.clone(), Payload::Type(ty))
    }

    /// An instance of `ty` with the given attribute table.
    pub fn instance(ty: Type, attrs: Table) -> Value {
        Value::alloc(ty, Payload::Instance(RwLock::new(attrs)))
    }

    // ---- accessors ----

    /// Whether this is the `none` singleton.
    pub fn is_none(&self) -> bool {
        matches!(self.payload(), Payload::None)
    }

    /// Machine integer view, if this is an int that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.payload() {
            Payload::Int(i) => i.to_i64(),
            Payload::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self.payload() {
            Payload::Str(s) => Some(&s.text),
            _ => None,
        }
    }

    /// Byte-string view.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.payload() {
            Payload::Bytes(b) => Some(&b.data),
            _ => None,
        }
    }

    /// Tuple elements view.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self.payload() {
            Payload::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// List payload view.
    pub fn as_list(&self) -> Option<&RwLock<Vec<Value>>> {
        match self.payload() {
            Payload::List(l) => Some(l),
            _ => None,
        }
    }

    /// Dict payload view.
    pub fn as_dict(&self) -> Option<&RwLock<Table>> {
        match self.payload() {
            Payload::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Set payload view.
    pub fn as_set(&self) -> Option<&RwLock<Table>> {
        match self.payload() {
            Payload::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Code payload view.
    pub fn as_code(&self) -> Option<&Arc<Code>> {
        match self.payload() {
            Payload::Code(c) => Some(c),
            _ => None,
        }
    }

    /// Callable payload view.
    pub fn as_func(&self) -> Option<&Func> {
        match self.payload() {
            Payload::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Type payload view.
    pub fn as_type(&self) -> Option<&Type> {
        match self.payload() {
            Payload::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Module payload view.
    pub fn as_module(&self) -> Option<&Module> {
        match self.payload() {
            Payload::Module(m) => Some(m),
            _ => None,
        }
    }

    /// Instance attribute table view.
    pub fn as_instance(&self) -> Option<&RwLock<Table>> {
        match self.payload() {
            Payload::Instance(t) => Some(t),
            _ => None,
        }
    }

    /// Stream payload view.
    pub fn as_stream(&self) -> Option<&Mutex<Stream>> {
        match self.payload() {
            Payload::Stream(s) => Some(s),
            _ => None,
        }
    }

    // ---- structural operations ----

    /// Content hash over the builtin kinds, without dispatch.
    ///
    /// `None` means the value is unhashable at this layer; protocol-level
    /// hashing may still succeed through a `hash` slot.
    pub fn builtin_hash(&self) -> Option<u64> {
        fn nonzero(h: u64) -> u64 {
            if h == 0 {
                1
            } else {
                h
            }
        }
        match self.payload() {
            Payload::None => Some(nonzero(0x6e6f6e65)),
            Payload::Bool(_) | Payload::Int(_) | Payload::Float(_) | Payload::Complex { .. } => {
                numeric::hash_number(self.payload())
            }
            Payload::Str(s) => Some(s.hash),
            Payload::Bytes(b) => Some(b.hash),
            Payload::Tuple(elems) => {
                let mut h: u64 = 0x345678;
                for e in elems.iter() {
                    let eh = e.builtin_hash()?;
                    h = nonzero((h.rotate_left(5) ^ eh).wrapping_mul(0x9e3779b97f4a7c15));
                }
                Some(nonzero(h))
            }
            Payload::EnumVal(ev) => ev.value.builtin_hash(),
            _ => None,
        }
    }

    /// Structural equality: identity, numeric cross-kind value equality,
    /// string/bytes content, tuples elementwise. Containers fall back to
    /// identity; anything else is unequal.
    pub fn equals(&self, other: &Value) -> bool {
        if self.is(other) {
            return true;
        }
        match (self.payload(), other.payload()) {
            (Payload::Str(a), Payload::Str(b)) => a.hash == b.hash && a.text == b.text,
            (Payload::Bytes(a), Payload::Bytes(b)) => a.hash == b.hash && a.data == b.data,
            (Payload::Tuple(a), Payload::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Payload::EnumVal(a), Payload::EnumVal(b)) => {
                crate::object::same_type(self.ty(), other.ty()) && a.value.equals(&b.value)
            }
            (a, b) if numeric::is_number(a) && numeric::is_number(b) => numeric::eq_numbers(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload() {
            Payload::None => write!(f, "none"),
            Payload::Bool(b) => write!(f, "{b}"),
            Payload::Int(i) => write!(f, "{i}"),
            Payload::Float(v) => write!(f, "{v}"),
            Payload::Str(s) => write!(f, "{:?}", &*s.text),
            _ => write!(f, "<'{}' obj @ {:#x}>", self.type_name(), self.addr()),
        }
    }
}

// ---- interned singletons ----

static NONE: Lazy<Value> = Lazy::new(|| Value::alloc(core_raw().none.clone(), Payload::None));
static TRUE: Lazy<Value> =
    Lazy::new(|| Value::alloc(core_raw().bool_.clone(), Payload::Bool(true)));
static FALSE: Lazy<Value> =
    Lazy::new(|| Value::alloc(core_raw().bool_.clone(), Payload::Bool(false)));
static NAN: Lazy<Value> =
    Lazy::new(|| Value::alloc(core_raw().float.clone(), Payload::Float(f64::NAN)));

static SMALL_INTS: Lazy<Vec<Value>> = Lazy::new(|| {
    (-SMALL_INT_MAX..=SMALL_INT_MAX)
        .map(|v| Value::alloc(core_raw().int.clone(), Payload::Int(Int::Small(v))))
        .collect()
});

static CHAR_STRS: Lazy<Vec<Value>> = Lazy::new(|| {
    (0u32..256)
        .map(|cp| {
            let c = char::from_u32(cp).expect("codepoints below 256 are chars");
            let text: String = c.to_string();
            let hash = types::strings::hash_bytes(text.as_bytes());
            Value::alloc(
                core_raw().str_.clone(),
                Payload::Str(Str {
                    text: text.into_boxed_str(),
                    hash,
                }),
            )
        })
        .collect()
});

static BYTE_STRS: Lazy<Vec<Value>> = Lazy::new(|| {
    (0u16..256)
        .map(|b| {
            let data = vec![b as u8];
            let hash = types::strings::hash_bytes(&data);
            Value::alloc(
                core_raw().bytes.clone(),
                Payload::Bytes(ByteStr {
                    data: data.into_boxed_slice(),
                    hash,
                }),
            )
        })
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_shared() {
        assert!(Value::none().is(&Value::none()));
        assert!(Value::bool_(true).is(&Value::bool_(true)));
        assert!(Value::int(0).is(&Value::int(0)));
        assert!(Value::int(255).is(&Value::int(255)));
        assert!(Value::int(-255).is(&Value::int(-255)));
        assert!(!Value::int(256).is(&Value::int(256)));
        assert!(Value::str("a").is(&Value::str("a")));
        assert!(Value::bytes(vec![7]).is(&Value::bytes(vec![7])));
        assert!(Value::float(f64::NAN).is(&Value::float(f64::NAN)));
    }

    #[test]
    fn singleton_refcount_survives_drops() {
        let a = Value::int(0);
        let before = a.refcount();
        {
            let _b = Value::int(0);
            assert!(a.refcount() > before - 1);
        }
        // the pool keeps the object alive regardless of clone churn
        assert!(Value::int(0).refcount() >= 2);
    }

    #[test]
    fn structural_equality() {
        assert!(Value::str("abc").equals(&Value::str("abc")));
        assert!(!Value::str("abc").equals(&Value::str("abd")));
        assert!(Value::int(3).equals(&Value::float(3.0)));
        assert!(Value::tuple(vec![Value::int(1), Value::str("x")])
            .equals(&Value::tuple(vec![Value::int(1), Value::str("x")])));
        assert!(!Value::tuple(vec![Value::int(1)]).equals(&Value::tuple(vec![])));
        let l = Value::list(vec![]);
        assert!(l.equals(&l));
        assert!(!l.equals(&Value::list(vec![])));
    }

    #[test]
    fn hash_is_content_based_and_nonzero() {
        assert_eq!(
            Value::str("hello").builtin_hash(),
            Value::str("hello").builtin_hash()
        );
        assert_ne!(Value::str("hello").builtin_hash(), Some(0));
        assert!(Value::list(vec![]).builtin_hash().is_none());
        assert_eq!(Value::int(0).builtin_hash(), Some(1));
        assert_eq!(Value::int(42).builtin_hash(), Some(42));
    }

    #[test]
    fn interned_ints_compare_by_value() {
        for v in [-255i64, -1, 0, 1, 100, 255] {
            assert_eq!(Value::int(v).as_i64(), Some(v));
        }
        assert_eq!(Value::int(i64::MAX).as_i64(), Some(i64::MAX));
    }
}
