//! Type descriptors and protocol-slot dispatch tables.
//!
//! A [`TypeDesc`] carries the human-readable name, the direct parents
//! (primary first), a string-keyed attribute dictionary of members and
//! methods, and a fixed table of protocol [`Slots`]. Slots are filled
//! from the primary parent at construction time, so inheritance never
//! costs a lookup at a call site. Writing a dunder-named attribute keeps
//! the fast-path slot and the attribute dictionary in step.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::dict::Table;
use crate::value::{NativeImpl, Value};

macro_rules! slot_table {
    ($(($variant:ident, $field:ident, $dunder:literal)),* $(,)?) => {
        /// Identifier of a protocol slot.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
        #[allow(missing_docs)]
        pub enum SlotId {
            $($variant,)*
        }

        /// Fast-path table of protocol hooks; each entry is a callable.
        #[derive(Default)]
        pub struct Slots {
            $(pub(crate) $field: Option<Value>,)*
        }

        impl SlotId {
            /// Map a dunder attribute name to its slot, if it is one.
            pub fn from_dunder(name: &str) -> Option<SlotId> {
                Some(match name {
                    $($dunder => SlotId::$variant,)*
                    _ => return None,
                })
            }

            /// The dunder attribute name of this slot.
            pub const fn dunder(self) -> &'static str {
                match self {
                    $(SlotId::$variant => $dunder,)*
                }
            }
        }

        impl Slots {
            /// Current entry for `id`.
            pub fn get(&self, id: SlotId) -> Option<&Value> {
                match id {
                    $(SlotId::$variant => self.$field.as_ref(),)*
                }
            }

            /// Replace the entry for `id`.
            pub fn set(&mut self, id: SlotId, v: Value) {
                match id {
                    $(SlotId::$variant => self.$field = Some(v),)*
                }
            }

            /// Copy every slot the parent defines that we do not.
            pub fn inherit(&mut self, parent: &Slots) {
                $(
                    if self.$field.is_none() {
                        self.$field = parent.$field.clone();
                    }
                )*
            }
        }
    };
}

slot_table! {
    (New, new, "__new__"),
    (Init, init, "__init__"),
    (Str, str_, "__str__"),
    (Repr, repr, "__repr__"),
    (Bool, bool_, "__bool__"),
    (Int, int_, "__int__"),
    (Bytes, bytes_, "__bytes__"),
    (Hash, hash, "__hash__"),
    (Len, len, "__len__"),
    (GetItem, getitem, "__getitem__"),
    (SetItem, setitem, "__setitem__"),
    (Iter, iter, "__iter__"),
    (Next, next, "__next__"),
    (GetAttr, getattr, "__getattr__"),
    (SetAttr, setattr, "__setattr__"),
    (Call, call, "__call__"),
    (Add, add, "__add__"),
    (Sub, sub, "__sub__"),
    (Mul, mul, "__mul__"),
    (Div, div, "__div__"),
    (Mod, mod_, "__mod__"),
    (Pow, pow, "__pow__"),
    (BinOr, binor, "__binor__"),
    (BinAnd, binand, "__binand__"),
    (BinXor, binxor, "__binxor__"),
    (Lshift, lshift, "__lshift__"),
    (Rshift, rshift, "__rshift__"),
    (Cmp, cmp, "__cmp__"),
    (Lt, lt, "__lt__"),
    (Le, le, "__le__"),
    (Gt, gt, "__gt__"),
    (Ge, ge, "__ge__"),
    (Eq, eq, "__eq__"),
    (Ne, ne, "__ne__"),
    (Pos, pos, "__pos__"),
    (Neg, neg, "__neg__"),
    (Abs, abs, "__abs__"),
    (Sqig, sqig, "__sqig__"),
}

/// Shared handle to a type descriptor.
pub type Type = Arc<TypeDesc>;

/// Runtime description of a type.
pub struct TypeDesc {
    name: RwLock<String>,
    parents: RwLock<Vec<Type>>,
    attrs: RwLock<Table>,
    slots: RwLock<Slots>,
    builtin: bool,
}

/// Identity comparison of two type handles.
pub fn same_type(a: &Type, b: &Type) -> bool {
    Arc::ptr_eq(a, b)
}

/// Whether `ty` is `of` or inherits from it, depth-first over parents.
pub fn issub(ty: &Type, of: &Type) -> bool {
    if same_type(ty, of) {
        return true;
    }
    ty.parents().iter().any(|p| issub(p, of))
}

impl TypeDesc {
    /// A fresh descriptor with no parents, attributes or slots.
    pub fn bare(name: impl Into<String>, builtin: bool) -> Type {
        Arc::new(TypeDesc {
            name: RwLock::new(name.into()),
            parents: RwLock::new(Vec::new()),
            attrs: RwLock::new(Table::new()),
            slots: RwLock::new(Slots::default()),
            builtin,
        })
    }

    /// Human-readable name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Rename the type.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Whether this is an engine-provided type (instances reject attribute
    /// writes unless they carry their own attribute table).
    pub const fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Snapshot of the direct parents.
    pub fn parents(&self) -> Vec<Type> {
        self.parents.read().clone()
    }

    /// Current callable for a slot, if set.
    pub fn slot(&self, id: SlotId) -> Option<Value> {
        self.slots.read().get(id).cloned()
    }

    /// Install a slot callable directly (also recorded as an attribute).
    pub fn set_slot(&self, id: SlotId, v: Value) {
        self.attrs
            .write()
            .insert_str(id.dunder(), v.clone());
        self.slots.write().set(id, v);
    }

    /// Look up an attribute by name in this type's dictionary only.
    pub fn attr(&self, name: &str) -> Option<Value> {
        self.attrs.read().get_str(name)
    }

    /// Read access to the attribute table.
    pub fn attrs(&self) -> &RwLock<Table> {
        &self.attrs
    }

    /// Set an attribute, mirroring dunder names into the slot table.
    pub fn set_attr(&self, name: &str, val: Value) {
        if name == "__name__" {
            if let Some(s) = val.as_str() {
                self.set_name(s);
            }
        } else if let Some(id) = SlotId::from_dunder(name) {
            self.slots.write().set(id, val.clone());
        }
        self.attrs.write().insert_str(name, val);
    }

    /// Register a native method under `name`.
    pub fn define(&self, name: &'static str, sig: &'static str, f: NativeImpl) {
        self.set_attr(name, Value::native(name, sig, f));
    }

    /// Append a parent, filling any slot this type has not set itself.
    ///
    /// The first parent added is the primary one; later parents only fill
    /// slots still empty, which is what gives mixin-style inheritance.
    pub fn add_parent(&self, parent: &Type) {
        {
            let mut parents = self.parents.write();
            if parents.iter().any(|p| Arc::ptr_eq(p, parent)) {
                return;
            }
            parents.push(parent.clone());
        }
        let parent_slots = parent.slots.read();
        self.slots.write().inherit(&parent_slots);
    }
}

impl std::fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<type '{}'>", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Thrown;
    use crate::interpreter::Vm;

    fn nop(_vm: &mut Vm, _args: &[Value]) -> Result<Value, Thrown> {
        Ok(Value::none())
    }

    #[test]
    fn dunder_names_round_trip() {
        use strum::IntoEnumIterator;
        for id in SlotId::iter() {
            assert_eq!(SlotId::from_dunder(id.dunder()), Some(id));
        }
        assert_eq!(SlotId::from_dunder("__frobnicate__"), None);
        assert_eq!(SlotId::from_dunder("plain"), None);
    }

    #[test]
    fn setting_a_dunder_attr_updates_the_slot() {
        let ty = TypeDesc::bare("probe", false);
        assert!(ty.slot(SlotId::Add).is_none());

        let f = Value::native("add", "probe.__add__(l, r)", nop);
        ty.set_attr("__add__", f.clone());

        assert!(ty.slot(SlotId::Add).expect("slot filled").is(&f));
        assert!(ty.attr("__add__").expect("attr recorded").is(&f));
    }

    #[test]
    fn parent_slots_are_copied_once() {
        let parent = TypeDesc::bare("base", false);
        parent.set_attr("__len__", Value::native("len", "base.__len__(self)", nop));

        let child = TypeDesc::bare("derived", false);
        let own = Value::native("str", "derived.__str__(self)", nop);
        child.set_attr("__str__", own.clone());
        child.add_parent(&parent);

        // inherited where empty, kept where set
        assert!(child.slot(SlotId::Len).is_some());
        assert!(child.slot(SlotId::Str).expect("kept").is(&own));
        assert!(issub(&child, &parent));
        assert!(!issub(&parent, &child));

        // re-adding the same parent is a no-op
        child.add_parent(&parent);
        assert_eq!(child.parents().len(), 1);
    }
}
