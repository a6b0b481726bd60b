//! Built-in types: their payloads, methods and descriptors.
//!
//! Each submodule owns one builtin type (or a small family): its payload
//! representation, its native methods, and an `init` that installs those
//! methods into the type's descriptor. [`core`] hands out the process-wide
//! descriptor set, wiring every type's method table on first use.

use once_cell::sync::Lazy;

use crate::object::{Type, TypeDesc};

pub mod code;
pub mod complex;
pub mod dict;
pub mod enums;
pub mod errors;
pub mod float;
pub mod func;
pub mod int;
pub mod iter;
pub mod list;
pub mod range;
pub mod set;
pub mod slice;
pub mod stream;
pub mod strings;
pub mod thread;
pub mod tuple;
pub mod typeobj;

/// The process-wide set of builtin type descriptors.
#[allow(missing_docs)]
pub struct CoreTypes {
    pub object: Type,
    pub type_: Type,
    pub none: Type,
    pub bool_: Type,
    pub int: Type,
    pub float: Type,
    pub complex: Type,
    pub str_: Type,
    pub bytes: Type,
    pub tuple: Type,
    pub list: Type,
    pub dict: Type,
    pub set: Type,
    pub slice: Type,
    pub range: Type,
    pub enum_: Type,
    pub code: Type,
    pub cfunc: Type,
    pub func: Type,
    pub pfunc: Type,
    pub module: Type,
    pub thread: Type,
    pub stream: Type,
    pub str_builder: Type,

    pub list_iter: Type,
    pub tuple_iter: Type,
    pub str_iter: Type,
    pub bytes_iter: Type,
    pub dict_iter: Type,
    pub set_iter: Type,
    pub range_iter: Type,

    pub error: Type,
    pub syntax_error: Type,
    pub math_error: Type,
    pub size_error: Type,
    pub key_error: Type,
    pub attr_error: Type,
    pub type_error: Type,
    pub arg_error: Type,
    pub op_error: Type,
    pub io_error: Type,
    pub import_error: Type,
    pub internal_error: Type,
    pub todo_error: Type,
    pub out_of_iter_error: Type,
}

impl CoreTypes {
    fn bare_set() -> CoreTypes {
        let t = |name: &str| TypeDesc::bare(name, true);
        CoreTypes {
            object: t("object"),
            type_: t("type"),
            none: t("none_type"),
            bool_: t("bool"),
            int: t("int"),
            float: t("float"),
            complex: t("complex"),
            str_: t("str"),
            bytes: t("bytes"),
            tuple: t("tuple"),
            list: t("list"),
            dict: t("dict"),
            set: t("set"),
            slice: t("slice"),
            range: t("range"),
            enum_: t("Enum"),
            code: t("code"),
            cfunc: t("cfunc"),
            func: t("func"),
            pfunc: t("pfunc"),
            module: t("module"),
            thread: t("thread"),
            stream: t("ios"),
            str_builder: t("str_builder"),

            list_iter: t("list_iter"),
            tuple_iter: t("tuple_iter"),
            str_iter: t("str_iter"),
            bytes_iter: t("bytes_iter"),
            dict_iter: t("dict_iter"),
            set_iter: t("set_iter"),
            range_iter: t("range_iter"),

            error: t("Error"),
            syntax_error: t("SyntaxError"),
            math_error: t("MathError"),
            size_error: t("SizeError"),
            key_error: t("KeyError"),
            attr_error: t("AttrError"),
            type_error: t("TypeError"),
            arg_error: t("ArgError"),
            op_error: t("OpError"),
            io_error: t("IOError"),
            import_error: t("ImportError"),
            internal_error: t("InternalError"),
            todo_error: t("ToDoError"),
            out_of_iter_error: t("OutOfIterError"),
        }
    }

    /// The error-kind descriptors, in taxonomy order (root first).
    pub fn error_kinds(&self) -> Vec<Type> {
        vec![
            self.error.clone(),
            self.syntax_error.clone(),
            self.math_error.clone(),
            self.size_error.clone(),
            self.key_error.clone(),
            self.attr_error.clone(),
            self.type_error.clone(),
            self.arg_error.clone(),
            self.op_error.clone(),
            self.io_error.clone(),
            self.import_error.clone(),
            self.internal_error.clone(),
            self.todo_error.clone(),
            self.out_of_iter_error.clone(),
        ]
    }
}

static CORE: Lazy<CoreTypes> = Lazy::new(CoreTypes::bare_set);

static CORE_WIRED: Lazy<()> = Lazy::new(|| {
    let c: &CoreTypes = &CORE;

    typeobj::init(c);
    int::init(c);
    float::init(c);
    complex::init(c);
    strings::init(c);
    tuple::init(c);
    list::init(c);
    dict::init(c);
    set::init(c);
    slice::init(c);
    range::init(c);
    enums::init(c);
    code::init(c);
    func::init(c);
    iter::init(c);
    errors::init(c);
    stream::init(c);
    thread::init(c);

    // every concrete type descends from object
    for ty in [
        &c.type_, &c.none, &c.bool_, &c.int, &c.float, &c.complex, &c.str_, &c.bytes, &c.tuple,
        &c.list, &c.dict, &c.set, &c.slice, &c.range, &c.enum_, &c.code, &c.cfunc, &c.func,
        &c.pfunc, &c.module, &c.thread, &c.stream, &c.str_builder, &c.list_iter, &c.tuple_iter,
        &c.str_iter, &c.bytes_iter, &c.dict_iter, &c.set_iter, &c.range_iter, &c.error,
    ] {
        ty.add_parent(&c.object);
    }
    // the error taxonomy hangs off the root error kind
    for kind in c.error_kinds().iter().skip(1) {
        kind.add_parent(&c.error);
    }
});

/// Builtin descriptors without forcing method wiring. Only for value
/// constructors, which may run while the wiring itself is in progress.
pub(crate) fn core_raw() -> &'static CoreTypes {
    &CORE
}

/// The wired builtin type set.
pub fn core() -> &'static CoreTypes {
    Lazy::force(&CORE_WIRED);
    &CORE
}
