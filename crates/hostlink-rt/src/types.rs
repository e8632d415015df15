// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin type objects, the exception hierarchy, and heap types.
//!
//! Builtin types and the `None`/`True`/`False` singletons are immortal and
//! created once per process. Heap types (`type_new`) are ordinary
//! reference-counted objects with their own attribute dict.
//!
//! ```text
//! object
//! +-- BaseException
//! |   +-- Exception
//! |       +-- ArithmeticError -- OverflowError
//! |       +-- LookupError ------ IndexError, KeyError
//! |       +-- ValueError ------- UnicodeDecodeError
//! |       +-- TypeError, RuntimeError, MemoryError, AttributeError,
//! |           StopIteration, BufferError, ImportError, SystemError,
//! |           ReferenceError
//! +-- int -- bool, float, str, bytes, bytearray, tuple, list, dict, set, ...
//! ```

use std::ptr;
use std::sync::OnceLock;

use crate::err;
use crate::object::{self, alloc_immortal, body, set_type, type_of, Body, ObjPtr};
use crate::values;

/// Storage class of a type's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Type,
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    ByteArray,
    Tuple,
    List,
    Dict,
    Set,
    Slice,
    Capsule,
    WeakRef,
    MemoryView,
    Iterator,
    Function,
    Module,
    Exception,
    /// Instances of user-created (heap) classes.
    Instance,
}

pub(crate) struct TypeData {
    pub name: String,
    pub base: ObjPtr,
    pub kind: TypeKind,
    /// Attribute dict; null for builtin types.
    pub dict: ObjPtr,
}

/// Process-wide builtin objects.
pub struct BuiltinTypes {
    pub object: ObjPtr,
    pub type_: ObjPtr,
    pub none_type: ObjPtr,
    pub bool_: ObjPtr,
    pub int: ObjPtr,
    pub float: ObjPtr,
    pub str_: ObjPtr,
    pub bytes: ObjPtr,
    pub bytearray: ObjPtr,
    pub tuple: ObjPtr,
    pub list: ObjPtr,
    pub dict: ObjPtr,
    pub set: ObjPtr,
    pub slice: ObjPtr,
    pub capsule: ObjPtr,
    pub weakref: ObjPtr,
    pub memoryview: ObjPtr,
    pub iterator: ObjPtr,
    pub function: ObjPtr,
    pub module: ObjPtr,

    pub base_exception: ObjPtr,
    pub exception: ObjPtr,
    pub arithmetic_error: ObjPtr,
    pub overflow_error: ObjPtr,
    pub lookup_error: ObjPtr,
    pub index_error: ObjPtr,
    pub key_error: ObjPtr,
    pub value_error: ObjPtr,
    pub unicode_decode_error: ObjPtr,
    pub type_error: ObjPtr,
    pub runtime_error: ObjPtr,
    pub memory_error: ObjPtr,
    pub attribute_error: ObjPtr,
    pub stop_iteration: ObjPtr,
    pub buffer_error: ObjPtr,
    pub import_error: ObjPtr,
    pub system_error: ObjPtr,
    pub reference_error: ObjPtr,

    pub none: ObjPtr,
    pub true_: ObjPtr,
    pub false_: ObjPtr,
}

// SAFETY: every pointer in `BuiltinTypes` is immortal: its count is never
// written and its body is never mutated (builtin types have no dict), so the
// objects can be shared read-only between threads.
unsafe impl Send for BuiltinTypes {}
unsafe impl Sync for BuiltinTypes {}

static BUILTINS: OnceLock<BuiltinTypes> = OnceLock::new();

/// Builtin type objects and singletons (created on first use).
pub fn builtin() -> &'static BuiltinTypes {
    BUILTINS.get_or_init(bootstrap)
}

fn bootstrap() -> BuiltinTypes {
    let object = alloc_immortal(ptr::null_mut(), type_body("object", ptr::null_mut(), TypeKind::Object));
    let type_ = alloc_immortal(ptr::null_mut(), type_body("type", object, TypeKind::Type));
    set_type(type_, type_);
    set_type(object, type_);

    let mk = |name: &str, base: ObjPtr, kind: TypeKind| alloc_immortal(type_, type_body(name, base, kind));

    let none_type = mk("NoneType", object, TypeKind::NoneType);
    let int = mk("int", object, TypeKind::Int);
    let bool_ = mk("bool", int, TypeKind::Bool);

    let base_exception = mk("BaseException", object, TypeKind::Exception);
    let exception = mk("Exception", base_exception, TypeKind::Exception);
    let arithmetic_error = mk("ArithmeticError", exception, TypeKind::Exception);
    let lookup_error = mk("LookupError", exception, TypeKind::Exception);
    let value_error = mk("ValueError", exception, TypeKind::Exception);

    BuiltinTypes {
        object,
        type_,
        none_type,
        bool_,
        int,
        float: mk("float", object, TypeKind::Float),
        str_: mk("str", object, TypeKind::Str),
        bytes: mk("bytes", object, TypeKind::Bytes),
        bytearray: mk("bytearray", object, TypeKind::ByteArray),
        tuple: mk("tuple", object, TypeKind::Tuple),
        list: mk("list", object, TypeKind::List),
        dict: mk("dict", object, TypeKind::Dict),
        set: mk("set", object, TypeKind::Set),
        slice: mk("slice", object, TypeKind::Slice),
        capsule: mk("PyCapsule", object, TypeKind::Capsule),
        weakref: mk("weakref", object, TypeKind::WeakRef),
        memoryview: mk("memoryview", object, TypeKind::MemoryView),
        iterator: mk("iterator", object, TypeKind::Iterator),
        function: mk("builtin_function_or_method", object, TypeKind::Function),
        module: mk("module", object, TypeKind::Module),

        base_exception,
        exception,
        arithmetic_error,
        overflow_error: mk("OverflowError", arithmetic_error, TypeKind::Exception),
        lookup_error,
        index_error: mk("IndexError", lookup_error, TypeKind::Exception),
        key_error: mk("KeyError", lookup_error, TypeKind::Exception),
        value_error,
        unicode_decode_error: mk("UnicodeDecodeError", value_error, TypeKind::Exception),
        type_error: mk("TypeError", exception, TypeKind::Exception),
        runtime_error: mk("RuntimeError", exception, TypeKind::Exception),
        memory_error: mk("MemoryError", exception, TypeKind::Exception),
        attribute_error: mk("AttributeError", exception, TypeKind::Exception),
        stop_iteration: mk("StopIteration", exception, TypeKind::Exception),
        buffer_error: mk("BufferError", exception, TypeKind::Exception),
        import_error: mk("ImportError", exception, TypeKind::Exception),
        system_error: mk("SystemError", exception, TypeKind::Exception),
        reference_error: mk("ReferenceError", exception, TypeKind::Exception),

        none: alloc_immortal(none_type, Body::None),
        true_: alloc_immortal(bool_, Body::Bool(true)),
        false_: alloc_immortal(bool_, Body::Bool(false)),
    }
}

fn type_body(name: &str, base: ObjPtr, kind: TypeKind) -> Body {
    Body::Type(TypeData {
        name: name.to_owned(),
        base,
        kind,
        dict: ptr::null_mut(),
    })
}

impl BuiltinTypes {
    /// Builtin exception types published in the builtins namespace.
    pub fn exception_types(&self) -> [(&'static str, ObjPtr); 18] {
        [
            ("BaseException", self.base_exception),
            ("Exception", self.exception),
            ("ArithmeticError", self.arithmetic_error),
            ("OverflowError", self.overflow_error),
            ("LookupError", self.lookup_error),
            ("IndexError", self.index_error),
            ("KeyError", self.key_error),
            ("ValueError", self.value_error),
            ("UnicodeDecodeError", self.unicode_decode_error),
            ("TypeError", self.type_error),
            ("RuntimeError", self.runtime_error),
            ("MemoryError", self.memory_error),
            ("AttributeError", self.attribute_error),
            ("StopIteration", self.stop_iteration),
            ("BufferError", self.buffer_error),
            ("ImportError", self.import_error),
            ("SystemError", self.system_error),
            ("ReferenceError", self.reference_error),
        ]
    }

    /// Builtin value types published in the builtins namespace.
    pub fn value_types(&self) -> [(&'static str, ObjPtr); 13] {
        [
            ("object", self.object),
            ("type", self.type_),
            ("bool", self.bool_),
            ("int", self.int),
            ("float", self.float),
            ("str", self.str_),
            ("bytes", self.bytes),
            ("bytearray", self.bytearray),
            ("tuple", self.tuple),
            ("list", self.list),
            ("dict", self.dict),
            ("set", self.set),
            ("memoryview", self.memoryview),
        ]
    }
}

pub(crate) fn type_data<'a>(ty: ObjPtr) -> Option<&'a TypeData> {
    if ty.is_null() {
        return None;
    }
    match body(ty) {
        Body::Type(data) => Some(data),
        _ => None,
    }
}

/// True if `obj` is a type object.
pub fn is_type(obj: ObjPtr) -> bool {
    type_data(obj).is_some()
}

/// Storage kind of `obj`'s type.
pub fn kind_of(obj: ObjPtr) -> TypeKind {
    type_data(type_of(obj)).map_or(TypeKind::Object, |d| d.kind)
}

/// Name of a type object (`"?"` for non-types).
pub fn type_name<'a>(ty: ObjPtr) -> &'a str {
    type_data(ty).map_or("?", |d| d.name.as_str())
}

/// Name of `obj`'s type.
pub fn obj_type_name<'a>(obj: ObjPtr) -> &'a str {
    type_name(type_of(obj))
}

/// Direct base of a type (borrowed, null for `object`).
pub fn type_base(ty: ObjPtr) -> ObjPtr {
    type_data(ty).map_or(ptr::null_mut(), |d| d.base)
}

/// Attribute dict of a heap type (borrowed, null for builtin types).
pub fn type_dict(ty: ObjPtr) -> ObjPtr {
    type_data(ty).map_or(ptr::null_mut(), |d| d.dict)
}

/// True if `a` is `b` or derives from it.
pub fn is_subtype(a: ObjPtr, b: ObjPtr) -> bool {
    let mut cur = a;
    while !cur.is_null() {
        if cur == b {
            return true;
        }
        cur = type_base(cur);
    }
    false
}

/// `isinstance(obj, cls)`; `cls` may be a tuple of types. Returns -1 on error.
pub fn is_instance(obj: ObjPtr, cls: ObjPtr) -> i32 {
    if is_type(cls) {
        return i32::from(is_subtype(type_of(obj), cls));
    }
    if let Body::Tuple(items) = body(cls) {
        let items = items.borrow().clone();
        for item in items {
            match is_instance(obj, item) {
                0 => {}
                r => return r,
            }
        }
        return 0;
    }
    err::set_string(
        builtin().type_error,
        "isinstance() arg 2 must be a type or tuple of types",
    );
    -1
}

/// Create a heap type `name` deriving from `base`. `meta` defaults to the
/// metaclass of `base`. Returns a new reference or null.
pub fn type_new(name: &str, base: ObjPtr, meta: ObjPtr) -> ObjPtr {
    let b = builtin();
    let Some(base_data) = type_data(base) else {
        err::set_string(b.type_error, "bases must be types");
        return ptr::null_mut();
    };
    let kind = match base_data.kind {
        TypeKind::Object | TypeKind::Instance => TypeKind::Instance,
        TypeKind::Exception => TypeKind::Exception,
        TypeKind::Type => TypeKind::Type,
        _ => {
            err::set_string(
                b.type_error,
                &format!("type '{}' is not an acceptable base type", base_data.name),
            );
            return ptr::null_mut();
        }
    };
    let meta = if meta.is_null() { type_of(base) } else { meta };
    if !is_subtype(meta, b.type_) {
        err::set_string(b.type_error, "metaclass must be a subclass of type");
        return ptr::null_mut();
    }

    let dict = values::dict_new();
    if dict.is_null() {
        return ptr::null_mut();
    }
    object::inc_ref(base);
    object::alloc(
        meta,
        Body::Type(TypeData {
            name: name.to_owned(),
            base,
            kind,
            dict,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gil, object};

    #[test]
    fn test_exception_hierarchy() {
        let b = builtin();
        assert!(is_subtype(b.index_error, b.lookup_error));
        assert!(is_subtype(b.key_error, b.exception));
        assert!(is_subtype(b.unicode_decode_error, b.value_error));
        assert!(!is_subtype(b.value_error, b.index_error));
        assert!(is_subtype(b.bool_, b.int));
    }

    #[test]
    fn test_type_of_type_is_type() {
        let b = builtin();
        assert_eq!(type_of(b.type_), b.type_);
        assert_eq!(type_of(b.object), b.type_);
        assert_eq!(type_name(b.list), "list");
    }

    #[test]
    fn test_heap_type_subclassing() {
        let _gil = gil::acquire();
        let b = builtin();
        let custom = type_new("CustomError", b.value_error, ptr::null_mut());
        assert!(!custom.is_null());
        assert_eq!(kind_of_type(custom), TypeKind::Exception);
        assert!(is_subtype(custom, b.exception));
        object::dec_ref(custom);

        let bad = type_new("BadInt", b.int, ptr::null_mut());
        assert!(bad.is_null());
        assert!(err::exception_matches(b.type_error));
        err::clear();
    }

    fn kind_of_type(ty: ObjPtr) -> TypeKind {
        type_data(ty).map(|d| d.kind).unwrap_or(TypeKind::Object)
    }
}
