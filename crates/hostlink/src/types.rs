// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed owning references.
//!
//! Each wrapper is an [`Object`] known to satisfy a runtime type check. They
//! deref to [`Object`] (and from there to [`Handle`]), so the whole
//! [`ObjectApi`] is available on every one of them.
//!
//! Constructors that allocate report allocation failure as
//! [`Error::Fatal`]; every other runtime failure is captured as
//! [`Error::AlreadySet`].

use std::ffi::c_void;
use std::fmt;
use std::ops::Deref;

use hostlink_rt::{buffer, capsule, err, function, interp, ops, slice, types, values, weakref, ObjPtr};

use crate::accessor::{AccessKey, Accessor};
use crate::error::{self, BuiltinError, Error, Result};
use crate::handle::Handle;
use crate::iterators::{DictReadonly, Range, SequenceFastReadonly, SequenceSlowReadwrite};
use crate::object::{Object, ObjectApi, ToObject};

pub use crate::iterators::HostIterator;
pub use hostlink_rt::slice::SliceIndices;

macro_rules! host_type {
    ($(#[$meta:meta])* $name:ident, $type_name:literal, $check:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(Object);

        impl $name {
            /// True if `h` satisfies this wrapper's type check.
            pub fn check(h: Handle) -> bool {
                !h.is_null() && ($check)(h.ptr())
            }

            /// Wrap `obj`, raising `TypeError` if it fails [`Self::check`].
            pub fn try_from_object(obj: Object) -> Result<Self> {
                if Self::check(obj.handle()) {
                    Ok(Self(obj))
                } else {
                    Err(type_mismatch(obj.handle(), $type_name))
                }
            }

            #[allow(dead_code)]
            pub(crate) fn from_object_unchecked(obj: Object) -> Self {
                Self(obj)
            }

            pub fn into_object(self) -> Object {
                self.0
            }

            pub fn as_object(&self) -> &Object {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = Object;

            fn deref(&self) -> &Object {
                &self.0
            }
        }

        impl From<$name> for Object {
            fn from(value: $name) -> Object {
                value.0
            }
        }

        impl TryFrom<Object> for $name {
            type Error = Error;

            fn try_from(obj: Object) -> Result<Self> {
                Self::try_from_object(obj)
            }
        }

        impl ToObject for $name {
            fn to_object(&self) -> Result<Object> {
                Ok(self.0.clone())
            }
        }
    };
}

fn type_mismatch(h: Handle, expected: &str) -> Error {
    let actual = if h.is_null() {
        "NULL"
    } else {
        types::obj_type_name(h.ptr())
    };
    BuiltinError::Type(format!(
        "Object of type '{actual}' is not an instance of '{expected}'"
    ))
    .into()
}

fn static_object(ptr: ObjPtr) -> Object {
    Object::borrow(Handle::from_static(ptr))
}

// ============================================================================
// Scalars
// ============================================================================

host_type!(
    /// The `None` singleton.
    NoneObject, "NoneType", values::is_none
);

impl NoneObject {
    pub fn new() -> Self {
        Self(static_object(values::none()))
    }
}

impl Default for NoneObject {
    fn default() -> Self {
        Self::new()
    }
}

host_type!(Bool, "bool", values::is_bool);

impl Bool {
    pub fn new(value: bool) -> Self {
        Self(static_object(values::bool_from(value)))
    }

    /// `bool(obj)`.
    pub fn from_object(h: Handle) -> Result<Self> {
        Ok(Self::new(h.truthy()?))
    }

    pub fn value(&self) -> bool {
        self.ptr() == hostlink_rt::builtin().true_
    }
}

host_type!(Int, "int", values::is_int);

impl Int {
    pub fn new(value: i64) -> Result<Self> {
        error::alloc_ref(values::int_from_i64(value), "int").map(Self)
    }

    /// Values above `i64::MAX` raise `OverflowError`.
    pub fn from_u64(value: u64) -> Result<Self> {
        error::alloc_ref(values::int_from_u64(value), "int").map(Self)
    }

    /// `int(obj)`.
    pub fn from_object(h: Handle) -> Result<Self> {
        error::new_ref(ops::number_long(h.ptr())).map(Self)
    }

    pub fn to_i64(&self) -> Result<i64> {
        let v = ops::long_as_i64(self.ptr());
        if v == -1 && !err::occurred().is_null() {
            return Err(Error::fetch());
        }
        Ok(v)
    }

    /// Negative values raise `OverflowError`.
    pub fn to_u64(&self) -> Result<u64> {
        let v = ops::long_as_u64(self.ptr());
        if v == u64::MAX && !err::occurred().is_null() {
            return Err(Error::fetch());
        }
        Ok(v)
    }
}

host_type!(Float, "float", values::is_float);

impl Float {
    pub fn new(value: f64) -> Result<Self> {
        error::alloc_ref(values::float_from_f64(value), "float").map(Self)
    }

    /// `float(obj)`.
    pub fn from_object(h: Handle) -> Result<Self> {
        error::new_ref(ops::number_float(h.ptr())).map(Self)
    }

    pub fn value(&self) -> f64 {
        ops::float_as_f64(self.ptr())
    }
}

// ============================================================================
// Text and binary
// ============================================================================

host_type!(
    /// A host `str`.
    Str, "str", values::is_str
);

impl Str {
    pub fn new(text: &str) -> Result<Self> {
        error::alloc_ref(values::str_from_str(text), "string").map(Self)
    }

    /// `str(obj)`.
    pub fn from_object(h: Handle) -> Result<Self> {
        error::new_ref(ops::object_str(h.ptr())).map(Self)
    }

    /// Decode UTF-8 bytes; invalid input raises `UnicodeDecodeError`.
    pub fn from_bytes(bytes: &Bytes) -> Result<Self> {
        error::new_ref(values::str_from_utf8(bytes.as_bytes())).map(Self)
    }

    pub fn as_str(&self) -> &str {
        values::str_as_str(self.ptr()).unwrap_or_default()
    }

    /// UTF-8 encode into a new `bytes` object.
    pub fn encode(&self) -> Result<Bytes> {
        error::alloc_ref(values::str_encode_utf8(self.ptr()), "bytes").map(Bytes)
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

host_type!(Bytes, "bytes", values::is_bytes);

impl Bytes {
    pub fn new(data: &[u8]) -> Result<Self> {
        error::alloc_ref(values::bytes_from_slice(data), "bytes").map(Self)
    }

    pub fn from_text(text: &Str) -> Result<Self> {
        text.encode()
    }

    pub fn as_bytes(&self) -> &[u8] {
        values::bytes_as_slice(self.ptr()).unwrap_or_default()
    }
}

host_type!(ByteArray, "bytearray", values::is_bytearray);

impl ByteArray {
    pub fn new(data: &[u8]) -> Result<Self> {
        error::alloc_ref(values::bytearray_from_slice(data), "bytearray").map(Self)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        values::bytearray_to_vec(self.ptr()).unwrap_or_default()
    }
}

// ============================================================================
// Containers
// ============================================================================

fn fast_range<'a>(h: Handle) -> Range<SequenceFastReadonly<'a>> {
    let begin = ops::sequence_fast_items(h.ptr());
    let len = ops::sequence_fast_size(h.ptr()).max(0) as usize;
    Range::new(
        SequenceFastReadonly::new(begin),
        SequenceFastReadonly::new(begin.wrapping_add(len)),
    )
}

host_type!(Tuple, "tuple", values::is_tuple);

impl Tuple {
    pub fn new() -> Result<Self> {
        Self::with_len(0)
    }

    /// Tuple of `len` slots, each `None`.
    pub fn with_len(len: usize) -> Result<Self> {
        error::alloc_ref(values::tuple_new(len), "tuple").map(Self)
    }

    pub fn from_objects(items: &[Object]) -> Result<Self> {
        let raw = items.iter().map(|o| o.clone().release().ptr()).collect();
        error::alloc_ref(values::tuple_from_vec(raw), "tuple").map(Self)
    }

    pub fn len(&self) -> usize {
        values::tuple_size(self.ptr()).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot `index` (no negative wrapping).
    pub fn get(&self, index: isize) -> Accessor<'_> {
        Accessor::new(self.handle(), AccessKey::TupleItem(index))
    }

    pub fn iter(&self) -> Range<SequenceFastReadonly<'_>> {
        fast_range(self.handle())
    }
}

host_type!(List, "list", values::is_list);

impl List {
    pub fn new() -> Result<Self> {
        Self::with_len(0)
    }

    /// List of `len` slots, each `None`.
    pub fn with_len(len: usize) -> Result<Self> {
        error::alloc_ref(values::list_new(len), "list").map(Self)
    }

    pub fn len(&self) -> usize {
        values::list_size(self.ptr()).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot `index` (no negative wrapping).
    pub fn get(&self, index: isize) -> Accessor<'_> {
        Accessor::new(self.handle(), AccessKey::ListItem(index))
    }

    pub fn append(&self, value: impl ToObject) -> Result<()> {
        let value = value.to_object()?;
        error::status(ops::list_append(self.ptr(), value.ptr()))
    }

    pub fn insert(&self, index: isize, value: impl ToObject) -> Result<()> {
        let value = value.to_object()?;
        error::status(ops::list_insert(self.ptr(), index, value.ptr()))
    }

    /// The list must not grow or shrink while the range is in use.
    pub fn iter(&self) -> Range<SequenceFastReadonly<'_>> {
        fast_range(self.handle())
    }
}

host_type!(Dict, "dict", values::is_dict);

impl Dict {
    pub fn new() -> Result<Self> {
        error::alloc_ref(values::dict_new(), "dict").map(Self)
    }

    pub fn len(&self) -> usize {
        values::dict_size(self.ptr()).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: impl ToObject) -> Result<bool> {
        let key = key.to_object()?;
        error::flag(values::dict_contains(self.ptr(), key.ptr()))
    }

    pub fn set_item(&self, key: impl ToObject, value: impl ToObject) -> Result<()> {
        let key = key.to_object()?;
        let value = value.to_object()?;
        error::status(values::dict_set_item(self.ptr(), key.ptr(), value.ptr()))
    }

    /// `None` when the key is absent.
    pub fn get_item(&self, key: impl ToObject) -> Result<Option<Object>> {
        let key = key.to_object()?;
        let found = values::dict_get_item(self.ptr(), key.ptr());
        if found.is_null() {
            if err::occurred().is_null() {
                return Ok(None);
            }
            return Err(Error::fetch());
        }
        error::borrowed_ref(found).map(Some)
    }

    /// Missing keys raise `KeyError`.
    pub fn del_item(&self, key: impl ToObject) -> Result<()> {
        let key = key.to_object()?;
        error::status(values::dict_del_item(self.ptr(), key.ptr()))
    }

    pub fn clear(&self) {
        values::dict_clear(self.ptr());
    }

    pub fn keys(&self) -> Result<List> {
        error::alloc_ref(values::dict_keys(self.ptr()), "list").map(List)
    }

    /// `(key, value)` pairs, borrowed from the dict.
    pub fn iter(&self) -> Range<DictReadonly<'_>> {
        Range::new(DictReadonly::begin(self.handle()), DictReadonly::end(self.handle()))
    }
}

host_type!(Set, "set", values::is_set);

impl Set {
    pub fn new() -> Result<Self> {
        error::alloc_ref(values::set_new(), "set").map(Self)
    }

    pub fn len(&self) -> usize {
        values::set_size(self.ptr()).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, key: impl ToObject) -> Result<()> {
        let key = key.to_object()?;
        error::status(values::set_add(self.ptr(), key.ptr()))
    }

    pub fn contains(&self, key: impl ToObject) -> Result<bool> {
        let key = key.to_object()?;
        error::flag(values::set_contains(self.ptr(), key.ptr()))
    }

    /// True if the key was present.
    pub fn discard(&self, key: impl ToObject) -> Result<bool> {
        let key = key.to_object()?;
        error::flag(values::set_discard(self.ptr(), key.ptr()))
    }
}

host_type!(
    /// Anything implementing the sequence protocol.
    Sequence, "sequence", ops::sequence_check
);

impl Sequence {
    pub fn len(&self) -> Result<usize> {
        error::size(ops::sequence_size(self.ptr()))
    }

    /// Item `index`; negative indices wrap.
    pub fn get(&self, index: isize) -> Accessor<'_> {
        Accessor::new(self.handle(), AccessKey::SequenceItem(index))
    }

    /// Read-write range over the current length.
    pub fn iter(&self) -> Result<Range<SequenceSlowReadwrite<'_>>> {
        let len = self.len()? as isize;
        Ok(Range::new(
            SequenceSlowReadwrite::new(self.handle(), 0),
            SequenceSlowReadwrite::new(self.handle(), len),
        ))
    }
}

fn is_iterable(ptr: ObjPtr) -> bool {
    let it = ops::get_iter(ptr);
    if it.is_null() {
        err::clear();
        return false;
    }
    hostlink_rt::dec_ref(it);
    true
}

host_type!(
    /// Anything `iter()` accepts.
    Iterable, "iterable", is_iterable
);

// ============================================================================
// Capsule
// ============================================================================

type BoxedDestructor = Box<dyn FnOnce(*mut c_void)>;

/// Runs the closure stashed in the capsule context. The error indicator is
/// preserved across the call.
fn run_boxed_destructor(cap: ObjPtr) {
    let (ty, value, trace) = err::fetch();
    let context = capsule::capsule_get_context(cap);
    let name = capsule::capsule_name(cap);
    let pointer = capsule::capsule_get_pointer(cap, name.as_deref());
    if context.is_null() || pointer.is_null() {
        err::clear();
    } else {
        // SAFETY: installed by `Capsule::with_destructor`, consumed once.
        let destructor = unsafe { Box::from_raw(context.cast::<BoxedDestructor>()) };
        destructor(pointer);
    }
    err::restore(ty, value, trace);
}

host_type!(
    /// Opaque pointer carrier.
    Capsule, "capsule", capsule::is_capsule
);

impl Capsule {
    /// Capsule without a destructor. A null `pointer` raises `ValueError`.
    pub fn new(pointer: *mut c_void, name: Option<&str>) -> Result<Self> {
        error::alloc_ref(capsule::capsule_new(pointer, name, None), "capsule").map(Self)
    }

    /// Capsule that calls `destructor(pointer)` when it dies.
    ///
    /// The runtime only stores plain function pointers, so the closure is
    /// boxed into the capsule context and run from a trampoline.
    pub fn with_destructor(
        pointer: *mut c_void,
        name: Option<&str>,
        destructor: impl FnOnce(*mut c_void) + 'static,
    ) -> Result<Self> {
        let cap = error::alloc_ref(
            capsule::capsule_new(pointer, name, Some(run_boxed_destructor)),
            "capsule",
        )?;
        let boxed: Box<BoxedDestructor> = Box::new(Box::new(destructor));
        let context = Box::into_raw(boxed).cast::<c_void>();
        if let Err(e) = error::status(capsule::capsule_set_context(cap.ptr(), context)) {
            // SAFETY: not handed over.
            drop(unsafe { Box::from_raw(context.cast::<BoxedDestructor>()) });
            return Err(e);
        }
        Ok(Self(cap))
    }

    /// Move `value` to the heap; it is dropped with the capsule.
    pub fn from_value<T: 'static>(value: T, name: Option<&str>) -> Result<Self> {
        let pointer = Box::into_raw(Box::new(value)).cast::<c_void>();
        let result = Self::with_destructor(pointer, name, move |p| {
            // SAFETY: `p` is the `Box<T>` leaked above.
            drop(unsafe { Box::from_raw(p.cast::<T>()) });
        });
        if result.is_err() {
            // SAFETY: no capsule owns the value; reclaim it.
            drop(unsafe { Box::from_raw(pointer.cast::<T>()) });
        }
        result
    }

    /// Stored pointer, checked against the capsule's own name.
    pub fn pointer(&self) -> Result<*mut c_void> {
        let name = self.name();
        let p = capsule::capsule_get_pointer(self.ptr(), name.as_deref());
        if p.is_null() {
            return Err(Error::fetch());
        }
        Ok(p)
    }

    pub fn set_pointer(&self, pointer: *mut c_void) -> Result<()> {
        error::status(capsule::capsule_set_pointer(self.ptr(), pointer))
    }

    pub fn name(&self) -> Option<String> {
        capsule::capsule_name(self.ptr())
    }

    pub fn set_name(&self, name: Option<&str>) -> Result<()> {
        error::status(capsule::capsule_set_name(self.ptr(), name))
    }

    /// Reference to a value stored with [`Capsule::from_value`].
    ///
    /// # Safety
    ///
    /// The capsule must have been created by `from_value::<T>` and its
    /// pointer left unchanged.
    pub unsafe fn value_ref<T>(&self) -> Result<&T> {
        Ok(&*self.pointer()?.cast::<T>())
    }
}

// ============================================================================
// Slice / WeakRef
// ============================================================================

host_type!(Slice, "slice", slice::is_slice);

impl Slice {
    /// `slice(start, stop, step)`; `None` components are open.
    pub fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Result<Self> {
        let part = |v: Option<isize>| v.map(|v| v.to_object()).transpose();
        let (start, stop, step) = (part(start)?, part(stop)?, part(step)?);
        let raw = |o: &Option<Object>| o.as_ref().map_or(std::ptr::null_mut(), |o| o.ptr());
        error::alloc_ref(slice::slice_new(raw(&start), raw(&stop), raw(&step)), "slice").map(Self)
    }

    /// Resolve against a sequence of `length` items. A zero step raises
    /// `ValueError`.
    pub fn compute(&self, length: usize) -> Result<SliceIndices> {
        slice::get_indices(self.ptr(), length).ok_or_else(Error::fetch)
    }
}

host_type!(WeakRef, "weakref", weakref::is_weakref);

impl WeakRef {
    /// Weak reference to `target`; `callback` runs when the target dies.
    pub fn new(target: Handle, callback: Option<Handle>) -> Result<Self> {
        let callback = callback.map_or(std::ptr::null_mut(), Handle::ptr);
        error::new_ref(weakref::weakref_new(target.ptr(), callback)).map(Self)
    }

    /// New reference to the target, or `None` once it has died.
    pub fn get(&self) -> Result<Object> {
        error::borrowed_ref(weakref::weakref_get_object(self.ptr()))
    }
}

// ============================================================================
// Buffers
// ============================================================================

host_type!(
    /// Any buffer exporter.
    Buffer, "buffer", buffer::check_buffer
);

impl Buffer {
    /// Export the buffer. Requesting write access to a read-only exporter
    /// raises `BufferError`.
    pub fn request(&self, writable: bool) -> Result<BufferInfo> {
        buffer::get_buffer(self.ptr(), writable)
            .map(|view| BufferInfo { view })
            .ok_or_else(Error::fetch)
    }
}

/// An exported buffer; keeps the exporter alive.
#[derive(Debug)]
pub struct BufferInfo {
    view: buffer::BufferView,
}

impl BufferInfo {
    pub fn ptr(&self) -> *mut u8 {
        self.view.buf
    }

    /// Total size in bytes.
    pub fn size(&self) -> usize {
        self.view.len
    }

    pub fn itemsize(&self) -> usize {
        self.view.itemsize
    }

    pub fn format(&self) -> &str {
        &self.view.format
    }

    pub fn ndim(&self) -> usize {
        self.view.ndim()
    }

    pub fn shape(&self) -> &[isize] {
        &self.view.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.view.strides
    }

    pub fn readonly(&self) -> bool {
        self.view.readonly
    }

    /// Copy out in logical order.
    pub fn to_vec(&self) -> Vec<u8> {
        self.view.to_vec()
    }
}

host_type!(
    MemoryView, "memoryview",
    |p| hostlink_rt::type_of(p) == hostlink_rt::builtin().memoryview
);

impl MemoryView {
    /// `memoryview(obj)`.
    pub fn from_object(h: Handle) -> Result<Self> {
        error::new_ref(buffer::memoryview_from_object(h.ptr())).map(Self)
    }

    /// One-dimensional view of raw memory.
    ///
    /// # Safety
    ///
    /// `buf..buf+len` must stay valid (and unaliased by writers when
    /// `readonly`) for as long as the view or anything exported from it lives.
    pub unsafe fn from_memory(buf: *mut u8, len: usize, readonly: bool) -> Result<Self> {
        error::new_ref(buffer::memoryview_from_memory(buf, len, readonly)).map(Self)
    }

    /// Strided view of raw memory.
    ///
    /// # Safety
    ///
    /// Every item addressed by `shape`/`strides` from `buf` must stay valid
    /// for as long as the view or anything exported from it lives.
    pub unsafe fn from_buffer(
        buf: *mut u8,
        itemsize: usize,
        format: &str,
        shape: &[isize],
        strides: &[isize],
        readonly: bool,
    ) -> Result<Self> {
        error::new_ref(buffer::memoryview_from_buffer(
            buf, itemsize, format, shape, strides, readonly,
        ))
        .map(Self)
    }

    pub fn tobytes(&self) -> Result<Bytes> {
        error::new_ref(buffer::memoryview_tobytes(self.ptr())).map(Bytes)
    }

    /// Drop the exported view early; later access raises `ValueError`.
    pub fn release(&self) {
        buffer::memoryview_release(self.ptr());
    }
}

// ============================================================================
// Modules and functions
// ============================================================================

host_type!(Module, "module", interp::is_module);

impl Module {
    pub fn new(name: &str) -> Result<Self> {
        error::alloc_ref(interp::module_new(name), "module").map(Self)
    }

    /// `import name`.
    pub fn import(name: &str) -> Result<Self> {
        error::new_ref(interp::import_module(name)).map(Self)
    }

    pub fn name(&self) -> Option<String> {
        interp::module_name(self.ptr())
    }

    /// The module namespace.
    pub fn dict(&self) -> Result<Dict> {
        error::borrowed_ref(interp::module_dict(self.ptr())).map(Dict)
    }

    /// `module.name = value`.
    pub fn add_object(&self, name: &str, value: impl ToObject) -> Result<()> {
        self.attr(name).set(value)
    }

    /// Bind a native function as `module.name`.
    pub fn def(
        &self,
        name: &str,
        f: impl Fn(&Tuple, Option<&Dict>) -> std::result::Result<Object, crate::translate::Fault>
            + 'static,
    ) -> Result<&Self> {
        let func = crate::function::native_function(name, f)?;
        self.add_object(name, &func)?;
        Ok(self)
    }
}

host_type!(Function, "function", |p| hostlink_rt::type_of(p) == hostlink_rt::builtin().function);

impl Function {
    /// Functions backed by native code (every function this runtime knows).
    pub fn is_native(&self) -> bool {
        function::is_function(self.ptr())
    }

    pub fn name(&self) -> Option<String> {
        function::function_name(self.ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_rt::{builtin, gil, object::fault};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_str_bytes_round_trip() {
        let _gil = gil::acquire();
        let text = Str::new("Hello, World!").unwrap();
        let bytes = Bytes::from_text(&text).unwrap();
        assert_eq!(bytes.as_bytes(), b"Hello, World!");
        let back = Str::from_bytes(&bytes).unwrap();
        assert_eq!(back.as_str(), "Hello, World!");
    }

    #[test]
    fn test_invalid_utf8_raises() {
        let _gil = gil::acquire();
        let bytes = Bytes::new(&[0xff, 0xfe]).unwrap();
        let e = Str::from_bytes(&bytes).unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().unicode_decode_error)));
    }

    #[test]
    fn test_allocation_failure_is_fatal() {
        let _gil = gil::acquire();
        fault::fail_next_allocations(1);
        let e = Str::new("x").unwrap_err();
        assert!(matches!(e, Error::Fatal(ref m) if m == "Could not allocate string object!"));
        fault::fail_next_allocations(1);
        assert!(matches!(Dict::new(), Err(Error::Fatal(_))));
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_numeric_conversions() {
        let _gil = gil::acquire();
        let text = Str::new("42").unwrap();
        assert_eq!(Int::from_object(text.handle()).unwrap().to_i64().unwrap(), 42);
        assert!((Float::from_object(text.handle()).unwrap().value() - 42.0).abs() < f64::EPSILON);

        let negative = Int::new(-1).unwrap();
        assert!(negative.to_u64().is_err());
        assert!(Int::from_u64(u64::MAX).is_err());

        assert!(!Bool::from_object(Str::new("").unwrap().handle()).unwrap().value());
        assert!(Bool::new(true).value());
    }

    #[test]
    fn test_try_from_object_checks_type() {
        let _gil = gil::acquire();
        let list = List::new().unwrap();
        let e = Tuple::try_from_object(list.clone().into_object()).unwrap_err();
        assert_eq!(e.to_string(), "Object of type 'list' is not an instance of 'tuple'");
        assert!(Sequence::try_from_object(list.clone().into_object()).is_ok());
        assert!(Iterable::try_from_object(list.into_object()).is_ok());
        assert!(err::occurred().is_null());
        assert!(!Iterable::check(NoneObject::new().handle()));
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_set_operations() {
        let _gil = gil::acquire();
        let set = Set::new().unwrap();
        set.add("a").unwrap();
        set.add("a").unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("a").unwrap());
        assert!(set.discard("a").unwrap());
        assert!(!set.discard("a").unwrap());
        assert!(set.add(List::new().unwrap()).is_err());
    }

    #[test]
    fn test_dict_get_item_absent_is_none() {
        let _gil = gil::acquire();
        let dict = Dict::new().unwrap();
        assert!(dict.get_item("missing").unwrap().is_none());
        dict.set_item("k", 1i64).unwrap();
        assert!(dict.get_item("k").unwrap().is_some());
        assert_eq!(dict.keys().unwrap().len(), 1);
        dict.clear();
        assert!(dict.is_empty());
    }

    #[test]
    fn test_capsule_destructor_runs_once() {
        let _gil = gil::acquire();
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        let mut payload = 5u32;
        let cap = Capsule::with_destructor(
            (&mut payload as *mut u32).cast(),
            Some("sample"),
            move |_| seen.set(seen.get() + 1),
        )
        .unwrap();
        assert_eq!(cap.name().as_deref(), Some("sample"));
        assert!(!cap.pointer().unwrap().is_null());
        let copy = cap.clone();
        drop(cap);
        assert_eq!(hits.get(), 0);
        drop(copy);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_capsule_from_value() {
        let _gil = gil::acquire();
        let cap = Capsule::from_value(String::from("kept"), None).unwrap();
        // SAFETY: created by `from_value::<String>`.
        let value = unsafe { cap.value_ref::<String>() }.unwrap();
        assert_eq!(value, "kept");
        assert!(Capsule::new(std::ptr::null_mut(), None).is_err());
    }

    #[test]
    fn test_slice_compute() {
        let _gil = gil::acquire();
        let s = Slice::new(Some(1), None, Some(2)).unwrap();
        let idx = s.compute(6).unwrap();
        assert_eq!((idx.start, idx.stop, idx.step, idx.length), (1, 6, 2, 3));

        let zero = Slice::new(None, None, Some(0)).unwrap();
        let e = zero.compute(3).unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().value_error)));
    }

    #[test]
    fn test_weakref_dies_with_target() {
        let _gil = gil::acquire();
        let module = Module::new("target").unwrap();
        let wr = WeakRef::new(module.handle(), None).unwrap();
        assert!(wr.get().unwrap().is(module.handle()));
        drop(module);
        assert!(wr.get().unwrap().is_none());
        assert!(WeakRef::new(Int::new(1).unwrap().handle(), None).is_err());
    }

    #[test]
    fn test_buffer_request() {
        let _gil = gil::acquire();
        let bytes = Buffer::try_from_object(Bytes::new(b"abc").unwrap().into_object()).unwrap();
        let info = bytes.request(false).unwrap();
        assert_eq!(info.size(), 3);
        assert!(info.readonly());
        assert_eq!(info.format(), "B");
        let e = bytes.request(true).unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().buffer_error)));

        let array = Buffer::try_from_object(ByteArray::new(&[1, 2]).unwrap().into_object()).unwrap();
        assert!(!array.request(true).unwrap().readonly());
    }

    #[test]
    fn test_memoryview_over_raw_memory() {
        let _gil = gil::acquire();
        let mut grid = [1u8, 2, 3, 4];
        // SAFETY: `grid` outlives the view.
        let mv = unsafe { MemoryView::from_buffer(grid.as_mut_ptr(), 1, "B", &[2], &[2], true) }.unwrap();
        assert_eq!(mv.tobytes().unwrap().as_bytes(), [1, 3]);
        mv.release();
        assert!(mv.tobytes().is_err());
    }

    #[test]
    fn test_module_attributes() {
        let _gil = gil::acquire();
        let module = Module::new("plugin").unwrap();
        assert_eq!(module.name().as_deref(), Some("plugin"));
        module.add_object("answer", 42i64).unwrap();
        assert!(module.dict().unwrap().contains("answer").unwrap());
    }
}
