// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Owning references and the shared object API.
//!
//! # Ownership
//!
//! ```text
//! Object::borrow(handle)   +1, shares an existing reference
//! Object::steal(ptr)        0, adopts a reference the caller owned
//! clone()                  +1
//! move                      0 (plain Rust move, source is gone)
//! drop                     -1 (no-op on null)
//! release()                 0, hands the reference back as a Handle
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::ops::Deref;

use hostlink_rt::{ops, refcount, type_of, types, values, ObjPtr};

use crate::accessor::{AccessKey, Accessor};
use crate::error::{self, Result};
use crate::handle::Handle;
use crate::iterators::HostIterator;
use crate::types::{Dict, Str};

/// An owning, reference-counted host object reference.
pub struct Object {
    handle: Handle,
}

impl Object {
    /// The null reference. Dropping it is a no-op.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self {
            handle: Handle::null(),
        }
    }

    /// Take a new reference to `handle` (increments).
    #[inline]
    #[must_use]
    pub fn borrow(handle: Handle) -> Self {
        Self {
            handle: handle.inc_ref(),
        }
    }

    /// Adopt a reference the caller owns (no increment).
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live object for which the caller owns one
    /// reference; that reference now belongs to the returned `Object`.
    #[inline]
    #[must_use]
    pub unsafe fn steal(ptr: ObjPtr) -> Self {
        Self {
            handle: Handle::from_ptr(ptr),
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Give up ownership without decrementing; the caller (usually the
    /// runtime, through a stealing call) now owns the reference.
    #[inline]
    #[must_use = "the released reference leaks unless handed on"]
    pub fn release(self) -> Handle {
        let handle = self.handle;
        mem::forget(self);
        handle
    }

    /// Move the reference out, leaving null behind.
    #[inline]
    pub fn take(&mut self) -> Object {
        mem::replace(self, Object::null())
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::null()
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        Self::borrow(self.handle)
    }

    fn clone_from(&mut self, source: &Self) {
        // Increment first: `source` may be the last owner of our old value.
        source.handle.inc_ref();
        let old = mem::replace(&mut self.handle, source.handle);
        old.dec_ref();
    }
}

impl Drop for Object {
    #[inline]
    fn drop(&mut self) {
        self.handle.dec_ref();
    }
}

impl Deref for Object {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        &self.handle
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Hash::hash(&self.handle, state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.handle).finish()
    }
}

// ============================================================================
// ToObject
// ============================================================================

/// Conversion of native values into (new) host object references.
pub trait ToObject {
    fn to_object(&self) -> Result<Object>;
}

impl<T: ToObject + ?Sized> ToObject for &T {
    fn to_object(&self) -> Result<Object> {
        (**self).to_object()
    }
}

impl ToObject for Object {
    fn to_object(&self) -> Result<Object> {
        Ok(self.clone())
    }
}

impl ToObject for Handle {
    fn to_object(&self) -> Result<Object> {
        Ok(Object::borrow(*self))
    }
}

impl ToObject for str {
    fn to_object(&self) -> Result<Object> {
        error::alloc_ref(values::str_from_str(self), "string")
    }
}

impl ToObject for String {
    fn to_object(&self) -> Result<Object> {
        self.as_str().to_object()
    }
}

impl ToObject for i64 {
    fn to_object(&self) -> Result<Object> {
        error::alloc_ref(values::int_from_i64(*self), "int")
    }
}

impl ToObject for i32 {
    fn to_object(&self) -> Result<Object> {
        i64::from(*self).to_object()
    }
}

impl ToObject for isize {
    fn to_object(&self) -> Result<Object> {
        (*self as i64).to_object()
    }
}

impl ToObject for u64 {
    fn to_object(&self) -> Result<Object> {
        error::alloc_ref(values::int_from_u64(*self), "int")
    }
}

impl ToObject for usize {
    fn to_object(&self) -> Result<Object> {
        (*self as u64).to_object()
    }
}

impl ToObject for f64 {
    fn to_object(&self) -> Result<Object> {
        error::alloc_ref(values::float_from_f64(*self), "float")
    }
}

impl ToObject for bool {
    fn to_object(&self) -> Result<Object> {
        Ok(Object::borrow(Handle::from_static(values::bool_from(*self))))
    }
}

impl ToObject for () {
    fn to_object(&self) -> Result<Object> {
        Ok(Object::borrow(Handle::from_static(values::none())))
    }
}

// ============================================================================
// ObjectApi
// ============================================================================

/// Operations shared by every handle-like type.
///
/// Methods that touch the runtime expect the GIL to be held.
pub trait ObjectApi {
    fn handle(&self) -> Handle;

    /// `obj.name` as an accessor.
    fn attr<'a>(&'a self, name: &str) -> Accessor<'a> {
        Accessor::new(self.handle(), AccessKey::StrAttr(name.to_owned()))
    }

    /// `obj.<name>` with an object key.
    fn attr_obj<'a>(&'a self, name: Handle) -> Accessor<'a> {
        Accessor::new(self.handle(), AccessKey::Attr(Object::borrow(name)))
    }

    /// `obj[key]` as an accessor.
    fn item<'a>(&'a self, key: impl ToObject) -> Result<Accessor<'a>> {
        Ok(Accessor::new(self.handle(), AccessKey::Item(key.to_object()?)))
    }

    /// `obj[index]` through the sequence protocol.
    fn index<'a>(&'a self, index: isize) -> Accessor<'a> {
        Accessor::new(self.handle(), AccessKey::SequenceItem(index))
    }

    fn get_type(&self) -> Object {
        Object::borrow(Handle::from_static_or_heap(type_of(self.handle().ptr())))
    }

    /// Identity comparison.
    fn is(&self, other: Handle) -> bool {
        self.handle() == other
    }

    fn is_none(&self) -> bool {
        values::is_none(self.handle().ptr())
    }

    fn call0(&self) -> Result<Object> {
        error::new_ref(ops::call(self.handle().ptr(), std::ptr::null_mut(), std::ptr::null_mut()))
    }

    fn call1(&self, arg: impl ToObject) -> Result<Object> {
        let arg = arg.to_object()?;
        error::new_ref(ops::call_one(self.handle().ptr(), arg.ptr()))
    }

    /// `obj(*args)`.
    fn call(&self, args: &[Object]) -> Result<Object> {
        self.call_with(args, None)
    }

    /// `obj(*args, **kwargs)`.
    fn call_with(&self, args: &[Object], kwargs: Option<&Dict>) -> Result<Object> {
        let args = crate::types::Tuple::from_objects(args)?;
        let kwargs = kwargs.map_or(std::ptr::null_mut(), |k| k.ptr());
        error::new_ref(ops::call(self.handle().ptr(), args.ptr(), kwargs))
    }

    /// `obj.name(*args)`.
    fn call_method(&self, name: &str, args: &[Object]) -> Result<Object> {
        let args = crate::types::Tuple::from_objects(args)?;
        error::new_ref(ops::call_method(self.handle().ptr(), name, args.ptr()))
    }

    /// `item in obj`.
    fn contains(&self, item: impl ToObject) -> Result<bool> {
        let item = item.to_object()?;
        error::flag(ops::contains(self.handle().ptr(), item.ptr()))
    }

    /// `str(obj)`.
    fn str(&self) -> Result<Str> {
        let text = error::new_ref(ops::object_str(self.handle().ptr()))?;
        Ok(Str::from_object_unchecked(text))
    }

    /// `repr(obj)`.
    fn repr(&self) -> Result<Str> {
        let text = error::new_ref(ops::object_repr(self.handle().ptr()))?;
        Ok(Str::from_object_unchecked(text))
    }

    /// `len(obj)`.
    fn len(&self) -> Result<usize> {
        error::size(ops::length(self.handle().ptr()))
    }

    /// `iter(obj)`.
    fn iter(&self) -> Result<HostIterator> {
        let it = error::new_ref(ops::get_iter(self.handle().ptr()))?;
        Ok(HostIterator::from_object_unchecked(it))
    }

    /// `hash(obj)`.
    fn hash_value(&self) -> Result<i64> {
        let h = ops::object_hash(self.handle().ptr());
        if h == -1 {
            return Err(crate::Error::fetch());
        }
        Ok(h)
    }

    fn ref_count(&self) -> isize {
        refcount(self.handle().ptr())
    }

    /// `isinstance(obj, ty)`.
    fn is_instance(&self, ty: Handle) -> Result<bool> {
        error::flag(types::is_instance(self.handle().ptr(), ty.ptr()))
    }

    /// `obj == other`.
    fn equal(&self, other: impl ToObject) -> Result<bool> {
        let other = other.to_object()?;
        error::flag(ops::rich_eq(self.handle().ptr(), other.ptr()))
    }

    /// `bool(obj)`.
    fn truthy(&self) -> Result<bool> {
        error::flag(ops::is_true(self.handle().ptr()))
    }
}

impl ObjectApi for Handle {
    fn handle(&self) -> Handle {
        *self
    }
}

impl ObjectApi for Object {
    fn handle(&self) -> Handle {
        self.handle
    }
}

impl Handle {
    /// Wrap the type of a live object: builtin types are immortal, heap
    /// types are kept alive by their instances.
    pub(crate) fn from_static_or_heap(ty: ObjPtr) -> Handle {
        // SAFETY: `ty` is the type slot of a live object.
        unsafe { Handle::from_ptr(ty) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_rt::{builtin, gil};

    fn fresh_list() -> Object {
        // SAFETY: `list_new` returns a new reference.
        unsafe { Object::steal(values::list_new(0)) }
    }

    #[test]
    fn test_borrow_and_steal() {
        let _gil = gil::acquire();
        let list = fresh_list();
        assert_eq!(list.ref_count(), 1);
        let shared = Object::borrow(list.handle());
        assert_eq!(list.ref_count(), 2);
        drop(shared);
        assert_eq!(list.ref_count(), 1);
    }

    #[test]
    fn test_clone_and_clone_from() {
        let _gil = gil::acquire();
        let a = fresh_list();
        let b = fresh_list();
        let mut c = a.clone();
        assert_eq!(a.ref_count(), 2);

        c.clone_from(&b);
        assert_eq!(a.ref_count(), 1);
        assert_eq!(b.ref_count(), 2);

        // Self-assignment keeps the value alive.
        let alias = c.clone();
        c.clone_from(&alias);
        assert_eq!(b.ref_count(), 3);
        assert!(c.is(b.handle()));
    }

    #[test]
    fn test_release_hands_over_reference() {
        let _gil = gil::acquire();
        let list = fresh_list();
        let keep = list.clone();
        let raw = list.release();
        assert_eq!(keep.ref_count(), 2);
        raw.dec_ref();
        assert_eq!(keep.ref_count(), 1);
    }

    #[test]
    fn test_take_leaves_null() {
        let _gil = gil::acquire();
        let mut list = fresh_list();
        let moved = list.take();
        assert!(list.is_null());
        assert_eq!(moved.ref_count(), 1);
        drop(list);
        assert_eq!(moved.ref_count(), 1);
    }

    #[test]
    fn test_object_api_basics() {
        let _gil = gil::acquire();
        let text = "abc".to_object().unwrap();
        assert_eq!(text.len().unwrap(), 3);
        assert!(text.contains("b").unwrap());
        assert!(text.get_type().is(Handle::from_static(builtin().str_)));
        assert!(text.is_instance(Handle::from_static(builtin().str_)).unwrap());
        assert!(text.equal("abc").unwrap());
        assert!(!().to_object().unwrap().truthy().unwrap());
        assert_eq!(text.repr().unwrap().as_str(), "'abc'");
    }

    #[test]
    fn test_call_method_prepends_self() {
        let _gil = gil::acquire();
        // SAFETY: both calls return new references.
        let ty = unsafe {
            Object::steal(types::type_new("Counter", builtin().object, std::ptr::null_mut()))
        };
        let count = unsafe {
            Object::steal(hostlink_rt::function::function_new("count", |args, _kwargs| {
                values::int_from_i64(ops::length(args) as i64)
            }))
        };
        ty.attr("count").set(&count).unwrap();

        let instance = ty.call0().unwrap();
        let n = instance.call_method("count", &[1i64.to_object().unwrap()]).unwrap();
        assert_eq!(ops::long_as_i64(n.ptr()), 2);
    }

    #[test]
    fn test_unhashable_raises() {
        let _gil = gil::acquire();
        let list = fresh_list();
        let e = list.hash_value().unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().type_error)));
    }

    #[test]
    fn test_rust_hash_is_identity_host_hash_is_value() {
        let _gil = gil::acquire();
        let a = "key".to_object().unwrap();
        let b = a.clone();
        let c = Str::new("key").unwrap().into_object();

        // Rust-side `Hash` follows identity, like `Eq`.
        let set: std::collections::HashSet<Object> = [a.clone(), b, c.clone()].into_iter().collect();
        assert_eq!(set.len(), 1 + usize::from(!a.is(c.handle())));
        assert!(set.contains(&a));

        // The host hash follows value.
        assert_eq!(a.hash_value().unwrap(), c.hash_value().unwrap());
        assert_eq!(a.handle().hash_value().unwrap(), a.hash_value().unwrap());
    }
}
