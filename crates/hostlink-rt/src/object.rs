// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object header, reference counting and allocation.
//!
//! # Layout
//!
//! ```text
//! HostObject
//! +-- refcnt:   Cell<isize>        (IMMORTAL_REFCNT = pinned)
//! +-- ob_type:  Cell<ObjPtr>       (strong reference, except for immortals)
//! +-- weaklist: RefCell<Vec<ObjPtr>> (weak references pointing here)
//! +-- body:     Body               (type-specific payload)
//! ```
//!
//! # Thread Safety
//!
//! Counts are plain cells: every mutation requires the GIL. Immortal objects
//! are shared read-only across threads; their counts are never written.

use std::cell::{Cell, RefCell};
use std::ptr;

use crate::buffer::ViewData;
use crate::capsule::CapsuleData;
use crate::err::{self, ExceptionData};
use crate::function::FunctionData;
use crate::table::Table;
use crate::types::TypeData;
use crate::weakref::WeakRefData;

/// Raw pointer to a runtime object.
pub type ObjPtr = *mut HostObject;

/// Reference count marking an object as immortal. `inc_ref`/`dec_ref` are
/// no-ops on immortal objects.
pub const IMMORTAL_REFCNT: isize = isize::MAX >> 2;

/// A runtime object.
pub struct HostObject {
    refcnt: Cell<isize>,
    ob_type: Cell<ObjPtr>,
    weaklist: RefCell<Vec<ObjPtr>>,
    pub(crate) body: Body,
}

/// Type-specific payload of an object.
pub(crate) enum Body {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    ByteArray(RefCell<Vec<u8>>),
    Tuple(RefCell<Vec<ObjPtr>>),
    List(RefCell<Vec<ObjPtr>>),
    Dict(RefCell<Table>),
    Set(RefCell<Table>),
    Type(TypeData),
    Instance { dict: ObjPtr },
    Exception(ExceptionData),
    Module { name: String, dict: ObjPtr },
    Capsule(CapsuleData),
    Slice { start: ObjPtr, stop: ObjPtr, step: ObjPtr },
    WeakRef(WeakRefData),
    MemoryView(ViewData),
    SeqIter { seq: ObjPtr, index: Cell<usize> },
    KeyIter { table: ObjPtr, pos: Cell<usize> },
    NativeIter(RefCell<Option<NativeIterFn>>),
    Function(FunctionData),
}

/// Producer behind a native iterator: returns a new reference, or null to
/// signal exhaustion (no error set) or failure (error set).
pub(crate) type NativeIterFn = Box<dyn FnMut() -> ObjPtr>;

impl Drop for Body {
    fn drop(&mut self) {
        match self {
            Body::Tuple(items) | Body::List(items) => {
                for item in items.get_mut().drain(..) {
                    dec_ref(item);
                }
            }
            Body::Dict(table) | Body::Set(table) => {
                for entry in table.get_mut().drain() {
                    dec_ref(entry.key);
                    dec_ref(entry.value);
                }
            }
            Body::Type(data) => {
                dec_ref(data.base);
                dec_ref(data.dict);
            }
            Body::Instance { dict } | Body::Module { dict, .. } => dec_ref(*dict),
            Body::Exception(data) => data.release(),
            Body::Slice { start, stop, step } => {
                dec_ref(*start);
                dec_ref(*stop);
                dec_ref(*step);
            }
            Body::WeakRef(data) => dec_ref(data.callback),
            Body::MemoryView(view) => view.release(),
            Body::SeqIter { seq, .. } => dec_ref(*seq),
            Body::KeyIter { table, .. } => dec_ref(*table),
            Body::None
            | Body::Bool(_)
            | Body::Int(_)
            | Body::Float(_)
            | Body::Str(_)
            | Body::Bytes(_)
            | Body::ByteArray(_)
            | Body::Capsule(_)
            | Body::NativeIter(_)
            | Body::Function(_) => {}
        }
    }
}

impl HostObject {
    pub(crate) fn weaklist(&self) -> &RefCell<Vec<ObjPtr>> {
        &self.weaklist
    }
}

/// Borrow the object behind `ptr`.
///
/// The returned reference is only valid while the object is alive; callers
/// hold the GIL and a reference (owned or borrowed) for the duration.
#[inline]
pub(crate) fn obj<'a>(ptr: ObjPtr) -> &'a HostObject {
    debug_assert!(!ptr.is_null(), "dereferenced a null object pointer");
    // SAFETY: runtime contract - `ptr` is a live object and the GIL is held.
    unsafe { &*ptr }
}

#[inline]
pub(crate) fn body<'a>(ptr: ObjPtr) -> &'a Body {
    &obj(ptr).body
}

/// Increment the reference count. Null and immortal objects are ignored.
#[inline]
pub fn inc_ref(ptr: ObjPtr) {
    if ptr.is_null() {
        return;
    }
    let o = obj(ptr);
    let rc = o.refcnt.get();
    if rc >= IMMORTAL_REFCNT {
        return;
    }
    o.refcnt.set(rc + 1);
}

/// Decrement the reference count, deallocating at zero. Null and immortal
/// objects are ignored.
#[inline]
pub fn dec_ref(ptr: ObjPtr) {
    if ptr.is_null() {
        return;
    }
    let o = obj(ptr);
    let rc = o.refcnt.get();
    if rc >= IMMORTAL_REFCNT {
        return;
    }
    if rc <= 1 {
        o.refcnt.set(0);
        dealloc(ptr);
    } else {
        o.refcnt.set(rc - 1);
    }
}

/// Current reference count (0 for null).
pub fn refcount(ptr: ObjPtr) -> isize {
    if ptr.is_null() {
        return 0;
    }
    obj(ptr).refcnt.get()
}

/// True for objects whose count is pinned.
pub fn is_immortal(ptr: ObjPtr) -> bool {
    !ptr.is_null() && obj(ptr).refcnt.get() >= IMMORTAL_REFCNT
}

/// Type object of `ptr` (borrowed).
#[inline]
pub fn type_of(ptr: ObjPtr) -> ObjPtr {
    obj(ptr).ob_type.get()
}

/// Allocate a new object, honouring allocation fault injection.
///
/// Returns null with `MemoryError` set when an injected failure fires. The
/// body is released in that case, so any references it owns are returned.
pub(crate) fn alloc(ty: ObjPtr, body: Body) -> ObjPtr {
    if fault::take() {
        drop(body);
        err::set_memory_error();
        return ptr::null_mut();
    }
    alloc_unchecked(ty, body)
}

/// Allocate without fault injection (error objects, interpreter bootstrap).
pub(crate) fn alloc_unchecked(ty: ObjPtr, body: Body) -> ObjPtr {
    inc_ref(ty);
    Box::into_raw(Box::new(HostObject {
        refcnt: Cell::new(1),
        ob_type: Cell::new(ty),
        weaklist: RefCell::new(Vec::new()),
        body,
    }))
}

/// Allocate an immortal object. `ty` may be null and patched later with
/// [`set_type`] (bootstrap of the `type` type itself).
pub(crate) fn alloc_immortal(ty: ObjPtr, body: Body) -> ObjPtr {
    Box::into_raw(Box::new(HostObject {
        refcnt: Cell::new(IMMORTAL_REFCNT),
        ob_type: Cell::new(ty),
        weaklist: RefCell::new(Vec::new()),
        body,
    }))
}

pub(crate) fn set_type(ptr: ObjPtr, ty: ObjPtr) {
    obj(ptr).ob_type.set(ty);
}

fn dealloc(ptr: ObjPtr) {
    let o = obj(ptr);

    if let Body::Capsule(data) = &o.body {
        data.run_destructor(ptr);
    }
    if let Body::WeakRef(data) = &o.body {
        crate::weakref::detach(ptr, data);
    }
    let weakrefs = std::mem::take(&mut *o.weaklist.borrow_mut());
    if !weakrefs.is_empty() {
        crate::weakref::notify_dead(weakrefs);
    }

    let ty = o.ob_type.get();
    // SAFETY: count reached zero; this is the last reference and the pointer
    // came from `Box::into_raw` in `alloc_unchecked`.
    drop(unsafe { Box::from_raw(ptr) });
    dec_ref(ty);
}

/// Allocation fault injection, used to exercise out-of-memory paths.
pub mod fault {
    use std::cell::Cell;

    thread_local! {
        static FAIL_NEXT: Cell<usize> = const { Cell::new(0) };
    }

    /// Make the next `n` fallible allocations on this thread return null.
    pub fn fail_next_allocations(n: usize) {
        FAIL_NEXT.with(|c| c.set(n));
    }

    /// Cancel any pending injected failures on this thread.
    pub fn clear() {
        FAIL_NEXT.with(|c| c.set(0));
    }

    pub(crate) fn take() -> bool {
        FAIL_NEXT.with(|c| {
            let n = c.get();
            if n == 0 {
                false
            } else {
                c.set(n - 1);
                true
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gil, values};

    #[test]
    fn test_null_refcount_ops_are_noops() {
        inc_ref(ptr::null_mut());
        dec_ref(ptr::null_mut());
        assert_eq!(refcount(ptr::null_mut()), 0);
    }

    #[test]
    fn test_inc_dec_balance() {
        let _gil = gil::acquire();
        let s = values::str_from_str("sample");
        assert_eq!(refcount(s), 1);
        inc_ref(s);
        inc_ref(s);
        assert_eq!(refcount(s), 3);
        dec_ref(s);
        dec_ref(s);
        assert_eq!(refcount(s), 1);
        dec_ref(s);
    }

    #[test]
    fn test_immortal_none_is_pinned() {
        let _gil = gil::acquire();
        let none = crate::builtin().none;
        let before = refcount(none);
        inc_ref(none);
        dec_ref(none);
        dec_ref(none);
        assert_eq!(refcount(none), before);
        assert!(is_immortal(none));
    }

    #[test]
    fn test_fault_injection_returns_null_with_memory_error() {
        let _gil = gil::acquire();
        fault::fail_next_allocations(1);
        let s = values::str_from_str("never");
        assert!(s.is_null());
        assert!(err::exception_matches(crate::builtin().memory_error));
        err::clear();

        let s = values::str_from_str("now");
        assert!(!s.is_null());
        dec_ref(s);
    }
}
