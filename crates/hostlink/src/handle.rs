// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Non-owning object handle.

use std::fmt;

use hostlink_rt::{object, ObjPtr};

/// A non-owning view of a host object.
///
/// Equality is pointer identity. A `Handle` never touches the reference
/// count on its own; see [`crate::Object`] for the owning wrapper.
///
/// Handles are neither `Send` nor `Sync`: host objects may only be used by
/// the thread holding the GIL.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    ptr: ObjPtr,
}

impl Handle {
    /// The null handle.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
        }
    }

    /// Wrap a raw runtime pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live runtime object, and must stay
    /// alive for as long as the handle (or anything derived from it) is used.
    #[inline]
    #[must_use]
    pub const unsafe fn from_ptr(ptr: ObjPtr) -> Self {
        Self { ptr }
    }

    /// Wrap an immortal runtime object (builtin types and singletons).
    #[inline]
    #[must_use]
    pub fn from_static(ptr: ObjPtr) -> Self {
        debug_assert!(ptr.is_null() || object::is_immortal(ptr));
        Self { ptr }
    }

    #[inline]
    #[must_use]
    pub const fn ptr(self) -> ObjPtr {
        self.ptr
    }

    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.ptr.is_null()
    }

    /// Manually increment the reference count. No-op on null.
    #[inline]
    pub fn inc_ref(self) -> Self {
        object::inc_ref(self.ptr);
        self
    }

    /// Manually decrement the reference count. No-op on null.
    #[inline]
    pub fn dec_ref(self) -> Self {
        object::dec_ref(self.ptr);
        self
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ptr.is_null() {
            return f.write_str("Handle(null)");
        }
        write!(
            f,
            "Handle({:p}: {})",
            self.ptr,
            hostlink_rt::types::obj_type_name(self.ptr)
        )
    }
}
