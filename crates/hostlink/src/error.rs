// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error bridge between the host runtime's error indicator and `Result`.
//!
//! # Architecture
//!
//! ```text
//! runtime call --(null / -1)--> ErrorAlreadySet::capture()   (fetch + clear)
//!                                      |
//!                                      v
//!                            Err(Error::AlreadySet(..))  -- `?` upward
//!                                      |
//! boundary (translate::guarded) -------+--> translator chain --> restore()
//! ```
//!
//! Native-side raises use [`BuiltinError`] (a host exception category) and
//! [`NativeError`] (native fault categories). Both become host errors only
//! when they cross the boundary.

use std::fmt;

use hostlink_rt::{builtin, err, gil, ops, types, ObjPtr};

use crate::handle::Handle;
use crate::object::Object;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while talking to the host runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A host error was pending and has been captured.
    #[error(transparent)]
    AlreadySet(#[from] ErrorAlreadySet),

    /// Raise a host exception of a known category.
    #[error(transparent)]
    Builtin(#[from] BuiltinError),

    /// A native fault, mapped to a host category at the boundary.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// Allocation failure or broken caller precondition. Not recoverable.
    #[error("{0}")]
    Fatal(String),
}

impl Error {
    /// Capture the pending host error.
    pub fn fetch() -> Self {
        Self::AlreadySet(ErrorAlreadySet::capture())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// True if this is a captured host error matching `exc`.
    pub fn matches(&self, exc: Handle) -> bool {
        match self {
            Self::AlreadySet(e) => e.matches(exc),
            _ => false,
        }
    }

    /// Hand the error to the runtime's error indicator.
    pub fn restore(self) {
        match self {
            Self::AlreadySet(mut e) => e.restore(),
            Self::Builtin(e) => err::set_string(e.host_type(), &e.to_string()),
            Self::Native(e) => err::set_string(e.host_type(), &e.to_string()),
            Self::Fatal(msg) => err::set_string(builtin().runtime_error, &msg),
        }
    }
}

/// Host exception categories raised from native code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuiltinError {
    #[error("{0}")]
    StopIteration(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    Key(String),
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Type(String),
    /// Conversion between a native value and a host object failed.
    #[error("{0}")]
    Cast(String),
    /// Conversion to a native reference failed (e.g. a null reference).
    #[error("{0}")]
    ReferenceCast(String),
    #[error("{0}")]
    Buffer(String),
    #[error("{0}")]
    Import(String),
    #[error("{0}")]
    Attribute(String),
}

impl BuiltinError {
    /// Host exception type this category raises (borrowed, immortal).
    pub fn host_type(&self) -> ObjPtr {
        let b = builtin();
        match self {
            Self::StopIteration(_) => b.stop_iteration,
            Self::Index(_) => b.index_error,
            Self::Key(_) => b.key_error,
            Self::Value(_) => b.value_error,
            Self::Type(_) => b.type_error,
            Self::Cast(_) | Self::ReferenceCast(_) => b.runtime_error,
            Self::Buffer(_) => b.buffer_error,
            Self::Import(_) => b.import_error,
            Self::Attribute(_) => b.attribute_error,
        }
    }
}

/// Native fault categories understood by the builtin translator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NativeError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Domain(String),
    #[error("{0}")]
    Length(String),
    #[error("{0}")]
    OutOfRange(String),
    #[error("{0}")]
    Range(String),
    #[error("{0}")]
    Overflow(String),
    #[error("{0}")]
    Runtime(String),
}

impl NativeError {
    pub fn host_type(&self) -> ObjPtr {
        let b = builtin();
        match self {
            Self::OutOfMemory => b.memory_error,
            Self::InvalidArgument(_) | Self::Domain(_) | Self::Length(_) | Self::Range(_) => {
                b.value_error
            }
            Self::OutOfRange(_) => b.index_error,
            Self::Overflow(_) => b.overflow_error,
            Self::Runtime(_) => b.runtime_error,
        }
    }
}

// ============================================================================
// ErrorAlreadySet
// ============================================================================

/// Snapshot of the host error triple taken when a runtime call failed.
///
/// The message is rendered at capture time, so `Display` never calls back
/// into the runtime.
pub struct ErrorAlreadySet {
    ty: Object,
    value: Object,
    trace: Object,
    message: String,
}

impl ErrorAlreadySet {
    /// Fetch and clear the pending error. With nothing pending the result
    /// carries no error (callers are expected to have checked).
    pub fn capture() -> Self {
        let (ty, value, trace) = err::fetch();
        if ty.is_null() {
            return Self {
                ty: Object::null(),
                value: Object::null(),
                trace: Object::null(),
                message: "Unknown internal error occurred".to_owned(),
            };
        }
        // SAFETY: `fetch` hands over one reference to each non-null member.
        let (ty, value, trace) = unsafe { (Object::steal(ty), Object::steal(value), Object::steal(trace)) };

        let type_name = types::type_name(ty.ptr()).to_owned();
        let message = if value.is_null() {
            type_name
        } else {
            match ops::str_string(value.ptr()) {
                Some(text) => format!("{type_name}: {text}"),
                None => {
                    err::clear();
                    format!("{type_name}: <error rendering the exception value>")
                }
            }
        };
        Self {
            ty,
            value,
            trace,
            message,
        }
    }

    /// Give the error back to the runtime. Consumes the stored references;
    /// a second call is a no-op.
    ///
    /// An error that is already pending becomes the `__context__` of the
    /// restored one instead of being dropped.
    pub fn restore(&mut self) {
        if self.ty.is_null() {
            return;
        }
        let ty = self.ty.take().release();
        let value = self.value.take().release();
        let trace = self.trace.take().release();

        let (p_ty, p_value, p_trace) = err::fetch();
        if !p_value.is_null() && p_value != value.ptr() {
            err::exception_set_context(value.ptr(), p_value);
        } else {
            hostlink_rt::dec_ref(p_value);
        }
        hostlink_rt::dec_ref(p_ty);
        hostlink_rt::dec_ref(p_trace);

        err::restore(ty.ptr(), value.ptr(), trace.ptr());
    }

    /// True if the captured type is `exc` or a subclass (or matches any
    /// member when `exc` is a tuple). Never leaves an error pending.
    pub fn matches(&self, exc: Handle) -> bool {
        err::given_exception_matches(self.ty.ptr(), exc.ptr())
    }

    /// True once [`restore`](Self::restore) has handed the error back.
    pub fn is_restored(&self) -> bool {
        self.ty.is_null()
    }

    pub fn get_type(&self) -> Handle {
        self.ty.handle()
    }

    pub fn value(&self) -> Handle {
        self.value.handle()
    }

    pub fn trace(&self) -> Handle {
        self.trace.handle()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Drop for ErrorAlreadySet {
    fn drop(&mut self) {
        if self.ty.is_null() && self.value.is_null() && self.trace.is_null() {
            return;
        }
        // May be dropped far from where it was captured.
        let _gil = gil::acquire();
        drop(self.ty.take());
        drop(self.value.take());
        drop(self.trace.take());
    }
}

impl fmt::Debug for ErrorAlreadySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorAlreadySet")
            .field("message", &self.message)
            .field("restored", &self.is_restored())
            .finish()
    }
}

impl fmt::Display for ErrorAlreadySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorAlreadySet {}

// ============================================================================
// Sentinel conversion
// ============================================================================

/// Take ownership of a new reference, or capture the error a null implies.
pub(crate) fn new_ref(ptr: ObjPtr) -> Result<Object> {
    if ptr.is_null() {
        return Err(Error::fetch());
    }
    // SAFETY: non-null results of runtime calls documented as returning a
    // new reference.
    Ok(unsafe { Object::steal(ptr) })
}

/// Take an additional reference to a borrowed result.
pub(crate) fn borrowed_ref(ptr: ObjPtr) -> Result<Object> {
    if ptr.is_null() {
        return Err(Error::fetch());
    }
    // SAFETY: live borrowed pointer returned by the runtime.
    Ok(Object::borrow(unsafe { Handle::from_ptr(ptr) }))
}

/// New reference from an allocating constructor. Allocation failure is
/// fatal; any other failure is captured.
pub(crate) fn alloc_ref(ptr: ObjPtr, what: &str) -> Result<Object> {
    if ptr.is_null() {
        if err::exception_matches(builtin().memory_error) {
            err::clear();
            return Err(Error::Fatal(format!("Could not allocate {what} object!")));
        }
        return Err(Error::fetch());
    }
    // SAFETY: as in `new_ref`.
    Ok(unsafe { Object::steal(ptr) })
}

/// `0` / `-1` status codes.
pub(crate) fn status(rc: i32) -> Result<()> {
    if rc < 0 {
        Err(Error::fetch())
    } else {
        Ok(())
    }
}

/// Sizes and counts; negative means failure.
pub(crate) fn size(n: isize) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::fetch())
}

/// Boolean results (`1`, `0`, `-1`).
pub(crate) fn flag(rc: i32) -> Result<bool> {
    match rc {
        0 => Ok(false),
        r if r > 0 => Ok(true),
        _ => Err(Error::fetch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectApi;
    use hostlink_rt::gil;

    fn raise_value_error(message: &str) {
        err::set_string(builtin().value_error, message);
    }

    #[test]
    fn test_capture_clears_indicator() {
        let _gil = gil::acquire();
        raise_value_error("bad value");
        let e = ErrorAlreadySet::capture();
        assert!(err::occurred().is_null());
        assert_eq!(e.message(), "ValueError: bad value");
        assert!(e.get_type().is(Handle::from_static(builtin().value_error)));
    }

    #[test]
    fn test_capture_without_pending_error() {
        let _gil = gil::acquire();
        err::clear();
        let e = ErrorAlreadySet::capture();
        assert!(e.get_type().is_null());
        assert!(e.is_restored());
        assert_eq!(e.to_string(), "Unknown internal error occurred");
    }

    #[test]
    fn test_capture_restore_identity() {
        let _gil = gil::acquire();
        raise_value_error("round trip");
        let (ty, value, _) = err::fetch();
        let expected = (ty, value);
        hostlink_rt::inc_ref(ty);
        hostlink_rt::inc_ref(value);
        err::restore(ty, value, std::ptr::null_mut());

        let mut e = ErrorAlreadySet::capture();
        e.restore();
        assert!(e.is_restored());
        assert_eq!(err::occurred(), expected.0);
        let (ty, value, tb) = err::fetch();
        assert_eq!((ty, value), expected);
        for p in [ty, value, tb, expected.0, expected.1] {
            hostlink_rt::dec_ref(p);
        }
    }

    #[test]
    fn test_second_restore_is_noop() {
        let _gil = gil::acquire();
        raise_value_error("once");
        let mut e = ErrorAlreadySet::capture();
        e.restore();
        err::clear();
        e.restore();
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_restore_chains_pending_error() {
        let _gil = gil::acquire();
        raise_value_error("first");
        let mut first = ErrorAlreadySet::capture();
        err::set_string(builtin().key_error, "second");
        first.restore();

        let second = ErrorAlreadySet::capture();
        assert!(second.matches(Handle::from_static(builtin().value_error)));
        let context = err::exception_context(second.value().ptr());
        assert!(!context.is_null());
        assert_eq!(hostlink_rt::type_of(context), builtin().key_error);
    }

    #[test]
    fn test_matches_subclass_and_tuple() {
        let _gil = gil::acquire();
        err::set_string(builtin().key_error, "k");
        let e = ErrorAlreadySet::capture();
        assert!(e.matches(Handle::from_static(builtin().lookup_error)));
        assert!(!e.matches(Handle::from_static(builtin().value_error)));
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_native_error_categories() {
        let b = builtin();
        assert_eq!(NativeError::OutOfMemory.host_type(), b.memory_error);
        assert_eq!(NativeError::Domain("d".into()).host_type(), b.value_error);
        assert_eq!(NativeError::Length("l".into()).host_type(), b.value_error);
        assert_eq!(NativeError::OutOfRange("o".into()).host_type(), b.index_error);
        assert_eq!(NativeError::Range("r".into()).host_type(), b.value_error);
        assert_eq!(BuiltinError::Cast("c".into()).host_type(), b.runtime_error);
    }

    #[test]
    fn test_sentinel_helpers() {
        let _gil = gil::acquire();
        assert!(status(0).is_ok());
        assert_eq!(size(3).ok(), Some(3));
        assert!(flag(1).unwrap());

        raise_value_error("negative");
        let e = size(-1).unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().value_error)));
    }

    #[test]
    fn test_alloc_failure_is_fatal() {
        let _gil = gil::acquire();
        hostlink_rt::object::fault::fail_next_allocations(1);
        let ptr = hostlink_rt::values::list_new(0);
        match alloc_ref(ptr, "list") {
            Err(Error::Fatal(msg)) => assert_eq!(msg, "Could not allocate list object!"),
            other => panic!("expected a fatal error, got {other:?}"),
        }
        assert!(err::occurred().is_null());
    }
}
