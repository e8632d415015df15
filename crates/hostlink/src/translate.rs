// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native fault to host error translation.
//!
//! Every native call entered from the runtime runs inside [`guarded`]. A
//! returned [`Fault`] (or a panic payload) is offered to the translator
//! chain of the internals registry, most recently registered first. A
//! translator either sets a host error and returns `Ok(())`, or declines by
//! handing the fault back. When every translator declines, a
//! `RuntimeError("Caught an unknown exception!")` is raised.
//!
//! # Default mapping
//!
//! ```text
//! Error::AlreadySet            -> restored as captured
//! Error::Builtin(..)           -> its host category
//! NativeError::OutOfMemory     -> MemoryError
//! InvalidArgument/Domain/
//!   Length/Range               -> ValueError
//! OutOfRange                   -> IndexError
//! Overflow                     -> OverflowError
//! Runtime, String, &str        -> RuntimeError(message)
//! TryReserveError              -> MemoryError
//! anything else                -> RuntimeError(UNKNOWN_EXCEPTION_MESSAGE)
//! ```

use std::any::Any;
use std::collections::TryReserveError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use hostlink_rt::{builtin, err, ObjPtr};

use crate::config::UNKNOWN_EXCEPTION_MESSAGE;
use crate::error::{BuiltinError, Error, NativeError};
use crate::internals;
use crate::object::Object;

/// A native fault travelling towards the boundary.
pub struct Fault {
    payload: Box<dyn Any>,
}

impl Fault {
    pub fn new<E: Any>(error: E) -> Self {
        Self {
            payload: Box::new(error),
        }
    }

    /// Wrap a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self { payload }
    }

    pub fn is<E: Any>(&self) -> bool {
        self.payload.is::<E>()
    }

    /// Take the payload out as `E`, or get the fault back.
    pub fn downcast<E: Any>(self) -> Result<E, Self> {
        match self.payload.downcast::<E>() {
            Ok(e) => Ok(*e),
            Err(payload) => Err(Self { payload }),
        }
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Human-readable message when the payload carries one.
    pub fn message(&self) -> Option<String> {
        if let Some(e) = self.downcast_ref::<Error>() {
            return Some(e.to_string());
        }
        if let Some(e) = self.downcast_ref::<NativeError>() {
            return Some(e.to_string());
        }
        if let Some(s) = self.downcast_ref::<String>() {
            return Some(s.clone());
        }
        self.downcast_ref::<&'static str>().map(|s| (*s).to_owned())
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault").field("message", &self.message()).finish()
    }
}

impl From<Error> for Fault {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<NativeError> for Fault {
    fn from(e: NativeError) -> Self {
        Self::new(Error::Native(e))
    }
}

impl From<BuiltinError> for Fault {
    fn from(e: BuiltinError) -> Self {
        Self::new(Error::Builtin(e))
    }
}

/// One link of the translator chain. Returns `Ok(())` once a host error
/// has been set, or the fault untouched to defer to the next link.
pub type ExceptionTranslator = fn(Fault) -> Result<(), Fault>;

/// Translator seeded into a freshly created registry.
pub fn translate_builtin(fault: Fault) -> Result<(), Fault> {
    let fault = match translate_local(fault) {
        Ok(()) => return Ok(()),
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<TryReserveError>() {
        Ok(_) => {
            err::set_memory_error();
            return Ok(());
        }
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<Box<dyn std::error::Error + Send + Sync>>() {
        Ok(e) => {
            err::set_string(builtin().runtime_error, &e.to_string());
            return Ok(());
        }
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<String>() {
        Ok(msg) => {
            err::set_string(builtin().runtime_error, &msg);
            return Ok(());
        }
        Err(fault) => fault,
    };
    match fault.downcast::<&'static str>() {
        Ok(msg) => {
            err::set_string(builtin().runtime_error, msg);
            Ok(())
        }
        Err(fault) => Err(fault),
    }
}

/// Translator a module registers when it adopts an existing registry: only
/// the crate's own error types.
pub fn translate_local(fault: Fault) -> Result<(), Fault> {
    let fault = match fault.downcast::<Error>() {
        Ok(e) => {
            e.restore();
            return Ok(());
        }
        Err(fault) => fault,
    };
    match fault.downcast::<NativeError>() {
        Ok(e) => {
            Error::Native(e).restore();
            Ok(())
        }
        Err(fault) => Err(fault),
    }
}

/// Add `translator` in front of the chain of the current registry.
pub fn register_exception_translator(translator: ExceptionTranslator) -> crate::Result<()> {
    let internals = internals::get_internals()?;
    internals.register_translator("user", translator);
    Ok(())
}

/// Set a host error for `fault`, walking the translator chain.
pub fn translate_fault(fault: Fault) {
    let chain = match internals::get_internals() {
        Ok(internals) => internals.translators(),
        Err(e) => {
            // No registry (interpreter not running): builtin mapping only.
            log::debug!("[Translate] registry unavailable: {e}");
            drop(e);
            vec![translate_builtin as ExceptionTranslator]
        }
    };
    let mut fault = fault;
    for translator in chain {
        match translator(fault) {
            Ok(()) => return,
            Err(declined) => fault = declined,
        }
    }
    log::debug!("[Translate] no translator matched {fault:?}");
    err::set_string(builtin().runtime_error, UNKNOWN_EXCEPTION_MESSAGE);
}

/// Run native code entered from the runtime.
///
/// Returns a new reference on success. On failure (an `Err` or a panic)
/// the fault is translated, a host error is left set and null is returned.
pub fn guarded<F>(f: F) -> ObjPtr
where
    F: FnOnce() -> Result<Object, Fault>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(obj)) => obj.release().ptr(),
        Ok(Err(fault)) => {
            translate_fault(fault);
            std::ptr::null_mut()
        }
        Err(payload) => {
            translate_fault(Fault::from_panic(payload));
            std::ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorAlreadySet;
    use crate::handle::Handle;
    use hostlink_rt::gil;

    fn raised(fault: Fault) -> ErrorAlreadySet {
        translate_fault(fault);
        ErrorAlreadySet::capture()
    }

    #[test]
    fn test_native_categories_map_to_host_errors() {
        let _gil = gil::acquire();
        let b = builtin();
        let cases: [(NativeError, ObjPtr); 6] = [
            (NativeError::OutOfMemory, b.memory_error),
            (NativeError::InvalidArgument("arg".into()), b.value_error),
            (NativeError::Length("len".into()), b.value_error),
            (NativeError::OutOfRange("idx".into()), b.index_error),
            (NativeError::Range("range".into()), b.value_error),
            (NativeError::Runtime("boom".into()), b.runtime_error),
        ];
        for (native, expected) in cases {
            let e = raised(native.into());
            assert!(e.matches(Handle::from_static(expected)), "{e}");
        }
    }

    #[test]
    fn test_message_is_preserved() {
        let _gil = gil::acquire();
        let e = raised(Fault::new(String::from("disk on fire")));
        assert_eq!(e.message(), "RuntimeError: disk on fire");
    }

    #[test]
    fn test_unknown_fault_uses_placeholder() {
        let _gil = gil::acquire();
        struct Opaque;
        let e = raised(Fault::new(Opaque));
        assert_eq!(e.message(), format!("RuntimeError: {UNKNOWN_EXCEPTION_MESSAGE}"));
    }

    #[test]
    fn test_guarded_catches_panics() {
        let _gil = gil::acquire();
        let result = guarded(|| panic!("native code panicked"));
        assert!(result.is_null());
        let e = ErrorAlreadySet::capture();
        assert_eq!(e.message(), "RuntimeError: native code panicked");
    }

    #[test]
    fn test_guarded_passes_result_through() {
        let _gil = gil::acquire();
        let result = guarded(|| Ok(crate::types::Int::new(7)?.into_object()));
        assert!(!result.is_null());
        assert_eq!(hostlink_rt::ops::long_as_i64(result), 7);
        hostlink_rt::dec_ref(result);
    }

    #[test]
    fn test_local_translator_declines_foreign_payloads() {
        let fault = translate_local(Fault::new(42u8)).unwrap_err();
        assert_eq!(fault.downcast::<u8>().ok(), Some(42));
    }
}
