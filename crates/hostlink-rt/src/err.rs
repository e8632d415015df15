// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-thread error indicator.
//!
//! Each thread carries one `(type, value, traceback)` triple. Failing
//! runtime calls set it and return their failure sentinel; callers either
//! handle the error (`fetch`/`clear`) or propagate the sentinel.
//!
//! Values stored through `set_string`/`set_object` are always exception
//! instances (normalized eagerly).

use std::cell::{Cell, RefCell};
use std::ptr;

use crate::object::{alloc_unchecked, body, dec_ref, inc_ref, type_of, Body, ObjPtr};
use crate::types::{builtin, is_subtype, is_type};
use crate::values;

pub(crate) struct ExceptionData {
    pub args: ObjPtr,
    pub context: Cell<ObjPtr>,
    pub traceback: Cell<ObjPtr>,
}

impl ExceptionData {
    pub(crate) fn release(&self) {
        dec_ref(self.args);
        dec_ref(self.context.replace(ptr::null_mut()));
        dec_ref(self.traceback.replace(ptr::null_mut()));
    }
}

struct Indicator {
    ty: ObjPtr,
    value: ObjPtr,
    traceback: ObjPtr,
}

thread_local! {
    static INDICATOR: RefCell<Indicator> = const {
        RefCell::new(Indicator {
            ty: ptr::null_mut(),
            value: ptr::null_mut(),
            traceback: ptr::null_mut(),
        })
    };
}

/// Create an exception instance of `ty` with `args` (a tuple, borrowed; null
/// means no arguments). Never fails.
pub fn new_exception(ty: ObjPtr, args: ObjPtr) -> ObjPtr {
    let args = if args.is_null() {
        values::tuple_from_vec_unchecked(Vec::new())
    } else {
        inc_ref(args);
        args
    };
    alloc_unchecked(
        ty,
        Body::Exception(ExceptionData {
            args,
            context: Cell::new(ptr::null_mut()),
            traceback: Cell::new(ptr::null_mut()),
        }),
    )
}

/// True if `obj` is an exception instance.
pub fn is_exception_instance(obj: ObjPtr) -> bool {
    !obj.is_null() && matches!(body(obj), Body::Exception(_))
}

/// Raise `ty` with a single string argument.
pub fn set_string(ty: ObjPtr, message: &str) {
    let msg = values::str_unchecked(message);
    let args = values::tuple_from_vec_unchecked(vec![msg]);
    let exc = new_exception(ty, args);
    dec_ref(args);
    inc_ref(ty);
    restore(ty, exc, ptr::null_mut());
}

/// Raise `ty` with `value` (borrowed). An exception instance is raised as
/// is; any other non-null value becomes the single argument.
pub fn set_object(ty: ObjPtr, value: ObjPtr) {
    if is_exception_instance(value) {
        inc_ref(value);
        inc_ref(ty);
        restore(ty, value, ptr::null_mut());
        return;
    }
    let args = if value.is_null() {
        values::tuple_from_vec_unchecked(Vec::new())
    } else {
        inc_ref(value);
        values::tuple_from_vec_unchecked(vec![value])
    };
    let exc = new_exception(ty, args);
    dec_ref(args);
    inc_ref(ty);
    restore(ty, exc, ptr::null_mut());
}

/// Raise `ty` with no arguments.
pub fn set_none(ty: ObjPtr) {
    set_object(ty, ptr::null_mut());
}

/// Raise `MemoryError` without allocating through the fault-injected path.
pub fn set_memory_error() {
    set_none(builtin().memory_error);
}

/// Type of the pending error (borrowed), or null.
pub fn occurred() -> ObjPtr {
    INDICATOR.with(|i| i.borrow().ty)
}

/// Take ownership of the pending error triple and clear the indicator.
pub fn fetch() -> (ObjPtr, ObjPtr, ObjPtr) {
    INDICATOR.with(|i| {
        let mut i = i.borrow_mut();
        (
            std::mem::replace(&mut i.ty, ptr::null_mut()),
            std::mem::replace(&mut i.value, ptr::null_mut()),
            std::mem::replace(&mut i.traceback, ptr::null_mut()),
        )
    })
}

/// Install an error triple (stealing all three references). Any previously
/// pending error is released. Passing three nulls clears the indicator.
pub fn restore(ty: ObjPtr, value: ObjPtr, traceback: ObjPtr) {
    let old = INDICATOR.with(|i| {
        let mut i = i.borrow_mut();
        (
            std::mem::replace(&mut i.ty, ty),
            std::mem::replace(&mut i.value, value),
            std::mem::replace(&mut i.traceback, traceback),
        )
    });
    dec_ref(old.0);
    dec_ref(old.1);
    dec_ref(old.2);
}

/// Discard the pending error, if any.
pub fn clear() {
    restore(ptr::null_mut(), ptr::null_mut(), ptr::null_mut());
}

/// True if `given` (a type or an exception instance) matches `exc` (a type
/// or a tuple of types). Never raises.
pub fn given_exception_matches(given: ObjPtr, exc: ObjPtr) -> bool {
    if given.is_null() || exc.is_null() {
        return false;
    }
    let given = if is_type(given) { given } else { type_of(given) };
    if let Body::Tuple(items) = body(exc) {
        let items = items.borrow().clone();
        return items
            .into_iter()
            .any(|item| given_exception_matches(given, item));
    }
    is_type(exc) && is_subtype(given, exc)
}

/// True if the pending error matches `exc`.
pub fn exception_matches(exc: ObjPtr) -> bool {
    given_exception_matches(occurred(), exc)
}

fn exception_data<'a>(exc: ObjPtr) -> Option<&'a ExceptionData> {
    if exc.is_null() {
        return None;
    }
    match body(exc) {
        Body::Exception(data) => Some(data),
        _ => None,
    }
}

/// `args` tuple of an exception instance (borrowed, null otherwise).
pub fn exception_args(exc: ObjPtr) -> ObjPtr {
    exception_data(exc).map_or(ptr::null_mut(), |d| d.args)
}

/// `__context__` of an exception instance (borrowed, may be null).
pub fn exception_context(exc: ObjPtr) -> ObjPtr {
    exception_data(exc).map_or(ptr::null_mut(), |d| d.context.get())
}

/// Set `__context__` (steals `context`). No-op for non-exceptions.
pub fn exception_set_context(exc: ObjPtr, context: ObjPtr) {
    match exception_data(exc) {
        Some(data) => dec_ref(data.context.replace(context)),
        None => dec_ref(context),
    }
}

/// Attached traceback (borrowed, may be null).
pub fn exception_traceback(exc: ObjPtr) -> ObjPtr {
    exception_data(exc).map_or(ptr::null_mut(), |d| d.traceback.get())
}

/// Attach a traceback object (steals `traceback`).
pub fn exception_set_traceback(exc: ObjPtr, traceback: ObjPtr) {
    match exception_data(exc) {
        Some(data) => dec_ref(data.traceback.replace(traceback)),
        None => dec_ref(traceback),
    }
}
