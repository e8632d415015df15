// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Capsules: opaque pointers carried by runtime objects.
//!
//! A capsule holds a non-null pointer, an optional name, an optional context
//! pointer and an optional destructor. The destructor is a plain function
//! receiving the capsule itself, invoked once when the capsule is released;
//! richer cleanup state belongs in the context pointer.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr;

use crate::err;
use crate::object::{alloc, body, Body, ObjPtr};
use crate::types::builtin;

/// Destructor invoked with the dying capsule.
pub type CapsuleDestructor = fn(ObjPtr);

pub(crate) struct CapsuleData {
    pointer: Cell<*mut c_void>,
    name: RefCell<Option<String>>,
    context: Cell<*mut c_void>,
    destructor: Cell<Option<CapsuleDestructor>>,
}

impl CapsuleData {
    pub(crate) fn run_destructor(&self, capsule: ObjPtr) {
        if let Some(destructor) = self.destructor.take() {
            destructor(capsule);
        }
    }
}

fn data<'a>(capsule: ObjPtr, caller: &str) -> Option<&'a CapsuleData> {
    if !capsule.is_null() {
        if let Body::Capsule(d) = body(capsule) {
            return Some(d);
        }
    }
    err::set_string(
        builtin().value_error,
        &format!("{caller} called with invalid capsule object"),
    );
    None
}

/// New capsule. A null `pointer` raises `ValueError`.
pub fn capsule_new(
    pointer: *mut c_void,
    name: Option<&str>,
    destructor: Option<CapsuleDestructor>,
) -> ObjPtr {
    if pointer.is_null() {
        err::set_string(builtin().value_error, "capsule_new called with null pointer");
        return ptr::null_mut();
    }
    alloc(
        builtin().capsule,
        Body::Capsule(CapsuleData {
            pointer: Cell::new(pointer),
            name: RefCell::new(name.map(str::to_owned)),
            context: Cell::new(ptr::null_mut()),
            destructor: Cell::new(destructor),
        }),
    )
}

pub fn is_capsule(obj: ObjPtr) -> bool {
    !obj.is_null() && matches!(body(obj), Body::Capsule(_))
}

/// Stored pointer, checked against `name`. A mismatch raises `ValueError`
/// and returns null.
pub fn capsule_get_pointer(capsule: ObjPtr, name: Option<&str>) -> *mut c_void {
    let Some(d) = data(capsule, "capsule_get_pointer") else {
        return ptr::null_mut();
    };
    if d.name.borrow().as_deref() != name {
        err::set_string(
            builtin().value_error,
            "capsule_get_pointer called with incorrect name",
        );
        return ptr::null_mut();
    }
    d.pointer.get()
}

/// Replace the stored pointer (must be non-null). Returns 0 or -1.
pub fn capsule_set_pointer(capsule: ObjPtr, pointer: *mut c_void) -> i32 {
    if pointer.is_null() {
        err::set_string(
            builtin().value_error,
            "capsule_set_pointer called with null pointer",
        );
        return -1;
    }
    match data(capsule, "capsule_set_pointer") {
        Some(d) => {
            d.pointer.set(pointer);
            0
        }
        None => -1,
    }
}

/// Capsule name (None when unnamed or not a capsule).
pub fn capsule_name(capsule: ObjPtr) -> Option<String> {
    match body(capsule) {
        Body::Capsule(d) => d.name.borrow().clone(),
        _ => None,
    }
}

pub fn capsule_set_name(capsule: ObjPtr, name: Option<&str>) -> i32 {
    match data(capsule, "capsule_set_name") {
        Some(d) => {
            *d.name.borrow_mut() = name.map(str::to_owned);
            0
        }
        None => -1,
    }
}

/// Context pointer (null when unset). Null with an error set for
/// non-capsules.
pub fn capsule_get_context(capsule: ObjPtr) -> *mut c_void {
    data(capsule, "capsule_get_context").map_or(ptr::null_mut(), |d| d.context.get())
}

pub fn capsule_set_context(capsule: ObjPtr, context: *mut c_void) -> i32 {
    match data(capsule, "capsule_set_context") {
        Some(d) => {
            d.context.set(context);
            0
        }
        None => -1,
    }
}

pub fn capsule_set_destructor(capsule: ObjPtr, destructor: Option<CapsuleDestructor>) -> i32 {
    match data(capsule, "capsule_set_destructor") {
        Some(d) => {
            d.destructor.set(destructor);
            0
        }
        None => -1,
    }
}

/// True if `obj` is a capsule named `name`. Never raises.
pub fn capsule_is_valid(obj: ObjPtr, name: Option<&str>) -> bool {
    match (!obj.is_null()).then(|| body(obj)) {
        Some(Body::Capsule(d)) => d.name.borrow().as_deref() == name,
        _ => false,
    }
}
