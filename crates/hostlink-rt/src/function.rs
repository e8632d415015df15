// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native callables and native iterators.

use std::cell::RefCell;

use crate::object::{alloc, body, Body, NativeIterFn, ObjPtr};
use crate::types::builtin;

/// Native call target: receives the borrowed argument tuple and keyword dict
/// (or null) and returns a new reference, or null with an error set.
pub type NativeCall = Box<dyn Fn(ObjPtr, ObjPtr) -> ObjPtr>;

pub(crate) struct FunctionData {
    pub name: String,
    pub call: NativeCall,
}

/// Wrap a native closure as a callable runtime object.
pub fn function_new(name: &str, call: impl Fn(ObjPtr, ObjPtr) -> ObjPtr + 'static) -> ObjPtr {
    alloc(
        builtin().function,
        Body::Function(FunctionData {
            name: name.to_owned(),
            call: Box::new(call),
        }),
    )
}

pub fn is_function(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Function(_))
}

pub fn function_name(obj: ObjPtr) -> Option<String> {
    match body(obj) {
        Body::Function(data) => Some(data.name.clone()),
        _ => None,
    }
}

/// Iterator object driven by `next`: each call returns a new reference, or
/// null to stop (no error) or fail (error set; `StopIteration` counts as a
/// normal stop).
pub fn native_iter_new(next: impl FnMut() -> ObjPtr + 'static) -> ObjPtr {
    let producer: NativeIterFn = Box::new(next);
    alloc(builtin().iterator, Body::NativeIter(RefCell::new(Some(producer))))
}
