// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native callables exposed to the runtime.
//!
//! Only the boundary is handled here: arguments arrive as a tuple and an
//! optional keyword dict, the result or fault leaves through
//! [`translate::guarded`](crate::translate::guarded). Argument conversion and
//! overload selection belong to the caller's closure.

use hostlink_rt::{function, ObjPtr};

use crate::error::{self, Result};
use crate::handle::Handle;
use crate::object::Object;
use crate::translate::{self, Fault};
use crate::types::{Dict, Function, Tuple};

/// Wrap `f` as a host callable named `name`.
pub fn native_function<F>(name: &str, f: F) -> Result<Function>
where
    F: Fn(&Tuple, Option<&Dict>) -> std::result::Result<Object, Fault> + 'static,
{
    let call = move |args: ObjPtr, kwargs: ObjPtr| -> ObjPtr {
        translate::guarded(|| {
            // SAFETY: the runtime lends both for the duration of the call.
            let args = Tuple::from_object_unchecked(Object::borrow(unsafe { Handle::from_ptr(args) }));
            let kwargs = (!kwargs.is_null()).then(|| {
                Dict::from_object_unchecked(Object::borrow(unsafe { Handle::from_ptr(kwargs) }))
            });
            f(&args, kwargs.as_ref())
        })
    };
    let obj = error::alloc_ref(function::function_new(name, call), "function")?;
    Ok(Function::from_object_unchecked(obj))
}
