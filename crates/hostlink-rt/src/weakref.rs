// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Weak references.
//!
//! A weak reference does not own its target. The target keeps a list of the
//! weak references pointing at it; when it dies each one is cleared and its
//! callback (if any) is called with the dead weak reference.

use std::cell::Cell;
use std::ptr;

use crate::err;
use crate::object::{alloc, body, dec_ref, inc_ref, is_immortal, obj, Body, ObjPtr};
use crate::ops;
use crate::types::{builtin, obj_type_name};
use crate::values;

pub(crate) struct WeakRefData {
    pub target: Cell<ObjPtr>,
    /// Owned callback, or null.
    pub callback: ObjPtr,
}

fn supports_weakrefs(target: ObjPtr) -> bool {
    !is_immortal(target)
        && matches!(
            body(target),
            Body::Instance { .. }
                | Body::Type(_)
                | Body::Function(_)
                | Body::Module { .. }
                | Body::Set(_)
                | Body::Capsule(_)
                | Body::Exception(_)
        )
}

/// `weakref.ref(target, callback)`. `callback` may be null or `None`.
pub fn weakref_new(target: ObjPtr, callback: ObjPtr) -> ObjPtr {
    if !supports_weakrefs(target) {
        err::set_string(
            builtin().type_error,
            &format!("cannot create weak reference to '{}' object", obj_type_name(target)),
        );
        return ptr::null_mut();
    }
    let callback = if callback.is_null() || values::is_none(callback) {
        ptr::null_mut()
    } else {
        inc_ref(callback);
        callback
    };
    let wr = alloc(
        builtin().weakref,
        Body::WeakRef(WeakRefData {
            target: Cell::new(target),
            callback,
        }),
    );
    if !wr.is_null() {
        obj(target).weaklist().borrow_mut().push(wr);
    }
    wr
}

pub fn is_weakref(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::WeakRef(_))
}

/// Borrowed target, or `None` once the target has died. Null with
/// `TypeError` for non-weakrefs.
pub fn weakref_get_object(wr: ObjPtr) -> ObjPtr {
    match body(wr) {
        Body::WeakRef(data) => {
            let target = data.target.get();
            if target.is_null() {
                values::none()
            } else {
                target
            }
        }
        _ => {
            err::set_string(builtin().type_error, "expected a weak reference");
            ptr::null_mut()
        }
    }
}

/// Unlink a dying weak reference from its target.
pub(crate) fn detach(wr: ObjPtr, data: &WeakRefData) {
    let target = data.target.replace(ptr::null_mut());
    if !target.is_null() {
        obj(target).weaklist().borrow_mut().retain(|&w| w != wr);
    }
}

/// Clear every weak reference to a dying object and run the callbacks.
/// Callback failures are discarded.
pub(crate) fn notify_dead(weakrefs: Vec<ObjPtr>) {
    for wr in &weakrefs {
        if let Body::WeakRef(data) = body(*wr) {
            data.target.set(ptr::null_mut());
        }
    }
    for wr in weakrefs {
        let Body::WeakRef(data) = body(wr) else {
            continue;
        };
        if data.callback.is_null() {
            continue;
        }
        inc_ref(wr);
        let saved = err::fetch();
        let result = ops::call_one(data.callback, wr);
        if result.is_null() {
            log::debug!("[WeakRef] callback raised; discarded");
        }
        dec_ref(result);
        err::restore(saved.0, saved.1, saved.2);
        dec_ref(wr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{function, gil, types};
    use std::rc::Rc;

    #[test]
    fn test_weakref_cleared_when_target_dies() {
        let _gil = gil::acquire();
        let cls = types::type_new("Target", builtin().object, ptr::null_mut());
        let target = ops::call(cls, ptr::null_mut(), ptr::null_mut());
        let wr = weakref_new(target, ptr::null_mut());
        assert_eq!(weakref_get_object(wr), target);

        dec_ref(target);
        assert!(values::is_none(weakref_get_object(wr)));
        dec_ref(wr);
        dec_ref(cls);
    }

    #[test]
    fn test_callback_receives_weakref() {
        let _gil = gil::acquire();
        let fired = Rc::new(Cell::new(ptr::null_mut()));
        let seen = Rc::clone(&fired);
        let callback = function::function_new("on_dead", move |args, _| {
            seen.set(ops::tuple_get_item(args, 0));
            values::none()
        });
        let cls = types::type_new("Target", builtin().object, ptr::null_mut());
        let target = ops::call(cls, ptr::null_mut(), ptr::null_mut());
        let wr = weakref_new(target, callback);

        dec_ref(target);
        assert_eq!(fired.get(), wr);
        for p in [wr, callback, cls] {
            dec_ref(p);
        }
    }

    #[test]
    fn test_ints_do_not_support_weakrefs() {
        let _gil = gil::acquire();
        let n = values::int_from_i64(3);
        assert!(weakref_new(n, ptr::null_mut()).is_null());
        assert!(err::exception_matches(builtin().type_error));
        err::clear();
        dec_ref(n);
    }
}
