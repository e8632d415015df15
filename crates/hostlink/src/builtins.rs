// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Free functions mirroring the host's builtins.

use hostlink_rt::{err, ops, types as rt_types};

use crate::error::{self, Error, Result};
use crate::handle::Handle;
use crate::object::{Object, ObjectApi, ToObject};
use crate::types::{HostIterator, Str};

/// `isinstance(obj, ty)`; `ty` may be a tuple of types.
pub fn isinstance(obj: Handle, ty: Handle) -> Result<bool> {
    error::flag(rt_types::is_instance(obj.ptr(), ty.ptr()))
}

/// `hasattr(obj, name)`. Never raises.
pub fn hasattr(obj: Handle, name: Handle) -> bool {
    ops::hasattr(obj.ptr(), name.ptr())
}

pub fn hasattr_str(obj: Handle, name: &str) -> bool {
    ops::hasattr_str(obj.ptr(), name)
}

pub fn getattr(obj: Handle, name: Handle) -> Result<Object> {
    error::new_ref(ops::getattr(obj.ptr(), name.ptr()))
}

pub fn getattr_str(obj: Handle, name: &str) -> Result<Object> {
    error::new_ref(ops::getattr_str(obj.ptr(), name))
}

/// `getattr(obj, name, default)`.
///
/// Any failure during the lookup yields `default`, and the pending error is
/// cleared whatever its type.
pub fn getattr_or(obj: Handle, name: &str, default: Object) -> Object {
    let found = ops::getattr_str(obj.ptr(), name);
    if found.is_null() {
        err::clear();
        return default;
    }
    // SAFETY: new reference.
    unsafe { Object::steal(found) }
}

pub fn setattr(obj: Handle, name: &str, value: impl ToObject) -> Result<()> {
    let value = value.to_object()?;
    error::status(ops::setattr_str(obj.ptr(), name, value.ptr()))
}

pub fn delattr(obj: Handle, name: &str) -> Result<()> {
    error::status(ops::delattr_str(obj.ptr(), name))
}

pub fn hash(obj: Handle) -> Result<i64> {
    obj.hash_value()
}

/// `len(obj)`. Objects without a length are a caller bug here.
pub fn len(obj: Handle) -> Result<usize> {
    let n = ops::length(obj.ptr());
    if n < 0 {
        let e = Error::fetch();
        return Err(Error::Fatal(format!("Unable to compute length of object: {e}")));
    }
    error::size(n)
}

/// Best-effort size estimate; `0` when the object can not tell.
pub fn len_hint(obj: Handle) -> usize {
    let n = ops::length_hint(obj.ptr(), 0);
    if n < 0 {
        err::clear();
        return 0;
    }
    n as usize
}

pub fn repr(obj: Handle) -> Result<Str> {
    obj.repr()
}

pub fn str(obj: Handle) -> Result<Str> {
    obj.str()
}

pub fn iter(obj: Handle) -> Result<HostIterator> {
    obj.iter()
}
