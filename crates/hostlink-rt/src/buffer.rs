// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer protocol and memoryview objects.
//!
//! `bytes` exports a read-only buffer, `bytearray` a writable one, and a
//! memoryview re-exports whatever it wraps. A [`BufferView`] keeps its
//! exporter alive until dropped.
//!
//! # Raw memory
//!
//! `memoryview_from_memory` / `memoryview_from_buffer` wrap caller-owned
//! memory: the caller guarantees the region outlives every view of it.

use std::cell::RefCell;
use std::ptr;

use crate::err;
use crate::object::{alloc, body, dec_ref, inc_ref, Body, ObjPtr};
use crate::types::{builtin, obj_type_name};

/// An exported buffer.
#[derive(Debug)]
pub struct BufferView {
    obj: ObjPtr,
    pub buf: *mut u8,
    /// Total size in bytes.
    pub len: usize,
    pub itemsize: usize,
    pub format: String,
    pub shape: Vec<isize>,
    pub strides: Vec<isize>,
    pub readonly: bool,
}

impl BufferView {
    fn flat(obj: ObjPtr, buf: *mut u8, len: usize, readonly: bool) -> Self {
        inc_ref(obj);
        Self {
            obj,
            buf,
            len,
            itemsize: 1,
            format: "B".to_owned(),
            shape: vec![len as isize],
            strides: vec![1],
            readonly,
        }
    }

    /// Exporting object (borrowed, null for raw memory).
    pub fn obj(&self) -> ObjPtr {
        self.obj
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    fn reexport(&self, owner: ObjPtr) -> Self {
        inc_ref(owner);
        Self {
            obj: owner,
            buf: self.buf,
            len: self.len,
            itemsize: self.itemsize,
            format: self.format.clone(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            readonly: self.readonly,
        }
    }

    /// Copy the viewed bytes in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        if !self.buf.is_null() {
            self.gather(0, 0, &mut out);
        }
        out
    }

    fn gather(&self, dim: usize, offset: isize, out: &mut Vec<u8>) {
        if dim == self.shape.len() {
            // SAFETY: the exporter (or the raw-memory contract) keeps
            // `itemsize` bytes at `buf + offset` alive and in bounds.
            let item = unsafe {
                std::slice::from_raw_parts(self.buf.offset(offset), self.itemsize)
            };
            out.extend_from_slice(item);
            return;
        }
        for i in 0..self.shape[dim] {
            self.gather(dim + 1, offset + i * self.strides[dim], out);
        }
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        dec_ref(self.obj);
    }
}

pub(crate) struct ViewData {
    view: RefCell<Option<BufferView>>,
}

impl ViewData {
    pub(crate) fn release(&self) {
        drop(self.view.borrow_mut().take());
    }
}

/// Export `obj`'s buffer. Requesting a writable buffer from a read-only
/// exporter raises `BufferError`; non-exporters raise `TypeError`.
pub fn get_buffer(obj: ObjPtr, writable: bool) -> Option<BufferView> {
    let b = builtin();
    let view = match body(obj) {
        Body::Bytes(data) => BufferView::flat(obj, data.as_ptr().cast_mut(), data.len(), true),
        Body::ByteArray(data) => {
            let mut data = data.borrow_mut();
            BufferView::flat(obj, data.as_mut_ptr(), data.len(), false)
        }
        Body::MemoryView(data) => match data.view.borrow().as_ref() {
            Some(inner) => inner.reexport(obj),
            None => {
                err::set_string(b.value_error, "operation forbidden on released memoryview object");
                return None;
            }
        },
        _ => {
            err::set_string(
                b.type_error,
                &format!("a bytes-like object is required, not '{}'", obj_type_name(obj)),
            );
            return None;
        }
    };
    if writable && view.readonly {
        err::set_string(b.buffer_error, "Object is not writable.");
        return None;
    }
    Some(view)
}

/// True if `obj` exports a buffer.
pub fn check_buffer(obj: ObjPtr) -> bool {
    matches!(
        body(obj),
        Body::Bytes(_) | Body::ByteArray(_) | Body::MemoryView(_)
    )
}

fn wrap(view: BufferView) -> ObjPtr {
    alloc(
        builtin().memoryview,
        Body::MemoryView(ViewData {
            view: RefCell::new(Some(view)),
        }),
    )
}

/// `memoryview(obj)`.
pub fn memoryview_from_object(obj: ObjPtr) -> ObjPtr {
    match get_buffer(obj, false) {
        Some(view) => wrap(view),
        None => ptr::null_mut(),
    }
}

/// One-dimensional byte view over caller-owned memory.
pub fn memoryview_from_memory(buf: *mut u8, len: usize, readonly: bool) -> ObjPtr {
    if buf.is_null() && len > 0 {
        err::set_string(builtin().value_error, "memoryview: null buffer with non-zero size");
        return ptr::null_mut();
    }
    wrap(BufferView::flat(ptr::null_mut(), buf, len, readonly))
}

/// Strided view over caller-owned memory.
pub fn memoryview_from_buffer(
    buf: *mut u8,
    itemsize: usize,
    format: &str,
    shape: &[isize],
    strides: &[isize],
    readonly: bool,
) -> ObjPtr {
    let b = builtin();
    if shape.len() != strides.len() {
        err::set_string(b.value_error, "memoryview: shape and strides must have the same length");
        return ptr::null_mut();
    }
    if shape.iter().any(|&n| n < 0) {
        err::set_string(b.value_error, "memoryview: negative dimension");
        return ptr::null_mut();
    }
    let items: isize = shape.iter().product();
    wrap(BufferView {
        obj: ptr::null_mut(),
        buf,
        len: items as usize * itemsize,
        itemsize,
        format: format.to_owned(),
        shape: shape.to_vec(),
        strides: strides.to_vec(),
        readonly,
    })
}

/// Length of the first dimension (1 for zero-dimensional views).
pub(crate) fn view_len(mv: ObjPtr) -> isize {
    match body(mv) {
        Body::MemoryView(data) => data
            .view
            .borrow()
            .as_ref()
            .map_or(0, |v| v.shape.first().copied().unwrap_or(1)),
        _ => -1,
    }
}

pub(crate) fn view_bytes(mv: ObjPtr) -> Option<Vec<u8>> {
    get_buffer(mv, false).map(|v| v.to_vec())
}

/// `memoryview.tobytes()`.
pub fn memoryview_tobytes(mv: ObjPtr) -> ObjPtr {
    if !matches!(body(mv), Body::MemoryView(_)) {
        err::set_string(builtin().type_error, "expected a memoryview");
        return ptr::null_mut();
    }
    match view_bytes(mv) {
        Some(data) => crate::values::bytes_from_slice(&data),
        None => ptr::null_mut(),
    }
}

/// Drop the wrapped view early; later accesses raise `ValueError`.
pub fn memoryview_release(mv: ObjPtr) {
    if let Body::MemoryView(data) = body(mv) {
        data.release();
    }
}
