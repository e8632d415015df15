// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thread-specific storage keys.
//!
//! A key names one pointer-sized slot per thread. Slots start out null.
//! Keys are never reused, so a deleted key can not alias a newer one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::err;
use crate::object::fault;

static NEXT_KEY: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static SLOTS: RefCell<HashMap<usize, *mut c_void>> = RefCell::new(HashMap::new());
}

/// Handle to a thread-specific slot.
#[derive(Debug)]
pub struct TssKey {
    id: usize,
}

/// Allocate a key. Returns `None` with `MemoryError` set on allocation
/// failure.
pub fn tss_create() -> Option<TssKey> {
    if fault::take() {
        err::set_memory_error();
        return None;
    }
    Some(TssKey {
        id: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
    })
}

/// Release a key. The calling thread's slot is dropped; other threads'
/// values become unreachable.
pub fn tss_delete(key: TssKey) {
    SLOTS.with(|s| s.borrow_mut().remove(&key.id));
}

/// Store `value` in the calling thread's slot.
pub fn tss_set(key: &TssKey, value: *mut c_void) {
    SLOTS.with(|s| {
        let mut slots = s.borrow_mut();
        if value.is_null() {
            slots.remove(&key.id);
        } else {
            slots.insert(key.id, value);
        }
    });
}

/// The calling thread's value (null when unset).
pub fn tss_get(key: &TssKey) -> *mut c_void {
    SLOTS.with(|s| s.borrow().get(&key.id).copied().unwrap_or(ptr::null_mut()))
}
