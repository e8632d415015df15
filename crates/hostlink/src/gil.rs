// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scoped interpreter lock acquisition.
//!
//! [`GilScopedAcquire`] takes the runtime lock and records the nesting depth
//! of the calling thread in the registry's thread-specific slot. The record
//! is allocated by the outermost guard and freed when it drops.
//!
//! # Thread Safety
//!
//! The guard is `!Send` (it holds the runtime's guard) and must be dropped
//! on the acquiring thread, innermost first.

use std::sync::Arc;

use hostlink_rt::{gil::GilGuard, tss};

use crate::error::Result;
use crate::internals::{get_internals, Internals, ThreadState};

/// RAII holder of the interpreter lock.
pub struct GilScopedAcquire {
    internals: Arc<Internals>,
    _guard: GilGuard,
}

impl GilScopedAcquire {
    /// Block until the lock is ours. Fails when the interpreter is not
    /// running.
    pub fn new() -> Result<Self> {
        let guard = hostlink_rt::gil::acquire();
        let internals = get_internals()?;
        if let Some(key) = internals.tstate_key() {
            let mut state = tss::tss_get(key).cast::<ThreadState>();
            if state.is_null() {
                state = Box::into_raw(Box::new(ThreadState { depth: 0 }));
                tss::tss_set(key, state.cast());
            }
            // SAFETY: this thread's record, only touched by this thread.
            unsafe { (*state).depth += 1 };
        }
        Ok(Self {
            internals,
            _guard: guard,
        })
    }

    /// Nesting depth of the calling thread's guards.
    pub fn depth(&self) -> usize {
        current_depth(&self.internals)
    }
}

fn current_depth(internals: &Internals) -> usize {
    internals.tstate_key().map_or(0, |key| {
        let state = tss::tss_get(key).cast::<ThreadState>();
        if state.is_null() {
            0
        } else {
            // SAFETY: see `GilScopedAcquire::new`.
            unsafe { (*state).depth }
        }
    })
}

impl Drop for GilScopedAcquire {
    fn drop(&mut self) {
        let Some(key) = self.internals.tstate_key() else {
            return;
        };
        let state = tss::tss_get(key).cast::<ThreadState>();
        if state.is_null() {
            return;
        }
        // SAFETY: allocated in `new` on this thread.
        unsafe {
            (*state).depth -= 1;
            if (*state).depth == 0 {
                tss::tss_set(key, std::ptr::null_mut());
                drop(Box::from_raw(state));
            }
        }
    }
}

impl std::fmt::Debug for GilScopedAcquire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GilScopedAcquire")
            .field("depth", &self.depth())
            .finish()
    }
}

/// Whether the calling thread holds the interpreter lock.
pub fn gil_held() -> bool {
    hostlink_rt::gil::held()
}
