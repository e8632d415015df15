// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global interpreter lock.
//!
//! One process-wide reentrant lock serializes every access to runtime
//! objects. A thread may nest acquisitions; [`held`] reports whether the
//! calling thread currently owns the lock.
//!
//! # Thread Safety
//!
//! The guard is `!Send`: it must be dropped on the thread that acquired it.

use std::cell::Cell;

use parking_lot::{const_reentrant_mutex, ReentrantMutex, ReentrantMutexGuard};

static GIL: ReentrantMutex<()> = const_reentrant_mutex(());

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Proof that the calling thread holds the interpreter lock.
pub struct GilGuard {
    _guard: ReentrantMutexGuard<'static, ()>,
}

/// Block until the interpreter lock is available, then take it.
pub fn acquire() -> GilGuard {
    let guard = GIL.lock();
    DEPTH.with(|d| d.set(d.get() + 1));
    GilGuard { _guard: guard }
}

/// Take the lock without blocking, if it is free or already ours.
pub fn try_acquire() -> Option<GilGuard> {
    let guard = GIL.try_lock()?;
    DEPTH.with(|d| d.set(d.get() + 1));
    Some(GilGuard { _guard: guard })
}

/// True if the calling thread holds the lock.
pub fn held() -> bool {
    depth() > 0
}

/// Nesting depth of the calling thread's acquisitions.
pub fn depth() -> usize {
    DEPTH.with(Cell::get)
}

impl Drop for GilGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_acquire_tracks_depth() {
        let outer = acquire();
        let base = depth();
        assert!(held());
        {
            let _inner = acquire();
            assert_eq!(depth(), base + 1);
        }
        assert_eq!(depth(), base);
        drop(outer);
    }

    #[test]
    fn test_other_thread_blocks_while_held() {
        let guard = acquire();
        let busy = std::thread::spawn(|| try_acquire().is_none())
            .join()
            .unwrap();
        assert!(busy);
        drop(guard);
    }
}
