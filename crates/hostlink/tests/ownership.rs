// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference counting under random clone/drop/take/release sequences.

use hostlink::{Handle, Object, ObjectApi};
use hostlink_rt::{gil, values};

fn sample() -> Object {
    // SAFETY: new reference from the runtime.
    unsafe { Object::steal(values::list_new(0)) }
}

#[test]
fn random_operation_sequences_balance() {
    let _gil = gil::acquire();
    let mut rng = fastrand::Rng::with_seed(0x5eed_0f_c0de);

    for _ in 0..64 {
        let root = sample();
        let base = root.ref_count();
        let mut held: Vec<Object> = Vec::new();
        let mut released: Vec<Handle> = Vec::new();
        let mut expected = base;

        for _ in 0..rng.usize(1..200) {
            match rng.u8(0..6) {
                0 => {
                    held.push(root.clone());
                    expected += 1;
                }
                1 => {
                    if !held.is_empty() {
                        held.swap_remove(rng.usize(..held.len()));
                        expected -= 1;
                    }
                }
                2 => {
                    // Move: no count change.
                    if let Some(mut obj) = held.pop() {
                        let moved = obj.take();
                        assert!(obj.is_null());
                        held.push(moved);
                    }
                }
                3 => {
                    if let Some(obj) = held.pop() {
                        released.push(obj.release());
                    }
                }
                4 => {
                    if let Some(h) = released.pop() {
                        // SAFETY: `h` carries the reference given up by `release`.
                        held.push(unsafe { Object::steal(h.ptr()) });
                    }
                }
                _ => {
                    if let Some(last) = held.last_mut() {
                        // Assigning an equal value: net zero once `other` drops.
                        let other = root.clone();
                        last.clone_from(&other);
                    }
                }
            }
            assert_eq!(root.ref_count(), expected);
        }

        for h in released.drain(..) {
            // SAFETY: as above.
            drop(unsafe { Object::steal(h.ptr()) });
        }
        held.clear();
        assert_eq!(root.ref_count(), base);
    }
}

#[test]
fn stolen_reference_drops_exactly_once() {
    let _gil = gil::acquire();
    let keeper = sample();
    assert_eq!(keeper.ref_count(), 1);
    let _ = keeper.handle().inc_ref();
    // SAFETY: the increment above is handed to the new owner.
    let stolen = unsafe { Object::steal(keeper.ptr()) };
    assert_eq!(keeper.ref_count(), 2);
    drop(stolen);
    assert_eq!(keeper.ref_count(), 1);
}

#[test]
fn self_assignment_keeps_the_object_alive() {
    let _gil = gil::acquire();
    let mut obj = sample();
    let alias = obj.clone();
    obj.clone_from(&alias);
    assert_eq!(obj.ref_count(), 2);
    drop(alias);
    assert_eq!(obj.ref_count(), 1);
}
