// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Two independently built modules sharing one internals registry.
//!
//! Kept in its own test binary as a single test: every phase starts and
//! stops the process-wide interpreter.

use std::ffi::c_void;
use std::sync::{Arc, Barrier};
use std::thread;

use hostlink::error::ErrorAlreadySet;
use hostlink::internals::{get_or_create, Internals, ModuleLocal, BUILTIN_OWNER};
use hostlink::translate::{translate_fault, translate_local, Fault};
use hostlink::Handle;
use hostlink_rt::{builtin, err, gil, interp};

struct BetaFault;

fn translate_beta(fault: Fault) -> Result<(), Fault> {
    if fault.is::<BetaFault>() {
        err::set_string(builtin().value_error, "beta fault");
        return Ok(());
    }
    translate_local(fault)
}

static ALPHA: ModuleLocal = ModuleLocal::new("alpha", translate_local);
static BETA: ModuleLocal = ModuleLocal::new("beta", translate_beta);
static GAMMA: ModuleLocal = ModuleLocal::new("gamma", translate_local);

fn start() {
    let _gil = gil::acquire();
    assert_eq!(interp::initialize(false), 0);
}

fn count(owners: &[&str], name: &str) -> usize {
    owners.iter().filter(|o| **o == name).count()
}

fn assert_beta_translates() {
    let _gil = gil::acquire();
    translate_fault(Fault::new(BetaFault));
    let e = ErrorAlreadySet::capture();
    assert!(e.matches(Handle::from_static(builtin().value_error)));
    assert_eq!(e.message(), "ValueError: beta fault");
}

/// Both modules race for first access; whoever wins, each translator is in
/// the chain exactly once.
fn racing_modules_share_one_registry() {
    start();
    let barrier = Arc::new(Barrier::new(2));
    let spawn = |local: &'static ModuleLocal| {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            get_or_create(local).unwrap()
        })
    };
    let alpha = spawn(&ALPHA);
    let beta = spawn(&BETA);
    let a = alpha.join().unwrap();
    let b = beta.join().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    // Repeated access neither duplicates nor reorders the chain.
    let before = a.translator_owners();
    let again = get_or_create(&BETA).unwrap();
    assert!(Arc::ptr_eq(&a, &again));
    drop(again);
    let owners = a.translator_owners();
    assert_eq!(owners, before);
    assert_eq!(owners.len(), 3, "{owners:?}");
    for name in ["alpha", "beta", BUILTIN_OWNER] {
        assert_eq!(count(&owners, name), 1, "{owners:?}");
    }
    assert_eq!(owners.last(), Some(&BUILTIN_OWNER));

    assert_beta_translates();

    // Shared data: last writer wins, absent keys are null.
    let mut first = 1u32;
    let mut second = 2u32;
    assert!(b.get_shared_data("counter").is_null());
    a.set_shared_data("counter", (&mut first as *mut u32).cast::<c_void>());
    b.set_shared_data("counter", (&mut second as *mut u32).cast::<c_void>());
    assert_eq!(
        a.get_shared_data("counter"),
        (&mut second as *mut u32).cast::<c_void>()
    );

    // Finalization destroys the registry exactly once.
    let weak = Arc::downgrade(&a);
    drop(a);
    drop(b);
    assert!(weak.upgrade().is_some());
    interp::finalize();
    assert!(weak.upgrade().is_none());
    assert!(get_or_create(&ALPHA).is_err());
    assert!(err::occurred().is_null());
}

/// The module that creates the registry registers its own translator too.
fn creator_translator_is_registered(first: &'static ModuleLocal, second: &'static ModuleLocal) {
    start();
    let created = get_or_create(first).unwrap();
    assert_eq!(created.translator_owners(), vec![first.name(), BUILTIN_OWNER]);

    let adopted = get_or_create(second).unwrap();
    assert!(Arc::ptr_eq(&created, &adopted));
    assert_eq!(
        created.translator_owners(),
        vec![second.name(), first.name(), BUILTIN_OWNER]
    );

    assert_beta_translates();
    drop((created, adopted));
    interp::finalize();
}

/// A registry kept alive by a caller across a restart is not reused.
fn restart_replaces_a_held_registry() {
    start();
    let old: Arc<Internals> = get_or_create(&ALPHA).unwrap();
    assert!(old.is_alive());
    interp::finalize();
    assert!(!old.is_alive());

    start();
    let fresh = get_or_create(&ALPHA).unwrap();
    assert!(!Arc::ptr_eq(&old, &fresh));
    assert!(fresh.is_alive());
    let gamma = get_or_create(&GAMMA).unwrap();
    assert!(Arc::ptr_eq(&fresh, &gamma));
    assert_eq!(count(&fresh.translator_owners(), "alpha"), 1);

    // Releasing the stale registry late leaves the live one untouched.
    drop(old);
    assert!(fresh.is_alive());
    assert!(Arc::ptr_eq(&get_or_create(&ALPHA).unwrap(), &fresh));

    drop((fresh, gamma));
    interp::finalize();
}

#[test]
fn modules_share_one_registry_per_interpreter() {
    racing_modules_share_one_registry();
    creator_translator_is_registered(&BETA, &ALPHA);
    creator_translator_is_registered(&ALPHA, &BETA);
    restart_replaces_a_held_registry();
}
