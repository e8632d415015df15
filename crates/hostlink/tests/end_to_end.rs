// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binding layer end to end against a running interpreter.

use hostlink::builtins;
use hostlink::config::UNKNOWN_EXCEPTION_MESSAGE;
use hostlink::error::ErrorAlreadySet;
use hostlink::types::HostIterator;
use hostlink::{
    register_exception_translator, Dict, Fault, Handle, List, Module, NativeError, Object, ObjectApi,
    Str, ToObject, Tuple,
};
use hostlink_rt::{builtin, err, gil, interp, values};

/// Hold the lock for the whole test and make sure the interpreter runs.
fn setup() -> gil::GilGuard {
    let guard = gil::acquire();
    assert_eq!(interp::initialize(false), 0);
    guard
}

fn sample() -> Object {
    // SAFETY: new reference.
    unsafe { Object::steal(values::list_new(0)) }
}

#[test]
fn hello_world_round_trips_through_bytes() {
    let _gil = setup();
    let text = Str::new("Hello, World!").unwrap();
    let bytes = text.encode().unwrap();
    assert_eq!(bytes.as_bytes(), b"Hello, World!");
    let back = Str::from_bytes(&bytes).unwrap();
    assert_eq!(back.as_str().as_bytes(), b"Hello, World!");
    assert!(back.equal(&text).unwrap());
}

#[test]
fn missing_attribute_with_default_does_not_raise() {
    let _gil = setup();
    let obj = List::new().unwrap();
    let default = 42i64.to_object().unwrap();
    let got = builtins::getattr_or(obj.handle(), "does_not_exist", default.clone());
    assert!(got.is(default.handle()));
    let via_accessor = obj.attr("does_not_exist").get_or(default.clone());
    assert!(via_accessor.is(default.handle()));
    assert!(err::occurred().is_null());
}

#[test]
fn iterator_reaches_sentinel_and_stays_there() {
    let _gil = setup();
    let list = List::new().unwrap();
    list.append("a").unwrap();
    list.append("b").unwrap();
    let it = list.as_object().iter().unwrap();
    let sentinel = HostIterator::sentinel();

    let mut seen = Vec::new();
    while !it.is_exhausted().unwrap() {
        seen.push(it.get().unwrap().str().unwrap().as_str().to_owned());
        it.advance().unwrap();
    }
    assert_eq!(seen, ["a", "b"]);
    assert!(it == sentinel);
    it.advance().unwrap();
    assert!(it == sentinel);
    assert!(err::occurred().is_null());
}

#[test]
fn accessor_set_reference_accounting() {
    let _gil = setup();
    let value = sample();
    let list = List::with_len(1).unwrap();
    let tuple = Tuple::with_len(1).unwrap();
    let generic = List::with_len(1).unwrap();

    list.get(0).set(&value).unwrap();
    assert_eq!(value.ref_count(), 2);
    tuple.get(0).set(&value).unwrap();
    assert_eq!(value.ref_count(), 3);
    generic.index(0).set(&value).unwrap();
    assert_eq!(value.ref_count(), 4);

    drop((list, tuple, generic));
    assert_eq!(value.ref_count(), 1);
}

#[test]
fn capture_then_restore_is_identity() {
    let _gil = setup();
    err::set_string(builtin().key_error, "k");
    let ty = err::occurred();
    let mut captured = ErrorAlreadySet::capture();
    assert!(err::occurred().is_null());
    let value = captured.value();
    captured.restore();
    assert_eq!(err::occurred(), ty);
    let again = ErrorAlreadySet::capture();
    assert_eq!(again.value(), value);
    captured.restore();
    assert!(err::occurred().is_null());
}

struct Quota(u32);

fn translate_quota(fault: Fault) -> Result<(), Fault> {
    match fault.downcast::<Quota>() {
        Ok(Quota(n)) => {
            err::set_string(builtin().overflow_error, &format!("quota {n} exceeded"));
            Ok(())
        }
        Err(fault) => Err(fault),
    }
}

#[test]
fn native_faults_surface_as_host_errors() {
    let _gil = setup();
    register_exception_translator(translate_quota).unwrap();

    let module = Module::new("faulty").unwrap();
    module
        .def("quota", |_, _| Err(Fault::new(Quota(3))))
        .unwrap()
        .def("length", |_, _| Err(NativeError::Length("too long".into()).into()))
        .unwrap()
        .def("opaque", |_, _| Err(Fault::new(0.5f32)))
        .unwrap()
        .def("echo", |args, _| Ok(args.get(0).get()?))
        .unwrap();

    let e = module.attr("quota").call(&[]).unwrap_err();
    assert!(e.matches(Handle::from_static(builtin().overflow_error)));
    assert_eq!(e.to_string(), "OverflowError: quota 3 exceeded");

    let e = module.attr("length").call(&[]).unwrap_err();
    assert!(e.matches(Handle::from_static(builtin().value_error)));

    let e = module.attr("opaque").call(&[]).unwrap_err();
    assert_eq!(e.to_string(), format!("RuntimeError: {UNKNOWN_EXCEPTION_MESSAGE}"));

    let arg = "ping".to_object().unwrap();
    let out = module.attr("echo").call(&[arg.clone()]).unwrap();
    assert!(out.is(arg.handle()));
}

#[test]
fn dict_traversal_sees_every_pair() {
    let _gil = setup();
    let dict = Dict::new().unwrap();
    for i in 0..5i64 {
        dict.set_item(i, i * i).unwrap();
    }
    let mut total = 0;
    for (k, v) in dict.iter() {
        let k = hostlink::Int::try_from_object(Object::borrow(k)).unwrap().to_i64().unwrap();
        let v = hostlink::Int::try_from_object(Object::borrow(v)).unwrap().to_i64().unwrap();
        assert_eq!(v, k * k);
        total += 1;
    }
    assert_eq!(total, 5);
}
