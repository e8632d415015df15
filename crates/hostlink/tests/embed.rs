// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interpreter lifecycle. One test: it owns the interpreter of this binary.

use hostlink::config::InterpreterConfig;
use hostlink::embed::{embedded_module, finalize_interpreter, initialize_interpreter, ScopedInterpreter};
use hostlink::{Error, Int, List, Module, ObjectApi, Result};
use hostlink_rt::interp;

fn init_calc(module: &Module) -> Result<()> {
    module.add_object("answer", 42i64)?;
    module.def("double", |args, _| {
        let n = Int::try_from_object(args.get(0).get()?)?.to_i64()?;
        Ok(Int::new(n * 2)?.into_object())
    })?;
    Ok(())
}

#[test]
fn interpreter_lifecycle() {
    let _ = hostlink::logging::init_logging_env(hostlink::logging::LogLevel::Warn);
    embedded_module("calc", init_calc).unwrap();

    {
        let _interp = ScopedInterpreter::new(&InterpreterConfig::default()).unwrap();
        assert!(interp::is_initialized());

        let again = initialize_interpreter(&InterpreterConfig::default()).unwrap_err();
        assert!(matches!(&again, Error::Fatal(m) if m == "The interpreter is already running"));

        let late = embedded_module("late", init_calc).unwrap_err();
        assert!(matches!(late, Error::Fatal(_)));

        let sys = Module::import("sys").unwrap();
        let path = List::try_from_object(sys.attr("path").get().unwrap()).unwrap();
        assert!(path.as_object().contains(".").unwrap());

        let calc = Module::import("calc").unwrap();
        assert_eq!(calc.name().as_deref(), Some("calc"));
        assert!(calc.attr("answer").get().unwrap().equal(42i64).unwrap());
        let doubled = calc.attr("double").call(&[Int::new(21).unwrap().into()]).unwrap();
        assert!(doubled.equal(42i64).unwrap());
        assert!(Module::import("nowhere").is_err());
    }
    assert!(!interp::is_initialized());

    // Restart without touching sys.path.
    let config = InterpreterConfig::builder().add_cwd_to_path(false).build();
    initialize_interpreter(&config).unwrap();
    {
        let _gil = hostlink_rt::gil::acquire();
        let sys = Module::import("sys").unwrap();
        let path = List::try_from_object(sys.attr("path").get().unwrap()).unwrap();
        assert_eq!(path.len(), 0);
    }
    finalize_interpreter();
    assert!(!interp::is_initialized());
}
