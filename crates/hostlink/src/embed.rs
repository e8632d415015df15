// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Embedding lifecycle: start and stop the interpreter from native code.
//!
//! # Example
//!
//! ```ignore
//! use hostlink::config::InterpreterConfig;
//! use hostlink::embed::ScopedInterpreter;
//!
//! let _interp = ScopedInterpreter::new(&InterpreterConfig::default())?;
//! let sys = hostlink::types::Module::import("sys")?;
//! ```
//!
//! Objects must not outlive [`finalize_interpreter`]; nothing here checks
//! that.

use std::sync::Arc;

use hostlink_rt::{gil, interp, ObjPtr};

use crate::config::InterpreterConfig;
use crate::error::{self, Error, Result};
use crate::types::{List, Module};

/// Initializer of an embedded module: fills the freshly created module.
pub type ModuleInit = fn(&Module) -> Result<()>;

/// Register `name` so `import name` builds it with `init`. Only valid
/// before the interpreter starts.
pub fn embedded_module(name: &'static str, init: ModuleInit) -> Result<()> {
    if interp::is_initialized() {
        return Err(Error::fatal(
            "Can't add new modules after the interpreter has been initialized",
        ));
    }
    let build = move || -> ObjPtr {
        let module = match Module::new(name) {
            Ok(m) => m,
            Err(e) => {
                e.restore();
                return std::ptr::null_mut();
            }
        };
        match init(&module) {
            Ok(()) => module.into_object().release().ptr(),
            Err(e) => {
                e.restore();
                std::ptr::null_mut()
            }
        }
    };
    error::status(interp::append_inittab(name, Arc::new(build)))?;
    log::debug!("[Embed] embedded module '{name}' registered");
    Ok(())
}

/// Start the interpreter.
pub fn initialize_interpreter(config: &InterpreterConfig) -> Result<()> {
    let _gil = gil::acquire();
    if interp::is_initialized() {
        return Err(Error::fatal("The interpreter is already running"));
    }
    error::status(interp::initialize(config.init_signal_handlers))?;
    if config.add_cwd_to_path {
        let path = error::borrowed_ref(interp::sys_path())?;
        List::try_from_object(path)?.append(".")?;
    }
    log::debug!(
        "[Embed] interpreter started (signal handlers: {}, cwd on path: {})",
        config.init_signal_handlers,
        config.add_cwd_to_path
    );
    Ok(())
}

/// Stop the interpreter. The internals registry published in builtins is
/// destroyed with it.
pub fn finalize_interpreter() {
    let _gil = gil::acquire();
    interp::finalize();
    log::debug!("[Embed] interpreter finalized");
}

/// Interpreter that lives as long as the value, holding the lock throughout.
pub struct ScopedInterpreter {
    _gil: gil::GilGuard,
}

impl ScopedInterpreter {
    pub fn new(config: &InterpreterConfig) -> Result<Self> {
        let guard = gil::acquire();
        initialize_interpreter(config)?;
        Ok(Self { _gil: guard })
    }
}

impl Drop for ScopedInterpreter {
    fn drop(&mut self) {
        finalize_interpreter();
    }
}

impl std::fmt::Debug for ScopedInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedInterpreter").finish_non_exhaustive()
    }
}
