// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Constants and interpreter start-up configuration.
//!
//! Single source of truth for the values shared between independently
//! built modules. Changing [`INTERNALS_VERSION`] changes [`INTERNALS_ID`],
//! which means modules built against different layouts of the internals
//! registry never adopt each other's instance.

/// Layout version of the shared internals registry.
pub const INTERNALS_VERSION: u32 = 4;

/// Builtins key under which the internals registry capsule is published.
pub const INTERNALS_ID: &str = "__hostlink_internals_v4__";

/// Message raised when no exception translator recognizes a native fault.
pub const UNKNOWN_EXCEPTION_MESSAGE: &str = "Caught an unknown exception!";

/// Interpreter start-up options for [`crate::embed::initialize_interpreter`].
///
/// # Example
///
/// ```no_run
/// use hostlink::config::InterpreterConfig;
///
/// let config = InterpreterConfig::builder()
///     .init_signal_handlers(false)
///     .add_cwd_to_path(true)
///     .build();
/// assert!(!config.init_signal_handlers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Let the runtime install its signal handlers.
    pub init_signal_handlers: bool,
    /// Append `"."` to `sys.path` after start-up.
    pub add_cwd_to_path: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            init_signal_handlers: true,
            add_cwd_to_path: true,
        }
    }
}

impl InterpreterConfig {
    #[must_use]
    pub fn builder() -> InterpreterConfigBuilder {
        InterpreterConfigBuilder::default()
    }
}

/// Builder for [`InterpreterConfig`].
#[derive(Debug, Default)]
pub struct InterpreterConfigBuilder {
    config: InterpreterConfig,
}

impl InterpreterConfigBuilder {
    #[must_use]
    pub fn init_signal_handlers(mut self, enabled: bool) -> Self {
        self.config.init_signal_handlers = enabled;
        self
    }

    #[must_use]
    pub fn add_cwd_to_path(mut self, enabled: bool) -> Self {
        self.config.add_cwd_to_path = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> InterpreterConfig {
        self.config
    }
}
