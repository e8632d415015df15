// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hostlink - object ownership and interop layer
//!
//! Safe, reference-count-correct bindings over the `hostlink-rt` object
//! runtime: owning references, error capture and translation, lazy
//! accessors, iterators, typed wrappers and the process-wide internals
//! registry shared by every module loaded into one interpreter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostlink::config::InterpreterConfig;
//! use hostlink::embed::ScopedInterpreter;
//! use hostlink::{ObjectApi, Result, Str};
//!
//! fn main() -> Result<()> {
//!     let _interp = ScopedInterpreter::new(&InterpreterConfig::default())?;
//!
//!     let greeting = Str::new("Hello, World!")?;
//!     let bytes = greeting.encode()?;
//!     assert_eq!(bytes.as_bytes(), b"Hello, World!");
//!
//!     let missing = greeting.attr("nope").get_or(hostlink::NoneObject::new().into());
//!     assert!(missing.is_none());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                     Typed wrappers (types)                          |
//! |   Str | Bytes | Int | Tuple | List | Dict | Set | Capsule | ...     |
//! +---------------------------------------------------------------------+
//! |        Accessors (accessor)        |     Iterators (iterators)      |
//! |   attr | item | seq | list | tuple |  fast | slow | dict | host     |
//! +---------------------------------------------------------------------+
//! |              Owning references (object) over Handle                 |
//! +---------------------------------------------------------------------+
//! |   Error bridge (error, translate)  |  Internals registry (internals)|
//! +---------------------------------------------------------------------+
//! |                        hostlink-rt runtime                          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Handle`] | Non-owning view of a runtime object |
//! | [`Object`] | Owning reference: clone increments, drop decrements |
//! | [`ErrorAlreadySet`] | Captured runtime error, restorable once |
//! | [`Accessor`] | Lazy `obj.attr` / `obj[key]` proxy |
//! | [`Internals`](internals::Internals) | Registry shared across modules |
//!
//! ## Threading
//!
//! Every call into the runtime requires the interpreter lock. Only the
//! registry's lazy creation and the embedding lifecycle take it themselves.
//!
//! ## Modules Overview
//!
//! - [`object`] - `Object`, `ObjectApi`, `ToObject`
//! - [`error`] - error types and capture/restore
//! - [`translate`] - native fault to host error translation
//! - [`internals`] - shared registry, type map, shared data
//! - [`accessor`] - attribute and item proxies
//! - [`iterators`] - iteration policies and the host iterator
//! - [`types`] - typed wrappers
//! - [`builtins`] - `isinstance`, `getattr`, `len`, ...
//! - [`embed`] - interpreter start/stop
//! - [`eval`] - literal expression evaluation
//! - [`options`] - scoped global options
//! - [`logging`] - `env_logger` setup

pub mod accessor;
pub mod builtins;
pub mod config;
pub mod embed;
pub mod error;
pub mod eval;
pub mod function;
pub mod gil;
pub mod handle;
pub mod internals;
pub mod iterators;
pub mod logging;
pub mod object;
pub mod options;
pub mod translate;
pub mod types;

pub use accessor::{AccessKey, Accessor};
pub use error::{BuiltinError, Error, ErrorAlreadySet, NativeError, Result};
pub use handle::Handle;
pub use object::{Object, ObjectApi, ToObject};
pub use translate::{register_exception_translator, ExceptionTranslator, Fault};
pub use types::{
    Bool, Buffer, BufferInfo, ByteArray, Bytes, Capsule, Dict, Float, Function, HostIterator, Int,
    Iterable, List, MemoryView, Module, NoneObject, Sequence, Set, Slice, Str, Tuple, WeakRef,
};
