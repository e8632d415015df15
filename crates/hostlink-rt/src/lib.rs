// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hostlink-rt - reference host object runtime
//!
//! A small dynamically typed, reference-counted object runtime with a
//! C-API-shaped surface. It is the runtime that `hostlink` binds against.
//!
//! ## Conventions
//!
//! ```text
//! +--------------------------------------------------------------+
//! | call returns            | meaning                            |
//! |-------------------------|------------------------------------|
//! | ObjPtr (non-null)       | new reference, unless "borrowed"   |
//! | ObjPtr (null)           | failure, error indicator is set    |
//! | i32 / isize == -1       | failure, error indicator is set    |
//! +--------------------------------------------------------------+
//! ```
//!
//! Functions documented as *stealing* take over one reference to their
//! argument, even when they fail. Everything else borrows.
//!
//! ## Safety: raw pointer arguments
//!
//! The runtime surface mirrors a C object API: functions take `ObjPtr`
//! arguments and dereference them. Callers must pass null (where documented)
//! or pointers obtained from this runtime that are still alive, and must hold
//! the GIL ([`gil::acquire`]). Marking every entry point `unsafe` would add
//! noise without adding safety; the `hostlink` crate is the safe layer.
//!
//! ## Modules Overview
//!
//! - [`object`] - object header, reference counting, allocation
//! - [`types`] - builtin type objects and the exception hierarchy
//! - [`err`] - per-thread error indicator
//! - [`gil`] - global interpreter lock
//! - [`interp`] - interpreter lifecycle, builtins, `sys`, imports
//! - [`ops`] - abstract object protocols (attributes, items, iteration, calls)
//! - [`values`] - scalar and container constructors/accessors

pub mod buffer;
pub mod capsule;
pub mod err;
pub mod function;
pub mod gil;
pub mod interp;
pub mod object;
pub mod ops;
pub mod slice;
mod table;
pub mod tss;
pub mod types;
pub mod values;
pub mod weakref;

pub use object::{dec_ref, inc_ref, refcount, type_of, HostObject, ObjPtr};
pub use types::{builtin, BuiltinTypes, TypeKind};
