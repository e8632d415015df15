// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interpreter lifecycle, the builtins namespace, `sys` and imports.
//!
//! # Architecture
//!
//! ```text
//! initialize()
//!   +-- builtins dict   (types, exceptions, None/True/False)
//!   +-- modules dict    ("builtins", "sys", imported modules)
//!   +-- sys module      (sys.path list, sys.modules)
//!
//! import_module(name)
//!   modules dict hit  -> cached module
//!   inittab entry     -> init(), cache, return
//!   otherwise         -> ImportError
//! ```
//!
//! Every function here expects the caller to hold the GIL.

use std::ptr;
use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};

use crate::err;
use crate::object::{alloc, body, dec_ref, Body, ObjPtr};
use crate::types::builtin;
use crate::values;

/// Module initializer registered before start-up: returns a new module
/// reference, or null with an error set.
pub type InitFn = Arc<dyn Fn() -> ObjPtr + Send + Sync>;

struct State {
    builtins: ObjPtr,
    modules: ObjPtr,
    sys: ObjPtr,
    signal_handlers: bool,
}

// SAFETY: the pointers are only dereferenced by threads holding the GIL.
unsafe impl Send for State {}

static STATE: Mutex<Option<State>> = const_mutex(None);
static INITTAB: Mutex<Vec<(String, InitFn)>> = const_mutex(Vec::new());

// ============================================================================
// Modules
// ============================================================================

/// New module object named `name` with an empty namespace.
pub fn module_new(name: &str) -> ObjPtr {
    let dict = values::dict_new();
    if dict.is_null() {
        return ptr::null_mut();
    }
    let name_obj = values::str_from_str(name);
    if name_obj.is_null() || values::dict_set_item_str(dict, "__name__", name_obj) < 0 {
        dec_ref(name_obj);
        dec_ref(dict);
        return ptr::null_mut();
    }
    dec_ref(name_obj);
    alloc(
        builtin().module,
        Body::Module {
            name: name.to_owned(),
            dict,
        },
    )
}

pub fn is_module(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Module { .. })
}

/// Module namespace (borrowed).
pub fn module_dict(module: ObjPtr) -> ObjPtr {
    match body(module) {
        Body::Module { dict, .. } => *dict,
        _ => ptr::null_mut(),
    }
}

pub fn module_name(module: ObjPtr) -> Option<String> {
    match body(module) {
        Body::Module { name, .. } => Some(name.clone()),
        _ => None,
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Register an embedded module. Must happen before [`initialize`]; later
/// registrations fail with `RuntimeError`. Registrations survive
/// [`finalize`].
pub fn append_inittab(name: &str, init: InitFn) -> i32 {
    if is_initialized() {
        err::set_string(
            builtin().runtime_error,
            "append_inittab called after the interpreter was initialized",
        );
        return -1;
    }
    INITTAB.lock().push((name.to_owned(), init));
    0
}

pub fn is_initialized() -> bool {
    STATE.lock().is_some()
}

/// Whether the running interpreter installed its signal handlers.
pub fn signal_handlers_installed() -> bool {
    STATE.lock().as_ref().is_some_and(|s| s.signal_handlers)
}

fn populate_builtins(dict: ObjPtr) -> bool {
    let b = builtin();
    let singletons = [("None", b.none), ("True", b.true_), ("False", b.false_)];
    b.value_types()
        .into_iter()
        .chain(b.exception_types())
        .chain(singletons)
        .all(|(name, obj)| values::dict_set_item_str(dict, name, obj) == 0)
}

/// Start the interpreter. A second call while running is a no-op.
pub fn initialize(install_signal_handlers: bool) -> i32 {
    if is_initialized() {
        return 0;
    }
    let builtins_mod = module_new("builtins");
    let modules = values::dict_new();
    let sys = module_new("sys");
    let path = values::list_new(0);
    let ok = !builtins_mod.is_null()
        && !modules.is_null()
        && !sys.is_null()
        && !path.is_null()
        && populate_builtins(module_dict(builtins_mod))
        && values::dict_set_item_str(module_dict(sys), "path", path) == 0
        && values::dict_set_item_str(module_dict(sys), "modules", modules) == 0
        && values::dict_set_item_str(modules, "builtins", builtins_mod) == 0
        && values::dict_set_item_str(modules, "sys", sys) == 0;
    dec_ref(path);
    if !ok {
        for p in [builtins_mod, modules, sys] {
            dec_ref(p);
        }
        return -1;
    }

    let builtins = module_dict(builtins_mod);
    crate::object::inc_ref(builtins);
    dec_ref(builtins_mod);
    *STATE.lock() = Some(State {
        builtins,
        modules,
        sys,
        signal_handlers: install_signal_handlers,
    });
    log::debug!("[Interp] initialized (signal handlers: {install_signal_handlers})");
    0
}

/// Tear the interpreter down. Module namespaces and the builtins dict are
/// cleared first, so objects they hold (capsules included) are released
/// before `finalize` returns. No-op when not running.
pub fn finalize() {
    let Some(state) = STATE.lock().take() else {
        return;
    };
    // Break the sys <-> sys.modules cycle and release module contents.
    let mut pos = 0;
    let (mut key, mut module) = (ptr::null_mut(), ptr::null_mut());
    let mut namespaces = Vec::new();
    while values::dict_next(state.modules, &mut pos, &mut key, &mut module) {
        let dict = module_dict(module);
        if !dict.is_null() && dict != state.builtins {
            namespaces.push(dict);
        }
    }
    for dict in namespaces {
        values::dict_clear(dict);
    }
    values::dict_clear(state.modules);
    values::dict_clear(state.builtins);
    dec_ref(state.modules);
    dec_ref(state.sys);
    dec_ref(state.builtins);
    log::debug!("[Interp] finalized");
}

fn not_running() -> ObjPtr {
    err::set_string(builtin().system_error, "interpreter is not initialized");
    ptr::null_mut()
}

/// Builtins dict (borrowed). Null with `SystemError` when not running.
pub fn builtins() -> ObjPtr {
    let builtins = STATE.lock().as_ref().map(|s| s.builtins);
    builtins.unwrap_or_else(not_running)
}

/// `sys.modules` (borrowed).
pub fn modules() -> ObjPtr {
    let modules = STATE.lock().as_ref().map(|s| s.modules);
    modules.unwrap_or_else(not_running)
}

/// The `sys` module (borrowed).
pub fn sys_module() -> ObjPtr {
    let sys = STATE.lock().as_ref().map(|s| s.sys);
    sys.unwrap_or_else(not_running)
}

/// `sys.path` (borrowed).
pub fn sys_path() -> ObjPtr {
    let sys = sys_module();
    if sys.is_null() {
        return sys;
    }
    values::dict_get_item_str(module_dict(sys), "path")
}

/// `import name`.
pub fn import_module(name: &str) -> ObjPtr {
    let modules = modules();
    if modules.is_null() {
        return modules;
    }
    let cached = values::dict_get_item_str(modules, name);
    if !cached.is_null() {
        crate::object::inc_ref(cached);
        return cached;
    }

    let init = INITTAB
        .lock()
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, init)| Arc::clone(init));
    let Some(init) = init else {
        err::set_string(
            builtin().import_error,
            &format!("No module named '{name}'"),
        );
        return ptr::null_mut();
    };
    let module = init();
    if module.is_null() {
        return module;
    }
    if values::dict_set_item_str(modules, name, module) < 0 {
        dec_ref(module);
        return ptr::null_mut();
    }
    log::debug!("[Interp] imported embedded module '{name}'");
    module
}
