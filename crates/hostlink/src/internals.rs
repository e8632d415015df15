// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide internals registry shared by independently built modules.
//!
//! # Architecture
//!
//! ```text
//! get_or_create(&MODULE)
//!   |
//!   +-- module cache (Weak) upgrades?          -> same Arc
//!   |
//!   +-- GIL (runtime lock, taken directly)
//!   |     builtins[INTERNALS_ID] is our capsule? -> adopt, push this module's
//!   |                                              translator to the front
//!   |     otherwise                              -> create, publish capsule
//!   |
//!   +-- cache Weak in the module, return Arc
//! ```
//!
//! The capsule owns one strong count; its destructor marks the registry dead
//! and releases that count when the interpreter finalizes. Module caches
//! (weak) ignore a dead registry even while someone still holds an `Arc` to
//! it, so the next access after a restart creates or adopts a fresh one.
//!
//! A fresh chain is `[creator's translator, builtin translator]`; each
//! module that adopts the registry later pushes its own to the front.

use std::any::{type_name, TypeId};
use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{const_mutex, Mutex, RwLock};

use hostlink_rt::{builtin, capsule, err, gil, interp, tss, types, values, ObjPtr};

use crate::config::INTERNALS_ID;
use crate::error::{self, Error, Result};
use crate::handle::Handle;
use crate::translate::{translate_builtin, translate_local, ExceptionTranslator};

// ============================================================================
// Type registry keys
// ============================================================================

/// Identity of a native type in the registry.
///
/// Two keys are equal when their `TypeId`s match or, failing that, when
/// their type names are equal by content. Hashing uses only the name.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id || self.name == other.name
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // djb2
        let h = self
            .name
            .bytes()
            .fold(5381u64, |h, b| h.wrapping_mul(33).wrapping_add(u64::from(b)));
        state.write_u64(h);
    }
}

/// A native type bound to a host type object.
pub struct TypeInfo {
    key: TypeKey,
    host_type: ObjPtr,
}

// SAFETY: `host_type` is only touched (incref'd, decref'd, handed out) by
// threads holding the GIL.
unsafe impl Send for TypeInfo {}
unsafe impl Sync for TypeInfo {}

impl TypeInfo {
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn host_type(&self) -> Handle {
        // SAFETY: kept alive by the reference this record owns.
        unsafe { Handle::from_ptr(self.host_type) }
    }
}

impl Drop for TypeInfo {
    fn drop(&mut self) {
        hostlink_rt::dec_ref(self.host_type);
    }
}

impl std::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.key.name)
            .field("host_type", &self.host_type())
            .finish()
    }
}

// ============================================================================
// Internals
// ============================================================================

#[derive(Clone, Copy)]
struct TranslatorEntry {
    owner: &'static str,
    translate: ExceptionTranslator,
}

#[derive(Clone, Copy)]
struct SharedPtr(*mut c_void);

// SAFETY: opaque to the registry; owners coordinate access themselves.
unsafe impl Send for SharedPtr {}
unsafe impl Sync for SharedPtr {}

/// Per-thread GIL bookkeeping stored in the registry's TSS slot.
pub(crate) struct ThreadState {
    pub(crate) depth: usize,
}

/// State shared by every module loaded into one interpreter.
pub struct Internals {
    types: RwLock<HashMap<TypeKey, Arc<TypeInfo>>>,
    types_by_host: RwLock<HashMap<usize, Arc<TypeInfo>>>,
    translators: RwLock<VecDeque<TranslatorEntry>>,
    shared_data: DashMap<String, SharedPtr>,
    tstate: Option<tss::TssKey>,
    base_metaclass: ObjPtr,
    base_object: ObjPtr,
    static_property: ObjPtr,
    alive: AtomicBool,
}

// SAFETY: the raw object pointers are only dereferenced under the GIL;
// every other field is a thread-safe container.
unsafe impl Send for Internals {}
unsafe impl Sync for Internals {}

impl Internals {
    /// Fresh registry seeded with the builtin translator and `local`'s own.
    /// Requires the GIL.
    fn create(local: &ModuleLocal) -> Result<Self> {
        let b = builtin();
        let Some(tstate) = tss::tss_create() else {
            err::clear();
            return Err(Error::fatal("Could not allocate thread state key!"));
        };
        let metaclass = error::alloc_ref(types::type_new("hostlink_type", b.type_, b.type_), "type");
        let metaclass = match metaclass {
            Ok(m) => m,
            Err(e) => {
                tss::tss_delete(tstate);
                return Err(e);
            }
        };
        let base = types::type_new("hostlink_object", b.object, metaclass.ptr());
        let property = types::type_new("hostlink_static_property", b.object, b.type_);
        if base.is_null() || property.is_null() {
            hostlink_rt::dec_ref(base);
            hostlink_rt::dec_ref(property);
            tss::tss_delete(tstate);
            return Err(Error::fetch());
        }

        let mut translators = VecDeque::new();
        translators.push_front(TranslatorEntry {
            owner: BUILTIN_OWNER,
            translate: translate_builtin,
        });
        translators.push_front(TranslatorEntry {
            owner: local.name,
            translate: local.translator,
        });
        Ok(Self {
            types: RwLock::new(HashMap::new()),
            types_by_host: RwLock::new(HashMap::new()),
            translators: RwLock::new(translators),
            shared_data: DashMap::new(),
            tstate: Some(tstate),
            base_metaclass: metaclass.release().ptr(),
            base_object: base,
            static_property: property,
            alive: AtomicBool::new(true),
        })
    }

    /// False once the interpreter that published this registry finalized.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    // ---- exception translators ---------------------------------------

    /// Snapshot of the chain, most recently registered first.
    pub fn translators(&self) -> Vec<ExceptionTranslator> {
        self.translators.read().iter().map(|t| t.translate).collect()
    }

    /// Names of the modules that registered each chain entry, in order.
    pub fn translator_owners(&self) -> Vec<&'static str> {
        self.translators.read().iter().map(|t| t.owner).collect()
    }

    pub(crate) fn register_translator(&self, owner: &'static str, translate: ExceptionTranslator) {
        self.translators
            .write()
            .push_front(TranslatorEntry { owner, translate });
        log::debug!("[Internals] exception translator registered by '{owner}'");
    }

    // ---- shared data ---------------------------------------------------

    /// Pointer stored under `name`, or null.
    pub fn get_shared_data(&self, name: &str) -> *mut c_void {
        self.shared_data
            .get(name)
            .map_or(std::ptr::null_mut(), |p| p.0)
    }

    /// Store `data` under `name` (last writer wins) and return it.
    pub fn set_shared_data(&self, name: &str, data: *mut c_void) -> *mut c_void {
        self.shared_data.insert(name.to_owned(), SharedPtr(data));
        log::debug!("[Internals] shared data '{name}' set");
        data
    }

    // ---- type registry -------------------------------------------------

    /// Bind native type `T` to `host_type`. Registering a type twice is a
    /// caller error.
    pub fn register_type<T: 'static>(&self, host_type: Handle) -> Result<Arc<TypeInfo>> {
        let key = TypeKey::of::<T>();
        let mut types = self.types.write();
        if types.contains_key(&key) {
            return Err(Error::Fatal(format!(
                "generic_type: type \"{}\" is already registered!",
                key.name
            )));
        }
        let info = Arc::new(TypeInfo {
            key,
            host_type: host_type.inc_ref().ptr(),
        });
        types.insert(key, Arc::clone(&info));
        self.types_by_host
            .write()
            .insert(host_type.ptr() as usize, Arc::clone(&info));
        Ok(info)
    }

    pub fn find_type(&self, key: &TypeKey) -> Option<Arc<TypeInfo>> {
        self.types.read().get(key).cloned()
    }

    /// Native type bound to a host type object, if any.
    pub fn find_host_type(&self, host_type: Handle) -> Option<Arc<TypeInfo>> {
        self.types_by_host
            .read()
            .get(&(host_type.ptr() as usize))
            .cloned()
    }

    // ---- core objects --------------------------------------------------

    /// Metaclass of every bound class.
    pub fn base_metaclass(&self) -> Handle {
        // SAFETY: owned by the registry.
        unsafe { Handle::from_ptr(self.base_metaclass) }
    }

    /// Common base of every bound class.
    pub fn base_object(&self) -> Handle {
        // SAFETY: owned by the registry.
        unsafe { Handle::from_ptr(self.base_object) }
    }

    pub fn static_property_type(&self) -> Handle {
        // SAFETY: owned by the registry.
        unsafe { Handle::from_ptr(self.static_property) }
    }

    pub(crate) fn tstate_key(&self) -> Option<&tss::TssKey> {
        self.tstate.as_ref()
    }
}

impl Drop for Internals {
    fn drop(&mut self) {
        // The last strong count may be a caller's, released after finalize.
        let _gil = gil::acquire();
        self.types_by_host.get_mut().clear();
        self.types.get_mut().clear();
        for p in [self.static_property, self.base_object, self.base_metaclass] {
            hostlink_rt::dec_ref(p);
        }
        if let Some(key) = self.tstate.take() {
            tss::tss_delete(key);
        }
        log::debug!("[Internals] destroyed");
    }
}

impl std::fmt::Debug for Internals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Internals")
            .field("types", &self.types.read().len())
            .field("translators", &self.translator_owners())
            .field("shared_data", &self.shared_data.len())
            .finish()
    }
}

// ============================================================================
// Module-local state and the factory
// ============================================================================

/// Per-module view of the registry: its cache, its own translator and the
/// types it registered privately.
pub struct ModuleLocal {
    name: &'static str,
    translator: ExceptionTranslator,
    cache: Mutex<Weak<Internals>>,
    local_types: Mutex<Vec<Arc<TypeInfo>>>,
}

impl ModuleLocal {
    pub const fn new(name: &'static str, translator: ExceptionTranslator) -> Self {
        Self {
            name,
            translator,
            cache: const_mutex(Weak::new()),
            local_types: const_mutex(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bind `T` for this module only.
    pub fn register_local_type<T: 'static>(&self, host_type: Handle) -> Result<Arc<TypeInfo>> {
        let key = TypeKey::of::<T>();
        let mut local = self.local_types.lock();
        if local.iter().any(|t| t.key == key) {
            return Err(Error::Fatal(format!(
                "generic_type: type \"{}\" is already registered!",
                key.name
            )));
        }
        let info = Arc::new(TypeInfo {
            key,
            host_type: host_type.inc_ref().ptr(),
        });
        local.push(Arc::clone(&info));
        Ok(info)
    }

    /// Lookup for `T`: module-local types shadow global ones.
    pub fn type_info<T: 'static>(&self) -> Result<Option<Arc<TypeInfo>>> {
        let key = TypeKey::of::<T>();
        if let Some(info) = self.local_types.lock().iter().find(|t| t.key == key) {
            return Ok(Some(Arc::clone(info)));
        }
        Ok(get_or_create(self)?.find_type(&key))
    }
}

/// Chain owner of the translator every registry starts with.
pub const BUILTIN_OWNER: &str = "builtin";

/// The crate's own module identity.
pub static MODULE: ModuleLocal = ModuleLocal::new("hostlink", translate_local);

fn destroy_internals(cap: ObjPtr) {
    let p = capsule::capsule_get_pointer(cap, Some(INTERNALS_ID));
    if p.is_null() {
        err::clear();
        return;
    }
    // SAFETY: the capsule owns one strong count from `Arc::into_raw`.
    let internals = unsafe { Arc::from_raw(p.cast::<Internals>().cast_const()) };
    internals.alive.store(false, Ordering::Release);
    log::debug!("[Internals] released by the interpreter");
}

fn publish(builtins: ObjPtr, internals: &Arc<Internals>) -> Result<()> {
    let raw = Arc::into_raw(Arc::clone(internals)).cast_mut().cast::<c_void>();
    let cap = capsule::capsule_new(raw, Some(INTERNALS_ID), Some(destroy_internals));
    if cap.is_null() {
        // SAFETY: not handed to any capsule.
        drop(unsafe { Arc::from_raw(raw.cast::<Internals>().cast_const()) });
        return Err(Error::fetch());
    }
    let rc = values::dict_set_item_str(builtins, INTERNALS_ID, cap);
    hostlink_rt::dec_ref(cap);
    error::status(rc)
}

fn live(cache: &Weak<Internals>) -> Option<Arc<Internals>> {
    cache.upgrade().filter(|internals| internals.is_alive())
}

/// Find or create the registry for `local`'s interpreter.
pub fn get_or_create(local: &ModuleLocal) -> Result<Arc<Internals>> {
    if let Some(internals) = live(&local.cache.lock()) {
        return Ok(internals);
    }

    // Straight to the runtime lock: `GilScopedAcquire` needs the registry.
    let _gil = gil::acquire();
    let mut cache = local.cache.lock();
    if let Some(internals) = live(&cache) {
        return Ok(internals);
    }

    let builtins = interp::builtins();
    if builtins.is_null() {
        return Err(Error::fetch());
    }
    let slot = values::dict_get_item_str(builtins, INTERNALS_ID);

    let internals = if capsule::capsule_is_valid(slot, Some(INTERNALS_ID)) {
        let p = capsule::capsule_get_pointer(slot, Some(INTERNALS_ID))
            .cast::<Internals>()
            .cast_const();
        // SAFETY: the capsule holds a strong count; take one for ourselves.
        let internals = unsafe {
            Arc::increment_strong_count(p);
            Arc::from_raw(p)
        };
        let known = internals.translator_owners().contains(&local.name);
        if !known {
            internals.register_translator(local.name, local.translator);
        }
        log::debug!("[Internals] '{}' adopted the shared registry", local.name);
        internals
    } else {
        if !slot.is_null() {
            log::warn!(
                "[Internals] {INTERNALS_ID} holds a '{}', replacing it",
                types::obj_type_name(slot)
            );
        }
        let internals = Arc::new(Internals::create(local)?);
        publish(builtins, &internals)?;
        log::debug!("[Internals] '{}' created the shared registry", local.name);
        internals
    };

    *cache = Arc::downgrade(&internals);
    Ok(internals)
}

/// Registry as seen by this crate.
pub fn get_internals() -> Result<Arc<Internals>> {
    get_or_create(&MODULE)
}

/// Pointer stored under `name` in the shared registry, or null.
pub fn get_shared_data(name: &str) -> Result<*mut c_void> {
    Ok(get_internals()?.get_shared_data(name))
}

/// Store `data` under `name` in the shared registry.
pub fn set_shared_data(name: &str, data: *mut c_void) -> Result<*mut c_void> {
    Ok(get_internals()?.set_shared_data(name, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use std::collections::hash_map::DefaultHasher;

    struct Local;

    fn hash_of(key: &TypeKey) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_type_key_equality_and_hash() {
        let a = TypeKey::of::<Local>();
        let b = TypeKey::of::<Local>();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, TypeKey::of::<u32>());

        // Same name, different identity: still the same key.
        let renamed = TypeKey {
            id: TypeId::of::<u64>(),
            name: a.name,
        };
        assert_eq!(a, renamed);
        assert_eq!(hash_of(&a), hash_of(&renamed));
    }

    struct Widget;
    struct Gadget;
    struct Unregistered;

    fn heap_type(name: &str) -> Object {
        let b = hostlink_rt::builtin();
        crate::error::new_ref(types::type_new(name, b.object, std::ptr::null_mut())).unwrap()
    }

    #[test]
    fn test_type_registry_lookups() {
        let _gil = gil::acquire();
        interp::initialize(false);
        let internals = get_internals().unwrap();

        let widget = heap_type("Widget");
        let info = internals.register_type::<Widget>(widget.handle()).unwrap();
        assert_eq!(info.host_type(), widget.handle());
        assert!(matches!(
            internals.register_type::<Widget>(widget.handle()),
            Err(Error::Fatal(_))
        ));

        let found = internals.find_type(&TypeKey::of::<Widget>()).unwrap();
        assert!(Arc::ptr_eq(&found, &info));
        let by_host = internals.find_host_type(widget.handle()).unwrap();
        assert_eq!(by_host.key(), TypeKey::of::<Widget>());
        assert!(internals.find_type(&TypeKey::of::<Unregistered>()).is_none());
    }

    #[test]
    fn test_module_local_types_shadow_global_ones() {
        static LOCAL: ModuleLocal = ModuleLocal::new("shadow", translate_local);
        let _gil = gil::acquire();
        interp::initialize(false);

        let global = heap_type("GlobalGadget");
        let local = heap_type("LocalGadget");
        get_internals()
            .unwrap()
            .register_type::<Gadget>(global.handle())
            .unwrap();
        LOCAL.register_local_type::<Gadget>(local.handle()).unwrap();

        let seen_locally = LOCAL.type_info::<Gadget>().unwrap().unwrap();
        assert_eq!(seen_locally.host_type(), local.handle());
        let seen_globally = MODULE.type_info::<Gadget>().unwrap().unwrap();
        assert_eq!(seen_globally.host_type(), global.handle());
    }

    #[test]
    fn test_shared_data_defaults_to_null() {
        let _gil = gil::acquire();
        interp::initialize(false);
        assert!(get_shared_data("internals-test-missing").unwrap().is_null());
        let mut slot = 5u8;
        let p = (&mut slot as *mut u8).cast::<c_void>();
        assert_eq!(set_shared_data("internals-test-slot", p).unwrap(), p);
        assert_eq!(get_shared_data("internals-test-slot").unwrap(), p);
    }
}
