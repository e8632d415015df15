// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Constructors and accessors for scalar and container values.
//!
//! Constructors return a new reference or null (`MemoryError` set). Accessors
//! that return `ObjPtr` document whether the result is borrowed.

use std::cell::RefCell;
use std::ptr;

use crate::err;
use crate::object::{alloc, alloc_unchecked, body, dec_ref, inc_ref, Body, ObjPtr};
use crate::ops;
use crate::table::Table;
use crate::types::builtin;

// ============================================================================
// Singletons
// ============================================================================

/// New reference to `None`.
pub fn none() -> ObjPtr {
    builtin().none
}

/// New reference to `True` or `False`.
pub fn bool_from(value: bool) -> ObjPtr {
    if value {
        builtin().true_
    } else {
        builtin().false_
    }
}

pub fn is_none(obj: ObjPtr) -> bool {
    obj == builtin().none
}

pub fn is_bool(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Bool(_))
}

// ============================================================================
// Numbers
// ============================================================================

pub fn int_from_i64(value: i64) -> ObjPtr {
    alloc(builtin().int, Body::Int(value))
}

/// Values above `i64::MAX` raise `OverflowError`.
pub fn int_from_u64(value: u64) -> ObjPtr {
    match i64::try_from(value) {
        Ok(v) => int_from_i64(v),
        Err(_) => {
            err::set_string(builtin().overflow_error, "int too large to convert");
            ptr::null_mut()
        }
    }
}

/// True for `int` and `bool` instances.
pub fn is_int(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Int(_) | Body::Bool(_))
}

pub fn float_from_f64(value: f64) -> ObjPtr {
    alloc(builtin().float, Body::Float(value))
}

pub fn is_float(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Float(_))
}

// ============================================================================
// str / bytes / bytearray
// ============================================================================

pub fn str_from_str(value: &str) -> ObjPtr {
    alloc(builtin().str_, Body::Str(value.to_owned()))
}

pub(crate) fn str_unchecked(value: &str) -> ObjPtr {
    alloc_unchecked(builtin().str_, Body::Str(value.to_owned()))
}

/// Decode UTF-8; invalid input raises `UnicodeDecodeError`.
pub fn str_from_utf8(data: &[u8]) -> ObjPtr {
    match std::str::from_utf8(data) {
        Ok(s) => str_from_str(s),
        Err(e) => {
            err::set_string(
                builtin().unicode_decode_error,
                &format!("'utf-8' codec can't decode bytes: {e}"),
            );
            ptr::null_mut()
        }
    }
}

pub fn is_str(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Str(_))
}

/// Borrow the text of a `str` (None for other objects, no error set).
pub fn str_as_str<'a>(obj: ObjPtr) -> Option<&'a str> {
    match body(obj) {
        Body::Str(s) => Some(s.as_str()),
        _ => None,
    }
}

/// UTF-8 encode a `str` into a new `bytes` object.
pub fn str_encode_utf8(obj: ObjPtr) -> ObjPtr {
    match str_as_str(obj) {
        Some(s) => bytes_from_slice(s.as_bytes()),
        None => {
            err::set_string(builtin().type_error, "bad argument type for built-in operation");
            ptr::null_mut()
        }
    }
}

pub fn bytes_from_slice(data: &[u8]) -> ObjPtr {
    alloc(builtin().bytes, Body::Bytes(data.to_vec()))
}

pub fn is_bytes(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Bytes(_))
}

/// Borrow the contents of a `bytes` object (None for other objects).
pub fn bytes_as_slice<'a>(obj: ObjPtr) -> Option<&'a [u8]> {
    match body(obj) {
        Body::Bytes(b) => Some(b.as_slice()),
        _ => None,
    }
}

pub fn bytearray_from_slice(data: &[u8]) -> ObjPtr {
    alloc(builtin().bytearray, Body::ByteArray(RefCell::new(data.to_vec())))
}

pub fn is_bytearray(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::ByteArray(_))
}

/// Copy the contents of a `bytearray` (None for other objects).
pub fn bytearray_to_vec(obj: ObjPtr) -> Option<Vec<u8>> {
    match body(obj) {
        Body::ByteArray(b) => Some(b.borrow().clone()),
        _ => None,
    }
}

// ============================================================================
// tuple / list
// ============================================================================

/// Tuple of `len` slots, each initialised to `None`.
pub fn tuple_new(len: usize) -> ObjPtr {
    tuple_from_vec(vec![none(); len])
}

/// Tuple taking ownership of `items`. On failure the items are released.
pub fn tuple_from_vec(items: Vec<ObjPtr>) -> ObjPtr {
    alloc(builtin().tuple, Body::Tuple(RefCell::new(items)))
}

pub(crate) fn tuple_from_vec_unchecked(items: Vec<ObjPtr>) -> ObjPtr {
    alloc_unchecked(builtin().tuple, Body::Tuple(RefCell::new(items)))
}

pub fn is_tuple(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Tuple(_))
}

/// Number of items, or -1 with `TypeError` for non-tuples.
pub fn tuple_size(obj: ObjPtr) -> isize {
    match body(obj) {
        Body::Tuple(items) => items.borrow().len() as isize,
        _ => {
            err::set_string(builtin().type_error, "expected a tuple");
            -1
        }
    }
}

/// List of `len` slots, each initialised to `None`.
pub fn list_new(len: usize) -> ObjPtr {
    list_from_vec(vec![none(); len])
}

/// List taking ownership of `items`. On failure the items are released.
pub fn list_from_vec(items: Vec<ObjPtr>) -> ObjPtr {
    alloc(builtin().list, Body::List(RefCell::new(items)))
}

pub fn is_list(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::List(_))
}

/// Number of items, or -1 with `TypeError` for non-lists.
pub fn list_size(obj: ObjPtr) -> isize {
    match body(obj) {
        Body::List(items) => items.borrow().len() as isize,
        _ => {
            err::set_string(builtin().type_error, "expected a list");
            -1
        }
    }
}

// ============================================================================
// dict
// ============================================================================

pub fn dict_new() -> ObjPtr {
    alloc(builtin().dict, Body::Dict(RefCell::new(Table::new())))
}

pub fn is_dict(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Dict(_))
}

pub(crate) fn table_of<'a>(obj: ObjPtr) -> Option<&'a RefCell<Table>> {
    match body(obj) {
        Body::Dict(t) | Body::Set(t) => Some(t),
        _ => None,
    }
}

fn expect_dict<'a>(obj: ObjPtr) -> Option<&'a RefCell<Table>> {
    match body(obj) {
        Body::Dict(t) => Some(t),
        _ => {
            err::set_string(builtin().type_error, "expected a dict");
            None
        }
    }
}

/// `d[key] = value` (both borrowed). Returns 0, or -1 on error.
pub fn dict_set_item(dict: ObjPtr, key: ObjPtr, value: ObjPtr) -> i32 {
    let Some(table) = expect_dict(dict) else {
        return -1;
    };
    let hash = ops::object_hash(key);
    if hash == -1 && !err::occurred().is_null() {
        return -1;
    }
    inc_ref(key);
    inc_ref(value);
    let displaced = table.borrow_mut().insert(key, hash, value);
    match displaced {
        Ok(Some((dup_key, old_value))) => {
            dec_ref(dup_key);
            dec_ref(old_value);
            0
        }
        Ok(None) => 0,
        Err(()) => {
            dec_ref(key);
            dec_ref(value);
            -1
        }
    }
}

pub fn dict_set_item_str(dict: ObjPtr, key: &str, value: ObjPtr) -> i32 {
    let k = str_from_str(key);
    if k.is_null() {
        return -1;
    }
    let r = dict_set_item(dict, k, value);
    dec_ref(k);
    r
}

/// Borrowed value for `key`, or null. Null with no error set means missing.
pub fn dict_get_item(dict: ObjPtr, key: ObjPtr) -> ObjPtr {
    let Some(table) = expect_dict(dict) else {
        return ptr::null_mut();
    };
    let hash = ops::object_hash(key);
    if hash == -1 && !err::occurred().is_null() {
        return ptr::null_mut();
    }
    let table = table.borrow();
    match table.find(key, hash) {
        Ok(Some(slot)) => table.get(slot).map_or(ptr::null_mut(), |e| e.value),
        Ok(None) | Err(()) => ptr::null_mut(),
    }
}

pub fn dict_get_item_str(dict: ObjPtr, key: &str) -> ObjPtr {
    let k = str_unchecked(key);
    let v = dict_get_item(dict, k);
    dec_ref(k);
    v
}

/// Remove `key`; missing keys raise `KeyError`. Returns 0 or -1.
pub fn dict_del_item(dict: ObjPtr, key: ObjPtr) -> i32 {
    let Some(table) = expect_dict(dict) else {
        return -1;
    };
    let hash = ops::object_hash(key);
    if hash == -1 && !err::occurred().is_null() {
        return -1;
    }
    let removed = table.borrow_mut().remove(key, hash);
    match removed {
        Ok(Some(entry)) => {
            dec_ref(entry.key);
            dec_ref(entry.value);
            0
        }
        Ok(None) => {
            err::set_object(builtin().key_error, key);
            -1
        }
        Err(()) => -1,
    }
}

/// 1 if present, 0 if not, -1 on error.
pub fn dict_contains(dict: ObjPtr, key: ObjPtr) -> i32 {
    let found = dict_get_item(dict, key);
    if !found.is_null() {
        1
    } else if err::occurred().is_null() {
        0
    } else {
        -1
    }
}

pub fn dict_size(dict: ObjPtr) -> isize {
    match expect_dict(dict) {
        Some(t) => t.borrow().len() as isize,
        None => -1,
    }
}

/// Position-based traversal. `pos` starts at 0; on success `key` and `value`
/// receive borrowed references and `pos` advances. Returns false when done.
pub fn dict_next(dict: ObjPtr, pos: &mut usize, key: &mut ObjPtr, value: &mut ObjPtr) -> bool {
    let Some(table) = table_of(dict) else {
        return false;
    };
    let table = table.borrow();
    match table.next_from(pos) {
        Some(entry) => {
            *key = entry.key;
            *value = entry.value;
            true
        }
        None => false,
    }
}

/// Remove every entry (dict or set).
pub fn dict_clear(dict: ObjPtr) {
    let Some(table) = table_of(dict) else {
        return;
    };
    let entries: Vec<_> = table.borrow_mut().drain().collect();
    for entry in entries {
        dec_ref(entry.key);
        dec_ref(entry.value);
    }
}

/// New list of the keys.
pub fn dict_keys(dict: ObjPtr) -> ObjPtr {
    let Some(table) = expect_dict(dict) else {
        return ptr::null_mut();
    };
    let keys: Vec<ObjPtr> = table.borrow().entries().map(|e| e.key).collect();
    keys.iter().copied().for_each(inc_ref);
    list_from_vec(keys)
}

// ============================================================================
// set
// ============================================================================

pub fn set_new() -> ObjPtr {
    alloc(builtin().set, Body::Set(RefCell::new(Table::new())))
}

pub fn is_set(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Set(_))
}

fn expect_set<'a>(obj: ObjPtr) -> Option<&'a RefCell<Table>> {
    match body(obj) {
        Body::Set(t) => Some(t),
        _ => {
            err::set_string(builtin().type_error, "expected a set");
            None
        }
    }
}

/// Add `key` (borrowed). Returns 0 or -1.
pub fn set_add(set: ObjPtr, key: ObjPtr) -> i32 {
    let Some(table) = expect_set(set) else {
        return -1;
    };
    let hash = ops::object_hash(key);
    if hash == -1 && !err::occurred().is_null() {
        return -1;
    }
    inc_ref(key);
    let inserted = table.borrow_mut().insert(key, hash, ptr::null_mut());
    match inserted {
        Ok(Some((dup, _))) => {
            dec_ref(dup);
            0
        }
        Ok(None) => 0,
        Err(()) => {
            dec_ref(key);
            -1
        }
    }
}

/// 1 if present, 0 if not, -1 on error.
pub fn set_contains(set: ObjPtr, key: ObjPtr) -> i32 {
    let Some(table) = expect_set(set) else {
        return -1;
    };
    let hash = ops::object_hash(key);
    if hash == -1 && !err::occurred().is_null() {
        return -1;
    }
    match table.borrow().find(key, hash) {
        Ok(Some(_)) => 1,
        Ok(None) => 0,
        Err(()) => -1,
    }
}

/// Remove `key` if present: 1 removed, 0 absent, -1 on error.
pub fn set_discard(set: ObjPtr, key: ObjPtr) -> i32 {
    let Some(table) = expect_set(set) else {
        return -1;
    };
    let hash = ops::object_hash(key);
    if hash == -1 && !err::occurred().is_null() {
        return -1;
    }
    let removed = table.borrow_mut().remove(key, hash);
    match removed {
        Ok(Some(entry)) => {
            dec_ref(entry.key);
            1
        }
        Ok(None) => 0,
        Err(()) => -1,
    }
}

pub fn set_size(set: ObjPtr) -> isize {
    match expect_set(set) {
        Some(t) => t.borrow().len() as isize,
        None => -1,
    }
}
