// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Abstract object protocols.
//!
//! Attribute access, subscription, the sequence protocol and its list/tuple
//! fast paths, iteration, string conversion, truthiness, hashing, equality,
//! calls and numeric coercion.
//!
//! # Reference conventions
//!
//! ```text
//! list_get_item / tuple_get_item   -> borrowed result
//! list_set_item / tuple_set_item   -> steal `value` (also on failure)
//! sequence_set_item / set_item     -> borrow `value`
//! everything else returning ObjPtr -> new reference or null
//! ```

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::ptr;

use crate::buffer;
use crate::capsule;
use crate::err;
use crate::object::{alloc, body, dec_ref, inc_ref, type_of, Body, ObjPtr};
use crate::slice;
use crate::types::{self, builtin, is_subtype, obj_type_name, type_data, type_name, TypeKind};
use crate::values;

// ============================================================================
// Attributes
// ============================================================================

fn attr_name<'a>(name: ObjPtr) -> Option<&'a str> {
    let n = values::str_as_str(name);
    if n.is_none() {
        err::set_string(
            builtin().type_error,
            &format!("attribute name must be string, not '{}'", obj_type_name(name)),
        );
    }
    n
}

/// Look `name` up along the base chain of heap type `ty` (borrowed result).
pub fn lookup_type_attr(ty: ObjPtr, name: &str) -> ObjPtr {
    let mut cur = ty;
    while !cur.is_null() {
        let dict = types::type_dict(cur);
        if !dict.is_null() {
            let found = values::dict_get_item_str(dict, name);
            if !found.is_null() {
                return found;
            }
        }
        cur = types::type_base(cur);
    }
    ptr::null_mut()
}

fn own(p: ObjPtr) -> ObjPtr {
    inc_ref(p);
    p
}

fn or_none(p: ObjPtr) -> ObjPtr {
    own(if p.is_null() { values::none() } else { p })
}

/// Own-namespace lookup: new reference, or null without an error when absent.
fn instance_attr(obj: ObjPtr, name: &str) -> ObjPtr {
    if name == "__class__" {
        return own(type_of(obj));
    }
    match body(obj) {
        Body::Instance { dict } | Body::Module { dict, .. } if !dict.is_null() => {
            if name == "__dict__" {
                return own(*dict);
            }
            let found = values::dict_get_item_str(*dict, name);
            if !found.is_null() {
                return own(found);
            }
        }
        Body::Type(data) => match name {
            "__name__" => return values::str_from_str(&data.name),
            "__base__" => return or_none(data.base),
            _ => {
                let found = lookup_type_attr(obj, name);
                if !found.is_null() {
                    return own(found);
                }
            }
        },
        Body::Exception(data) => match name {
            "args" => return own(data.args),
            "__context__" => return or_none(data.context.get()),
            "__traceback__" => return or_none(data.traceback.get()),
            _ => {}
        },
        Body::Function(data) if name == "__name__" => return values::str_from_str(&data.name),
        Body::Slice { start, stop, step } => match name {
            "start" => return own(*start),
            "stop" => return own(*stop),
            "step" => return own(*step),
            _ => {}
        },
        _ => {}
    }
    if let Body::Module { name: module, .. } = body(obj) {
        if name == "__name__" {
            return values::str_from_str(module);
        }
    }
    ptr::null_mut()
}

fn missing_attr(obj: ObjPtr, name: &str) {
    let message = match body(obj) {
        Body::Module { name: module, .. } => {
            format!("module '{module}' has no attribute '{name}'")
        }
        Body::Type(data) => format!("type object '{}' has no attribute '{name}'", data.name),
        _ => format!("'{}' object has no attribute '{name}'", obj_type_name(obj)),
    };
    err::set_string(builtin().attribute_error, &message);
}

/// `getattr(obj, name)` with a `str` name.
pub fn getattr(obj: ObjPtr, name: ObjPtr) -> ObjPtr {
    match attr_name(name) {
        Some(n) => getattr_str(obj, n),
        None => ptr::null_mut(),
    }
}

pub fn getattr_str(obj: ObjPtr, name: &str) -> ObjPtr {
    let found = instance_attr(obj, name);
    if !found.is_null() || !err::occurred().is_null() {
        return found;
    }
    if !matches!(body(obj), Body::Type(_)) {
        let found = lookup_type_attr(type_of(obj), name);
        if !found.is_null() {
            return own(found);
        }
    }
    missing_attr(obj, name);
    ptr::null_mut()
}

/// `hasattr`: any error raised by the lookup is cleared and reported as 0.
pub fn hasattr(obj: ObjPtr, name: ObjPtr) -> bool {
    match values::str_as_str(name) {
        Some(n) => hasattr_str(obj, n),
        None => false,
    }
}

pub fn hasattr_str(obj: ObjPtr, name: &str) -> bool {
    let found = getattr_str(obj, name);
    if found.is_null() {
        err::clear();
        return false;
    }
    dec_ref(found);
    true
}

/// `setattr(obj, name, value)`; a null `value` deletes. Returns 0 or -1.
pub fn setattr(obj: ObjPtr, name: ObjPtr, value: ObjPtr) -> i32 {
    match attr_name(name) {
        Some(n) => setattr_str(obj, n, value),
        None => -1,
    }
}

pub fn setattr_str(obj: ObjPtr, name: &str, value: ObjPtr) -> i32 {
    let dict = match body(obj) {
        Body::Instance { dict } | Body::Module { dict, .. } => *dict,
        Body::Type(data) => data.dict,
        Body::Exception(_) if name == "__context__" => {
            err::exception_set_context(obj, if value.is_null() { value } else { own(value) });
            return 0;
        }
        _ => ptr::null_mut(),
    };
    if dict.is_null() {
        if value.is_null() {
            missing_attr(obj, name);
        } else {
            err::set_string(
                builtin().attribute_error,
                &format!("'{}' object has no attribute '{name}'", obj_type_name(obj)),
            );
        }
        return -1;
    }
    if !value.is_null() {
        return values::dict_set_item_str(dict, name, value);
    }
    let key = values::str_from_str(name);
    if key.is_null() {
        return -1;
    }
    let r = values::dict_del_item(dict, key);
    dec_ref(key);
    if r < 0 && err::exception_matches(builtin().key_error) {
        err::clear();
        missing_attr(obj, name);
    }
    r
}

pub fn delattr(obj: ObjPtr, name: ObjPtr) -> i32 {
    setattr(obj, name, ptr::null_mut())
}

pub fn delattr_str(obj: ObjPtr, name: &str) -> i32 {
    setattr_str(obj, name, ptr::null_mut())
}

// ============================================================================
// Subscription
// ============================================================================

fn as_index(key: ObjPtr) -> Option<isize> {
    match body(key) {
        Body::Int(v) => Some(isize::try_from(*v).unwrap_or(isize::MAX)),
        Body::Bool(b) => Some(isize::from(*b)),
        _ => None,
    }
}

fn bad_index(obj: ObjPtr, key: ObjPtr) -> ObjPtr {
    err::set_string(
        builtin().type_error,
        &format!(
            "{} indices must be integers or slices, not {}",
            obj_type_name(obj),
            obj_type_name(key)
        ),
    );
    ptr::null_mut()
}

/// `obj[key]`.
pub fn get_item(obj: ObjPtr, key: ObjPtr) -> ObjPtr {
    match body(obj) {
        Body::Dict(_) => {
            let found = values::dict_get_item(obj, key);
            if found.is_null() {
                if err::occurred().is_null() {
                    err::set_object(builtin().key_error, key);
                }
                return ptr::null_mut();
            }
            own(found)
        }
        Body::List(_) | Body::Tuple(_) | Body::Str(_) | Body::Bytes(_) | Body::ByteArray(_) => {
            if let Some(i) = as_index(key) {
                sequence_get_item(obj, i)
            } else if slice::is_slice(key) {
                sequence_get_slice(obj, key)
            } else {
                bad_index(obj, key)
            }
        }
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object is not subscriptable", obj_type_name(obj)),
            );
            ptr::null_mut()
        }
    }
}

fn sequence_get_slice(obj: ObjPtr, key: ObjPtr) -> ObjPtr {
    let Ok(len) = usize::try_from(sequence_size(obj)) else {
        return ptr::null_mut();
    };
    let Some(indices) = slice::get_indices(key, len) else {
        return ptr::null_mut();
    };
    match body(obj) {
        Body::List(items) | Body::Tuple(items) => {
            let items = items.borrow();
            let picked: Vec<ObjPtr> = indices.positions().map(|i| own(items[i])).collect();
            drop(items);
            if values::is_list(obj) {
                values::list_from_vec(picked)
            } else {
                values::tuple_from_vec(picked)
            }
        }
        Body::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked: String = indices.positions().map(|i| chars[i]).collect();
            values::str_from_str(&picked)
        }
        Body::Bytes(b) => {
            let picked: Vec<u8> = indices.positions().map(|i| b[i]).collect();
            values::bytes_from_slice(&picked)
        }
        Body::ByteArray(b) => {
            let picked: Vec<u8> = indices.positions().map(|i| b.borrow()[i]).collect();
            values::bytearray_from_slice(&picked)
        }
        _ => ptr::null_mut(),
    }
}

/// `obj[key] = value` (borrowed value). Returns 0 or -1.
pub fn set_item(obj: ObjPtr, key: ObjPtr, value: ObjPtr) -> i32 {
    match body(obj) {
        Body::Dict(_) => values::dict_set_item(obj, key, value),
        Body::List(_) | Body::ByteArray(_) => match as_index(key) {
            Some(i) => sequence_set_item(obj, i, value),
            None => {
                bad_index(obj, key);
                -1
            }
        },
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object does not support item assignment", obj_type_name(obj)),
            );
            -1
        }
    }
}

/// `del obj[key]`. Returns 0 or -1.
pub fn del_item(obj: ObjPtr, key: ObjPtr) -> i32 {
    match body(obj) {
        Body::Dict(_) => values::dict_del_item(obj, key),
        Body::List(_) | Body::ByteArray(_) => match as_index(key) {
            Some(i) => sequence_del_item(obj, i),
            None => {
                bad_index(obj, key);
                -1
            }
        },
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object doesn't support item deletion", obj_type_name(obj)),
            );
            -1
        }
    }
}

// ============================================================================
// Sequence protocol
// ============================================================================

/// True for list, tuple, str, bytes and bytearray.
pub fn sequence_check(obj: ObjPtr) -> bool {
    matches!(
        body(obj),
        Body::List(_) | Body::Tuple(_) | Body::Str(_) | Body::Bytes(_) | Body::ByteArray(_)
    )
}

pub fn sequence_size(obj: ObjPtr) -> isize {
    if sequence_check(obj) {
        length(obj)
    } else {
        no_len(obj)
    }
}

fn no_len(obj: ObjPtr) -> isize {
    err::set_string(
        builtin().type_error,
        &format!("object of type '{}' has no len()", obj_type_name(obj)),
    );
    -1
}

fn normalize(obj: ObjPtr, index: isize, len: usize) -> Option<usize> {
    let len = len as isize;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        Some(i as usize)
    } else {
        err::set_string(
            builtin().index_error,
            &format!("{} index out of range", obj_type_name(obj)),
        );
        None
    }
}

/// `obj[index]` through the sequence protocol; negative indices wrap.
pub fn sequence_get_item(obj: ObjPtr, index: isize) -> ObjPtr {
    match body(obj) {
        Body::List(items) | Body::Tuple(items) => {
            let items = items.borrow();
            match normalize(obj, index, items.len()) {
                Some(i) => own(items[i]),
                None => ptr::null_mut(),
            }
        }
        Body::Str(s) => {
            let count = s.chars().count();
            match normalize(obj, index, count).and_then(|i| s.chars().nth(i)) {
                Some(c) => values::str_from_str(c.encode_utf8(&mut [0; 4])),
                None => ptr::null_mut(),
            }
        }
        Body::Bytes(b) => match normalize(obj, index, b.len()) {
            Some(i) => values::int_from_i64(i64::from(b[i])),
            None => ptr::null_mut(),
        },
        Body::ByteArray(b) => {
            let byte = normalize(obj, index, b.borrow().len()).map(|i| b.borrow()[i]);
            match byte {
                Some(v) => values::int_from_i64(i64::from(v)),
                None => ptr::null_mut(),
            }
        }
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object does not support indexing", obj_type_name(obj)),
            );
            ptr::null_mut()
        }
    }
}

/// `obj[index] = value` through the sequence protocol. Borrows `value`.
pub fn sequence_set_item(obj: ObjPtr, index: isize, value: ObjPtr) -> i32 {
    match body(obj) {
        Body::List(items) => {
            let len = items.borrow().len();
            let Some(i) = normalize(obj, index, len) else {
                return -1;
            };
            inc_ref(value);
            let old = std::mem::replace(&mut items.borrow_mut()[i], value);
            dec_ref(old);
            0
        }
        Body::ByteArray(bytes) => {
            let len = bytes.borrow().len();
            let Some(i) = normalize(obj, index, len) else {
                return -1;
            };
            let v = long_as_i64(value);
            if v == -1 && !err::occurred().is_null() {
                return -1;
            }
            let Ok(byte) = u8::try_from(v) else {
                err::set_string(builtin().value_error, "byte must be in range(0, 256)");
                return -1;
            };
            bytes.borrow_mut()[i] = byte;
            0
        }
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object does not support item assignment", obj_type_name(obj)),
            );
            -1
        }
    }
}

pub fn sequence_del_item(obj: ObjPtr, index: isize) -> i32 {
    match body(obj) {
        Body::List(items) => {
            let len = items.borrow().len();
            let Some(i) = normalize(obj, index, len) else {
                return -1;
            };
            let old = items.borrow_mut().remove(i);
            dec_ref(old);
            0
        }
        Body::ByteArray(bytes) => {
            let len = bytes.borrow().len();
            let Some(i) = normalize(obj, index, len) else {
                return -1;
            };
            bytes.borrow_mut().remove(i);
            0
        }
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object doesn't support item deletion", obj_type_name(obj)),
            );
            -1
        }
    }
}

/// `item in container`: 1, 0, or -1 on error.
pub fn contains(container: ObjPtr, item: ObjPtr) -> i32 {
    match body(container) {
        Body::Dict(_) => values::dict_contains(container, item),
        Body::Set(_) => values::set_contains(container, item),
        Body::Str(s) => match values::str_as_str(item) {
            Some(needle) => i32::from(s.contains(needle)),
            None => {
                err::set_string(
                    builtin().type_error,
                    "'in <string>' requires string as left operand",
                );
                -1
            }
        },
        _ => {
            let it = get_iter(container);
            if it.is_null() {
                return -1;
            }
            let mut result = 0;
            loop {
                let next = iter_next(it);
                if next.is_null() {
                    if !err::occurred().is_null() {
                        result = -1;
                    }
                    break;
                }
                let eq = rich_eq(next, item);
                dec_ref(next);
                if eq != 0 {
                    result = eq;
                    break;
                }
            }
            dec_ref(it);
            result
        }
    }
}

fn bad_internal_call() {
    err::set_string(builtin().system_error, "bad argument to internal function");
}

/// Borrowed `list[index]`; no negative wrapping.
pub fn list_get_item(list: ObjPtr, index: isize) -> ObjPtr {
    let Body::List(items) = body(list) else {
        bad_internal_call();
        return ptr::null_mut();
    };
    let items = items.borrow();
    match usize::try_from(index).ok().and_then(|i| items.get(i)) {
        Some(item) => *item,
        None => {
            err::set_string(builtin().index_error, "list index out of range");
            ptr::null_mut()
        }
    }
}

/// `list[index] = value`, stealing `value` even on failure.
pub fn list_set_item(list: ObjPtr, index: isize, value: ObjPtr) -> i32 {
    let Body::List(items) = body(list) else {
        dec_ref(value);
        bad_internal_call();
        return -1;
    };
    store_stolen(items, index, value, "list assignment index out of range")
}

/// Borrowed `tuple[index]`; no negative wrapping.
pub fn tuple_get_item(tuple: ObjPtr, index: isize) -> ObjPtr {
    let Body::Tuple(items) = body(tuple) else {
        bad_internal_call();
        return ptr::null_mut();
    };
    let items = items.borrow();
    match usize::try_from(index).ok().and_then(|i| items.get(i)) {
        Some(item) => *item,
        None => {
            err::set_string(builtin().index_error, "tuple index out of range");
            ptr::null_mut()
        }
    }
}

/// Fill `tuple[index]`, stealing `value` even on failure.
pub fn tuple_set_item(tuple: ObjPtr, index: isize, value: ObjPtr) -> i32 {
    let Body::Tuple(items) = body(tuple) else {
        dec_ref(value);
        bad_internal_call();
        return -1;
    };
    store_stolen(items, index, value, "tuple assignment index out of range")
}

fn store_stolen(items: &RefCell<Vec<ObjPtr>>, index: isize, value: ObjPtr, msg: &str) -> i32 {
    let slot = usize::try_from(index)
        .ok()
        .filter(|&i| i < items.borrow().len());
    let Some(i) = slot else {
        dec_ref(value);
        err::set_string(builtin().index_error, msg);
        return -1;
    };
    let old = std::mem::replace(&mut items.borrow_mut()[i], value);
    dec_ref(old);
    0
}

/// Append `value` (borrowed) to a list.
pub fn list_append(list: ObjPtr, value: ObjPtr) -> i32 {
    let Body::List(items) = body(list) else {
        bad_internal_call();
        return -1;
    };
    inc_ref(value);
    items.borrow_mut().push(value);
    0
}

/// Insert `value` (borrowed) before `index`, clamped to the list bounds.
pub fn list_insert(list: ObjPtr, index: isize, value: ObjPtr) -> i32 {
    let Body::List(items) = body(list) else {
        bad_internal_call();
        return -1;
    };
    let len = items.borrow().len() as isize;
    let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
    inc_ref(value);
    items.borrow_mut().insert(at as usize, value);
    0
}

/// List or tuple view of `obj`: lists and tuples are returned as is, any
/// other iterable is materialised into a new list.
pub fn sequence_fast(obj: ObjPtr, message: &str) -> ObjPtr {
    if values::is_list(obj) || values::is_tuple(obj) {
        return own(obj);
    }
    let it = get_iter(obj);
    if it.is_null() {
        if err::exception_matches(builtin().type_error) {
            err::clear();
            err::set_string(builtin().type_error, message);
        }
        return ptr::null_mut();
    }
    let items = collect_iter(it);
    dec_ref(it);
    match items {
        Some(items) => values::list_from_vec(items),
        None => ptr::null_mut(),
    }
}

/// Pointer to the contiguous item storage of a list or tuple.
///
/// The pointer stays valid only while the container is neither resized nor
/// released; items are borrowed.
pub fn sequence_fast_items(fast: ObjPtr) -> *const ObjPtr {
    match body(fast) {
        Body::List(items) | Body::Tuple(items) => items.borrow().as_ptr(),
        _ => ptr::null(),
    }
}

pub fn sequence_fast_size(fast: ObjPtr) -> isize {
    match body(fast) {
        Body::List(items) | Body::Tuple(items) => items.borrow().len() as isize,
        _ => -1,
    }
}

// ============================================================================
// Length
// ============================================================================

/// `len(obj)`, or -1 with `TypeError`.
pub fn length(obj: ObjPtr) -> isize {
    match body(obj) {
        Body::Str(s) => s.chars().count() as isize,
        Body::Bytes(b) => b.len() as isize,
        Body::ByteArray(b) => b.borrow().len() as isize,
        Body::List(items) | Body::Tuple(items) => items.borrow().len() as isize,
        Body::Dict(t) | Body::Set(t) => t.borrow().len() as isize,
        Body::MemoryView(_) => buffer::view_len(obj),
        _ => no_len(obj),
    }
}

/// Estimated length: the real length when defined, the remaining count for
/// sequence iterators, `default` otherwise. -1 on a non-`TypeError` error.
pub fn length_hint(obj: ObjPtr, default: isize) -> isize {
    if let Body::SeqIter { seq, index } = body(obj) {
        let total = length(*seq);
        return if total < 0 { -1 } else { (total - index.get() as isize).max(0) };
    }
    let n = length(obj);
    if n >= 0 {
        return n;
    }
    if err::exception_matches(builtin().type_error) {
        err::clear();
        return default;
    }
    -1
}

// ============================================================================
// Iteration
// ============================================================================

pub fn is_iterator(obj: ObjPtr) -> bool {
    matches!(
        body(obj),
        Body::SeqIter { .. } | Body::KeyIter { .. } | Body::NativeIter(_)
    )
}

/// `iter(obj)`.
pub fn get_iter(obj: ObjPtr) -> ObjPtr {
    let b = builtin();
    match body(obj) {
        Body::SeqIter { .. } | Body::KeyIter { .. } | Body::NativeIter(_) => own(obj),
        Body::List(_) | Body::Tuple(_) | Body::Str(_) | Body::Bytes(_) | Body::ByteArray(_) => {
            alloc(
                b.iterator,
                Body::SeqIter {
                    seq: own(obj),
                    index: std::cell::Cell::new(0),
                },
            )
        }
        Body::Dict(_) | Body::Set(_) => alloc(
            b.iterator,
            Body::KeyIter {
                table: own(obj),
                pos: std::cell::Cell::new(0),
            },
        ),
        _ => {
            err::set_string(
                b.type_error,
                &format!("'{}' object is not iterable", obj_type_name(obj)),
            );
            ptr::null_mut()
        }
    }
}

/// Next item of an iterator. Exhaustion returns null with no error set; a
/// pending `StopIteration` is cleared and treated as exhaustion.
pub fn iter_next(it: ObjPtr) -> ObjPtr {
    let next = match body(it) {
        Body::SeqIter { seq, index } => {
            let i = index.get();
            if (i as isize) < length(*seq) {
                index.set(i + 1);
                sequence_get_item(*seq, i as isize)
            } else {
                ptr::null_mut()
            }
        }
        Body::KeyIter { table, pos } => {
            let (mut k, mut v) = (ptr::null_mut(), ptr::null_mut());
            let mut p = pos.get();
            let found = values::dict_next(*table, &mut p, &mut k, &mut v);
            pos.set(p);
            if found {
                own(k)
            } else {
                ptr::null_mut()
            }
        }
        Body::NativeIter(producer) => {
            let taken = producer.borrow_mut().take();
            match taken {
                Some(mut f) => {
                    let item = f();
                    *producer.borrow_mut() = Some(f);
                    item
                }
                None => {
                    err::set_string(builtin().runtime_error, "iterator already executing");
                    ptr::null_mut()
                }
            }
        }
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("'{}' object is not an iterator", obj_type_name(it)),
            );
            return ptr::null_mut();
        }
    };
    if next.is_null() && err::exception_matches(builtin().stop_iteration) {
        err::clear();
    }
    next
}

/// Drain an iterator into owned items (None on error, items released).
pub(crate) fn collect_iter(it: ObjPtr) -> Option<Vec<ObjPtr>> {
    let mut items = Vec::new();
    loop {
        let next = iter_next(it);
        if next.is_null() {
            break;
        }
        items.push(next);
    }
    if err::occurred().is_null() {
        Some(items)
    } else {
        items.into_iter().for_each(dec_ref);
        None
    }
}

fn collect(obj: ObjPtr) -> Option<Vec<ObjPtr>> {
    let it = get_iter(obj);
    if it.is_null() {
        return None;
    }
    let items = collect_iter(it);
    dec_ref(it);
    items
}

// ============================================================================
// str / repr
// ============================================================================

thread_local! {
    static RENDERING: RefCell<Vec<ObjPtr>> = const { RefCell::new(Vec::new()) };
}

fn quote(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn quote_bytes(b: &[u8], out: &mut String) {
    out.push_str("b'");
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push('\'');
}

fn format_float(v: f64, out: &mut String) {
    if v.is_nan() {
        out.push_str("nan");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "inf" } else { "-inf" });
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        let _ = write!(out, "{v:.1}");
    } else {
        let _ = write!(out, "{v}");
    }
}

fn render_items(items: &[ObjPtr], out: &mut String) -> Result<(), ()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render(*item, true, out)?;
    }
    Ok(())
}

fn render_custom(obj: ObjPtr, hook: &str, out: &mut String) -> Result<bool, ()> {
    let method = lookup_type_attr(type_of(obj), hook);
    if method.is_null() {
        return Ok(false);
    }
    let result = call_one(method, obj);
    if result.is_null() {
        return Err(());
    }
    let text = values::str_as_str(result).map(str::to_owned);
    dec_ref(result);
    match text {
        Some(t) => {
            out.push_str(&t);
            Ok(true)
        }
        None => {
            err::set_string(
                builtin().type_error,
                &format!("{hook} returned non-string"),
            );
            Err(())
        }
    }
}

fn render(obj: ObjPtr, repr: bool, out: &mut String) -> Result<(), ()> {
    let recursive = RENDERING.with(|r| r.borrow().contains(&obj));
    if recursive {
        out.push_str(match body(obj) {
            Body::List(_) => "[...]",
            Body::Dict(_) => "{...}",
            _ => "...",
        });
        return Ok(());
    }
    RENDERING.with(|r| r.borrow_mut().push(obj));
    let result = render_inner(obj, repr, out);
    RENDERING.with(|r| r.borrow_mut().pop());
    result
}

fn render_inner(obj: ObjPtr, repr: bool, out: &mut String) -> Result<(), ()> {
    match body(obj) {
        Body::None => out.push_str("None"),
        Body::Bool(v) => out.push_str(if *v { "True" } else { "False" }),
        Body::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Body::Float(v) => format_float(*v, out),
        Body::Str(s) if repr => quote(s, out),
        Body::Str(s) => out.push_str(s),
        Body::Bytes(b) => quote_bytes(b, out),
        Body::ByteArray(b) => {
            out.push_str("bytearray(");
            quote_bytes(&b.borrow(), out);
            out.push(')');
        }
        Body::Tuple(items) => {
            let items = items.borrow().clone();
            out.push('(');
            render_items(&items, out)?;
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Body::List(items) => {
            let items = items.borrow().clone();
            out.push('[');
            render_items(&items, out)?;
            out.push(']');
        }
        Body::Dict(table) => {
            let entries: Vec<(ObjPtr, ObjPtr)> =
                table.borrow().entries().map(|e| (e.key, e.value)).collect();
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(k, true, out)?;
                out.push_str(": ");
                render(v, true, out)?;
            }
            out.push('}');
        }
        Body::Set(table) => {
            let keys: Vec<ObjPtr> = table.borrow().entries().map(|e| e.key).collect();
            if keys.is_empty() {
                out.push_str("set()");
            } else {
                out.push('{');
                render_items(&keys, out)?;
                out.push('}');
            }
        }
        Body::Type(data) => {
            let _ = write!(out, "<class '{}'>", data.name);
        }
        Body::Module { name, .. } => {
            let _ = write!(out, "<module '{name}'>");
        }
        Body::Exception(data) => {
            let args = data.args;
            let items = match body(args) {
                Body::Tuple(items) => items.borrow().clone(),
                _ => Vec::new(),
            };
            if repr {
                out.push_str(obj_type_name(obj));
                out.push('(');
                render_items(&items, out)?;
                out.push(')');
            } else if items.len() == 1 {
                render(items[0], false, out)?;
            } else if !items.is_empty() {
                render(args, true, out)?;
            }
        }
        Body::Instance { .. } => {
            let hook = if repr { "__repr__" } else { "__str__" };
            if !render_custom(obj, hook, out)? && (repr || !render_custom(obj, "__repr__", out)?) {
                let _ = write!(out, "<{} object at {obj:p}>", obj_type_name(obj));
            }
        }
        Body::Capsule(_) => match capsule::capsule_name(obj) {
            Some(name) => {
                let _ = write!(out, "<capsule object \"{name}\" at {obj:p}>");
            }
            None => {
                let _ = write!(out, "<capsule object NULL at {obj:p}>");
            }
        },
        Body::Slice { start, stop, step } => {
            out.push_str("slice(");
            render_items(&[*start, *stop, *step], out)?;
            out.push(')');
        }
        Body::WeakRef(data) => {
            let target = data.target.get();
            if target.is_null() {
                let _ = write!(out, "<weakref at {obj:p}; dead>");
            } else {
                let _ = write!(
                    out,
                    "<weakref at {obj:p}; to '{}' at {target:p}>",
                    obj_type_name(target)
                );
            }
        }
        Body::MemoryView(_) => {
            let _ = write!(out, "<memory at {obj:p}>");
        }
        Body::Function(data) => {
            let _ = write!(out, "<built-in function {}>", data.name);
        }
        Body::SeqIter { .. } | Body::KeyIter { .. } | Body::NativeIter(_) => {
            let _ = write!(out, "<{} object at {obj:p}>", obj_type_name(obj));
        }
    }
    Ok(())
}

/// Render `str(obj)` into a Rust string (None with an error set on failure).
pub fn str_string(obj: ObjPtr) -> Option<String> {
    let mut out = String::new();
    render(obj, false, &mut out).ok().map(|()| out)
}

/// `str(obj)` as a new `str` object.
pub fn object_str(obj: ObjPtr) -> ObjPtr {
    if values::is_str(obj) {
        return own(obj);
    }
    match str_string(obj) {
        Some(s) => values::str_from_str(&s),
        None => ptr::null_mut(),
    }
}

/// `repr(obj)` as a new `str` object.
pub fn object_repr(obj: ObjPtr) -> ObjPtr {
    let mut out = String::new();
    match render(obj, true, &mut out) {
        Ok(()) => values::str_from_str(&out),
        Err(()) => ptr::null_mut(),
    }
}

// ============================================================================
// Truthiness, hashing, equality
// ============================================================================

/// `bool(obj)`: 1, 0, or -1 on error.
pub fn is_true(obj: ObjPtr) -> i32 {
    let truth = match body(obj) {
        Body::None => false,
        Body::Bool(v) => *v,
        Body::Int(v) => *v != 0,
        Body::Float(v) => *v != 0.0,
        Body::Str(s) => !s.is_empty(),
        Body::Bytes(b) => !b.is_empty(),
        Body::ByteArray(b) => !b.borrow().is_empty(),
        Body::Tuple(items) | Body::List(items) => !items.borrow().is_empty(),
        Body::Dict(t) | Body::Set(t) => t.borrow().len() > 0,
        _ => true,
    };
    i32::from(truth)
}

fn finish_hash(h: i64) -> i64 {
    if h == -1 {
        -2
    } else {
        h
    }
}

fn hash_bytes(tag: u8, data: &[u8]) -> i64 {
    let mut hasher = DefaultHasher::new();
    tag.hash(&mut hasher);
    data.hash(&mut hasher);
    finish_hash(hasher.finish() as i64)
}

/// `hash(obj)`, or -1 with `TypeError` for unhashable objects.
pub fn object_hash(obj: ObjPtr) -> i64 {
    match body(obj) {
        Body::Bool(v) => i64::from(*v),
        Body::Int(v) => finish_hash(*v),
        Body::Float(v) => {
            if v.fract() == 0.0 && v.abs() < 9.2e18 {
                finish_hash(*v as i64)
            } else {
                hash_bytes(2, &v.to_bits().to_le_bytes())
            }
        }
        Body::Str(s) => hash_bytes(0, s.as_bytes()),
        Body::Bytes(b) => hash_bytes(1, b),
        Body::Tuple(items) => {
            let items = items.borrow().clone();
            let mut acc: i64 = 0x345678;
            for item in items {
                let h = object_hash(item);
                if h == -1 && !err::occurred().is_null() {
                    return -1;
                }
                acc = (acc ^ h).wrapping_mul(1_000_003);
            }
            finish_hash(acc)
        }
        Body::List(_) | Body::Dict(_) | Body::Set(_) | Body::ByteArray(_) | Body::Slice { .. } => {
            err::set_string(
                builtin().type_error,
                &format!("unhashable type: '{}'", obj_type_name(obj)),
            );
            -1
        }
        _ => finish_hash((obj as usize >> 4) as i64),
    }
}

fn numeric(obj: ObjPtr) -> Option<Result<i64, f64>> {
    match body(obj) {
        Body::Bool(v) => Some(Ok(i64::from(*v))),
        Body::Int(v) => Some(Ok(*v)),
        Body::Float(v) => Some(Err(*v)),
        _ => None,
    }
}

fn seq_eq(a: &[ObjPtr], b: &[ObjPtr]) -> i32 {
    if a.len() != b.len() {
        return 0;
    }
    for (x, y) in a.iter().zip(b) {
        match rich_eq(*x, *y) {
            1 => {}
            r => return r,
        }
    }
    1
}

/// `a == b`: 1, 0, or -1 on error.
pub fn rich_eq(a: ObjPtr, b: ObjPtr) -> i32 {
    if a == b {
        return 1;
    }
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        let eq = match (x, y) {
            (Ok(x), Ok(y)) => x == y,
            (Ok(x), Err(y)) | (Err(y), Ok(x)) => x as f64 == y,
            (Err(x), Err(y)) => x == y,
        };
        return i32::from(eq);
    }
    match (body(a), body(b)) {
        (Body::Str(x), Body::Str(y)) => i32::from(x == y),
        (Body::Bytes(x), Body::Bytes(y)) => i32::from(x == y),
        (Body::ByteArray(x), Body::ByteArray(y)) => i32::from(*x.borrow() == *y.borrow()),
        (Body::Tuple(x), Body::Tuple(y)) | (Body::List(x), Body::List(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            seq_eq(&x, &y)
        }
        (Body::Dict(x), Body::Dict(y)) => {
            if x.borrow().len() != y.borrow().len() {
                return 0;
            }
            let entries: Vec<(ObjPtr, ObjPtr)> =
                x.borrow().entries().map(|e| (e.key, e.value)).collect();
            for (k, v) in entries {
                let other = values::dict_get_item(b, k);
                if other.is_null() {
                    return if err::occurred().is_null() { 0 } else { -1 };
                }
                match rich_eq(v, other) {
                    1 => {}
                    r => return r,
                }
            }
            1
        }
        (Body::Set(x), Body::Set(y)) => {
            if x.borrow().len() != y.borrow().len() {
                return 0;
            }
            let keys: Vec<ObjPtr> = x.borrow().entries().map(|e| e.key).collect();
            for k in keys {
                match values::set_contains(b, k) {
                    1 => {}
                    r => return r,
                }
            }
            1
        }
        _ => 0,
    }
}

// ============================================================================
// Calls
// ============================================================================

pub fn is_callable(obj: ObjPtr) -> bool {
    match body(obj) {
        Body::Function(_) | Body::Type(_) => true,
        Body::Instance { .. } => !lookup_type_attr(type_of(obj), "__call__").is_null(),
        _ => false,
    }
}

/// `callable(*args, **kwargs)`. `args` is a borrowed tuple (null means no
/// arguments), `kwargs` a borrowed dict or null.
pub fn call(callable: ObjPtr, args: ObjPtr, kwargs: ObjPtr) -> ObjPtr {
    let args = if args.is_null() {
        values::tuple_new(0)
    } else {
        own(args)
    };
    if args.is_null() {
        return ptr::null_mut();
    }
    let result = match body(callable) {
        Body::Function(data) => {
            let r = (data.call)(args, kwargs);
            if r.is_null() && err::occurred().is_null() {
                err::set_string(
                    builtin().system_error,
                    &format!("{} returned NULL without setting an exception", data.name),
                );
            }
            r
        }
        Body::Type(_) => construct(callable, args, kwargs),
        Body::Instance { .. } => {
            let method = lookup_type_attr(type_of(callable), "__call__");
            if method.is_null() {
                not_callable(callable)
            } else {
                call_with_self(method, callable, args, kwargs)
            }
        }
        _ => not_callable(callable),
    };
    dec_ref(args);
    result
}

fn not_callable(obj: ObjPtr) -> ObjPtr {
    err::set_string(
        builtin().type_error,
        &format!("'{}' object is not callable", obj_type_name(obj)),
    );
    ptr::null_mut()
}

fn call_with_self(method: ObjPtr, this: ObjPtr, args: ObjPtr, kwargs: ObjPtr) -> ObjPtr {
    let mut items = vec![own(this)];
    if !args.is_null() {
        items.extend(arg_items(args).into_iter().map(own));
    }
    let full = values::tuple_from_vec(items);
    if full.is_null() {
        return ptr::null_mut();
    }
    let r = call(method, full, kwargs);
    dec_ref(full);
    r
}

/// `callable(arg)`.
pub fn call_one(callable: ObjPtr, arg: ObjPtr) -> ObjPtr {
    let args = values::tuple_from_vec(vec![own(arg)]);
    if args.is_null() {
        return ptr::null_mut();
    }
    let r = call(callable, args, ptr::null_mut());
    dec_ref(args);
    r
}

/// `obj.name(*args)`. Methods found on the type are called with `obj`
/// prepended to `args`.
pub fn call_method(obj: ObjPtr, name: &str, args: ObjPtr) -> ObjPtr {
    if !types::is_type(obj) {
        let attr = instance_attr(obj, name);
        if attr.is_null() {
            if !err::occurred().is_null() {
                return ptr::null_mut();
            }
            let method = lookup_type_attr(type_of(obj), name);
            if method.is_null() {
                missing_attr(obj, name);
                return ptr::null_mut();
            }
            return call_with_self(method, obj, args, ptr::null_mut());
        }
        let r = call(attr, args, ptr::null_mut());
        dec_ref(attr);
        return r;
    }
    let method = getattr_str(obj, name);
    if method.is_null() {
        return ptr::null_mut();
    }
    let r = call(method, args, ptr::null_mut());
    dec_ref(method);
    r
}

fn arg_items(args: ObjPtr) -> Vec<ObjPtr> {
    match body(args) {
        Body::Tuple(items) => items.borrow().clone(),
        _ => Vec::new(),
    }
}

fn construct(ty: ObjPtr, args: ObjPtr, kwargs: ObjPtr) -> ObjPtr {
    let b = builtin();
    let Some(data) = type_data(ty) else {
        return not_callable(ty);
    };
    let items = arg_items(args);
    let first = items.first().copied();
    let kind = data.kind;
    match (kind, first) {
        (TypeKind::Instance, _) => {
            let dict = values::dict_new();
            if dict.is_null() {
                return ptr::null_mut();
            }
            let this = alloc(ty, Body::Instance { dict });
            if this.is_null() {
                return ptr::null_mut();
            }
            let init = lookup_type_attr(ty, "__init__");
            if !init.is_null() {
                let r = call_with_self(init, this, args, kwargs);
                if r.is_null() {
                    dec_ref(this);
                    return ptr::null_mut();
                }
                dec_ref(r);
            }
            this
        }
        (TypeKind::Object, None) => alloc(
            ty,
            Body::Instance {
                dict: ptr::null_mut(),
            },
        ),
        (TypeKind::Exception, _) => err::new_exception(ty, args),
        (TypeKind::Type, Some(x)) if items.len() == 1 => own(type_of(x)),
        (TypeKind::Type, Some(name)) if items.len() == 3 => build_type(name, items[1], items[2]),
        (TypeKind::Str, None) => values::str_from_str(""),
        (TypeKind::Str, Some(x)) => object_str(x),
        (TypeKind::Int, None) => values::int_from_i64(0),
        (TypeKind::Int, Some(x)) => number_long(x),
        (TypeKind::Float, None) => values::float_from_f64(0.0),
        (TypeKind::Float, Some(x)) => number_float(x),
        (TypeKind::Bool, None) => values::bool_from(false),
        (TypeKind::Bool, Some(x)) => match is_true(x) {
            -1 => ptr::null_mut(),
            t => values::bool_from(t == 1),
        },
        (TypeKind::Bytes | TypeKind::ByteArray, x) => {
            let data = match x {
                None => Vec::new(),
                Some(x) => match byte_source(x) {
                    Some(d) => d,
                    None => return ptr::null_mut(),
                },
            };
            if kind == TypeKind::Bytes {
                values::bytes_from_slice(&data)
            } else {
                values::bytearray_from_slice(&data)
            }
        }
        (TypeKind::Tuple | TypeKind::List, x) => {
            let owned = match x {
                None => Vec::new(),
                Some(x) => match collect(x) {
                    Some(v) => v,
                    None => return ptr::null_mut(),
                },
            };
            if kind == TypeKind::List {
                values::list_from_vec(owned)
            } else {
                values::tuple_from_vec(owned)
            }
        }
        (TypeKind::Dict, x) => {
            let d = values::dict_new();
            if let (false, Some(src)) = (d.is_null(), x) {
                if !values::is_dict(src) {
                    dec_ref(d);
                    err::set_string(b.type_error, "dict() argument must be a dict");
                    return ptr::null_mut();
                }
                let mut pos = 0;
                let (mut k, mut v) = (ptr::null_mut(), ptr::null_mut());
                while values::dict_next(src, &mut pos, &mut k, &mut v) {
                    if values::dict_set_item(d, k, v) < 0 {
                        dec_ref(d);
                        return ptr::null_mut();
                    }
                }
            }
            d
        }
        (TypeKind::Set, x) => {
            let s = values::set_new();
            if let (false, Some(src)) = (s.is_null(), x) {
                let Some(keys) = collect(src) else {
                    dec_ref(s);
                    return ptr::null_mut();
                };
                let failed = keys.iter().any(|k| values::set_add(s, *k) < 0);
                keys.into_iter().for_each(dec_ref);
                if failed {
                    dec_ref(s);
                    return ptr::null_mut();
                }
            }
            s
        }
        (TypeKind::MemoryView, Some(x)) => buffer::memoryview_from_object(x),
        _ => {
            err::set_string(
                b.type_error,
                &format!("cannot create '{}' instances", type_name(ty)),
            );
            ptr::null_mut()
        }
    }
}

fn build_type(name: ObjPtr, bases: ObjPtr, namespace: ObjPtr) -> ObjPtr {
    let b = builtin();
    let Some(name) = values::str_as_str(name) else {
        err::set_string(b.type_error, "type() argument 1 must be str");
        return ptr::null_mut();
    };
    let base = match arg_items(bases).first() {
        Some(base) => *base,
        None => b.object,
    };
    let ty = types::type_new(name, base, ptr::null_mut());
    if ty.is_null() {
        return ptr::null_mut();
    }
    let dict = types::type_dict(ty);
    let mut pos = 0;
    let (mut k, mut v) = (ptr::null_mut(), ptr::null_mut());
    while values::dict_next(namespace, &mut pos, &mut k, &mut v) {
        if values::dict_set_item(dict, k, v) < 0 {
            dec_ref(ty);
            return ptr::null_mut();
        }
    }
    ty
}

fn byte_source(x: ObjPtr) -> Option<Vec<u8>> {
    let b = builtin();
    match body(x) {
        Body::Bytes(data) => Some(data.clone()),
        Body::ByteArray(data) => Some(data.borrow().clone()),
        Body::Str(_) => {
            err::set_string(b.type_error, "string argument without an encoding");
            None
        }
        Body::Int(n) => match usize::try_from(*n) {
            Ok(n) => Some(vec![0; n]),
            Err(_) => {
                err::set_string(b.value_error, "negative count");
                None
            }
        },
        Body::MemoryView(_) => buffer::view_bytes(x),
        _ => {
            let items = collect(x)?;
            let mut out = Vec::with_capacity(items.len());
            let mut ok = true;
            for item in &items {
                let v = long_as_i64(*item);
                match u8::try_from(v) {
                    Ok(byte) if err::occurred().is_null() => out.push(byte),
                    _ => {
                        if err::occurred().is_null() {
                            err::set_string(b.value_error, "bytes must be in range(0, 256)");
                        }
                        ok = false;
                        break;
                    }
                }
            }
            items.into_iter().for_each(dec_ref);
            ok.then_some(out)
        }
    }
}

// ============================================================================
// Numeric coercion
// ============================================================================

/// `int(obj)`.
pub fn number_long(obj: ObjPtr) -> ObjPtr {
    let b = builtin();
    match body(obj) {
        Body::Int(_) => own(obj),
        Body::Bool(v) => values::int_from_i64(i64::from(*v)),
        Body::Float(v) => {
            if v.is_nan() {
                err::set_string(b.value_error, "cannot convert float NaN to integer");
                ptr::null_mut()
            } else if v.is_infinite() {
                err::set_string(b.overflow_error, "cannot convert float infinity to integer");
                ptr::null_mut()
            } else if v.trunc() < i64::MIN as f64 || v.trunc() >= i64::MAX as f64 {
                err::set_string(b.overflow_error, "int too large to convert");
                ptr::null_mut()
            } else {
                values::int_from_i64(v.trunc() as i64)
            }
        }
        Body::Str(s) => match s.trim().replace('_', "").parse::<i64>() {
            Ok(v) => values::int_from_i64(v),
            Err(_) => {
                err::set_string(
                    b.value_error,
                    &format!("invalid literal for int() with base 10: '{s}'"),
                );
                ptr::null_mut()
            }
        },
        _ => {
            err::set_string(
                b.type_error,
                &format!(
                    "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                    obj_type_name(obj)
                ),
            );
            ptr::null_mut()
        }
    }
}

/// `float(obj)`.
pub fn number_float(obj: ObjPtr) -> ObjPtr {
    let b = builtin();
    match body(obj) {
        Body::Float(_) => own(obj),
        Body::Int(v) => values::float_from_f64(*v as f64),
        Body::Bool(v) => values::float_from_f64(f64::from(u8::from(*v))),
        Body::Str(s) => match s.trim().parse::<f64>() {
            Ok(v) => values::float_from_f64(v),
            Err(_) => {
                err::set_string(
                    b.value_error,
                    &format!("could not convert string to float: '{s}'"),
                );
                ptr::null_mut()
            }
        },
        _ => {
            err::set_string(
                b.type_error,
                &format!(
                    "float() argument must be a string or a real number, not '{}'",
                    obj_type_name(obj)
                ),
            );
            ptr::null_mut()
        }
    }
}

/// Value of an `int`/`bool`; -1 with `TypeError` for anything else.
pub fn long_as_i64(obj: ObjPtr) -> i64 {
    match body(obj) {
        Body::Int(v) => *v,
        Body::Bool(v) => i64::from(*v),
        _ => {
            err::set_string(
                builtin().type_error,
                &format!(
                    "'{}' object cannot be interpreted as an integer",
                    obj_type_name(obj)
                ),
            );
            -1
        }
    }
}

/// Unsigned value; `u64::MAX` with an error set on failure.
pub fn long_as_u64(obj: ObjPtr) -> u64 {
    let v = long_as_i64(obj);
    if v == -1 && !err::occurred().is_null() {
        return u64::MAX;
    }
    u64::try_from(v).unwrap_or_else(|_| {
        err::set_string(
            builtin().overflow_error,
            "can't convert negative int to unsigned",
        );
        u64::MAX
    })
}

/// Value of a real number; -1.0 with `TypeError` for anything else.
pub fn float_as_f64(obj: ObjPtr) -> f64 {
    match body(obj) {
        Body::Float(v) => *v,
        Body::Int(v) => *v as f64,
        Body::Bool(v) => f64::from(u8::from(*v)),
        _ => {
            err::set_string(
                builtin().type_error,
                &format!("must be real number, not {}", obj_type_name(obj)),
            );
            -1.0
        }
    }
}

/// True if `obj` is an instance of `ty` or a subclass.
pub fn type_check(obj: ObjPtr, ty: ObjPtr) -> bool {
    is_subtype(type_of(obj), ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{function, gil, object::refcount};

    fn s(text: &str) -> ObjPtr {
        values::str_from_str(text)
    }

    #[test]
    fn test_list_set_item_steals_and_sequence_set_item_borrows() {
        let _gil = gil::acquire();
        let list = values::list_new(2);
        let sample = s("sample");

        inc_ref(sample);
        assert_eq!(list_set_item(list, 0, sample), 0);
        assert_eq!(refcount(sample), 2);

        assert_eq!(sequence_set_item(list, 1, sample), 0);
        assert_eq!(refcount(sample), 3);

        dec_ref(list);
        assert_eq!(refcount(sample), 1);
        dec_ref(sample);
    }

    #[test]
    fn test_list_set_item_out_of_range_still_steals() {
        let _gil = gil::acquire();
        let list = values::list_new(0);
        let sample = s("sample");
        inc_ref(sample);
        assert_eq!(list_set_item(list, 3, sample), -1);
        assert!(err::exception_matches(builtin().index_error));
        err::clear();
        assert_eq!(refcount(sample), 1);
        dec_ref(sample);
        dec_ref(list);
    }

    #[test]
    fn test_missing_attribute_raises_attribute_error() {
        let _gil = gil::acquire();
        let value = values::int_from_i64(3);
        assert!(getattr_str(value, "nope").is_null());
        assert!(err::exception_matches(builtin().attribute_error));
        err::clear();
        assert!(!hasattr_str(value, "nope"));
        assert!(err::occurred().is_null());
        dec_ref(value);
    }

    #[test]
    fn test_instance_attributes_and_type_fallback() {
        let _gil = gil::acquire();
        let b = builtin();
        let cls = types::type_new("Point", b.object, ptr::null_mut());
        let shared = values::int_from_i64(7);
        assert_eq!(setattr_str(cls, "shared", shared), 0);

        let obj = call(cls, ptr::null_mut(), ptr::null_mut());
        assert!(!obj.is_null());
        let x = values::int_from_i64(1);
        assert_eq!(setattr_str(obj, "x", x), 0);

        let got = getattr_str(obj, "x");
        assert_eq!(got, x);
        dec_ref(got);
        let got = getattr_str(obj, "shared");
        assert_eq!(got, shared);
        dec_ref(got);

        assert_eq!(delattr_str(obj, "x"), 0);
        assert_eq!(delattr_str(obj, "x"), -1);
        assert!(err::exception_matches(b.attribute_error));
        err::clear();

        for p in [obj, cls, x, shared] {
            dec_ref(p);
        }
    }

    #[test]
    fn test_iter_next_exhaustion_is_not_an_error() {
        let _gil = gil::acquire();
        let list = values::list_new(1);
        let it = get_iter(list);
        let first = iter_next(it);
        assert!(values::is_none(first));
        assert!(iter_next(it).is_null());
        assert!(err::occurred().is_null());
        assert!(iter_next(it).is_null());
        dec_ref(it);
        dec_ref(list);
    }

    #[test]
    fn test_native_iterator_stop_iteration_is_cleared() {
        let _gil = gil::acquire();
        let mut left = 2;
        let it = function::native_iter_new(move || {
            if left == 0 {
                err::set_none(builtin().stop_iteration);
                return ptr::null_mut();
            }
            left -= 1;
            values::int_from_i64(left)
        });
        let a = iter_next(it);
        let b = iter_next(it);
        assert_eq!((long_as_i64(a), long_as_i64(b)), (1, 0));
        assert!(iter_next(it).is_null());
        assert!(err::occurred().is_null());
        for p in [a, b, it] {
            dec_ref(p);
        }
    }

    #[test]
    fn test_repr_of_nested_containers() {
        let _gil = gil::acquire();
        let inner = values::tuple_from_vec(vec![s("a")]);
        let list = values::list_from_vec(vec![values::int_from_i64(1), inner]);
        assert_eq!(str_string(list).as_deref(), Some("[1, ('a',)]"));

        list_append(list, list);
        assert_eq!(str_string(list).as_deref(), Some("[1, ('a',), [...]]"));
        // Break the self-reference before releasing.
        sequence_del_item(list, 2);
        dec_ref(list);
    }

    #[test]
    fn test_numeric_equality_and_hash_agree() {
        let _gil = gil::acquire();
        let one = values::int_from_i64(1);
        let one_f = values::float_from_f64(1.0);
        let t = values::bool_from(true);
        assert_eq!(rich_eq(one, one_f), 1);
        assert_eq!(rich_eq(one, t), 1);
        assert_eq!(object_hash(one), object_hash(one_f));
        assert_eq!(object_hash(one), object_hash(t));
        dec_ref(one);
        dec_ref(one_f);
    }

    #[test]
    fn test_str_slice_and_negative_index() {
        let _gil = gil::acquire();
        let text = s("hello");
        let last = sequence_get_item(text, -1);
        assert_eq!(values::str_as_str(last), Some("o"));
        let step = values::int_from_i64(2);
        let sl = slice::slice_new(ptr::null_mut(), ptr::null_mut(), step);
        let every_other = get_item(text, sl);
        assert_eq!(values::str_as_str(every_other), Some("hlo"));
        for p in [text, last, step, sl, every_other] {
            dec_ref(p);
        }
    }

    #[test]
    fn test_number_coercions() {
        let _gil = gil::acquire();
        let text = s(" 42 ");
        let n = number_long(text);
        assert_eq!(long_as_i64(n), 42);
        let f = number_float(n);
        assert_eq!(float_as_f64(f), 42.0);

        let bad = s("x");
        assert!(number_long(bad).is_null());
        assert!(err::exception_matches(builtin().value_error));
        err::clear();

        let neg = values::int_from_i64(-1);
        assert_eq!(long_as_u64(neg), u64::MAX);
        assert!(err::exception_matches(builtin().overflow_error));
        err::clear();
        for p in [text, n, f, bad, neg] {
            dec_ref(p);
        }
    }
}
