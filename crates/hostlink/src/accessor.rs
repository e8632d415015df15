// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lazy attribute and item accessors.
//!
//! An [`Accessor`] stores `(owner, key)` and never the value itself: every
//! [`get`](Accessor::get) calls into the runtime again and every
//! [`set`](Accessor::set) is applied immediately.
//!
//! # Reference counting per key kind
//!
//! ```text
//! +--------------+-----------------------+----------------------------+
//! | key          | get                   | set                        |
//! +--------------+-----------------------+----------------------------+
//! | Attr/StrAttr | new reference         | borrows value              |
//! | Item         | new reference         | borrows value              |
//! | SequenceItem | new reference         | borrows value              |
//! | ListItem     | borrowed -> +1        | steals: value pre-incref'd |
//! | TupleItem    | borrowed -> +1        | steals: value pre-incref'd |
//! +--------------+-----------------------+----------------------------+
//! ```

use std::marker::PhantomData;

use hostlink_rt::{err, ops};

use crate::error::{self, Result};
use crate::handle::Handle;
use crate::object::{Object, ObjectApi, ToObject};

/// What an [`Accessor`] points at.
#[derive(Debug, Clone)]
pub enum AccessKey {
    /// Attribute named by a host string object.
    Attr(Object),
    StrAttr(String),
    /// Subscript with an arbitrary key (mappings and sequences).
    Item(Object),
    /// Sequence protocol index; negative indices wrap.
    SequenceItem(isize),
    /// Concrete list slot; no wrapping.
    ListItem(isize),
    /// Concrete tuple slot; no wrapping.
    TupleItem(isize),
}

/// Proxy for `owner.<key>` / `owner[key]`.
///
/// Borrows the owner's reference for `'a`, so it can not outlive it.
#[derive(Debug)]
pub struct Accessor<'a> {
    owner: Handle,
    key: AccessKey,
    _owner: PhantomData<&'a Object>,
}

impl<'a> Accessor<'a> {
    pub(crate) fn new(owner: Handle, key: AccessKey) -> Self {
        Self {
            owner,
            key,
            _owner: PhantomData,
        }
    }

    pub fn owner(&self) -> Handle {
        self.owner
    }

    pub fn key(&self) -> &AccessKey {
        &self.key
    }

    /// Materialize the current value.
    pub fn get(&self) -> Result<Object> {
        let owner = self.owner.ptr();
        match &self.key {
            AccessKey::Attr(name) => error::new_ref(ops::getattr(owner, name.ptr())),
            AccessKey::StrAttr(name) => error::new_ref(ops::getattr_str(owner, name)),
            AccessKey::Item(key) => error::new_ref(ops::get_item(owner, key.ptr())),
            AccessKey::SequenceItem(index) => error::new_ref(ops::sequence_get_item(owner, *index)),
            AccessKey::ListItem(index) => error::borrowed_ref(ops::list_get_item(owner, *index)),
            AccessKey::TupleItem(index) => error::borrowed_ref(ops::tuple_get_item(owner, *index)),
        }
    }

    /// Store `value` under the key.
    pub fn set(&self, value: impl ToObject) -> Result<()> {
        let owner = self.owner.ptr();
        let value = value.to_object()?;
        match &self.key {
            AccessKey::Attr(name) => error::status(ops::setattr(owner, name.ptr(), value.ptr())),
            AccessKey::StrAttr(name) => error::status(ops::setattr_str(owner, name, value.ptr())),
            AccessKey::Item(key) => error::status(ops::set_item(owner, key.ptr(), value.ptr())),
            AccessKey::SequenceItem(index) => {
                error::status(ops::sequence_set_item(owner, *index, value.ptr()))
            }
            // The slot takes over the reference `value` holds.
            AccessKey::ListItem(index) => {
                error::status(ops::list_set_item(owner, *index, value.release().ptr()))
            }
            AccessKey::TupleItem(index) => {
                error::status(ops::tuple_set_item(owner, *index, value.release().ptr()))
            }
        }
    }

    /// Delete the attribute or item.
    pub fn del(&self) -> Result<()> {
        let owner = self.owner.ptr();
        match &self.key {
            AccessKey::Attr(name) => error::status(ops::delattr(owner, name.ptr())),
            AccessKey::StrAttr(name) => error::status(ops::delattr_str(owner, name)),
            AccessKey::Item(key) => error::status(ops::del_item(owner, key.ptr())),
            AccessKey::SequenceItem(index) | AccessKey::ListItem(index) | AccessKey::TupleItem(index) => {
                error::status(ops::sequence_del_item(owner, *index))
            }
        }
    }

    /// The value, or `default` when the lookup fails for any reason. The
    /// failure is cleared, whatever it was.
    pub fn get_or(&self, default: Object) -> Object {
        match self.get() {
            Ok(value) => value,
            Err(_) => {
                err::clear();
                default
            }
        }
    }

    /// `owner.<key>(*args)`.
    pub fn call(&self, args: &[Object]) -> Result<Object> {
        self.get()?.call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{List, Tuple};
    use hostlink_rt::{builtin, gil, values};

    fn sample() -> Object {
        // A list: never immortal, so its count is observable.
        // SAFETY: new reference.
        unsafe { Object::steal(values::list_new(0)) }
    }

    #[test]
    fn test_get_materializes_each_time() {
        let _gil = gil::acquire();
        let list = List::new().unwrap();
        list.append(1i64).unwrap();
        let slot = list.get(0);
        let first = slot.get().unwrap();
        slot.set(2i64).unwrap();
        let second = slot.get().unwrap();
        assert!(!first.is(second.handle()));
        assert!(second.equal(2i64).unwrap());
    }

    #[test]
    fn test_list_and_tuple_set_take_one_reference() {
        let _gil = gil::acquire();
        let value = sample();
        let list = List::with_len(1).unwrap();
        let tuple = Tuple::with_len(1).unwrap();

        Accessor::new(list.handle(), AccessKey::ListItem(0)).set(&value).unwrap();
        assert_eq!(value.ref_count(), 2);
        Accessor::new(tuple.handle(), AccessKey::TupleItem(0)).set(&value).unwrap();
        assert_eq!(value.ref_count(), 3);

        // Borrowed get: wrapping it adds exactly one reference.
        let got = Accessor::new(tuple.handle(), AccessKey::TupleItem(0)).get().unwrap();
        assert_eq!(value.ref_count(), 4);
        drop(got);
        drop(list);
        drop(tuple);
        assert_eq!(value.ref_count(), 1);
    }

    #[test]
    fn test_sequence_set_does_not_consume_callers_reference() {
        let _gil = gil::acquire();
        let value = sample();
        let list = List::with_len(1).unwrap();
        list.index(0).set(&value).unwrap();
        // One reference for the slot, none leaked or stolen.
        assert_eq!(value.ref_count(), 2);
        list.index(-1).set(()).unwrap();
        assert_eq!(value.ref_count(), 1);
    }

    #[test]
    fn test_failed_list_set_releases_value() {
        let _gil = gil::acquire();
        let value = sample();
        let list = List::new().unwrap();
        let e = Accessor::new(list.handle(), AccessKey::ListItem(3))
            .set(&value)
            .unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().index_error)));
        assert_eq!(value.ref_count(), 1);
    }

    #[test]
    fn test_item_and_attr_keys() {
        let _gil = gil::acquire();
        let dict = crate::types::Dict::new().unwrap();
        dict.item("answer").unwrap().set(42i64).unwrap();
        assert!(dict.item("answer").unwrap().get().unwrap().equal(42i64).unwrap());
        dict.item("answer").unwrap().del().unwrap();
        let missing = dict.item("answer").unwrap().get().unwrap_err();
        assert!(missing.matches(Handle::from_static(builtin().key_error)));

        let fallback = "fallback".to_object().unwrap();
        let got = dict.attr("nope").get_or(fallback.clone());
        assert!(got.is(fallback.handle()));
        assert!(err::occurred().is_null());
    }
}
