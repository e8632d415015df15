// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container iteration.
//!
//! Two layers:
//!
//! - Policy iterators ([`GenericIterator`] over an [`IteratorPolicy`]) for
//!   lists/tuples (contiguous fast path), arbitrary sequences (index based,
//!   read-write) and dicts (position based, read-only). [`Range`] turns a
//!   `begin`/`end` pair into a Rust [`Iterator`].
//! - [`HostIterator`], a wrapper over any runtime iterator object with an
//!   explicit exhaustion [`sentinel`](HostIterator::sentinel).

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::mem;

use hostlink_rt::{err, ops, values, ObjPtr};

use crate::accessor::{AccessKey, Accessor};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::object::{Object, ToObject};

// ============================================================================
// Policies
// ============================================================================

/// Minimal forward iteration contract.
pub trait IteratorPolicy: Clone {
    type Item;

    fn dereference(&self) -> Self::Item;
    fn increment(&mut self);
    fn equal(&self, other: &Self) -> bool;
}

/// Index-based policies can also move backwards and jump.
pub trait BidirectionalPolicy: IteratorPolicy {
    fn decrement(&mut self);
    fn advance(&mut self, n: isize);
    /// Number of increments from `self` to `other`.
    fn distance(&self, other: &Self) -> isize;
}

/// Read-only walk over the contiguous item storage of a list or tuple.
///
/// The container must not be resized while the iterator is alive; this is
/// not checked.
#[derive(Debug, Clone, Copy)]
pub struct SequenceFastReadonly<'a> {
    ptr: *const ObjPtr,
    _owner: PhantomData<&'a Object>,
}

impl<'a> SequenceFastReadonly<'a> {
    pub(crate) fn new(ptr: *const ObjPtr) -> Self {
        Self {
            ptr,
            _owner: PhantomData,
        }
    }
}

impl<'a> IteratorPolicy for SequenceFastReadonly<'a> {
    type Item = Handle;

    fn dereference(&self) -> Handle {
        // SAFETY: `Range` only dereferences positions strictly before its
        // end, which lie inside the item storage of a live container that
        // has not been resized (type-level precondition).
        unsafe { Handle::from_ptr(*self.ptr) }
    }

    fn increment(&mut self) {
        self.ptr = self.ptr.wrapping_add(1);
    }

    fn equal(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<'a> BidirectionalPolicy for SequenceFastReadonly<'a> {
    fn decrement(&mut self) {
        self.ptr = self.ptr.wrapping_sub(1);
    }

    fn advance(&mut self, n: isize) {
        self.ptr = self.ptr.wrapping_offset(n);
    }

    fn distance(&self, other: &Self) -> isize {
        (other.ptr as isize - self.ptr as isize) / mem::size_of::<ObjPtr>() as isize
    }
}

/// Read-write walk over any sequence through the sequence protocol.
#[derive(Debug, Clone, Copy)]
pub struct SequenceSlowReadwrite<'a> {
    obj: Handle,
    index: isize,
    _owner: PhantomData<&'a Object>,
}

impl<'a> SequenceSlowReadwrite<'a> {
    pub(crate) fn new(obj: Handle, index: isize) -> Self {
        Self {
            obj,
            index,
            _owner: PhantomData,
        }
    }
}

impl<'a> IteratorPolicy for SequenceSlowReadwrite<'a> {
    type Item = Accessor<'a>;

    fn dereference(&self) -> Accessor<'a> {
        Accessor::new(self.obj, AccessKey::SequenceItem(self.index))
    }

    fn increment(&mut self) {
        self.index += 1;
    }

    fn equal(&self, other: &Self) -> bool {
        self.obj == other.obj && self.index == other.index
    }
}

impl<'a> BidirectionalPolicy for SequenceSlowReadwrite<'a> {
    fn decrement(&mut self) {
        self.index -= 1;
    }

    fn advance(&mut self, n: isize) {
        self.index += n;
    }

    fn distance(&self, other: &Self) -> isize {
        other.index - self.index
    }
}

/// Read-only walk over a dict's `(key, value)` pairs.
#[derive(Debug, Clone, Copy)]
pub struct DictReadonly<'a> {
    obj: Handle,
    pos: usize,
    key: ObjPtr,
    value: ObjPtr,
    _owner: PhantomData<&'a Object>,
}

impl<'a> DictReadonly<'a> {
    const END: usize = usize::MAX;

    /// Positioned on the first entry (or at the end for an empty dict).
    pub(crate) fn begin(obj: Handle) -> Self {
        let mut it = Self {
            obj,
            pos: 0,
            key: std::ptr::null_mut(),
            value: std::ptr::null_mut(),
            _owner: PhantomData,
        };
        it.increment();
        it
    }

    pub(crate) fn end(obj: Handle) -> Self {
        Self {
            obj,
            pos: Self::END,
            key: std::ptr::null_mut(),
            value: std::ptr::null_mut(),
            _owner: PhantomData,
        }
    }
}

impl<'a> IteratorPolicy for DictReadonly<'a> {
    type Item = (Handle, Handle);

    fn dereference(&self) -> (Handle, Handle) {
        // SAFETY: borrowed entries of a live dict, refreshed by `increment`.
        unsafe { (Handle::from_ptr(self.key), Handle::from_ptr(self.value)) }
    }

    fn increment(&mut self) {
        if self.pos == Self::END {
            return;
        }
        if !values::dict_next(self.obj.ptr(), &mut self.pos, &mut self.key, &mut self.value) {
            self.pos = Self::END;
        }
    }

    fn equal(&self, other: &Self) -> bool {
        self.obj == other.obj && self.pos == other.pos
    }
}

// ============================================================================
// GenericIterator / Range
// ============================================================================

/// Iterator position driven by a policy.
#[derive(Debug, Clone)]
pub struct GenericIterator<P> {
    policy: P,
}

impl<P: IteratorPolicy> GenericIterator<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn get(&self) -> P::Item {
        self.policy.dereference()
    }

    /// Pre-increment.
    pub fn inc(&mut self) -> &mut Self {
        self.policy.increment();
        self
    }

    /// Post-increment: returns the position before moving.
    pub fn post_inc(&mut self) -> Self {
        let before = self.clone();
        self.policy.increment();
        before
    }
}

impl<P: BidirectionalPolicy> GenericIterator<P> {
    pub fn dec(&mut self) -> &mut Self {
        self.policy.decrement();
        self
    }

    pub fn post_dec(&mut self) -> Self {
        let before = self.clone();
        self.policy.decrement();
        before
    }

    /// Move `n` steps (negative moves backwards).
    pub fn advance(&mut self, n: isize) -> &mut Self {
        self.policy.advance(n);
        self
    }

    pub fn distance(&self, other: &Self) -> isize {
        self.policy.distance(&other.policy)
    }
}

impl<P: IteratorPolicy> PartialEq for GenericIterator<P> {
    fn eq(&self, other: &Self) -> bool {
        self.policy.equal(&other.policy)
    }
}

/// A `[begin, end)` pair usable with `for` loops.
#[derive(Debug, Clone)]
pub struct Range<P> {
    front: GenericIterator<P>,
    back: GenericIterator<P>,
}

impl<P: IteratorPolicy> Range<P> {
    pub fn new(begin: P, end: P) -> Self {
        Self {
            front: GenericIterator::new(begin),
            back: GenericIterator::new(end),
        }
    }

    pub fn begin(&self) -> &GenericIterator<P> {
        &self.front
    }

    pub fn end(&self) -> &GenericIterator<P> {
        &self.back
    }
}

impl<P: IteratorPolicy> Iterator for Range<P> {
    type Item = P::Item;

    fn next(&mut self) -> Option<P::Item> {
        if self.front == self.back {
            return None;
        }
        Some(self.front.post_inc().get())
    }
}

impl<P: BidirectionalPolicy> DoubleEndedIterator for Range<P> {
    fn next_back(&mut self) -> Option<P::Item> {
        if self.front == self.back {
            return None;
        }
        Some(self.back.dec().get())
    }
}

impl<P: BidirectionalPolicy> ExactSizeIterator for Range<P> {
    fn len(&self) -> usize {
        self.front.distance(&self.back).max(0) as usize
    }
}

// ============================================================================
// HostIterator
// ============================================================================

/// Wrapper over a runtime iterator object.
///
/// Keeps the most recently produced element, so repeated [`get`] calls
/// without advancing return the same object. Exhaustion leaves the current
/// element null, which compares equal to [`sentinel`].
///
/// [`get`] and [`is_exhausted`] take `&self` but start the iteration when it
/// has not started yet (the first element is fetched lazily), and report a
/// failing iterator as an error. `==` never fetches: it compares what has
/// already been fetched, and an iterator that has not started is not at the
/// sentinel. A loop over `!= sentinel` must therefore advance with
/// [`advance`] and handle its error.
///
/// [`get`]: HostIterator::get
/// [`is_exhausted`]: HostIterator::is_exhausted
/// [`advance`]: HostIterator::advance
/// [`sentinel`]: HostIterator::sentinel
#[derive(Debug)]
pub struct HostIterator {
    it: Object,
    current: RefCell<Object>,
    started: Cell<bool>,
    /// `current` has not been yielded through `Iterator::next` yet.
    fresh: Cell<bool>,
}

impl HostIterator {
    pub(crate) fn from_object_unchecked(it: Object) -> Self {
        Self {
            it,
            current: RefCell::new(Object::null()),
            started: Cell::new(false),
            fresh: Cell::new(false),
        }
    }

    /// Wrap an iterator object; anything else raises `TypeError`.
    pub fn from_object(obj: Object) -> Result<Self> {
        if !Self::check(obj.handle()) {
            return Err(crate::BuiltinError::Type(format!(
                "Object of type '{}' is not an instance of 'iterator'",
                hostlink_rt::types::obj_type_name(obj.ptr())
            ))
            .into());
        }
        Ok(Self::from_object_unchecked(obj))
    }

    pub fn check(h: Handle) -> bool {
        !h.is_null() && ops::is_iterator(h.ptr())
    }

    /// The end-of-iteration marker.
    pub fn sentinel() -> Self {
        Self {
            it: Object::null(),
            current: RefCell::new(Object::null()),
            started: Cell::new(true),
            fresh: Cell::new(false),
        }
    }

    /// Fetch the next element. Exhaustion is not an error: the current
    /// element becomes null. A failing iterator raises.
    pub fn advance(&self) -> Result<()> {
        self.started.set(true);
        if self.it.is_null() {
            return Ok(());
        }
        // SAFETY: `iter_next` returns a new reference or null.
        let next = unsafe { Object::steal(ops::iter_next(self.it.ptr())) };
        let exhausted = next.is_null();
        *self.current.borrow_mut() = next;
        self.fresh.set(!exhausted);
        if exhausted && !err::occurred().is_null() {
            return Err(Error::fetch());
        }
        Ok(())
    }

    /// Current element (null once exhausted). Starts the iteration if
    /// needed.
    pub fn get(&self) -> Result<Object> {
        if !self.started.get() {
            self.advance()?;
        }
        Ok(self.current.borrow().clone())
    }

    /// Whether the iteration has ended normally. Starts the iteration if
    /// needed; a failing iterator raises instead of reporting the end.
    pub fn is_exhausted(&self) -> Result<bool> {
        Ok(self.get()?.is_null())
    }

    /// The wrapped iterator object.
    pub fn object(&self) -> &Object {
        &self.it
    }

    pub fn into_object(self) -> Object {
        self.it
    }

    /// Current element pointer, or `None` before the first fetch.
    fn fetched(&self) -> Option<ObjPtr> {
        self.started.get().then(|| self.current.borrow().ptr())
    }
}

impl Iterator for HostIterator {
    type Item = Result<Object>;

    fn next(&mut self) -> Option<Result<Object>> {
        if !self.started.get() || !self.fresh.get() {
            if let Err(e) = self.advance() {
                return Some(Err(e));
            }
        }
        self.fresh.set(false);
        let current = self.current.borrow().clone();
        (!current.is_null()).then_some(Ok(current))
    }
}

impl PartialEq for HostIterator {
    fn eq(&self, other: &Self) -> bool {
        match (self.fetched(), other.fetched()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.it.ptr() == other.it.ptr(),
            _ => false,
        }
    }
}

impl ToObject for HostIterator {
    fn to_object(&self) -> Result<Object> {
        Ok(self.it.clone())
    }
}

impl std::ops::Deref for HostIterator {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.it
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectApi;
    use crate::types::{Dict, List, Tuple};
    use hostlink_rt::{builtin, gil};

    fn ints(items: &[i64]) -> List {
        let list = List::new().unwrap();
        for &i in items {
            list.append(i).unwrap();
        }
        list
    }

    #[test]
    fn test_fast_range_walks_both_ends() {
        let _gil = gil::acquire();
        let list = ints(&[1, 2, 3]);
        let range = list.iter();
        assert_eq!(range.len(), 3);
        let back: Vec<i64> = range
            .rev()
            .map(|h| hostlink_rt::ops::long_as_i64(h.ptr()))
            .collect();
        assert_eq!(back, [3, 2, 1]);
    }

    #[test]
    fn test_generic_iterator_arithmetic() {
        let _gil = gil::acquire();
        let tuple = Tuple::from_objects(&[
            1i64.to_object().unwrap(),
            2i64.to_object().unwrap(),
            3i64.to_object().unwrap(),
        ])
        .unwrap();
        let range = tuple.iter();
        let mut it = range.begin().clone();
        let end = range.end().clone();
        assert_eq!(it.distance(&end), 3);
        it.advance(2);
        assert!(it.get().equal(3i64).unwrap());
        let before = it.post_dec();
        assert_eq!(before.distance(&it), -1);
        it.inc().inc();
        assert!(it == end);
    }

    #[test]
    fn test_slow_sequence_writes_through() {
        let _gil = gil::acquire();
        let list = ints(&[1, 2]);
        let seq = crate::types::Sequence::try_from_object(list.clone().into_object()).unwrap();
        for slot in seq.iter().unwrap() {
            let doubled = hostlink_rt::ops::long_as_i64(slot.get().unwrap().ptr()) * 2;
            slot.set(doubled).unwrap();
        }
        assert!(list.get(1).get().unwrap().equal(4i64).unwrap());
    }

    #[test]
    fn test_dict_range_visits_every_pair() {
        let _gil = gil::acquire();
        let dict = Dict::new().unwrap();
        dict.set_item("a", 1i64).unwrap();
        dict.set_item("b", 2i64).unwrap();
        let mut total = 0;
        for (key, value) in dict.iter() {
            assert!(hostlink_rt::values::is_str(key.ptr()));
            total += hostlink_rt::ops::long_as_i64(value.ptr());
        }
        assert_eq!(total, 3);
        assert_eq!(Dict::new().unwrap().iter().count(), 0);
    }

    #[test]
    fn test_host_iterator_reaches_sentinel() {
        let _gil = gil::acquire();
        let list = ints(&[7]);
        let it = list.handle().iter().unwrap();
        let first = it.get().unwrap();
        // Repeated reads do not advance.
        assert!(it.get().unwrap().is(first.handle()));
        assert!(it != HostIterator::sentinel());

        it.advance().unwrap();
        assert!(it == HostIterator::sentinel());
        it.advance().unwrap();
        assert!(it.is_exhausted().unwrap());
    }

    #[test]
    fn test_host_iterator_as_rust_iterator() {
        let _gil = gil::acquire();
        let list = ints(&[1, 2, 3]);
        let mut it = list.handle().iter().unwrap();
        let first = it.get().unwrap();
        let all: Vec<Object> = it.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].is(first.handle()));
        assert!(it.next().is_none());
    }

    #[test]
    fn test_failing_iterator_raises() {
        let _gil = gil::acquire();
        let native = hostlink_rt::function::native_iter_new(|| {
            err::set_string(builtin().value_error, "broken producer");
            std::ptr::null_mut()
        });
        // SAFETY: new reference.
        let it = HostIterator::from_object(unsafe { Object::steal(native) }).unwrap();
        let e = it.advance().unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().value_error)));
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_comparison_never_swallows_a_failure() {
        let _gil = gil::acquire();
        let native = hostlink_rt::function::native_iter_new(|| {
            err::set_string(builtin().value_error, "broken producer");
            std::ptr::null_mut()
        });
        // SAFETY: new reference.
        let it = HostIterator::from_object(unsafe { Object::steal(native) }).unwrap();

        // Not started: not at the end, and nothing was fetched.
        assert!(it != HostIterator::sentinel());
        assert!(err::occurred().is_null());

        let e = it.is_exhausted().unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().value_error)));
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_unstarted_iterators_compare_by_object() {
        let _gil = gil::acquire();
        let list = ints(&[1]);
        let a = list.handle().iter().unwrap();
        let b = list.handle().iter().unwrap();
        assert!(a != b);
        assert!(HostIterator::sentinel() == HostIterator::sentinel());
        // Fetching is explicit; `==` alone leaves `a` unstarted.
        assert!(a != HostIterator::sentinel());
        assert!(a.get().unwrap().equal(1i64).unwrap());
    }

    #[test]
    fn test_from_object_rejects_non_iterators() {
        let _gil = gil::acquire();
        let e = HostIterator::from_object(ints(&[]).into_object()).unwrap_err();
        assert!(matches!(e, Error::Builtin(crate::BuiltinError::Type(_))));
    }
}
