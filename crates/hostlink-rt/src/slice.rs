// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slice objects and index normalisation.

use std::ptr;

use crate::err;
use crate::object::{alloc, body, inc_ref, Body, ObjPtr};
use crate::types::builtin;
use crate::values;

/// Resolved slice bounds for a sequence of a given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub start: isize,
    pub stop: isize,
    pub step: isize,
    /// Number of selected elements.
    pub length: usize,
}

/// `slice(start, stop, step)`; null components mean `None`. Borrowed args.
pub fn slice_new(start: ObjPtr, stop: ObjPtr, step: ObjPtr) -> ObjPtr {
    let part = |p: ObjPtr| {
        let p = if p.is_null() { values::none() } else { p };
        inc_ref(p);
        p
    };
    alloc(
        builtin().slice,
        Body::Slice {
            start: part(start),
            stop: part(stop),
            step: part(step),
        },
    )
}

pub fn is_slice(obj: ObjPtr) -> bool {
    matches!(body(obj), Body::Slice { .. })
}

fn component(obj: ObjPtr) -> Result<Option<isize>, ()> {
    if values::is_none(obj) {
        return Ok(None);
    }
    match body(obj) {
        Body::Int(v) => Ok(Some(clamp_isize(*v))),
        Body::Bool(b) => Ok(Some(isize::from(*b))),
        _ => {
            err::set_string(
                builtin().type_error,
                "slice indices must be integers or None",
            );
            Err(())
        }
    }
}

fn clamp_isize(v: i64) -> isize {
    isize::try_from(v).unwrap_or(if v < 0 { isize::MIN } else { isize::MAX })
}

/// Resolve `slice` against a sequence of `length` elements. Returns `None`
/// with an error set for a zero step or non-integer components.
pub fn get_indices(slice: ObjPtr, length: usize) -> Option<SliceIndices> {
    let Body::Slice { start, stop, step } = body(slice) else {
        err::set_string(builtin().type_error, "expected a slice");
        return None;
    };
    let step = component(*step).ok()?.unwrap_or(1);
    if step == 0 {
        err::set_string(builtin().value_error, "slice step cannot be zero");
        return None;
    }
    let start = component(*start).ok()?;
    let stop = component(*stop).ok()?;
    Some(resolve(start, stop, step, length))
}

fn resolve(start: Option<isize>, stop: Option<isize>, step: isize, length: usize) -> SliceIndices {
    let len = isize::try_from(length).unwrap_or(isize::MAX);
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };

    let bound = |v: Option<isize>, default: isize| match v {
        None => default,
        Some(v) if v < 0 => (v.saturating_add(len)).max(lower),
        Some(v) => v.min(upper),
    };
    let start = bound(start, if step < 0 { upper } else { lower });
    let stop = bound(stop, if step < 0 { lower } else { upper });

    let length = if step < 0 {
        if stop < start {
            ((start - stop - 1) / (-step) + 1) as usize
        } else {
            0
        }
    } else if start < stop {
        ((stop - start - 1) / step + 1) as usize
    } else {
        0
    };
    SliceIndices {
        start,
        stop,
        step,
        length,
    }
}

impl SliceIndices {
    /// Positions selected by the slice, in order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.length).map(move |i| (self.start + i as isize * self.step) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dec_ref, gil};

    #[test]
    fn test_resolve_matches_sequence_semantics() {
        let r = resolve(None, None, 1, 5);
        assert_eq!((r.start, r.stop, r.length), (0, 5, 5));

        let r = resolve(Some(-2), None, 1, 5);
        assert_eq!((r.start, r.stop, r.length), (3, 5, 2));

        let r = resolve(None, None, -1, 5);
        assert_eq!((r.start, r.stop, r.length), (4, -1, 5));
        assert_eq!(r.positions().collect::<Vec<_>>(), [4, 3, 2, 1, 0]);

        let r = resolve(Some(1), Some(100), 2, 5);
        assert_eq!(r.positions().collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn test_zero_step_rejected() {
        let _gil = gil::acquire();
        let zero = values::int_from_i64(0);
        let s = slice_new(ptr::null_mut(), ptr::null_mut(), zero);
        assert!(get_indices(s, 3).is_none());
        assert!(err::exception_matches(builtin().value_error));
        err::clear();
        dec_ref(s);
        dec_ref(zero);
    }
}
