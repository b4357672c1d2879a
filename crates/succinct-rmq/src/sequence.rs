//! Ordered numeric sequences the index is built over and queried against

use std::cmp::Ordering;

use crate::{Result, scalar::Scalar};

/// An ordered sequence of scalars with random access.
///
/// Access is fallible as a sequence may be backed by a file. Positions passed to [`get`] and
/// [`compare`] must be less than [`len`]; implementations are free to panic otherwise.
///
/// [`get`]: NumericSequence::get
/// [`compare`]: NumericSequence::compare
/// [`len`]: NumericSequence::len
pub trait NumericSequence {
    type Value: Scalar;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, pos: usize) -> Result<Self::Value>;

    /// Compare the elements at two positions.
    ///
    /// Every RMQ table is built and queried through this method only, so a view overriding it
    /// changes which element is considered the minimum.
    fn compare(&self, a: usize, b: usize) -> Result<Ordering> {
        Ok(self.get(a)?.total_cmp(&self.get(b)?))
    }
}

impl<T: Scalar> NumericSequence for [T] {
    type Value = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, pos: usize) -> Result<T> {
        Ok(self[pos])
    }

    fn compare(&self, a: usize, b: usize) -> Result<Ordering> {
        Ok(self[a].total_cmp(&self[b]))
    }
}

impl<T: Scalar> NumericSequence for Vec<T> {
    type Value = T;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, pos: usize) -> Result<T> {
        Ok(self[pos])
    }

    fn compare(&self, a: usize, b: usize) -> Result<Ordering> {
        self.as_slice().compare(a, b)
    }
}

impl<S: NumericSequence + ?Sized> NumericSequence for &S {
    type Value = S::Value;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, pos: usize) -> Result<S::Value> {
        (**self).get(pos)
    }

    fn compare(&self, a: usize, b: usize) -> Result<Ordering> {
        (**self).compare(a, b)
    }
}

/// A view of a sequence with the order of its elements reversed.
///
/// The minimum of a decreasing view is the maximum of the underlying sequence, so the same RMQ
/// machinery answers maximum queries. Equal elements stay equal, which keeps ties resolved to the
/// leftmost position.
#[derive(Debug, Clone, Copy)]
pub struct Decreasing<S>(pub S);

impl<S: NumericSequence> NumericSequence for Decreasing<S> {
    type Value = S::Value;

    fn len(&self) -> usize {
        self.0.len()
    }

    fn get(&self, pos: usize) -> Result<S::Value> {
        self.0.get(pos)
    }

    fn compare(&self, a: usize, b: usize) -> Result<Ordering> {
        self.0.compare(b, a)
    }
}
