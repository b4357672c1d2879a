//! Range minimum, maximum and sum index over a sequence of scalars

use crate::{
    Result,
    error::check_range,
    rmq::{self, Rmq, RmqTables},
    scalar::Scalar,
    sequence::{Decreasing, NumericSequence},
};

/// Which queries an index answers in constant time.
///
/// A query whose support is disabled is still answered, by scanning the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bitcode", derive(bitcode::Decode, bitcode::Encode))]
pub struct IndexOptions {
    pub min: bool,
    pub sum: bool,
    pub max: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            min: true,
            sum: true,
            max: true,
        }
    }
}

impl IndexOptions {
    /// Options with every support disabled
    pub fn none() -> Self {
        Self {
            min: false,
            sum: false,
            max: false,
        }
    }

    pub fn with_min(mut self, min: bool) -> Self {
        self.min = min;
        self
    }

    pub fn with_sum(mut self, sum: bool) -> Self {
        self.sum = sum;
        self
    }

    pub fn with_max(mut self, max: bool) -> Self {
        self.max = max;
        self
    }
}

/// An extreme element of a range, with its position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "bitcode", derive(bitcode::Decode, bitcode::Encode))]
pub struct Extremum<T> {
    value: T,
    pos: usize,
}

impl<T: Copy> Extremum<T> {
    pub fn new(value: T, pos: usize) -> Self {
        Self { value, pos }
    }

    pub fn val(&self) -> T {
        self.value
    }

    pub fn pos(&self) -> usize {
        self.pos
    }
}

/// Queries over inclusive ranges `[start, end]` of a sequence.
///
/// Ranges must satisfy `start <= end < len`, otherwise [`Error::InvalidRange`] is returned. Ties
/// are resolved to the leftmost position.
///
/// [`Error::InvalidRange`]: crate::Error::InvalidRange
pub trait RangeQuery {
    type Value: Scalar;

    /// Number of elements of the indexed sequence
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn value_at(&self, pos: usize) -> Result<Self::Value>;

    /// Position of the minimum element in [start, end]
    fn range_argmin(&self, start: usize, end: usize) -> Result<usize>;

    /// Position of the maximum element in [start, end]
    fn range_argmax(&self, start: usize, end: usize) -> Result<usize>;

    /// Sum of the elements in [start, end]
    fn range_sum(&self, start: usize, end: usize) -> Result<Self::Value>;

    fn range_min(&self, start: usize, end: usize) -> Result<Extremum<Self::Value>> {
        let pos = self.range_argmin(start, end)?;
        Ok(Extremum::new(self.value_at(pos)?, pos))
    }

    fn range_max(&self, start: usize, end: usize) -> Result<Extremum<Self::Value>> {
        let pos = self.range_argmax(start, end)?;
        Ok(Extremum::new(self.value_at(pos)?, pos))
    }
}

/// Position of the minimum of `[start, end]` in `seq`, with the tables if they were built.
pub(crate) fn argmin_with<S>(
    tables: Option<&RmqTables>,
    seq: &S,
    start: usize,
    end: usize,
) -> Result<usize>
where
    S: NumericSequence + ?Sized,
{
    match tables {
        Some(tables) => Rmq::new(tables, seq).min_in(start, end),
        None => rmq::scan(seq, start, end),
    }
}

/// Sum of `[start, end]` from a sequence of prefix sums.
pub(crate) fn prefix_sum_range<S>(prefix_sums: &S, start: usize, end: usize) -> Result<S::Value>
where
    S: NumericSequence + ?Sized,
{
    let upper = prefix_sums.get(end)?;
    if start == 0 {
        Ok(upper)
    } else {
        Ok(upper.sub(prefix_sums.get(start - 1)?))
    }
}

/// Sum of `[start, end]` by adding up the elements.
pub(crate) fn direct_sum<S>(seq: &S, start: usize, end: usize) -> Result<S::Value>
where
    S: NumericSequence + ?Sized,
{
    let mut sum = <S::Value as Scalar>::ZERO;
    for pos in start..=end {
        sum = sum.add(seq.get(pos)?);
    }
    Ok(sum)
}

/// Running sums of `values`, wrapping for integers.
pub(crate) fn prefix_sums<T: Scalar>(values: &[T]) -> Vec<T> {
    values
        .iter()
        .scan(T::ZERO, |sum, &value| {
            *sum = sum.add(value);
            Some(*sum)
        })
        .collect()
}

/// An index held in memory.
///
/// Built once over a sequence, which is never modified afterwards. Built indexes can be persisted
/// with [`MssIndex::write_to`] and queried from storage with an [`IndexReader`].
///
/// [`IndexReader`]: crate::IndexReader
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "bitcode", derive(bitcode::Decode, bitcode::Encode))]
pub struct MssIndex<T> {
    values: Vec<T>,
    prefix_sums: Option<Vec<T>>,
    min: Option<RmqTables>,
    max: Option<RmqTables>,
}

impl<T: Scalar> MssIndex<T> {
    /// Build an index over `values` with the supports selected by `options`.
    ///
    /// With sum support, a persisted index stores prefix sums instead of the elements, and
    /// recovers element `k` as `P[k] - P[k-1]`. This is exact for integers but may round floats
    /// that are not integral, so values read back from storage can differ from `values`.
    ///
    /// # Errors
    ///
    /// If the sequence is longer than [`MAX_LEN`](crate::rmq::MAX_LEN).
    pub fn build(values: impl Into<Vec<T>>, options: IndexOptions) -> Result<Self> {
        let values = values.into();
        if values.len() > rmq::MAX_LEN {
            return Err(crate::Error::TooLarge { len: values.len() });
        }

        let min = options.min.then(|| RmqTables::build(&values)).transpose()?;
        let max = options
            .max
            .then(|| RmqTables::build(&Decreasing(&values)))
            .transpose()?;
        let prefix_sums = options.sum.then(|| prefix_sums(&values));

        log::debug!(
            "Built index over {} elements with {:?}",
            values.len(),
            options
        );

        Ok(Self {
            values,
            prefix_sums,
            min,
            max,
        })
    }

    pub(crate) fn from_parts(
        values: Vec<T>,
        prefix_sums: Option<Vec<T>>,
        min: Option<RmqTables>,
        max: Option<RmqTables>,
    ) -> Self {
        Self {
            values,
            prefix_sums,
            min,
            max,
        }
    }

    pub fn options(&self) -> IndexOptions {
        IndexOptions {
            min: self.min.is_some(),
            sum: self.prefix_sums.is_some(),
            max: self.max.is_some(),
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn prefix_sums(&self) -> Option<&[T]> {
        self.prefix_sums.as_deref()
    }

    /// Tables of the minimum index, built over the sequence
    pub fn min_tables(&self) -> Option<&RmqTables> {
        self.min.as_ref()
    }

    /// Tables of the maximum index, built over the decreasing view of the sequence
    pub fn max_tables(&self) -> Option<&RmqTables> {
        self.max.as_ref()
    }
}

impl<T: Scalar> RangeQuery for MssIndex<T> {
    type Value = T;

    fn len(&self) -> Result<usize> {
        Ok(self.values.len())
    }

    fn value_at(&self, pos: usize) -> Result<T> {
        check_range(pos, pos, self.values.len())?;
        Ok(self.values[pos])
    }

    fn range_argmin(&self, start: usize, end: usize) -> Result<usize> {
        check_range(start, end, self.values.len())?;
        argmin_with(self.min.as_ref(), &self.values, start, end)
    }

    fn range_argmax(&self, start: usize, end: usize) -> Result<usize> {
        check_range(start, end, self.values.len())?;
        argmin_with(self.max.as_ref(), &Decreasing(&self.values), start, end)
    }

    fn range_sum(&self, start: usize, end: usize) -> Result<T> {
        check_range(start, end, self.values.len())?;
        match &self.prefix_sums {
            Some(prefix_sums) => prefix_sum_range(prefix_sums, start, end),
            None => direct_sum(&self.values, start, end),
        }
    }
}

/// Batch queries answered in parallel.
///
/// Queries only read the index, so any index shared across threads can answer them.
#[cfg(feature = "parallel")]
pub trait ParRangeQuery: RangeQuery + Sync {
    fn par_argmin_many(&self, ranges: &[(usize, usize)]) -> Result<Vec<usize>> {
        use rayon::prelude::*;

        ranges
            .par_iter()
            .map(|&(start, end)| self.range_argmin(start, end))
            .collect()
    }

    fn par_argmax_many(&self, ranges: &[(usize, usize)]) -> Result<Vec<usize>> {
        use rayon::prelude::*;

        ranges
            .par_iter()
            .map(|&(start, end)| self.range_argmax(start, end))
            .collect()
    }

    fn par_sum_many(&self, ranges: &[(usize, usize)]) -> Result<Vec<Self::Value>> {
        use rayon::prelude::*;

        ranges
            .par_iter()
            .map(|&(start, end)| self.range_sum(start, end))
            .collect()
    }
}

#[cfg(feature = "parallel")]
impl<Q: RangeQuery + Sync> ParRangeQuery for Q {}
