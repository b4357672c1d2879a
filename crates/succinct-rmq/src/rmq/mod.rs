//! Succinct RMQ Module
//!
//! A range minimum query (RMQ) returns the position of the minimum element in a range of a static
//! sequence. This module answers it in constant time after linear preprocessing, following the
//! succinct construction of Fischer and Heun.
//!
//! The sequence is partitioned three times:
//!
//! 1. Micro-blocks of [`MICRO_BLOCK`] elements. Queries inside a micro-block are answered by a
//!    table shared by all micro-blocks with the same Cartesian tree (see [`block`]).
//! 2. Blocks of [`BLOCK`] elements. Queries spanning whole blocks inside a super-block are answered
//!    by a sparse table over block minima.
//! 3. Super-blocks of [`SUPER_BLOCK`] elements. Queries spanning whole super-blocks are answered by
//!    a sparse table over super-block minima (see [`sparse_table`]).
//!
//! A query is decomposed into at most two micro-block fragments at its ends, a micro-block on
//! each side to reach block boundaries, and the whole blocks between them. All candidates are
//! combined left to right, keeping the earlier one on ties, so the leftmost minimum is returned.
//!
//! For sequences with fewer than [`NAIVE_THRESHOLD`] blocks the hierarchy does not pay off and no
//! tables are built. Queries scan the range instead.

pub mod block;

pub mod sparse_table;

use std::cmp::Ordering;

use block::PrecRow;

use crate::{Error, Result, sequence::NumericSequence, util::bitop, util::catalan};

/// Number of elements in a micro-block
pub const MICRO_BLOCK: usize = 8;

/// Number of elements in a block
pub const BLOCK: usize = 16;

/// Number of elements in a super-block
pub const SUPER_BLOCK: usize = 256;

const _: () = assert!(BLOCK % MICRO_BLOCK == 0 && SUPER_BLOCK % BLOCK == 0);
const _: () = assert!(MICRO_BLOCK <= u8::BITS as usize);

pub const MICROS_PER_BLOCK: usize = BLOCK / MICRO_BLOCK;

pub const BLOCKS_PER_SUPER: usize = SUPER_BLOCK / BLOCK;

/// Number of rows of the block table
pub const BLOCK_DEPTH: usize = bitop::log2_floor(SUPER_BLOCK / BLOCK);

// Offsets in the deepest block row must fit in a byte
const _: () = assert!((1 << (BLOCK_DEPTH - 1)) * BLOCK <= 1 << u8::BITS);

/// Longest sequence that can be indexed, as lengths and positions are persisted as `i32`
pub const MAX_LEN: usize = i32::MAX as usize;

/// Sequences with fewer blocks than this are scanned instead of indexed.
pub const NAIVE_THRESHOLD: usize = SUPER_BLOCK / (2 * BLOCK);

pub(crate) const CATALAN: [[u32; MICRO_BLOCK + 1]; MICRO_BLOCK + 1] = catalan::triangle();

/// Number of distinct Cartesian tree types of a micro-block
pub const CATALAN_TOTAL: usize = CATALAN[MICRO_BLOCK][MICRO_BLOCK] as usize;

// Types are persisted as 16 bit integers
const _: () = assert!(CATALAN_TOTAL <= i16::MAX as usize);

/// Partition counts derived from the length of a sequence.
///
/// Everything here is a function of the length only, so an index can recompute it from a stored
/// length and agree with the builder on the table sizes and on whether tables exist at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "bitcode", derive(bitcode::Decode, bitcode::Encode))]
pub struct Geometry {
    pub len: usize,
    pub n_micro: usize,
    pub n_blocks: usize,
    pub n_super: usize,
    /// Number of rows of the super-block table
    pub super_depth: usize,
}

impl Geometry {
    pub fn new(len: usize) -> Self {
        let n_super = len.div_ceil(SUPER_BLOCK);
        Self {
            len,
            n_micro: len.div_ceil(MICRO_BLOCK),
            n_blocks: len.div_ceil(BLOCK),
            n_super,
            super_depth: if n_super == 0 {
                0
            } else {
                bitop::log2_floor(n_super) + 1
            },
        }
    }

    /// Whether the sequence is too small to be indexed, and is scanned instead
    pub fn is_naive(&self) -> bool {
        self.n_blocks < NAIVE_THRESHOLD
    }

    /// Check an entry `M[depth][block]` read from storage.
    ///
    /// The offset must stay inside the `2^depth` blocks starting at `block`, and inside the
    /// sequence.
    pub(crate) fn check_block_offset(
        &self,
        depth: usize,
        block: usize,
        offset: u8,
    ) -> Result<usize> {
        let offset = offset as usize;
        let window = ((1 << depth) * BLOCK).min(self.len.saturating_sub(block * BLOCK));
        if offset < window {
            Ok(offset)
        } else {
            Err(Error::malformed(format!(
                "block table entry {offset} at depth {depth} of block {block} out of range"
            )))
        }
    }
}

/// The auxiliary tables of a minimum index.
///
/// The seam between the query algorithm and the storage of the tables. Implemented by
/// [`RmqTables`] in memory, and by persisted indexes reading entries on demand.
pub trait TableSource {
    fn geometry(&self) -> Geometry;

    /// Cartesian tree type of a micro-block
    fn block_type(&self, micro: usize) -> Result<usize>;

    /// In-micro-block answers of a type
    fn prec(&self, ty: usize) -> Result<PrecRow>;

    /// Entry `M[depth][block]`: offset of the minimum from the start of `block`
    fn block_min(&self, depth: usize, block: usize) -> Result<usize>;

    /// Entry `M′[depth][super_block]`: position of the minimum
    fn super_block_min(&self, depth: usize, super_block: usize) -> Result<usize>;
}

/// Tables of a minimum index held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "bitcode", derive(bitcode::Decode, bitcode::Encode))]
pub struct RmqTables {
    geometry: Geometry,
    types: Vec<u16>,
    prec: Vec<PrecRow>,
    block_rows: sparse_table::BlockRows,
    super_rows: sparse_table::SuperBlockRows,
}

impl RmqTables {
    /// Build the tables over the order given by `seq`.
    ///
    /// Sequences below the naive threshold get empty tables.
    pub fn build<S: NumericSequence + ?Sized>(seq: &S) -> Result<Self> {
        let len = seq.len();
        if len > MAX_LEN {
            return Err(Error::TooLarge { len });
        }

        let geometry = Geometry::new(len);
        if geometry.is_naive() {
            log::debug!(
                "Sequence of {} elements has {} blocks, skip building RMQ tables",
                geometry.len,
                geometry.n_blocks
            );
            return Ok(Self::empty(geometry));
        }

        let micro_blocks = block::build(seq)?;
        let (block_rows, super_rows) = sparse_table::build(seq, &geometry)?;
        log::debug!(
            "Built RMQ tables over {} elements: {} micro-blocks of {} distinct types, {} blocks, {} super-blocks",
            geometry.len,
            geometry.n_micro,
            micro_blocks.distinct,
            geometry.n_blocks,
            geometry.n_super
        );

        Ok(Self {
            geometry,
            types: micro_blocks.types,
            prec: micro_blocks.prec,
            block_rows,
            super_rows,
        })
    }

    pub(crate) fn empty(geometry: Geometry) -> Self {
        Self {
            geometry,
            types: Vec::new(),
            prec: Vec::new(),
            block_rows: Vec::new(),
            super_rows: Vec::new(),
        }
    }

    /// Assemble tables read from storage, checking their shapes against the geometry.
    pub(crate) fn from_parts(
        geometry: Geometry,
        types: Vec<u16>,
        prec: Vec<PrecRow>,
        block_rows: sparse_table::BlockRows,
        super_rows: sparse_table::SuperBlockRows,
    ) -> Result<Self> {
        if geometry.is_naive() {
            return Ok(Self::empty(geometry));
        }
        let shapes_match = types.len() == geometry.n_micro
            && prec.len() == CATALAN_TOTAL
            && block_rows.len() == BLOCK_DEPTH
            && block_rows.iter().all(|row| row.len() == geometry.n_blocks)
            && super_rows.len() == geometry.super_depth
            && super_rows.iter().all(|row| row.len() == geometry.n_super);
        if !shapes_match {
            return Err(Error::malformed("table sizes do not match the sequence length"));
        }
        if let Some(&ty) = types.iter().find(|&&ty| ty as usize >= CATALAN_TOTAL) {
            return Err(Error::malformed(format!("micro-block type {ty} out of range")));
        }
        for (depth, row) in block_rows.iter().enumerate() {
            for (block, &offset) in row.iter().enumerate() {
                geometry.check_block_offset(depth, block, offset)?;
            }
        }
        let out_of_range = super_rows.iter().flatten().find(|&&pos| pos as usize >= geometry.len);
        if let Some(&pos) = out_of_range {
            return Err(Error::malformed(format!("super-block table entry {pos} out of range")));
        }
        for &row in &prec {
            block::check_row(row)?;
        }
        Ok(Self {
            geometry,
            types,
            prec,
            block_rows,
            super_rows,
        })
    }

    pub fn types(&self) -> &[u16] {
        &self.types
    }

    pub fn prec_rows(&self) -> &[PrecRow] {
        &self.prec
    }

    pub fn block_rows(&self) -> &[Vec<u8>] {
        &self.block_rows
    }

    pub fn super_rows(&self) -> &[Vec<u32>] {
        &self.super_rows
    }
}

impl TableSource for RmqTables {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn block_type(&self, micro: usize) -> Result<usize> {
        Ok(self.types[micro] as usize)
    }

    fn prec(&self, ty: usize) -> Result<PrecRow> {
        Ok(self.prec[ty])
    }

    fn block_min(&self, depth: usize, block: usize) -> Result<usize> {
        Ok(self.block_rows[depth][block] as usize)
    }

    fn super_block_min(&self, depth: usize, super_block: usize) -> Result<usize> {
        Ok(self.super_rows[depth][super_block] as usize)
    }
}

/// Position of the leftmost minimum of `[start, end]` by scanning.
pub fn scan<S: NumericSequence + ?Sized>(seq: &S, start: usize, end: usize) -> Result<usize> {
    let mut min = start;
    for pos in start + 1..=end {
        if seq.compare(pos, min)? == Ordering::Less {
            min = pos;
        }
    }
    Ok(min)
}

/// Minimum queries over a sequence and the tables built over it.
///
/// The sequence must be the one (or an equal copy of the one) the tables were built over, with
/// the same order.
#[derive(Debug)]
pub struct Rmq<'a, T: ?Sized, S: ?Sized> {
    tables: &'a T,
    seq: &'a S,
}

impl<'a, T, S> Rmq<'a, T, S>
where
    T: TableSource + ?Sized,
    S: NumericSequence + ?Sized,
{
    pub fn new(tables: &'a T, seq: &'a S) -> Self {
        Self { tables, seq }
    }

    /// Given a range [start, end], returns the position of the leftmost minimum element.
    ///
    /// The range must be valid, i.e. `start <= end < len`.
    pub fn min_in(&self, start: usize, end: usize) -> Result<usize> {
        let geometry = self.tables.geometry();
        debug_assert!(
            start <= end && end < geometry.len,
            "Invalid range [{start}, {end}] for length {}",
            geometry.len
        );

        if geometry.is_naive() {
            return scan(self.seq, start, end);
        }

        let start_micro = start / MICRO_BLOCK;
        let end_micro = end / MICRO_BLOCK;
        if start_micro == end_micro {
            return self.micro_min(start_micro, start % MICRO_BLOCK, end % MICRO_BLOCK);
        }

        let mut min = self.micro_min(start_micro, start % MICRO_BLOCK, MICRO_BLOCK - 1)?;

        let start_block = start / BLOCK;
        let end_block = end / BLOCK;
        if start_block == end_block {
            for micro in start_micro + 1..end_micro {
                min = self.pick(min, self.micro_min(micro, 0, MICRO_BLOCK - 1)?)?;
            }
        } else {
            // Round up to the end of the start block
            for micro in start_micro + 1..(start_block + 1) * MICROS_PER_BLOCK {
                min = self.pick(min, self.micro_min(micro, 0, MICRO_BLOCK - 1)?)?;
            }
            if start_block + 1 < end_block {
                min = self.pick(min, self.blocks_min(start_block + 1, end_block - 1)?)?;
            }
            // Round down to the start of the end block
            for micro in end_block * MICROS_PER_BLOCK..end_micro {
                min = self.pick(min, self.micro_min(micro, 0, MICRO_BLOCK - 1)?)?;
            }
        }

        self.pick(min, self.micro_min(end_micro, 0, end % MICRO_BLOCK)?)
    }

    /// Keep `left` unless `right` is strictly smaller.
    #[inline]
    fn pick(&self, left: usize, right: usize) -> Result<usize> {
        Ok(if self.seq.compare(right, left)? == Ordering::Less {
            right
        } else {
            left
        })
    }

    fn micro_min(&self, micro: usize, from: usize, to: usize) -> Result<usize> {
        let row = self.tables.prec(self.tables.block_type(micro)?)?;
        Ok(micro * MICRO_BLOCK + block::min_in(&row, from, to))
    }

    /// Minimum of the whole blocks `[first, last]`.
    fn blocks_min(&self, first: usize, last: usize) -> Result<usize> {
        if last - first + 1 < 1 << BLOCK_DEPTH {
            return self.block_table_min(first, last);
        }

        // Too many blocks for the block table: super-blocks fully inside the range are answered by
        // the super-block table, the blocks before and after them by the block table
        let geometry = self.tables.geometry();
        let end = last + 1;
        let first_super = first.div_ceil(BLOCKS_PER_SUPER);
        let end_super = if end == geometry.n_blocks {
            geometry.n_super
        } else {
            end / BLOCKS_PER_SUPER
        };

        let mut min = None;
        let head_end = (first_super * BLOCKS_PER_SUPER).min(end);
        if first < head_end {
            min = Some(self.block_table_min(first, head_end - 1)?);
        }
        let tail_start = if first_super < end_super {
            let supers = self.super_table_min(first_super, end_super - 1)?;
            min = Some(self.merge(min, supers)?);
            end_super * BLOCKS_PER_SUPER
        } else {
            head_end
        };
        if tail_start < end {
            let tail = self.block_table_min(tail_start, last)?;
            min = Some(self.merge(min, tail)?);
        }

        min.ok_or_else(|| Error::malformed("empty block range"))
    }

    fn merge(&self, min: Option<usize>, candidate: usize) -> Result<usize> {
        match min {
            Some(min) => self.pick(min, candidate),
            None => Ok(candidate),
        }
    }

    /// Minimum of the blocks `[first, last]` with two overlapping rows of the block table.
    fn block_table_min(&self, first: usize, last: usize) -> Result<usize> {
        let k = bitop::log2_floor(last - first + 1);
        debug_assert!(k < BLOCK_DEPTH, "Too many blocks in [{first}, {last}]");

        let right_first = last + 1 - (1 << k);
        let left = first * BLOCK + self.tables.block_min(k, first)?;
        let right = right_first * BLOCK + self.tables.block_min(k, right_first)?;
        self.pick(left, right)
    }

    /// Minimum of the super-blocks `[first, last]` with two overlapping rows of the super-block
    /// table.
    fn super_table_min(&self, first: usize, last: usize) -> Result<usize> {
        let k = bitop::log2_floor(last - first + 1);
        let left = self.tables.super_block_min(k, first)?;
        let right = self.tables.super_block_min(k, last + 1 - (1 << k))?;
        self.pick(left, right)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    use super::*;
    use crate::sequence::Decreasing;

    /// Check every range against a left-to-right sweep.
    fn check_all_ranges<S: NumericSequence + ?Sized>(seq: &S) -> Result<()> {
        let tables = RmqTables::build(seq)?;
        let rmq = Rmq::new(&tables, seq);
        for start in 0..seq.len() {
            let mut expected = start;
            for end in start..seq.len() {
                if seq.compare(end, expected)? == Ordering::Less {
                    expected = end;
                }
                assert_eq!(rmq.min_in(start, end)?, expected, "range [{start}, {end}]");
            }
        }
        Ok(())
    }

    /// Check random ranges against a scan.
    fn check_random_ranges<S: NumericSequence + ?Sized>(
        seq: &S,
        rng: &mut SmallRng,
        n_queries: usize,
    ) -> Result<()> {
        let tables = RmqTables::build(seq)?;
        let rmq = Rmq::new(&tables, seq);
        for _ in 0..n_queries {
            let a = rng.random_range(0..seq.len());
            let b = rng.random_range(0..seq.len());
            let (start, end) = (a.min(b), a.max(b));
            assert_eq!(
                rmq.min_in(start, end)?,
                scan(seq, start, end)?,
                "range [{start}, {end}]"
            );
        }
        Ok(())
    }

    #[test]
    fn test_constants() {
        assert_eq!(MICROS_PER_BLOCK, 2);
        assert_eq!(BLOCKS_PER_SUPER, 16);
        assert_eq!(BLOCK_DEPTH, 4);
        assert_eq!(NAIVE_THRESHOLD, 8);
        assert_eq!(CATALAN_TOTAL, 1430);
    }

    #[test]
    fn test_geometry() {
        let geometry = Geometry::new(0);
        assert_eq!(geometry.n_micro, 0);
        assert_eq!(geometry.super_depth, 0);
        assert!(geometry.is_naive());

        assert!(Geometry::new(112).is_naive());
        assert!(!Geometry::new(113).is_naive());

        let geometry = Geometry::new(1000);
        assert_eq!(geometry.n_micro, 125);
        assert_eq!(geometry.n_blocks, 63);
        assert_eq!(geometry.n_super, 4);
        assert_eq!(geometry.super_depth, 3);
    }

    #[test]
    fn test_naive_tables_are_empty() -> Result<()> {
        let values: Vec<i32> = (0..112).rev().collect();
        let tables = RmqTables::build(&values)?;
        assert!(tables.types().is_empty());
        assert!(tables.block_rows().is_empty());
        assert_eq!(Rmq::new(&tables, &values).min_in(3, 50)?, 50);
        Ok(())
    }

    #[test]
    fn test_all_ranges_random() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        for len in [1, 7, 112, 113, 128, 255, 256, 257, 700] {
            let values: Vec<i32> = (0..len).map(|_| rng.random_range(0..1000)).collect();
            check_all_ranges(&values)?;
        }
        Ok(())
    }

    #[test]
    fn test_all_ranges_duplicates() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        for len in [113, 300, 600] {
            let values: Vec<i64> = (0..len).map(|_| rng.random_range(0..3)).collect();
            check_all_ranges(&values)?;
        }
        Ok(())
    }

    #[test]
    fn test_all_ranges_monotone_and_constant() -> Result<()> {
        let increasing: Vec<i32> = (0..600).collect();
        let decreasing: Vec<i32> = (0..600).rev().collect();
        let constant = vec![3i32; 600];
        let zigzag: Vec<i32> = (0..600).map(|i| if i % 2 == 0 { i } else { -i }).collect();
        check_all_ranges(&increasing)?;
        check_all_ranges(&decreasing)?;
        check_all_ranges(&constant)?;
        check_all_ranges(&zigzag)?;
        Ok(())
    }

    #[test]
    fn test_random_ranges_large() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        for len in [4095, 4096, 4097, 10_000] {
            let values: Vec<i32> = (0..len).map(|_| rng.random_range(-500..500)).collect();
            check_random_ranges(&values, &mut rng, 20_000)?;

            let floats: Vec<f64> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
            check_random_ranges(&floats, &mut rng, 20_000)?;
        }
        Ok(())
    }

    #[test]
    fn test_maximum_through_decreasing_view() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let values: Vec<i32> = (0..2000).map(|_| rng.random_range(0..20)).collect();
        let view = Decreasing(&values);
        let tables = RmqTables::build(&view)?;
        let rmq = Rmq::new(&tables, &view);
        for _ in 0..10_000 {
            let a = rng.random_range(0..values.len());
            let b = rng.random_range(0..values.len());
            let (start, end) = (a.min(b), a.max(b));
            let max = values[start..=end].iter().max().copied();
            let expected = start + values[start..=end].iter().position(|&v| Some(v) == max).unwrap();
            assert_eq!(rmq.min_in(start, end)?, expected);
        }
        Ok(())
    }

    #[test]
    fn test_from_parts_validation() -> Result<()> {
        let values: Vec<i32> = (0..500).collect();
        let tables = RmqTables::build(&values)?;
        let geometry = tables.geometry();

        let rebuilt = RmqTables::from_parts(
            geometry,
            tables.types().to_vec(),
            tables.prec_rows().to_vec(),
            tables.block_rows().to_vec(),
            tables.super_rows().to_vec(),
        )?;
        assert_eq!(rebuilt, tables);

        let mut types = tables.types().to_vec();
        types[3] = CATALAN_TOTAL as u16;
        let result = RmqTables::from_parts(
            geometry,
            types,
            tables.prec_rows().to_vec(),
            tables.block_rows().to_vec(),
            tables.super_rows().to_vec(),
        );
        assert!(matches!(result, Err(Error::Malformed { .. })));

        let result = RmqTables::from_parts(
            geometry,
            tables.types()[1..].to_vec(),
            tables.prec_rows().to_vec(),
            tables.block_rows().to_vec(),
            tables.super_rows().to_vec(),
        );
        assert!(matches!(result, Err(Error::Malformed { .. })));

        let mut prec = tables.prec_rows().to_vec();
        prec[0][0] = 0x80;
        let result = RmqTables::from_parts(
            geometry,
            tables.types().to_vec(),
            prec,
            tables.block_rows().to_vec(),
            tables.super_rows().to_vec(),
        );
        assert!(matches!(result, Err(Error::Malformed { .. })));

        let mut super_rows = tables.super_rows().to_vec();
        super_rows[0][1] = 500;
        let result = RmqTables::from_parts(
            geometry,
            tables.types().to_vec(),
            tables.prec_rows().to_vec(),
            tables.block_rows().to_vec(),
            super_rows,
        );
        assert!(matches!(result, Err(Error::Malformed { .. })));
        Ok(())
    }

    #[test]
    fn test_block_offsets_are_checked() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let values: Vec<i32> = (0..1000).map(|_| rng.random_range(0..100)).collect();
        let tables = RmqTables::build(&values)?;
        let geometry = tables.geometry();

        // Every built entry, overhang included, passes
        for (depth, row) in tables.block_rows().iter().enumerate() {
            for (block, &offset) in row.iter().enumerate() {
                assert_eq!(geometry.check_block_offset(depth, block, offset)?, offset as usize);
            }
        }

        // Outside the window of 2^3 blocks
        assert!(geometry.check_block_offset(3, 54, 255).is_err());
        assert!(geometry.check_block_offset(3, 10, 128).is_err());
        // Past the end of the sequence in the last, partial block
        assert_eq!(geometry.n_blocks, 63);
        assert!(geometry.check_block_offset(0, 62, 7).is_ok());
        assert!(geometry.check_block_offset(0, 62, 8).is_err());
        assert!(geometry.check_block_offset(2, 62, 8).is_err());

        let mut block_rows = tables.block_rows().to_vec();
        block_rows[3][54] = 255;
        let result = RmqTables::from_parts(
            geometry,
            tables.types().to_vec(),
            tables.prec_rows().to_vec(),
            block_rows,
            tables.super_rows().to_vec(),
        );
        assert!(matches!(result, Err(Error::Malformed { .. })));
        Ok(())
    }
}
