//! Cartesian tree types of micro-blocks and precomputed in-micro-block answers
//!
//! Two micro-blocks whose elements have the same relative order share a Cartesian tree, and
//! therefore the answer of every query inside them. Each micro-block is assigned the index of its
//! tree shape (its "type"), and the answers are computed only once per type.

use std::cmp::Ordering;

use super::{CATALAN, CATALAN_TOTAL, MICRO_BLOCK};
use crate::{Error, Result, sequence::NumericSequence, util::bitop};

/// Answers of in-micro-block queries for one Cartesian tree type.
///
/// Bit `g` of entry `j` is set iff `g < j` lies on the monotonic stack after pushing `j`, i.e. `g`
/// is a left-to-right minimum of `[g, j]`. The minimum of `[i, j]` is the lowest set bit of entry
/// `j` at or above `i`, or `j` itself if there is none.
pub type PrecRow = [u8; MICRO_BLOCK];

/// Output of [`build`]: one type per micro-block, and one [`PrecRow`] per type.
#[derive(Debug, Clone)]
pub struct MicroBlocks {
    pub types: Vec<u16>,
    pub prec: Vec<PrecRow>,
    /// Number of distinct types seen
    pub distinct: usize,
}

/// Compute the type of every micro-block and the in-block answers shared by each type.
///
/// Rows of types not occurring in the sequence are left zeroed.
pub fn build<S: NumericSequence + ?Sized>(seq: &S) -> Result<MicroBlocks> {
    let len = seq.len();
    let n_micro = len.div_ceil(MICRO_BLOCK);

    let mut types = Vec::with_capacity(n_micro);
    let mut prec = vec![[0; MICRO_BLOCK]; CATALAN_TOTAL];
    let mut seen = vec![false; CATALAN_TOTAL];
    let mut distinct = 0;

    for micro in 0..n_micro {
        let start = micro * MICRO_BLOCK;
        let end = (start + MICRO_BLOCK).min(len);

        let ty = block_type(seq, start, end)?;
        debug_assert!(ty < CATALAN_TOTAL, "Type {ty} out of range");
        if !seen[ty] {
            seen[ty] = true;
            distinct += 1;
            prec[ty] = in_block_answers(seq, start, end)?;
        }
        types.push(ty as u16);
    }

    Ok(MicroBlocks {
        types,
        prec,
        distinct,
    })
}

/// Type of the micro-block `[start, end)`.
///
/// Walks the elements left to right keeping the rightmost path of the Cartesian tree. Every
/// element popped off the path adds a ballot number to the type, so the type enumerates the
/// sequence of pops, which determines the tree. The bottom of the path acts as a stopper smaller
/// than any element.
///
/// A block shorter than [`MICRO_BLOCK`] gets the type of the same block padded with elements that
/// pop nothing.
fn block_type<S: NumericSequence + ?Sized>(seq: &S, start: usize, end: usize) -> Result<usize> {
    let mut path = [0; MICRO_BLOCK];
    let mut height = 1;
    path[0] = start;

    let mut ty = 0;
    let mut p = MICRO_BLOCK - 1;
    let mut q = MICRO_BLOCK;
    for z in start + 1..end {
        p -= 1;
        while height > 0 && seq.compare(path[height - 1], z)? == Ordering::Greater {
            ty += CATALAN[p][q] as usize;
            q -= 1;
            height -= 1;
        }
        path[height] = z;
        height += 1;
    }

    Ok(ty)
}

/// [`PrecRow`] of the micro-block `[start, end)`, computed with a monotonic stack.
fn in_block_answers<S: NumericSequence + ?Sized>(
    seq: &S,
    start: usize,
    end: usize,
) -> Result<PrecRow> {
    let mut row = [0; MICRO_BLOCK];
    let mut stack = [0; MICRO_BLOCK];
    let mut height = 0;

    for j in start..end {
        // Equal elements stay on the stack, so the leftmost of them is found first
        while height > 0 && seq.compare(j, stack[height - 1])? == Ordering::Less {
            height -= 1;
        }
        row[j - start] = if height > 0 {
            let g = stack[height - 1] - start;
            row[g] | bitop::u8::bit(g)
        } else {
            0
        };
        stack[height] = j;
        height += 1;
    }

    // Padding never pops, so the previous position is always on top of the stack
    for offset in (end - start).max(1)..MICRO_BLOCK {
        let g = offset - 1;
        row[offset] = row[g] | bitop::u8::bit(g);
    }

    Ok(row)
}

/// Check a row read from storage: entry `j` may only have bits below `j`.
pub(crate) fn check_row(row: PrecRow) -> Result<PrecRow> {
    match row.iter().enumerate().find(|&(j, &mask)| mask >> j != 0) {
        Some((j, &mask)) => Err(Error::malformed(format!(
            "in-block answer mask {mask:#010b} at offset {j} points past the offset"
        ))),
        None => Ok(row),
    }
}

/// Position (relative to the micro-block start) of the minimum of `[from, to]` in a micro-block
/// with the given answers.
#[inline]
pub fn min_in(row: &PrecRow, from: usize, to: usize) -> usize {
    debug_assert!(from <= to && to < MICRO_BLOCK);
    bitop::u8::lsb(bitop::u8::clear_low(row[to], from)).unwrap_or(to)
}
