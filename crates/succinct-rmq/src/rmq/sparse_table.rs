//! Sparse tables over blocks and super-blocks
//!
//! Row `k` of a table holds, for every start `i`, the minimum of the `2^k` consecutive blocks (or
//! super-blocks) starting at `i`. Any range is then covered by two overlapping rows of the same
//! depth. Entries whose window would run past the end keep the value of the previous row.

use std::cmp::Ordering;

use super::{BLOCK, BLOCK_DEPTH, BLOCKS_PER_SUPER, Geometry};
use crate::{Result, sequence::NumericSequence};

/// Block table `M`: offsets of minima relative to the start of the window's first block.
pub type BlockRows = Vec<Vec<u8>>;

/// Super-block table `M′`: absolute positions of minima.
pub type SuperBlockRows = Vec<Vec<u32>>;

/// Build `M` with [`BLOCK_DEPTH`] rows and `M′` with `geometry.super_depth` rows.
pub fn build<S: NumericSequence + ?Sized>(
    seq: &S,
    geometry: &Geometry,
) -> Result<(BlockRows, SuperBlockRows)> {
    let len = seq.len();
    debug_assert_eq!(len, geometry.len);

    // Leftmost minimum of every block
    let mut block_mins = Vec::with_capacity(geometry.n_blocks);
    for block in 0..geometry.n_blocks {
        let start = block * BLOCK;
        let end = (start + BLOCK).min(len);
        let mut min = start;
        for pos in start + 1..end {
            if seq.compare(pos, min)? == Ordering::Less {
                min = pos;
            }
        }
        block_mins.push(min);
    }

    // Leftmost minimum of every super-block, from the minima of its blocks
    let mut super_mins = Vec::with_capacity(geometry.n_super);
    for blocks in block_mins.chunks(BLOCKS_PER_SUPER) {
        let mut min = blocks[0];
        for &pos in &blocks[1..] {
            if seq.compare(pos, min)? == Ordering::Less {
                min = pos;
            }
        }
        super_mins.push(min as u32);
    }

    let mut block_rows = Vec::with_capacity(BLOCK_DEPTH);
    block_rows.push(
        block_mins
            .iter()
            .enumerate()
            .map(|(block, &pos)| (pos - block * BLOCK) as u8)
            .collect::<Vec<_>>(),
    );
    for k in 1..BLOCK_DEPTH {
        let dist = 1 << (k - 1);
        let row = lift(&block_rows[k - 1], dist, |i, left, right| {
            let left_pos = i * BLOCK + left as usize;
            let right_pos = (i + dist) * BLOCK + right as usize;
            Ok(if seq.compare(right_pos, left_pos)? == Ordering::Less {
                (right_pos - i * BLOCK) as u8
            } else {
                left
            })
        })?;
        block_rows.push(row);
    }

    let mut super_rows = Vec::with_capacity(geometry.super_depth);
    if geometry.super_depth > 0 {
        super_rows.push(super_mins);
    }
    for k in 1..geometry.super_depth {
        let dist = 1 << (k - 1);
        let row = lift(&super_rows[k - 1], dist, |_, left, right| {
            Ok(
                if seq.compare(right as usize, left as usize)? == Ordering::Less {
                    right
                } else {
                    left
                },
            )
        })?;
        super_rows.push(row);
    }

    Ok((block_rows, super_rows))
}

/// Compute row `k` from row `k - 1`, where `dist` is `2^(k-1)`.
///
/// `pick(i, left, right)` combines the entries at `i` and `i + dist` of the previous row, which
/// must prefer `left` on ties.
fn lift<V, F>(prev: &[V], dist: usize, mut pick: F) -> Result<Vec<V>>
where
    V: Copy,
    F: FnMut(usize, V, V) -> Result<V>,
{
    let len = prev.len();
    let mut row = Vec::with_capacity(len);
    let n_full = len.saturating_sub(dist);
    for i in 0..n_full {
        row.push(pick(i, prev[i], prev[i + dist])?);
    }
    // Overhang, the window is cut by the end of the sequence
    row.extend_from_slice(&prev[n_full..]);
    Ok(row)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    use super::*;
    use crate::rmq::SUPER_BLOCK;

    fn brute_min(values: &[i64], start: usize, end: usize) -> usize {
        (start..end).fold(start, |best, k| if values[k] < values[best] { k } else { best })
    }

    #[test]
    fn test_block_rows() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let values: Vec<i64> = (0..3000).map(|_| rng.random_range(0..50)).collect();
        let geometry = Geometry::new(values.len());
        let (block_rows, _) = build(&values, &geometry)?;

        assert_eq!(block_rows.len(), BLOCK_DEPTH);
        for (k, row) in block_rows.iter().enumerate() {
            assert_eq!(row.len(), geometry.n_blocks);
            let width = 1 << k;
            for (i, &offset) in row.iter().enumerate().take(geometry.n_blocks - width + 1) {
                let start = i * BLOCK;
                let end = ((i + width) * BLOCK).min(values.len());
                assert_eq!(start + offset as usize, brute_min(&values, start, end));
            }
        }
        Ok(())
    }

    #[test]
    fn test_super_block_rows() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let values: Vec<i64> = (0..5000).map(|_| rng.random_range(-100..100)).collect();
        let geometry = Geometry::new(values.len());
        let (_, super_rows) = build(&values, &geometry)?;

        // 20 super-blocks need rows for windows of 1, 2, 4, 8 and 16
        assert_eq!(geometry.n_super, 20);
        assert_eq!(super_rows.len(), 5);
        for (k, row) in super_rows.iter().enumerate() {
            assert_eq!(row.len(), geometry.n_super);
            let width = 1 << k;
            for (i, &pos) in row.iter().enumerate().take(geometry.n_super - width + 1) {
                let start = i * SUPER_BLOCK;
                let end = ((i + width) * SUPER_BLOCK).min(values.len());
                assert_eq!(pos as usize, brute_min(&values, start, end));
            }
        }
        Ok(())
    }

    #[test]
    fn test_ties_keep_leftmost() -> Result<()> {
        let values = vec![7i64; 1000];
        let geometry = Geometry::new(values.len());
        let (block_rows, super_rows) = build(&values, &geometry)?;
        assert!(block_rows.iter().flatten().all(|&offset| offset == 0));
        for row in &super_rows {
            for (i, &pos) in row.iter().enumerate() {
                assert_eq!(pos as usize, i * SUPER_BLOCK);
            }
        }
        Ok(())
    }

    #[test]
    fn test_overhang() {
        let prev = [1u8, 2, 3, 4, 5];
        let row = lift(&prev, 2, |_, left, right| Ok(left.max(right))).unwrap();
        assert_eq!(row, [3, 4, 5, 4, 5]);

        let row = lift(&prev, 8, |_, left, right| Ok(left.max(right))).unwrap();
        assert_eq!(row, prev);
    }
}
