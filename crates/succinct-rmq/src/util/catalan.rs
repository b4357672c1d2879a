//! Catalan (ballot number) triangle used to enumerate Cartesian tree shapes.

/// Builds the ballot number triangle `C` with `C[0][q] = 1`, `C[p][q] = C[p-1][q] + C[p][q-1]`
/// for `p <= q`, and zero below the diagonal.
///
/// `C[n][n]` is the n-th Catalan number, i.e. the number of distinct Cartesian tree shapes of a
/// block with `n` elements.
pub const fn triangle<const N: usize>() -> [[u32; N]; N] {
    let mut table = [[0; N]; N];
    let mut q = 0;
    while q < N {
        table[0][q] = 1;
        q += 1;
    }
    let mut p = 1;
    while p < N {
        let mut q = p;
        while q < N {
            table[p][q] = table[p - 1][q] + table[p][q - 1];
            q += 1;
        }
        p += 1;
    }
    table
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_catalan_numbers() {
        let table = triangle::<9>();
        let catalan = [1, 1, 2, 5, 14, 42, 132, 429, 1430];
        for (n, &c) in catalan.iter().enumerate() {
            assert_eq!(table[n][n], c);
        }
    }

    #[test]
    fn test_ballot_rows() {
        let table = triangle::<9>();
        assert_eq!(table[0], [1; 9]);
        assert_eq!(table[1], [0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(table[2][..6], [0, 0, 2, 5, 9, 14]);
        assert_eq!(table[3][3..6], [5, 14, 28]);
    }
}
