use rayon::prelude::*;

use super::{BackendErr, MatDescr, MatrixKind, Transpose};

/// Entries handed to a single rayon task before it is worth splitting further.
const MIN_ENTRIES_PER_TASK: usize = 1 << 12;

/// A sparse coordinate-format matrix-vector multiply primitive.
pub trait CooMatVec: Send + Sync {
    /// Computes `y = alpha * op(A) * x + beta * y`, where `A` is the `m x k` matrix whose
    /// `i`-th stored entry is `val[i]` at `(rowind[i], colind[i])` and `op` is selected by
    /// `transa`. When `beta` is zero `y` is overwritten without being read.
    ///
    /// # Arguments
    /// * `transa` - Whether to multiply by `A` or by its transpose.
    /// * `m` - Rows of `A`.
    /// * `k` - Columns of `A`.
    /// * `alpha` - Scalar multiplier of the product.
    /// * `descr` - How to interpret the stored entries.
    /// * `val` - Values of the stored entries, its length is the entry count.
    /// * `rowind` - Row index of each stored entry.
    /// * `colind` - Column index of each stored entry.
    /// * `x` - The dense input vector.
    /// * `beta` - Scalar weight of the previous contents of `y`.
    /// * `y` - The dense output vector.
    ///
    /// # Returns
    /// A `BackendErr` if the arguments don't describe a valid product.
    #[allow(clippy::too_many_arguments)]
    fn coomv(
        &self,
        transa: Transpose,
        m: usize,
        k: usize,
        alpha: f64,
        descr: &MatDescr,
        val: &[f64],
        rowind: &[usize],
        colind: &[usize],
        x: &[f64],
        beta: f64,
        y: &mut [f64],
    ) -> Result<(), BackendErr>;
}

/// Rayon based implementation of [`CooMatVec`].
///
/// Each task accumulates its share of the entries into a private dense vector and the partial
/// vectors are summed afterwards, so entries sharing a row never race.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCoo;

impl NativeCoo {
    /// Validates the shape of the arguments and every stored coordinate.
    #[allow(clippy::too_many_arguments)]
    fn check(
        transa: Transpose,
        m: usize,
        k: usize,
        descr: &MatDescr,
        val: &[f64],
        rowind: &[usize],
        colind: &[usize],
        x: &[f64],
        y: &[f64],
    ) -> Result<(), BackendErr> {
        let nnz = val.len();
        for (what, got) in [("rowind", rowind.len()), ("colind", colind.len())] {
            if got != nnz {
                return Err(BackendErr::DimensionMismatch {
                    what,
                    got,
                    expected: nnz,
                });
            }
        }

        if matches!(descr.kind, MatrixKind::Symmetric(_)) && m != k {
            return Err(BackendErr::NonSquareSymmetric { rows: m, cols: k });
        }

        let (out_len, in_len) = match transa {
            Transpose::No => (m, k),
            Transpose::Yes => (k, m),
        };
        if x.len() != in_len {
            return Err(BackendErr::DimensionMismatch {
                what: "x",
                got: x.len(),
                expected: in_len,
            });
        }
        if y.len() != out_len {
            return Err(BackendErr::DimensionMismatch {
                what: "y",
                got: y.len(),
                expected: out_len,
            });
        }

        let base = descr.base.offset();
        let in_bounds = |raw: usize, len: usize| raw.checked_sub(base).is_some_and(|i| i < len);
        let bad = (0..nnz)
            .into_par_iter()
            .with_min_len(MIN_ENTRIES_PER_TASK)
            .find_first(|&e| !in_bounds(rowind[e], m) || !in_bounds(colind[e], k));

        match bad {
            Some(entry) => Err(BackendErr::EntryOutOfBounds {
                entry,
                row: rowind[entry],
                col: colind[entry],
            }),
            None => Ok(()),
        }
    }
}

impl CooMatVec for NativeCoo {
    fn coomv(
        &self,
        transa: Transpose,
        m: usize,
        k: usize,
        alpha: f64,
        descr: &MatDescr,
        val: &[f64],
        rowind: &[usize],
        colind: &[usize],
        x: &[f64],
        beta: f64,
        y: &mut [f64],
    ) -> Result<(), BackendErr> {
        Self::check(transa, m, k, descr, val, rowind, colind, x, y)?;

        let out_len = y.len();
        let base = descr.base.offset();
        let symmetric = matches!(descr.kind, MatrixKind::Symmetric(_));

        let product = (0..val.len())
            .into_par_iter()
            .with_min_len(MIN_ENTRIES_PER_TASK)
            .fold(
                || vec![0.0; out_len],
                |mut acc, e| {
                    let (row, col) = (rowind[e] - base, colind[e] - base);
                    if !descr.uses(row, col) {
                        return acc;
                    }

                    let (r, c) = match transa {
                        Transpose::No => (row, col),
                        Transpose::Yes => (col, row),
                    };
                    acc[r] += val[e] * x[c];
                    if symmetric && r != c {
                        acc[c] += val[e] * x[r];
                    }
                    acc
                },
            )
            .reduce(
                || vec![0.0; out_len],
                |mut a, b| {
                    a.iter_mut().zip(&b).for_each(|(a, b)| *a += b);
                    a
                },
            );

        if beta == 0.0 {
            y.par_iter_mut()
                .zip(product.par_iter())
                .for_each(|(y, p)| *y = alpha * p);
        } else {
            y.par_iter_mut()
                .zip(product.par_iter())
                .for_each(|(y, p)| *y = alpha * p + beta * *y);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IndexBase, Triangle};

    // [[1, 0, 2],
    //  [0, 3, 0]]
    const VAL: [f64; 3] = [1.0, 2.0, 3.0];
    const ROWS: [usize; 3] = [0, 0, 1];
    const COLS: [usize; 3] = [0, 2, 1];

    #[test]
    fn test_general_product() {
        let x = [1.0, 2.0, 3.0];
        let mut y = [f64::NAN; 2];

        NativeCoo
            .coomv(
                Transpose::No,
                2,
                3,
                1.0,
                &MatDescr::general(),
                &VAL,
                &ROWS,
                &COLS,
                &x,
                0.0,
                &mut y,
            )
            .unwrap();

        assert_eq!(y, [7.0, 6.0]);
    }

    #[test]
    fn test_transposed_product_with_accumulation() {
        let x = [1.0, 2.0];
        let mut y = [1.0, 1.0, 1.0];

        NativeCoo
            .coomv(
                Transpose::Yes,
                2,
                3,
                2.0,
                &MatDescr::general(),
                &VAL,
                &ROWS,
                &COLS,
                &x,
                0.5,
                &mut y,
            )
            .unwrap();

        // A^T x = [1, 6, 2]
        assert_eq!(y, [2.5, 12.5, 4.5]);
    }

    #[test]
    fn test_symmetric_lower_mirrors_entries_and_skips_upper() {
        // Stored: (0,0)=1, (1,0)=2, (0,1)=100 which sits in the upper triangle.
        let descr = MatDescr {
            kind: MatrixKind::Symmetric(Triangle::Lower),
            base: IndexBase::One,
        };
        let val = [1.0, 2.0, 100.0];
        let rows = [1, 2, 1];
        let cols = [1, 1, 2];
        let x = [1.0, 10.0];
        let mut y = [0.0; 2];

        NativeCoo
            .coomv(
                Transpose::No, 2, 2, 1.0, &descr, &val, &rows, &cols, &x, 0.0, &mut y,
            )
            .unwrap();

        assert_eq!(y, [21.0, 2.0]);
    }

    #[test]
    fn test_rejects_out_of_bounds_entry() {
        let rows = [0, 2, 1];
        let x = [0.0; 3];
        let mut y = [0.0; 2];

        let err = NativeCoo
            .coomv(
                Transpose::No,
                2,
                3,
                1.0,
                &MatDescr::general(),
                &VAL,
                &rows,
                &COLS,
                &x,
                0.0,
                &mut y,
            )
            .unwrap_err();

        assert_eq!(
            err,
            BackendErr::EntryOutOfBounds {
                entry: 1,
                row: 2,
                col: 2
            }
        );
        assert_eq!(y, [0.0; 2]);
    }

    #[test]
    fn test_rejects_zero_index_with_one_based_descriptor() {
        let descr = MatDescr {
            kind: MatrixKind::General,
            base: IndexBase::One,
        };
        let x = [0.0; 3];
        let mut y = [0.0; 2];

        let err = NativeCoo
            .coomv(
                Transpose::No, 2, 3, 1.0, &descr, &VAL, &ROWS, &COLS, &x, 0.0, &mut y,
            )
            .unwrap_err();

        assert!(matches!(err, BackendErr::EntryOutOfBounds { entry: 0, .. }));
    }

    #[test]
    fn test_rejects_wrong_vector_lengths() {
        let x = [0.0; 2];
        let mut y = [0.0; 2];

        let err = NativeCoo
            .coomv(
                Transpose::No,
                2,
                3,
                1.0,
                &MatDescr::general(),
                &VAL,
                &ROWS,
                &COLS,
                &x,
                0.0,
                &mut y,
            )
            .unwrap_err();

        assert_eq!(
            err,
            BackendErr::DimensionMismatch {
                what: "x",
                got: 2,
                expected: 3
            }
        );
    }
}
