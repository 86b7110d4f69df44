use std::{
    error::Error,
    fmt::{self, Display},
};

/// Failures reported by a sparse matrix-vector multiply primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendErr {
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    EntryOutOfBounds {
        entry: usize,
        row: usize,
        col: usize,
    },
    NonSquareSymmetric {
        rows: usize,
        cols: usize,
    },
}

impl Display for BackendErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErr::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} has length {got}, expected {expected}"),
            BackendErr::EntryOutOfBounds { entry, row, col } => {
                write!(f, "entry {entry} at ({row}, {col}) lies outside the matrix")
            }
            BackendErr::NonSquareSymmetric { rows, cols } => {
                write!(f, "a symmetric matrix must be square, got {rows}x{cols}")
            }
        }
    }
}

impl Error for BackendErr {}
