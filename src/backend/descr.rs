/// Whether the primitive multiplies by the stored matrix or by its transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    No,
    Yes,
}

/// Which triangle of a symmetric matrix holds the stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triangle {
    Lower,
    Upper,
}

/// The structure the stored entries describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    /// Every stored entry is used as is.
    General,
    /// Only entries in the given triangle are used, mirrored across the diagonal.
    Symmetric(Triangle),
}

/// Whether stored row and column indices count from zero or from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBase {
    Zero,
    One,
}

impl IndexBase {
    pub fn offset(self) -> usize {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }
}

/// Describes how the primitive must interpret the coordinate arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatDescr {
    pub kind: MatrixKind,
    pub base: IndexBase,
}

impl MatDescr {
    /// A general matrix with zero-based indices, which is how a connection list reads.
    pub fn general() -> Self {
        Self {
            kind: MatrixKind::General,
            base: IndexBase::Zero,
        }
    }

    /// Whether the stored entry at `(row, col)` takes part in the product.
    pub fn uses(&self, row: usize, col: usize) -> bool {
        match self.kind {
            MatrixKind::General => true,
            MatrixKind::Symmetric(Triangle::Lower) => row >= col,
            MatrixKind::Symmetric(Triangle::Upper) => row <= col,
        }
    }
}
