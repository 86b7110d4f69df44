//! The sparse coordinate-format matrix-vector multiply used by the `SparseMatVec` forward
//! strategy.
//!
//! The kernel only talks to the primitive through [`CooMatVec`], so any library honouring the
//! `y = alpha * op(A) * x + beta * y` contract can be plugged in. [`NativeCoo`] is the in-crate
//! implementation.

mod coo;
mod descr;
mod error;

pub use coo::{CooMatVec, NativeCoo};
pub use descr::{IndexBase, MatDescr, MatrixKind, Transpose, Triangle};
pub use error::BackendErr;
