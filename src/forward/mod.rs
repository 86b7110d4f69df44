//! The forward pass: `output[d] = sum of weight(i) * input[source(i)]` over every connection `i`
//! with destination `d`.

pub mod direct;
mod scatter;
pub mod spmv;

use serde::{Deserialize, Serialize};

use crate::WeightLayout;

pub(crate) use scatter::ScatterBuffer;

/// The two interchangeable ways of computing the forward pass. Both give the same result up to
/// floating point summation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardStrategy {
    /// Scatter connection by connection, one task per big chunk of a [`ChunkPartition`](crate::ChunkPartition).
    #[default]
    DirectScatter,
    /// Treat the connections as a coordinate-format matrix and delegate to a
    /// [`CooMatVec`](crate::backend::CooMatVec) backend.
    SparseMatVec,
}

impl ForwardStrategy {
    /// Whether this strategy can read weights stored with the given layout.
    pub fn supports(self, layout: &WeightLayout<'_>) -> bool {
        match self {
            ForwardStrategy::DirectScatter => true,
            ForwardStrategy::SparseMatVec => layout.is_unit(),
        }
    }
}
