//! A sparse, irregularly connected linear layer.
//!
//! The forward pass scatters `weight * input[source]` into `output[destination]` for every
//! connection, the backward pass accumulates `scale * input[source] * grad_output[destination]`
//! into the weight gradient. Both run in parallel with rayon; see [`ChunkPartition`] for the
//! rule that keeps the forward scatter race free and [`backward::accumulate`] for how shared
//! weights are handled.

pub mod backend;
pub mod backward;
mod config;
mod connectivity;
pub mod error;
pub mod forward;
mod kernel;
mod partition;
mod weights;

pub use config::KernelConfig;
pub use connectivity::Connectivity;
pub use error::{KernelErr, Result};
pub use forward::ForwardStrategy;
pub use kernel::ScatterKernel;
pub use partition::{ChunkPartition, PartitionPlan};
pub use weights::{WeightLayout, Weights, WeightsMut};
