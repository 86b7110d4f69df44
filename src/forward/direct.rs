use log::{debug, trace};
use ndarray::{ArrayView1, ArrayViewMut1};
use rayon::prelude::*;

use super::ScatterBuffer;
use crate::{ChunkPartition, Connectivity, Result, Weights};

/// Computes the forward pass by scattering every connection into its destination.
///
/// Phases run in order. During each phase every big chunk is one rayon task, walking its range
/// of connections sequentially; the next phase starts only after all tasks finished. The
/// partition is trusted to give big chunks disjoint destinations within a phase, see
/// [`ChunkPartition::verify_disjoint`].
///
/// # Arguments
/// * `input` - The input vector, indexed by source.
/// * `conn` - The connectivity.
/// * `weights` - The weights, any layout.
/// * `partition` - The chunk partition of `conn`.
/// * `output` - The output vector, indexed by destination. It is overwritten, never read.
///
/// # Returns
/// An error if some index is out of range, in which case `output` is left untouched.
pub fn forward(
    input: ArrayView1<'_, f64>,
    conn: &Connectivity<'_>,
    weights: &Weights<'_>,
    partition: &ChunkPartition<'_>,
    output: ArrayViewMut1<'_, f64>,
) -> Result<()> {
    conn.check_bounds(input.len(), output.len())?;
    weights.check(conn.len())?;
    partition.check(conn)?;

    debug!(
        connections = conn.len(),
        big_chunks = partition.big_chunks(),
        phases = partition.phases();
        "direct scatter forward"
    );

    let buffer = ScatterBuffer::zeroed(output.len());
    let unit = weights.layout().is_unit();
    let w = weights.data();

    for j in 0..partition.phases() {
        trace!(phase = j; "scattering phase");

        (0..partition.big_chunks()).into_par_iter().for_each(|k| {
            if unit {
                for i in partition.range(k, j) {
                    buffer.add(conn.destination(i), w[i] * input[conn.source(i)]);
                }
            } else {
                for i in partition.range(k, j) {
                    buffer.add(conn.destination(i), weights.get(i) * input[conn.source(i)]);
                }
            }
        });
    }

    buffer.write_into(output);
    Ok(())
}
