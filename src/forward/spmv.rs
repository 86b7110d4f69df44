use log::debug;
use ndarray::{ArrayView1, ArrayViewMut1};

use crate::{
    Connectivity, KernelErr, Result, Weights,
    backend::{CooMatVec, MatDescr, Transpose},
};

/// Computes the forward pass as `output = 1.0 * M * input + 0.0 * output`, where `M` is the
/// `output.len() x input.len()` coordinate-format matrix holding `weights[i]` at
/// `(destination(i), source(i))`.
///
/// # Arguments
/// * `backend` - The sparse matrix-vector multiply primitive.
/// * `input` - The input vector, indexed by source.
/// * `conn` - The connectivity.
/// * `weights` - The weights, must hold one weight per connection.
/// * `output` - The output vector, indexed by destination. It is overwritten, never read.
///
/// # Returns
/// An `InvalidArgument` error for tied or strided weights, an index error for out of range
/// connections, or a `BackendFailure`. On error `output` is left untouched.
#[track_caller]
pub fn forward<B>(
    backend: &B,
    input: ArrayView1<'_, f64>,
    conn: &Connectivity<'_>,
    weights: &Weights<'_>,
    mut output: ArrayViewMut1<'_, f64>,
) -> Result<()>
where
    B: CooMatVec + ?Sized,
{
    if !weights.layout().is_unit() {
        return Err(KernelErr::invalid_argument(
            "weights",
            "the sparse mat-vec strategy needs exactly one weight per connection",
        ));
    }
    weights.check(conn.len())?;
    conn.check_bounds(input.len(), output.len())?;

    debug!(
        connections = conn.len(),
        rows = output.len(),
        cols = input.len();
        "sparse mat-vec forward"
    );

    let x = input.as_standard_layout();
    let x = x
        .as_slice()
        .ok_or_else(|| KernelErr::invalid_argument("input", "input is not contiguous"))?;

    // The product lands in a scratch vector so a failing backend can't leave `output` half
    // written.
    let mut y = vec![0.0; output.len()];
    backend.coomv(
        Transpose::No,
        output.len(),
        input.len(),
        1.0,
        &MatDescr::general(),
        &weights.data()[..conn.len()],
        conn.destinations(),
        conn.sources(),
        x,
        0.0,
        &mut y,
    )?;

    output.assign(&ArrayView1::from(&y));
    Ok(())
}
