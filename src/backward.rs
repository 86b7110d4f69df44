use log::debug;
use ndarray::ArrayView1;
use rayon::prelude::*;

use crate::{Connectivity, Result, WeightLayout, WeightsMut};

/// Connections handed to a single rayon task on the per-connection paths.
const MIN_CONNECTIONS_PER_TASK: usize = 1 << 10;

/// Accumulates the weight gradient of every connection:
/// `grad_weight[slot(i)] += scale * input[source(i)] * grad_output[destination(i)]`.
///
/// Unit and strided layouts give every connection its own slot, so connections are processed
/// in parallel with one writer per slot. Any layout that may share slots (a zero stride or an
/// index map) groups connections by slot first; each group is summed in parallel and the sum is
/// added to its slot once.
///
/// # Arguments
/// * `input` - The input vector of the forward pass, indexed by source.
/// * `conn` - The connectivity.
/// * `grad_output` - The upstream gradient, indexed by destination.
/// * `scale` - The factor applied to every contribution.
/// * `grad_weight` - The weight gradient to accumulate into.
///
/// # Returns
/// An error if some index is out of range, in which case `grad_weight` is left untouched.
pub fn accumulate(
    input: ArrayView1<'_, f64>,
    conn: &Connectivity<'_>,
    grad_output: ArrayView1<'_, f64>,
    scale: f64,
    grad_weight: &mut WeightsMut<'_>,
) -> Result<()> {
    conn.check_bounds(input.len(), grad_output.len())?;
    grad_weight.check(conn.len())?;

    let n = conn.len();
    let layout = grad_weight.layout();
    let grad = grad_weight.data_mut();
    let contribution = |i: usize| input[conn.source(i)] * grad_output[conn.destination(i)];

    match layout {
        WeightLayout::Strided(1) if scale == 1.0 => {
            debug!(connections = n; "accumulating unit gradient");
            grad[..n]
                .par_iter_mut()
                .with_min_len(MIN_CONNECTIONS_PER_TASK)
                .enumerate()
                .for_each(|(i, g)| *g += contribution(i));
        }
        WeightLayout::Strided(stride) if stride > 0 => {
            debug!(
                connections = n,
                stride = stride,
                scale = scale;
                "accumulating strided gradient"
            );
            grad.par_chunks_mut(stride)
                .with_min_len(MIN_CONNECTIONS_PER_TASK)
                .take(n)
                .enumerate()
                .for_each(|(i, slots)| slots[0] += scale * contribution(i));
        }
        _ => {
            debug!(connections = n, scale = scale; "accumulating shared gradient");
            for (slot, sum) in sum_by_slot(&layout, n, contribution) {
                grad[slot] += scale * sum;
            }
        }
    }

    Ok(())
}

/// Sums the contributions of the first `n` connections per slot.
///
/// # Returns
/// One `(slot, sum)` pair per distinct slot, in ascending slot order.
fn sum_by_slot<F>(layout: &WeightLayout<'_>, n: usize, contribution: F) -> Vec<(usize, f64)>
where
    F: Fn(usize) -> f64 + Sync,
{
    let mut order: Vec<usize> = (0..n).collect();
    order.par_sort_by_key(|&i| layout.slot(i));

    order
        .par_chunk_by(|&a, &b| layout.slot(a) == layout.slot(b))
        .map(|group| {
            let sum = group.iter().map(|&i| contribution(i)).sum::<f64>();
            (layout.slot(group[0]), sum)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::KernelErr;

    fn example() -> (Connectivity<'static>, ndarray::Array1<f64>, ndarray::Array1<f64>) {
        let conn = Connectivity::from_slices(&[0, 1, 0], &[0, 0, 1]).unwrap();
        (conn, array![5.0, 7.0], array![1.0, 2.0])
    }

    #[test]
    fn test_scaled_unit_gradient() {
        let (conn, input, grad_output) = example();
        let mut grad = [0.0; 3];

        accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            0.5,
            &mut WeightsMut::unit(&mut grad),
        )
        .unwrap();

        assert_eq!(grad, [2.5, 3.5, 5.0]);
    }

    #[test]
    fn test_unscaled_unit_gradient_accumulates() {
        let (conn, input, grad_output) = example();
        let mut grad = [1.0, 1.0, 1.0, 42.0];

        accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            1.0,
            &mut WeightsMut::unit(&mut grad),
        )
        .unwrap();

        assert_eq!(grad, [6.0, 8.0, 11.0, 42.0]);
    }

    #[test]
    fn test_strided_gradient() {
        let (conn, input, grad_output) = example();
        let mut grad = [0.0; 7];

        accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            2.0,
            &mut WeightsMut::new(&mut grad, WeightLayout::Strided(3)),
        )
        .unwrap();

        assert_eq!(grad, [10.0, 0.0, 0.0, 14.0, 0.0, 0.0, 20.0]);
    }

    #[test]
    fn test_fully_tied_gradient() {
        let (conn, input, grad_output) = example();
        let mut grad = [1.0];

        accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            0.5,
            &mut WeightsMut::new(&mut grad, WeightLayout::Strided(0)),
        )
        .unwrap();

        assert_eq!(grad, [1.0 + 2.5 + 3.5 + 5.0]);
    }

    #[test]
    fn test_indexed_gradient() {
        let (conn, input, grad_output) = example();
        let map = [1, 0, 1];
        let mut grad = [0.0, 0.0, 9.0];

        accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            1.0,
            &mut WeightsMut::new(&mut grad, WeightLayout::Indexed(&map)),
        )
        .unwrap();

        assert_eq!(grad, [7.0, 15.0, 9.0]);
    }

    #[test]
    fn test_sum_by_slot_groups_in_slot_order() {
        let map = [4, 1, 4, 0, 1];
        let sums = sum_by_slot(&WeightLayout::Indexed(&map), 5, |i| i as f64);
        assert_eq!(sums, [(0, 3.0), (1, 5.0), (4, 2.0)]);
    }

    #[test]
    fn test_out_of_range_leaves_gradient_untouched() {
        let (conn, input, _) = example();
        let grad_output = array![1.0];
        let mut grad = [3.0; 3];

        let err = accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            1.0,
            &mut WeightsMut::unit(&mut grad),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            KernelErr::IndexOutOfRange {
                what: "destination",
                connection: 2,
                ..
            }
        ));
        assert_eq!(grad, [3.0; 3]);
    }

    #[test]
    fn test_short_gradient_buffer_is_rejected() {
        let (conn, input, grad_output) = example();
        let mut grad = [0.0; 2];

        let err = accumulate(
            input.view(),
            &conn,
            grad_output.view(),
            1.0,
            &mut WeightsMut::unit(&mut grad),
        )
        .unwrap_err();

        assert!(matches!(err, KernelErr::SizeMismatch { .. }));
    }
}
