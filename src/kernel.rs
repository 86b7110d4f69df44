use log::debug;
use ndarray::{Array1, ArrayView1, ArrayViewMut1};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    ChunkPartition, Connectivity, ForwardStrategy, KernelConfig, Result, Weights, WeightsMut,
    backend::{CooMatVec, NativeCoo},
    backward,
    forward::{direct, spmv},
};

/// The sparse linear layer kernel: a forward scatter-accumulation and a backward weight
/// gradient accumulation over the same connection list.
///
/// No state survives between calls besides the configuration and the worker pool.
pub struct ScatterKernel<B: CooMatVec = NativeCoo> {
    config: KernelConfig,
    pool: Option<ThreadPool>,
    backend: B,
}

impl ScatterKernel<NativeCoo> {
    /// Creates a new `ScatterKernel` using the in-crate sparse backend.
    ///
    /// # Arguments
    /// * `config` - The execution settings.
    ///
    /// # Returns
    /// A new `ScatterKernel` or a `ThreadPool` error if the worker pool can't be built.
    pub fn new(config: KernelConfig) -> Result<Self> {
        Self::with_backend(config, NativeCoo)
    }
}

impl<B: CooMatVec> ScatterKernel<B> {
    /// Creates a new `ScatterKernel` delegating the `SparseMatVec` strategy to `backend`.
    ///
    /// # Arguments
    /// * `config` - The execution settings.
    /// * `backend` - The sparse matrix-vector multiply primitive.
    ///
    /// # Returns
    /// A new `ScatterKernel` or a `ThreadPool` error if the worker pool can't be built.
    pub fn with_backend(config: KernelConfig, backend: B) -> Result<Self> {
        let pool = config
            .threads()
            .map(|threads| {
                ThreadPoolBuilder::new()
                    .num_threads(threads.get())
                    .thread_name(|i| format!("scatter-{i}"))
                    .build()
            })
            .transpose()?;

        Ok(Self {
            config,
            pool,
            backend,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The strategy the forward pass will use for `weights`: the configured one, unless it
    /// can't read that weight layout, in which case `DirectScatter`.
    pub fn strategy_for(&self, weights: &Weights<'_>) -> ForwardStrategy {
        let preferred = self.config.strategy();
        if preferred.supports(&weights.layout()) {
            return preferred;
        }

        debug!(
            "{preferred:?} can't read {:?} weights, falling back to direct scatter",
            weights.layout()
        );
        ForwardStrategy::DirectScatter
    }

    /// Runs the forward pass into a freshly allocated output.
    ///
    /// # Arguments
    /// * `input` - The input vector, indexed by source.
    /// * `conn` - The connectivity.
    /// * `weights` - The weights.
    /// * `partition` - The chunk partition of `conn`, only read by `DirectScatter`.
    /// * `output_len` - The length of the output, every destination must be below it.
    ///
    /// # Returns
    /// The output vector or the first failed precondition.
    pub fn forward(
        &self,
        input: ArrayView1<'_, f64>,
        conn: &Connectivity<'_>,
        weights: &Weights<'_>,
        partition: &ChunkPartition<'_>,
        output_len: usize,
    ) -> Result<Array1<f64>> {
        let mut output = Array1::zeros(output_len);
        self.forward_into(input, conn, weights, partition, output.view_mut())?;
        Ok(output)
    }

    /// Runs the forward pass into a caller provided output, overwriting its contents.
    ///
    /// # Arguments
    /// * `input` - The input vector, indexed by source.
    /// * `conn` - The connectivity.
    /// * `weights` - The weights.
    /// * `partition` - The chunk partition of `conn`, only read by `DirectScatter`.
    /// * `output` - The output vector, indexed by destination.
    ///
    /// # Returns
    /// The first failed precondition, in which case `output` is left untouched.
    pub fn forward_into(
        &self,
        input: ArrayView1<'_, f64>,
        conn: &Connectivity<'_>,
        weights: &Weights<'_>,
        partition: &ChunkPartition<'_>,
        output: ArrayViewMut1<'_, f64>,
    ) -> Result<()> {
        match self.strategy_for(weights) {
            ForwardStrategy::DirectScatter => {
                if self.config.validate_partition() {
                    conn.check_bounds(input.len(), output.len())?;
                    partition.verify_disjoint(conn, output.len())?;
                }
                self.install(|| direct::forward(input, conn, weights, partition, output))
            }
            ForwardStrategy::SparseMatVec => {
                self.install(|| spmv::forward(&self.backend, input, conn, weights, output))
            }
        }
    }

    /// Runs the backward pass, accumulating into `grad_weight`.
    ///
    /// # Arguments
    /// * `input` - The input vector of the forward pass.
    /// * `conn` - The connectivity.
    /// * `grad_output` - The upstream gradient, indexed by destination.
    /// * `scale` - The factor applied to every contribution.
    /// * `grad_weight` - The weight gradient, any layout.
    ///
    /// # Returns
    /// The first failed precondition, in which case `grad_weight` is left untouched.
    pub fn backward(
        &self,
        input: ArrayView1<'_, f64>,
        conn: &Connectivity<'_>,
        grad_output: ArrayView1<'_, f64>,
        scale: f64,
        grad_weight: &mut WeightsMut<'_>,
    ) -> Result<()> {
        self.install(|| backward::accumulate(input, conn, grad_output, scale, grad_weight))
    }

    /// Runs `op` on the dedicated pool if there is one, or on the caller's otherwise.
    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use ndarray::array;

    use super::*;
    use crate::{KernelErr, WeightLayout};

    fn kernel(strategy: ForwardStrategy) -> ScatterKernel {
        let config = KernelConfig::new(strategy)
            .with_threads(NonZeroUsize::new(2).unwrap())
            .with_partition_validation(true);
        ScatterKernel::new(config).unwrap()
    }

    #[test]
    fn test_forward_with_both_strategies() {
        let conn = Connectivity::from_slices(&[0, 1, 0], &[0, 0, 1]).unwrap();
        let weights = [2.0, 3.0, 1.0];
        let input = array![5.0, 7.0];
        let partition = ChunkPartition::whole(3);

        for strategy in [ForwardStrategy::DirectScatter, ForwardStrategy::SparseMatVec] {
            let output = kernel(strategy)
                .forward(
                    input.view(),
                    &conn,
                    &Weights::unit(&weights),
                    &partition,
                    2,
                )
                .unwrap();
            assert_eq!(output, array![31.0, 5.0], "strategy {strategy:?}");
        }
    }

    #[test]
    fn test_tied_weights_fall_back_to_direct_scatter() {
        let kernel = kernel(ForwardStrategy::SparseMatVec);
        let shared = [2.0];
        let weights = Weights::new(&shared, WeightLayout::Strided(0));

        assert_eq!(kernel.strategy_for(&weights), ForwardStrategy::DirectScatter);
        assert_eq!(
            kernel.strategy_for(&Weights::unit(&[1.0])),
            ForwardStrategy::SparseMatVec
        );

        let conn = Connectivity::from_slices(&[0, 1], &[0, 0]).unwrap();
        let input = array![1.0, 2.0];
        let output = kernel
            .forward(input.view(), &conn, &weights, &ChunkPartition::whole(2), 1)
            .unwrap();
        assert_eq!(output, array![6.0]);
    }

    #[test]
    fn test_validation_rejects_colliding_partition() {
        let conn = Connectivity::from_slices(&[0, 0], &[0, 0]).unwrap();
        let bounds = array![[0, 1], [1, 2]];
        let partition = ChunkPartition::new(bounds.view(), 2).unwrap();
        let input = array![1.0];

        let err = kernel(ForwardStrategy::DirectScatter)
            .forward(
                input.view(),
                &conn,
                &Weights::unit(&[1.0, 1.0]),
                &partition,
                1,
            )
            .unwrap_err();

        assert!(matches!(err, KernelErr::PartitionCollision { .. }));
    }

    #[test]
    fn test_validation_reports_destination_past_output() {
        let input = array![1.0];
        let weights = [1.0];

        for destination in [usize::MAX, 1 << 34] {
            let destinations = [destination];
            let conn = Connectivity::from_slices(&[0], &destinations).unwrap();
            let mut output = array![7.0, 7.0];

            let err = kernel(ForwardStrategy::DirectScatter)
                .forward_into(
                    input.view(),
                    &conn,
                    &Weights::unit(&weights),
                    &ChunkPartition::whole(1),
                    output.view_mut(),
                )
                .unwrap_err();

            assert!(matches!(
                err,
                KernelErr::IndexOutOfRange {
                    what: "destination",
                    connection: 0,
                    len: 2,
                    ..
                }
            ));
            assert_eq!(output, array![7.0, 7.0]);
        }
    }

    #[test]
    fn test_backward_on_dedicated_pool() {
        let conn = Connectivity::from_slices(&[0, 1, 0], &[0, 0, 1]).unwrap();
        let input = array![5.0, 7.0];
        let grad_output = array![1.0, 2.0];
        let mut grad = [0.0; 3];

        kernel(ForwardStrategy::DirectScatter)
            .backward(
                input.view(),
                &conn,
                grad_output.view(),
                0.5,
                &mut WeightsMut::unit(&mut grad),
            )
            .unwrap();

        assert_eq!(grad, [2.5, 3.5, 5.0]);
    }
}
