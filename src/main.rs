use std::{env, fs, num::NonZeroUsize};

use anyhow::Context;
use log::info;
use ndarray::Array1;
use rand::Rng;
use scatter_linear::{
    Connectivity, KernelConfig, PartitionPlan, ScatterKernel, Weights, WeightsMut,
};

const INPUTS: usize = 1024;
const OUTPUTS: usize = 256;
const CONNECTIONS: usize = 1 << 16;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read kernel config at {path}"))?;
            KernelConfig::from_json(&raw)?
        }
        None => KernelConfig::default(),
    };
    info!("kernel config: {config:?}");

    let kernel = ScatterKernel::new(config)?;
    let mut rng = rand::rng();

    let src: Vec<usize> = (0..CONNECTIONS).map(|_| rng.random_range(0..INPUTS)).collect();
    let dst: Vec<usize> = (0..CONNECTIONS).map(|_| rng.random_range(0..OUTPUTS)).collect();
    let weights: Vec<f64> = (0..CONNECTIONS).map(|_| rng.random_range(-1.0..1.0)).collect();
    let input: Array1<f64> = (0..INPUTS).map(|_| rng.random::<f64>()).collect();

    let big_chunks = kernel.config().threads().unwrap_or_else(|| {
        NonZeroUsize::new(rayon::current_num_threads()).unwrap_or(NonZeroUsize::MIN)
    });
    let phases = NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN);
    let plan = PartitionPlan::by_destination(
        &Connectivity::from_slices(&src, &dst)?,
        big_chunks,
        phases,
    );
    let (src, dst, weights) = (
        plan.permute(&src)?,
        plan.permute(&dst)?,
        plan.permute(&weights)?,
    );
    let conn = Connectivity::from_slices(&src, &dst)?;

    let output = kernel.forward(
        input.view(),
        &conn,
        &Weights::unit(&weights),
        &plan.partition(),
        OUTPUTS,
    )?;
    info!(
        "forward: {} connections over {big_chunks} big chunks, output norm {:.6}",
        conn.len(),
        output.dot(&output).sqrt()
    );

    let grad_output = Array1::ones(OUTPUTS);
    let mut grad = vec![0.0; CONNECTIONS];
    kernel.backward(
        input.view(),
        &conn,
        grad_output.view(),
        1.0 / OUTPUTS as f64,
        &mut WeightsMut::unit(&mut grad),
    )?;
    info!("backward: gradient sum {:.6}", grad.iter().sum::<f64>());

    Ok(())
}
