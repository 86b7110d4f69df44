use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// A zero-initialized accumulation target shared by the scatter tasks.
///
/// Each cell holds the bits of an `f64`. Adds are a plain load followed by a plain store, not
/// an atomic read-modify-write: within a phase every cell has a single writer, and the end of a
/// phase's parallel loop orders it before the next one. A partition that breaks that rule loses
/// updates instead of corrupting memory.
pub(crate) struct ScatterBuffer {
    cells: Box<[AtomicU64]>,
}

impl ScatterBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU64::new(0.0f64.to_bits())).collect(),
        }
    }

    #[inline]
    pub fn add(&self, i: usize, value: f64) {
        let cell = &self.cells[i];
        let acc = f64::from_bits(cell.load(Ordering::Relaxed)) + value;
        cell.store(acc.to_bits(), Ordering::Relaxed);
    }

    /// Overwrites `output` with the accumulated values.
    pub fn write_into(self, output: ArrayViewMut1<'_, f64>) {
        Zip::from(output)
            .and(ArrayView1::from(&self.cells[..]))
            .par_for_each(|out, cell| *out = f64::from_bits(cell.load(Ordering::Relaxed)));
    }
}
