use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, CowArray, Ix2, arr2};
use rayon::prelude::*;

use crate::{Connectivity, KernelErr, Result};

/// Splits the connection list into groups that may be scattered concurrently.
///
/// Row `k` is a *big chunk*, the unit of parallel work. Consecutive boundaries `[k][j]` and
/// `[k][j + 1]` delimit the connections big chunk `k` processes during phase `j`. Phases run one
/// after another; within a phase, big chunks are expected to write disjoint destinations. That
/// expectation is what makes the unsynchronized scatter sound, and is only checked by
/// [`ChunkPartition::verify_disjoint`].
#[derive(Debug, Clone)]
pub struct ChunkPartition<'a> {
    bounds: CowArray<'a, usize, Ix2>,
    nconnections: usize,
}

impl<'a> ChunkPartition<'a> {
    /// Creates a new `ChunkPartition` over a grid of boundaries.
    ///
    /// # Arguments
    /// * `bounds` - A `[big chunks][phases + 1]` grid of offsets into the connection list.
    /// * `nconnections` - The length of the connection list the offsets refer to.
    ///
    /// # Returns
    /// A new `ChunkPartition` or an `InvalidArgument` error if some offset lies past the
    /// connection list or some range is reversed.
    #[track_caller]
    pub fn new(bounds: ArrayView2<'a, usize>, nconnections: usize) -> Result<Self> {
        for (k, row) in bounds.rows().into_iter().enumerate() {
            if let Some(&bound) = row.iter().find(|&&b| b > nconnections) {
                return Err(KernelErr::invalid_argument(
                    "chunk partition",
                    format!(
                        "big chunk {k} has boundary {bound} past the {nconnections} connections"
                    ),
                ));
            }

            if let Some(j) = row
                .windows(2)
                .into_iter()
                .position(|pair| pair[0] > pair[1])
            {
                return Err(KernelErr::invalid_argument(
                    "chunk partition",
                    format!("big chunk {k} has a reversed range in phase {j}"),
                ));
            }
        }

        Ok(Self {
            bounds: CowArray::from(bounds),
            nconnections,
        })
    }

    /// A single big chunk with a single phase covering every connection, which makes the
    /// scatter sequential.
    pub fn whole(nconnections: usize) -> ChunkPartition<'static> {
        ChunkPartition {
            bounds: CowArray::from(arr2(&[[0, nconnections]])),
            nconnections,
        }
    }

    /// Returns the length of the connection list this partition was built for.
    pub fn nconnections(&self) -> usize {
        self.nconnections
    }

    /// Checks this partition was built for a connection list as long as `conn`.
    pub(crate) fn check(&self, conn: &Connectivity<'_>) -> Result<()> {
        if self.nconnections != conn.len() {
            return Err(KernelErr::SizeMismatch {
                a: "chunk partition",
                b: "connections",
                got: self.nconnections,
                expected: conn.len(),
            });
        }
        Ok(())
    }

    /// Returns the amount of big chunks, that is, the amount of parallel tasks per phase.
    pub fn big_chunks(&self) -> usize {
        self.bounds.nrows()
    }

    /// Returns the amount of sequential phases.
    pub fn phases(&self) -> usize {
        self.bounds.ncols().saturating_sub(1)
    }

    /// The connection positions big chunk `k` processes during phase `j`.
    #[inline]
    pub fn range(&self, k: usize, j: usize) -> std::ops::Range<usize> {
        self.bounds[[k, j]]..self.bounds[[k, j + 1]]
    }

    /// Checks that no two big chunks write the same destination during the same phase.
    ///
    /// # Arguments
    /// * `conn` - The connectivity this partition refers to.
    /// * `output_len` - The length of the output, every destination must be below it.
    ///
    /// # Returns
    /// A `PartitionCollision` error describing the first conflict found, an `IndexOutOfRange`
    /// error for a destination past the output, or a `SizeMismatch` if the partition was built
    /// for a different amount of connections.
    pub fn verify_disjoint(&self, conn: &Connectivity<'_>, output_len: usize) -> Result<()> {
        const FREE: usize = usize::MAX;

        self.check(conn)?;

        let mut owner = vec![FREE; output_len];
        let mut touched = Vec::new();

        for j in 0..self.phases() {
            for k in 0..self.big_chunks() {
                for i in self.range(k, j) {
                    let d = conn.destination(i);
                    let Some(slot) = owner.get_mut(d) else {
                        return Err(KernelErr::IndexOutOfRange {
                            what: "destination",
                            connection: i,
                            index: d,
                            len: output_len,
                        });
                    };
                    match *slot {
                        FREE => {
                            *slot = k;
                            touched.push(d);
                        }
                        first if first != k => {
                            return Err(KernelErr::PartitionCollision {
                                phase: j,
                                destination: d,
                                first_chunk: first,
                                second_chunk: k,
                            });
                        }
                        _ => {}
                    }
                }
            }

            for d in touched.drain(..) {
                owner[d] = FREE;
            }
        }

        Ok(())
    }
}

/// A collision-free partition together with the connection order it assumes.
///
/// Destination `d` is owned by big chunk `d % big_chunks`, so big chunks never share a
/// destination in any phase. Each big chunk's connections are then split evenly into phases.
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    order: Vec<usize>,
    bounds: Array2<usize>,
}

impl PartitionPlan {
    /// Plans a partition by destination ownership.
    ///
    /// # Arguments
    /// * `conn` - The connectivity to partition.
    /// * `big_chunks` - The amount of parallel tasks.
    /// * `phases` - The amount of sequential phases.
    ///
    /// # Returns
    /// A new `PartitionPlan`. Connections must be reordered with [`PartitionPlan::permute`]
    /// before the partition is used.
    pub fn by_destination(
        conn: &Connectivity<'_>,
        big_chunks: NonZeroUsize,
        phases: NonZeroUsize,
    ) -> Self {
        let (nbig, nphases) = (big_chunks.get(), phases.get());
        let owner = |i: usize| conn.destination(i) % nbig;

        let mut order: Vec<usize> = (0..conn.len()).collect();
        order.par_sort_by_key(|&i| owner(i));

        let mut counts = vec![0; nbig];
        for i in 0..conn.len() {
            counts[owner(i)] += 1;
        }

        let mut bounds = Array2::zeros((nbig, nphases + 1));
        let mut start = 0;
        for (k, &count) in counts.iter().enumerate() {
            for j in 0..=nphases {
                bounds[[k, j]] = start + count * j / nphases;
            }
            start += count;
        }

        Self { order, bounds }
    }

    /// The original position of each connection in planned order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn partition(&self) -> ChunkPartition<'_> {
        ChunkPartition {
            bounds: CowArray::from(self.bounds.view()),
            nconnections: self.order.len(),
        }
    }

    /// Reorders a per-connection sequence into planned order.
    ///
    /// # Arguments
    /// * `values` - One value per connection, in original order.
    ///
    /// # Returns
    /// The reordered values or a `SizeMismatch` error if `values` isn't one per connection.
    pub fn permute<T: Copy>(&self, values: &[T]) -> Result<Vec<T>> {
        if values.len() != self.order.len() {
            return Err(KernelErr::SizeMismatch {
                a: "values",
                b: "connections",
                got: values.len(),
                expected: self.order.len(),
            });
        }

        Ok(self.order.iter().map(|&i| values[i]).collect())
    }
}
