use ndarray::ArrayView1;
use rayon::prelude::*;

use crate::{KernelErr, Result};

/// Connections handed to a single rayon task while checking bounds.
const MIN_CONNECTIONS_PER_TASK: usize = 1 << 12;

/// The immutable description of which input element feeds which output element.
///
/// Connection `i` reads `input[sources[i]]` and accumulates into `output[destinations[i]]`.
/// Its weight slot is resolved by a [`WeightLayout`](crate::WeightLayout), not stored here.
#[derive(Debug, Clone, Copy)]
pub struct Connectivity<'a> {
    sources: &'a [usize],
    destinations: &'a [usize],
}

impl<'a> Connectivity<'a> {
    /// Creates a new `Connectivity` over two parallel index sequences.
    ///
    /// # Arguments
    /// * `sources` - The input index of each connection, must be unit stride.
    /// * `destinations` - The output index of each connection, must be unit stride.
    ///
    /// # Returns
    /// A new `Connectivity` or an error if either sequence is strided or their lengths differ.
    #[track_caller]
    pub fn new(
        sources: ArrayView1<'a, usize>,
        destinations: ArrayView1<'a, usize>,
    ) -> Result<Self> {
        let sources = unit_stride(sources, "sources")?;
        let destinations = unit_stride(destinations, "destinations")?;

        if sources.len() != destinations.len() {
            return Err(KernelErr::SizeMismatch {
                a: "destinations",
                b: "sources",
                got: destinations.len(),
                expected: sources.len(),
            });
        }

        Ok(Self {
            sources,
            destinations,
        })
    }

    /// Creates a new `Connectivity` from plain slices, which are unit stride by construction.
    pub fn from_slices(sources: &'a [usize], destinations: &'a [usize]) -> Result<Self> {
        Self::new(ArrayView1::from(sources), ArrayView1::from(destinations))
    }

    /// Returns the amount of connections.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The input index read by connection `i`.
    pub fn source(&self, i: usize) -> usize {
        self.sources[i]
    }

    /// The output index written by connection `i`.
    pub fn destination(&self, i: usize) -> usize {
        self.destinations[i]
    }

    pub fn sources(&self) -> &'a [usize] {
        self.sources
    }

    pub fn destinations(&self) -> &'a [usize] {
        self.destinations
    }

    /// Iterates the connections as `(source, destination)` pairs.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, usize)> {
        self.sources.iter().copied().zip(self.destinations.iter().copied())
    }

    /// Checks every connection reads inside the input and writes inside the output.
    ///
    /// # Arguments
    /// * `input_len` - The length of the vector indexed by sources.
    /// * `output_len` - The length of the vector indexed by destinations.
    ///
    /// # Returns
    /// An `IndexOutOfRange` error describing the first offending connection.
    pub fn check_bounds(&self, input_len: usize, output_len: usize) -> Result<()> {
        let bad = (0..self.len())
            .into_par_iter()
            .with_min_len(MIN_CONNECTIONS_PER_TASK)
            .find_first(|&i| self.sources[i] >= input_len || self.destinations[i] >= output_len);

        let Some(connection) = bad else {
            return Ok(());
        };

        let (what, index, len) = if self.sources[connection] >= input_len {
            ("source", self.sources[connection], input_len)
        } else {
            ("destination", self.destinations[connection], output_len)
        };

        Err(KernelErr::IndexOutOfRange {
            what,
            connection,
            index,
            len,
        })
    }
}

/// Borrows an index sequence as a slice, rejecting any stride other than one.
#[track_caller]
fn unit_stride<'a>(view: ArrayView1<'a, usize>, what: &'static str) -> Result<&'a [usize]> {
    let stride = view.strides()[0];
    if view.len() > 1 && stride != 1 {
        return Err(KernelErr::invalid_argument(
            what,
            format!("index sequences must be unit stride, got stride {stride}"),
        ));
    }

    view.to_slice()
        .ok_or_else(|| KernelErr::invalid_argument(what, "index sequence is not contiguous"))
}
