use crate::{KernelErr, Result};

/// Maps a connection to the slot of the weight buffer it reads (or, for gradients, writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightLayout<'a> {
    /// Connection `i` uses slot `i * stride`. A stride of `0` ties every connection to slot `0`.
    Strided(usize),
    /// Connection `i` uses slot `map[i]`, any number of connections may share a slot.
    Indexed(&'a [usize]),
}

impl<'a> WeightLayout<'a> {
    /// One weight per connection, stored contiguously.
    pub const UNIT: WeightLayout<'static> = WeightLayout::Strided(1);

    /// Returns the slot used by connection `i`.
    #[inline]
    pub fn slot(&self, i: usize) -> usize {
        match *self {
            WeightLayout::Strided(stride) => i * stride,
            WeightLayout::Indexed(map) => map[i],
        }
    }

    /// Whether connection `i` uses slot `i`.
    pub fn is_unit(&self) -> bool {
        matches!(self, WeightLayout::Strided(1))
    }

    /// Checks every one of `nconnections` connections resolves to a slot inside a buffer of
    /// length `len`.
    ///
    /// # Arguments
    /// * `what` - The name of the buffer, used in the error.
    /// * `nconnections` - The amount of connections.
    /// * `len` - The length of the buffer.
    ///
    /// # Returns
    /// A `SizeMismatch` or `IndexOutOfRange` error if some connection falls outside the buffer.
    pub fn check(&self, what: &'static str, nconnections: usize, len: usize) -> Result<()> {
        match *self {
            WeightLayout::Strided(_) if nconnections == 0 => Ok(()),
            WeightLayout::Strided(stride) => {
                let required = (nconnections - 1)
                    .checked_mul(stride)
                    .and_then(|last| last.checked_add(1))
                    .unwrap_or(usize::MAX);

                if len < required {
                    return Err(KernelErr::SizeMismatch {
                        a: what,
                        b: "connections",
                        got: len,
                        expected: required,
                    });
                }
                Ok(())
            }
            WeightLayout::Indexed(map) => {
                if map.len() != nconnections {
                    return Err(KernelErr::SizeMismatch {
                        a: "weight index map",
                        b: "connections",
                        got: map.len(),
                        expected: nconnections,
                    });
                }

                match map.iter().position(|&slot| slot >= len) {
                    Some(connection) => Err(KernelErr::IndexOutOfRange {
                        what,
                        connection,
                        index: map[connection],
                        len,
                    }),
                    None => Ok(()),
                }
            }
        }
    }
}

/// A read-only weight buffer together with its layout.
#[derive(Debug, Clone, Copy)]
pub struct Weights<'a> {
    data: &'a [f64],
    layout: WeightLayout<'a>,
}

impl<'a> Weights<'a> {
    pub fn new(data: &'a [f64], layout: WeightLayout<'a>) -> Self {
        Self { data, layout }
    }

    /// One weight per connection.
    pub fn unit(data: &'a [f64]) -> Self {
        Self::new(data, WeightLayout::UNIT)
    }

    pub fn data(&self) -> &'a [f64] {
        self.data
    }

    pub fn layout(&self) -> WeightLayout<'a> {
        self.layout
    }

    /// The weight of connection `i`.
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.data[self.layout.slot(i)]
    }

    pub(crate) fn check(&self, nconnections: usize) -> Result<()> {
        self.layout.check("weights", nconnections, self.data.len())
    }
}

/// A weight-gradient buffer together with its layout. It is only ever accumulated into.
#[derive(Debug)]
pub struct WeightsMut<'a> {
    data: &'a mut [f64],
    layout: WeightLayout<'a>,
}

impl<'a> WeightsMut<'a> {
    pub fn new(data: &'a mut [f64], layout: WeightLayout<'a>) -> Self {
        Self { data, layout }
    }

    /// One gradient slot per connection.
    pub fn unit(data: &'a mut [f64]) -> Self {
        Self::new(data, WeightLayout::UNIT)
    }

    pub fn data(&self) -> &[f64] {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut *self.data
    }

    pub fn layout(&self) -> WeightLayout<'a> {
        self.layout
    }

    pub(crate) fn check(&self, nconnections: usize) -> Result<()> {
        self.layout
            .check("gradient weights", nconnections, self.data.len())
    }
}
