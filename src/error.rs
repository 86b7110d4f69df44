use std::{
    error::Error,
    fmt::{self, Display},
    panic::Location,
};

use crate::backend::BackendErr;

/// The result type used in the entire kernel.
pub type Result<T> = std::result::Result<T, KernelErr>;

/// The kernel's error type.
///
/// Every variant is raised before the output or gradient buffer is touched, so a failed call
/// leaves the caller's buffers as they were.
#[derive(Debug)]
pub enum KernelErr {
    InvalidArgument {
        what: &'static str,
        detail: String,
        location: &'static Location<'static>,
    },
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    IndexOutOfRange {
        what: &'static str,
        connection: usize,
        index: usize,
        len: usize,
    },
    PartitionCollision {
        phase: usize,
        destination: usize,
        first_chunk: usize,
        second_chunk: usize,
    },
    BackendFailure(BackendErr),
    ThreadPool(rayon::ThreadPoolBuildError),
    Config(serde_json::Error),
}

impl KernelErr {
    /// Builds an `InvalidArgument` error tagged with the caller's source location.
    ///
    /// # Arguments
    /// * `what` - The offending argument.
    /// * `detail` - A description of the violated precondition.
    ///
    /// # Returns
    /// A new `KernelErr::InvalidArgument`.
    #[track_caller]
    pub fn invalid_argument(what: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            what,
            detail: detail.into(),
            location: Location::caller(),
        }
    }
}

impl Display for KernelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelErr::InvalidArgument {
                what,
                detail,
                location,
            } => write!(
                f,
                "invalid argument `{what}`: {detail} (raised at {}:{})",
                location.file(),
                location.line()
            ),
            KernelErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            KernelErr::IndexOutOfRange {
                what,
                connection,
                index,
                len,
            } => write!(
                f,
                "connection {connection} has {what} index {index}, out of range for length {len}"
            ),
            KernelErr::PartitionCollision {
                phase,
                destination,
                first_chunk,
                second_chunk,
            } => write!(
                f,
                "big chunks {first_chunk} and {second_chunk} both write destination {destination} during phase {phase}"
            ),
            KernelErr::BackendFailure(e) => write!(f, "sparse backend failure: {e}"),
            KernelErr::ThreadPool(e) => write!(f, "failed to build worker pool: {e}"),
            KernelErr::Config(e) => write!(f, "invalid kernel configuration: {e}"),
        }
    }
}

impl Error for KernelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            KernelErr::BackendFailure(e) => Some(e),
            KernelErr::ThreadPool(e) => Some(e),
            KernelErr::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendErr> for KernelErr {
    fn from(value: BackendErr) -> Self {
        Self::BackendFailure(value)
    }
}

impl From<rayon::ThreadPoolBuildError> for KernelErr {
    fn from(value: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(value)
    }
}

impl From<serde_json::Error> for KernelErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}
