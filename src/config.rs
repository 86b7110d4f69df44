use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{ForwardStrategy, Result};

/// Immutable execution settings for a [`ScatterKernel`](crate::ScatterKernel).
///
/// Every field is optional when deserializing, missing ones take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    strategy: ForwardStrategy,
    threads: Option<NonZeroUsize>,
    validate_partition: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            strategy: ForwardStrategy::default(),
            threads: None,
            validate_partition: cfg!(debug_assertions),
        }
    }
}

impl KernelConfig {
    /// Creates a new kernel configuration.
    ///
    /// # Args
    /// * `strategy` - The preferred forward strategy.
    ///
    /// # Returns
    /// A `KernelConfig` using the global rayon pool.
    pub fn new(strategy: ForwardStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// # Args
    /// * `raw` - A JSON object, e.g. `{"strategy": "sparse_mat_vec", "threads": 4}`.
    ///
    /// # Returns
    /// The parsed `KernelConfig` or a `Config` error.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Runs the kernel on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: NonZeroUsize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Whether to check the chunk partition for collisions before every direct scatter.
    pub fn with_partition_validation(mut self, validate: bool) -> Self {
        self.validate_partition = validate;
        self
    }

    pub fn strategy(&self) -> ForwardStrategy {
        self.strategy
    }

    /// Returns the size of the dedicated worker pool, `None` meaning the global rayon pool.
    pub fn threads(&self) -> Option<NonZeroUsize> {
        self.threads
    }

    pub fn validate_partition(&self) -> bool {
        self.validate_partition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KernelErr;

    #[test]
    fn test_from_json() {
        let config = KernelConfig::from_json(
            r#"{"strategy": "sparse_mat_vec", "threads": 3, "validate_partition": true}"#,
        )
        .unwrap();

        assert_eq!(config.strategy(), ForwardStrategy::SparseMatVec);
        assert_eq!(config.threads(), NonZeroUsize::new(3));
        assert!(config.validate_partition());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = KernelConfig::from_json("{}").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.strategy(), ForwardStrategy::DirectScatter);
        assert_eq!(config.threads(), None);
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = KernelConfig::from_json(r#"{"threads": 0}"#).unwrap_err();
        assert!(matches!(err, KernelErr::Config(_)));
    }
}
