//! Queue engine configuration

use std::time::Duration;
use visq_common::{Error, Result};

/// Configuration for a queue engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long a pulled message stays hidden before it is redelivered.
    /// Applies to every reservation made by the engine.
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Create a validated config with the given visibility timeout
    pub fn new(visibility_timeout: Duration) -> Result<Self> {
        let config = Self { visibility_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Set visibility timeout
    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    /// Reject a zero visibility timeout
    pub fn validate(&self) -> Result<()> {
        if self.visibility_timeout.is_zero() {
            return Err(Error::InvalidVisibilityTimeout(self.visibility_timeout));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_rejected() {
        assert_eq!(
            QueueConfig::new(Duration::ZERO),
            Err(Error::InvalidVisibilityTimeout(Duration::ZERO))
        );

        let config = QueueConfig::default().with_visibility_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_positive_timeout_accepted() {
        let config = QueueConfig::new(Duration::from_nanos(1)).unwrap();
        assert_eq!(config.visibility_timeout, Duration::from_nanos(1));
        assert!(QueueConfig::default().validate().is_ok());
    }
}
