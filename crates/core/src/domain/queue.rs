// Queue Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Resource identifier (one wait line per resource, e.g. a concert)
pub type ResourceId = String;

/// User identifier
pub type UserId = String;

/// Admission policy for every resource (immutable once built)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Concurrent READY + ACTIVE ceiling per resource
    pub active_max_size: u64,
    /// Lifetime of a READY token before the booking page must be opened
    pub ready_ttl_seconds: u64,
    /// Lifetime of an ACTIVE session before forced expiry
    pub active_ttl_seconds: u64,
    pub max_extension_count: u32,
    /// Scheduler cadence, also used for wait-time estimates
    pub admission_interval_seconds: u64,
}

impl QueueConfig {
    /// Build a validated config
    ///
    /// Every field must be positive except `max_extension_count`.
    pub fn new(
        active_max_size: u64,
        ready_ttl_seconds: u64,
        active_ttl_seconds: u64,
        max_extension_count: u32,
        admission_interval_seconds: u64,
    ) -> Result<Self> {
        let checks = [
            ("active_max_size", active_max_size),
            ("ready_ttl_seconds", ready_ttl_seconds),
            ("active_ttl_seconds", active_ttl_seconds),
            ("admission_interval_seconds", admission_interval_seconds),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(DomainError::InvalidConfig(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        Ok(Self {
            active_max_size,
            ready_ttl_seconds,
            active_ttl_seconds,
            max_extension_count,
            admission_interval_seconds,
        })
    }

    /// Re-run construction checks (for configs built via serde)
    pub fn validated(self) -> Result<Self> {
        Self::new(
            self.active_max_size,
            self.ready_ttl_seconds,
            self.active_ttl_seconds,
            self.max_extension_count,
            self.admission_interval_seconds,
        )
    }
}

impl Default for QueueConfig {
    /// Flash-sale defaults: 50k concurrent, READY 5 min, ACTIVE 10 min, 2 extensions, 5s ticks
    fn default() -> Self {
        Self {
            active_max_size: 50_000,
            ready_ttl_seconds: 300,
            active_ttl_seconds: 600,
            max_extension_count: 2,
            admission_interval_seconds: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_capacity() {
        let err = QueueConfig::new(0, 300, 600, 2, 5).unwrap_err();
        assert!(err.to_string().contains("active_max_size"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(QueueConfig::new(10, 300, 600, 2, 0).is_err());
    }

    #[test]
    fn test_allows_zero_extensions() {
        let config = QueueConfig::new(10, 300, 600, 0, 5).unwrap();
        assert_eq!(config.max_extension_count, 0);
    }

    #[test]
    fn test_default_is_valid() {
        assert!(QueueConfig::default().validated().is_ok());
    }
}
