// Poll Interval Policy (client backpressure)

use crate::application::constants::{
    DEFAULT_FAST_POLL_INTERVAL_MS, DEFAULT_FAST_POLL_THRESHOLD, DEFAULT_MIN_POLL_INTERVAL_MS,
    DEFAULT_SLOW_POLL_INTERVAL_MS,
};
use crate::domain::{QueueStatus, QueueToken};
use serde::{Deserialize, Serialize};

/// Decides how often a client should re-check its status
pub trait PollIntervalPolicy: Send + Sync {
    fn recommended_interval_ms(&self, token: &QueueToken) -> u64;

    /// Floor the client must respect
    fn min_interval_ms(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub fast_interval_ms: u64,
    pub slow_interval_ms: u64,
    /// Positions at or below this poll fast
    pub fast_threshold: u64,
    pub min_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: DEFAULT_FAST_POLL_INTERVAL_MS,
            slow_interval_ms: DEFAULT_SLOW_POLL_INTERVAL_MS,
            fast_threshold: DEFAULT_FAST_POLL_THRESHOLD,
            min_interval_ms: DEFAULT_MIN_POLL_INTERVAL_MS,
        }
    }
}

/// Fast near the front of the line (or once admitted), slow further back
#[derive(Debug, Clone, Default)]
pub struct PositionThresholdPolicy {
    config: PollingConfig,
}

impl PositionThresholdPolicy {
    pub fn new(config: PollingConfig) -> Self {
        Self { config }
    }
}

impl PollIntervalPolicy for PositionThresholdPolicy {
    fn recommended_interval_ms(&self, token: &QueueToken) -> u64 {
        let interval = match token.status {
            QueueStatus::Ready | QueueStatus::Active => self.config.fast_interval_ms,
            QueueStatus::Waiting => match token.position {
                Some(position) if position <= self.config.fast_threshold => {
                    self.config.fast_interval_ms
                }
                _ => self.config.slow_interval_ms,
            },
            QueueStatus::Expired | QueueStatus::NotFound => self.config.slow_interval_ms,
        };
        interval.max(self.config.min_interval_ms)
    }

    fn min_interval_ms(&self) -> u64 {
        self.config.min_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let policy = PositionThresholdPolicy::default();
        let at = QueueToken::waiting("C1", "U1", 1_000);
        let past = QueueToken::waiting("C1", "U1", 1_001);
        assert_eq!(policy.recommended_interval_ms(&at), 3_000);
        assert_eq!(policy.recommended_interval_ms(&past), 10_000);
    }

    #[test]
    fn test_admitted_polls_fast() {
        let policy = PositionThresholdPolicy::default();
        let ready = QueueToken::ready("C1", "U1", "t", 0);
        assert_eq!(policy.recommended_interval_ms(&ready), 3_000);
        let gone = QueueToken::not_found("C1", "U1");
        assert_eq!(policy.recommended_interval_ms(&gone), 10_000);
    }

    #[test]
    fn test_never_below_minimum() {
        let policy = PositionThresholdPolicy::new(PollingConfig {
            fast_interval_ms: 200,
            slow_interval_ms: 500,
            fast_threshold: 10,
            min_interval_ms: 1_000,
        });
        let token = QueueToken::waiting("C1", "U1", 1);
        assert_eq!(policy.recommended_interval_ms(&token), 1_000);
        assert_eq!(policy.min_interval_ms(), 1_000);
    }
}
