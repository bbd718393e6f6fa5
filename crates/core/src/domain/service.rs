// Queue Domain Service (pure admission rules)

use super::error::{DomainError, Result};
use super::queue::QueueConfig;
use super::token::{QueueStatus, QueueToken};
use crate::port::IdProvider;
use std::sync::Arc;

/// Admission, expiry and extension rules
///
/// No I/O; credentials come from the injected `IdProvider`.
#[derive(Clone)]
pub struct QueueDomainService {
    config: QueueConfig,
    id_provider: Arc<dyn IdProvider>,
}

impl QueueDomainService {
    pub fn new(config: QueueConfig, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            config,
            id_provider,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Unguessable session credential
    pub fn generate_token(&self) -> String {
        self.id_provider.generate_id()
    }

    pub fn ready_expiration(&self, now_millis: i64) -> i64 {
        now_millis + seconds_to_millis(self.config.ready_ttl_seconds)
    }

    pub fn active_expiration(&self, now_millis: i64) -> i64 {
        now_millis + seconds_to_millis(self.config.active_ttl_seconds)
    }

    /// Free admission slots given the current active count
    pub fn batch_size(&self, active_count: u64) -> u64 {
        self.config.active_max_size.saturating_sub(active_count)
    }

    pub fn has_active_capacity(&self, active_count: u64) -> bool {
        self.batch_size(active_count) > 0
    }

    pub fn can_extend(&self, token: &QueueToken) -> bool {
        token.status == QueueStatus::Active
            && token.extend_count.unwrap_or(0) < self.config.max_extension_count
    }

    /// Status first, then the extension bound
    pub fn validate_extension(&self, token: &QueueToken) -> Result<()> {
        if token.status != QueueStatus::Active {
            return Err(DomainError::invalid(
                &token.resource_id,
                &token.user_id,
                format!("only ACTIVE tokens can be extended (status={})", token.status),
            ));
        }

        if token.extend_count.unwrap_or(0) >= self.config.max_extension_count {
            return Err(DomainError::ExtensionLimitExceeded {
                resource_id: token.resource_id.clone(),
                user_id: token.user_id.clone(),
                max: self.config.max_extension_count,
            });
        }

        Ok(())
    }

    /// ceil(position / active_max_size * admission_interval / 60)
    pub fn estimated_wait_minutes(&self, position: u64) -> u64 {
        let numerator = position as u128 * self.config.admission_interval_seconds as u128;
        let denominator = self.config.active_max_size as u128 * 60;
        if denominator == 0 {
            return 0;
        }
        numerator.div_ceil(denominator) as u64
    }
}

fn seconds_to_millis(seconds: u64) -> i64 {
    i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::mocks::SequentialIdProvider;

    fn service(config: QueueConfig) -> QueueDomainService {
        QueueDomainService::new(config, Arc::new(SequentialIdProvider::new("tok")))
    }

    fn config(active_max_size: u64, max_extension_count: u32) -> QueueConfig {
        QueueConfig::new(active_max_size, 300, 600, max_extension_count, 5).unwrap()
    }

    #[test]
    fn test_expirations_add_ttl() {
        let svc = service(QueueConfig::default());
        assert_eq!(svc.ready_expiration(1_000), 301_000);
        assert_eq!(svc.active_expiration(1_000), 601_000);
    }

    #[test]
    fn test_batch_size_never_negative() {
        let svc = service(config(100, 2));
        assert_eq!(svc.batch_size(0), 100);
        assert_eq!(svc.batch_size(60), 40);
        assert_eq!(svc.batch_size(100), 0);
        assert_eq!(svc.batch_size(250), 0);
        assert!(svc.has_active_capacity(99));
        assert!(!svc.has_active_capacity(100));
    }

    #[test]
    fn test_validate_extension_checks_status_first() {
        let svc = service(config(10, 0));

        // READY with count >= max still reports invalid status
        let ready = QueueToken::ready("C1", "U1", "tok", 10);
        assert!(matches!(
            svc.validate_extension(&ready),
            Err(DomainError::TokenInvalid { .. })
        ));

        let active = QueueToken::active("C1", "U1", "tok", 10, 0);
        assert!(matches!(
            svc.validate_extension(&active),
            Err(DomainError::ExtensionLimitExceeded { max: 0, .. })
        ));
    }

    #[test]
    fn test_can_extend_until_limit() {
        let svc = service(config(10, 2));
        assert!(svc.can_extend(&QueueToken::active("C1", "U1", "t", 10, 0)));
        assert!(svc.can_extend(&QueueToken::active("C1", "U1", "t", 10, 1)));
        assert!(!svc.can_extend(&QueueToken::active("C1", "U1", "t", 10, 2)));
        assert!(!svc.can_extend(&QueueToken::ready("C1", "U1", "t", 10)));
        assert!(svc
            .validate_extension(&QueueToken::active("C1", "U1", "t", 10, 1))
            .is_ok());
    }

    #[test]
    fn test_estimated_wait_rounds_up() {
        // 50k per 5s tick: one tick drains a full batch
        let svc = service(QueueConfig::default());
        assert_eq!(svc.estimated_wait_minutes(0), 0);
        assert_eq!(svc.estimated_wait_minutes(1), 1);
        assert_eq!(svc.estimated_wait_minutes(600_000), 1);
        assert_eq!(svc.estimated_wait_minutes(600_001), 2);

        let small = service(QueueConfig::new(1, 300, 600, 2, 30).unwrap());
        assert_eq!(small.estimated_wait_minutes(4), 2);
    }

    #[test]
    fn test_generate_token_uses_provider() {
        let svc = service(QueueConfig::default());
        assert_eq!(svc.generate_token(), "tok-1");
        assert_eq!(svc.generate_token(), "tok-2");
    }
}
