// Queue Service - Client-facing queue use cases

pub mod activate;
pub mod enter;
pub mod extend;
pub mod payment_completed;
pub mod remove;
pub mod status;
pub mod validate;
pub mod validation;


pub use payment_completed::PaymentCompletedEvent;

use crate::domain::{QueueDomainService, QueuePosition, QueueToken};
use crate::error::Result;
use crate::port::{QueueStore, TimeProvider};
use std::sync::Arc;

/// Queue application service
///
/// Stateless apart from its injected ports; safe to share across tasks.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    domain: QueueDomainService,
    time_provider: Arc<dyn TimeProvider>,
}

impl QueueService {
    pub fn new(
        store: Arc<dyn QueueStore>,
        domain: QueueDomainService,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            domain,
            time_provider,
        }
    }

    pub fn domain(&self) -> &QueueDomainService {
        &self.domain
    }

    pub async fn enter(&self, resource_id: &str, user_id: &str) -> Result<QueuePosition> {
        enter::execute(
            self.store.as_ref(),
            &self.domain,
            self.time_provider.as_ref(),
            resource_id,
            user_id,
        )
        .await
    }

    pub async fn status(&self, resource_id: &str, user_id: &str) -> Result<QueueToken> {
        status::execute(
            self.store.as_ref(),
            self.time_provider.as_ref(),
            resource_id,
            user_id,
        )
        .await
    }

    pub async fn activate(&self, resource_id: &str, user_id: &str) -> Result<QueueToken> {
        activate::execute(
            self.store.as_ref(),
            &self.domain,
            self.time_provider.as_ref(),
            resource_id,
            user_id,
        )
        .await
    }

    pub async fn extend(&self, resource_id: &str, user_id: &str) -> Result<QueueToken> {
        extend::execute(
            self.store.as_ref(),
            &self.domain,
            self.time_provider.as_ref(),
            resource_id,
            user_id,
        )
        .await
    }

    pub async fn validate(
        &self,
        resource_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<QueueToken> {
        validate::execute(
            self.store.as_ref(),
            self.time_provider.as_ref(),
            resource_id,
            user_id,
            token,
        )
        .await
    }

    pub async fn remove(&self, resource_id: &str, user_id: &str) -> Result<bool> {
        remove::execute(self.store.as_ref(), resource_id, user_id).await
    }

    pub async fn handle_payment_completed(&self, event: &PaymentCompletedEvent) -> Result<bool> {
        payment_completed::execute(self.store.as_ref(), event).await
    }

    /// Resources that currently have waiting or admitted users
    pub async fn active_resources(&self) -> Result<Vec<String>> {
        self.store.list_resources_with_activity().await
    }
}
