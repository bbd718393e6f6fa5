//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the queue use cases.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::{RateLimitDecision, RateLimiter};
use crate::types::{
    EnterResponse, QueueKeyRequest, RemoveResponse, ResourcesResponse, StatusResponse,
    TokenResponse, ValidateRequest, ValidateResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::debug;
use waitline_core::application::{
    PaymentCompletedEvent, QueueService, StatusStreamer, StatusSubscription,
};

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: QueueService,
    streamer: Arc<StatusStreamer>,
    rate_limiter: RateLimiter,
}

impl RpcHandler {
    pub fn new(
        service: QueueService,
        streamer: Arc<StatusStreamer>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            service,
            streamer,
            rate_limiter,
        }
    }

    async fn guard(&self, resource_id: &str, user_id: &str) -> Result<(), ErrorObjectOwned> {
        match self.rate_limiter.check(resource_id, user_id).await {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Throttled {
                retry_after_seconds,
            } => {
                debug!(resource_id, user_id, "Request throttled");
                Err(throttled(retry_after_seconds))
            }
        }
    }

    /// queue.enter.v1
    pub async fn enter(&self, params: QueueKeyRequest) -> Result<EnterResponse, ErrorObjectOwned> {
        let position = self
            .service
            .enter(&params.resource_id, &params.user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(position.into())
    }

    /// queue.status.v1 (rate limited)
    pub async fn status(&self, params: QueueKeyRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        self.guard(&params.resource_id, &params.user_id).await?;

        let token = self
            .service
            .status(&params.resource_id, &params.user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(self.streamer.snapshot(token).into())
    }

    /// queue.activate.v1
    pub async fn activate(
        &self,
        params: QueueKeyRequest,
    ) -> Result<TokenResponse, ErrorObjectOwned> {
        let token = self
            .service
            .activate(&params.resource_id, &params.user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(token.into())
    }

    /// queue.extend.v1
    pub async fn extend(&self, params: QueueKeyRequest) -> Result<TokenResponse, ErrorObjectOwned> {
        let token = self
            .service
            .extend(&params.resource_id, &params.user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(token.into())
    }

    /// queue.validate.v1
    pub async fn validate(
        &self,
        params: ValidateRequest,
    ) -> Result<ValidateResponse, ErrorObjectOwned> {
        let token = self
            .service
            .validate(&params.resource_id, &params.user_id, &params.token)
            .await
            .map_err(to_rpc_error)?;

        Ok(ValidateResponse {
            valid: true,
            status: token.status,
            expires_at: token.expires_at,
        })
    }

    /// queue.remove.v1
    pub async fn remove(&self, params: QueueKeyRequest) -> Result<RemoveResponse, ErrorObjectOwned> {
        let removed = self
            .service
            .remove(&params.resource_id, &params.user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(RemoveResponse { removed })
    }

    /// booking.payment_completed.v1
    pub async fn payment_completed(
        &self,
        event: PaymentCompletedEvent,
    ) -> Result<RemoveResponse, ErrorObjectOwned> {
        let removed = self
            .service
            .handle_payment_completed(&event)
            .await
            .map_err(to_rpc_error)?;
        Ok(RemoveResponse { removed })
    }

    /// admin.resources.v1
    pub async fn resources(&self) -> Result<ResourcesResponse, ErrorObjectOwned> {
        let resource_ids = self
            .service
            .active_resources()
            .await
            .map_err(to_rpc_error)?;
        Ok(ResourcesResponse { resource_ids })
    }

    /// queue.subscribe.v1 (rate limited)
    pub async fn subscribe(
        &self,
        params: QueueKeyRequest,
    ) -> Result<StatusSubscription, ErrorObjectOwned> {
        self.guard(&params.resource_id, &params.user_id).await?;

        self.streamer
            .subscribe(&params.resource_id, &params.user_id)
            .map_err(to_rpc_error)
    }
}
