//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP and WebSocket on one TCP port. The status
//! subscription is only reachable over WebSocket.

use crate::handler::RpcHandler;
use crate::types::{QueueKeyRequest, ValidateRequest};
use jsonrpsee::server::{PendingSubscriptionSink, Server, ServerHandle, SubscriptionMessage};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};
use waitline_core::application::PaymentCompletedEvent;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// Notification method carrying `StatusEvent`s to subscribers
pub const STATUS_NOTIFICATION: &str = "queue.status";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Start the JSON-RPC server; returns the bound address (useful with port 0)
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = build_module(self.handler)?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, handle))
    }
}

/// Register every queue method on a fresh module
pub fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, String> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module
        .register_async_method("queue.enter.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: QueueKeyRequest = params.parse()?;
                handler.enter(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("queue.status.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: QueueKeyRequest = params.parse()?;
                handler.status(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("queue.activate.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: QueueKeyRequest = params.parse()?;
                handler.activate(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("queue.extend.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: QueueKeyRequest = params.parse()?;
                handler.extend(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("queue.validate.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: ValidateRequest = params.parse()?;
                handler.validate(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    let h = handler.clone();
    module
        .register_async_method("queue.remove.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: QueueKeyRequest = params.parse()?;
                handler.remove(req).await
            }
        })
        .map_err(|e| e.to_string())?;

    // Booking collaborator
    let h = handler.clone();
    module
        .register_async_method("booking.payment_completed.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let event: PaymentCompletedEvent = params.parse()?;
                handler.payment_completed(event).await
            }
        })
        .map_err(|e| e.to_string())?;

    // Admin
    let h = handler.clone();
    module
        .register_async_method("admin.resources.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.resources().await }
        })
        .map_err(|e| e.to_string())?;

    let h = handler;
    module
        .register_subscription(
            "queue.subscribe.v1",
            STATUS_NOTIFICATION,
            "queue.unsubscribe.v1",
            move |params, pending, _, _| {
                let handler = h.clone();
                async move {
                    let req: QueueKeyRequest = match params.parse() {
                        Ok(req) => req,
                        Err(e) => {
                            pending.reject(e).await;
                            return Ok(());
                        }
                    };
                    let subscription = match handler.subscribe(req).await {
                        Ok(subscription) => subscription,
                        Err(e) => {
                            pending.reject(e).await;
                            return Ok(());
                        }
                    };
                    pipe_status_events(pending, subscription).await
                }
            },
        )
        .map_err(|e| e.to_string())?;

    Ok(module)
}

/// Forward streamer events to the client until either side finishes
async fn pipe_status_events(
    pending: PendingSubscriptionSink,
    subscription: waitline_core::application::StatusSubscription,
) -> jsonrpsee::core::SubscriptionResult {
    let id = subscription.id;
    let (mut events, cancel) = subscription.into_parts();
    let sink = match pending.accept().await {
        Ok(sink) => sink,
        Err(_) => {
            cancel.cancel();
            return Ok(());
        }
    };

    loop {
        tokio::select! {
            _ = sink.closed() => {
                debug!(id, "Subscriber disconnected");
                cancel.cancel();
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let msg = SubscriptionMessage::from_json(&event)?;
                if sink.send(msg).await.is_err() {
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    Ok(())
}
