//! Waitline Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    EnterResponse, PaymentCompleted, QueueKeyRequest, RemoveResponse, ResourcesResponse,
    StatusEvent, StatusResponse, TokenResponse, ValidateRequest, ValidateResponse,
};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Waitline Client
///
/// Plain calls go over HTTP; [`WaitlineClient::subscribe_status`] opens a
/// WebSocket to the same host and port.
///
/// # Example
///
/// ```no_run
/// use waitline_sdk::WaitlineClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = WaitlineClient::connect("http://127.0.0.1:9630").await?;
/// let status = client.status("concert-1", "user-42").await?;
/// println!("{:?}", status.token.status);
/// # Ok(())
/// # }
/// ```
pub struct WaitlineClient {
    http: HttpClient,
    ws_url: String,
}

impl WaitlineClient {
    /// Connect to the Waitline daemon
    ///
    /// * `url` - RPC endpoint URL (e.g., `http://127.0.0.1:9630`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let http = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            http,
            ws_url: ws_url(url),
        })
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: &P) -> Result<R> {
        let response = self.http.request(method, object_params(params)?).await?;
        Ok(response)
    }

    /// Join the wait line (idempotent)
    pub async fn enter(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<EnterResponse> {
        self.call("queue.enter.v1", &key(resource_id, user_id)).await
    }

    /// Current status plus the server's polling hints
    pub async fn status(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<StatusResponse> {
        self.call("queue.status.v1", &key(resource_id, user_id)).await
    }

    /// READY -> ACTIVE once the booking page opens
    pub async fn activate(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<TokenResponse> {
        self.call("queue.activate.v1", &key(resource_id, user_id)).await
    }

    pub async fn extend(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<TokenResponse> {
        self.call("queue.extend.v1", &key(resource_id, user_id)).await
    }

    /// Check a token presented with a booking request
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use waitline_sdk::WaitlineClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = WaitlineClient::connect("http://127.0.0.1:9630").await?;
    /// match client.validate("concert-1", "user-42", "token-from-client").await {
    ///     Ok(v) => assert!(v.valid),
    ///     Err(e) => println!("rejected: {} (code {:?})", e, e.code()),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn validate(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<ValidateResponse> {
        let request = ValidateRequest {
            resource_id: resource_id.into(),
            user_id: user_id.into(),
            token: token.into(),
        };
        self.call("queue.validate.v1", &request).await
    }

    pub async fn remove(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<RemoveResponse> {
        self.call("queue.remove.v1", &key(resource_id, user_id)).await
    }

    /// Notify the queue that a booking settled
    pub async fn payment_completed(&self, event: &PaymentCompleted) -> Result<RemoveResponse> {
        self.call("booking.payment_completed.v1", event).await
    }

    /// Resources with waiting or admitted users
    pub async fn resources(&self) -> Result<ResourcesResponse> {
        let response = self
            .http
            .request("admin.resources.v1", ObjectParams::new())
            .await?;
        Ok(response)
    }

    /// Open a status stream; it ends after a `ready` or `error` event
    pub async fn subscribe_status(
        &self,
        resource_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<StatusStream> {
        let ws = WsClientBuilder::default()
            .build(&self.ws_url)
            .await
            .map_err(|e| SdkError::Connection(format!("WebSocket connect failed: {}", e)))?;

        let subscription = ws
            .subscribe(
                "queue.subscribe.v1",
                object_params(&key(resource_id, user_id))?,
                "queue.unsubscribe.v1",
            )
            .await?;

        Ok(StatusStream {
            subscription,
            _client: ws,
        })
    }
}

/// Live status updates for one (resource, user)
pub struct StatusStream {
    subscription: Subscription<StatusEvent>,
    _client: WsClient,
}

impl StatusStream {
    /// Next event; `None` once the server closed the stream
    pub async fn next(&mut self) -> Option<Result<StatusEvent>> {
        self.subscription
            .next()
            .await
            .map(|event| event.map_err(SdkError::from))
    }

    /// Unsubscribe and close the socket
    pub async fn close(self) -> Result<()> {
        self.subscription.unsubscribe().await?;
        Ok(())
    }
}

fn key(resource_id: impl Into<String>, user_id: impl Into<String>) -> QueueKeyRequest {
    QueueKeyRequest {
        resource_id: resource_id.into(),
        user_id: user_id.into(),
    }
}

/// Send requests as named params
fn object_params<T: Serialize>(value: &T) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    if let serde_json::Value::Object(fields) = serde_json::to_value(value)? {
        for (name, field) in fields {
            params.insert(&name, field)?;
        }
    }
    Ok(params)
}

fn ws_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}
