//! Waitline SDK - Rust Client Library
//!
//! Client for the Waitline daemon's JSON-RPC API.
//!
//! # Example
//!
//! ```no_run
//! use waitline_sdk::{StatusEvent, WaitlineClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WaitlineClient::connect("http://127.0.0.1:9630").await?;
//!
//!     let entry = client.enter("concert-1", "user-42").await?;
//!     println!("Position {} of {}", entry.position, entry.total_waiting);
//!
//!     let mut stream = client.subscribe_status("concert-1", "user-42").await?;
//!     while let Some(event) = stream.next().await {
//!         if let StatusEvent::Ready(snapshot) = event? {
//!             println!("Admitted with token {:?}", snapshot.token);
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{StatusStream, WaitlineClient};
pub use error::{Result, SdkError};
pub use types::{
    EnterResponse, PaymentCompleted, QueueStatus, RemoveResponse, ResourcesResponse,
    StatusError, StatusEvent, StatusResponse, TokenResponse, ValidateResponse,
};
