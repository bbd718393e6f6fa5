//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the Waitline admission queue
//! (HTTP for calls, WebSocket for the status subscription).

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use jsonrpsee::server::ServerHandle;
pub use rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use server::{build_module, RpcServer, RpcServerConfig};
