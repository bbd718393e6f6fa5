// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod queue_store;
pub mod rate_limit_store;
pub mod time_provider;

// Re-exports
pub use id_provider::{IdProvider, UuidProvider};
pub use queue_store::{EnqueueOutcome, QueueStore};
pub use rate_limit_store::RateLimitStore;
pub use time_provider::{SystemTimeProvider, TimeProvider};
