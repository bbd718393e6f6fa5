// Domain Layer - Pure business logic and entities

pub mod error;
pub mod position;
pub mod queue;
pub mod service;
pub mod token;

// Re-exports
pub use error::DomainError;
pub use position::QueuePosition;
pub use queue::{QueueConfig, ResourceId, UserId};
pub use service::QueueDomainService;
pub use token::{QueueStatus, QueueToken};
