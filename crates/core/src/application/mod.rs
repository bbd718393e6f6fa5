// Application Layer - Use Cases and Business Logic

pub mod admission;
pub mod constants;
pub mod delivery;
pub mod queue;
pub mod shutdown;

// Re-exports
pub use admission::{AdmissionScheduler, SchedulerConfig, TickReport};
pub use delivery::{
    PollIntervalPolicy, PollingConfig, PositionThresholdPolicy, StatusEvent, StatusSnapshot,
    StatusStreamer, StatusSubscription,
};
pub use queue::{PaymentCompletedEvent, QueueService};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
