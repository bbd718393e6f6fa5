// Application constants

/// Default promotion cadence (5s)
pub const DEFAULT_ADMISSION_INTERVAL_SECONDS: u64 = 5;

/// Cleanup runs once per this many admission intervals unless set explicitly
pub const CLEANUP_INTERVAL_MULTIPLIER: u32 = 12;

/// Resources processed in parallel within one scheduler tick
pub const DEFAULT_RESOURCE_CONCURRENCY: usize = 16;

/// Poll interval when the user is close to admission (3s)
pub const DEFAULT_FAST_POLL_INTERVAL_MS: u64 = 3_000;

/// Poll interval when the user is far back in line (10s)
pub const DEFAULT_SLOW_POLL_INTERVAL_MS: u64 = 10_000;

/// Positions at or below this use the fast interval
pub const DEFAULT_FAST_POLL_THRESHOLD: u64 = 1_000;

/// Floor for any client poll interval (1s)
pub const DEFAULT_MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Buffered events per delivery connection
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// Longest accepted resource or user id
pub const MAX_ID_LENGTH: usize = 64;
