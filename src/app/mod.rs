//! Application layer containing the reward pipeline and its supporting services.

pub mod health;
pub mod listener;
pub mod metrics;
pub mod retry;
pub mod service;
pub mod state;

pub use health::collect_health_snapshot;
pub use listener::{EventListener, ListenerConfig, PollSummary, spawn_listener};
pub use metrics::{RelayerMetrics, spawn_metrics_persister};
pub use retry::{DEFAULT_BACKOFF_MULTIPLIER, RetryOutcome, RetryPolicy};
pub use service::{HandleOutcome, RewardService};
pub use state::AppState;
