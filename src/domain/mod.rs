//! Domain layer containing core types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, BlockchainError, ConfigError, PersistenceError};
pub use traits::{EventStore, GameEventSource, RewardToken};
pub use types::{
    ChainEvent, ErrorResponse, EventLocation, GameRecorded, HealthSnapshot, MetricsSnapshot,
    ProcessedEventKey, ProcessedEventMetadata, ProcessedEventRecord, RelayerStatus,
};
