//! Infrastructure layer implementations.

pub mod blockchain;
pub mod logging;
pub mod persist;
pub mod store;

pub use blockchain::{EthRegistryEventSource, EthRewardToken, EthSigner};
pub use logging::{LogConfig, LogFormat, RotatingFileWriter, init_tracing};
pub use store::JsonFileEventStore;
