//! EVM adapters for the registry and the reward token.

pub mod contracts;
pub mod registry;
pub mod token;

pub use registry::EthRegistryEventSource;
pub use token::{EthRewardToken, EthSigner};
