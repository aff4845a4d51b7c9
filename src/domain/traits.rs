//! Domain traits defining contracts for external systems.

use std::path::Path;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use super::error::AppError;
use super::types::{ChainEvent, ProcessedEventKey, ProcessedEventMetadata};

/// Durable record of which events already produced their side effect
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Pure lookup, never fails
    fn has_processed(&self, key: &ProcessedEventKey) -> bool;

    /// Record a key as handled. Calling twice overwrites the metadata.
    ///
    /// The in-memory view is updated even when the durable write fails;
    /// the error then only reports the lost durability.
    async fn mark_processed(
        &self,
        key: ProcessedEventKey,
        metadata: ProcessedEventMetadata,
    ) -> Result<(), AppError>;

    /// Number of processed events currently known
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing file, if any
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Reward token able to mint to players
#[async_trait]
pub trait RewardToken: Send + Sync {
    /// Submit a mint transaction and return its hash without waiting for it
    async fn submit_mint(&self, player: Address, amount: U256) -> Result<String, AppError>;

    /// Wait until the transaction is mined; returns the block number
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<u64, AppError>;

    /// Address that signs the mint transactions
    fn operator_address(&self) -> Option<Address> {
        None
    }
}

/// Source of `GameRecorded` events
#[async_trait]
pub trait GameEventSource: Send + Sync {
    /// Current chain head
    async fn latest_block(&self) -> Result<u64, AppError>;

    /// Events emitted in the inclusive block range, ordered by block and log index
    async fn game_events(&self, from_block: u64, to_block: u64)
    -> Result<Vec<ChainEvent>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopStore;

    #[async_trait]
    impl EventStore for NoopStore {
        fn has_processed(&self, _key: &ProcessedEventKey) -> bool {
            false
        }

        async fn mark_processed(
            &self,
            _key: ProcessedEventKey,
            _metadata: ProcessedEventMetadata,
        ) -> Result<(), AppError> {
            Ok(())
        }

        fn len(&self) -> usize {
            0
        }
    }

    struct NoopToken;

    #[async_trait]
    impl RewardToken for NoopToken {
        async fn submit_mint(&self, _player: Address, _amount: U256) -> Result<String, AppError> {
            Ok("0x01".to_string())
        }

        async fn wait_for_confirmation(&self, _tx_hash: &str) -> Result<u64, AppError> {
            Ok(1)
        }
    }

    #[test]
    fn test_store_defaults() {
        let store = NoopStore;
        assert!(store.is_empty());
        assert!(store.path().is_none());
    }

    #[test]
    fn test_token_operator_default() {
        assert!(NoopToken.operator_address().is_none());
    }
}
