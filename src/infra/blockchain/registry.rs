//! `GameRecorded` log source backed by an HTTP JSON-RPC provider.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::contract::LogMeta;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;
use tracing::debug;

use super::contracts::{GameRecordedFilter, WorbooRegistry};
use crate::domain::{AppError, BlockchainError, ChainEvent, EventLocation, GameEventSource};

/// Reads `GameRecorded` events from the registry contract
pub struct EthRegistryEventSource {
    provider: Arc<Provider<Http>>,
    registry: WorbooRegistry<Provider<Http>>,
}

impl EthRegistryEventSource {
    #[must_use]
    pub fn with_provider(provider: Arc<Provider<Http>>, registry_address: Address) -> Self {
        let registry = WorbooRegistry::new(registry_address, Arc::clone(&provider));
        Self { provider, registry }
    }

    pub fn address(&self) -> Address {
        self.registry.address()
    }
}

fn to_chain_event(event: GameRecordedFilter, meta: LogMeta) -> ChainEvent {
    let mut location = EventLocation::new(
        format!("{:#x}", meta.transaction_hash),
        meta.log_index.low_u64(),
    );
    location.block_number = Some(meta.block_number.as_u64());
    ChainEvent {
        game: event.into(),
        location,
    }
}

#[async_trait]
impl GameEventSource for EthRegistryEventSource {
    async fn latest_block(&self) -> Result<u64, AppError> {
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| BlockchainError::Connection(e.to_string()))?;
        Ok(block.as_u64())
    }

    async fn game_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, AppError> {
        let logs = self
            .registry
            .game_recorded_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await
            .map_err(|e| BlockchainError::Transient(e.to_string()))?;
        debug!(from_block, to_block, count = logs.len(), "Queried registry logs");

        let mut events: Vec<ChainEvent> = logs
            .into_iter()
            .map(|(event, meta)| to_chain_event(event, meta))
            .collect();
        events.sort_by_key(|e| (e.location.block_number, e.location.log_index));
        Ok(events)
    }
}
