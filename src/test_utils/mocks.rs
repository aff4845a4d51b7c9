//! Mock implementations for testing.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::app::RelayerMetrics;
use crate::domain::{
    AppError, BlockchainError, ChainEvent, EventLocation, EventStore, GameEventSource,
    GameRecorded, PersistenceError, ProcessedEventKey, ProcessedEventMetadata, RewardToken,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn error(&self) -> AppError {
        let msg = self
            .error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string());
        AppError::Blockchain(BlockchainError::Transient(msg))
    }
}

/// Mock reward token with scripted failures and a mint log
pub struct MockRewardToken {
    config: MockConfig,
    submit_failures: Mutex<VecDeque<String>>,
    confirmation_failures: Mutex<VecDeque<String>>,
    tx_hashes: Mutex<VecDeque<String>>,
    mints: Mutex<Vec<(Address, U256)>>,
    confirmed: Mutex<Vec<String>>,
    submit_calls: AtomicU32,
}

impl MockRewardToken {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            submit_failures: Mutex::new(VecDeque::new()),
            confirmation_failures: Mutex::new(VecDeque::new()),
            tx_hashes: Mutex::new(VecDeque::new()),
            mints: Mutex::new(Vec::new()),
            confirmed: Mutex::new(Vec::new()),
            submit_calls: AtomicU32::new(0),
        }
    }

    /// Every submission fails with the given message
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Hashes handed out by successive successful submissions
    #[must_use]
    pub fn with_tx_hashes<I, S>(self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tx_hashes
            .lock()
            .unwrap()
            .extend(hashes.into_iter().map(Into::into));
        self
    }

    /// Queue a transient failure for the next submission
    pub fn fail_next_submit(&self, message: impl Into<String>) {
        self.submit_failures.lock().unwrap().push_back(message.into());
    }

    /// Queue a transient failure for the next confirmation wait
    pub fn fail_next_confirmation(&self, message: impl Into<String>) {
        self.confirmation_failures
            .lock()
            .unwrap()
            .push_back(message.into());
    }

    /// Successful submissions, in order
    pub fn mints(&self) -> Vec<(Address, U256)> {
        self.mints.lock().unwrap().clone()
    }

    /// Confirmed transaction hashes, in order
    pub fn confirmed(&self) -> Vec<String> {
        self.confirmed.lock().unwrap().clone()
    }

    /// Every submission, including failed ones
    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRewardToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RewardToken for MockRewardToken {
    async fn submit_mint(&self, player: Address, amount: U256) -> Result<String, AppError> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.should_fail {
            return Err(self.config.error());
        }
        if let Some(msg) = self.submit_failures.lock().unwrap().pop_front() {
            return Err(AppError::Blockchain(BlockchainError::Transient(msg)));
        }

        let hash = self
            .tx_hashes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("0xmint{}", call));
        self.mints.lock().unwrap().push((player, amount));
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<u64, AppError> {
        if let Some(msg) = self.confirmation_failures.lock().unwrap().pop_front() {
            return Err(AppError::Blockchain(BlockchainError::Transient(msg)));
        }
        let mut confirmed = self.confirmed.lock().unwrap();
        confirmed.push(tx_hash.to_string());
        Ok(confirmed.len() as u64)
    }
}

/// In-memory processed-event store
#[derive(Default)]
pub struct MemoryEventStore {
    records: Mutex<HashMap<ProcessedEventKey, ProcessedEventMetadata>>,
    fail_writes: AtomicBool,
}

impl MemoryEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mark_processed` report a write failure (the key is still recorded)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn metadata(&self, key: &ProcessedEventKey) -> Option<ProcessedEventMetadata> {
        self.records.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    fn has_processed(&self, key: &ProcessedEventKey) -> bool {
        self.records.lock().unwrap().contains_key(key)
    }

    async fn mark_processed(
        &self,
        key: ProcessedEventKey,
        metadata: ProcessedEventMetadata,
    ) -> Result<(), AppError> {
        self.records.lock().unwrap().insert(key, metadata);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(AppError::Persistence(PersistenceError::Write {
                path: "memory".to_string(),
                message: "disk full".to_string(),
            }));
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

/// Scripted chain event source
#[derive(Default)]
pub struct MockEventSource {
    latest_block: AtomicU64,
    events: Mutex<Vec<ChainEvent>>,
    pending_failures: AtomicU32,
    queries: Mutex<Vec<(u64, u64)>>,
}

impl MockEventSource {
    #[must_use]
    pub fn new(latest_block: u64) -> Self {
        let source = Self::default();
        source.set_latest_block(latest_block);
        source
    }

    pub fn set_latest_block(&self, block: u64) {
        self.latest_block.store(block, Ordering::SeqCst);
    }

    /// Add an event emitted at `block`
    pub fn push_event(&self, block: u64, game: GameRecorded, tx_hash: &str, log_index: u64) {
        let mut location = EventLocation::new(tx_hash, log_index);
        location.block_number = Some(block);
        self.events.lock().unwrap().push(ChainEvent { game, location });
    }

    /// Make the next `count` RPC calls fail
    pub fn fail_next_calls(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Block ranges requested so far
    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.queries.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        let failed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                "rpc unavailable".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GameEventSource for MockEventSource {
    async fn latest_block(&self) -> Result<u64, AppError> {
        self.check_should_fail()?;
        Ok(self.latest_block.load(Ordering::SeqCst))
    }

    async fn game_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, AppError> {
        self.check_should_fail()?;
        self.queries.lock().unwrap().push((from_block, to_block));

        let mut events: Vec<ChainEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| {
                event
                    .location
                    .block_number
                    .is_some_and(|block| block >= from_block && block <= to_block)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.location.block_number, event.location.log_index));
        Ok(events)
    }
}

/// Leave the metrics state poisoned, as if a writer had panicked mid-update
pub fn poison_metrics(metrics: &RelayerMetrics) {
    let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
        if let Ok(_guard) = metrics.state.lock() {
            panic!("metrics writer panicked");
        }
    }));
}
