//! Reward pipeline: loss filter, deduplication, retried mint, bookkeeping.

use std::sync::Arc;

use ethers::types::U256;
use tracing::{debug, error, info, instrument};

use crate::domain::{
    AppError, EventLocation, EventStore, GameRecorded, ProcessedEventMetadata, RewardToken,
};

use super::metrics::RelayerMetrics;
use super::retry::RetryPolicy;

/// What happened to one `GameRecorded` event
#[derive(Debug)]
pub enum HandleOutcome {
    /// The game was lost; nothing to reward
    SkippedLoss,
    /// The event was already rewarded
    SkippedDuplicate,
    Minted { tx_hash: String, attempts: u32 },
    /// Every attempt failed; the event stays unprocessed
    Failed { attempts: u32, error: AppError },
}

impl HandleOutcome {
    #[must_use]
    pub fn is_minted(&self) -> bool {
        matches!(self, Self::Minted { .. })
    }
}

/// Mints one reward per victorious event, exactly once per event occurrence
pub struct RewardService {
    store: Arc<dyn EventStore>,
    token: Arc<dyn RewardToken>,
    metrics: Arc<RelayerMetrics>,
    reward_per_win: U256,
    retry: RetryPolicy,
}

impl RewardService {
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        token: Arc<dyn RewardToken>,
        metrics: Arc<RelayerMetrics>,
        reward_per_win: U256,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            token,
            metrics,
            reward_per_win,
            retry,
        }
    }

    /// Handle one `GameRecorded` event.
    ///
    /// Never returns an error: remote failures end up in
    /// [`HandleOutcome::Failed`] and local persistence failures are logged.
    #[instrument(skip(self, game), fields(player = ?game.player, key = %location.key()))]
    pub async fn handle_game_recorded(
        &self,
        game: &GameRecorded,
        location: &EventLocation,
    ) -> HandleOutcome {
        if !game.victory {
            debug!("Skipping loss");
            return HandleOutcome::SkippedLoss;
        }

        let key = location.key();
        if self.store.has_processed(&key) {
            info!("Skipping already processed event");
            return HandleOutcome::SkippedDuplicate;
        }

        self.metrics.record_queued();

        let outcome = self
            .retry
            .execute(
                |attempt| self.mint_once(game, attempt),
                |_, error| self.metrics.record_failed(error),
            )
            .await;

        let attempts = outcome.attempts();
        match outcome.into_result() {
            Ok(tx_hash) => {
                if let Err(e) = self
                    .store
                    .mark_processed(key.clone(), ProcessedEventMetadata::with_tx_hash(&tx_hash))
                    .await
                {
                    // The mint already landed, so this is logged and not retried
                    error!(tx_hash = %tx_hash, error = %e, "Failed to record processed event");
                }
                self.metrics.record_succeeded();
                HandleOutcome::Minted { tx_hash, attempts }
            }
            Err(error) => {
                error!(attempts, error = %error, "Mint failed permanently");
                HandleOutcome::Failed { attempts, error }
            }
        }
    }

    async fn mint_once(&self, game: &GameRecorded, attempt: u32) -> Result<String, AppError> {
        info!(streak = game.streak, attempt, "Minting reward");
        let tx_hash = self
            .token
            .submit_mint(game.player, self.reward_per_win)
            .await?;
        info!(tx_hash = %tx_hash, "Mint transaction submitted");

        let block = self.token.wait_for_confirmation(&tx_hash).await?;
        info!(tx_hash = %tx_hash, block, "Reward confirmed");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockchainError, RelayerStatus};
    use crate::test_utils::{MemoryEventStore, MockRewardToken};
    use ethers::types::Address;
    use std::time::Duration;

    fn player() -> Address {
        "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap()
    }

    struct Harness {
        service: RewardService,
        store: Arc<MemoryEventStore>,
        token: Arc<MockRewardToken>,
        metrics: Arc<RelayerMetrics>,
    }

    fn harness(token: MockRewardToken, max_attempts: u32) -> Harness {
        let store = Arc::new(MemoryEventStore::new());
        let token = Arc::new(token);
        let metrics = Arc::new(RelayerMetrics::new(None));
        let service = RewardService::new(
            store.clone(),
            token.clone(),
            Arc::clone(&metrics),
            U256::from(10u64),
            RetryPolicy::new(max_attempts, Duration::ZERO),
        );
        Harness {
            service,
            store,
            token,
            metrics,
        }
    }

    #[tokio::test]
    async fn test_victory_is_minted_once() {
        let h = harness(MockRewardToken::new().with_tx_hashes(["0xmint"]), 3);
        let game = GameRecorded::victory(player());
        let location = EventLocation::new("0xaaa", 2);

        let first = h.service.handle_game_recorded(&game, &location).await;
        let second = h.service.handle_game_recorded(&game, &location).await;

        assert!(matches!(first, HandleOutcome::Minted { ref tx_hash, attempts: 1 } if tx_hash == "0xmint"));
        assert!(matches!(second, HandleOutcome::SkippedDuplicate));
        assert_eq!(h.token.mints(), vec![(player(), U256::from(10u64))]);
        assert_eq!(
            h.store.metadata(&"0xaaa:2".into()).unwrap().tx_hash.as_deref(),
            Some("0xmint")
        );

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.total_minted, 1);
        assert_eq!(snapshot.queue_depth, 0);
        assert_eq!(snapshot.status, RelayerStatus::Idle);
    }

    #[tokio::test]
    async fn test_loss_touches_nothing() {
        let h = harness(MockRewardToken::new(), 3);
        let outcome = h
            .service
            .handle_game_recorded(&GameRecorded::loss(player()), &EventLocation::new("0xbbb", 0))
            .await;

        assert!(matches!(outcome, HandleOutcome::SkippedLoss));
        assert_eq!(h.token.submit_calls(), 0);
        assert!(h.store.is_empty());
        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 0);
        assert!(snapshot.last_victory_at.is_none());
    }

    #[tokio::test]
    async fn test_retry_after_transient_failure() {
        let token = MockRewardToken::new().with_tx_hashes(["0xdef"]);
        token.fail_next_submit("nonce too low");
        let h = harness(token, 3);

        let outcome = h
            .service
            .handle_game_recorded(&GameRecorded::victory(player()), &EventLocation::new("0xabc", 0))
            .await;

        assert!(matches!(outcome, HandleOutcome::Minted { ref tx_hash, attempts: 2 } if tx_hash == "0xdef"));
        assert!(h.store.has_processed(&"0xabc:0".into()));

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.total_minted, 1);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.queue_depth, 0);
        assert_eq!(snapshot.last_error_message.as_deref(), Some("nonce too low"));
    }

    #[tokio::test]
    async fn test_confirmation_failure_is_retried() {
        let token = MockRewardToken::new();
        token.fail_next_confirmation("receipt timeout");
        let h = harness(token, 3);

        let outcome = h
            .service
            .handle_game_recorded(&GameRecorded::victory(player()), &EventLocation::new("0xccc", 1))
            .await;

        assert!(outcome.is_minted());
        assert_eq!(h.token.submit_calls(), 2);
        assert_eq!(h.metrics.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_leaves_event_unprocessed() {
        let h = harness(MockRewardToken::failing("gas estimation failed"), 3);

        let outcome = h
            .service
            .handle_game_recorded(&GameRecorded::victory(player()), &EventLocation::new("0xddd", 0))
            .await;

        match outcome {
            HandleOutcome::Failed { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    error,
                    AppError::Blockchain(BlockchainError::Permanent { attempts: 3, ref message })
                        if message == "gas estimation failed"
                ));
                assert_eq!(
                    error.to_string(),
                    "Blockchain error: Permanent remote failure after 3 attempt(s): gas estimation failed"
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!h.store.has_processed(&"0xddd:0".into()));
        assert_eq!(h.token.submit_calls(), 3);

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.failure_count, 3);
        assert_eq!(snapshot.queue_depth, 1);
        assert_eq!(snapshot.status, RelayerStatus::Degraded);
    }

    #[tokio::test]
    async fn test_store_write_failure_still_counts_mint() {
        let h = harness(MockRewardToken::new(), 3);
        h.store.set_fail_writes(true);

        let outcome = h
            .service
            .handle_game_recorded(&GameRecorded::victory(player()), &EventLocation::new("0xeee", 0))
            .await;

        assert!(outcome.is_minted());
        assert_eq!(h.token.submit_calls(), 1);
        assert!(h.store.has_processed(&"0xeee:0".into()));
        assert_eq!(h.metrics.snapshot().total_minted, 1);
    }
}
