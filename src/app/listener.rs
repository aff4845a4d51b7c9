//! Polling listener that feeds `GameRecorded` events to the reward pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::{AppError, ChainEvent, GameEventSource};

use super::service::{HandleOutcome, RewardService};

/// Configuration for the event listener
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub poll_interval: Duration,
    /// Largest block window requested per `eth_getLogs` call
    pub max_block_range: u64,
    /// First block to scan; the chain head at startup when unset
    pub start_block: Option<u64>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(4_000),
            max_block_range: 2_000,
            start_block: None,
        }
    }
}

/// Counters for one polling pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub events: usize,
    pub minted: usize,
    pub failed: usize,
}

/// Scans the registry for new events and hands them to the [`RewardService`]
/// one at a time, in chain order.
pub struct EventListener {
    source: Arc<dyn GameEventSource>,
    service: Arc<RewardService>,
    config: ListenerConfig,
    /// Next block to scan
    cursor: Option<u64>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl EventListener {
    #[must_use]
    pub fn new(
        source: Arc<dyn GameEventSource>,
        service: Arc<RewardService>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            source,
            service,
            cursor: config.start_block,
            config,
            shutdown: None,
        }
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    fn stopping(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Scan every block between the cursor and the chain head.
    ///
    /// The cursor only moves past a window once all of its events were
    /// handled, so an RPC failure or a shutdown replays the window on the
    /// next pass and the dedup store absorbs the repeats.
    pub async fn poll_once(&mut self) -> Result<PollSummary, AppError> {
        let latest = self.source.latest_block().await?;
        let mut cursor = match self.cursor {
            Some(cursor) => cursor,
            None => {
                info!(block = latest, "Listening from chain head");
                self.cursor = Some(latest);
                latest
            }
        };

        let mut summary = PollSummary::default();
        let range = self.config.max_block_range.max(1);

        while cursor <= latest {
            let to = cursor.saturating_add(range - 1).min(latest);
            let events = self.source.game_events(cursor, to).await?;
            debug!(from = cursor, to, count = events.len(), "Fetched GameRecorded logs");

            for event in &events {
                if self.stopping() {
                    return Ok(summary);
                }
                summary.events += 1;
                match self.dispatch(event).await {
                    HandleOutcome::Minted { .. } => summary.minted += 1,
                    HandleOutcome::Failed { .. } => summary.failed += 1,
                    HandleOutcome::SkippedLoss | HandleOutcome::SkippedDuplicate => {}
                }
            }

            cursor = to + 1;
            self.cursor = Some(cursor);
        }

        Ok(summary)
    }

    async fn dispatch(&self, event: &ChainEvent) -> HandleOutcome {
        info!(
            player = ?event.game.player,
            victory = event.game.victory,
            streak = event.game.streak,
            total_wins = event.game.total_wins,
            block = ?event.location.block_number,
            "GameRecorded received"
        );
        self.service
            .handle_game_recorded(&event.game, &event.location)
            .await
    }

    /// Poll until shutdown is signalled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        self.shutdown = Some(shutdown_rx.clone());
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_block_range = self.config.max_block_range,
            start_block = ?self.cursor,
            "Event listener started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(summary) if summary.events > 0 => {
                            info!(
                                events = summary.events,
                                minted = summary.minted,
                                failed = summary.failed,
                                cursor = ?self.cursor,
                                "Poll complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, cursor = ?self.cursor, "Polling failed, retrying next tick");
                        }
                    }
                    if self.stopping() {
                        break;
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!(cursor = ?self.cursor, "Event listener stopped");
    }
}

/// Spawn the listener loop.
///
/// Returns the task handle and a shutdown sender; sending `true` stops the
/// loop after the event being handled.
pub fn spawn_listener(listener: EventListener) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(listener.run(shutdown_rx));
    (handle, shutdown_tx)
}
