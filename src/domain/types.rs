//! Domain types shared by the pipeline, the store and the health endpoint.

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifies one on-chain event occurrence as `{transactionHash}:{logIndex}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessedEventKey(String);

impl ProcessedEventKey {
    #[must_use]
    pub fn new(transaction_hash: &str, log_index: u64) -> Self {
        Self(format!("{}:{}", transaction_hash, log_index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProcessedEventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessedEventKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProcessedEventKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Auxiliary data stored alongside a processed event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEventMetadata {
    /// Hash of the mint transaction that fulfilled the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl ProcessedEventMetadata {
    #[must_use]
    pub fn with_tx_hash(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(tx_hash.into()),
        }
    }
}

/// One persisted entry of the processed-event store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEventRecord {
    pub key: ProcessedEventKey,
    #[serde(default)]
    pub metadata: ProcessedEventMetadata,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub processed_at: i64,
}

/// Derived health status of the relayer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RelayerStatus {
    /// No outstanding work
    #[default]
    Idle,
    /// Work queued, no failures recorded
    Processing,
    /// Work queued and at least one failure recorded
    Degraded,
    /// No metrics available to derive a status from
    Unknown,
}

impl RelayerStatus {
    /// Status as a pure function of the two counters.
    #[must_use]
    pub fn from_counters(queue_depth: u64, failure_count: u64) -> Self {
        match (queue_depth, failure_count) {
            (0, _) => Self::Idle,
            (_, 0) => Self::Processing,
            _ => Self::Degraded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Degraded => "degraded",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for RelayerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "processing" => Ok(Self::Processing),
            "degraded" => Ok(Self::Degraded),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid relayer status: {}", s)),
        }
    }
}

impl std::fmt::Display for RelayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Best-effort gauge of relayer activity, rewritten wholesale on each change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub queue_depth: u64,
    pub total_minted: u64,
    pub failure_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_victory_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mint_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    pub updated_at: i64,
    #[serde(default)]
    pub status: RelayerStatus,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn empty(now_ms: i64) -> Self {
        Self {
            queue_depth: 0,
            total_minted: 0,
            failure_count: 0,
            last_victory_at: None,
            last_mint_at: None,
            last_failure_at: None,
            last_error_message: None,
            updated_at: now_ms,
            status: RelayerStatus::Idle,
        }
    }

    /// Recompute the status from the counters.
    #[must_use]
    pub fn with_derived_status(mut self) -> Self {
        self.status = RelayerStatus::from_counters(self.queue_depth, self.failure_count);
        self
    }
}

/// Payload of the registry's `GameRecorded` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecorded {
    pub player: Address,
    pub day_id: u64,
    pub word_hash: H256,
    pub guesses: u8,
    pub victory: bool,
    pub streak: u64,
    pub total_games: u64,
    pub total_wins: u64,
}

impl GameRecorded {
    /// A victory with zeroed statistics, handy for tests and tooling.
    #[must_use]
    pub fn victory(player: Address) -> Self {
        Self {
            player,
            day_id: 0,
            word_hash: H256::zero(),
            guesses: 0,
            victory: true,
            streak: 0,
            total_games: 0,
            total_wins: 0,
        }
    }

    #[must_use]
    pub fn loss(player: Address) -> Self {
        Self {
            victory: false,
            ..Self::victory(player)
        }
    }
}

/// Where an event was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLocation {
    pub transaction_hash: String,
    pub log_index: u64,
    pub block_number: Option<u64>,
}

impl EventLocation {
    #[must_use]
    pub fn new(transaction_hash: impl Into<String>, log_index: u64) -> Self {
        Self {
            transaction_hash: transaction_hash.into(),
            log_index,
            block_number: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> ProcessedEventKey {
        ProcessedEventKey::new(&self.transaction_hash, self.log_index)
    }
}

/// An event as delivered by a chain event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    pub game: GameRecorded,
    pub location: EventLocation,
}

/// Health snapshot served on `/healthz` and printed by the status CLI
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Milliseconds since the Unix epoch when the snapshot was built
    pub timestamp: i64,
    pub status: RelayerStatus,
    pub queue_depth: u64,
    pub total_minted: u64,
    pub failure_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_victory_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mint_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    /// Number of events recorded in the processed-event store
    pub processed_events: usize,
    #[schema(example = ".cache/processed-events.json")]
    pub cache_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,
}

/// Error body returned by the health server
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "not_found")]
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
