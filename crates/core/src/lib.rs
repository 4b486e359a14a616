use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display, str::FromStr};
use thiserror::Error;

pub mod backoff;
pub mod builtin;
pub mod config;
pub mod probe;
pub mod reconcile;

mod notify;

/// The height of a block (a.k.a. block number)
pub type BlockHeight = u64;

/// The key under which the surrounding system tracks a pending tx
pub type LocalId = String;

pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub use notify::*;
pub use probe::{ProbeOutcome, Prober};
pub use reconcile::{Disposition, MonitorError, Reconciler, SweepError, SweepReport};

#[derive(Debug, Error, PartialEq)]
pub enum TxHashError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte transaction hash as assigned by the network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = TxHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)?;
        let len = bytes.len();

        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TxHashError::InvalidLength(len))?;

        Ok(Self(bytes))
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = String::deserialize(deserializer)?;
        repr.parse().map_err(serde::de::Error::custom)
    }
}

/// A tx that was broadcast by the client but hasn't been reconciled yet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub local_id: LocalId,
    pub tx_hash: TxHash,

    /// Chain height observed when the tx was broadcast
    #[serde(default)]
    pub submitted_block: Option<BlockHeight>,

    #[serde(default)]
    pub submitted_at: Option<Timestamp>,
}

impl PendingTx {
    pub fn new(local_id: impl Into<LocalId>, tx_hash: TxHash) -> Self {
        Self {
            local_id: local_id.into(),
            tx_hash,
            submitted_block: None,
            submitted_at: None,
        }
    }

    pub fn with_submitted_block(self, block: BlockHeight) -> Self {
        Self {
            submitted_block: Some(block),
            ..self
        }
    }

    pub fn with_submitted_at(self, at: Timestamp) -> Self {
        Self {
            submitted_at: Some(at),
            ..self
        }
    }
}

pub type PendingSet = BTreeMap<LocalId, PendingTx>;

/// The parts of a tx receipt that matter for finality
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<BlockHeight>,

    /// Execution status, `None` for receipts that predate the status field
    pub status: Option<bool>,
}

impl Receipt {
    pub fn reverted(&self) -> bool {
        self.status == Some(false)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn transport(error: impl Display) -> Self {
        Self::Transport(error.to_string())
    }

    pub fn decode(error: impl Display) -> Self {
        Self::Decode(error.to_string())
    }

    /// Whether a later attempt against the same node could succeed.
    ///
    /// JSON-RPC reserves -32000..=-32099 for implementation-defined server
    /// errors (rate limits, lagging backends, missing headers); anything
    /// else means the request itself is wrong.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rpc { code, .. } => (-32099..=-32000).contains(code),
            Self::Decode(_) => false,
        }
    }
}

/// Read-only view of a blockchain node
#[trait_variant::make(Send)]
pub trait ChainClient: Clone + Send + Sync + 'static {
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError>;

    async fn block_height(&self) -> Result<BlockHeight, ChainError>;
}

#[derive(Debug, Error)]
pub enum PendingError {
    #[error("internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid record for {0}: {1}")]
    InvalidRecord(LocalId, String),
}

/// Where the surrounding system keeps its pending txs.
///
/// Implementations must make `remove` atomic per key and idempotent:
/// removing an absent id returns `Ok(false)`.
pub trait PendingStore: Clone + Send + Sync + 'static {
    fn read_all(&self) -> Result<PendingSet, PendingError>;

    fn get(&self, local_id: &str) -> Result<Option<PendingTx>, PendingError>;

    fn insert(&self, tx: PendingTx) -> Result<(), PendingError>;

    fn remove(&self, local_id: &str) -> Result<bool, PendingError>;
}

/// Fire-and-forget delivery of user-facing signals
pub trait NotificationSink: Clone + Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}
