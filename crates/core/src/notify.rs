use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::*;

/// Why a pending tx was given up on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Mined, but execution reverted
    Reverted,

    /// The finality window closed without the tx being included
    NotMined,

    /// The retry budget ran out while the outcome was still undetermined
    Exhausted { attempts: u32 },
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reverted => write!(f, "execution reverted"),
            Self::NotMined => write!(f, "not mined within window"),
            Self::Exhausted { attempts } => {
                write!(f, "still unresolved after {attempts} attempts")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TxPendingFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub local_id: LocalId,
    pub tx_hash: TxHash,
    pub reason: FailureReason,
    pub at: Timestamp,
}

impl Notification {
    pub fn tx_pending_failed(local_id: &str, tx_hash: TxHash, reason: FailureReason) -> Self {
        Self {
            kind: NotificationKind::TxPendingFailed,
            local_id: local_id.to_owned(),
            tx_hash,
            reason,
            at: chrono::Utc::now(),
        }
    }
}
