use std::time::Duration;

use tidewatch_core::{backoff::RetrySchedule, BlockHeight, PendingTx, Receipt, TxHash};

pub mod chain;
pub mod faults;
pub mod http;
pub mod notify;

pub use chain::ScriptedChain;
pub use faults::{FaultyPending, TestFault};
pub use http::{serve_once, CapturedRequest};
pub use notify::RecordingNotifier;

/// Deterministic tx hash for a small sequence number
pub fn tx_sequence_to_hash(seq: u64) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&seq.to_be_bytes());
    TxHash::new(bytes)
}

pub fn make_pending_tx(local_id: &str, seq: u64) -> PendingTx {
    PendingTx::new(local_id, tx_sequence_to_hash(seq))
}

pub fn success_receipt(hash: TxHash, block: BlockHeight) -> Receipt {
    Receipt {
        tx_hash: hash,
        block_number: Some(block),
        status: Some(true),
    }
}

pub fn reverted_receipt(hash: TxHash, block: BlockHeight) -> Receipt {
    Receipt {
        tx_hash: hash,
        block_number: Some(block),
        status: Some(false),
    }
}

/// The default doubling schedule, starting at one second.
pub fn quick_schedule(max_attempts: u32) -> RetrySchedule {
    RetrySchedule {
        initial_delay: Duration::from_secs(1),
        max_attempts,
        ..Default::default()
    }
}
