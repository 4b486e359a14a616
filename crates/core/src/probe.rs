//! Single-shot finality check for one transaction.

use tracing::{debug, instrument};

use crate::{BlockHeight, ChainClient, ChainError, TxHash};

/// Default number of blocks a tx may stay unmined before it's abandoned
pub const DEFAULT_WINDOW_BLOCKS: u64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Mined, execution succeeded
    Success,

    /// Mined, execution reverted
    Reverted,

    /// Not mined and the window is closed
    NotMined,

    /// Not mined yet, still within the window; ask again later
    Undetermined,
}

#[derive(Clone)]
pub struct Prober<C> {
    chain: C,
    window_blocks: u64,
}

impl<C: ChainClient> Prober<C> {
    pub fn new(chain: C, window_blocks: u64) -> Self {
        Self {
            chain,
            window_blocks,
        }
    }

    pub fn window_blocks(&self) -> u64 {
        self.window_blocks
    }

    /// One round trip against the node.
    ///
    /// The chain height is only queried when there's no receipt. A
    /// height of exactly `baseline + window` still counts as within the
    /// window.
    #[instrument(skip_all, fields(tx.hash = %tx_hash, baseline = baseline))]
    pub async fn probe(
        &self,
        baseline: BlockHeight,
        tx_hash: &TxHash,
    ) -> Result<ProbeOutcome, ChainError> {
        let deadline = baseline.saturating_add(self.window_blocks);

        if let Some(receipt) = self.chain.transaction_receipt(tx_hash).await? {
            debug!(block = ?receipt.block_number, status = ?receipt.status, "receipt found");

            return match receipt.reverted() {
                true => Ok(ProbeOutcome::Reverted),
                false => Ok(ProbeOutcome::Success),
            };
        }

        let height = self.chain.block_height().await?;

        if height <= deadline {
            debug!(height, deadline, "receipt not found yet");
            Ok(ProbeOutcome::Undetermined)
        } else {
            debug!(height, deadline, "window closed without receipt");
            Ok(ProbeOutcome::NotMined)
        }
    }
}
