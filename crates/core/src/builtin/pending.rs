//! Built-in in-memory pending store.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::{PendingError, PendingSet, PendingStore, PendingTx};

/// A pending set that lives only as long as the process.
#[derive(Clone, Default)]
pub struct EphemeralPending {
    state: Arc<RwLock<PendingSet>>,
}

impl EphemeralPending {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_txs(txs: impl IntoIterator<Item = PendingTx>) -> Self {
        let state = txs
            .into_iter()
            .map(|tx| (tx.local_id.clone(), tx))
            .collect();

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().is_empty()
    }
}

impl PendingStore for EphemeralPending {
    fn read_all(&self) -> Result<PendingSet, PendingError> {
        let state = self.state.read().unwrap();
        Ok(state.clone())
    }

    fn get(&self, local_id: &str) -> Result<Option<PendingTx>, PendingError> {
        let state = self.state.read().unwrap();
        Ok(state.get(local_id).cloned())
    }

    fn insert(&self, tx: PendingTx) -> Result<(), PendingError> {
        info!(local_id = %tx.local_id, tx.hash = %tx.tx_hash, "tracking pending tx");

        let mut state = self.state.write().unwrap();
        state.insert(tx.local_id.clone(), tx);

        Ok(())
    }

    fn remove(&self, local_id: &str) -> Result<bool, PendingError> {
        let mut state = self.state.write().unwrap();
        let removed = state.remove(local_id).is_some();

        debug!(local_id, removed, pending = state.len(), "pending set changed");

        Ok(removed)
    }
}
