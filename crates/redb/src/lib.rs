//! Redb-backed pending set.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use minicbor::{Decode, Encode};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use thiserror::Error;
use tracing::{debug, info, warn};

use tidewatch_core::{
    config::RedbStorageConfig, BlockHeight, PendingError, PendingSet, PendingStore, PendingTx,
    TxHash,
};

#[derive(Debug, Error)]
#[error(transparent)]
struct RedbPendingError(#[from] PendingError);

impl From<redb::Error> for RedbPendingError {
    fn from(value: redb::Error) -> Self {
        Self(PendingError::Internal(Box::new(value)))
    }
}

impl From<RedbPendingError> for PendingError {
    fn from(value: RedbPendingError) -> Self {
        value.0
    }
}

impl From<redb::DatabaseError> for RedbPendingError {
    fn from(value: redb::DatabaseError) -> Self {
        Self(PendingError::Internal(Box::new(redb::Error::from(value))))
    }
}

impl From<redb::TableError> for RedbPendingError {
    fn from(value: redb::TableError) -> Self {
        Self(PendingError::Internal(Box::new(redb::Error::from(value))))
    }
}

impl From<redb::CommitError> for RedbPendingError {
    fn from(value: redb::CommitError) -> Self {
        Self(PendingError::Internal(Box::new(redb::Error::from(value))))
    }
}

impl From<redb::StorageError> for RedbPendingError {
    fn from(value: redb::StorageError) -> Self {
        Self(PendingError::Internal(Box::new(redb::Error::from(value))))
    }
}

impl From<redb::TransactionError> for RedbPendingError {
    fn from(value: redb::TransactionError) -> Self {
        Self(PendingError::Internal(Box::new(redb::Error::from(value))))
    }
}

const DEFAULT_CACHE_SIZE_MB: usize = 8;

// PENDING: key = local id, value = cbor(PendingRecord)
const PENDING_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pending");

#[derive(Encode, Decode, Debug, PartialEq)]
struct PendingRecord {
    #[n(0)]
    #[cbor(with = "minicbor::bytes")]
    tx_hash: Vec<u8>,

    #[n(1)]
    submitted_block: Option<BlockHeight>,

    /// Unix time in milliseconds
    #[n(2)]
    submitted_at: Option<i64>,
}

impl PendingRecord {
    fn serialize(&self) -> Result<Vec<u8>, RedbPendingError> {
        minicbor::to_vec(self)
            .map_err(|e| PendingError::Internal(e.to_string().into()).into())
    }

    fn deserialize(local_id: &str, bytes: &[u8]) -> Result<Self, PendingError> {
        minicbor::decode(bytes)
            .map_err(|e| PendingError::InvalidRecord(local_id.to_owned(), e.to_string()))
    }

    fn into_pending_tx(self, local_id: &str) -> Result<PendingTx, PendingError> {
        let invalid = |msg: String| PendingError::InvalidRecord(local_id.to_owned(), msg);

        let hash: [u8; 32] = self
            .tx_hash
            .try_into()
            .map_err(|x: Vec<u8>| invalid(format!("tx hash has {} bytes", x.len())))?;

        let submitted_at = match self.submitted_at {
            Some(millis) => Some(
                Utc.timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| invalid(format!("timestamp out of range: {millis}")))?,
            ),
            None => None,
        };

        Ok(PendingTx {
            local_id: local_id.to_owned(),
            tx_hash: TxHash::new(hash),
            submitted_block: self.submitted_block,
            submitted_at,
        })
    }
}

impl From<&PendingTx> for PendingRecord {
    fn from(value: &PendingTx) -> Self {
        Self {
            tx_hash: value.tx_hash.as_bytes().to_vec(),
            submitted_block: value.submitted_block,
            submitted_at: value.submitted_at.map(|x| x.timestamp_millis()),
        }
    }
}

#[derive(Clone)]
pub struct RedbPending {
    db: Arc<redb::Database>,
}

impl RedbPending {
    pub fn open(
        path: impl AsRef<std::path::Path>,
        config: &RedbStorageConfig,
    ) -> Result<Self, PendingError> {
        let db = redb::Database::builder()
            .set_repair_callback(|x| {
                warn!(progress = x.progress() * 100f64, "pending db is repairing")
            })
            .set_cache_size(1024 * 1024 * config.cache.unwrap_or(DEFAULT_CACHE_SIZE_MB))
            .create(path)
            .map_err(|e| PendingError::Internal(Box::new(e)))?;

        Self::from_db(db)
    }

    pub fn in_memory() -> Result<Self, PendingError> {
        let db = redb::Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| PendingError::Internal(Box::new(e)))?;

        Self::from_db(db)
    }

    fn from_db(db: redb::Database) -> Result<Self, PendingError> {
        let out = Self { db: Arc::new(db) };

        out.ensure_initialized()?;
        Ok(out)
    }

    fn ensure_initialized(&self) -> Result<(), RedbPendingError> {
        let wx = self.db.begin_write()?;
        wx.open_table(PENDING_TABLE)?;
        wx.commit()?;
        Ok(())
    }

    pub fn len(&self) -> Result<u64, PendingError> {
        let rx = self.db.begin_read().map_err(RedbPendingError::from)?;
        let table = rx.open_table(PENDING_TABLE).map_err(RedbPendingError::from)?;
        let len = table.len().map_err(RedbPendingError::from)?;
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool, PendingError> {
        Ok(self.len()? == 0)
    }

    fn read_all_inner(&self) -> Result<PendingSet, RedbPendingError> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(PENDING_TABLE)?;

        let mut out = PendingSet::new();

        for entry in table.iter()? {
            let (key, value) = entry?;
            let local_id = key.value();

            let tx = PendingRecord::deserialize(local_id, value.value())?
                .into_pending_tx(local_id)?;

            out.insert(tx.local_id.clone(), tx);
        }

        Ok(out)
    }

    fn get_inner(&self, local_id: &str) -> Result<Option<PendingTx>, RedbPendingError> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(PENDING_TABLE)?;

        let Some(value) = table.get(local_id)? else {
            return Ok(None);
        };

        let tx = PendingRecord::deserialize(local_id, value.value())?.into_pending_tx(local_id)?;

        Ok(Some(tx))
    }

    fn insert_inner(&self, tx: &PendingTx) -> Result<(), RedbPendingError> {
        let record = PendingRecord::from(tx);
        let wx = self.db.begin_write()?;

        {
            let mut table = wx.open_table(PENDING_TABLE)?;
            table.insert(tx.local_id.as_str(), record.serialize()?.as_slice())?;
        }

        wx.commit()?;
        Ok(())
    }

    fn remove_inner(&self, local_id: &str) -> Result<bool, RedbPendingError> {
        let wx = self.db.begin_write()?;

        let removed = {
            let mut table = wx.open_table(PENDING_TABLE)?;
            let entry = table.remove(local_id)?;
            entry.is_some()
        };

        wx.commit()?;
        Ok(removed)
    }
}

impl PendingStore for RedbPending {
    fn read_all(&self) -> Result<PendingSet, PendingError> {
        Ok(self.read_all_inner()?)
    }

    fn get(&self, local_id: &str) -> Result<Option<PendingTx>, PendingError> {
        Ok(self.get_inner(local_id)?)
    }

    fn insert(&self, tx: PendingTx) -> Result<(), PendingError> {
        info!(local_id = %tx.local_id, tx.hash = %tx.tx_hash, "tracking pending tx (redb)");
        self.insert_inner(&tx)?;
        Ok(())
    }

    fn remove(&self, local_id: &str) -> Result<bool, PendingError> {
        let removed = self.remove_inner(local_id)?;
        debug!(local_id, removed, "pending set changed (redb)");
        Ok(removed)
    }
}
