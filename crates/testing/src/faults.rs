use tidewatch_core::{builtin::EphemeralPending, PendingError, PendingSet, PendingStore, PendingTx};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TestFault {
    #[default]
    None,
    ReadError,
    RemoveError,
}

/// An in-memory pending store that fails on demand.
#[derive(Clone, Default)]
pub struct FaultyPending {
    inner: EphemeralPending,
    fault: TestFault,
}

impl FaultyPending {
    pub fn new(inner: EphemeralPending, fault: TestFault) -> Self {
        Self { inner, fault }
    }

    pub fn inner(&self) -> &EphemeralPending {
        &self.inner
    }

    fn fault_err(&self) -> PendingError {
        PendingError::Internal(format!("fault injection: {:?}", self.fault).into())
    }
}

impl PendingStore for FaultyPending {
    fn read_all(&self) -> Result<PendingSet, PendingError> {
        if self.fault == TestFault::ReadError {
            return Err(self.fault_err());
        }
        self.inner.read_all()
    }

    fn get(&self, local_id: &str) -> Result<Option<PendingTx>, PendingError> {
        self.inner.get(local_id)
    }

    fn insert(&self, tx: PendingTx) -> Result<(), PendingError> {
        self.inner.insert(tx)
    }

    fn remove(&self, local_id: &str) -> Result<bool, PendingError> {
        if self.fault == TestFault::RemoveError {
            return Err(self.fault_err());
        }
        self.inner.remove(local_id)
    }
}
