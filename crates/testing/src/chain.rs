use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use tidewatch_core::{BlockHeight, ChainClient, ChainError, Receipt, TxHash};

type Scripted<T> = VecDeque<Result<T, ChainError>>;

#[derive(Default)]
struct ChainState {
    receipts: HashMap<TxHash, Scripted<Option<Receipt>>>,
    heights: Scripted<BlockHeight>,
    receipt_calls: HashMap<TxHash, usize>,
    height_calls: usize,
}

/// Pops the next scripted reply, repeating the last one forever.
fn next_reply<T: Clone>(script: &mut Scripted<T>) -> Option<Result<T, ChainError>> {
    match script.len() {
        0 => None,
        1 => script.front().cloned(),
        _ => script.pop_front(),
    }
}

/// A `ChainClient` that answers from a per-call script.
///
/// Receipts default to "not found" and the height defaults to zero. Once
/// a script is down to its last reply, that reply sticks.
#[derive(Clone, Default)]
pub struct ScriptedChain {
    state: Arc<Mutex<ChainState>>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_height(height: BlockHeight) -> Self {
        let out = Self::default();
        out.push_height(Ok(height));
        out
    }

    pub fn push_height(&self, reply: Result<BlockHeight, ChainError>) {
        self.state.lock().unwrap().heights.push_back(reply);
    }

    pub fn push_heights(&self, heights: impl IntoIterator<Item = BlockHeight>) {
        for height in heights {
            self.push_height(Ok(height));
        }
    }

    pub fn push_receipt(&self, hash: TxHash, reply: Result<Option<Receipt>, ChainError>) {
        self.state
            .lock()
            .unwrap()
            .receipts
            .entry(hash)
            .or_default()
            .push_back(reply);
    }

    pub fn set_receipt(&self, receipt: Receipt) {
        self.push_receipt(receipt.tx_hash, Ok(Some(receipt)));
    }

    pub fn receipt_calls(&self, hash: &TxHash) -> usize {
        let state = self.state.lock().unwrap();
        state.receipt_calls.get(hash).copied().unwrap_or_default()
    }

    pub fn height_calls(&self) -> usize {
        self.state.lock().unwrap().height_calls
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.height_calls + state.receipt_calls.values().sum::<usize>()
    }
}

impl ChainClient for ScriptedChain {
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError> {
        let mut state = self.state.lock().unwrap();
        *state.receipt_calls.entry(*hash).or_default() += 1;

        match state.receipts.get_mut(hash) {
            Some(script) => next_reply(script).unwrap_or(Ok(None)),
            None => Ok(None),
        }
    }

    async fn block_height(&self) -> Result<BlockHeight, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.height_calls += 1;

        next_reply(&mut state.heights).unwrap_or(Ok(0))
    }
}
