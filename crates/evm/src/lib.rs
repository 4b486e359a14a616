//! Chain client for Ethereum-compatible nodes over JSON-RPC.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{instrument, trace};

use tidewatch_core::{
    config::UpstreamConfig, BlockHeight, ChainClient, ChainError, Receipt, TxHash,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    /// `None` only when the field is missing; a JSON `null` is kept
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,

    #[serde(default)]
    error: Option<RpcErrorBody>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,

    #[serde(default)]
    block_number: Option<String>,

    #[serde(default)]
    status: Option<String>,
}

fn parse_hex_u64(raw: &str, field: &str) -> Result<u64, ChainError> {
    let value = raw.trim();

    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| ChainError::decode(format!("{field} must be 0x-prefixed hex")))?;

    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::decode(format!("can't parse {field} as hex u64: {e}")))
}

fn decode_receipt(raw: RawReceipt) -> Result<Receipt, ChainError> {
    let tx_hash: TxHash = raw
        .transaction_hash
        .parse()
        .map_err(|e| ChainError::decode(format!("bad transactionHash: {e}")))?;

    let block_number = raw
        .block_number
        .as_deref()
        .map(|x| parse_hex_u64(x, "blockNumber"))
        .transpose()?;

    let status = match raw.status.as_deref() {
        None => None,
        Some(x) => match parse_hex_u64(x, "status")? {
            0 => Some(false),
            1 => Some(true),
            other => return Err(ChainError::decode(format!("unknown status {other}"))),
        },
    };

    Ok(Receipt {
        tx_hash,
        block_number,
        status,
    })
}

fn into_result<T: DeserializeOwned>(response: RpcResponse) -> Result<Option<T>, ChainError> {
    if let Some(RpcErrorBody { code, message }) = response.error {
        return Err(ChainError::Rpc { code, message });
    }

    let Some(result) = response.result else {
        return Err(ChainError::decode("reply has neither result nor error"));
    };

    serde_json::from_value(result).map_err(|e| ChainError::decode(format!("bad result: {e}")))
}

/// Talks to a single JSON-RPC endpoint.
#[derive(Clone)]
pub struct EvmClient {
    http: reqwest::Client,
    url: Arc<str>,
    next_id: Arc<AtomicU64>,
}

impl EvmClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ChainError> {
        let timeout = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(ChainError::transport)?;

        Ok(Self {
            http,
            url: config.rpc_url.as_str().into(),
            next_id: Default::default(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ChainError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        trace!(method, id = request.id, "sending rpc request");

        let response = self
            .http
            .post(&*self.url)
            .json(&request)
            .send()
            .await
            .map_err(ChainError::transport)?;

        let status = response.status();

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::transport(format!("{method}: http {status}")));
        }

        if !status.is_success() {
            return Err(ChainError::Rpc {
                code: status.as_u16() as i64,
                message: format!("{method}: http {status}"),
            });
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::decode(format!("{method}: {e}")))?;

        into_result(body)
    }
}

impl ChainClient for EvmClient {
    #[instrument(skip_all, fields(tx.hash = %hash))]
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError> {
        let raw: Option<RawReceipt> = self
            .rpc_call("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;

        raw.map(decode_receipt).transpose()
    }

    #[instrument(skip_all)]
    async fn block_height(&self) -> Result<BlockHeight, ChainError> {
        let raw: String = self
            .rpc_call("eth_blockNumber", json!([]))
            .await?
            .ok_or_else(|| ChainError::decode("eth_blockNumber returned no result"))?;

        parse_hex_u64(&raw, "eth_blockNumber")
    }
}
