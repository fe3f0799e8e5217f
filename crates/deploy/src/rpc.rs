//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::ConfirmationPolicy;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Poll `check_fn` until it yields a value.
///
/// `Ok(None)` means "not yet" and is retried after `poll_interval`; errors abort the wait.
/// `timeout` bounds the whole wait, including a `check_fn` call still in flight.
///
/// # Returns
/// The first value produced, or an error after `timeout`.
pub async fn wait_until<T, F, Fut>(
    name: &str,
    timeout: Duration,
    poll_interval: Duration,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>, anyhow::Error>>,
{
    let poll = async {
        loop {
            if let Some(value) = check_fn().await? {
                return Ok::<T, anyhow::Error>(value);
            }

            tracing::trace!(target_name = %name, "Not ready yet, retrying...");
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| anyhow::anyhow!("Timeout waiting for {} after {:?}", name, timeout))?
}

/// Deserialize a u64 from a hex string (with 0x prefix).
pub(crate) fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn deserialize_opt_u64_from_hex<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.as_deref()
        .map(parse_hex_u64)
        .transpose()
        .map_err(serde::de::Error::custom)
}

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// A log entry emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The subset of a transaction receipt used by the deployment steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub block_number: u64,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `Some(1)` on success, `Some(0)` on revert. Absent on pre-Byzantium chains.
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    pub status: Option<u64>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }

    /// Number of blocks including and on top of the receipt's block.
    pub fn confirmations(&self, head: u64) -> u64 {
        head.saturating_add(1).saturating_sub(self.block_number)
    }
}

/// Wait until `tx_hash` is mined and buried under `confirmations` blocks.
///
/// Fails if the transaction reverted or the policy's timeout elapses first.
pub async fn wait_for_confirmations(
    client: &reqwest::Client,
    url: &str,
    tx_hash: B256,
    confirmations: u64,
    policy: &ConfirmationPolicy,
) -> Result<TransactionReceipt, anyhow::Error> {
    confirm_within(
        client,
        url,
        tx_hash,
        confirmations,
        policy.timeout(),
        policy.poll_interval(),
    )
    .await
}

/// Mining and confirmation depth share a single deadline.
async fn confirm_within(
    client: &reqwest::Client,
    url: &str,
    tx_hash: B256,
    confirmations: u64,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TransactionReceipt, anyhow::Error> {
    let deadline = tokio::time::Instant::now() + timeout;
    let confirmations = confirmations.max(1);

    let receipt: TransactionReceipt = wait_until(
        &format!("transaction {tx_hash}"),
        timeout,
        poll_interval,
        move || async move {
            json_rpc_call::<Option<TransactionReceipt>>(
                client,
                url,
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx_hash)],
            )
            .await
        },
    )
    .await?;

    if !receipt.succeeded() {
        anyhow::bail!(
            "Transaction {} reverted in block {}",
            tx_hash,
            receipt.block_number
        );
    }

    tracing::debug!(
        tx_hash = %tx_hash,
        block_number = receipt.block_number,
        confirmations,
        "Transaction mined, waiting for confirmations"
    );

    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
    let mined = &receipt;
    wait_until(
        &format!("{confirmations} confirmations of {tx_hash}"),
        remaining,
        poll_interval,
        move || async move {
            let head: String = json_rpc_call(client, url, "eth_blockNumber", vec![]).await?;
            let head = parse_hex_u64(&head).context("Invalid eth_blockNumber result")?;
            Ok((mined.confirmations(head) >= confirmations).then_some(()))
        },
    )
    .await?;

    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use std::time::Instant;

    const RECEIPT: &str = r#"{
        "transactionHash": "0x5a3b9d0c2e4f6a8b1c3d5e7f9a0b2c4d6e8f0a1b3c5d7e9f1a2b4c6d8e0f2a4b",
        "blockNumber": "0x10",
        "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        "status": "0x1",
        "gasUsed": "0x5208",
        "logs": [{
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": [
                "0x464722b4166576d3dcbba877b999bc35cf911f4eaf434b7eba68fa113951d0bf",
                "0x0000000000000000000000000000000000000000000000000000000000000001"
            ],
            "data": "0x000000000000000000000000f39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "logIndex": "0x0"
        }]
    }"#;

    #[test]
    fn test_receipt_deserialization() {
        let receipt: TransactionReceipt = serde_json::from_str(RECEIPT).unwrap();
        assert_eq!(receipt.block_number, 16);
        assert_eq!(receipt.status, Some(1));
        assert!(receipt.succeeded());
        assert!(receipt.contract_address.is_some());
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].topics.len(), 2);
    }

    #[test]
    fn test_reverted_receipt() {
        let reverted = RECEIPT.replace(r#""status": "0x1""#, r#""status": "0x0""#);
        let receipt: TransactionReceipt = serde_json::from_str(&reverted).unwrap();
        assert!(!receipt.succeeded());
    }

    #[test]
    fn test_confirmation_depth() {
        let receipt: TransactionReceipt = serde_json::from_str(RECEIPT).unwrap();
        assert_eq!(receipt.confirmations(15), 0);
        assert_eq!(receipt.confirmations(16), 1);
        assert_eq!(receipt.confirmations(21), 6);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let result: Result<(), _> = wait_until(
            "never",
            Duration::from_millis(20),
            Duration::from_millis(5),
            || async { Ok(None) },
        )
        .await;
        assert!(result.unwrap_err().to_string().contains("Timeout waiting for never"));
    }

    #[tokio::test]
    async fn test_wait_until_returns_value() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let value = wait_until("counter", Duration::from_secs(1), Duration::from_millis(1), || {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move { Ok((n >= 2).then_some(n)) }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_wait_until_bounds_a_slow_check() {
        let started = Instant::now();
        let result: Result<(), _> = wait_until(
            "slow",
            Duration::from_millis(50),
            Duration::from_millis(5),
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(None)
            },
        )
        .await;

        assert!(result.unwrap_err().to_string().contains("Timeout waiting for slow"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    /// Local node serving [`RECEIPT`] once `mined_after` elapsed, with a head stuck at block 16.
    async fn stalled_node(mined_after: Duration) -> String {
        let started = Instant::now();
        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<Value>| async move {
                let result = match request["method"].as_str() {
                    Some("eth_getTransactionReceipt") if started.elapsed() >= mined_after => {
                        serde_json::from_str::<Value>(RECEIPT).unwrap()
                    }
                    Some("eth_blockNumber") => serde_json::json!("0x10"),
                    _ => Value::Null,
                };
                Json(serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_confirmation_wait_shares_one_deadline() {
        let timeout = Duration::from_millis(400);
        let url = stalled_node(timeout.mul_f64(0.75)).await;
        let client = create_client().unwrap();

        let started = Instant::now();
        let err = confirm_within(
            &client,
            &url,
            B256::with_last_byte(1),
            3,
            timeout,
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();

        // Mined at 0.75 of the budget, so depth only gets what is left of it.
        assert!(err.to_string().contains("Timeout waiting for"));
        assert!(started.elapsed() < timeout.mul_f64(1.5));
    }

    #[tokio::test]
    async fn test_confirmation_wait_returns_receipt() {
        let url = stalled_node(Duration::from_millis(50)).await;
        let client = create_client().unwrap();

        let receipt = confirm_within(
            &client,
            &url,
            B256::with_last_byte(1),
            1,
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(receipt.block_number, 16);
    }
}
