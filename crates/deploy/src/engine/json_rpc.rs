//! [`DeploymentEngine`] over plain Ethereum JSON-RPC.
//!
//! Transactions are submitted with `eth_sendTransaction`, so signing is left to the node
//! (Hardhat and Anvil dev accounts, or a node with an unlocked key).

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use url::Url;

use super::{DeployOptions, Deployment, DeploymentEngine};
use crate::{ArtifactStore, ConfirmationPolicy, rpc};

/// JSON-RPC backed deployment engine.
#[derive(Debug, Clone)]
pub struct JsonRpcEngine {
    client: reqwest::Client,
    url: Url,
    from: Address,
    chain_id: u64,
    artifacts: ArtifactStore,
    policy: ConfirmationPolicy,
}

impl JsonRpcEngine {
    /// Connect to `url` and fetch its chain id.
    ///
    /// When `from` is not provided, the first account managed by the node is used, matching
    /// the usual "named account 0" deployer convention.
    pub async fn connect(
        url: Url,
        from: Option<Address>,
        artifacts: ArtifactStore,
        policy: ConfirmationPolicy,
    ) -> Result<Self> {
        let client = rpc::create_client()?;

        let from = match from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to list node accounts")?;
                *accounts
                    .first()
                    .context("The node manages no accounts, configure a `from` address")?
            }
        };

        let chain_id: String = rpc::json_rpc_call(&client, url.as_str(), "eth_chainId", vec![])
            .await
            .context("Failed to query chain id")?;
        let chain_id = rpc::parse_hex_u64(&chain_id)
            .with_context(|| format!("Invalid eth_chainId result: {chain_id}"))?;

        tracing::debug!(url = %url, deployer = %from, chain_id, "Connected to JSON-RPC endpoint");

        Ok(Self {
            client,
            url,
            from,
            chain_id,
            artifacts,
            policy,
        })
    }

    async fn send_transaction(
        &self,
        from: Address,
        to: Option<Address>,
        data: Bytes,
        confirmations: u64,
    ) -> Result<rpc::TransactionReceipt> {
        let mut tx = serde_json::json!({
            "from": from,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let tx_hash: B256 =
            rpc::json_rpc_call(&self.client, self.url.as_str(), "eth_sendTransaction", vec![tx])
                .await
                .context("Failed to send transaction")?;

        tracing::debug!(tx_hash = %tx_hash, ?to, "Transaction sent");

        rpc::wait_for_confirmations(
            &self.client,
            self.url.as_str(),
            tx_hash,
            confirmations,
            &self.policy,
        )
        .await
    }
}

impl DeploymentEngine for JsonRpcEngine {
    fn deployer(&self) -> Address {
        self.from
    }

    fn init_code(&self, contract: &str) -> Result<Bytes> {
        Ok(self.artifacts.load(contract)?.bytecode)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn deploy(&self, contract: &str, options: DeployOptions) -> Result<Deployment> {
        let artifact = self.artifacts.load(contract)?;

        let mut init_code = artifact.bytecode.to_vec();
        init_code.extend_from_slice(&options.constructor_args);

        tracing::info!(
            contract = %artifact.fully_qualified_name(),
            from = %options.from,
            confirmations = options.confirmations,
            "Deploying contract..."
        );

        let receipt = self
            .send_transaction(options.from, None, init_code.into(), options.confirmations)
            .await
            .with_context(|| format!("Deployment transaction of {contract} failed"))?;

        let address = receipt
            .contract_address
            .context("Receipt of a contract creation has no contract address")?;

        Ok(Deployment { address, receipt })
    }

    async fn send(
        &self,
        to: Address,
        calldata: Bytes,
        confirmations: u64,
    ) -> Result<rpc::TransactionReceipt> {
        self.send_transaction(self.from, Some(to), calldata, confirmations)
            .await
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        let code: Bytes = rpc::json_rpc_call(
            &self.client,
            self.url.as_str(),
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await?;
        Ok(!code.is_empty())
    }
}
