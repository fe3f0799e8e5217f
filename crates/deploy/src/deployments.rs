//! Persisted deployment records.
//!
//! Each successful deployment is recorded at `{deployments}/{network}/{Contract}.json` so that
//! later runs (and tests) can locate the contract without redeploying it.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    engine::{DeployOptions, Deployment, DeploymentEngine},
    fs::FsHandler,
};

/// Compute the fingerprint of a deployment.
///
/// Two deployments share a fingerprint exactly when they target the same contract, compiled
/// to the same init code, with the same constructor calldata.
pub fn fingerprint(contract: &str, init_code: &[u8], constructor_args: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contract.as_bytes());
    hasher.update(b":");
    hasher.update((init_code.len() as u64).to_be_bytes());
    hasher.update(init_code);
    hasher.update(constructor_args);
    hex::encode(hasher.finalize())
}

/// What a run leaves behind for each deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub contract: String,
    pub address: Address,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
    /// Constructor arguments in positional order, human readable.
    #[serde(default)]
    pub args: Vec<String>,
    pub fingerprint: String,
    pub transaction_hash: B256,
    pub block_number: u64,
    /// Unix timestamp of the deployment.
    pub deployed_at: i64,
    /// Version of this tool that wrote the record.
    pub tool_version: String,
}

impl DeploymentRecord {
    pub fn new(
        contract: &str,
        deployment: &Deployment,
        fingerprint: String,
        constructor_args: Bytes,
        args: Vec<String>,
    ) -> Self {
        Self {
            contract: contract.to_string(),
            address: deployment.address,
            fingerprint,
            constructor_args,
            args,
            transaction_hash: deployment.receipt.transaction_hash,
            block_number: deployment.receipt.block_number,
            deployed_at: chrono::Utc::now().timestamp(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Directory of deployment records, one sub-directory per network.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    root: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn record_path(&self, network: &str, contract: &str) -> PathBuf {
        self.root.join(network).join(format!("{contract}.json"))
    }

    /// Save a record, replacing any previous record of the same contract on `network`.
    pub fn save(&self, network: &str, record: &DeploymentRecord) -> Result<PathBuf> {
        let path = self.record_path(network, &record.contract);
        let json = serde_json::to_string_pretty(record).context("Failed to serialize deployment record")?;
        FsHandler::write_atomic(&path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), contract = %record.contract, "Deployment record saved");
        Ok(path)
    }

    /// Load the record of `contract` on `network`, if any.
    pub fn load(&self, network: &str, contract: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(network, contract);
        if !path.exists() {
            return Ok(None);
        }

        read_record(&path).map(Some)
    }
}

fn read_record(path: &Path) -> Result<DeploymentRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read deployment record {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse deployment record {}", path.display()))
}

/// Outcome of [`deploy_or_reuse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployed {
    pub record: DeploymentRecord,
    /// Whether an existing deployment was reused instead of deploying again.
    pub reused: bool,
}

/// A contract deployment to perform (or reuse).
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub contract: &'a str,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
    /// Constructor arguments in positional order, for the record.
    pub args: Vec<String>,
    pub confirmations: u64,
}

/// Deploy a contract, unless an identical deployment is recorded and still live.
///
/// A recorded deployment is reused when its fingerprint (contract, init code and constructor
/// arguments) matches, `redeploy` is false and the recorded address still holds code. Otherwise the contract is deployed and the record is
/// rewritten.
pub async fn deploy_or_reuse<E: DeploymentEngine>(
    engine: &E,
    store: &DeploymentStore,
    network: &str,
    request: DeployRequest<'_>,
    redeploy: bool,
) -> Result<Deployed> {
    let DeployRequest {
        contract,
        constructor_args,
        args,
        confirmations,
    } = request;

    let init_code = engine.init_code(contract)?;
    let expected = fingerprint(contract, &init_code, &constructor_args);

    if !redeploy {
        if let Some(record) = store.load(network, contract)? {
            if record.fingerprint == expected && engine.has_code(record.address).await? {
                tracing::info!(
                    contract,
                    network,
                    address = %record.address,
                    "Reusing existing deployment"
                );
                return Ok(Deployed { record, reused: true });
            }
        }
    }

    let deployment = engine
        .deploy(
            contract,
            DeployOptions {
                from: engine.deployer(),
                constructor_args: constructor_args.clone(),
                confirmations,
            },
        )
        .await?;

    tracing::info!(
        contract,
        network,
        address = %deployment.address,
        tx_hash = %deployment.receipt.transaction_hash,
        confirmations,
        "Contract deployed"
    );

    let record = DeploymentRecord::new(contract, &deployment, expected, constructor_args, args);
    store.save(network, &record)?;

    Ok(Deployed {
        record,
        reused: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TransactionReceipt;
    use tempdir::TempDir;

    fn record() -> DeploymentRecord {
        let deployment = Deployment {
            address: Address::with_last_byte(7),
            receipt: TransactionReceipt {
                transaction_hash: B256::with_last_byte(1),
                block_number: 12,
                contract_address: Some(Address::with_last_byte(7)),
                status: Some(1),
                logs: vec![],
            },
        };
        let args = Bytes::from_static(&[1, 2, 3]);
        DeploymentRecord::new(
            "Raffle",
            &deployment,
            fingerprint("Raffle", &[0x60, 0x80], &args),
            args,
            vec!["1".to_string()],
        )
    }

    #[test]
    fn test_fingerprint_determinism() {
        assert_eq!(
            fingerprint("Raffle", &[0x60], &[1, 2, 3]),
            fingerprint("Raffle", &[0x60], &[1, 2, 3])
        );
        assert_eq!(fingerprint("Raffle", &[], &[]).len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_args_and_contract() {
        assert_ne!(
            fingerprint("Raffle", &[0x60], &[1, 2, 3]),
            fingerprint("Raffle", &[0x60], &[1, 2, 4])
        );
        assert_ne!(
            fingerprint("Raffle", &[0x60], &[1, 2, 3]),
            fingerprint("VRFCoordinatorV2Mock", &[0x60], &[1, 2, 3])
        );
    }

    #[test]
    fn test_fingerprint_changes_with_init_code() {
        assert_ne!(
            fingerprint("Raffle", &[0x60, 0x80], &[1, 2, 3]),
            fingerprint("Raffle", &[0x60, 0x81], &[1, 2, 3])
        );
        // Moving bytes between init code and arguments is a different deployment.
        assert_ne!(
            fingerprint("Raffle", &[0x60, 0x80, 1], &[2, 3]),
            fingerprint("Raffle", &[0x60, 0x80], &[1, 2, 3])
        );
    }

    #[test]
    fn test_record_save_and_load() {
        let dir = TempDir::new("raffle-deployments").unwrap();
        let store = DeploymentStore::new(dir.path());
        let original = record();

        let path = store.save("sepolia", &original).unwrap();
        assert_eq!(path, dir.path().join("sepolia/Raffle.json"));

        let loaded = store.load("sepolia", "Raffle").unwrap();
        assert_eq!(loaded, Some(original));
    }

    #[test]
    fn test_load_missing_record() {
        let dir = TempDir::new("raffle-deployments").unwrap();
        let store = DeploymentStore::new(dir.path());
        assert_eq!(store.load("sepolia", "Raffle").unwrap(), None);
    }

    #[test]
    fn test_load_corrupted_record() {
        let dir = TempDir::new("raffle-deployments").unwrap();
        let store = DeploymentStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("sepolia")).unwrap();
        std::fs::write(dir.path().join("sepolia/Raffle.json"), "{ invalid json }").unwrap();

        assert!(store.load("sepolia", "Raffle").is_err());
    }
}
