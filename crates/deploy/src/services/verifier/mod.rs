//! Source verification of the deployed raffle.

mod etherscan;

use std::future::Future;

use alloy_core::primitives::Address;
use anyhow::Result;
use derive_more::Display;
use serde::Serialize;

pub use etherscan::EtherscanVerifier;

use crate::{
    DeployError, NetworkDescriptor,
    services::raffle::{DeploymentArgs, DeploymentResult},
};

/// Publishes contract sources to an explorer.
pub trait Verifier: Send + Sync {
    /// Whether a verification credential is configured.
    fn has_credential(&self) -> bool;

    /// Verify the compiled contract `contract` deployed at `address` with `args`.
    fn verify(
        &self,
        address: Address,
        contract: &str,
        args: &DeploymentArgs,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Outcome of the verification step.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Verification {
    #[display("skipped ({_0})")]
    Skipped(String),
    #[display("verified")]
    Verified,
    /// Verification was attempted and failed. The deployment stands.
    #[display("failed ({_0})")]
    Failed(String),
}

/// Verify `result` when the network is live and a credential is configured.
pub async fn maybe_verify<V: Verifier>(
    result: &DeploymentResult,
    descriptor: &NetworkDescriptor,
    verifier: &V,
) -> Result<Verification, DeployError> {
    if descriptor.is_simulated {
        tracing::debug!(network = %descriptor.id, "Simulated network, skipping verification");
        return Ok(Verification::Skipped("simulated network".to_string()));
    }

    if !verifier.has_credential() {
        tracing::info!(network = %descriptor.id, "No verification credential configured, skipping verification");
        return Ok(Verification::Skipped("no API key".to_string()));
    }

    tracing::info!(address = %result.contract_address, "Verifying...");

    verifier
        .verify(
            result.contract_address,
            crate::contracts::RAFFLE,
            &result.constructor_args,
        )
        .await
        .map_err(|e| DeployError::verification(result.contract_address, e))?;

    tracing::info!(address = %result.contract_address, "Contract verified");
    Ok(Verification::Verified)
}
