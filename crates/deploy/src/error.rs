//! Error taxonomy for a deployment run.

use alloy_core::primitives::Address;
use thiserror::Error;

/// Boxed source error carried by the pipeline variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the deployment pipeline.
///
/// Every variant except [`DeployError::VerificationFailed`] aborts the run.
/// Re-running the whole pipeline is the recovery path; nothing here is retried.
#[derive(Debug, Error)]
pub enum DeployError {
    /// No network identifier was supplied for the run.
    #[error("no target network selected for this run")]
    MissingNetworkContext,

    /// The network (or its chain id) has no registered configuration.
    #[error("no deployment configuration registered for network {network}")]
    UnknownNetwork { network: String },

    /// No connection profile is configured for the network.
    #[error("no connection profile for network {network}, add one under [networks]")]
    MissingProfile { network: String },

    /// The run configuration violates a table or schema invariant.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The RPC endpoint serves a different chain than the one configured.
    #[error("network {network} is configured for chain id {expected} but the endpoint reports {actual}")]
    ChainMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },

    /// A simulated run skipped the mocks step and no usable mock was recorded.
    #[error("no VRF coordinator mock recorded for network {network}, run the `mocks` tag first")]
    MissingMock { network: String },

    /// Deployment records could not be read.
    #[error("failed to read deployment records")]
    Store(#[source] BoxError),

    /// The RPC endpoint could not be queried.
    #[error("RPC request failed")]
    Rpc(#[source] BoxError),

    #[error("failed to create and fund the VRF subscription")]
    SubscriptionCreationFailed(#[source] BoxError),

    #[error("failed to deploy {contract}")]
    DeploymentFailed {
        contract: String,
        #[source]
        source: BoxError,
    },

    /// Source verification failed. The deployed contract is unaffected.
    #[error("failed to verify contract at {address}")]
    VerificationFailed {
        address: Address,
        #[source]
        source: BoxError,
    },
}

impl DeployError {
    /// Whether this error aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::VerificationFailed { .. })
    }

    pub(crate) fn rpc(err: anyhow::Error) -> Self {
        Self::Rpc(err.into())
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        Self::Store(err.into())
    }

    pub(crate) fn subscription(err: anyhow::Error) -> Self {
        Self::SubscriptionCreationFailed(err.into())
    }

    pub(crate) fn deployment(contract: &str, err: anyhow::Error) -> Self {
        Self::DeploymentFailed {
            contract: contract.to_string(),
            source: err.into(),
        }
    }

    pub(crate) fn verification(address: Address, err: anyhow::Error) -> Self {
        Self::VerificationFailed {
            address,
            source: err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_verification_is_non_fatal() {
        assert!(DeployError::MissingNetworkContext.is_fatal());
        assert!(
            DeployError::UnknownNetwork {
                network: "1".to_string()
            }
            .is_fatal()
        );
        assert!(
            DeployError::MissingProfile {
                network: "mainnet".to_string()
            }
            .is_fatal()
        );
        assert!(DeployError::store(anyhow::anyhow!("corrupt record")).is_fatal());
        assert!(DeployError::subscription(anyhow::anyhow!("reverted")).is_fatal());
        assert!(DeployError::deployment("Raffle", anyhow::anyhow!("reverted")).is_fatal());
        assert!(!DeployError::verification(Address::ZERO, anyhow::anyhow!("bad key")).is_fatal());
    }

    #[test]
    fn test_source_is_preserved() {
        use std::error::Error;

        let err = DeployError::deployment("Raffle", anyhow::anyhow!("execution reverted"));
        assert_eq!(err.to_string(), "failed to deploy Raffle");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("execution reverted".to_string())
        );
    }
}
