//! The deployment engine collaborator.
//!
//! The pipeline never talks to a chain directly: contract creation, transaction submission
//! and confirmation waiting all go through a [`DeploymentEngine`]. [`JsonRpcEngine`] is the
//! production implementation; tests substitute an in-memory one.

mod json_rpc;

use std::future::Future;

use alloy_core::primitives::{Address, Bytes};
use anyhow::Result;

pub use json_rpc::JsonRpcEngine;

pub use crate::rpc::{Log, TransactionReceipt};

/// Options for a contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Account paying for the deployment.
    pub from: Address,
    /// ABI-encoded constructor arguments, appended to the init code.
    pub constructor_args: Bytes,
    /// Confirmation depth to await before returning.
    pub confirmations: u64,
}

/// A deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub receipt: TransactionReceipt,
}

/// Deploys contracts and submits transactions, blocking until they are confirmed.
///
/// Every method resolves only once the transaction reached the requested confirmation depth;
/// a revert or a confirmation timeout is an error. No method retries on its own.
pub trait DeploymentEngine: Send + Sync {
    /// The account deployments are sent from.
    fn deployer(&self) -> Address;

    /// Init code `deploy` would send for `contract`, without constructor arguments.
    fn init_code(&self, contract: &str) -> Result<Bytes>;

    /// Chain id reported by the connected network.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Deploy the compiled contract named `contract`.
    fn deploy(
        &self,
        contract: &str,
        options: DeployOptions,
    ) -> impl Future<Output = Result<Deployment>> + Send;

    /// Send a call to `to` and wait for `confirmations`.
    fn send(
        &self,
        to: Address,
        calldata: Bytes,
        confirmations: u64,
    ) -> impl Future<Output = Result<TransactionReceipt>> + Send;

    /// Whether `address` currently holds contract code.
    fn has_code(&self, address: Address) -> impl Future<Output = Result<bool>> + Send;
}
