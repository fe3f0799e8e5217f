//! VRF coordinator mock for simulated networks.

use std::future::Future;

use alloy_core::{
    primitives::{Address, U256, aliases::U96, ruint::UintTryFrom},
    sol_types::{SolCall, SolConstructor, SolEvent},
};
use anyhow::{Context, Result};

use crate::{
    DeployError, RunConstants,
    contracts::{VRF_COORDINATOR_MOCK, VRFCoordinatorV2Mock},
    deployments::{DeployRequest, Deployed, DeploymentStore, deploy_or_reuse},
    engine::{DeploymentEngine, TransactionReceipt},
};

/// Confirmation depth for every mock transaction. Mocks only exist on simulated networks.
const MOCK_CONFIRMATIONS: u64 = 1;

/// Acknowledgment of a subscription creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedSubscription {
    /// Id assigned by the oracle.
    pub id: u64,
}

/// Subscription management API of a randomness oracle stand-in.
pub trait OracleMock: Send + Sync {
    /// Address the mock is deployed at.
    fn address(&self) -> Address;

    /// Create a new subscription owned by the deployer.
    fn create_subscription(&self) -> impl Future<Output = Result<CreatedSubscription>> + Send;

    /// Credit `amount` (in wei of the funding currency) to subscription `id`.
    fn fund_subscription(&self, id: u64, amount: U256) -> impl Future<Output = Result<()>> + Send;

    /// Allow `consumer` to request randomness billed to subscription `id`.
    fn add_consumer(&self, id: u64, consumer: Address) -> impl Future<Output = Result<()>> + Send;
}

/// Handle on a deployed `VRFCoordinatorV2Mock`.
#[derive(Debug)]
pub struct VrfCoordinatorMock<'a, E> {
    engine: &'a E,
    address: Address,
}

impl<'a, E: DeploymentEngine> VrfCoordinatorMock<'a, E> {
    /// Attach to a mock deployed at `address`.
    pub fn at(engine: &'a E, address: Address) -> Self {
        Self { engine, address }
    }
}

impl<E: DeploymentEngine> OracleMock for VrfCoordinatorMock<'_, E> {
    fn address(&self) -> Address {
        self.address
    }

    async fn create_subscription(&self) -> Result<CreatedSubscription> {
        let calldata = VRFCoordinatorV2Mock::createSubscriptionCall {}.abi_encode();
        let receipt = self
            .engine
            .send(self.address, calldata.into(), MOCK_CONFIRMATIONS)
            .await
            .context("createSubscription transaction failed")?;

        let id = subscription_created(&receipt, self.address)?;
        tracing::info!(subscription_id = id, mock = %self.address, "Subscription created");

        Ok(CreatedSubscription { id })
    }

    async fn fund_subscription(&self, id: u64, amount: U256) -> Result<()> {
        let amount = U96::uint_try_from(amount).ok()
            .with_context(|| format!("Funding amount {amount} does not fit in uint96"))?;
        let calldata = VRFCoordinatorV2Mock::fundSubscriptionCall { subId: id, amount }.abi_encode();

        self.engine
            .send(self.address, calldata.into(), MOCK_CONFIRMATIONS)
            .await
            .with_context(|| format!("fundSubscription({id}) transaction failed"))?;

        tracing::info!(subscription_id = id, amount = %amount, "Subscription funded");
        Ok(())
    }

    async fn add_consumer(&self, id: u64, consumer: Address) -> Result<()> {
        let calldata =
            VRFCoordinatorV2Mock::addConsumerCall { subId: id, consumer }.abi_encode();

        self.engine
            .send(self.address, calldata.into(), MOCK_CONFIRMATIONS)
            .await
            .with_context(|| format!("addConsumer({id}, {consumer}) transaction failed"))?;

        tracing::info!(subscription_id = id, consumer = %consumer, "Consumer added");
        Ok(())
    }
}

/// Extract the id announced by the `SubscriptionCreated` event `mock` emitted in `receipt`.
fn subscription_created(receipt: &TransactionReceipt, mock: Address) -> Result<u64> {
    let log = receipt
        .logs
        .iter()
        .find(|log| {
            log.address == mock
                && log.topics.first() == Some(&VRFCoordinatorV2Mock::SubscriptionCreated::SIGNATURE_HASH)
        })
        .with_context(|| {
            format!(
                "No SubscriptionCreated event from {} in transaction {}",
                mock, receipt.transaction_hash
            )
        })?;

    let event = VRFCoordinatorV2Mock::SubscriptionCreated::decode_raw_log(
        log.topics.iter().copied(),
        &log.data,
        true,
    )
    .context("Malformed SubscriptionCreated event")?;

    Ok(event.subId)
}

/// ABI-encoded constructor arguments of the mock.
pub fn constructor_args(constants: &RunConstants) -> Result<Vec<u8>> {
    let base_fee = U96::uint_try_from(constants.mock_base_fee.wei()).ok()
        .context("Mock base fee does not fit in uint96")?;
    let gas_price_link = U96::uint_try_from(constants.mock_gas_price_link).ok()
        .context("Mock gas price link does not fit in uint96")?;

    Ok(VRFCoordinatorV2Mock::constructorCall {
        baseFee: base_fee,
        gasPriceLink: gas_price_link,
    }
    .abi_encode())
}

/// Deploy the mock on `network`, or reuse the one recorded by a previous run.
pub async fn provision_mock<E: DeploymentEngine>(
    engine: &E,
    store: &DeploymentStore,
    network: &str,
    constants: &RunConstants,
    redeploy: bool,
) -> Result<Deployed> {
    tracing::info!(
        network,
        base_fee = %constants.mock_base_fee,
        gas_price_link = constants.mock_gas_price_link,
        "Local network detected! Deploying mocks..."
    );

    let request = DeployRequest {
        contract: VRF_COORDINATOR_MOCK,
        constructor_args: constructor_args(constants)?.into(),
        args: vec![
            constants.mock_base_fee.wei().to_string(),
            constants.mock_gas_price_link.to_string(),
        ],
        confirmations: MOCK_CONFIRMATIONS,
    };

    deploy_or_reuse(engine, store, network, request, redeploy).await
}

/// Locate the mock recorded for `network` by an earlier run.
///
/// Returns `None` when there is no record or the recorded address no longer holds code
/// (the simulated chain was reset).
pub async fn recorded_mock<E: DeploymentEngine>(
    engine: &E,
    store: &DeploymentStore,
    network: &str,
) -> Result<Option<Address>, DeployError> {
    let Some(record) = store
        .load(network, VRF_COORDINATOR_MOCK)
        .map_err(DeployError::store)?
    else {
        return Ok(None);
    };

    if engine.has_code(record.address).await.map_err(DeployError::rpc)? {
        Ok(Some(record.address))
    } else {
        tracing::warn!(
            network,
            address = %record.address,
            "Recorded mock has no code, the chain was probably reset"
        );
        Ok(None)
    }
}
