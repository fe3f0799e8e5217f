//! Raffle deployment.

use alloy_core::{
    primitives::{Address, B256, U256},
    sol_types::SolValue,
};
use serde::Serialize;

use crate::{
    DeployError, EtherAmount, NetworkDescriptor, NetworkParameters,
    contracts::RAFFLE,
    deployments::{DeployRequest, DeploymentStore, deploy_or_reuse},
    engine::DeploymentEngine,
    services::subscription::Subscription,
};

/// Constructor arguments of the raffle, in constructor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentArgs {
    pub vrf_coordinator: Address,
    pub entrance_fee: EtherAmount,
    pub gas_lane: B256,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Upkeep interval, in seconds.
    pub interval: U256,
}

impl DeploymentArgs {
    /// Assemble the arguments from the resolved oracle, the chain parameters and the
    /// provisioned subscription.
    pub fn assemble(
        vrf_coordinator: Address,
        params: &NetworkParameters,
        subscription: &Subscription,
    ) -> Self {
        Self {
            vrf_coordinator,
            entrance_fee: params.entrance_fee,
            gas_lane: params.gas_lane,
            subscription_id: subscription.id,
            callback_gas_limit: params.callback_gas_limit,
            interval: U256::from(params.interval),
        }
    }

    /// Constructor calldata: `(address, uint256, bytes32, uint64, uint32, uint256)`.
    pub fn abi_encode(&self) -> Vec<u8> {
        (
            self.vrf_coordinator,
            self.entrance_fee.wei(),
            self.gas_lane,
            self.subscription_id,
            self.callback_gas_limit,
            self.interval,
        )
            .abi_encode_params()
    }

    /// The six arguments as strings, in positional order. Amounts are in wei.
    pub fn to_positional(&self) -> [String; 6] {
        [
            self.vrf_coordinator.to_string(),
            self.entrance_fee.wei().to_string(),
            self.gas_lane.to_string(),
            self.subscription_id.to_string(),
            self.callback_gas_limit.to_string(),
            self.interval.to_string(),
        ]
    }
}

/// A deployed raffle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub contract_address: Address,
    pub constructor_args: DeploymentArgs,
    /// Whether a previous deployment with identical arguments was reused.
    pub reused: bool,
}

/// Pick the oracle the raffle binds to.
///
/// Simulated networks use the mock provisioned for this run; live networks use the configured
/// coordinator.
pub fn oracle_address(
    descriptor: &NetworkDescriptor,
    mock: Option<Address>,
    params: &NetworkParameters,
) -> Result<Address, DeployError> {
    if descriptor.is_simulated {
        mock.ok_or_else(|| DeployError::MissingMock {
            network: descriptor.id.to_string(),
        })
    } else {
        params.vrf_coordinator.ok_or_else(|| {
            DeployError::InvalidConfig(format!(
                "chain {} ({}) has no `vrf_coordinator`",
                params.chain_id, params.name
            ))
        })
    }
}

/// Deploy the raffle and wait for the network's confirmation depth.
///
/// `network` keys the deployment record.
pub async fn deploy<E: DeploymentEngine>(
    engine: &E,
    store: &DeploymentStore,
    network: &str,
    descriptor: &NetworkDescriptor,
    args: DeploymentArgs,
    redeploy: bool,
) -> Result<DeploymentResult, DeployError> {
    tracing::info!(
        network,
        vrf_coordinator = %args.vrf_coordinator,
        subscription_id = args.subscription_id,
        entrance_fee = %args.entrance_fee,
        confirmations = descriptor.required_confirmations,
        "Deploying Raffle..."
    );

    let request = DeployRequest {
        contract: RAFFLE,
        constructor_args: args.abi_encode().into(),
        args: args.to_positional().to_vec(),
        confirmations: descriptor.required_confirmations,
    };

    let deployed = deploy_or_reuse(engine, store, network, request, redeploy)
        .await
        .map_err(|e| DeployError::deployment(RAFFLE, e))?;

    Ok(DeploymentResult {
        contract_address: deployed.record.address,
        constructor_args: args,
        reused: deployed.reused,
    })
}
