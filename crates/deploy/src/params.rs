//! Per-network deployment parameters.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256, U256, address, b256};
use serde::{Deserialize, Serialize};

use crate::{
    DeployError, EtherAmount,
    network::{NetworkDescriptor, NetworkId},
};

/// Key hash of the 500 gwei gas lane, shared by Sepolia and the local defaults.
pub const DEFAULT_GAS_LANE: B256 =
    b256!("474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c");

/// VRF v2 coordinator on Sepolia.
pub const SEPOLIA_VRF_COORDINATOR: Address = address!("8103B0A8A00be2DDC778e6e7eaa21791Cd364625");

pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;

/// Default upkeep interval, in seconds.
pub const DEFAULT_INTERVAL: u64 = 30;

/// Parameters required to deploy the raffle on a given chain.
///
/// `vrf_coordinator` and `subscription_id` are present on live networks only; on simulated
/// networks both are provisioned during the run and must be left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub chain_id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_coordinator: Option<Address>,
    pub entrance_fee: EtherAmount,
    pub gas_lane: B256,
    pub callback_gas_limit: u32,
    /// Upkeep interval, in seconds.
    pub interval: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<u64>,
}

impl NetworkParameters {
    /// Parameters used for a simulated chain without a table entry.
    pub fn simulated(chain_id: u64) -> Self {
        Self {
            chain_id,
            name: "hardhat".to_string(),
            vrf_coordinator: None,
            entrance_fee: EtherAmount::from(U256::from(10_000_000_000_000_000u128)),
            gas_lane: DEFAULT_GAS_LANE,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            interval: DEFAULT_INTERVAL,
            subscription_id: None,
        }
    }

    fn is_simulated(&self) -> bool {
        NetworkId::ChainId(self.chain_id).is_simulated()
            || NetworkId::Name(self.name.clone()).is_simulated()
    }

    fn validate(&self) -> Result<(), DeployError> {
        let simulated = self.is_simulated();
        let invalid = |reason: &str| {
            Err(DeployError::InvalidConfig(format!(
                "chain {} ({}): {}",
                self.chain_id, self.name, reason
            )))
        };

        match (simulated, self.vrf_coordinator, self.subscription_id) {
            (false, None, _) => invalid("live networks require `vrf_coordinator`"),
            (false, _, None) => invalid("live networks require `subscription_id`"),
            (true, Some(_), _) => invalid("simulated networks provision their own `vrf_coordinator`"),
            (true, _, Some(_)) => invalid("simulated networks create their own `subscription_id`"),
            _ => Ok(()),
        }
    }
}

/// Built-in table entries.
pub fn default_chains() -> Vec<NetworkParameters> {
    vec![NetworkParameters::simulated(31337)]
}

/// Immutable lookup table from chain id to [`NetworkParameters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTable {
    entries: BTreeMap<u64, NetworkParameters>,
}

impl NetworkTable {
    /// Build the table, enforcing the per-entry schema and rejecting duplicate chain ids.
    pub fn new(entries: impl IntoIterator<Item = NetworkParameters>) -> Result<Self, DeployError> {
        let mut table = BTreeMap::new();

        for entry in entries {
            entry.validate()?;
            let chain_id = entry.chain_id;
            if table.insert(chain_id, entry).is_some() {
                return Err(DeployError::InvalidConfig(format!(
                    "chain {chain_id} is configured more than once"
                )));
            }
        }

        Ok(Self { entries: table })
    }

    /// Look up the parameters registered for `chain_id`.
    pub fn lookup(&self, chain_id: u64) -> Result<NetworkParameters, DeployError> {
        self.entries
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| DeployError::UnknownNetwork {
                network: chain_id.to_string(),
            })
    }

    /// Resolve the parameters for a run.
    ///
    /// A missing entry is fatal on live networks. Simulated networks fall back to
    /// [`NetworkParameters::simulated`] since everything oracle-related is provisioned locally.
    pub fn resolve(
        &self,
        descriptor: &NetworkDescriptor,
        chain_id: u64,
    ) -> Result<NetworkParameters, DeployError> {
        match self.lookup(chain_id) {
            Ok(params) => Ok(params),
            Err(_) if descriptor.is_simulated => {
                tracing::warn!(
                    network = %descriptor.id,
                    chain_id,
                    "No parameters registered for simulated chain, using local defaults"
                );
                Ok(NetworkParameters::simulated(chain_id))
            }
            Err(err) => Err(err),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
