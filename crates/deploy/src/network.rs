//! Network classification.
//!
//! A network is either *simulated* (ephemeral, locally controlled, free) or *live*
//! (persistent, externally observed, costs real fees). The classification gates every
//! later decision of a run: whether oracle mocks are provisioned, how many confirmations
//! are awaited and whether the contract is submitted for source verification.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Network names that always denote a simulated network.
pub const SIMULATED_NETWORK_NAMES: &[&str] = &["hardhat", "localhost", "local", "anvil"];

/// Chain ids that always denote a simulated network.
pub const SIMULATED_CHAIN_IDS: &[u64] = &[31337, 313337, 1337];

/// Confirmations awaited on simulated networks unless configured otherwise.
pub const SIMULATED_CONFIRMATIONS: u64 = 1;

/// Confirmations awaited on live networks unless configured otherwise.
pub const LIVE_CONFIRMATIONS: u64 = 6;

/// Identifier of a target network, either its name or its chain id.
///
/// Numeric strings deserialize as chain ids, so `"31337"` and `31337` are equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum NetworkId {
    ChainId(u64),
    Name(String),
}

impl NetworkId {
    /// Whether this identifier is in the known simulated set.
    pub fn is_simulated(&self) -> bool {
        match self {
            Self::ChainId(id) => SIMULATED_CHAIN_IDS.contains(id),
            Self::Name(name) => SIMULATED_NETWORK_NAMES
                .iter()
                .any(|known| known.eq_ignore_ascii_case(name)),
        }
    }

    /// The chain id, if the identifier is numeric.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Self::ChainId(id) => Some(*id),
            Self::Name(_) => None,
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainId(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for NetworkId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u64>() {
            Ok(id) => Self::ChainId(id),
            Err(_) => Self::Name(s.to_string()),
        })
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            ChainId(u64),
            Name(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::ChainId(id) => Self::ChainId(id),
            Raw::Name(name) => match name.parse() {
                Ok(id) => id,
                Err(never) => match never {},
            },
        })
    }
}

/// Classification of the target network, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub id: NetworkId,
    pub is_simulated: bool,
    /// Confirmation depth awaited for the application contract. Always at least 1.
    pub required_confirmations: u64,
}

impl NetworkDescriptor {
    /// Override the confirmation depth. Values below 1 are raised to 1.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.required_confirmations = confirmations.max(1);
        self
    }
}

/// Classify a network identifier.
///
/// Membership in the known simulated set decides the branch; anything else is live.
/// Fails with [`DeployError::MissingNetworkContext`] when no identifier (or a blank name)
/// is supplied.
pub fn classify(id: Option<&NetworkId>) -> Result<NetworkDescriptor, DeployError> {
    let id = match id {
        Some(NetworkId::Name(name)) if name.trim().is_empty() => {
            return Err(DeployError::MissingNetworkContext);
        }
        Some(id) => id.clone(),
        None => return Err(DeployError::MissingNetworkContext),
    };

    let is_simulated = id.is_simulated();
    let required_confirmations = if is_simulated {
        SIMULATED_CONFIRMATIONS
    } else {
        LIVE_CONFIRMATIONS
    };

    Ok(NetworkDescriptor {
        id,
        is_simulated,
        required_confirmations,
    })
}
