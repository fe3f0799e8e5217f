//! Run-wide configuration values.
//!
//! Everything here is constructed once at the start of a run and only read afterwards.

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use alloy_core::primitives::{
    Address, U256,
    utils::{format_ether, parse_ether},
};
use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use url::Url;

/// A fixed-point amount with 18 decimals (ether, LINK).
///
/// Serialized as a decimal string in whole units, e.g. `"0.25"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, From)]
pub struct EtherAmount(U256);

impl EtherAmount {
    /// Amount in the smallest unit (wei).
    pub const fn wei(self) -> U256 {
        self.0
    }

    /// Parse a decimal amount in whole units.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        parse_ether(s.trim())
            .map(Self)
            .map_err(|e| anyhow::anyhow!("invalid amount '{}': {}", s, e))
    }
}

impl fmt::Display for EtherAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = format_ether(self.0);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        f.write_str(if trimmed.is_empty() { "0" } else { trimmed })
    }
}

impl FromStr for EtherAmount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EtherAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EtherAmount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Float(f64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Float(value) => value.to_string(),
        };
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Constants shared by every step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConstants {
    /// Flat LINK fee the oracle mock charges per randomness request.
    pub mock_base_fee: EtherAmount,
    /// Gas-price to LINK conversion rate configured on the oracle mock.
    pub mock_gas_price_link: u64,
    /// Amount credited to a freshly created subscription on simulated networks.
    pub subscription_fund_amount: EtherAmount,
}

impl Default for RunConstants {
    fn default() -> Self {
        Self {
            // 0.25 LINK per request
            mock_base_fee: EtherAmount(U256::from(250_000_000_000_000_000u128)),
            mock_gas_price_link: 1_000_000_000,
            subscription_fund_amount: EtherAmount(U256::from(2_000_000_000_000_000_000u128)),
        }
    }
}

/// Connection settings of a named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// JSON-RPC endpoint.
    pub url: Url,
    /// Expected chain id. Cross-checked against the endpoint when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Confirmation depth for the application contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_confirmations: Option<u64>,
    /// Deployer account. Defaults to the first account managed by the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
}

impl NetworkProfile {
    /// Development node on the default local port.
    fn local(chain_id: Option<u64>) -> Self {
        Self {
            url: Url::parse("http://127.0.0.1:8545/").expect("static URL is valid"),
            chain_id,
            block_confirmations: Some(1),
            from: None,
        }
    }
}

/// Built-in network profiles.
pub fn default_networks() -> std::collections::BTreeMap<String, NetworkProfile> {
    let mut networks = std::collections::BTreeMap::new();
    networks.insert("hardhat".to_string(), NetworkProfile::local(Some(31337)));
    networks.insert("localhost".to_string(), NetworkProfile::local(Some(31337)));
    // Whatever development chain listens locally.
    networks.insert("local".to_string(), NetworkProfile::local(None));
    networks.insert("anvil".to_string(), NetworkProfile::local(None));
    networks.insert(
        "sepolia".to_string(),
        NetworkProfile {
            url: Url::parse("https://ethereum-sepolia-rpc.publicnode.com/")
                .expect("static URL is valid"),
            chain_id: Some(11155111),
            block_confirmations: Some(6),
            from: None,
        },
    );
    networks
}

/// Bounds for waiting on transaction confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    /// Delay between two receipt / block number polls.
    pub poll_interval_secs: u64,
    /// Maximum time spent waiting for a single transaction.
    pub timeout_secs: u64,
}

impl ConfirmationPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            timeout_secs: 600,
        }
    }
}

/// Default Etherscan API endpoint (multichain v2 API).
pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Source verification settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Explorer API endpoint.
    pub api_url: Url,
    /// Explorer API key. Verification is skipped when absent.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Delay between two verification status checks.
    pub poll_interval_secs: u64,
    /// Number of status checks before giving up.
    pub max_status_checks: usize,
}

impl fmt::Debug for VerifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_status_checks", &self.max_status_checks)
            .finish()
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_ETHERSCAN_API_URL).expect("static URL is valid"),
            api_key: None,
            poll_interval_secs: 5,
            max_status_checks: 12,
        }
    }
}

/// Filesystem locations used by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the compiled Hardhat artifacts.
    pub artifacts: PathBuf,
    /// Root of the persisted deployment records.
    pub deployments: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
        }
    }
}

/// Selects which deployment steps run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Tag {
    /// Every step.
    All,
    /// Oracle mock provisioning (simulated networks only).
    Mocks,
    /// Subscription provisioning, application deployment and verification.
    Raffle,
}

impl Tag {
    /// Whether `selected` enables the step labelled `self`.
    pub fn selected_by(self, selected: &[Tag]) -> bool {
        selected.iter().any(|tag| *tag == Tag::All || *tag == self)
    }
}
