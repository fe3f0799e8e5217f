//! Run configuration and the deployment pipeline.
//!
//! A [`Deployer`] is loaded once per run, then drives the steps selected by its tags against a
//! [`DeploymentEngine`] and a [`Verifier`].

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    ArtifactStore, ConfirmationPolicy, DeployError, NetworkDescriptor, NetworkId,
    NetworkParameters, NetworkProfile, NetworkTable, PathsConfig, RunConstants, Tag,
    VerifyConfig,
    config::default_networks,
    contracts::VRF_COORDINATOR_MOCK,
    deployments::DeploymentStore,
    engine::{DeploymentEngine, JsonRpcEngine},
    network::classify,
    params::default_chains,
    services::{
        DeploymentArgs, DeploymentResult, EtherscanVerifier, OracleMock, Subscription,
        Verification, Verifier, VrfCoordinatorMock, raffle, subscription, verifier, vrf_mock,
    },
};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Raffle.toml";

/// Run configuration of the raffle deployment pipeline.
///
/// Built once per run and only read afterwards. Serializes to and from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployer {
    /// Target network, by profile name or chain id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkId>,
    /// Steps to run.
    pub tags: Vec<Tag>,
    /// Deploy again even when an identical deployment is recorded.
    pub redeploy: bool,

    /// Oracle mock and subscription constants.
    pub constants: RunConstants,
    /// Artifact and deployment record locations.
    pub paths: PathsConfig,
    /// Confirmation wait bounds.
    pub confirmations: ConfirmationPolicy,
    /// Source verification settings.
    pub verify: VerifyConfig,
    /// Connection profiles, by network name.
    pub networks: BTreeMap<String, NetworkProfile>,
    /// Per-chain deployment parameters.
    pub chains: Vec<NetworkParameters>,
}

impl Default for Deployer {
    fn default() -> Self {
        Self {
            network: None,
            tags: vec![Tag::All],
            redeploy: false,
            constants: RunConstants::default(),
            paths: PathsConfig::default(),
            confirmations: ConfirmationPolicy::default(),
            verify: VerifyConfig::default(),
            networks: default_networks(),
            chains: default_chains(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    pub network: String,
    pub chain_id: u64,
    pub is_simulated: bool,
    /// Oracle mock the raffle is bound to (simulated networks only).
    pub mock: Option<Address>,
    pub subscription: Option<Subscription>,
    pub raffle: Option<DeploymentResult>,
    pub verification: Option<Verification>,
}

impl Deployer {
    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize deployer config to TOML")
    }

    /// Parse a configuration from TOML. Missing keys take their default value.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config as TOML")
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Connection profile of `id`.
    ///
    /// Names match profile keys case-insensitively; chain ids match the profile's `chain_id`.
    pub fn profile(&self, id: &NetworkId) -> Option<&NetworkProfile> {
        match id {
            NetworkId::Name(name) => self
                .networks
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, profile)| profile),
            NetworkId::ChainId(chain_id) => self
                .networks
                .values()
                .find(|profile| profile.chain_id == Some(*chain_id)),
        }
    }

    /// Classify the target network, applying the profile's confirmation depth if any.
    pub fn descriptor(&self) -> Result<NetworkDescriptor, DeployError> {
        let descriptor = classify(self.network.as_ref())?;

        Ok(
            match self
                .profile(&descriptor.id)
                .and_then(|profile| profile.block_confirmations)
            {
                Some(confirmations) => descriptor.with_confirmations(confirmations),
                None => descriptor,
            },
        )
    }

    /// Directory deployment records of `descriptor` are kept under.
    ///
    /// Names are case-insensitive, and a chain id maps to the name of the profile serving it,
    /// so every spelling of a network shares its records.
    pub fn record_key(&self, descriptor: &NetworkDescriptor) -> String {
        match &descriptor.id {
            NetworkId::Name(name) => name.to_ascii_lowercase(),
            NetworkId::ChainId(chain_id) => self
                .networks
                .iter()
                .find(|(_, profile)| profile.chain_id == Some(*chain_id))
                .map(|(key, _)| key.to_ascii_lowercase())
                .unwrap_or_else(|| chain_id.to_string()),
        }
    }

    /// Chain id of the run, cross-checked against the engine when an expectation exists.
    async fn resolve_chain_id<E: DeploymentEngine>(
        &self,
        descriptor: &NetworkDescriptor,
        engine: &E,
    ) -> Result<u64, DeployError> {
        let expected = self
            .profile(&descriptor.id)
            .and_then(|profile| profile.chain_id)
            .or_else(|| descriptor.id.chain_id());
        let actual = engine.chain_id().await.map_err(DeployError::rpc)?;

        match expected {
            Some(expected) if expected != actual => Err(DeployError::ChainMismatch {
                network: descriptor.id.to_string(),
                expected,
                actual,
            }),
            _ => Ok(actual),
        }
    }

    /// Deploy against the configured network over JSON-RPC, verifying on Etherscan.
    pub async fn deploy(self) -> Result<DeploymentReport, DeployError> {
        let descriptor = self.descriptor()?;
        let profile = self
            .profile(&descriptor.id)
            .ok_or_else(|| DeployError::MissingProfile {
                network: descriptor.id.to_string(),
            })?;

        let artifacts = ArtifactStore::new(&self.paths.artifacts);
        tracing::info!(
            network = %descriptor.id,
            url = %profile.url,
            artifacts = %artifacts.root().display(),
            "Connecting to network..."
        );

        let engine = JsonRpcEngine::connect(
            profile.url.clone(),
            profile.from,
            artifacts.clone(),
            self.confirmations.clone(),
        )
        .await
        .map_err(DeployError::rpc)?;

        let chain_id = engine.chain_id().await.map_err(DeployError::rpc)?;
        let verifier = EtherscanVerifier::new(self.verify.clone(), chain_id, artifacts)
            .map_err(DeployError::rpc)?;

        self.run(&engine, &verifier).await
    }

    /// Run the pipeline: mocks, subscription, raffle, verification.
    ///
    /// Steps run strictly in order and the first fatal error aborts the run. Verification
    /// failures are reported in the returned [`DeploymentReport`] instead.
    pub async fn run<E, V>(&self, engine: &E, verifier: &V) -> Result<DeploymentReport, DeployError>
    where
        E: DeploymentEngine,
        V: Verifier,
    {
        let descriptor = self.descriptor()?;
        let network = descriptor.id.to_string();
        let chain_id = self.resolve_chain_id(&descriptor, engine).await?;

        // Resolved before anything touches the chain.
        let table = NetworkTable::new(self.chains.iter().cloned())?;
        let params = table.resolve(&descriptor, chain_id)?;
        let store = DeploymentStore::new(&self.paths.deployments);
        let record_key = self.record_key(&descriptor);

        tracing::info!(
            network = %network,
            records = %record_key,
            chain_id,
            simulated = descriptor.is_simulated,
            confirmations = descriptor.required_confirmations,
            tags = ?self.tags,
            "Starting deployment..."
        );

        let mut report = DeploymentReport {
            network: network.clone(),
            chain_id,
            is_simulated: descriptor.is_simulated,
            mock: None,
            subscription: None,
            raffle: None,
            verification: None,
        };

        if Tag::Mocks.selected_by(&self.tags) {
            if descriptor.is_simulated {
                let deployed = vrf_mock::provision_mock(
                    engine,
                    &store,
                    &record_key,
                    &self.constants,
                    self.redeploy,
                )
                .await
                .map_err(|e| DeployError::deployment(VRF_COORDINATOR_MOCK, e))?;
                report.mock = Some(deployed.record.address);
                tracing::info!(address = %deployed.record.address, "Mocks deployed");
            } else {
                tracing::info!(network = %network, "Live network, no mocks needed");
            }
        }

        if !Tag::Raffle.selected_by(&self.tags) {
            return Ok(report);
        }

        let mock = if descriptor.is_simulated {
            let address = match report.mock {
                Some(address) => address,
                None => vrf_mock::recorded_mock(engine, &store, &record_key)
                    .await?
                    .ok_or_else(|| DeployError::MissingMock {
                        network: network.clone(),
                    })?,
            };
            report.mock = Some(address);
            Some(VrfCoordinatorMock::at(engine, address))
        } else {
            None
        };

        let subscription = subscription::provision(
            &descriptor,
            mock.as_ref(),
            &params,
            self.constants.subscription_fund_amount,
        )
        .await?;
        report.subscription = Some(subscription);

        let oracle = raffle::oracle_address(&descriptor, mock.as_ref().map(|m| m.address()), &params)?;
        let args = DeploymentArgs::assemble(oracle, &params, &subscription);
        let result = raffle::deploy(
            engine,
            &store,
            &record_key,
            &descriptor,
            args,
            self.redeploy,
        )
        .await?;

        if let Some(mock) = &mock {
            mock.add_consumer(subscription.id, result.contract_address)
                .await
                .map_err(DeployError::subscription)?;
        }

        let verification = match verifier::maybe_verify(&result, &descriptor, verifier).await {
            Ok(verification) => verification,
            Err(err) if !err.is_fatal() => {
                let reason = std::error::Error::source(&err)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| err.to_string());
                tracing::warn!(address = %result.contract_address, %reason, "Verification failed");
                Verification::Failed(reason)
            }
            Err(err) => return Err(err),
        };

        tracing::info!(
            network = %network,
            address = %result.contract_address,
            subscription_id = subscription.id,
            reused = result.reused,
            "Raffle deployed"
        );

        report.raffle = Some(result);
        report.verification = Some(verification);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let deployer = Deployer {
            network: Some(NetworkId::Name("hardhat".to_string())),
            ..Default::default()
        };

        let toml = deployer.to_toml().unwrap();
        assert!(toml.contains("network = \"hardhat\""));
        assert_eq!(Deployer::from_toml_str(&toml).unwrap(), deployer);
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut deployer = Deployer::default();
        deployer.verify.api_key = Some("SECRET".to_string());

        let toml = deployer.to_toml().unwrap();
        assert!(!toml.contains("SECRET"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let deployer = Deployer::from_toml_str(
            r#"
            network = "sepolia"
            tags = ["raffle"]
            "#,
        )
        .unwrap();

        assert_eq!(deployer.network, Some(NetworkId::Name("sepolia".to_string())));
        assert_eq!(deployer.tags, vec![Tag::Raffle]);
        assert_eq!(deployer.constants, RunConstants::default());
        assert_eq!(deployer.networks.len(), 5);
    }

    #[test]
    fn test_chain_id_network() {
        let deployer = Deployer::from_toml_str("network = \"11155111\"").unwrap();
        assert_eq!(deployer.network, Some(NetworkId::ChainId(11155111)));

        let descriptor = deployer.descriptor().unwrap();
        assert!(!descriptor.is_simulated);
        assert_eq!(descriptor.required_confirmations, 6);
        assert!(deployer.profile(&descriptor.id).is_some());
    }

    #[test]
    fn test_profile_confirmations_override() {
        let mut deployer = Deployer {
            network: Some(NetworkId::Name("Sepolia".to_string())),
            ..Default::default()
        };
        if let Some(profile) = deployer.networks.get_mut("sepolia") {
            profile.block_confirmations = Some(0);
        }

        assert_eq!(deployer.descriptor().unwrap().required_confirmations, 1);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempdir::TempDir::new("raffle-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        let deployer = Deployer {
            network: Some(NetworkId::ChainId(11155111)),
            tags: vec![Tag::Raffle],
            ..Default::default()
        };
        deployer.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("network = 11155111"));
        assert_eq!(Deployer::from_toml_str(&content).unwrap(), deployer);
    }

    #[test]
    fn test_sample_config() {
        let deployer = Deployer::from_toml_str(include_str!("../../../Raffle.toml")).unwrap();

        let table = NetworkTable::new(deployer.chains.clone()).unwrap();
        assert_eq!(table.lookup(11155111).unwrap().subscription_id, Some(588));
        assert_eq!(deployer.network, Some(NetworkId::Name("hardhat".to_string())));
        assert_eq!(deployer.descriptor().unwrap().required_confirmations, 1);
    }

    #[test]
    fn test_missing_network() {
        assert!(matches!(
            Deployer::default().descriptor(),
            Err(DeployError::MissingNetworkContext)
        ));
    }

    #[tokio::test]
    async fn test_deploy_unknown_profile() {
        let deployer = Deployer {
            network: Some(NetworkId::Name("mainnet".to_string())),
            ..Default::default()
        };

        assert!(matches!(
            deployer.deploy().await,
            Err(DeployError::MissingProfile { ref network }) if network == "mainnet"
        ));
    }

    #[test]
    fn test_every_simulated_name_has_a_profile() {
        let deployer = Deployer::default();
        for name in crate::network::SIMULATED_NETWORK_NAMES {
            let profile = deployer
                .profile(&NetworkId::Name(name.to_string()))
                .unwrap_or_else(|| panic!("no profile for {name}"));
            assert_eq!(profile.block_confirmations, Some(1));
        }

        // Any local chain is accepted on the generic names.
        assert_eq!(deployer.networks["local"].chain_id, None);
        assert_eq!(deployer.networks["anvil"].chain_id, None);
    }

    #[tokio::test]
    async fn test_deploy_local_connects() {
        let mut deployer = Deployer {
            network: Some(NetworkId::Name("local".to_string())),
            ..Default::default()
        };
        // Nothing listens there, so the run stops at the connection.
        if let Some(profile) = deployer.networks.get_mut("local") {
            profile.url = "http://127.0.0.1:1/".parse().unwrap();
        }

        assert!(matches!(deployer.deploy().await, Err(DeployError::Rpc(_))));
    }

    #[test]
    fn test_record_key() {
        let deployer = Deployer::default();
        let key = |id: &str| {
            let descriptor = classify(Some(&id.parse::<NetworkId>().unwrap())).unwrap();
            deployer.record_key(&descriptor)
        };

        assert_eq!(key("hardhat"), "hardhat");
        assert_eq!(key("Hardhat"), "hardhat");
        assert_eq!(key("31337"), "hardhat");
        assert_eq!(key("11155111"), "sepolia");
        assert_eq!(key("5"), "5");
    }
}
