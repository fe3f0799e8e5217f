use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use raffle_deploy::{CONFIG_FILENAME, Deployer, NetworkId, NetworkProfile, Tag};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Prefix of the environment variables overriding the configuration file.
const ENV_PREFIX: &str = "RAFFLE_";

#[derive(Parser)]
#[command(name = "raffle")]
#[command(
    author,
    version,
    about = "Deploy the VRF-backed raffle, with local VRF mocks on development networks"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "RAFFLE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Target network, either a configured network name or a chain id.
    ///
    /// `hardhat`, `localhost`, `local` and `anvil` (and chain ids 31337, 313337, 1337) are
    /// development networks: the VRF coordinator mock is deployed and the subscription is
    /// created and funded locally.
    #[arg(short, long)]
    pub network: Option<NetworkId>,

    /// Path to a configuration file.
    ///
    /// If not provided, `Raffle.toml` is loaded from the working directory when present.
    #[arg(short, long, alias = "conf", env = "RAFFLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Steps to run, comma separated (`all`, `mocks`, `raffle`).
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<Tag>,

    /// JSON-RPC endpoint of the target network, overriding its configured URL.
    #[arg(long, alias = "rpc", env = "RAFFLE_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Deployer account. Defaults to the first account managed by the node.
    #[arg(long, env = "RAFFLE_FROM")]
    pub from: Option<Address>,

    /// Redeploy contracts even when an identical deployment is recorded.
    #[arg(long, default_value_t = false)]
    pub redeploy: bool,

    /// Etherscan API key. Verification is skipped without one.
    #[arg(long, env = "ETHERSCANAPIKEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Print the resolved configuration as TOML and exit.
    #[arg(long)]
    pub dump_config: bool,
}

impl Cli {
    /// Resolve the run configuration.
    ///
    /// Layers, lowest precedence first: built-in defaults, the configuration file,
    /// `RAFFLE_*` environment variables (nested keys separated by `__`), command line flags.
    pub fn load_deployer(&self) -> Result<Deployer> {
        let file = match &self.config {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file not found: {}", path.display())
            }
            Some(path) => path.clone(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let mut deployer: Deployer = Figment::from(Serialized::defaults(Deployer::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration (file: {})", file.display()))?;

        self.apply(&mut deployer)?;

        tracing::debug!(config = %file.display(), network = ?deployer.network, "Configuration loaded");
        Ok(deployer)
    }

    fn apply(&self, deployer: &mut Deployer) -> Result<()> {
        if let Some(network) = &self.network {
            deployer.network = Some(network.clone());
        }
        if !self.tags.is_empty() {
            deployer.tags = self.tags.clone();
        }
        if self.redeploy {
            deployer.redeploy = true;
        }
        if let Some(api_key) = &self.etherscan_api_key {
            deployer.verify.api_key = Some(api_key.clone());
        }

        if self.rpc_url.is_none() && self.from.is_none() {
            return Ok(());
        }

        let network = deployer
            .network
            .clone()
            .context("`--rpc-url` and `--from` require a target network")?;

        match profile_key(deployer, &network) {
            Some(key) => {
                if let Some(profile) = deployer.networks.get_mut(&key) {
                    if let Some(url) = &self.rpc_url {
                        profile.url = url.clone();
                    }
                    if self.from.is_some() {
                        profile.from = self.from;
                    }
                }
            }
            None => {
                let url = self.rpc_url.clone().with_context(|| {
                    format!("Network {network} is not configured, `--rpc-url` is required")
                })?;
                deployer.networks.insert(
                    network.to_string(),
                    NetworkProfile {
                        url,
                        chain_id: network.chain_id(),
                        block_confirmations: None,
                        from: self.from,
                    },
                );
            }
        }

        Ok(())
    }
}

/// Key of the profile `network` resolves to.
fn profile_key(deployer: &Deployer, network: &NetworkId) -> Option<String> {
    deployer
        .networks
        .iter()
        .find(|(key, profile)| match network {
            NetworkId::Name(name) => key.eq_ignore_ascii_case(name),
            NetworkId::ChainId(chain_id) => profile.chain_id == Some(*chain_id),
        })
        .map(|(key, _)| key.clone())
}
