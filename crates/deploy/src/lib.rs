//! raffle-deploy - Deployment library for the VRF-backed raffle.
//!
//! This crate decides, per target network, whether to provision a local VRF coordinator mock
//! or to bind to a live coordinator, provisions the randomness subscription, deploys the raffle
//! with its constructor arguments and optionally verifies it on Etherscan.

mod deployer;
pub use deployer::{CONFIG_FILENAME, Deployer, DeploymentReport};

pub mod artifacts;
pub mod config;
pub mod contracts;
pub mod deployments;
pub mod engine;
mod error;
mod fs;
pub mod network;
pub mod params;
pub mod rpc;
pub mod services;

pub use artifacts::{ArtifactStore, BuildInfo, ContractArtifact};
pub use config::{
    ConfirmationPolicy, EtherAmount, NetworkProfile, PathsConfig, RunConstants, Tag,
    VerifyConfig,
};
pub use deployments::{DeploymentRecord, DeploymentStore};
pub use engine::{DeployOptions, Deployment, DeploymentEngine, JsonRpcEngine};
pub use error::{BoxError, DeployError};
pub use network::{NetworkDescriptor, NetworkId, classify};
pub use params::{NetworkParameters, NetworkTable};
pub use services::{
    CreatedSubscription, DeploymentArgs, DeploymentResult, EtherscanVerifier, OracleMock,
    Subscription, Verification, Verifier, VrfCoordinatorMock,
};
