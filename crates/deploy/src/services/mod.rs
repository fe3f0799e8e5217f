//! Pipeline steps.
//!
//! Each step is in its own module and runs strictly after the previous one:
//! - `vrf_mock` - oracle mock provisioning (simulated networks only)
//! - `subscription` - subscription creation and funding, or lookup on live networks
//! - `raffle` - constructor argument assembly and application deployment
//! - `verifier` - source verification of the deployed application (live networks only)

pub mod raffle;
pub mod subscription;
pub mod verifier;
pub mod vrf_mock;

// Re-export commonly used types
pub use raffle::{DeploymentArgs, DeploymentResult};
pub use subscription::Subscription;
pub use verifier::{EtherscanVerifier, Verification, Verifier};
pub use vrf_mock::{CreatedSubscription, OracleMock, VrfCoordinatorMock};
