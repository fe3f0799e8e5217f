//! ABI bindings for the contracts deployed by a run.

use alloy_core::sol;

/// Artifact name of the VRF coordinator mock.
pub const VRF_COORDINATOR_MOCK: &str = "VRFCoordinatorV2Mock";

/// Artifact name of the raffle contract.
pub const RAFFLE: &str = "Raffle";

sol! {
    /// Local stand-in for the Chainlink VRF v2 coordinator.
    #[derive(Debug, PartialEq, Eq)]
    contract VRFCoordinatorV2Mock {
        constructor(uint96 baseFee, uint96 gasPriceLink);

        event SubscriptionCreated(uint64 indexed subId, address owner);
        event SubscriptionFunded(uint64 indexed subId, uint256 oldBalance, uint256 newBalance);
        event ConsumerAdded(uint64 indexed subId, address consumer);

        function createSubscription() external returns (uint64 subId);
        function fundSubscription(uint64 subId, uint96 amount) external;
        function addConsumer(uint64 subId, address consumer) external;
    }
}
