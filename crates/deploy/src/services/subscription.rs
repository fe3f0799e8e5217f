//! Subscription provisioning.

use serde::Serialize;

use crate::{
    DeployError, EtherAmount, NetworkDescriptor, NetworkParameters,
    services::vrf_mock::OracleMock,
};

/// A randomness subscription the application contract is billed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: u64,
    /// Amount credited by this run. `None` for live subscriptions, which are funded externally.
    pub funded_amount: Option<EtherAmount>,
}

/// Create and fund a subscription on simulated networks, or resolve the configured one on
/// live networks.
///
/// Live subscriptions are never funded by this tool.
pub async fn provision<M: OracleMock>(
    descriptor: &NetworkDescriptor,
    mock: Option<&M>,
    params: &NetworkParameters,
    fund_amount: EtherAmount,
) -> Result<Subscription, DeployError> {
    if !descriptor.is_simulated {
        let id = params
            .subscription_id
            .ok_or_else(|| DeployError::InvalidConfig(format!(
                "chain {} ({}) has no `subscription_id`",
                params.chain_id, params.name
            )))?;
        tracing::info!(network = %descriptor.id, subscription_id = id, "Using existing subscription");
        return Ok(Subscription {
            id,
            funded_amount: None,
        });
    }

    let mock = mock.ok_or_else(|| DeployError::MissingMock {
        network: descriptor.id.to_string(),
    })?;

    let created = mock
        .create_subscription()
        .await
        .map_err(DeployError::subscription)?;

    mock.fund_subscription(created.id, fund_amount.wei())
        .await
        .map_err(DeployError::subscription)?;

    Ok(Subscription {
        id: created.id,
        funded_amount: Some(fund_amount),
    })
}
