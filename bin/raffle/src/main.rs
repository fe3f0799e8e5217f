//! raffle is a CLI tool to deploy the VRF-backed raffle, on development or live networks.

mod cli;

use anyhow::Result;
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::Cli;
use raffle_deploy::DeploymentReport;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let deployer = cli.load_deployer()?;

    if cli.dump_config {
        print!("{}", deployer.to_toml()?);
        return Ok(());
    }

    let report = deployer.deploy().await?;
    println!("{}", summary(&report));

    Ok(())
}

/// Render the outcome of a run.
fn summary(report: &DeploymentReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["", ""]);

    let mode = if report.is_simulated { "development" } else { "live" };
    table.add_row(vec![
        "Network".to_string(),
        format!("{} (chain {}, {mode})", report.network, report.chain_id),
    ]);

    let coordinator = report.mock.or_else(|| {
        report
            .raffle
            .as_ref()
            .map(|raffle| raffle.constructor_args.vrf_coordinator)
    });
    if let Some(coordinator) = coordinator {
        let label = if report.mock.is_some() {
            "VRF coordinator (mock)"
        } else {
            "VRF coordinator"
        };
        table.add_row(vec![label.to_string(), coordinator.to_string()]);
    }

    if let Some(subscription) = &report.subscription {
        let funded = subscription
            .funded_amount
            .map(|amount| format!(" (funded {amount})"))
            .unwrap_or_default();
        table.add_row(vec![
            "Subscription".to_string(),
            format!("{}{funded}", subscription.id),
        ]);
    }

    match &report.raffle {
        Some(raffle) => {
            let reused = if raffle.reused { " (reused)" } else { "" };
            table.add_row(vec![
                "Raffle".to_string(),
                format!("{}{reused}", raffle.contract_address),
            ]);
        }
        None => {
            table.add_row(vec!["Raffle".to_string(), "not deployed (tag not selected)".to_string()]);
        }
    }

    if let Some(verification) = &report.verification {
        table.add_row(vec!["Verification".to_string(), verification.to_string()]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::Address;
    use raffle_deploy::{
        DeploymentArgs, DeploymentResult, NetworkParameters, Subscription, Verification,
    };

    #[test]
    fn test_summary_rows() {
        let subscription = Subscription {
            id: 1,
            funded_amount: Some("2".parse().unwrap()),
        };
        let args = DeploymentArgs::assemble(
            Address::with_last_byte(1),
            &NetworkParameters::simulated(31337),
            &subscription,
        );
        let report = DeploymentReport {
            network: "hardhat".to_string(),
            chain_id: 31337,
            is_simulated: true,
            mock: Some(Address::with_last_byte(1)),
            subscription: Some(subscription),
            raffle: Some(DeploymentResult {
                contract_address: Address::with_last_byte(2),
                constructor_args: args,
                reused: false,
            }),
            verification: Some(Verification::Skipped("simulated network".to_string())),
        };

        let rendered = summary(&report).to_string();
        assert!(rendered.contains("hardhat (chain 31337, development)"));
        assert!(rendered.contains("VRF coordinator (mock)"));
        assert!(rendered.contains("1 (funded 2)"));
        assert!(rendered.contains(&Address::with_last_byte(2).to_string()));
        assert!(rendered.contains("skipped (simulated network)"));
    }
}
