//! Etherscan v2 verification client.

use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;

use super::Verifier;
use crate::{ArtifactStore, VerifyConfig, services::raffle::DeploymentArgs};

/// Timeout for explorer requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// Accepted `verifysourcecode` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    /// Verification queued under this GUID.
    Queued(String),
    AlreadyVerified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum VerifyStatus {
    Verified,
    Pending,
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
enum StatusError {
    #[error("verification still pending")]
    Pending,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn is_already_verified(result: &str) -> bool {
    result.to_ascii_lowercase().contains("already verified")
}

fn parse_submission(response: EtherscanResponse) -> Result<Submission> {
    if response.status == "1" {
        return Ok(Submission::Queued(response.result));
    }

    if is_already_verified(&response.result) {
        return Ok(Submission::AlreadyVerified);
    }

    anyhow::bail!(
        "Etherscan rejected the submission: {} ({})",
        response.result,
        response.message
    )
}

fn parse_status(response: EtherscanResponse) -> VerifyStatus {
    let result = response.result;

    if response.status == "1" || is_already_verified(&result) {
        VerifyStatus::Verified
    } else if result.to_ascii_lowercase().contains("pending") {
        VerifyStatus::Pending
    } else {
        VerifyStatus::Failed(result)
    }
}

/// [`Verifier`] backed by the Etherscan v2 multichain API.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    config: VerifyConfig,
    chain_id: u64,
    artifacts: ArtifactStore,
}

impl EtherscanVerifier {
    pub fn new(config: VerifyConfig, chain_id: u64, artifacts: ArtifactStore) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            chain_id,
            artifacts,
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("No Etherscan API key configured")
    }

    async fn submit(
        &self,
        api_key: &str,
        address: Address,
        contract: &str,
        args: &DeploymentArgs,
    ) -> Result<Submission> {
        let artifact = self.artifacts.load(contract)?;
        let build_info = self.artifacts.build_info(contract)?;

        let source_code = serde_json::to_string(&build_info.input)
            .context("Failed to serialize compiler input")?;
        let contract_name = artifact.fully_qualified_name();
        let compiler_version = format!("v{}", build_info.solc_long_version);
        let constructor_args = hex::encode(args.abi_encode());
        let address = address.to_string();

        tracing::debug!(
            contract = %contract_name,
            compiler = %compiler_version,
            chain_id = self.chain_id,
            "Submitting source code to Etherscan"
        );

        let response: EtherscanResponse = self
            .client
            .post(self.config.api_url.clone())
            .query(&[("chainid", self.chain_id.to_string())])
            .form(&[
                ("apikey", api_key),
                ("module", "contract"),
                ("action", "verifysourcecode"),
                ("codeformat", "solidity-standard-json-input"),
                ("sourceCode", source_code.as_str()),
                ("contractaddress", address.as_str()),
                ("contractname", contract_name.as_str()),
                ("compilerversion", compiler_version.as_str()),
                // Misspelling is part of the Etherscan API.
                ("constructorArguements", constructor_args.as_str()),
            ])
            .send()
            .await
            .context("Failed to send verifysourcecode request")?
            .error_for_status()
            .context("Etherscan verifysourcecode request failed")?
            .json()
            .await
            .context("Failed to parse verifysourcecode response")?;

        parse_submission(response)
    }

    async fn check_status(&self, api_key: &str, guid: &str) -> Result<(), StatusError> {
        let chain_id = self.chain_id.to_string();
        let response: EtherscanResponse = self
            .client
            .get(self.config.api_url.clone())
            .query(&[
                ("chainid", chain_id.as_str()),
                ("apikey", api_key),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to send checkverifystatus request")?
            .error_for_status()
            .context("Etherscan checkverifystatus request failed")?
            .json()
            .await
            .context("Failed to parse checkverifystatus response")?;

        match parse_status(response) {
            VerifyStatus::Verified => Ok(()),
            VerifyStatus::Pending => Err(StatusError::Pending),
            VerifyStatus::Failed(reason) => {
                Err(anyhow::anyhow!("Etherscan verification failed: {reason}").into())
            }
        }
    }
}

impl Verifier for EtherscanVerifier {
    fn has_credential(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn verify(&self, address: Address, contract: &str, args: &DeploymentArgs) -> Result<()> {
        let api_key = self.api_key()?;

        let guid = match self.submit(api_key, address, contract, args).await? {
            Submission::AlreadyVerified => {
                tracing::info!(address = %address, "Contract is already verified");
                return Ok(());
            }
            Submission::Queued(guid) => guid,
        };

        tracing::info!(address = %address, guid = %guid, "Verification submitted, waiting for result");

        let guid = guid.as_str();
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::from_secs(self.config.poll_interval_secs))
            .with_max_times(self.config.max_status_checks);

        (move || async move { self.check_status(api_key, guid).await })
            .retry(backoff)
            .when(|e| matches!(e, StatusError::Pending))
            .notify(|_, delay| tracing::trace!(guid, ?delay, "Verification pending, retrying..."))
            .await
            .map_err(|e| match e {
                StatusError::Pending => anyhow::anyhow!(
                    "Verification still pending after {} status checks",
                    self.config.max_status_checks
                ),
                StatusError::Other(e) => e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};

    fn response(status: &str, result: &str) -> EtherscanResponse {
        EtherscanResponse {
            status: status.to_string(),
            message: if status == "1" { "OK" } else { "NOTOK" }.to_string(),
            result: result.to_string(),
        }
    }

    #[test]
    fn test_submission_queued() {
        let submission = parse_submission(response("1", "ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn")).unwrap();
        assert_eq!(
            submission,
            Submission::Queued("ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn".to_string())
        );
    }

    #[test]
    fn test_submission_already_verified() {
        let submission = parse_submission(response("0", "Contract source code already verified")).unwrap();
        assert_eq!(submission, Submission::AlreadyVerified);
    }

    #[test]
    fn test_submission_rejected() {
        let err = parse_submission(response("0", "Invalid API Key")).unwrap_err();
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(parse_status(response("1", "Pass - Verified")), VerifyStatus::Verified);
        assert_eq!(parse_status(response("0", "Already Verified")), VerifyStatus::Verified);
        assert_eq!(parse_status(response("0", "Pending in queue")), VerifyStatus::Pending);
        assert_eq!(
            parse_status(response("0", "Fail - Unable to verify")),
            VerifyStatus::Failed("Fail - Unable to verify".to_string())
        );
    }

    #[test]
    fn test_response_deserialization() {
        let response: EtherscanResponse =
            serde_json::from_str(r#"{"status":"0","message":"NOTOK","result":"Pending in queue"}"#)
                .unwrap();
        assert_eq!(parse_status(response), VerifyStatus::Pending);
    }

    #[test]
    fn test_credential_detection() {
        let artifacts = ArtifactStore::new("artifacts");

        let verifier = EtherscanVerifier::new(VerifyConfig::default(), 11155111, artifacts.clone()).unwrap();
        assert!(!verifier.has_credential());

        let config = VerifyConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!EtherscanVerifier::new(config, 11155111, artifacts.clone()).unwrap().has_credential());

        let config = VerifyConfig {
            api_key: Some("ABC123".to_string()),
            ..Default::default()
        };
        assert!(EtherscanVerifier::new(config, 11155111, artifacts).unwrap().has_credential());
    }

    #[tokio::test]
    async fn test_status_http_error() {
        let app = Router::new().route(
            "/",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "Max rate limit reached") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = VerifyConfig {
            api_url: format!("http://{addr}/").parse().unwrap(),
            api_key: Some("ABC123".to_string()),
            ..Default::default()
        };
        let verifier = EtherscanVerifier::new(config, 11155111, ArtifactStore::new("artifacts")).unwrap();

        match verifier.check_status("ABC123", "guid").await {
            Err(StatusError::Other(err)) => {
                assert!(err.to_string().contains("checkverifystatus request failed"));
                assert!(format!("{err:#}").contains("429"));
            }
            other => panic!("unexpected status outcome: {other:?}"),
        }
    }
}
