//! Compiled contract artifacts, in the Hardhat output layout.
//!
//! ```text
//! artifacts/
//! ├── build-info/<hash>.json
//! └── contracts/Raffle.sol/
//!     ├── Raffle.json
//!     └── Raffle.dbg.json
//! ```

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// A compiled contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    #[serde(default)]
    pub abi: Value,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// `<source>:<contract>`, as expected by explorers and compilers.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// Compiler input and version a contract was built with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    /// Standard JSON compiler input.
    pub input: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// Read-only view over an artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the artifact file of `contract`.
    ///
    /// Fails if no artifact or more than one artifact carries that name.
    pub fn find(&self, contract: &str) -> Result<PathBuf> {
        let file_name = format!("{contract}.json");
        let mut matches = Vec::new();
        collect_artifacts(&self.root, &file_name, &mut matches)
            .with_context(|| format!("Failed to scan artifacts in {}", self.root.display()))?;

        match matches.len() {
            0 => anyhow::bail!(
                "No artifact found for {} in {} (did you compile the contracts?)",
                contract,
                self.root.display()
            ),
            1 => Ok(matches.remove(0)),
            _ => anyhow::bail!(
                "Artifact name {} is ambiguous: {}",
                contract,
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Load the artifact of `contract`.
    pub fn load(&self, contract: &str) -> Result<ContractArtifact> {
        let path = self.find(contract)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: ContractArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "{} has no bytecode (abstract contract or interface?)",
                artifact.fully_qualified_name()
            );
        }

        Ok(artifact)
    }

    /// Load the build info `contract` was compiled from.
    pub fn build_info(&self, contract: &str) -> Result<BuildInfo> {
        let artifact_path = self.find(contract)?;
        let dbg_path = artifact_path.with_file_name(format!("{contract}.dbg.json"));
        let content = std::fs::read_to_string(&dbg_path)
            .with_context(|| format!("Failed to read {}", dbg_path.display()))?;
        let dbg: DebugFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;

        let parent = dbg_path
            .parent()
            .context("Debug file path must have a parent directory")?;
        let build_info_path = parent.join(dbg.build_info);
        let content = std::fs::read_to_string(&build_info_path)
            .with_context(|| format!("Failed to read {}", build_info_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build info {}", build_info_path.display()))
    }
}

fn collect_artifacts(dir: &Path, file_name: &str, matches: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == "build-info") {
                continue;
            }
            collect_artifacts(&path, file_name, matches)?;
        } else if path.file_name().is_some_and(|name| name == file_name) {
            matches.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempdir::TempDir;

    /// Write a minimal Hardhat artifact tree for `contract` under `root`.
    pub(crate) fn write_artifact(root: &Path, source: &str, contract: &str, bytecode: &str) {
        let dir = root.join(source);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::create_dir_all(root.join("build-info")).unwrap();

        let artifact = serde_json::json!({
            "_format": "hh-sol-artifact-1",
            "contractName": contract,
            "sourceName": source,
            "abi": [],
            "bytecode": bytecode,
            "deployedBytecode": "0x",
        });
        std::fs::write(dir.join(format!("{contract}.json")), artifact.to_string()).unwrap();

        let depth = source.split('/').count();
        let build_info = format!("{}build-info/abc123.json", "../".repeat(depth));
        let dbg = serde_json::json!({ "_format": "hh-sol-dbg-1", "buildInfo": build_info });
        std::fs::write(dir.join(format!("{contract}.dbg.json")), dbg.to_string()).unwrap();

        let info = serde_json::json!({
            "solcVersion": "0.8.24",
            "solcLongVersion": "0.8.24+commit.e11b9ed9",
            "input": { "language": "Solidity", "sources": { source: { "content": "contract X {}" } } },
        });
        std::fs::write(root.join("build-info/abc123.json"), info.to_string()).unwrap();
    }

    #[test]
    fn test_load_artifact() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write_artifact(dir.path(), "contracts/Raffle.sol", "Raffle", "0x6080604052");

        let store = ArtifactStore::new(dir.path());
        let artifact = store.load("Raffle").unwrap();
        assert_eq!(artifact.contract_name, "Raffle");
        assert_eq!(artifact.fully_qualified_name(), "contracts/Raffle.sol:Raffle");
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write_artifact(dir.path(), "contracts/Raffle.sol", "Raffle", "0x6080604052");

        let err = ArtifactStore::new(dir.path()).load("Lottery").unwrap_err();
        assert!(err.to_string().contains("No artifact found for Lottery"));
    }

    #[test]
    fn test_interface_without_bytecode() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write_artifact(dir.path(), "contracts/IRaffle.sol", "IRaffle", "0x");

        assert!(ArtifactStore::new(dir.path()).load("IRaffle").is_err());
    }

    #[test]
    fn test_ambiguous_artifact() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write_artifact(dir.path(), "contracts/Raffle.sol", "Raffle", "0x60");
        write_artifact(dir.path(), "contracts/v2/Raffle.sol", "Raffle", "0x60");

        let err = ArtifactStore::new(dir.path()).find("Raffle").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_build_info() {
        let dir = TempDir::new("raffle-artifacts").unwrap();
        write_artifact(dir.path(), "contracts/Raffle.sol", "Raffle", "0x60");

        let info = ArtifactStore::new(dir.path()).build_info("Raffle").unwrap();
        assert_eq!(info.solc_long_version, "0.8.24+commit.e11b9ed9");
        assert_eq!(info.input["language"], "Solidity");
    }
}
