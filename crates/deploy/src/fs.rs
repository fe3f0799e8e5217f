//! File system utils.

use std::path::Path;

use anyhow::Context;

pub struct FsHandler;

impl FsHandler {
    // Create a data directory if it doesn't exist and make sure it is writable
    pub fn create_data_directory(path: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(path).context("Failed to create data directory")?;
        tracing::debug!("Created data directory: {}", path.display());

        let metadata = std::fs::metadata(path).context("Failed to get metadata for directory")?;
        if metadata.permissions().readonly() {
            let mut perms = metadata.permissions();
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms)
                .context("Failed to set permissions on data directory")?;
        }

        Ok(())
    }

    /// Write `content` to `path` atomically.
    ///
    /// The content is written to a sibling temporary file which is then renamed over `path`,
    /// so readers never observe a partially written file.
    pub fn write_atomic(path: &Path, content: &[u8]) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .context("File path must have a parent directory")?;
        if !parent.exists() {
            Self::create_data_directory(parent)?;
        }

        let file_name = path
            .file_name()
            .context("File path must have a file name")?
            .to_string_lossy();
        let tmp_path = parent.join(format!(".{file_name}.tmp"));

        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let dir = TempDir::new("raffle-fs").unwrap();
        let path = dir.path().join("nested/record.json");

        FsHandler::write_atomic(&path, b"first").unwrap();
        FsHandler::write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("nested/.record.json.tmp").exists());
    }
}
