//! Remote file resource - download once, never refresh

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Ownership, Resource, ResourceState};

/// Largest download accepted
const MAX_DOWNLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// A file fetched over HTTP if it is not already on disk
///
/// An existing file is never compared against the remote copy.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub source: String,
    pub path: PathBuf,
    pub ownership: Ownership,
}

impl RemoteFile {
    pub fn new(source: &str, path: impl AsRef<Path>) -> Self {
        Self {
            source: source.to_string(),
            path: path.as_ref().to_path_buf(),
            ownership: Ownership::default(),
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    fn download(&self) -> Result<Vec<u8>> {
        let agent = ureq::Agent::new_with_defaults();

        let mut response = agent
            .get(&self.source)
            .header("User-Agent", concat!("hearth/", env!("CARGO_PKG_VERSION")))
            .call()
            .with_context(|| format!("Failed to download {}", self.source))?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_DOWNLOAD_SIZE)
            .read_to_vec()
            .context("Failed to read response body")
    }

    /// Write next to the target and rename, so a partial download never
    /// looks like a finished one
    fn store(&self, bytes: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .context("Failed to write download")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to move download to {}", self.path.display()))?;

        self.ownership.apply(&self.path)
    }
}

impl Resource for RemoteFile {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("Download {}", self.source)
    }

    fn resource_type(&self) -> &'static str {
        "remote_file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.path.exists() {
            Ok(ResourceState::present())
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.path.exists() {
            return Ok(ApplyResult::NoChange);
        }

        let bytes = self.download()?;
        log::info!(
            "Downloaded {} bytes from {}",
            bytes.len(),
            self.source
        );
        self.store(&bytes)?;
        Ok(ApplyResult::Created)
    }
}
