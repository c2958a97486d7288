//! Archive extraction, run when a download lands

use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    TarGz,
    Tar,
    Zip,
    /// Other compressed tarballs (bz2, xz), left to the system `tar`
    SystemTar,
}

impl Format {
    fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar") {
            Self::Tar
        } else if name.ends_with(".zip") {
            Self::Zip
        } else {
            Self::SystemTar
        }
    }
}

/// Unpacks an archive into a directory
///
/// Files are owned by the user running the extraction, not by whoever
/// built the archive.
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub archive: PathBuf,
    pub destination: PathBuf,
}

impl Archive {
    pub fn new(name: &str, archive: impl AsRef<Path>, destination: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            archive: archive.as_ref().to_path_buf(),
            destination: destination.as_ref().to_path_buf(),
        }
    }

    fn extract(&self) -> Result<()> {
        if !self.archive.exists() {
            bail!("Archive not found: {}", self.archive.display());
        }
        fs::create_dir_all(&self.destination)
            .with_context(|| format!("Failed to create {}", self.destination.display()))?;

        let format = Format::detect(&self.archive);
        log::debug!(
            "Extracting {} ({format:?}) into {}",
            self.archive.display(),
            self.destination.display()
        );

        match format {
            Format::TarGz => {
                let file = self.open()?;
                unpack_tar(flate2::read::GzDecoder::new(file), &self.destination)
            }
            Format::Tar => unpack_tar(self.open()?, &self.destination),
            Format::Zip => {
                let mut zip = zip::ZipArchive::new(self.open()?)
                    .with_context(|| format!("Invalid zip archive: {}", self.archive.display()))?;
                zip.extract(&self.destination)
                    .with_context(|| format!("Failed to extract {}", self.archive.display()))
            }
            Format::SystemTar => {
                let archive = self.archive.to_string_lossy();
                let destination = self.destination.to_string_lossy();
                runner::run_capture(
                    "tar",
                    &["xf", &archive, "--no-same-owner", "-C", &destination],
                )
                .map(|_| ())
            }
        }
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.archive)
            .with_context(|| format!("Failed to open {}", self.archive.display()))?;
        Ok(BufReader::new(file))
    }
}

fn unpack_tar<R: std::io::Read>(reader: R, destination: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_ownerships(false);
    archive
        .unpack(destination)
        .with_context(|| format!("Failed to unpack into {}", destination.display()))
}

impl Resource for Archive {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!(
            "Extract {} into {}",
            self.archive.display(),
            self.destination.display()
        )
    }

    fn resource_type(&self) -> &'static str {
        "archive"
    }

    /// Only ever run on notification, so there is nothing to compare.
    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Absent)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.extract()?;
        Ok(ApplyResult::Created)
    }
}
