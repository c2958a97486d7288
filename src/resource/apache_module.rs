//! Apache module resource

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use super::web_app::{enable_link, is_enabled};
use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// An Apache module enabled in `mods-enabled`
#[derive(Debug, Clone)]
pub struct ApacheModule {
    pub name: String,
    pub apache_dir: PathBuf,
}

impl ApacheModule {
    pub fn new(name: &str, apache_dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            apache_dir: apache_dir.as_ref().to_path_buf(),
        }
    }

    /// `.load` and, when shipped, `.conf` files for the module
    fn available_files(&self) -> Vec<PathBuf> {
        let dir = self.apache_dir.join("mods-available");
        ["load", "conf"]
            .iter()
            .map(|ext| dir.join(format!("{}.{ext}", self.name)))
            .filter(|p| p.exists())
            .collect()
    }

    fn enabled_dir(&self) -> PathBuf {
        self.apache_dir.join("mods-enabled")
    }
}

impl Resource for ApacheModule {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Apache module {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "apache_module"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let files = self.available_files();
        if !files.is_empty() && files.iter().all(|f| is_enabled(f, &self.enabled_dir())) {
            Ok(ResourceState::present())
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let files = self.available_files();
        if files.is_empty() {
            bail!(
                "Module {} is not installed (no {}/mods-available/{}.load)",
                self.name,
                self.apache_dir.display(),
                self.name
            );
        }

        for file in files.iter().filter(|f| !is_enabled(f, &self.enabled_dir())) {
            enable_link(file, &self.enabled_dir())?;
        }
        log::info!("Enabled Apache module {}", self.name);
        Ok(ApplyResult::Created)
    }
}
