//! Debian package resource

use anyhow::{Context, Result};
use std::process::Command;

use crate::runner;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// An apt package that must be installed
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Ask dpkg whether the package is installed
    fn is_installed(&self) -> Result<bool> {
        let output = Command::new("dpkg-query")
            .args(["-W", "-f=${Status}", &self.name])
            .output()
            .context("Failed to run dpkg-query")?;

        // unknown packages exit non-zero
        if !output.status.success() {
            return Ok(false);
        }

        Ok(is_installed_status(&String::from_utf8_lossy(&output.stdout)))
    }

    fn install(&self) -> Result<()> {
        runner::run_capture_env(
            "apt-get",
            &["install", "-y", "-q", &self.name],
            &[("DEBIAN_FRONTEND", "noninteractive")],
        )
        .with_context(|| format!("Failed to install package {}", self.name))?;
        Ok(())
    }
}

/// `want ok status` triple as printed by `dpkg-query -f=${Status}`
fn is_installed_status(status: &str) -> bool {
    status.split_whitespace().last() == Some("installed")
        && status.split_whitespace().nth(1) == Some("ok")
}

impl Resource for Package {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Install package {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "package"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.is_installed()? {
            Ok(ResourceState::present())
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.is_installed()? {
            return Ok(ApplyResult::NoChange);
        }

        self.install()?;
        Ok(ApplyResult::Created)
    }
}
