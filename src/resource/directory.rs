//! Directory resource

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Ownership, Resource, ResourceState};

/// A directory with optional owner, group and mode
#[derive(Debug, Clone)]
pub struct Directory {
    pub path: PathBuf,
    pub ownership: Ownership,
}

impl Directory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ownership: Ownership::default(),
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }
}

impl Resource for Directory {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        let attrs = self.ownership.describe();
        if attrs.is_empty() {
            format!("Directory {}", self.path.display())
        } else {
            format!("Directory {} ({attrs})", self.path.display())
        }
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.exists() {
            return Ok(ResourceState::Absent);
        }
        if !self.path.is_dir() {
            return Ok(ResourceState::Modified {
                from: "not a directory".to_string(),
                to: "directory".to_string(),
            });
        }

        match self.ownership.drift(&self.path)? {
            None => Ok(ResourceState::present()),
            Some(from) => Ok(ResourceState::Modified {
                from,
                to: self.ownership.describe(),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.path.exists() && !self.path.is_dir() {
            bail!("{} exists and is not a directory", self.path.display());
        }

        let created = !self.path.exists();
        if created {
            fs::create_dir_all(&self.path)
                .with_context(|| format!("Failed to create {}", self.path.display()))?;
        }
        self.ownership.apply(&self.path)?;

        Ok(if created {
            ApplyResult::Created
        } else {
            ApplyResult::Modified
        })
    }
}
