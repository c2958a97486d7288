//! Merge operator settings into the application's `config.php`
//!
//! The application rewrites this file itself (setup adds the salt, the
//! instance id and `installed`), so it is never replaced wholesale: desired
//! keys are merged over what is on disk and everything else is kept.

use anyhow::{Context, Result};
use phpconfig::{ConfigFile, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, ContentChange, Ownership, Resource, ResourceState};

/// A value the application generates that should be remembered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Key inside `config.php`
    pub config_key: String,
    /// Settings key it is stored under
    pub setting: String,
}

#[derive(Debug, Clone)]
pub struct ApplyConfig {
    pub path: PathBuf,
    pub desired: BTreeMap<String, Value>,
    /// Values to remember; a capture whose key is already desired is
    /// considered stored
    pub captures: Vec<Capture>,
    /// Applied only when the file has to be created
    pub ownership: Ownership,
}

/// Outcome of merging desired values into the file on disk
struct Merge {
    config: ConfigFile,
    changed: Vec<String>,
    existed: bool,
}

impl ApplyConfig {
    pub fn new(path: impl AsRef<Path>, desired: BTreeMap<String, Value>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            desired,
            captures: Vec::new(),
            ownership: Ownership::default(),
        }
    }

    /// Remember `config_key` under `setting` once it shows up
    pub fn capture(mut self, config_key: &str, setting: &str) -> Self {
        self.captures.push(Capture {
            config_key: config_key.to_string(),
            setting: setting.to_string(),
        });
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    fn merged(&self) -> Result<Merge> {
        let existed = self.path.exists();
        let mut config = ConfigFile::parse(&self.path)?;
        let changed = config.merge(&self.desired);
        Ok(Merge {
            config,
            changed,
            existed,
        })
    }

    /// Captured values present in `config`
    fn captured_values(&self, config: &ConfigFile) -> Vec<(String, String)> {
        self.captures
            .iter()
            .filter_map(|c| {
                config
                    .get(&c.config_key)
                    .and_then(Value::to_plain_string)
                    .filter(|v| !v.is_empty())
                    .map(|v| (c.setting.clone(), v))
            })
            .collect()
    }

    /// Settings keys whose value is on disk but not stored yet
    fn uncaptured(&self, config: &ConfigFile) -> Vec<String> {
        self.captures
            .iter()
            .filter(|c| !self.desired.contains_key(&c.config_key))
            .filter(|c| {
                config
                    .get(&c.config_key)
                    .and_then(Value::to_plain_string)
                    .is_some_and(|v| !v.is_empty())
            })
            .map(|c| c.setting.clone())
            .collect()
    }
}

impl Resource for ApplyConfig {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("Merge settings into {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "apply_config"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let merge = self.merged()?;
        if !merge.existed {
            return Ok(ResourceState::Absent);
        }

        let uncaptured = self.uncaptured(&merge.config);
        if merge.changed.is_empty() && uncaptured.is_empty() {
            return Ok(ResourceState::present());
        }

        let mut from = Vec::new();
        if !merge.changed.is_empty() {
            from.push(format!("differs in {}", merge.changed.join(", ")));
        }
        if !uncaptured.is_empty() {
            from.push(format!("not yet stored: {}", uncaptured.join(", ")));
        }
        Ok(ResourceState::Modified {
            from: from.join("; "),
            to: "merged".to_string(),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let merge = self.merged()?;

        if !merge.changed.is_empty() || !merge.existed {
            merge
                .config
                .write()
                .with_context(|| format!("Failed to update {}", self.path.display()))?;
            if !merge.existed {
                self.ownership.apply(&self.path)?;
            }
            log::info!(
                "Updated {} ({})",
                self.path.display(),
                merge.changed.join(", ")
            );
        }

        let newly_captured = self.uncaptured(&merge.config);
        for (setting, value) in self.captured_values(&merge.config) {
            ctx.capture(setting, value);
        }

        Ok(if !merge.existed {
            ApplyResult::Created
        } else if merge.changed.is_empty() && newly_captured.is_empty() {
            ApplyResult::NoChange
        } else {
            ApplyResult::Modified
        })
    }

    fn content_change(&self) -> Result<Option<ContentChange>> {
        let merge = self.merged()?;
        if merge.existed && merge.changed.is_empty() {
            return Ok(None);
        }

        let before = if merge.existed {
            fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?
        } else {
            String::new()
        };
        Ok(Some(ContentChange {
            path: self.path.to_string_lossy().to_string(),
            before,
            after: merge.config.render(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{INSTANCE_ID, PASSWORD_SALT};

    const INSTALLED: &str = "<?php
$CONFIG = array (
  'instanceid' => 'oc8f2a',
  'passwordsalt' => 'pepper',
  'datadirectory' => '/var/www/owncloud/data',
  'dbtype' => 'sqlite3',
  'installed' => true,
);
";

    fn desired(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    fn resource(path: &Path, pairs: &[(&str, &str)]) -> ApplyConfig {
        ApplyConfig::new(path, desired(pairs))
            .capture("passwordsalt", PASSWORD_SALT)
            .capture("instanceid", INSTANCE_ID)
    }

    #[test]
    fn test_merge_writes_and_captures() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.php");
        fs::write(&path, INSTALLED).unwrap();

        let apply = resource(&path, &[("dbtype", "sqlite"), ("overwritehost", "cloud.example.com")]);
        assert!(matches!(
            apply.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));

        let mut ctx = ApplyContext::new(false, false);
        assert_eq!(apply.apply(&mut ctx).unwrap(), ApplyResult::Modified);

        let config = ConfigFile::parse(&path).unwrap();
        assert_eq!(config.get("dbtype"), Some(&Value::from("sqlite3")));
        assert_eq!(config.get("overwritehost"), Some(&Value::from("cloud.example.com")));
        assert_eq!(config.get("installed"), Some(&Value::Bool(true)));

        assert_eq!(ctx.captured()[PASSWORD_SALT], "pepper");
        assert_eq!(ctx.captured()[INSTANCE_ID], "oc8f2a");
    }

    #[test]
    fn test_converged_once_values_are_stored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.php");
        fs::write(&path, INSTALLED).unwrap();

        // nothing to merge, but the salt still has to be remembered
        let fresh = resource(&path, &[("dbtype", "sqlite")]);
        assert!(matches!(
            fresh.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));
        let mut ctx = ApplyContext::new(false, false);
        assert_eq!(fresh.apply(&mut ctx).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), INSTALLED);

        let stored = resource(
            &path,
            &[("dbtype", "sqlite"), ("passwordsalt", "pepper"), ("instanceid", "oc8f2a")],
        );
        assert_eq!(stored.current_state().unwrap(), ResourceState::present());
        assert!(stored.content_change().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.php");

        let apply = resource(&path, &[("dbname", "owncloud")]);
        assert_eq!(apply.current_state().unwrap(), ResourceState::Absent);

        let mut ctx = ApplyContext::new(false, false);
        assert_eq!(apply.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert!(ctx.captured().is_empty());
        assert_eq!(
            ConfigFile::parse(&path).unwrap().get("dbname"),
            Some(&Value::from("owncloud"))
        );
    }

    #[test]
    fn test_malformed_file_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.php");
        fs::write(&path, "<?php $CONFIG = array('a' => ").unwrap();

        let apply = resource(&path, &[("dbname", "owncloud")]);
        assert!(apply.current_state().is_err());

        let mut ctx = ApplyContext::new(false, false);
        assert!(apply.apply(&mut ctx).is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<?php $CONFIG = array('a' => "
        );
    }

    #[test]
    fn test_content_change_renders_merge() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.php");
        fs::write(&path, INSTALLED).unwrap();

        let change = resource(&path, &[("dbhost", "db.internal")])
            .content_change()
            .unwrap()
            .unwrap();
        assert_eq!(change.before, INSTALLED);
        assert!(change.after.contains("'dbhost' => 'db.internal',"));
        assert!(change.after.contains("'passwordsalt' => 'pepper',"));
    }
}
