//! Persisted settings: generated secrets and identifiers
//!
//! Values are written once and then reused on every later run, so a
//! generated database password stays the same for the life of the host.
//! In solo mode there is no backing file: values live for one run and the
//! operator is expected to capture them (`hearth secrets`) and feed them
//! back through the desired-state file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Database password for the application user
pub const DB_PASSWORD: &str = "config.dbpassword";
/// Password of the initial admin account
pub const ADMIN_PASSWORD: &str = "admin.pass";
/// Salt the application generates during setup
pub const PASSWORD_SALT: &str = "config.passwordsalt";
/// Instance identifier the application generates during setup
pub const INSTANCE_ID: &str = "config.instanceid";

/// Keys that must be supplied by the operator in solo mode
pub const SOLO_REQUIRED: &[&str] = &[DB_PASSWORD, ADMIN_PASSWORD];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required settings: {}", .keys.join(", "))]
    Missing { keys: Vec<String> },

    #[error("failed to read settings file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write settings file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of `settings.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum Backend {
    File(PathBuf),
    Solo,
}

/// What [`SettingsStore::persist`] did with the values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// Written to this file
    Saved(PathBuf),
    /// Nothing written; the operator has to keep these
    Capture(BTreeMap<String, String>),
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    backend: Backend,
    values: BTreeMap<String, String>,
    last_run: Option<DateTime<Utc>>,
}

impl SettingsStore {
    /// Load the store from `path`, or start empty if the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let file = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<SettingsFile>(&content).map_err(|source| {
                SettingsError::Parse {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Settings file does not exist, starting empty");
                SettingsFile::default()
            }
            Err(source) => return Err(SettingsError::Read { path, source }),
        };

        log::debug!(
            "Loaded {} settings from {}",
            file.values.len(),
            path.display()
        );
        Ok(Self {
            backend: Backend::File(path),
            values: file.values,
            last_run: file.last_run,
        })
    }

    /// A store without persistence
    pub fn solo() -> Self {
        Self {
            backend: Backend::Solo,
            values: BTreeMap::new(),
            last_run: None,
        }
    }

    pub fn is_solo(&self) -> bool {
        matches!(self.backend, Backend::Solo)
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Solo => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Store `value` unless `key` already has one; returns the effective value.
    pub fn set_if_absent(&mut self, key: &str, value: impl Into<String>) -> &str {
        self.set_if_absent_with(key, || value.into())
    }

    /// Like [`set_if_absent`](Self::set_if_absent), but only computes the
    /// value when the key is missing.
    pub fn set_if_absent_with<F>(&mut self, key: &str, make: F) -> &str
    where
        F: FnOnce() -> String,
    {
        self.values.entry(key.to_string()).or_insert_with(|| {
            log::debug!("Setting {key} for the first time");
            make()
        })
    }

    /// Fail with every key in `keys` for which `has` reports no value.
    ///
    /// Only enforced in solo mode; with a backing file missing values are
    /// generated and kept instead.
    pub fn require<F>(&self, keys: &[&str], has: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> bool,
    {
        if !self.is_solo() {
            return Ok(());
        }

        let missing: Vec<String> = keys
            .iter()
            .filter(|key| !has(key) && self.get(key).is_none())
            .map(|key| (*key).to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Missing { keys: missing })
        }
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Durably save all values and stamp the run time.
    ///
    /// The file is replaced atomically and readable by its owner only.
    pub fn persist(&mut self) -> Result<Persisted, SettingsError> {
        self.last_run = Some(Utc::now());
        self.save()
    }

    /// Durably save all values without touching the run time
    pub fn save(&self) -> Result<Persisted, SettingsError> {
        let path = match &self.backend {
            Backend::Solo => return Ok(Persisted::Capture(self.values.clone())),
            Backend::File(path) => path.clone(),
        };

        let file = SettingsFile {
            last_run: self.last_run,
            values: self.values.clone(),
        };
        let content = toml::to_string_pretty(&file)?;
        write_private(&path, &content).map_err(|source| SettingsError::Write {
            path: path.clone(),
            source,
        })?;

        log::debug!("Saved settings to {}", path.display());
        Ok(Persisted::Saved(path))
    }
}

fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".settings-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Hide all but the first characters of a secret
pub fn mask(value: &str) -> String {
    let shown: String = value.chars().take(2).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{shown}****")
    }
}
