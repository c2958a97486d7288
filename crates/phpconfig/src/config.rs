//! On-disk config file: parse, merge, atomic write.

use crate::error::{Error, Result};
use crate::parser::parse_string;
use crate::value::Value;
use crate::writer::write_string;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Variable name used when a file does not exist yet
pub const DEFAULT_VARIABLE: &str = "CONFIG";

/// Config key holding the database driver
pub const DRIVER_KEY: &str = "dbtype";

/// Generic driver names and the concrete variants they stand for.
///
/// When the operator asks for the generic name and the installer already
/// picked a concrete variant, the concrete one on disk is kept.
const DRIVER_ALIASES: &[(&str, &[&str])] = &[("sqlite", &["sqlite3"])];

/// Whether `requested` is a generic alias of `on_disk`
pub fn is_generic_driver_alias(requested: &str, on_disk: &str) -> bool {
    DRIVER_ALIASES
        .iter()
        .any(|(generic, concrete)| *generic == requested && concrete.contains(&on_disk))
}

/// A PHP config array backed by a file
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    path: PathBuf,
    variable: String,
    entries: Vec<(String, Value)>,
}

impl ConfigFile {
    /// Empty config that will be written to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            variable: DEFAULT_VARIABLE.to_string(),
            entries: Vec::new(),
        }
    }

    /// Read a config file, or an empty config if it does not exist.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} does not exist, starting empty", path.display());
                return Ok(Self::new(path));
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        Self::parse_str(path, &content)
    }

    /// Parse config content that belongs to `path`.
    pub fn parse_str(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        let path = path.as_ref();
        let parsed = parse_string(content).map_err(|e| e.with_path(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            variable: parsed
                .variable
                .unwrap_or_else(|| DEFAULT_VARIABLE.to_string()),
            entries: parsed.entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set `key`, appending it if new. Returns whether anything changed.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) if *existing == value => false,
            Some((_, existing)) => {
                *existing = value;
                true
            }
            None => {
                self.entries.push((key.to_string(), value));
                true
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge desired values into this config.
    ///
    /// Desired values win, keys not mentioned in `desired` are left alone.
    /// The one exception is the driver type: a generic request (`sqlite`)
    /// does not replace the concrete variant on disk (`sqlite3`).
    ///
    /// Returns the keys whose value changed.
    pub fn merge<'a, I>(&mut self, desired: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut changed = Vec::new();

        for (key, value) in desired {
            if key == DRIVER_KEY
                && let (Some(requested), Some(on_disk)) = (
                    value.as_str(),
                    self.get(DRIVER_KEY).and_then(Value::as_str),
                )
                && is_generic_driver_alias(requested, on_disk)
            {
                log::debug!("keeping {DRIVER_KEY} '{on_disk}' over generic '{requested}'");
                continue;
            }

            if self.set(key, value.clone()) {
                changed.push(key.clone());
            }
        }

        changed
    }

    /// Serialized file content
    pub fn render(&self) -> String {
        write_string(&self.variable, &self.entries)
    }

    /// Replace the file on disk with the full serialized config.
    ///
    /// Content goes to a temporary file in the same directory which is then
    /// renamed over the target, so a reader sees either the old or the new
    /// file. Mode and ownership of an existing file are kept.
    pub fn write(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".hearth-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::io(dir, e))?;

        tmp.write_all(self.render().as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;

        if let Ok(existing) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| Error::io(tmp.path(), e))?;
            keep_owner(tmp.as_file(), &existing).map_err(|e| Error::io(&self.path, e))?;
        }

        tmp.persist(&self.path)
            .map_err(|e| Error::io(&self.path, e.error))?;

        log::debug!("wrote {} ({} keys)", self.path.display(), self.entries.len());
        Ok(())
    }
}

#[cfg(unix)]
fn keep_owner(file: &fs::File, existing: &fs::Metadata) -> std::io::Result<()> {
    use std::os::unix::fs::MetadataExt;

    let current = file.metadata()?;
    if current.uid() == existing.uid() && current.gid() == existing.gid() {
        return Ok(());
    }
    std::os::unix::fs::fchown(file, Some(existing.uid()), Some(existing.gid()))
}

#[cfg(not(unix))]
fn keep_owner(_file: &fs::File, _existing: &fs::Metadata) -> std::io::Result<()> {
    Ok(())
}
