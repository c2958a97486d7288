//! Owner, group and mode of files the resources manage

use anyhow::{Context, Result, bail};
use std::ffi::CString;
use std::fs;
use std::path::Path;

/// Desired owner, group and permission bits. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
}

impl Ownership {
    pub fn new(owner: &str, group: &str, mode: u32) -> Self {
        Self {
            owner: Some(owner.to_string()),
            group: Some(group.to_string()),
            mode: Some(mode),
        }
    }

    pub fn mode(mode: u32) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    /// Human-readable form, e.g. `www-data:www-data 0750`
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        match (&self.owner, &self.group) {
            (Some(o), Some(g)) => parts.push(format!("{o}:{g}")),
            (Some(o), None) => parts.push(o.clone()),
            (None, Some(g)) => parts.push(format!(":{g}")),
            (None, None) => {}
        }
        if let Some(mode) = self.mode {
            parts.push(format!("{mode:04o}"));
        }
        parts.join(" ")
    }

    /// Describe how `path` differs, or `None` when it already matches.
    #[cfg(unix)]
    pub fn drift(&self, path: &Path) -> Result<Option<String>> {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let mut differences = Vec::new();

        if let Some(mode) = self.mode {
            let actual = meta.mode() & 0o7777;
            if actual != mode {
                differences.push(format!("mode {actual:04o}"));
            }
        }
        if let Some(owner) = &self.owner
            && meta.uid() != lookup_uid(owner)?
        {
            differences.push(format!("uid {}", meta.uid()));
        }
        if let Some(group) = &self.group
            && meta.gid() != lookup_gid(group)?
        {
            differences.push(format!("gid {}", meta.gid()));
        }

        Ok((!differences.is_empty()).then(|| differences.join(", ")))
    }

    #[cfg(not(unix))]
    pub fn drift(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    /// Set mode and ownership on `path`
    #[cfg(unix)]
    pub fn apply(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if let Some(mode) = self.mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .with_context(|| format!("Failed to set mode on {}", path.display()))?;
        }

        let uid = self.owner.as_deref().map(lookup_uid).transpose()?;
        let gid = self.group.as_deref().map(lookup_gid).transpose()?;
        if uid.is_some() || gid.is_some() {
            std::os::unix::fs::chown(path, uid, gid)
                .with_context(|| format!("Failed to chown {}", path.display()))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn apply(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Resolve a user name (or numeric id) to a uid
#[cfg(unix)]
pub fn lookup_uid(user: &str) -> Result<u32> {
    if let Ok(uid) = user.parse::<u32>() {
        return Ok(uid);
    }
    let name = CString::new(user).with_context(|| format!("Invalid user name '{user}'"))?;
    // SAFETY: getpwnam returns null or a pointer to static storage that is
    // read before any other passwd call on this thread.
    let entry = unsafe { libc::getpwnam(name.as_ptr()) };
    if entry.is_null() {
        bail!("Unknown user '{user}'");
    }
    // SAFETY: checked non-null above
    Ok(unsafe { (*entry).pw_uid })
}

/// Resolve a group name (or numeric id) to a gid
#[cfg(unix)]
pub fn lookup_gid(group: &str) -> Result<u32> {
    if let Ok(gid) = group.parse::<u32>() {
        return Ok(gid);
    }
    let name = CString::new(group).with_context(|| format!("Invalid group name '{group}'"))?;
    // SAFETY: as in lookup_uid, for the group database
    let entry = unsafe { libc::getgrnam(name.as_ptr()) };
    if entry.is_null() {
        bail!("Unknown group '{group}'");
    }
    // SAFETY: checked non-null above
    Ok(unsafe { (*entry).gr_gid })
}
