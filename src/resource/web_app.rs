//! Apache virtual host resource

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::template::write_atomic;
use super::{ApplyContext, ApplyResult, ContentChange, Resource, ResourceState};

/// Link `available` into `enabled_dir` the way `a2ensite`/`a2enmod` do
pub(crate) fn enable_link(available: &Path, enabled_dir: &Path) -> Result<()> {
    let file_name = available
        .file_name()
        .with_context(|| format!("No file name in {}", available.display()))?;
    let link = enabled_dir.join(file_name);

    fs::create_dir_all(enabled_dir)
        .with_context(|| format!("Failed to create {}", enabled_dir.display()))?;
    if link.is_symlink() {
        fs::remove_file(&link)
            .with_context(|| format!("Failed to remove stale link {}", link.display()))?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(available, &link).with_context(|| {
        format!(
            "Failed to link {} -> {}",
            link.display(),
            available.display()
        )
    })?;

    #[cfg(not(unix))]
    anyhow::bail!("Enabling sites is only supported on unix");

    Ok(())
}

/// Whether `enabled_dir` holds a link that resolves to `available`
pub(crate) fn is_enabled(available: &Path, enabled_dir: &Path) -> bool {
    let Some(file_name) = available.file_name() else {
        return false;
    };
    let link = enabled_dir.join(file_name);
    match (link.canonicalize(), available.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// An enabled Apache site with fixed content
#[derive(Debug, Clone)]
pub struct WebApp {
    pub name: String,
    pub content: String,
    pub apache_dir: PathBuf,
}

impl WebApp {
    pub fn new(name: &str, content: impl Into<String>, apache_dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            content: content.into(),
            apache_dir: apache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn site_path(&self) -> PathBuf {
        self.apache_dir
            .join("sites-available")
            .join(format!("{}.conf", self.name))
    }

    fn enabled_dir(&self) -> PathBuf {
        self.apache_dir.join("sites-enabled")
    }

    fn existing(&self) -> Result<Option<String>> {
        let path = self.site_path();
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

impl Resource for WebApp {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Apache site {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "web_app"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(existing) = self.existing()? else {
            return Ok(ResourceState::Absent);
        };
        if existing != self.content {
            return Ok(ResourceState::Modified {
                from: "outdated site config".to_string(),
                to: "rendered site config".to_string(),
            });
        }
        if !is_enabled(&self.site_path(), &self.enabled_dir()) {
            return Ok(ResourceState::Modified {
                from: "disabled".to_string(),
                to: "enabled".to_string(),
            });
        }
        Ok(ResourceState::present())
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let site = self.site_path();
        let existing = self.existing()?;

        if existing.as_deref() != Some(self.content.as_str()) {
            write_atomic(&site, &self.content)?;
        }
        if !is_enabled(&site, &self.enabled_dir()) {
            enable_link(&site, &self.enabled_dir())?;
            log::info!("Enabled site {}", self.name);
        }

        Ok(if existing.is_some() {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }

    fn content_change(&self) -> Result<Option<ContentChange>> {
        let before = self.existing()?.unwrap_or_default();
        if before == self.content {
            return Ok(None);
        }
        Ok(Some(ContentChange {
            path: self.site_path().to_string_lossy().to_string(),
            before,
            after: self.content.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_is_written_and_enabled() {
        let tmp = tempfile::tempdir().unwrap();
        let site = WebApp::new("owncloud", "<VirtualHost *:80>\n</VirtualHost>\n", tmp.path());

        assert_eq!(site.current_state().unwrap(), ResourceState::Absent);

        let mut ctx = ApplyContext::new(false, false);
        assert_eq!(site.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert!(tmp.path().join("sites-enabled/owncloud.conf").is_symlink());
        assert_eq!(site.current_state().unwrap(), ResourceState::present());
    }

    #[test]
    fn test_disabled_site_is_reenabled() {
        let tmp = tempfile::tempdir().unwrap();
        let site = WebApp::new("owncloud", "vhost", tmp.path());
        let mut ctx = ApplyContext::new(false, false);
        site.apply(&mut ctx).unwrap();

        fs::remove_file(tmp.path().join("sites-enabled/owncloud.conf")).unwrap();
        assert!(matches!(
            site.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));

        assert_eq!(site.apply(&mut ctx).unwrap(), ApplyResult::Modified);
        assert_eq!(site.current_state().unwrap(), ResourceState::present());
    }

    #[test]
    fn test_content_change_shows_old_and_new() {
        let tmp = tempfile::tempdir().unwrap();
        let site = WebApp::new("owncloud", "new", tmp.path());
        fs::create_dir_all(tmp.path().join("sites-available")).unwrap();
        fs::write(site.site_path(), "old").unwrap();

        let change = site.content_change().unwrap().unwrap();
        assert_eq!(change.before, "old");
        assert_eq!(change.after, "new");
    }
}
