//! Rendered file resource
//!
//! Templates use `{{ name }}` placeholders. Every placeholder must have a
//! value; an unknown name is an error rather than an empty string.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{ApplyContext, ApplyResult, ContentChange, Ownership, Resource, ResourceState};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Substitute `{{ name }}` placeholders
pub fn render(template: &str, vars: &BTreeMap<&str, String>) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        vars.get(name).cloned().unwrap_or_else(|| {
            missing.push(name.to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        bail!("Template references unknown variables: {}", missing.join(", "));
    }
    Ok(rendered.into_owned())
}

/// Replace `path` atomically with `content`
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".hearth-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// A file whose full content is known at plan time
#[derive(Debug, Clone)]
pub struct Template {
    pub path: PathBuf,
    pub content: String,
    pub ownership: Ownership,
    /// Skip the resource entirely while this path exists
    pub not_if_exists: Option<PathBuf>,
}

impl Template {
    pub fn new(path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            content: content.into(),
            ownership: Ownership::default(),
            not_if_exists: None,
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn not_if_exists(mut self, path: impl AsRef<Path>) -> Self {
        self.not_if_exists = Some(path.as_ref().to_path_buf());
        self
    }

    fn existing(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        }
    }
}

impl Resource for Template {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("Render {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "template"
    }

    fn guard(&self) -> Result<Option<String>> {
        Ok(self
            .not_if_exists
            .as_ref()
            .filter(|p| p.exists())
            .map(|p| format!("{} exists", p.display())))
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(existing) = self.existing()? else {
            return Ok(ResourceState::Absent);
        };
        if existing != self.content {
            return Ok(ResourceState::Modified {
                from: format!("{} bytes", existing.len()),
                to: format!("{} bytes", self.content.len()),
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
        let existed = self.path.exists();
        write_atomic(&self.path, &self.content)?;
        self.ownership.apply(&self.path)?;

        Ok(if existed {
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
            path: self.path.to_string_lossy().to_string(),
            before,
            after: self.content.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect()
    }

    #[test]
    fn test_render_substitutes() {
        let out = render(
            "ServerName {{ server_name }}\nDocumentRoot {{docroot}}\n",
            &vars(&[("server_name", "cloud.example.com"), ("docroot", "/var/www/owncloud")]),
        )
        .unwrap();
        assert_eq!(
            out,
            "ServerName cloud.example.com\nDocumentRoot /var/www/owncloud\n"
        );
    }

    #[test]
    fn test_render_leaves_shell_variables_alone() {
        let out = render("ErrorLog ${APACHE_LOG_DIR}/{{ name }}.log", &vars(&[("name", "oc")])).unwrap();
        assert_eq!(out, "ErrorLog ${APACHE_LOG_DIR}/oc.log");
    }

    #[test]
    fn test_render_unknown_variable_fails() {
        let err = render("{{ a }} {{ b }}", &vars(&[("a", "1")])).unwrap_err();
        assert!(err.to_string().contains('b'));
    }

    #[test]
    fn test_render_names_each_unknown_variable_once() {
        let err = render("{{ b }} {{ a }} {{ b }} {{ c }} {{ b }}", &vars(&[("a", "1")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Template references unknown variables: b, c"
        );
    }

    #[test]
    fn test_guard_skips_when_marker_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("config.php");
        let template =
            Template::new(tmp.path().join("autoconfig.php"), "<?php").not_if_exists(&marker);

        assert_eq!(template.guard().unwrap(), None);
        fs::write(&marker, "").unwrap();
        assert!(template.guard().unwrap().unwrap().contains("config.php"));
    }

    #[test]
    fn test_apply_then_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config").join("autoconfig.php");
        let template = Template::new(&path, "<?php\n").with_ownership(Ownership::mode(0o640));

        assert_eq!(template.current_state().unwrap(), ResourceState::Absent);
        let change = template.content_change().unwrap().unwrap();
        assert_eq!(change.before, "");

        let mut ctx = ApplyContext::new(false, false);
        assert_eq!(template.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert_eq!(template.current_state().unwrap(), ResourceState::present());
        assert!(template.content_change().unwrap().is_none());
    }

    #[test]
    fn test_changed_content_is_modified() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site.conf");
        fs::write(&path, "old").unwrap();

        let template = Template::new(&path, "new");
        assert!(matches!(
            template.current_state().unwrap(),
            ResourceState::Modified { .. }
        ));
        let mut ctx = ApplyContext::new(false, false);
        assert_eq!(template.apply(&mut ctx).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
