pub mod apply;
pub mod plan;
pub mod secrets;
pub mod status;

use anyhow::Result;
use colored::Colorize;
use declarative::{ResourceDiff, ResourceState};

use crate::Context;
use crate::config::HearthConfig;
use crate::paths;
use crate::settings::{SettingsStore, mask};

/// Desired state from `--config`, `HEARTH_CONFIG` or the config dir
fn load_config(ctx: &Context) -> Result<HearthConfig> {
    let path = paths::config_file(ctx.config.as_deref())?;
    if ctx.config.is_some() {
        HearthConfig::load(&path)
    } else {
        HearthConfig::load_or_default(&path)
    }
}

fn open_settings() -> Result<SettingsStore> {
    let path = paths::settings_file()?;
    Ok(SettingsStore::open(path)?)
}

/// Print pending changes, with a line diff for files whose content changes
///
/// Every occurrence of a `secrets` value in file content is masked.
fn display_diffs(diffs: &[ResourceDiff], secrets: &[&str]) {
    for diff in diffs {
        let (symbol, detail) = match (&diff.current, &diff.desired) {
            (ResourceState::Absent, _) => ("+".green(), "(missing)".to_string()),
            (ResourceState::Modified { from, to }, _) => ("~".yellow(), format!("{from} → {to}")),
            (ResourceState::Unknown, _) => ("?".dimmed(), "(not probed yet)".to_string()),
            (ResourceState::Present { .. }, _) => ("~".yellow(), String::new()),
        };
        println!("  {symbol} {:<48} {}", diff.resource_key, detail.dimmed());

        if let Some(change) = &diff.content {
            print_text_diff(
                &redact(&change.before, secrets),
                &redact(&change.after, secrets),
            );
        }
    }
}

fn redact(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, &mask(secret)))
}

fn print_text_diff(before: &str, after: &str) {
    let diff = similar::TextDiff::from_lines(before, after);
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => print!("      {}", format!("- {change}").red()),
            similar::ChangeTag::Insert => print!("      {}", format!("+ {change}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_every_secret() {
        let text = "'dbpassword' => 'hunter2hunter2',\n'adminpass' => 'swordfish',\n";
        let out = redact(text, &["hunter2hunter2", "swordfish", ""]);
        assert_eq!(out, "'dbpassword' => 'hu****',\n'adminpass' => 'sw****',\n");
    }
}
