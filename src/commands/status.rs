//! `hearth status` - show stored settings

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::Context;
use crate::settings::mask;
use crate::ui;

#[derive(Debug, Serialize)]
struct StatusReport {
    settings_file: String,
    last_run: Option<String>,
    values: BTreeMap<String, String>,
}

pub fn run(_ctx: &Context, json: bool) -> Result<()> {
    let settings = super::open_settings()?;
    let report = StatusReport {
        settings_file: settings
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        last_run: settings.last_run().map(|t| t.to_rfc3339()),
        values: settings
            .values()
            .iter()
            .map(|(k, v)| (k.clone(), mask(v)))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::header("hearth status");
    ui::kv("Settings", &report.settings_file);
    ui::kv(
        "Last run",
        report.last_run.as_deref().unwrap_or("never"),
    );

    if report.values.is_empty() {
        ui::dim("No stored values yet");
        return Ok(());
    }

    ui::section("Stored values");
    for (key, value) in &report.values {
        ui::kv(key, value);
    }
    Ok(())
}
