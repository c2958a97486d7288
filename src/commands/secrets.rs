//! `hearth secrets` - print stored values in full

use anyhow::Result;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = super::open_settings()?;
    if settings.values().is_empty() {
        if !ctx.quiet {
            ui::warn("No stored values yet, run `hearth apply` first");
        }
        return Ok(());
    }

    for (key, value) in settings.values() {
        println!("{key} = {value}");
    }
    Ok(())
}
