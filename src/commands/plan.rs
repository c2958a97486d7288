//! `hearth plan` - probe the host and show what apply would change

use anyhow::Result;
use colored::Colorize;
use declarative::{DiffSummary, compute_diffs};

use crate::Context;
use crate::recipe;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let config = super::load_config(ctx)?;
    // passwords generated here are not stored
    let mut settings = super::open_settings()?;
    let secrets = recipe::resolve_secrets(&config, &mut settings)?;
    let plan = recipe::build_plan(&config, &secrets, &settings)?;

    let diffs = compute_diffs(&plan.resources);
    let summary = DiffSummary::from_diffs(&diffs);

    ui::header("hearth plan");
    if !summary.has_changes() {
        println!();
        ui::success("No changes needed");
        return Ok(());
    }

    println!();
    super::display_diffs(
        &diffs,
        &[secrets.db_password.as_str(), secrets.admin_password.as_str()],
    );

    println!();
    println!(
        "  {} to add, {} to change, {} not probed yet",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.unknown.to_string().dimmed()
    );
    if !plan.handlers.is_empty() {
        ui::dim(&format!(
            "{} handler(s) run only when notified",
            plan.handlers.len()
        ));
    }
    Ok(())
}
