//! `hearth apply` - converge the host

use anyhow::{Context as _, Result};
use declarative::{DiffSummary, ExecuteOptions, RunReport, compute_diffs, execute};
use dialoguer::Confirm;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::recipe::{self, Secrets};
use crate::settings::{Persisted, SettingsStore};
use crate::ui::{self, UiProgress};

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let config = super::load_config(ctx)?;
    let mut settings = if args.solo {
        SettingsStore::solo()
    } else {
        super::open_settings()?
    };

    let known = settings.values().len();
    let secrets = recipe::resolve_secrets(&config, &mut settings)?;

    // generated passwords must survive a failed run
    if !args.dry_run && !settings.is_solo() && settings.values().len() > known {
        settings
            .save()
            .context("Could not store generated passwords, nothing was changed")?;
        log::info!("Stored {} new password(s)", settings.values().len() - known);
    }

    let plan = recipe::build_plan(&config, &secrets, &settings)?;

    if !ctx.quiet {
        ui::header(if args.dry_run { "hearth apply (dry run)" } else { "hearth apply" });
    }

    let diffs = compute_diffs(&plan.resources);
    let summary = DiffSummary::from_diffs(&diffs);
    if !ctx.quiet && summary.has_changes() {
        ui::section("Pending changes");
        super::display_diffs(&diffs, &secret_values(&secrets));
    }

    if !args.dry_run && summary.has_changes() && !args.yes && !confirm_proceed()? {
        ui::info("Aborted, nothing was changed");
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
    };
    if !ctx.quiet {
        ui::section("Converging");
    }
    let mut progress = UiProgress::new(opts.verbose, ctx.quiet);
    let report = match execute(&plan, &opts, &mut progress) {
        Ok(report) => report,
        Err(e) => {
            drop(progress);
            ui::error("Run stopped; earlier changes stay in place, re-run once fixed");
            return Err(e.into());
        }
    };
    drop(progress);

    if args.dry_run {
        print_dry_run(&report);
        return Ok(());
    }

    for (key, value) in &report.captured {
        settings.set_if_absent(key, value.clone());
    }
    match settings.persist()? {
        Persisted::Saved(path) => log::info!("Settings saved to {}", path.display()),
        Persisted::Capture(values) => {
            ui::warn("Solo mode: nothing was saved. Keep these values:");
            for (key, value) in &values {
                println!("  {key} = {value}");
            }
        }
    }

    print_summary(&report);
    Ok(())
}

fn secret_values(secrets: &Secrets) -> [&str; 2] {
    [secrets.db_password.as_str(), secrets.admin_password.as_str()]
}

fn confirm_proceed() -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_dry_run(report: &RunReport) {
    println!();
    if report.pending() == 0 {
        ui::success("Nothing to do, host is converged");
    } else {
        ui::info(&format!(
            "{} resource(s) would change, {} unchanged",
            report.pending(),
            report.unchanged()
        ));
    }
}

fn print_summary(report: &RunReport) {
    println!();
    if report.is_noop() {
        ui::success("Host already converged");
        return;
    }

    ui::success(&format!(
        "Converged: {} applied, {} unchanged",
        report.applied(),
        report.unchanged()
    ));
    if !report.notifications.is_empty() {
        ui::dim(&format!(
            "{} notification(s) fired",
            report.notifications.len()
        ));
    }
}
