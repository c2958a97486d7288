use colored::Colorize;
use declarative::{Action, ConvergenceState, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colored glyph for a convergence state
pub fn state_symbol(state: ConvergenceState) -> String {
    let symbol = state.symbol();
    match state {
        ConvergenceState::Applied => symbol.green().to_string(),
        ConvergenceState::Pending => symbol.yellow().to_string(),
        ConvergenceState::Failed => symbol.red().to_string(),
        ConvergenceState::Unchanged | ConvergenceState::Unevaluated => {
            symbol.dimmed().to_string()
        }
    }
}

/// Terminal progress for a convergence run
///
/// Shows a spinner while a resource is probed or applied and leaves one line
/// per resource behind. Unchanged resources are only listed when verbose.
pub struct UiProgress {
    spinner: Option<ProgressBar>,
    verbose: bool,
    quiet: bool,
}

impl UiProgress {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            spinner: None,
            verbose,
            quiet,
        }
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, msg: &str) {
        match &self.spinner {
            Some(spinner) => spinner.println(msg),
            None => println!("{msg}"),
        }
    }
}

impl ProgressCallback for UiProgress {
    fn on_resource_start(&mut self, key: &str, description: &str) {
        self.clear();
        if self.quiet {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("{description} {}", key.dimmed()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn on_resource_complete(&mut self, key: &str, state: ConvergenceState, note: Option<&str>) {
        self.clear();
        if self.quiet && state != ConvergenceState::Failed {
            return;
        }
        if state == ConvergenceState::Unchanged && !self.verbose {
            return;
        }

        let note = note
            .map(|n| format!(" ({n})").dimmed().to_string())
            .unwrap_or_default();
        println!("  {} {key}{note}", state_symbol(state));
    }

    fn on_notification(&mut self, source: &str, action: Action, target: &str) {
        if self.quiet {
            return;
        }
        let msg = format!(
            "    {} {source} notified {target} to {action}",
            "→".blue()
        );
        self.line(&msg);
    }
}

impl Drop for UiProgress {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_symbol_keeps_glyph() {
        colored::control::set_override(false);
        assert_eq!(state_symbol(ConvergenceState::Applied), "✓");
        assert_eq!(state_symbol(ConvergenceState::Unchanged), "○");
        assert_eq!(state_symbol(ConvergenceState::Failed), "✗");
        colored::control::unset_override();
    }

    #[test]
    fn test_quiet_progress_never_spins() {
        let mut progress = UiProgress::new(false, true);
        progress.on_resource_start("package[php5]", "Install php5");
        assert!(progress.spinner.is_none());
        progress.on_resource_complete("package[php5]", ConvergenceState::Unchanged, None);
    }
}
