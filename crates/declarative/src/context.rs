//! Apply context and progress reporting
//!
//! The context is the only mutable state threaded through a run. Resources
//! that generate values as a side effect record them with
//! [`ApplyContext::capture`]; the executor hands them back in the report so
//! the caller decides what to persist.

use crate::notify::Action;
use crate::types::ConvergenceState;
use std::collections::BTreeMap;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called before a resource is evaluated
    fn on_resource_start(&mut self, key: &str, description: &str);

    /// Called when a resource reaches a terminal state
    fn on_resource_complete(&mut self, key: &str, state: ConvergenceState, note: Option<&str>);

    /// Called before a notification target runs its action
    fn on_notification(&mut self, source: &str, action: Action, target: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_resource_start(&mut self, _key: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _key: &str, _state: ConvergenceState, _note: Option<&str>) {
    }
    fn on_notification(&mut self, _source: &str, _action: Action, _target: &str) {}
}

/// Context passed to resource apply operations
#[derive(Debug, Default)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    captured: BTreeMap<String, String>,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self {
            dry_run,
            verbose,
            captured: BTreeMap::new(),
        }
    }

    /// Record a value produced while applying a resource
    ///
    /// The first capture of a key wins.
    pub fn capture(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.captured.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn captured(&self) -> &BTreeMap<String, String> {
        &self.captured
    }

    pub(crate) fn take_captured(&mut self) -> BTreeMap<String, String> {
        std::mem::take(&mut self.captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_keeps_first_value() {
        let mut ctx = ApplyContext::new(false, false);
        ctx.capture("config.instanceid", "oc1");
        ctx.capture("config.instanceid", "oc2");
        assert_eq!(
            ctx.captured().get("config.instanceid").map(String::as_str),
            Some("oc1")
        );
    }
}
