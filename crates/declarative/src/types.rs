//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Shorthand for `Present` without details
    pub fn present() -> Self {
        Self::Present { details: None }
    }

    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
}

/// Lifecycle of a resource within one run
///
/// Every resource starts `Unevaluated` and ends in exactly one terminal
/// state. `Pending` only appears in dry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceState {
    Unevaluated,
    Unchanged,
    Pending,
    Applied,
    Failed,
}

impl ConvergenceState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unevaluated)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Unevaluated => " ",
            Self::Unchanged => "○",
            Self::Pending => "~",
            Self::Applied => "✓",
            Self::Failed => "✗",
        }
    }
}

impl fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unevaluated => "unevaluated",
            Self::Unchanged => "unchanged",
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Probe only, don't make changes
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}

/// Outcome of one declared resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReport {
    /// Qualified key, e.g. `directory[/var/www/owncloud]`
    pub key: String,
    pub resource_type: String,
    pub state: ConvergenceState,
    /// Why a resource ended up unchanged without a probe (guards, skips)
    pub note: Option<String>,
}

/// A notification that was executed during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredNotification {
    pub source: String,
    pub action: crate::notify::Action,
    pub target: String,
    pub timing: crate::notify::Timing,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub resources: Vec<ResourceReport>,
    pub notifications: Vec<FiredNotification>,
    /// Values generated as a side effect of applying resources
    pub captured: BTreeMap<String, String>,
}

impl RunReport {
    fn count(&self, state: ConvergenceState) -> usize {
        self.resources.iter().filter(|r| r.state == state).count()
    }

    pub fn applied(&self) -> usize {
        self.count(ConvergenceState::Applied)
    }

    pub fn unchanged(&self) -> usize {
        self.count(ConvergenceState::Unchanged)
    }

    pub fn pending(&self) -> usize {
        self.count(ConvergenceState::Pending)
    }

    /// True when the run changed nothing on the host
    pub fn is_noop(&self) -> bool {
        self.applied() == 0 && self.notifications.is_empty()
    }

    pub fn state_of(&self, key: &str) -> Option<ConvergenceState> {
        self.resources.iter().find(|r| r.key == key).map(|r| r.state)
    }
}
