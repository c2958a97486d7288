//! Notification edges between resources
//!
//! An edge `(source, action, target, timing)` means "if `source` was applied
//! in this run, perform `action` on `target`". Immediate edges fire before
//! the next declared resource is evaluated; delayed edges are queued until
//! every resource has been evaluated and run at most once per
//! `(action, target)` pair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action a notification asks the target to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Converge the target (execute a command, extract an archive)
    Run,
    /// Create the target unconditionally
    Create,
    /// Restart a service
    Restart,
    /// Reload a service
    Reload,
    /// Issue an HTTP request
    Get,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Run => "run",
            Self::Create => "create",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Get => "get",
        };
        f.write_str(s)
    }
}

/// When a notification fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    Immediate,
    Delayed,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediately"),
            Self::Delayed => f.write_str("delayed"),
        }
    }
}

/// A declared trigger from one resource to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEdge {
    pub source: String,
    pub action: Action,
    pub target: String,
    pub timing: Timing,
}

/// Notification ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub source: String,
    pub action: Action,
    pub target: String,
    pub timing: Timing,
}

/// In-run bookkeeping of edges and the delayed queue
#[derive(Debug, Default)]
pub struct NotificationBus {
    edges: Vec<NotificationEdge>,
    delayed: Vec<Dispatch>,
}

impl NotificationBus {
    pub fn new(edges: Vec<NotificationEdge>) -> Self {
        Self {
            edges,
            delayed: Vec::new(),
        }
    }

    /// Record that `source` was applied
    ///
    /// Returns the immediate notifications to run now, in declaration
    /// order. Delayed ones are queued unless the same `(action, target)` is
    /// already queued.
    pub fn on_applied(&mut self, source: &str) -> Vec<Dispatch> {
        let mut immediate = Vec::new();

        for edge in self.edges.iter().filter(|e| e.source == source) {
            let dispatch = Dispatch {
                source: edge.source.clone(),
                action: edge.action,
                target: edge.target.clone(),
                timing: edge.timing,
            };
            match edge.timing {
                Timing::Immediate => immediate.push(dispatch),
                Timing::Delayed => {
                    let queued = self
                        .delayed
                        .iter()
                        .any(|d| d.action == edge.action && d.target == edge.target);
                    if queued {
                        log::debug!(
                            "{} already queued {} on {}, skipping duplicate",
                            source,
                            edge.action,
                            edge.target
                        );
                    } else {
                        self.delayed.push(dispatch);
                    }
                }
            }
        }

        immediate
    }

    /// Take the delayed queue in first-queued order
    pub fn drain_delayed(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.delayed)
    }

    pub fn pending_delayed(&self) -> usize {
        self.delayed.len()
    }
}
