//! # Declarative
//!
//! A framework for idempotent, ordered resource convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! probing current state, and converging a host to match it in a single
//! synchronous pass.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (files, packages, databases)
//! - **ResourceState**: The current or desired state of a resource
//! - **ConvergenceState**: Where a resource ended up in a run
//!   (`Unchanged`, `Applied`, `Failed`, or `Pending` in dry runs)
//! - **ExecutionPlan**: Resources in declaration order, action-only handlers,
//!   and notification edges between them
//! - **NotificationBus**: Fires immediate notifications right after the
//!   source is applied and deduplicated delayed ones at the end of the run
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Action, ExecutionPlan, ExecuteOptions, Timing, execute_simple};
//!
//! let mut plan = ExecutionPlan::new();
//! let download = plan.add(RemoteFile::new(url, cache_path));
//! let extract = plan.add_handler(Archive::new(cache_path, www_dir));
//! plan.notify(&download, Action::Run, &extract, Timing::Immediate);
//!
//! let report = execute_simple(&plan, &ExecuteOptions::default())?;
//! assert!(report.applied() <= plan.resources.len());
//! ```
//!
//! ## Failure
//!
//! The first resource that cannot be probed or applied aborts the run with
//! an [`Error`] naming the resource. Earlier resources are not rolled back;
//! because every resource is idempotent, re-running after fixing the cause
//! is safe.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod notify;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs};
pub use error::{Error, Result};
pub use executor::{execute, execute_simple};
pub use notify::{Action, NotificationBus, NotificationEdge, Timing};
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, ContentChange, Resource, ResourceExt, resource_key};
pub use types::{
    ApplyResult, ConvergenceState, ExecuteOptions, FiredNotification, ResourceReport,
    ResourceState, RunReport,
};
