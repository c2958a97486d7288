//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::notify::Action;
use crate::types::{ApplyResult, ResourceState};
use anyhow::{Result, bail};
use std::fmt;

/// Before/after text of a file-like resource, for previews
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub path: String,
    pub before: String,
    pub after: String,
}

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (id, description, type)
/// - An optional guard that short-circuits evaluation
/// - State detection (current vs desired)
/// - State convergence (apply)
/// - Actions that other resources can trigger through notifications
///
/// # Example
///
/// ```ignore
/// use declarative::{Resource, ResourceState, ApplyResult, ApplyContext};
///
/// #[derive(Debug)]
/// struct FileResource {
///     path: String,
///     content: String,
/// }
///
/// impl Resource for FileResource {
///     fn id(&self) -> String {
///         self.path.clone()
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure file exists at {}", self.path)
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "file"
///     }
///
///     fn current_state(&self) -> anyhow::Result<ResourceState> {
///         if std::path::Path::new(&self.path).exists() {
///             Ok(ResourceState::present())
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::present()
///     }
///
///     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         std::fs::write(&self.path, &self.content)?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: fmt::Debug {
    /// Identifier for this resource, unique within its type
    ///
    /// Examples:
    /// - "php5-gd" for a package
    /// - "/var/www/owncloud/config" for a directory
    /// - "run setup" for an HTTP request
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category
    ///
    /// Used in keys and for grouping. Examples: "package", "directory",
    /// "mysql_database", "template".
    fn resource_type(&self) -> &'static str;

    /// Precondition that skips the resource entirely
    ///
    /// Returning `Some(reason)` moves the resource straight to unchanged
    /// without probing or comparing content ("create once, never
    /// overwrite").
    fn guard(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Detect the current state of this resource
    ///
    /// Must not have side effects.
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    ///
    /// Default implementation compares current and desired states.
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// Called only after a probe showed the resource is out of date.
    /// Return `NoChange` if the work turned out to be unnecessary.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// Run an action requested by a notification
    ///
    /// `Run` and `Create` converge the resource unconditionally. Resources
    /// with other actions (restart, get) override this.
    fn run_action(&self, action: Action, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match action {
            Action::Run | Action::Create => self.apply(ctx),
            other => bail!(
                "{} does not support action '{}'",
                self.resource_type(),
                other
            ),
        }
    }

    /// Content that applying would write, if the resource manages a file
    fn content_change(&self) -> Result<Option<ContentChange>> {
        Ok(None)
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// Extension trait for working with resources
pub trait ResourceExt {
    /// Qualified key used by plans and notifications: `type[id]`
    fn key(&self) -> String;
}

impl<R: Resource + ?Sized> ResourceExt for R {
    fn key(&self) -> String {
        resource_key(self.resource_type(), &self.id())
    }
}

/// Build the qualified key for a resource type and id
pub fn resource_key(resource_type: &str, id: &str) -> String {
    format!("{resource_type}[{id}]")
}
