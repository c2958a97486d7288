//! Diff computation for resources

use crate::resource::{ContentChange, Resource, ResourceExt};
use crate::types::ResourceState;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Qualified key of the resource
    pub resource_key: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
    /// File content that would change, when the resource manages a file
    #[serde(skip)]
    pub content: Option<ContentChange>,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    ///
    /// Guarded resources never produce a diff.
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        if resource.guard()?.is_some() {
            return Ok(None);
        }

        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_key: resource.key(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
            content: resource.content_change()?,
        }))
    }

    /// Diff for a resource whose state could not be probed yet
    fn unknown(resource: &dyn Resource, reason: &anyhow::Error) -> Self {
        log::debug!("probe of {} failed during planning: {:#}", resource.key(), reason);
        Self {
            resource_key: resource.key(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current: ResourceState::Unknown,
            desired: resource.desired_state(),
            content: None,
        }
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }

    /// Check if the current state is unknown
    pub fn is_unknown(&self) -> bool {
        matches!(self.current, ResourceState::Unknown)
    }
}

/// Compute diffs for a list of resources
///
/// Probes run without applying anything, so a resource that depends on an
/// earlier one (a database user on its database) may not be probeable yet;
/// such resources are reported with an unknown current state.
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|r| match ResourceDiff::from_resource(r.as_ref()) {
            Ok(diff) => diff,
            Err(e) => Some(ResourceDiff::unknown(r.as_ref(), &e)),
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
    /// Number of resources whose state is not known before applying
    pub unknown: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_unknown() {
                summary.unknown += 1;
            } else if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.unknown
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ApplyResult;

    #[derive(Debug)]
    struct Probe {
        id: &'static str,
        current: Option<ResourceState>,
        guarded: bool,
    }

    impl Resource for Probe {
        fn id(&self) -> String {
            self.id.into()
        }
        fn description(&self) -> String {
            format!("probe {}", self.id)
        }
        fn resource_type(&self) -> &'static str {
            "probe"
        }
        fn guard(&self) -> Result<Option<String>> {
            Ok(self.guarded.then(|| "guarded".to_string()))
        }
        fn current_state(&self) -> Result<ResourceState> {
            self.current
                .clone()
                .ok_or_else(|| anyhow::anyhow!("mysql is not installed"))
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::present()
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
    }

    #[test]
    fn diffs_skip_converged_and_guarded() {
        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(Probe {
                id: "ok",
                current: Some(ResourceState::present()),
                guarded: false,
            }),
            Box::new(Probe {
                id: "guarded",
                current: Some(ResourceState::Absent),
                guarded: true,
            }),
            Box::new(Probe {
                id: "missing",
                current: Some(ResourceState::Absent),
                guarded: false,
            }),
        ];

        let diffs = compute_diffs(&resources);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].resource_key, "probe[missing]");
        assert!(diffs[0].is_addition());
    }

    #[test]
    fn probe_failure_becomes_unknown() {
        let resources: Vec<Box<dyn Resource>> = vec![Box::new(Probe {
            id: "db",
            current: None,
            guarded: false,
        })];

        let diffs = compute_diffs(&resources);
        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.unknown, 1);
        assert!(summary.has_changes());
    }
}
