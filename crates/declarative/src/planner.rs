//! Execution planner - builds ordered resource plans

use crate::error::{Error, Result};
use crate::notify::{Action, NotificationEdge, Timing};
use crate::resource::{BoxedResource, Resource, ResourceExt};
use std::collections::HashSet;

/// An ordered execution plan
///
/// Resources are evaluated strictly in the order they were added. Handlers
/// are declared but only run when a notification targets them.
#[derive(Default)]
pub struct ExecutionPlan {
    /// Resources evaluated in the main pass, in declaration order
    pub resources: Vec<BoxedResource>,
    /// Action-only resources, run on notification
    pub handlers: Vec<BoxedResource>,
    /// Notification edges between resources
    pub edges: Vec<NotificationEdge>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource to the main pass, returning its key
    pub fn add(&mut self, resource: impl Resource + 'static) -> String {
        let key = resource.key();
        self.resources.push(Box::new(resource));
        key
    }

    /// Declare an action-only resource, returning its key
    pub fn add_handler(&mut self, resource: impl Resource + 'static) -> String {
        let key = resource.key();
        self.handlers.push(Box::new(resource));
        key
    }

    /// Declare that `target` performs `action` when `source` is applied
    pub fn notify(&mut self, source: &str, action: Action, target: &str, timing: Timing) {
        let edge = NotificationEdge {
            source: source.to_string(),
            action,
            target: target.to_string(),
            timing,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Look up a resource or handler by key
    pub fn find(&self, key: &str) -> Option<&dyn Resource> {
        self.resources
            .iter()
            .chain(self.handlers.iter())
            .find(|r| r.key() == key)
            .map(AsRef::as_ref)
    }

    /// Check keys are unique and every edge points at a declared resource
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in self.resources.iter().chain(self.handlers.iter()) {
            let key = resource.key();
            if !seen.insert(key.clone()) {
                return Err(Error::DuplicateResource(key));
            }
        }

        for edge in &self.edges {
            if !seen.contains(&edge.source) {
                return Err(Error::UnknownSource(edge.source.clone()));
            }
            if !seen.contains(&edge.target) {
                return Err(Error::UnknownTarget {
                    source_key: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
        }

        Ok(())
    }

    /// Total number of resources in the plan, handlers included
    pub fn total_resources(&self) -> usize {
        self.resources.len() + self.handlers.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.handlers.is_empty()
    }
}
