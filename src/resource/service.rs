//! Service resource - keep a system service running, restart on demand

use anyhow::{Result, bail};

use super::{Action, ApplyContext, ApplyResult, Resource, ResourceState};
use crate::runner;

/// A system service managed through `service(8)`
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
}

impl Service {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    fn is_running(&self) -> bool {
        runner::run_quiet("service", &[&self.name, "status"])
    }

    fn control(&self, verb: &str) -> Result<()> {
        log::info!("service {} {verb}", self.name);
        runner::run_capture("service", &[&self.name, verb]).map(|_| ())
    }
}

impl Resource for Service {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Service {} running", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "service"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.is_running() {
            Ok(ResourceState::present())
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.control("start")?;
        Ok(ApplyResult::Modified)
    }

    fn run_action(&self, action: Action, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match action {
            Action::Restart => self.control("restart")?,
            Action::Reload => self.control("reload")?,
            Action::Run | Action::Create => return self.apply(ctx),
            Action::Get => bail!("service does not support action '{action}'"),
        }
        Ok(ApplyResult::Modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_rejected() {
        let mut ctx = ApplyContext::new(false, false);
        let err = Service::new("apache2")
            .run_action(Action::Get, &mut ctx)
            .unwrap_err();
        assert!(err.to_string().contains("'get'"));
    }

    #[test]
    fn test_identity() {
        let service = Service::new("apache2");
        assert_eq!(service.id(), "apache2");
        assert_eq!(service.resource_type(), "service");
    }
}
