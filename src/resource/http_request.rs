//! HTTP request resource, used to kick off the application's first-run setup

use anyhow::{Context, Result, bail};
use std::time::Duration;

use super::{Action, ApplyContext, ApplyResult, Resource, ResourceState};

/// Setup can take a while on the first request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// A GET request issued when notified
///
/// Redirects are followed; the final response must be 2xx or 3xx.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub name: String,
    pub url: String,
}

impl HttpRequest {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    fn get(&self) -> Result<u16> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        let response = agent
            .get(&self.url)
            .header("User-Agent", concat!("hearth/", env!("CARGO_PKG_VERSION")))
            .call()
            .with_context(|| format!("GET {} failed", self.url))?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            bail!("GET {} returned {status}", self.url);
        }
        log::info!("GET {} -> {status}", self.url);
        Ok(status.as_u16())
    }
}

impl Resource for HttpRequest {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("GET {}", self.url)
    }

    fn resource_type(&self) -> &'static str {
        "http_request"
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Absent)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.get()?;
        Ok(ApplyResult::Modified)
    }

    fn run_action(&self, action: Action, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match action {
            Action::Get | Action::Run => self.apply(ctx),
            other => bail!("http_request does not support action '{other}'"),
        }
    }
}
