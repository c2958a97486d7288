//! End-to-end convergence runs against a temporary directory

use anyhow::Result;
use declarative::{
    Action, ApplyContext, ApplyResult, ConvergenceState, Error, ExecuteOptions, ExecutionPlan,
    Resource, ResourceState, Timing, execute_simple,
};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug)]
struct FileResource {
    path: PathBuf,
    content: String,
}

impl FileResource {
    fn new(path: &Path, content: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            content: content.to_string(),
        }
    }
}

impl Resource for FileResource {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn description(&self) -> String {
        format!("File {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        match fs::read_to_string(&self.path) {
            Ok(existing) if existing == self.content => Ok(ResourceState::present()),
            Ok(_) => Ok(ResourceState::Modified {
                from: "other content".into(),
                to: "rendered".into(),
            }),
            Err(_) => Ok(ResourceState::Absent),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        fs::write(&self.path, &self.content)?;
        Ok(ApplyResult::Created)
    }
}

/// Creates its file once and never overwrites it
#[derive(Debug)]
struct CreateOnce {
    inner: FileResource,
    marker: PathBuf,
    probes: Rc<Cell<usize>>,
}

impl Resource for CreateOnce {
    fn id(&self) -> String {
        self.inner.id()
    }
    fn description(&self) -> String {
        self.inner.description()
    }
    fn resource_type(&self) -> &'static str {
        "template"
    }
    fn guard(&self) -> Result<Option<String>> {
        Ok(self
            .marker
            .exists()
            .then(|| format!("{} exists", self.marker.display())))
    }
    fn current_state(&self) -> Result<ResourceState> {
        self.probes.set(self.probes.get() + 1);
        self.inner.current_state()
    }
    fn desired_state(&self) -> ResourceState {
        self.inner.desired_state()
    }
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.inner.apply(ctx)
    }
}

#[derive(Debug)]
struct Restart {
    name: &'static str,
    restarts: Rc<Cell<usize>>,
}

impl Resource for Restart {
    fn id(&self) -> String {
        self.name.into()
    }
    fn description(&self) -> String {
        format!("Service {}", self.name)
    }
    fn resource_type(&self) -> &'static str {
        "service"
    }
    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::present())
    }
    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }
    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::NoChange)
    }
    fn run_action(&self, action: Action, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        assert_eq!(action, Action::Restart);
        self.restarts.set(self.restarts.get() + 1);
        Ok(ApplyResult::Modified)
    }
}

#[derive(Debug)]
struct Failing;

impl Resource for Failing {
    fn id(&self) -> String {
        "grant".into()
    }
    fn description(&self) -> String {
        "grant privileges".into()
    }
    fn resource_type(&self) -> &'static str {
        "mysql_user"
    }
    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Absent)
    }
    fn desired_state(&self) -> ResourceState {
        ResourceState::present()
    }
    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        anyhow::bail!("access denied for user 'root'@'localhost'")
    }
}

#[test]
fn second_run_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let build = || {
        let mut plan = ExecutionPlan::new();
        plan.add(FileResource::new(&dir.path().join("a.conf"), "a = 1\n"));
        plan.add(FileResource::new(&dir.path().join("b.conf"), "b = 2\n"));
        plan
    };

    let first = execute_simple(&build(), &ExecuteOptions::default()).unwrap();
    assert_eq!(first.applied(), 2);

    let second = execute_simple(&build(), &ExecuteOptions::default()).unwrap();
    assert_eq!(second.unchanged(), 2);
    assert!(second.is_noop());
}

#[test]
fn guard_short_circuits_without_probe() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("config.php");
    fs::write(&marker, "<?php $CONFIG = array();").unwrap();

    let probes = Rc::new(Cell::new(0));
    let mut plan = ExecutionPlan::new();
    let key = plan.add(CreateOnce {
        inner: FileResource::new(&dir.path().join("autoconfig.php"), "x"),
        marker,
        probes: Rc::clone(&probes),
    });

    let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(report.state_of(&key), Some(ConvergenceState::Unchanged));
    assert_eq!(probes.get(), 0);
    assert!(!dir.path().join("autoconfig.php").exists());
}

#[test]
fn failure_stops_later_resources() {
    let dir = tempfile::tempdir().unwrap();
    let before = dir.path().join("before");
    let after = dir.path().join("after");

    let mut plan = ExecutionPlan::new();
    plan.add(FileResource::new(&before, "1"));
    plan.add(Failing);
    plan.add(FileResource::new(&after, "2"));

    let err = execute_simple(&plan, &ExecuteOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Apply { .. }));
    assert_eq!(err.resource(), Some("mysql_user[grant]"));
    assert!(err.to_string().contains("access denied"));
    assert!(before.exists());
    assert!(!after.exists());
}

#[test]
fn delayed_restart_runs_once_after_all_resources() {
    let dir = tempfile::tempdir().unwrap();
    let restarts = Rc::new(Cell::new(0));

    let mut plan = ExecutionPlan::new();
    let http = plan.add(FileResource::new(&dir.path().join("site.conf"), "80"));
    let https = plan.add(FileResource::new(&dir.path().join("site-ssl.conf"), "443"));
    let apache = plan.add_handler(Restart {
        name: "apache2",
        restarts: Rc::clone(&restarts),
    });
    plan.notify(&http, Action::Restart, &apache, Timing::Delayed);
    plan.notify(&https, Action::Restart, &apache, Timing::Delayed);

    let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(restarts.get(), 1);
    assert_eq!(report.notifications.len(), 1);
    assert_eq!(report.notifications[0].source, http);

    let again = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(restarts.get(), 1);
    assert!(again.is_noop());
}
