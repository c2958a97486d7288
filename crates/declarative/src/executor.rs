//! Execution engine - converges resources in declaration order
//!
//! Single pass, single thread. Each resource moves from unevaluated to a
//! terminal state before the next one is looked at; the first failure aborts
//! the run without touching later resources.

use crate::context::{ApplyContext, ProgressCallback};
use crate::error::{Error, Result};
use crate::notify::{Dispatch, NotificationBus};
use crate::planner::ExecutionPlan;
use crate::resource::{Resource, ResourceExt};
use crate::types::{
    ApplyResult, ConvergenceState, ExecuteOptions, FiredNotification, ResourceReport, RunReport,
};

/// Execute a plan with the given options and progress callback
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, verbose)
/// * `progress` - Progress callback
///
/// # Returns
/// Report of every evaluated resource, fired notifications and captured
/// values. The first probe or apply failure is returned as an error.
pub fn execute<P>(plan: &ExecutionPlan, opts: &ExecuteOptions, progress: &mut P) -> Result<RunReport>
where
    P: ProgressCallback,
{
    plan.validate()?;

    let mut ctx = ApplyContext::new(opts.dry_run, opts.verbose);
    let mut bus = NotificationBus::new(plan.edges.clone());
    let mut report = RunReport::default();

    for resource in &plan.resources {
        let key = resource.key();
        progress.on_resource_start(&key, &resource.description());

        let (state, note) = match converge(resource.as_ref(), &mut ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                progress.on_resource_complete(&key, ConvergenceState::Failed, None);
                return Err(e);
            }
        };

        progress.on_resource_complete(&key, state, note.as_deref());
        report.resources.push(ResourceReport {
            key: key.clone(),
            resource_type: resource.resource_type().to_string(),
            state,
            note,
        });

        if state == ConvergenceState::Applied {
            for dispatch in bus.on_applied(&key) {
                fire(plan, &dispatch, &mut ctx, progress, &mut report)?;
            }
        }
    }

    for dispatch in bus.drain_delayed() {
        fire(plan, &dispatch, &mut ctx, progress, &mut report)?;
    }

    report.captured = ctx.take_captured();
    Ok(report)
}

/// Move one resource from unevaluated to a terminal state
fn converge(
    resource: &dyn Resource,
    ctx: &mut ApplyContext,
) -> Result<(ConvergenceState, Option<String>)> {
    let key = resource.key();

    if let Some(reason) = resource.guard().map_err(|source| Error::Probe {
        resource: key.clone(),
        source,
    })? {
        log::debug!("{key} skipped by guard: {reason}");
        return Ok((ConvergenceState::Unchanged, Some(reason)));
    }

    let current = resource.current_state().map_err(|source| Error::Probe {
        resource: key.clone(),
        source,
    })?;
    let desired = resource.desired_state();

    if current == desired {
        log::debug!("{key} is up to date");
        return Ok((ConvergenceState::Unchanged, None));
    }

    if ctx.dry_run {
        log::info!("{key} would change: {current:?} -> {desired:?}");
        return Ok((ConvergenceState::Pending, None));
    }

    log::info!("applying {key}");
    let result = resource
        .apply(ctx)
        .map_err(|source| Error::Apply { resource: key, source })?;

    Ok(match result {
        ApplyResult::NoChange => (ConvergenceState::Unchanged, None),
        ApplyResult::Created | ApplyResult::Modified => (ConvergenceState::Applied, None),
    })
}

/// Run a notified action on its target
fn fire<P: ProgressCallback>(
    plan: &ExecutionPlan,
    dispatch: &Dispatch,
    ctx: &mut ApplyContext,
    progress: &mut P,
    report: &mut RunReport,
) -> Result<()> {
    let target = plan.find(&dispatch.target).ok_or_else(|| Error::UnknownTarget {
        source_key: dispatch.source.clone(),
        target: dispatch.target.clone(),
    })?;

    progress.on_notification(&dispatch.source, dispatch.action, &dispatch.target);
    log::info!(
        "{} notified {} on {} ({})",
        dispatch.source,
        dispatch.action,
        dispatch.target,
        dispatch.timing
    );

    target
        .run_action(dispatch.action, ctx)
        .map_err(|source| Error::Notify {
            target: dispatch.target.clone(),
            action: dispatch.action,
            notified_by: dispatch.source.clone(),
            source,
        })?;

    report.notifications.push(FiredNotification {
        source: dispatch.source.clone(),
        action: dispatch.action,
        target: dispatch.target.clone(),
        timing: dispatch.timing,
    });
    Ok(())
}

/// Simple execution without progress reporting
pub fn execute_simple(plan: &ExecutionPlan, opts: &ExecuteOptions) -> Result<RunReport> {
    use crate::context::NoProgress;

    execute(plan, opts, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Action, Timing};
    use crate::types::ResourceState;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct TestResource {
        id: String,
        should_change: bool,
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> anyhow::Result<ResourceState> {
            if self.should_change {
                Ok(ResourceState::Absent)
            } else {
                Ok(ResourceState::present())
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::present()
        }

        fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            ctx.capture(format!("{}.applied", self.id), "yes");
            Ok(ApplyResult::Created)
        }
    }

    #[derive(Debug)]
    struct Counter {
        id: &'static str,
        runs: Rc<Cell<usize>>,
    }

    impl Resource for Counter {
        fn id(&self) -> String {
            self.id.into()
        }
        fn description(&self) -> String {
            format!("count {}", self.id)
        }
        fn resource_type(&self) -> &'static str {
            "counter"
        }
        fn current_state(&self) -> anyhow::Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::present()
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            self.runs.set(self.runs.get() + 1);
            Ok(ApplyResult::Modified)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_resource_start(&mut self, _key: &str, _description: &str) {}
        fn on_resource_complete(&mut self, key: &str, state: ConvergenceState, _note: Option<&str>) {
            self.events.push(format!("{key}={state}"));
        }
        fn on_notification(&mut self, _source: &str, action: Action, target: &str) {
            self.events.push(format!("{action}->{target}"));
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let plan = ExecutionPlan::new();
        let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
        assert!(report.resources.is_empty());
        assert!(report.is_noop());
    }

    #[test]
    fn test_execute_no_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add(TestResource {
            id: "test1".into(),
            should_change: false,
        });

        let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
        assert_eq!(report.unchanged(), 1);
        assert!(report.is_noop());
        assert!(report.captured.is_empty());
    }

    #[test]
    fn test_execute_with_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add(TestResource {
            id: "test1".into(),
            should_change: true,
        });

        let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
        assert_eq!(report.applied(), 1);
        assert_eq!(
            report.captured.get("test1.applied").map(String::as_str),
            Some("yes")
        );
    }

    #[test]
    fn dry_run_reports_pending_without_applying() {
        let runs = Rc::new(Cell::new(0));
        let mut plan = ExecutionPlan::new();
        let source = plan.add(Counter {
            id: "a",
            runs: Rc::clone(&runs),
        });
        let target = plan.add_handler(Counter {
            id: "b",
            runs: Rc::clone(&runs),
        });
        plan.notify(&source, Action::Run, &target, Timing::Immediate);

        let opts = ExecuteOptions {
            dry_run: true,
            verbose: false,
        };
        let report = execute_simple(&plan, &opts).unwrap();
        assert_eq!(report.pending(), 1);
        assert_eq!(runs.get(), 0);
        assert!(report.notifications.is_empty());
    }

    #[test]
    fn immediate_notification_runs_before_next_resource() {
        let mut plan = ExecutionPlan::new();
        let first = plan.add(TestResource {
            id: "first".into(),
            should_change: true,
        });
        let handler = plan.add_handler(Counter {
            id: "handler",
            runs: Rc::new(Cell::new(0)),
        });
        plan.add(TestResource {
            id: "second".into(),
            should_change: true,
        });
        plan.notify(&first, Action::Run, &handler, Timing::Immediate);

        let mut recorder = Recorder::default();
        execute(&plan, &ExecuteOptions::default(), &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            [
                "test[first]=applied",
                "run->counter[handler]",
                "test[second]=applied"
            ]
        );
    }

    #[test]
    fn unchanged_source_does_not_notify() {
        let runs = Rc::new(Cell::new(0));
        let mut plan = ExecutionPlan::new();
        let source = plan.add(TestResource {
            id: "quiet".into(),
            should_change: false,
        });
        let handler = plan.add_handler(Counter {
            id: "handler",
            runs: Rc::clone(&runs),
        });
        plan.notify(&source, Action::Run, &handler, Timing::Immediate);

        let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
        assert_eq!(runs.get(), 0);
        assert!(report.is_noop());
    }

    #[test]
    fn handler_not_evaluated_in_main_pass() {
        let runs = Rc::new(Cell::new(0));
        let mut plan = ExecutionPlan::new();
        plan.add_handler(Counter {
            id: "idle",
            runs: Rc::clone(&runs),
        });

        let report = execute_simple(&plan, &ExecuteOptions::default()).unwrap();
        assert_eq!(runs.get(), 0);
        assert!(report.resources.is_empty());
    }

    #[test]
    fn failing_notification_aborts_run() {
        #[derive(Debug)]
        struct Broken;
        impl Resource for Broken {
            fn id(&self) -> String {
                "broken".into()
            }
            fn description(&self) -> String {
                "broken".into()
            }
            fn resource_type(&self) -> &'static str {
                "service"
            }
            fn current_state(&self) -> anyhow::Result<ResourceState> {
                Ok(ResourceState::present())
            }
            fn desired_state(&self) -> ResourceState {
                ResourceState::present()
            }
            fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
                anyhow::bail!("init script missing")
            }
        }

        let mut plan = ExecutionPlan::new();
        let source = plan.add(TestResource {
            id: "src".into(),
            should_change: true,
        });
        let target = plan.add_handler(Broken);
        plan.notify(&source, Action::Run, &target, Timing::Immediate);

        let err = execute_simple(&plan, &ExecuteOptions::default()).unwrap_err();
        assert!(err.to_string().contains("init script missing"));
        assert!(matches!(err, Error::Notify { ref target, .. } if target == "service[broken]"));
    }
}
