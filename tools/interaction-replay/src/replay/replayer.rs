use crate::driver::ReplaySession;
use crate::errors::ReplayError;
use crate::logging::{step_payload, JsonlLogger};
use crate::replay::dispatch::{Dispatcher, StepOutcome};
use crate::replay::log_reader::read_log;
use crate::replay::rules::{first_match, SkipRule};
use crate::replay::step::InteractionStep;
use crate::runtime::{Clock, FileSystem};
use crate::types::{ErrorPolicy, ReplayOptions, ReplayProfile, ReplayTimeouts};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct ReplayFailure {
    pub step: InteractionStep,
    pub error: ReplayError,
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub failures: Vec<ReplayFailure>,
    pub executed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl ReplayReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Stops a running replay before its next step.
#[derive(Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Replayer {
    session: ReplaySession,
    dispatcher: Dispatcher,
    skip_rules: Vec<SkipRule>,
    logger: Option<JsonlLogger>,
    cancel: Option<CancelSignal>,
}

impl Replayer {
    pub fn new(
        session: ReplaySession,
        clock: Arc<dyn Clock>,
        profile: ReplayProfile,
        timeouts: ReplayTimeouts,
    ) -> Self {
        let dispatcher = Dispatcher::new(&session, clock, profile, timeouts);
        Self {
            session,
            dispatcher,
            skip_rules: crate::replay::rules::default_rules(profile),
            logger: None,
            cancel: None,
        }
    }

    pub fn with_skip_rules(mut self, rules: Vec<SkipRule>) -> Self {
        self.skip_rules = rules;
        self
    }

    pub fn add_skip_rule(&mut self, rule: SkipRule) {
        self.skip_rules.push(rule);
    }

    pub fn with_logger(mut self, logger: Option<JsonlLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn profile(&self) -> ReplayProfile {
        self.dispatcher.profile()
    }

    pub fn prepare_home(&self) -> Result<(), ReplayError> {
        self.session.app.prepare_home()
    }

    pub fn replay_file(
        &mut self,
        fs: &dyn FileSystem,
        path: &Path,
        options: ReplayOptions,
    ) -> Result<ReplayReport, ReplayError> {
        let steps = read_log(fs, path)?;
        if options.use_last_session {
            self.log(
                "warn",
                "replay_started",
                json!({"warning": "use_last_session is ignored; replay uses full file order"}),
            );
        }
        if options.prepare_home {
            self.prepare_home()?;
        }
        self.replay_steps(&steps, options.policy)
    }

    pub fn replay_steps(
        &mut self,
        steps: &[InteractionStep],
        policy: ErrorPolicy,
    ) -> Result<ReplayReport, ReplayError> {
        let mut report = ReplayReport::default();
        self.log(
            "info",
            "replay_started",
            json!({"steps": steps.len(), "profile": self.profile().as_str()}),
        );

        for step in steps {
            if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                report.cancelled = true;
                break;
            }

            if let Some(rule) = first_match(&self.skip_rules, step) {
                report.skipped += 1;
                let mut payload = step_payload(step);
                payload["reason"] = json!(format!("rule {}", rule.describe()));
                self.log("debug", "step_skipped", payload);
                continue;
            }

            match self.dispatcher.dispatch(step) {
                Ok(StepOutcome::Skipped { reason }) => {
                    report.skipped += 1;
                    let mut payload = step_payload(step);
                    payload["reason"] = json!(reason);
                    self.log("debug", "step_skipped", payload);
                }
                Ok(StepOutcome::Routed { route }) => {
                    report.executed += 1;
                    let mut payload = step_payload(step);
                    payload["route"] = json!(route);
                    self.log("debug", "route_dispatched", payload);
                }
                Ok(StepOutcome::Executed) => report.executed += 1,
                Err(error) => {
                    let mut payload = step_payload(step);
                    payload["error"] = json!(error.to_string());
                    self.log("error", "step_failed", payload);
                    match policy {
                        ErrorPolicy::FailFast => {
                            self.finish(&report, false);
                            return Err(wrap_step_error(step, error));
                        }
                        ErrorPolicy::ContinueOnError => report.failures.push(ReplayFailure {
                            step: step.clone(),
                            error: wrap_step_error(step, error),
                        }),
                    }
                }
            }
        }

        self.finish(&report, report.succeeded());
        Ok(report)
    }

    /// Release the driver. Errors are ignored.
    pub fn close(&self) {
        let _ = self.session.driver.quit();
    }

    fn finish(&self, report: &ReplayReport, ok: bool) {
        self.log(
            if ok { "info" } else { "warn" },
            "replay_finished",
            json!({
                "executed": report.executed,
                "skipped": report.skipped,
                "failures": report.failures.len(),
                "cancelled": report.cancelled,
                "ok": ok,
            }),
        );
    }

    fn log(&self, level: &str, event_type: &str, payload: serde_json::Value) {
        if let Some(logger) = &self.logger {
            logger.record(level, event_type, payload);
        }
    }
}

fn wrap_step_error(step: &InteractionStep, error: ReplayError) -> ReplayError {
    ReplayError::StepFailed {
        index: step.index,
        line: step.line,
        seq: step.seq,
        event: step.event.clone(),
        action: step.action.clone(),
        test_id: step.test_id.clone(),
        source: Box::new(error),
    }
}
