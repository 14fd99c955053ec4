use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use aero_link::CommandLink;
use aero_proto::command::Command;

use crate::FlightConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Idle,
    Running,
    /// Paused mid-plan because an operator command cut in.
    Overridden,
    /// Unwinding the trace; the facade refuses everything until done.
    Reverting,
    Completed,
}

/// Outcome of [`PlanRunner::engage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engaged {
    Started,
    RevertStarted,
    Refused,
}

#[derive(Debug)]
struct Inner {
    state: PlanState,
    trace: Vec<Command>,
    runner_alive: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Run permission. Cleared by overrides and reverts, reasserted when the
    /// interrupting party is done with the air.
    lock: watch::Sender<bool>,
    link: Arc<CommandLink>,
    steps: Vec<Command>,
    step_delay: Duration,
}

/// Executes the configured flight plan unattended. Cheap to clone; all
/// clones drive the same plan.
///
/// Every operator command issued while the plan is active clears the run
/// lock (that clearing IS the override signal, there is no separate message)
/// and lands in the trace. Engaging again while active starts a revert
/// instead of a restart: the trace is drained in reverse, each entry
/// replaced by its inverse. Step pacing is fixed sleeps throughout; the
/// single-slot response cell cannot confirm completion so no step result is
/// ever checked.
#[derive(Clone)]
pub struct PlanRunner {
    shared: Arc<Shared>,
}

impl PlanRunner {
    pub fn new(cfg: &FlightConfig, link: Arc<CommandLink>) -> Self {
        let (lock, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: PlanState::Idle,
                    trace: Vec::new(),
                    runner_alive: false,
                }),
                lock,
                link,
                steps: cfg.plan.clone(),
                step_delay: Duration::from_millis(cfg.step_delay_ms),
            }),
        }
    }

    pub fn state(&self) -> PlanState {
        self.shared.inner.lock().unwrap().state
    }

    /// Running or paused mid-plan.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), PlanState::Running | PlanState::Overridden)
    }

    pub fn is_reverting(&self) -> bool {
        self.state() == PlanState::Reverting
    }

    /// First invocation starts the plan; a second one while the plan is
    /// active is a request to revert, never a restart. Refused outright
    /// while a revert is draining.
    pub fn engage(&self) -> Engaged {
        let mut inner = self.shared.inner.lock().unwrap();
        match inner.state {
            PlanState::Idle | PlanState::Completed => {
                inner.state = PlanState::Running;
                inner.trace.clear();
                inner.runner_alive = true;
                drop(inner);
                self.shared.lock.send_replace(true);
                let runner = self.clone();
                tokio::spawn(async move { runner.run().await });
                Engaged::Started
            }
            PlanState::Running | PlanState::Overridden => {
                inner.state = PlanState::Reverting;
                drop(inner);
                // park the runner before undoing anything it sent
                self.shared.lock.send_replace(false);
                let runner = self.clone();
                tokio::spawn(async move { runner.revert().await });
                Engaged::RevertStarted
            }
            PlanState::Reverting => {
                warn!("flight: engage refused, revert in progress");
                Engaged::Refused
            }
        }
    }

    /// Facade hook: an operator command is about to cut in. Clears the run
    /// lock and records the command so a later revert undoes it along with
    /// the plan's own steps.
    pub fn record_override(&self, cmd: &Command) {
        self.shared.lock.send_replace(false);
        let mut inner = self.shared.inner.lock().unwrap();
        inner.trace.push(cmd.clone());
        info!("flight: override '{}' traced ({} entries)", cmd, inner.trace.len());
    }

    /// Facade hook: the overriding command finished its acknowledgement
    /// window, give the air back. A revert keeps the runner parked until it
    /// is fully done.
    pub fn rearm(&self) {
        let inner = self.shared.inner.lock().unwrap();
        if inner.state != PlanState::Reverting {
            self.shared.lock.send_replace(true);
        }
    }

    async fn run(self) {
        let shared = &self.shared;
        info!("flight: plan engaged, {} steps", shared.steps.len());
        for (idx, step) in shared.steps.iter().enumerate() {
            if !*shared.lock.borrow() {
                // permission was taken away before this step went out
                self.pause_at(idx);
                let mut rx = shared.lock.subscribe();
                if rx.wait_for(|armed| *armed).await.is_err() {
                    return;
                }
                self.resume_at(idx);
                // The interrupted step is replayed, not skipped. This mirrors
                // the reference controller; it can double a motion command
                // when the override itself moved the vehicle.
                tokio::time::sleep(shared.step_delay).await;
            }
            shared.inner.lock().unwrap().trace.push(step.clone());
            if let Err(e) = shared.link.send(step).await {
                warn!("flight: step {} send failed: {:#}", idx, e);
            }
            tokio::time::sleep(shared.step_delay).await;
        }

        let mut inner = shared.inner.lock().unwrap();
        inner.state = PlanState::Completed;
        inner.runner_alive = false;
        drop(inner);
        shared.lock.send_replace(false);
        info!("flight: plan completed");
    }

    async fn revert(self) {
        let shared = &self.shared;
        let trace: Vec<Command> = {
            let mut inner = shared.inner.lock().unwrap();
            std::mem::take(&mut inner.trace)
        };
        info!("flight: reverting {} traced commands", trace.len());
        for cmd in trace.iter().rev() {
            let inverse = cmd.inverse();
            info!("flight: revert '{}' with '{}'", cmd, inverse);
            if let Err(e) = shared.link.send(&inverse).await {
                warn!("flight: revert send failed: {:#}", e);
            }
            tokio::time::sleep(shared.step_delay).await;
        }

        {
            let mut inner = shared.inner.lock().unwrap();
            if !inner.runner_alive {
                inner.state = PlanState::Idle;
            }
        }
        // re-arm; a runner parked mid-plan wakes and replays its interrupted
        // step
        shared.lock.send_replace(true);
        info!("flight: revert complete");
    }

    fn pause_at(&self, idx: usize) {
        let mut inner = self.shared.inner.lock().unwrap();
        // a revert also clears the lock; it owns the state in that case
        if inner.state == PlanState::Running {
            inner.state = PlanState::Overridden;
        }
        info!("flight: step {} held ({:?})", idx, inner.state);
    }

    fn resume_at(&self, idx: usize) {
        let mut inner = self.shared.inner.lock().unwrap();
        if matches!(inner.state, PlanState::Overridden | PlanState::Reverting) {
            inner.state = PlanState::Running;
        }
        info!("flight: step {} resumed", idx);
    }
}
