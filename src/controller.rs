//! Start/stop-able probe loop.
//!
//! The run state lives in a `watch` channel owned by the [`Controller`]. It is
//! the only thing shared with the loop task: `start()` and `stop()` change it
//! with compare-and-set updates, and the loop waits on the same channel for
//! the stop request. The loop task owns the transition back to `Idle`, and
//! each session also signals its own exit so `stop()` waits for the session
//! it stopped rather than for whatever runs next.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::models::{ProbeOutcome, ProbeReport, RunState};
use crate::observer::ProbeObserver;
use crate::prober::Prober;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A loop is running or still shutting down; nothing was spawned.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyIdle,
}

struct Inner {
    config: ControllerConfig,
    /// Exit signal of the most recently started session.
    session_exit: Option<watch::Receiver<bool>>,
}

pub struct Controller {
    inner: Mutex<Inner>,
    prober: Arc<dyn Prober>,
    observer: Arc<dyn ProbeObserver>,
    state: Arc<watch::Sender<RunState>>,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        prober: Arc<dyn Prober>,
        observer: Arc<dyn ProbeObserver>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            inner: Mutex::new(Inner {
                config,
                session_exit: None,
            }),
            prober,
            observer,
            state: Arc::new(state),
        }
    }

    /// Spawns the probe loop on the current tokio runtime and returns
    /// immediately.
    ///
    /// Reports are delivered to the observer from that background task.
    pub fn start(&self) -> Result<StartOutcome, ControllerError> {
        let runtime = Handle::try_current()?;

        // Held across the Idle -> Running transition so reconfigure() and
        // stop() cannot interleave with it.
        let mut inner = self.lock_inner();
        let started = self.state.send_if_modified(|state| {
            if *state == RunState::Idle {
                *state = RunState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            debug!(state = ?self.state(), "Start ignored, probe loop already active");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let config = inner.config.clone();
        info!(
            target_host = %config.target(),
            probe_timeout_ms = config.probe_timeout().as_millis() as u64,
            loop_interval_ms = config.loop_interval().as_millis() as u64,
            "Probe loop starting"
        );

        let (exited, session_exit) = watch::channel(false);
        inner.session_exit = Some(session_exit);

        let session = ProbeSession {
            config,
            prober: Arc::clone(&self.prober),
            observer: Arc::clone(&self.observer),
            state: self.state.subscribe(),
        };
        // Created before spawning: if the task is dropped unpolled the
        // state still returns to Idle.
        let guard = SessionExit {
            state: Arc::clone(&self.state),
            exited,
        };
        runtime.spawn(async move {
            let _guard = guard;
            session.run().await;
        });

        Ok(StartOutcome::Started)
    }

    /// Asks the loop to stop without waiting for it. Returns false when the
    /// controller was not running.
    pub fn request_stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Stopping;
                true
            } else {
                false
            }
        })
    }

    /// Stops the loop and resolves once it has exited. No probe starts and
    /// no report is delivered by that session after this returns.
    pub async fn stop(&self) -> StopOutcome {
        let mut exited = {
            let inner = self.lock_inner();
            if self.request_stop() {
                info!("Stop requested, waiting for probe loop to exit");
            } else if self.state() == RunState::Idle {
                return StopOutcome::AlreadyIdle;
            }
            match inner.session_exit.clone() {
                Some(exited) => exited,
                None => return StopOutcome::Stopped,
            }
        };

        // A closed channel also means the session is gone.
        let _ = exited.wait_for(|done| *done).await;
        StopOutcome::Stopped
    }

    /// Replaces target and timings. Only allowed while idle.
    pub fn reconfigure(&self, config: ControllerConfig) -> Result<(), ControllerError> {
        let mut inner = self.lock_inner();
        if self.state() != RunState::Idle {
            return Err(ControllerError::NotIdle);
        }
        info!(target_host = %config.target(), "Controller reconfigured");
        inner.config = config;
        Ok(())
    }

    pub fn config(&self) -> ControllerConfig {
        self.lock_inner().config.clone()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Watch run state changes, e.g. to drive a start/stop toggle.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.request_stop() {
            debug!("Controller dropped while running, stopping probe loop");
        }
    }
}

/// Owned by the loop task; returns the controller to Idle and then marks
/// the session as exited.
struct SessionExit {
    state: Arc<watch::Sender<RunState>>,
    exited: watch::Sender<bool>,
}

impl Drop for SessionExit {
    fn drop(&mut self) {
        self.state.send_replace(RunState::Idle);
        self.exited.send_replace(true);
    }
}

struct ProbeSession {
    config: ControllerConfig,
    prober: Arc<dyn Prober>,
    observer: Arc<dyn ProbeObserver>,
    state: watch::Receiver<RunState>,
}

impl ProbeSession {
    async fn run(mut self) {
        let mut ticker = interval(self.config.loop_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut self.state) => break,
                _ = ticker.tick() => {}
            }

            let timestamp = Utc::now();
            let started = Instant::now();
            let probe = self
                .prober
                .probe(self.config.target(), self.config.probe_timeout());
            let probe = AssertUnwindSafe(probe).catch_unwind();
            let outcome = tokio::select! {
                biased;
                _ = stop_requested(&mut self.state) => {
                    debug!(sequence = sequence + 1, "In-flight probe cancelled");
                    break;
                }
                result = probe => result.unwrap_or_else(|panic| {
                    let panic_msg = panic_message(panic.as_ref());
                    error!(
                        sequence = sequence + 1,
                        panic_msg = %panic_msg,
                        "Prober panicked, probe loop continues"
                    );
                    ProbeOutcome::Error(format!("prober panicked: {}", panic_msg))
                }),
            };

            sequence += 1;
            debug!(sequence, outcome = ?outcome, "Probe completed");
            self.deliver(ProbeReport::new(
                sequence,
                self.config.target().clone(),
                timestamp,
                outcome,
                started.elapsed(),
            ));
        }

        info!(
            target_host = %self.config.target(),
            probes = sequence,
            "Probe loop stopped"
        );
    }

    fn deliver(&self, report: ProbeReport) {
        let sequence = report.sequence;
        let delivered = catch_unwind(AssertUnwindSafe(|| self.observer.on_outcome(report)));
        if let Err(panic) = delivered {
            let panic_msg = panic_message(panic.as_ref());
            error!(
                sequence,
                panic_msg = %panic_msg,
                "Observer panicked, probe loop continues"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Resolves once the controller leaves `Running`.
async fn stop_requested(state: &mut watch::Receiver<RunState>) {
    // Err means the controller side is gone, which is a stop as well.
    let _ = state.wait_for(|state| *state != RunState::Running).await;
}
