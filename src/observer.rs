use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::models::{ProbeOutcome, ProbeReport};

/// Receives every completed probe, in probe order.
///
/// Called on the controller's background task, never on the thread that
/// called `start()`. Observers that update state owned by another context
/// must hand the report over themselves (see [`ChannelObserver`]). Keep the
/// call short: the next probe waits for it.
pub trait ProbeObserver: Send + Sync {
    fn on_outcome(&self, report: ProbeReport);
}

impl<F> ProbeObserver for F
where
    F: Fn(ProbeReport) + Send + Sync,
{
    fn on_outcome(&self, report: ProbeReport) {
        self(report)
    }
}

/// Forwards reports to an unbounded channel so the consumer can process
/// them on its own task.
#[derive(Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProbeReport>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProbeReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProbeObserver for ChannelObserver {
    fn on_outcome(&self, report: ProbeReport) {
        if self.tx.send(report).is_err() {
            warn!("Report receiver dropped, discarding probe outcome");
        }
    }
}

/// Logs each outcome the way the desktop build phrased it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    pub fn message(outcome: &ProbeOutcome) -> String {
        match outcome {
            ProbeOutcome::Reachable => "Speeding Up Your Connection".into(),
            ProbeOutcome::Unreachable => "Retrying To Speed Your Connection".into(),
            ProbeOutcome::Error(detail) => format!("Error: {}", detail),
        }
    }
}

impl ProbeObserver for LogObserver {
    fn on_outcome(&self, report: ProbeReport) {
        let msg = Self::message(&report.outcome);
        match report.outcome {
            ProbeOutcome::Error(_) => error!(
                target_host = %report.target,
                seq = report.sequence,
                "{}",
                msg
            ),
            _ => info!(
                target_host = %report.target,
                seq = report.sequence,
                latency_ms = report.latency_ms.unwrap_or_default(),
                "{}",
                msg
            ),
        }
    }
}

/// Fans a report out to several observers in registration order.
pub struct Observers(Vec<Box<dyn ProbeObserver>>);

impl Observers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, observer: impl ProbeObserver + 'static) -> Self {
        self.0.push(Box::new(observer));
        self
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeObserver for Observers {
    fn on_outcome(&self, report: ProbeReport) {
        for observer in &self.0 {
            observer.on_outcome(report.clone());
        }
    }
}
