use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::models::ProbeReport;

/// How many reports the status board keeps before dropping the oldest.
pub const RECENT_CAPACITY: usize = 100;

/// In-memory view of the latest probe reports, fed from a
/// [`ChannelObserver`](crate::observer::ChannelObserver).
pub struct StatusBoard {
    recent: VecDeque<ProbeReport>,
    capacity: usize,
}

impl StatusBoard {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, report: ProbeReport) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(report);
    }

    pub fn last(&self) -> Option<&ProbeReport> {
        self.recent.back()
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<ProbeReport> {
        self.recent.iter().cloned().collect()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(RECENT_CAPACITY)
    }
}

/// Drains `reports` into `board` until every sender is gone.
pub fn spawn_feeder(
    board: Arc<Mutex<StatusBoard>>,
    mut reports: mpsc::UnboundedReceiver<ProbeReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            board.lock().await.record(report);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeOutcome, ProbeTarget};
    use crate::observer::{ChannelObserver, ProbeObserver};
    use chrono::Utc;
    use std::time::Duration;

    fn report(sequence: u64) -> ProbeReport {
        ProbeReport::new(
            sequence,
            ProbeTarget::new("example.com").unwrap(),
            Utc::now(),
            ProbeOutcome::Reachable,
            Duration::from_millis(1),
        )
    }

    #[test]
    fn keeps_only_the_most_recent_reports() {
        let mut board = StatusBoard::new(3);
        assert!(board.last().is_none());
        for seq in 1..=5 {
            board.record(report(seq));
        }
        let sequences: Vec<u64> = board.recent().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5]);
        assert_eq!(board.last().map(|r| r.sequence), Some(5));
    }

    #[tokio::test]
    async fn feeder_records_until_observer_dropped() {
        let board = Arc::new(Mutex::new(StatusBoard::default()));
        let (observer, rx) = ChannelObserver::new();
        let feeder = spawn_feeder(Arc::clone(&board), rx);

        observer.on_outcome(report(1));
        observer.on_outcome(report(2));
        drop(observer);
        feeder.await.unwrap();

        let board = board.lock().await;
        assert_eq!(board.recent().len(), 2);
        assert_eq!(board.last().unwrap().sequence, 2);
    }
}
