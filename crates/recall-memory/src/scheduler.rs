//! Background autosave worker

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Something the scheduler can ask to persist itself.
#[async_trait]
pub trait FlushTarget: Send + Sync {
    async fn flush(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    /// Stop requested, worker not yet joined.
    Stopping,
    Stopped,
}

/// Flushes a target every `interval` on a background task.
///
/// The worker wakes every `tick` to check for cancellation, so shutdown
/// latency is bounded by the tick rather than the interval. It never flushes
/// once a stop has been requested; the final flush belongs to the owner.
pub struct AutoSaveScheduler {
    stop_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: RwLock<SchedulerState>,
}

impl AutoSaveScheduler {
    pub fn start(
        runtime: &Handle,
        target: Arc<dyn FlushTarget>,
        interval: Duration,
        tick: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let state = RwLock::new(SchedulerState::Running);
        let tick = tick.max(Duration::from_millis(1));

        let worker = runtime.spawn(run(target, interval, tick, stop_rx));
        debug!(?interval, ?tick, "Autosave scheduler started");

        Self {
            stop_tx,
            worker: Mutex::new(Some(worker)),
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    /// Signals the worker and waits for it to exit.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write();
            if *state == SchedulerState::Stopped {
                return;
            }
            *state = SchedulerState::Stopping;
        }
        let _ = self.stop_tx.send(true);

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Autosave worker ended abnormally");
            }
        }

        *self.state.write() = SchedulerState::Stopped;
        debug!("Autosave scheduler stopped");
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

async fn run(
    target: Arc<dyn FlushTarget>,
    interval: Duration,
    tick: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    let mut elapsed = Duration::ZERO;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if *stop_rx.borrow() {
            break;
        }

        elapsed += tick;
        if elapsed >= interval {
            target.flush().await;
            elapsed = Duration::ZERO;
        }
    }
}
