//! [`IntervalScheduler`]: fires a [`Cycle`] on a fixed interval, never overlapping.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cycle::{Cycle, CycleReport};
use super::state::SchedulerState;

/// Errors that stop the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler interval must be greater than zero")]
    InvalidInterval,

    #[error("detection cycle {cycle} panicked: {message}")]
    CyclePanicked { cycle: u64, message: String },
}

/// Counters accumulated over one [`IntervalScheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub cycles_aborted: u64,
}

struct InFlight {
    cycle: u64,
    handle: JoinHandle<CycleReport>,
}

/// Runs detection cycles every `interval` until cancelled.
pub struct IntervalScheduler {
    interval: Duration,
    shutdown_grace: Duration,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl IntervalScheduler {
    pub fn new(interval: Duration, shutdown_grace: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            interval,
            shutdown_grace,
            state: Arc::new(state),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state snapshot.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Fire `cycle` immediately and then once per interval until `cancel`
    /// is triggered.
    ///
    /// A tick that finds the previous cycle still running is skipped. On
    /// cancellation the in-flight cycle gets `shutdown_grace` to finish; after
    /// that it is aborted. A panicking cycle stops the scheduler with
    /// [`SchedulerError::CyclePanicked`].
    pub async fn run(
        &self,
        cycle: Arc<dyn Cycle>,
        cancel: CancellationToken,
    ) -> Result<SchedulerSummary, SchedulerError> {
        if self.interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = SchedulerSummary::default();
        let mut in_flight: Option<InFlight> = None;

        info!(
            interval_secs = self.interval.as_secs(),
            grace_secs = self.shutdown_grace.as_secs(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                (cycle_no, joined) = join_in_flight(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    self.reap(cycle_no, joined, &mut summary)?;
                }

                _ = ticker.tick() => {
                    if let Some(running) = &in_flight {
                        summary.cycles_skipped += 1;
                        warn!(
                            running_cycle = running.cycle,
                            skipped_total = summary.cycles_skipped,
                            "previous cycle still running, skipping tick"
                        );
                        continue;
                    }
                    summary.cycles_started += 1;
                    in_flight = Some(self.spawn_cycle(
                        summary.cycles_started,
                        cycle.clone(),
                        cancel.child_token(),
                    ));
                }
            }
        }

        info!("scheduler stopping, no new cycles will start");

        if let Some(InFlight { cycle: cycle_no, mut handle }) = in_flight.take() {
            info!(
                cycle = cycle_no,
                grace_secs = self.shutdown_grace.as_secs(),
                "waiting for in-flight cycle"
            );
            match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
                Ok(joined) => self.reap(cycle_no, joined, &mut summary)?,
                Err(_) => {
                    warn!(cycle = cycle_no, "grace period expired, aborting cycle");
                    handle.abort();
                    summary.cycles_aborted += 1;
                }
            }
        }

        self.state.send_replace(SchedulerState::Idle);
        info!(
            started = summary.cycles_started,
            completed = summary.cycles_completed,
            skipped = summary.cycles_skipped,
            aborted = summary.cycles_aborted,
            "scheduler stopped"
        );
        Ok(summary)
    }

    /// Run a single cycle to completion, outside the interval loop.
    pub async fn run_once(
        &self,
        cycle: Arc<dyn Cycle>,
        cancel: CancellationToken,
    ) -> Result<CycleReport, SchedulerError> {
        let InFlight { cycle: cycle_no, handle } = self.spawn_cycle(1, cycle, cancel);
        let report = handle.await.map_err(|e| panic_error(cycle_no, e))?;
        report.log();
        Ok(report)
    }

    fn spawn_cycle(
        &self,
        cycle_no: u64,
        cycle: Arc<dyn Cycle>,
        cancel: CancellationToken,
    ) -> InFlight {
        self.state.send_replace(SchedulerState::Running {
            cycle: cycle_no,
            started_at: Utc::now(),
        });
        debug!(cycle = cycle_no, "detection cycle starting");

        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let report = cycle.run(cycle_no, cancel).await;
            state.send_replace(SchedulerState::Idle);
            report
        });

        InFlight {
            cycle: cycle_no,
            handle,
        }
    }

    fn reap(
        &self,
        cycle_no: u64,
        joined: Result<CycleReport, JoinError>,
        summary: &mut SchedulerSummary,
    ) -> Result<(), SchedulerError> {
        match joined {
            Ok(report) => {
                summary.cycles_completed += 1;
                report.log();
                Ok(())
            }
            Err(e) if e.is_panic() => {
                self.state.send_replace(SchedulerState::Idle);
                let err = panic_error(cycle_no, e);
                error!(error = %err, "detection cycle panicked");
                Err(err)
            }
            Err(e) => {
                warn!(cycle = cycle_no, error = %e, "detection cycle task cancelled");
                Ok(())
            }
        }
    }
}

async fn join_in_flight(slot: &mut Option<InFlight>) -> (u64, Result<CycleReport, JoinError>) {
    match slot {
        Some(running) => (running.cycle, (&mut running.handle).await),
        None => std::future::pending().await,
    }
}

fn panic_error(cycle: u64, err: JoinError) -> SchedulerError {
    let message = if err.is_panic() {
        let payload = err.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string())
    } else {
        err.to_string()
    };
    SchedulerError::CyclePanicked { cycle, message }
}
