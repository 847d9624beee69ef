use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, info_span, Instrument};

use crate::error::{ProbeError, Result};

/// Something the scheduler can fire once per tick.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, cycle: u64);
}

/// Commands for controlling the Scheduler
#[derive(Debug)]
pub enum SchedulerCommand {
    Shutdown,
}

/// Fires a cycle immediately and then once per interval.
///
/// Each cycle is spawned and never joined: the tick loop does not wait for a
/// previous cycle, so slow cycles overlap instead of delaying the cadence, and a
/// cycle that errors or panics only ends its own task.
pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    interval: Duration,
    cmd_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(
        runner: Arc<dyn CycleRunner>,
        interval: Duration,
    ) -> Result<(Self, mpsc::Sender<SchedulerCommand>)> {
        if interval.is_zero() {
            return Err(ProbeError::ConfigError("Scheduler interval must be non-zero".into()));
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<SchedulerCommand>(1);
        Ok((
            Self {
                runner,
                interval,
                cmd_rx,
            },
            cmd_tx,
        ))
    }

    /// Runs until a `Shutdown` command arrives and returns the number of
    /// cycles launched. Dropping every command sender leaves it running forever.
    /// In-flight cycles are not awaited on shutdown.
    pub async fn start(self) -> u64 {
        let Scheduler {
            runner,
            interval: period,
            mut cmd_rx,
        } = self;

        info!(interval_ms = period.as_millis() as u64, "Scheduler started");

        // The first tick completes immediately. Missed ticks fire back to back so
        // the schedule stays anchored to the start time.
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut launched: u64 = 0;

        loop {
            tokio::select! {
                Some(command) = cmd_rx.recv() => {
                    match command {
                        SchedulerCommand::Shutdown => {
                            info!(launched, "Shutdown command received. Stopping scheduler...");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    launched += 1;
                    launch(Arc::clone(&runner), launched);
                }
            }
        }

        launched
    }
}

fn launch(runner: Arc<dyn CycleRunner>, cycle: u64) {
    tokio::spawn(
        async move {
            runner.run_cycle(cycle).await;
        }
        .instrument(info_span!("cycle", cycle)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counting(AtomicU64);

    #[async_trait]
    impl CycleRunner for Counting {
        async fn run_cycle(&self, _cycle: u64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let runner = Arc::new(Counting(AtomicU64::new(0)));
        assert!(Scheduler::new(runner, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_is_immediate() {
        let runner = Arc::new(Counting(AtomicU64::new(0)));
        let (scheduler, cmd_tx) = Scheduler::new(runner.clone(), Duration::from_secs(60)).unwrap();
        let handle = tokio::spawn(scheduler.start());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runner.0.load(Ordering::SeqCst), 1);

        cmd_tx.send(SchedulerCommand::Shutdown).await.unwrap();
        assert_eq!(handle.await.unwrap(), 1);
    }
}
