//! Daily featured-bean rotation.
//!
//! A single background task sleeps until the next local midnight, runs one
//! selection pass, and repeats. The wait is recomputed from the clock on every
//! iteration, so clock adjustments and long passes never accumulate drift.
//! Cancelling the [`SchedulerHandle`] interrupts the wait immediately; a pass
//! that has already started is allowed to finish its transaction.

use std::future::Future;

use beanstore_core::SelectionOutcome;
use beanstore_db::DbError;
use chrono::NaiveDateTime;
use rand::{rngs::StdRng, SeedableRng};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One selection pass. Implemented over Postgres for the server and by fakes
/// in tests.
pub trait SelectionRunner: Send {
    fn run_cycle(&mut self) -> impl Future<Output = Result<SelectionOutcome, DbError>> + Send;
}

pub struct PgSelectionRunner {
    pool: PgPool,
    rng: StdRng,
}

impl PgSelectionRunner {
    /// A fixed `seed` makes the sequence of picks reproducible.
    #[must_use]
    pub fn new(pool: PgPool, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self { pool, rng }
    }
}

impl SelectionRunner for PgSelectionRunner {
    async fn run_cycle(&mut self) -> Result<SelectionOutcome, DbError> {
        beanstore_db::run_selection_cycle(&self.pool, &mut self.rng).await
    }
}

/// Handle to the running scheduler task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "scheduler: task did not exit cleanly");
        }
    }
}

/// Spawn the daily rotation on the current runtime, driven by local time.
pub fn spawn_featured_scheduler(pool: PgPool, seed: Option<u64>) -> SchedulerHandle {
    let cancel = CancellationToken::new();
    let runner = PgSelectionRunner::new(pool, seed);
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let cycles =
            run_featured_loop(runner, || chrono::Local::now().naive_local(), token).await;
        tracing::info!(cycles, "scheduler: featured rotation stopped");
    });

    SchedulerHandle { cancel, task }
}

/// Wait for midnight, run a pass, repeat until `cancel` fires.
///
/// Starts waiting, never selecting. A failed pass is logged and the loop
/// carries on to the next midnight. Returns the number of passes attempted.
pub async fn run_featured_loop<R, C>(mut runner: R, clock: C, cancel: CancellationToken) -> u64
where
    R: SelectionRunner,
    C: Fn() -> NaiveDateTime + Send,
{
    let mut cycles: u64 = 0;

    loop {
        let now = clock();
        let delay = beanstore_core::compute_delay(now);
        tracing::info!(
            delay_secs = delay.as_secs(),
            target = ?beanstore_core::next_midnight(now),
            "scheduler: waiting for next featured selection"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        cycles += 1;
        match runner.run_cycle().await {
            Ok(outcome) if outcome.changed => tracing::info!(
                previous = ?outcome.previous_featured_id,
                featured = ?outcome.featured_id,
                "scheduler: featured bean rotated"
            ),
            Ok(_) => tracing::info!("scheduler: no eligible beans; featured bean unchanged"),
            Err(e) => tracing::error!(error = %e, "scheduler: featured selection failed"),
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use std::time::Duration;

    use chrono::{NaiveDate, Utc};

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("valid timestamp")
    }

    /// Fails on the listed call numbers, succeeds otherwise, and cancels the
    /// loop once `stop_after` calls have been made.
    struct ScriptedRunner {
        calls: Arc<AtomicUsize>,
        fail_on: Vec<usize>,
        stop_after: usize,
        cancel: CancellationToken,
    }

    impl SelectionRunner for ScriptedRunner {
        async fn run_cycle(&mut self) -> Result<SelectionOutcome, DbError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.stop_after {
                self.cancel.cancel();
            }
            if self.fail_on.contains(&call) {
                return Err(DbError::NotFound);
            }
            Ok(SelectionOutcome {
                previous_featured_id: None,
                featured_id: Some(i64::try_from(call).unwrap_or_default()),
                changed: true,
                selected_at: Utc::now(),
            })
        }
    }

    fn scripted(
        fail_on: Vec<usize>,
        stop_after: usize,
        cancel: &CancellationToken,
    ) -> (ScriptedRunner, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = ScriptedRunner {
            calls: Arc::clone(&calls),
            fail_on,
            stop_after,
            cancel: cancel.clone(),
        };
        (runner, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_runs_nothing() {
        let cancel = CancellationToken::new();
        let (runner, calls) = scripted(vec![], usize::MAX, &cancel);
        cancel.cancel();

        let cycles = run_featured_loop(runner, || at(23, 59, 0), cancel).await;

        assert_eq!(cycles, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_wait_returns_without_selecting() {
        let cancel = CancellationToken::new();
        let (runner, calls) = scripted(vec![], usize::MAX, &cancel);
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_featured_loop(runner, || at(0, 0, 0), loop_cancel).await
        });

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        cancel.cancel();

        let cycles = task.await.expect("loop task");
        assert_eq!(cycles, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_midnight_before_first_pass() {
        let cancel = CancellationToken::new();
        let (runner, calls) = scripted(vec![], 1, &cancel);
        let started = tokio::time::Instant::now();

        let cycles = run_featured_loop(runner, || at(23, 0, 0), cancel).await;

        assert_eq!(cycles, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(60 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_does_not_stop_the_loop() {
        let cancel = CancellationToken::new();
        let (runner, calls) = scripted(vec![1, 2], 3, &cancel);

        let cycles = run_featured_loop(runner, || at(23, 59, 0), cancel).await;

        assert_eq!(cycles, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_recomputed_from_the_clock_each_iteration() {
        let cancel = CancellationToken::new();
        let (runner, _calls) = scripted(vec![], 3, &cancel);
        let samples = Arc::new(AtomicUsize::new(0));
        let clock_samples = Arc::clone(&samples);
        // First sample is one minute before midnight, later ones thirty
        // seconds before.
        let clock = move || {
            if clock_samples.fetch_add(1, Ordering::SeqCst) == 0 {
                at(23, 59, 0)
            } else {
                at(23, 59, 30)
            }
        };
        let started = tokio::time::Instant::now();

        let cycles = run_featured_loop(runner, clock, cancel).await;

        // Three passes, plus the sample taken before the loop saw the cancel.
        assert_eq!(cycles, 3);
        assert_eq!(samples.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(60 + 30 + 30));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_a_spawned_loop() {
        let cancel = CancellationToken::new();
        let (runner, calls) = scripted(vec![], usize::MAX, &cancel);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            run_featured_loop(runner, || at(12, 0, 0), token).await;
        });
        let handle = SchedulerHandle { cancel, task };

        handle.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
