use crate::error::AppError;
use crate::traffic::types::TrafficProfile;
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to one CPU-burning worker thread.
///
/// The worker runs on its own OS thread so the load it produces competes with request
/// handling for real cores. Stopping consumes the handle; callers keep it in an `Option`
/// slot so a second stop finds nothing to do.
pub struct LoadGenerator {
    label: &'static str,
    cancellation_token: CancellationToken,
    exited: oneshot::Receiver<()>,
    ticks: Arc<AtomicU64>,
}

impl LoadGenerator {
    pub fn spawn(
        label: &'static str,
        profile: TrafficProfile,
        live_workers: Arc<AtomicUsize>,
    ) -> Result<Self, AppError> {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let ticks = Arc::new(AtomicU64::new(0));
        let task_ticks = Arc::clone(&ticks);
        let (exit_tx, exited) = oneshot::channel();
        let live_guard = LiveWorkerGuard::register(live_workers);

        std::thread::Builder::new()
            .name(format!("load-{label}"))
            .spawn(move || {
                run_load_loop(profile, &task_token, &task_ticks);
                drop(live_guard);
                let _ = exit_tx.send(());
            })?;

        tracing::debug!(
            generator = label,
            busy_iterations = profile.busy_iterations,
            busy_range = profile.busy_range,
            idle_ms = profile.idle_interval.as_millis() as u64,
            "load generator started"
        );

        Ok(Self {
            label,
            cancellation_token,
            exited,
            ticks,
        })
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Signals the worker and waits up to `join_timeout` for it to acknowledge.
    ///
    /// Returns the number of completed ticks. On timeout the worker is left to exit on its own
    /// at its next tick boundary.
    pub async fn stop(self, join_timeout: Duration) -> Result<u64, AppError> {
        let Self {
            label,
            cancellation_token,
            exited,
            ticks,
        } = self;

        cancellation_token.cancel();
        // A dropped sender means the worker is gone as well, so both outcomes count as joined.
        match tokio::time::timeout(join_timeout, exited).await {
            Ok(_) => {
                let completed = ticks.load(Ordering::Relaxed);
                tracing::debug!(generator = label, ticks = completed, "load generator stopped");
                Ok(completed)
            }
            Err(_) => Err(AppError::GeneratorJoinTimeout {
                label,
                timeout_ms: join_timeout.as_millis() as u64,
            }),
        }
    }
}

struct LiveWorkerGuard(Arc<AtomicUsize>);

impl LiveWorkerGuard {
    fn register(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveWorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_load_loop(profile: TrafficProfile, cancel_token: &CancellationToken, ticks: &AtomicU64) {
    while !cancel_token.is_cancelled() {
        black_box(burn_cpu(profile));
        ticks.fetch_add(1, Ordering::Relaxed);
        if idle_until_cancelled(profile.idle_interval, cancel_token) {
            break;
        }
    }
}

pub fn burn_cpu(profile: TrafficProfile) -> u64 {
    let mut checksum = 0_u64;
    for _ in 0..profile.busy_iterations {
        let sum: u64 = (0..black_box(profile.busy_range)).map(black_box).sum();
        checksum = checksum.wrapping_add(black_box(sum));
    }
    checksum
}

/// Returns `true` if cancellation arrived before the interval elapsed.
fn idle_until_cancelled(interval: Duration, cancel_token: &CancellationToken) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if cancel_token.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PROFILE: TrafficProfile = TrafficProfile {
        busy_iterations: 2,
        busy_range: 100,
        idle_interval: Duration::from_millis(5),
    };

    async fn wait_for_ticks(generator: &LoadGenerator, minimum: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while generator.ticks() < minimum {
            assert!(Instant::now() < deadline, "generator never ticked");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn burn_cpu_sums_each_range() {
        let profile = TrafficProfile {
            busy_iterations: 3,
            busy_range: 10,
            idle_interval: Duration::ZERO,
        };
        assert_eq!(burn_cpu(profile), 3 * 45);
    }

    #[tokio::test]
    async fn stop_halts_worker_and_releases_live_slot() {
        let live = Arc::new(AtomicUsize::new(0));
        let generator = LoadGenerator::spawn("test", TEST_PROFILE, Arc::clone(&live))
            .expect("worker thread should spawn");
        assert_eq!(live.load(Ordering::SeqCst), 1);

        wait_for_ticks(&generator, 2).await;
        let ticks = generator
            .stop(Duration::from_secs(2))
            .await
            .expect("worker should acknowledge stop");

        assert!(ticks >= 2);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_interrupts_long_idle_interval() {
        let live = Arc::new(AtomicUsize::new(0));
        let sleepy = TrafficProfile {
            idle_interval: Duration::from_secs(30),
            ..TEST_PROFILE
        };
        let generator =
            LoadGenerator::spawn("sleepy", sleepy, Arc::clone(&live)).expect("spawn");
        wait_for_ticks(&generator, 1).await;

        let started = Instant::now();
        generator
            .stop(Duration::from_secs(2))
            .await
            .expect("idle worker should stop promptly");

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_reports_join_timeout_for_slow_tick() {
        let live = Arc::new(AtomicUsize::new(0));
        let heavy = TrafficProfile {
            busy_iterations: 10_000,
            busy_range: 10_000,
            idle_interval: Duration::from_millis(1),
        };
        let generator = LoadGenerator::spawn("heavy", heavy, Arc::clone(&live)).expect("spawn");
        // let the worker enter its first tick
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = generator.stop(Duration::from_millis(1)).await;
        assert!(matches!(
            result,
            Err(AppError::GeneratorJoinTimeout { label: "heavy", .. })
        ));
    }
}
