// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Semaphore;
use tracing::{error, info};

pub const DEFAULT_BUILD_WORKERS: usize = 4;

/// Bounded pool running index builds off the request path. A key already
/// in flight in this process is not submitted again.
pub struct BuildPool {
    runtime: Runtime,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl BuildPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("metagenome-build")
            .enable_time()
            .build()
            .map_err(|e| Error::internal(format!("failed to start build pool: {e}")))?;
        Ok(Self {
            runtime,
            permits: Arc::new(Semaphore::new(workers)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Returns `false` when a build for `key` is already queued or running.
    pub fn submit<F>(&self, key: &str, job: F) -> bool
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(key.to_string()) {
                return false;
            }
        }
        let permits = Arc::clone(&self.permits);
        let in_flight = Arc::clone(&self.in_flight);
        let key = key.to_string();
        self.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => tokio::task::spawn_blocking(job)
                    .await
                    .map_err(|e| Error::internal(format!("build task failed: {e}")))
                    .and_then(|r| r),
                Err(e) => Err(Error::internal(format!("build pool closed: {e}"))),
            };
            match outcome {
                Ok(()) => info!(
                    key = %key,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "background build finished"
                ),
                Err(e) => error!(key = %key, error = %e, "background build failed"),
            }
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        });
        true
    }

    #[must_use]
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Blocks until no build is in flight or `timeout` elapses; returns
    /// whether the pool drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight_count() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn duplicate_keys_are_suppressed_while_in_flight() {
        let pool = BuildPool::new(2).expect("pool");
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        assert!(pool.submit("1:2:3", move || {
            r.fetch_add(1, Ordering::SeqCst);
            let _ = release_rx.recv();
            Ok(())
        }));
        assert!(!pool.submit("1:2:3", || Ok(())));
        assert!(pool.is_in_flight("1:2:3"));
        release_tx.send(()).expect("release");
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(pool.submit("1:2:3", || Ok(())));
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn failed_and_panicking_jobs_clear_their_key() {
        let pool = BuildPool::new(1).expect("pool");
        assert!(pool.submit("a", || Err(Error::internal("boom"))));
        assert!(pool.submit("b", || panic!("worker panic")));
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(pool.in_flight_count(), 0);
    }

    #[test]
    fn concurrency_is_bounded_by_worker_count() {
        let pool = BuildPool::new(2).expect("pool");
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for i in 0..6 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.submit(&format!("k{i}"), move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert!(pool.wait_idle(Duration::from_secs(10)));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
