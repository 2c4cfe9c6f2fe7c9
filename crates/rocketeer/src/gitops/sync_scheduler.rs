//! Periodic reconciliation scheduler.
//!
//! Re-runs the engine for every registered target on a fixed interval, or right
//! away when a manual trigger arrives on a broadcast channel. Targets are
//! processed one after another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{ConfigurationSpec, ConfigurationStatus};
use crate::gitops::engine::{GitOpsEngine, ReconcileRequest};

/// Base delay for exponential backoff (in seconds).
const RETRY_BASE_DELAY_SECS: u64 = 2;
/// Number of shortened waits before falling back to the regular interval.
const MAX_RETRIES: u32 = 3;

type Targets = Arc<Mutex<Vec<(ReconcileRequest, ConfigurationSpec)>>>;
type Statuses = Arc<Mutex<HashMap<ReconcileRequest, ConfigurationStatus>>>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Wait before the next pass after `failures` consecutive retryable failures.
fn next_wait(interval: Duration, failures: u32) -> Duration {
    if failures == 0 || failures > MAX_RETRIES {
        return interval;
    }
    let delay = Duration::from_secs(RETRY_BASE_DELAY_SECS << (failures - 1)); // 2s, 4s, 8s
    delay.min(interval)
}

/// Periodic scheduler driving a [`GitOpsEngine`].
pub struct SyncScheduler {
    engine: Arc<GitOpsEngine>,
    interval: Duration,
    targets: Targets,
    statuses: Statuses,
    shutdown: Arc<AtomicBool>,
}

impl SyncScheduler {
    /// Creates a scheduler running every `interval`.
    pub fn new(engine: Arc<GitOpsEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            targets: Arc::default(),
            statuses: Arc::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a scheduler using the engine's `syncIntervalSecs`.
    pub fn from_engine(engine: Arc<GitOpsEngine>) -> Self {
        let interval = Duration::from_secs(engine.settings().sync_interval_secs);
        Self::new(engine, interval)
    }

    /// Adds a target, or replaces the spec of an already registered one.
    pub fn register(&self, request: ReconcileRequest, spec: ConfigurationSpec) {
        let mut targets = locked(&self.targets);
        match targets.iter_mut().find(|(r, _)| *r == request) {
            Some(entry) => entry.1 = spec,
            None => targets.push((request, spec)),
        }
    }

    /// Removes a target. Returns false if it was not registered.
    pub fn unregister(&self, request: &ReconcileRequest) -> bool {
        let mut targets = locked(&self.targets);
        let before = targets.len();
        targets.retain(|(r, _)| r != request);
        locked(&self.statuses).remove(request);
        targets.len() != before
    }

    /// Status of the last pass for `request`, if one ran.
    pub fn status(&self, request: &ReconcileRequest) -> Option<ConfigurationStatus> {
        locked(&self.statuses).get(request).cloned()
    }

    /// Start the sync loop in a background thread.
    ///
    /// A first pass runs immediately. `trigger_rx` requests extra passes.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let targets = Arc::clone(&self.targets);
        let statuses = Arc::clone(&self.statuses);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start scheduler runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut failures = 0u32;

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    let snapshot = locked(&targets).clone();
                    let mut retry = false;
                    for (request, spec) in snapshot {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        let status = match engine.reconcile(&request, &spec).await {
                            Ok(report) => {
                                retry |= report.has_retryable_failures();
                                ConfigurationStatus::from_report(&report)
                            }
                            Err(e) => {
                                log::error!("Reconcile of {} failed: {}", request, e);
                                retry |= e.is_retryable();
                                ConfigurationStatus::from_error(&e)
                            }
                        };
                        locked(&statuses).insert(request, status);
                    }

                    failures = if retry { failures + 1 } else { 0 };
                    let wait = next_wait(interval, failures);
                    if wait < interval {
                        log::info!(
                            "Retrying in {}s (attempt {}/{})",
                            wait.as_secs(),
                            failures,
                            MAX_RETRIES
                        );
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual sync triggered");
                        },
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
