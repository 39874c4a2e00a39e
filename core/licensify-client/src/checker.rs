//! Periodic license revalidation on a background task.

use crate::error::LicenseResult;
use crate::validator::LicenseValidator;
use chrono::{DateTime, Utc};
use licensify_types::ValidationResult;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Called with the outcome of every background validation.
pub type OutcomeCallback = Arc<dyn Fn(&LicenseResult<ValidationResult>) + Send + Sync>;

/// Snapshot of the checker's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerStatus {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<LicenseResult<ValidationResult>>,
    /// Number of completed validations since creation.
    pub runs: u64,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs [`LicenseValidator::validate`] every `interval` until stopped.
///
/// Failures never stop the loop; they are recorded in [`CheckerStatus`] and
/// handed to the callback like any other outcome.
pub struct BackgroundChecker {
    validator: Arc<LicenseValidator>,
    status: Arc<Mutex<CheckerStatus>>,
    callback: Option<OutcomeCallback>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl BackgroundChecker {
    pub fn new(validator: Arc<LicenseValidator>) -> Self {
        Self {
            validator,
            status: Arc::new(Mutex::new(CheckerStatus::default())),
            callback: None,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Registers a callback invoked after every validation.
    #[must_use]
    pub fn on_outcome<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LicenseResult<ValidationResult>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn validator(&self) -> &Arc<LicenseValidator> {
        &self.validator
    }

    /// Spawns the validation loop. The first validation runs immediately.
    ///
    /// Does nothing if the loop is already running.
    pub async fn start(&self, interval: Duration) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!("background license checker already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.lock_status().running = true;
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.validator),
            Arc::clone(&self.status),
            self.callback.clone(),
            interval,
            shutdown_rx,
        ));
        *worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });
        info!(interval_secs = interval.as_secs(), "background license checker started");
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// An in-flight validation is allowed to finish. Once this returns no
    /// further validation or callback will run.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "background license checker task failed");
        }
        self.lock_status().running = false;
        info!("background license checker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_status().running
    }

    pub fn status(&self) -> CheckerStatus {
        self.lock_status().clone()
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, CheckerStatus> {
        self.status.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for BackgroundChecker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.handle.abort();
        }
    }
}

impl std::fmt::Debug for BackgroundChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundChecker")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Clears [`CheckerStatus::running`] when the loop exits, including by panic
/// or abort.
struct RunningGuard(Arc<Mutex<CheckerStatus>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).running = false;
    }
}

async fn run_loop(
    validator: Arc<LicenseValidator>,
    status: Arc<Mutex<CheckerStatus>>,
    callback: Option<OutcomeCallback>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let _running = RunningGuard(Arc::clone(&status));
    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = validator.validate().await;
        match &outcome {
            Ok(result) => debug!(
                from_cache = result.from_cache,
                days_remaining = ?result.days_remaining,
                "background license check passed"
            ),
            Err(err) => warn!(error = %err, state = ?err.state(), "background license check failed"),
        }

        {
            let mut status = status.lock().unwrap_or_else(|p| p.into_inner());
            status.last_run_at = Some(validator.clock().now());
            status.last_outcome = Some(outcome.clone());
            status.runs += 1;
        }
        if let Some(callback) = &callback {
            callback(&outcome);
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("background license checker loop exited");
}
