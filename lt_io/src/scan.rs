//! Concurrent update checks across all installed apps.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lt_core::{AppSummary, CheckOutcome, Error, InstalledApp};

use crate::checker::{CheckerSet, UpdateChecker};
use crate::repository::UpdateRepository;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Maximum number of checks in flight
    pub concurrency: usize,
    /// Budget for the whole scan
    pub deadline: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

pub struct UpdateCoordinator {
    checkers: CheckerSet,
    repository: Arc<UpdateRepository>,
    config: ScanConfig,
}

impl UpdateCoordinator {
    pub fn new(checkers: CheckerSet, repository: Arc<UpdateRepository>, config: ScanConfig) -> Self {
        Self {
            checkers,
            repository,
            config,
        }
    }

    pub fn repository(&self) -> &Arc<UpdateRepository> {
        &self.repository
    }

    /// Check every app, returning one outcome per input app sorted by name.
    ///
    /// Checks run with at most `concurrency` in flight. When the deadline
    /// passes, outstanding checks are abandoned and their apps reported as
    /// having no update information. Every returned outcome is recorded in
    /// the repository first; abandoned checks never write.
    pub async fn scan(&self, apps: Vec<InstalledApp>) -> Vec<CheckOutcome> {
        if apps.is_empty() {
            return Vec::new();
        }

        let deadline = Instant::now() + self.config.deadline;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, usize> = HashMap::with_capacity(apps.len());

        for (index, app) in apps.iter().cloned().enumerate() {
            let checker = self.checkers.select(&app);
            let semaphore = Arc::clone(&semaphore);

            let handle = tasks.spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => run_check(checker.as_ref(), app).await,
                    Err(_) => CheckOutcome::no_information(app),
                }
            });
            pending.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<CheckOutcome>> = vec![None; apps.len()];
        loop {
            let joined = tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await;
            let (index, outcome) = match joined {
                Ok(Some(Ok((id, outcome)))) => match pending.remove(&id) {
                    Some(index) => (index, outcome),
                    None => continue,
                },
                Ok(Some(Err(e))) => match pending.remove(&e.id()) {
                    Some(index) => {
                        warn!(app = %apps[index].id, error = %e, "update check task failed");
                        (index, failed_task(apps[index].clone(), &e))
                    }
                    None => continue,
                },
                Ok(None) => break,
                Err(_) => {
                    debug!(outstanding = tasks.len(), "scan deadline reached");
                    tasks.abort_all();
                    break;
                }
            };
            self.repository.put(outcome.clone());
            slots[index] = Some(outcome);
        }

        let mut outcomes: Vec<CheckOutcome> = slots
            .into_iter()
            .zip(apps)
            .map(|(slot, app)| {
                slot.unwrap_or_else(|| {
                    let outcome = CheckOutcome::no_information(app);
                    self.repository.put(outcome.clone());
                    outcome
                })
            })
            .collect();

        outcomes.sort_by_key(|o| o.app.name.to_lowercase());

        let updates = outcomes.iter().filter(|o| o.update().is_some()).count();
        info!(apps = outcomes.len(), updates, "scan finished");
        outcomes
    }

    /// [`scan`](Self::scan), rendered as serializable summaries.
    pub async fn check_all(&self, apps: Vec<InstalledApp>) -> Vec<AppSummary> {
        self.scan(apps)
            .await
            .iter()
            .map(AppSummary::from_outcome)
            .collect()
    }
}

async fn run_check(checker: &dyn UpdateChecker, app: InstalledApp) -> CheckOutcome {
    let result = AssertUnwindSafe(checker.check(&app)).catch_unwind().await;

    match result {
        Ok(Ok(record)) => CheckOutcome::checked(record),
        Ok(Err(e)) => {
            debug!(app = %app.id, source = %checker.source(), error = %e, "update check failed");
            CheckOutcome::failed(app, e)
        }
        Err(_) => {
            warn!(app = %app.id, "update check panicked");
            let id = app.id.clone();
            CheckOutcome::failed(
                app,
                Error::CheckFailed {
                    id,
                    message: "checker panicked".to_string(),
                },
            )
        }
    }
}

/// Outcome for an app whose check task died outside the checker itself.
fn failed_task(app: InstalledApp, error: &JoinError) -> CheckOutcome {
    let message = if error.is_panic() {
        "check task panicked".to_string()
    } else {
        "check task was cancelled".to_string()
    };
    let id = app.id.clone();
    CheckOutcome::failed(app, Error::CheckFailed { id, message })
}
