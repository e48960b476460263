use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::trace;

use lt_core::{Error, Source};

/// Lifecycle of one install.
///
/// States only move forward: initializing, downloading, extracting,
/// installing, then exactly one of completed or failed. Download and
/// extraction progress never decreases.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallState {
    Initializing,
    Downloading { loaded: u64, total: Option<u64> },
    Extracting { fraction: f64 },
    Installing { message: Option<String> },
    Completed,
    Failed(Error),
}

impl InstallState {
    pub fn name(&self) -> &'static str {
        match self {
            InstallState::Initializing => "initializing",
            InstallState::Downloading { .. } => "downloading",
            InstallState::Extracting { .. } => "extracting",
            InstallState::Installing { .. } => "installing",
            InstallState::Completed => "completed",
            InstallState::Failed(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Completed | InstallState::Failed(_))
    }

    /// Completion of the current phase in `0.0..=1.0`, when known.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            InstallState::Downloading {
                loaded,
                total: Some(total),
            } if *total > 0 => Some((*loaded as f64 / *total as f64).min(1.0)),
            InstallState::Extracting { fraction } => Some(*fraction),
            InstallState::Completed => Some(1.0),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            InstallState::Installing { message } => message.clone(),
            InstallState::Failed(e) => Some(e.to_string()),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            InstallState::Initializing => 0,
            InstallState::Downloading { .. } => 1,
            InstallState::Extracting { .. } => 2,
            InstallState::Installing { .. } => 3,
            InstallState::Completed | InstallState::Failed(_) => 4,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    fn accepts(&self, next: &InstallState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() {
            return true;
        }

        match (self, next) {
            (
                InstallState::Downloading { loaded, .. },
                InstallState::Downloading { loaded: next_loaded, .. },
            ) => next_loaded >= loaded,
            (
                InstallState::Extracting { fraction },
                InstallState::Extracting { fraction: next_fraction },
            ) => next_fraction >= fraction,
            (InstallState::Installing { .. }, InstallState::Installing { .. }) => true,
            _ => next.rank() > self.rank(),
        }
    }
}

/// One published state change.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallProgress {
    pub app_id: String,
    pub source: Source,
    pub state: InstallState,
}

/// Per-install state machine publishing every accepted transition.
///
/// Transitions that would move backwards are dropped.
pub struct InstallSession {
    app_id: String,
    source: Source,
    state: Mutex<InstallState>,
    events: mpsc::UnboundedSender<InstallProgress>,
}

impl InstallSession {
    pub(crate) fn new(
        app_id: &str,
        source: Source,
        events: mpsc::UnboundedSender<InstallProgress>,
    ) -> Self {
        let session = Self {
            app_id: app_id.to_string(),
            source,
            state: Mutex::new(InstallState::Initializing),
            events,
        };
        session.publish(InstallState::Initializing);
        session
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn state(&self) -> InstallState {
        self.lock().clone()
    }

    pub fn downloading(&self, loaded: u64, total: Option<u64>) {
        self.transition(InstallState::Downloading { loaded, total });
    }

    pub fn extracting(&self, fraction: f64) {
        self.transition(InstallState::Extracting {
            fraction: fraction.clamp(0.0, 1.0),
        });
    }

    pub fn installing(&self, message: Option<&str>) {
        self.transition(InstallState::Installing {
            message: message.map(str::to_string),
        });
    }

    pub(crate) fn finish(&self, result: Result<(), Error>) -> InstallState {
        let terminal = match result {
            Ok(()) => InstallState::Completed,
            Err(e) => InstallState::Failed(e),
        };
        self.transition(terminal);
        self.state()
    }

    fn transition(&self, next: InstallState) -> bool {
        let mut state = self.lock();
        if !state.accepts(&next) {
            trace!(app = %self.app_id, from = state.name(), to = next.name(), "ignoring transition");
            return false;
        }
        *state = next.clone();
        // Published under the lock so observers see transitions in order.
        self.publish(next);
        true
    }

    fn publish(&self, state: InstallState) {
        // The caller may have dropped its handle; the install carries on.
        let _ = self.events.send(InstallProgress {
            app_id: self.app_id.clone(),
            source: self.source,
            state,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InstallState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
