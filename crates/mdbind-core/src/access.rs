// MouseDirectionBinder Access Negotiation
// Blocking permission handshake between the worker and the collaborator

use std::path::{Path, PathBuf};

use parking_lot::{Condvar, Mutex};

use crate::notify::{Notification, Notifier};

#[derive(Debug)]
struct AccessRequest {
    path: PathBuf,
    decision: Option<bool>,
}

#[derive(Debug, Default)]
struct HandshakeState {
    pending: Option<AccessRequest>,
    shutdown: bool,
}

/// Serializes permission-denied recovery with an external decision-maker.
///
/// At most one request is outstanding. `request_access` blocks the worker
/// until `deliver_decision` or `shutdown` resolves it.
#[derive(Debug)]
pub struct AccessHandshake {
    state: Mutex<HandshakeState>,
    resolved: Condvar,
    notifier: Notifier,
}

impl AccessHandshake {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            state: Mutex::new(HandshakeState::default()),
            resolved: Condvar::new(),
            notifier,
        }
    }

    /// Ask the collaborator for access to `path` and wait for the answer.
    ///
    /// Returns `false` on denial or when the engine is shutting down.
    pub fn request_access(&self, path: &Path) -> bool {
        let mut state = self.state.lock();
        while state.pending.is_some() && !state.shutdown {
            self.resolved.wait(&mut state);
        }
        if state.shutdown {
            return false;
        }

        state.pending = Some(AccessRequest {
            path: path.to_path_buf(),
            decision: None,
        });
        log::info!("Requesting access to {}", path.display());
        self.notifier.send(Notification::AccessRequested {
            path: path.to_path_buf(),
        });

        loop {
            let decision = state.pending.as_ref().and_then(|request| request.decision);
            if let Some(granted) = decision {
                state.pending = None;
                self.resolved.notify_all();
                log::info!(
                    "Access to {} {}",
                    path.display(),
                    if granted { "granted" } else { "denied" }
                );
                return granted;
            }
            if state.shutdown {
                state.pending = None;
                self.resolved.notify_all();
                return false;
            }
            self.resolved.wait(&mut state);
        }
    }

    /// Resolve the outstanding request. No-op when nothing is pending.
    pub fn deliver_decision(&self, granted: bool) {
        let mut state = self.state.lock();
        match state.pending.as_mut() {
            Some(request) if request.decision.is_none() => {
                request.decision = Some(granted);
                self.resolved.notify_all();
            }
            Some(request) => {
                log::debug!(
                    "Ignoring repeated access decision for {}",
                    request.path.display()
                );
            }
            None => log::debug!("Ignoring access decision with no pending request"),
        }
    }

    /// Path of the outstanding request, if any.
    pub fn pending_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .pending
            .as_ref()
            .map(|request| request.path.clone())
    }

    /// Wake every waiter with a denied outcome and refuse future requests.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.resolved.notify_all();
    }
}
