// MouseDirectionBinder Notifications
// Worker-to-collaborator status, error and access-request messages

use std::fmt;
use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};

use crate::key::Key;

/// Category of a reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Event source or output device could not be set up. Always fatal.
    Initialization,
    /// A device could not be opened, or access to it was refused.
    Permission,
    /// Poll, read or write failure while running.
    Runtime,
    /// A requested setting could not be applied.
    Configuration,
}

/// Human-readable error delivered to the collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    /// The worker stopped because of this error.
    pub fatal: bool,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fatal: kind == ErrorKind::Initialization,
        }
    }

    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fatal: true,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Engine status shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Initializing,
    Ready,
    Active,
    Paused,
    TriggerUpdated,
    KeyHeld(Key),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Initializing => f.write_str("Initializing input devices..."),
            Status::Ready => f.write_str("Ready. Hold the activation key."),
            Status::Active => f.write_str("Active."),
            Status::Paused => f.write_str("Paused."),
            Status::TriggerUpdated => f.write_str("Activation key updated."),
            Status::KeyHeld(key) => write!(f, "Holding key {}.", key),
        }
    }
}

/// Message from the worker thread
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Status(Status),
    Error(ErrorReport),
    /// Descriptor strings of the active devices; empty when none detected.
    DevicesDetected { pointer: String, keyboard: String },
    /// Answer with `Engine::deliver_access_confirmation`.
    AccessRequested { path: PathBuf },
    /// The worker has released every resource and exited.
    Stopped,
}

/// Sending half held by the worker.
///
/// Sends never block; a collaborator that dropped its receiver just
/// stops hearing from the engine.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            log::trace!("Notification receiver dropped");
        }
    }

    pub fn status(&self, status: Status) {
        log::info!("{}", status);
        self.send(Notification::Status(status));
    }

    pub fn error(&self, report: ErrorReport) {
        if report.is_fatal() {
            log::error!("{}", report);
        } else {
            log::warn!("{}", report);
        }
        self.send(Notification::Error(report));
    }
}
