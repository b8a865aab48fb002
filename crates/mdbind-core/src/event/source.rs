// MouseDirectionBinder Event Source
// Capability interface shared by every input backend

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::access::AccessHandshake;
use crate::input::{DeviceCapabilities, DeviceDescriptor};
use crate::key::Key;

/// Result type for event source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur in an event source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Event source unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied opening {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Access to {} was not granted", .path.display())]
    AccessRefused { path: PathBuf },

    #[error("Lost connection to the event source")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    /// Interrupted system calls are retried silently.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Io(e) if e.kind() == io::ErrorKind::Interrupted)
    }
}

/// Identifier a source assigns to a device for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

/// Horizontal displacement reported by one motion event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionDelta {
    pub accelerated: Option<f64>,
    pub unaccelerated: Option<f64>,
}

impl MotionDelta {
    pub fn raw(dx: f64) -> Self {
        Self {
            accelerated: None,
            unaccelerated: Some(dx),
        }
    }

    pub fn new(accelerated: f64, unaccelerated: f64) -> Self {
        Self {
            accelerated: Some(accelerated),
            unaccelerated: Some(unaccelerated),
        }
    }

    /// The larger-magnitude reading, or 0 when neither is present.
    pub fn horizontal(&self) -> f64 {
        match (self.accelerated, self.unaccelerated) {
            (Some(a), Some(u)) => {
                if a.abs() >= u.abs() {
                    a
                } else {
                    u
                }
            }
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => 0.0,
        }
    }
}

/// A device that appeared
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub path: Option<PathBuf>,
    pub descriptor: DeviceDescriptor,
    pub capabilities: DeviceCapabilities,
}

/// Event produced by a source, in arrival order
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Motion { device: DeviceId, delta: MotionDelta },
    Key { device: DeviceId, key: Key, pressed: bool },
    DeviceAdded(DeviceInfo),
    DeviceRemoved(DeviceId),
    /// Access to a single device was refused; other devices are unaffected.
    DeviceUnavailable { path: PathBuf, reason: String },
    /// A device that appeared at runtime needs access negotiated before it
    /// can be opened. The worker answers with [`EventSource::negotiate_access`].
    AccessNeeded { path: PathBuf },
    /// A device failed to open or read for a reason other than permissions.
    DeviceFailed { path: PathBuf, reason: String },
}

/// Platform input backend.
///
/// Only the worker thread calls these. `open` and `negotiate_access` may
/// block on the access handshake; `poll` never does.
pub trait EventSource {
    /// Acquire the underlying event source and enumerate present devices.
    fn open(&mut self, access: &AccessHandshake) -> SourceResult<()>;

    /// Wait at most `timeout` for input and queue whatever arrived.
    fn poll(&mut self, timeout: Duration) -> SourceResult<()>;

    /// Open a device reported through [`SourceEvent::AccessNeeded`],
    /// asking the collaborator through the handshake. The outcome is queued
    /// as `DeviceAdded` or `DeviceUnavailable`.
    fn negotiate_access(&mut self, path: &Path, access: &AccessHandshake);

    /// Next queued event.
    fn next_event(&mut self) -> Option<SourceEvent>;

    /// Release the event source. Safe to call more than once.
    fn close(&mut self);
}

/// Open `path`, negotiating access once if the open is refused.
///
/// A permission-denied failure asks the collaborator through the handshake;
/// on grant the open is retried exactly once.
pub fn open_with_access<T, F>(path: &Path, access: &AccessHandshake, mut open: F) -> SourceResult<T>
where
    F: FnMut(&Path) -> io::Result<T>,
{
    match open(path) {
        Ok(handle) => Ok(handle),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            if !access.request_access(path) {
                return Err(SourceError::AccessRefused {
                    path: path.to_path_buf(),
                });
            }
            open(path).map_err(|e| {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    SourceError::PermissionDenied {
                        path: path.to_path_buf(),
                    }
                } else {
                    SourceError::Io(e)
                }
            })
        }
        Err(e) => Err(SourceError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Notification, Notifier};
    use std::sync::Arc;
    use std::thread;

    fn denied() -> io::Error {
        io::Error::from(io::ErrorKind::PermissionDenied)
    }

    #[test]
    fn test_horizontal_prefers_larger_magnitude() {
        assert_eq!(MotionDelta::new(-3.5, 1.0).horizontal(), -3.5);
        assert_eq!(MotionDelta::new(0.2, -0.9).horizontal(), -0.9);
        assert_eq!(MotionDelta::raw(2.0).horizontal(), 2.0);
        assert_eq!(MotionDelta::default().horizontal(), 0.0);
    }

    #[test]
    fn test_interrupted_is_transient() {
        assert!(SourceError::Io(io::Error::from(io::ErrorKind::Interrupted)).is_transient());
        assert!(!SourceError::Disconnected.is_transient());
    }

    #[test]
    fn test_open_without_permission_error_skips_handshake() {
        let (notifier, rx) = Notifier::channel();
        let access = AccessHandshake::new(notifier);
        let result = open_with_access(Path::new("/dev/input/event0"), &access, |_| Ok(5));
        assert_eq!(result.unwrap(), 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_grant_retries_open_once() {
        let (notifier, rx) = Notifier::channel();
        let access = Arc::new(AccessHandshake::new(notifier));

        let collaborator = {
            let access = Arc::clone(&access);
            thread::spawn(move || {
                let request = rx.recv().unwrap();
                access.deliver_decision(true);
                (request, rx)
            })
        };

        let mut attempts = 0;
        let result = open_with_access(Path::new("/dev/input/event9"), &access, |_| {
            attempts += 1;
            if attempts == 1 {
                Err(denied())
            } else {
                Ok("handle")
            }
        });

        let (request, rx) = collaborator.join().unwrap();
        assert_eq!(result.unwrap(), "handle");
        assert_eq!(attempts, 2);
        assert_eq!(
            request,
            Notification::AccessRequested {
                path: PathBuf::from("/dev/input/event9")
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_retry_failure_is_not_retried_again() {
        let (notifier, rx) = Notifier::channel();
        let access = Arc::new(AccessHandshake::new(notifier));
        let collaborator = {
            let access = Arc::clone(&access);
            thread::spawn(move || {
                rx.recv().unwrap();
                access.deliver_decision(true);
            })
        };

        let mut attempts = 0;
        let result: SourceResult<()> =
            open_with_access(Path::new("/dev/input/event4"), &access, |_| {
                attempts += 1;
                Err(denied())
            });
        collaborator.join().unwrap();

        assert_eq!(attempts, 2);
        assert!(matches!(result, Err(SourceError::PermissionDenied { .. })));
    }

    #[test]
    fn test_denial_gives_up_without_retry() {
        let (notifier, rx) = Notifier::channel();
        let access = Arc::new(AccessHandshake::new(notifier));
        let collaborator = {
            let access = Arc::clone(&access);
            thread::spawn(move || {
                rx.recv().unwrap();
                access.deliver_decision(false);
            })
        };

        let mut attempts = 0;
        let result: SourceResult<()> =
            open_with_access(Path::new("/dev/input/event2"), &access, |_| {
                attempts += 1;
                Err(denied())
            });
        collaborator.join().unwrap();

        assert_eq!(attempts, 1);
        assert!(matches!(result, Err(SourceError::AccessRefused { .. })));
    }
}
