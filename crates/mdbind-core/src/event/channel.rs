// MouseDirectionBinder Channel Event Source
// Events pushed by another thread, for replays and tests

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::source::{EventSource, SourceError, SourceEvent, SourceResult};
use crate::access::AccessHandshake;

/// Event source fed through a channel.
///
/// Dropping every [`Sender`] counts as losing the event source. Devices
/// behind an access request are expected to be fed as `DeviceAdded` once
/// the request is granted.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<SourceEvent>,
    queue: VecDeque<SourceEvent>,
    open: bool,
}

impl ChannelSource {
    pub fn new() -> (Sender<SourceEvent>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            tx,
            Self {
                rx,
                queue: VecDeque::new(),
                open: false,
            },
        )
    }

    fn drain(&mut self) -> SourceResult<()> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.queue.push_back(event),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return if self.queue.is_empty() {
                        Err(SourceError::Disconnected)
                    } else {
                        Ok(())
                    };
                }
            }
        }
    }
}

impl EventSource for ChannelSource {
    fn open(&mut self, _access: &AccessHandshake) -> SourceResult<()> {
        self.open = true;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> SourceResult<()> {
        if !self.open {
            return Err(SourceError::Unavailable("channel source not opened".to_string()));
        }
        if !self.queue.is_empty() {
            return self.drain();
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.queue.push_back(event);
                self.drain()
            }
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Disconnected),
        }
    }

    fn negotiate_access(&mut self, path: &Path, access: &AccessHandshake) {
        if access.request_access(path) {
            log::debug!("Access to {} granted; waiting for the device", path.display());
            return;
        }
        let refused = SourceError::AccessRefused {
            path: path.to_path_buf(),
        };
        self.queue.push_back(SourceEvent::DeviceUnavailable {
            path: path.to_path_buf(),
            reason: refused.to_string(),
        });
    }

    fn next_event(&mut self) -> Option<SourceEvent> {
        self.queue.pop_front()
    }

    fn close(&mut self) {
        self.open = false;
        self.queue.clear();
    }
}
