// MouseDirectionBinder Output Layer - In-Memory Sink
// Records synthesized events instead of writing to a device

use std::sync::Arc;

use parking_lot::Mutex;

use super::synth::{KeySink, KeyValue};
use super::OutputError;
use crate::key::Key;

/// Event recorded by a [`MemorySink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Key(Key, KeyValue),
    Sync,
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<OutputEvent>,
    fail_writes: bool,
}

/// Key sink that keeps every event in memory.
///
/// Clones share one recording, so a test or a dry run can keep a handle
/// while the engine owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    recording: Arc<Mutex<Recording>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.recording.lock().events.clone()
    }

    /// Key events only, without sync markers.
    pub fn key_events(&self) -> Vec<(Key, KeyValue)> {
        self.recording
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Key(key, value) => Some((*key, *value)),
                OutputEvent::Sync => None,
            })
            .collect()
    }

    /// Keys whose last recorded event is a key-down.
    pub fn held_keys(&self) -> Vec<Key> {
        let mut held: Vec<Key> = Vec::new();
        for (key, value) in self.key_events() {
            held.retain(|k| *k != key);
            if value == KeyValue::Down {
                held.push(key);
            }
        }
        held
    }

    /// Make subsequent writes fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.recording.lock().fail_writes = fail;
    }
}

impl KeySink for MemorySink {
    fn write_key(&mut self, key: Key, value: KeyValue) -> Result<(), OutputError> {
        let mut recording = self.recording.lock();
        if recording.fail_writes {
            return Err(OutputError::WriteError(format!(
                "write of {} rejected",
                key
            )));
        }
        log::debug!("[dry-run] {} {:?}", key, value);
        recording.events.push(OutputEvent::Key(key, value));
        recording.events.push(OutputEvent::Sync);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_recording() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_key(Key::A, KeyValue::Down).unwrap();
        assert_eq!(
            sink.events(),
            vec![OutputEvent::Key(Key::A, KeyValue::Down), OutputEvent::Sync]
        );
        assert_eq!(sink.held_keys(), vec![Key::A]);
    }

    #[test]
    fn test_failed_write_records_nothing() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        sink.fail_writes(true);
        assert!(writer.write_key(Key::D, KeyValue::Down).is_err());
        assert!(sink.events().is_empty());
    }
}
