// MouseDirectionBinder Output Layer - Key Synthesizer
// At-most-one-key-held press/release on top of a key sink

use super::OutputError;
use crate::key::Key;
use crate::notify::{Notifier, Status};

/// Value of a key event on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    Up = 0,
    Down = 1,
}

/// Destination for synthesized key events.
pub trait KeySink {
    /// Emit one key event immediately followed by a sync marker.
    fn write_key(&mut self, key: Key, value: KeyValue) -> Result<(), OutputError>;
}

/// Owns a key sink and guarantees at most one of its keys is held.
///
/// Dropping the synthesizer releases the held key before the sink is
/// dropped, on every exit path.
pub struct KeySynthesizer<S: KeySink> {
    sink: S,
    held: Option<Key>,
    notifier: Option<Notifier>,
}

impl<S: KeySink> KeySynthesizer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            held: None,
            notifier: None,
        }
    }

    /// Report a `KeyHeld` status on every new press.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Hold `key`, releasing whatever else is held first.
    pub fn press(&mut self, key: Key) -> Result<(), OutputError> {
        if self.held == Some(key) {
            return Ok(());
        }
        self.release()?;

        self.sink.write_key(key, KeyValue::Down)?;
        self.held = Some(key);
        log::debug!("Pressed {}", key);
        if let Some(notifier) = &self.notifier {
            notifier.status(Status::KeyHeld(key));
        }
        Ok(())
    }

    /// Release the held key, if any.
    pub fn release(&mut self) -> Result<(), OutputError> {
        let Some(key) = self.held else {
            return Ok(());
        };
        // Hold is cleared even if the key-up write fails.
        self.held = None;
        self.sink.write_key(key, KeyValue::Up)?;
        log::debug!("Released {}", key);
        Ok(())
    }

    pub fn held(&self) -> Option<Key> {
        self.held
    }
}

impl<S: KeySink> Drop for KeySynthesizer<S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release key on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemorySink, OutputEvent};

    #[test]
    fn test_press_then_switch() {
        let sink = MemorySink::new();
        let mut synth = KeySynthesizer::new(sink.clone());
        synth.press(Key::A).unwrap();
        synth.press(Key::D).unwrap();
        assert_eq!(synth.held(), Some(Key::D));
        assert_eq!(
            sink.events(),
            vec![
                OutputEvent::Key(Key::A, KeyValue::Down),
                OutputEvent::Sync,
                OutputEvent::Key(Key::A, KeyValue::Up),
                OutputEvent::Sync,
                OutputEvent::Key(Key::D, KeyValue::Down),
                OutputEvent::Sync,
            ]
        );
    }

    #[test]
    fn test_press_same_key_is_noop() {
        let sink = MemorySink::new();
        let mut synth = KeySynthesizer::new(sink.clone());
        synth.press(Key::A).unwrap();
        synth.press(Key::A).unwrap();
        assert_eq!(sink.key_events().len(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let sink = MemorySink::new();
        let mut synth = KeySynthesizer::new(sink.clone());
        synth.press(Key::D).unwrap();
        synth.release().unwrap();
        synth.release().unwrap();
        assert_eq!(
            sink.key_events(),
            vec![(Key::D, KeyValue::Down), (Key::D, KeyValue::Up)]
        );
        assert_eq!(synth.held(), None);
    }

    #[test]
    fn test_drop_releases_held_key() {
        let sink = MemorySink::new();
        {
            let mut synth = KeySynthesizer::new(sink.clone());
            synth.press(Key::A).unwrap();
        }
        assert_eq!(sink.key_events().last(), Some(&(Key::A, KeyValue::Up)));
        assert_eq!(sink.held_keys(), Vec::<Key>::new());
    }

    #[test]
    fn test_press_reports_status() {
        let (notifier, rx) = Notifier::channel();
        let mut synth = KeySynthesizer::new(MemorySink::new()).with_notifier(notifier);
        synth.press(Key::D).unwrap();
        assert_eq!(
            rx.try_recv(),
            Ok(crate::notify::Notification::Status(Status::KeyHeld(Key::D)))
        );
    }

    #[test]
    fn test_failed_release_clears_hold() {
        let sink = MemorySink::new();
        let mut synth = KeySynthesizer::new(sink.clone());
        synth.press(Key::A).unwrap();
        sink.fail_writes(true);
        assert!(synth.release().is_err());
        assert_eq!(synth.held(), None);
        sink.fail_writes(false);
    }
}
