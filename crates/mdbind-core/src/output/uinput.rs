// MouseDirectionBinder uinput Output Layer
// Virtual device creation and key event emission

use evdev::uinput::VirtualDeviceBuilder;
use evdev::{AttributeSet, EventType, InputEvent};

use super::synth::{KeySink, KeyValue};
use super::OutputError;
use crate::config::VIRTUAL_DEVICE_NAME;
use crate::key::Key;

/// Virtual uinput keyboard registering exactly the translation targets.
///
/// The kernel device is destroyed when this value is dropped.
pub struct VirtualKeyboard {
    device: evdev::uinput::VirtualDevice,
    keys: [Key; 2],
}

impl VirtualKeyboard {
    /// Create the virtual device with `keys` as its only key codes.
    pub fn new(keys: [Key; 2]) -> Result<Self, OutputError> {
        let mut key_set = AttributeSet::new();
        for key in keys {
            key_set.insert(evdev::Key::new(key.code()));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(|e: std::io::Error| OutputError::DeviceCreation(e.to_string()))?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&key_set)
            .map_err(|e: std::io::Error| OutputError::DeviceCreation(e.to_string()))?
            .build()
            .map_err(|e: std::io::Error| OutputError::DeviceCreation(e.to_string()))?;

        log::info!("Created virtual device '{}' with keys {} and {}", VIRTUAL_DEVICE_NAME, keys[0], keys[1]);
        Ok(Self { device, keys })
    }
}

impl KeySink for VirtualKeyboard {
    fn write_key(&mut self, key: Key, value: KeyValue) -> Result<(), OutputError> {
        if !self.keys.contains(&key) {
            return Err(OutputError::UnregisteredKey(key));
        }

        let key_event = InputEvent::new(EventType::KEY, key.code(), value as i32);
        // SYN event is required for the kernel to process the key event
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);

        self.device
            .emit(&[key_event, syn_event])
            .map_err(|e: std::io::Error| OutputError::WriteError(e.to_string()))
    }
}

impl Drop for VirtualKeyboard {
    fn drop(&mut self) {
        log::info!("Destroying virtual device '{}'", VIRTUAL_DEVICE_NAME);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_keyboard_creation() {
        // Requires /dev/uinput access; containers usually lack it.
        match VirtualKeyboard::new([Key::A, Key::D]) {
            Ok(mut device) => {
                assert!(matches!(
                    device.write_key(Key::SPACE, KeyValue::Down),
                    Err(OutputError::UnregisteredKey(Key::SPACE))
                ));
            }
            Err(OutputError::DeviceCreation(_)) => {
                println!("Skipping test: uinput not available");
            }
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
}
