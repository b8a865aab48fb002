// MouseDirectionBinder Output Layer
// Synthesized key output to a virtual device

mod memory;
mod synth;

#[cfg(feature = "pure-rust")]
mod uinput;

pub use memory::{MemorySink, OutputEvent};
pub use synth::{KeySink, KeySynthesizer, KeyValue};

#[cfg(feature = "pure-rust")]
pub use uinput::VirtualKeyboard;

use crate::key::Key;

/// Error types for output operations
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to create virtual device: {0}")]
    DeviceCreation(String),

    #[error("Failed to write event: {0}")]
    WriteError(String),

    #[error("Key {0} is not registered on the virtual device")]
    UnregisteredKey(Key),
}
