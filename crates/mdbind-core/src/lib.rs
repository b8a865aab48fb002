// MouseDirectionBinder Core Library
// Horizontal pointer motion to directional key presses

pub mod access;
pub mod config;
pub mod engine;
pub mod event;
pub mod input;
pub mod key;
pub mod notify;
pub mod output;
pub mod random;
pub mod translate;

#[cfg(feature = "pure-rust")]
pub mod settings;

pub use access::AccessHandshake;
pub use config::{SharedConfig, VIRTUAL_DEVICE_NAME};
pub use engine::{DetectedDevices, Engine, EngineError, EngineOptions, Lifecycle, StopHandle};
pub use event::{ChannelSource, DeviceId, DeviceInfo, EventSource, MotionDelta, SourceError, SourceEvent};
pub use input::{is_allowed, BrandFilter, BrandList, Capability, DeviceCapabilities, DeviceDescriptor};
pub use key::{Key, KeyParseError};
pub use notify::{ErrorKind, ErrorReport, Notification, Status};
pub use output::{KeySink, KeySynthesizer, KeyValue, MemorySink, OutputError, OutputEvent};
pub use random::Randomizer;
pub use translate::{DeadZonePolicy, KeyIntent, MotionTranslator};

#[cfg(feature = "pure-rust")]
pub use event::EvdevSource;
#[cfg(feature = "pure-rust")]
pub use output::VirtualKeyboard;
#[cfg(feature = "pure-rust")]
pub use settings::{default_settings_content, Settings, SettingsError};
