// MouseDirectionBinder Event Module
// Input backends feeding the engine worker

mod channel;
mod hotplug;
mod source;

#[cfg(feature = "pure-rust")]
mod evdev;

pub use channel::ChannelSource;
pub use source::{
    open_with_access, DeviceId, DeviceInfo, EventSource, MotionDelta, SourceError, SourceEvent,
    SourceResult,
};

#[cfg(feature = "pure-rust")]
pub use self::evdev::EvdevSource;
