// MouseDirectionBinder Input Layer - Device Detection
// Device descriptors and capability analysis

use std::collections::HashSet;
use std::fmt;

/// Capability a device must expose to be considered by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Relative pointer motion or a touchpad/gesture surface
    Pointer,
    Keyboard,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Pointer => f.write_str("pointer"),
            Capability::Keyboard => f.write_str("keyboard"),
        }
    }
}

/// Identity of a discovered device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            name: name.into(),
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.name, self.vendor_id, self.product_id
        )
    }
}

/// Device capabilities extracted from the evdev capability bitmaps
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Whether the device supports EV_KEY events
    pub has_ev_key: bool,
    /// Supported key codes (EV_KEY capability codes)
    pub supported_keys: Vec<u16>,
    /// REL_X present
    pub has_rel_x: bool,
    /// ABS_X present
    pub has_abs_x: bool,
}

impl DeviceCapabilities {
    pub fn new(has_ev_key: bool, supported_keys: Vec<u16>) -> Self {
        Self {
            has_ev_key,
            supported_keys,
            has_rel_x: false,
            has_abs_x: false,
        }
    }

    pub fn with_rel_x(mut self) -> Self {
        self.has_rel_x = true;
        self
    }

    pub fn with_abs_x(mut self) -> Self {
        self.has_abs_x = true;
        self
    }

    /// Check if a specific key code is supported
    pub fn supports_key(&self, key_code: u16) -> bool {
        self.supported_keys.contains(&key_code)
    }

    fn key_set(&self) -> HashSet<u16> {
        self.supported_keys.iter().copied().collect()
    }

    /// Check a capability by kind
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Pointer => is_pointer(self),
            Capability::Keyboard => is_keyboard(self),
        }
    }
}

// QWERTY row key codes: Q, W, E, R, T, Y
const QWERTY_CODES: &[u16] = &[16, 17, 18, 19, 20, 21];

// Representative A-Z and SPACE codes for keyboard detection
const A_Z_SPACE_CODES: &[u16] = &[57, 30, 44]; // SPACE, A, Z

pub const BTN_LEFT: u16 = 0x110;
pub const BTN_TOOL_FINGER: u16 = 0x145;
pub const BTN_TOUCH: u16 = 0x14a;

/// A device is a keyboard when it has EV_KEY with the full QWERTY row,
/// A, Z and SPACE.
pub fn is_keyboard(capabilities: &DeviceCapabilities) -> bool {
    if !capabilities.has_ev_key {
        return false;
    }

    let key_set = capabilities.key_set();
    let qwerty_present = QWERTY_CODES.iter().all(|code| key_set.contains(code));
    let az_present = A_Z_SPACE_CODES.iter().all(|code| key_set.contains(code));

    qwerty_present && az_present
}

/// A device is a pointer when it reports relative X motion, or absolute X
/// together with touch or finger buttons (touchpads, gesture surfaces).
/// Absolute-only devices without touch buttons (tablets, joysticks) are not.
pub fn is_pointer(capabilities: &DeviceCapabilities) -> bool {
    if capabilities.has_rel_x {
        return true;
    }
    capabilities.has_abs_x
        && (capabilities.supports_key(BTN_TOUCH) || capabilities.supports_key(BTN_TOOL_FINGER))
}
