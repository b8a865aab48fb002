// MouseDirectionBinder Key Type
// Linux input-event-codes key numbers used for triggers and output

use std::fmt;
use std::str::FromStr;

/// Represents a single keyboard key code.
///
/// The numeric values match Linux input-event-codes.h definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(pub u16);

/// Error returned when a key name is not in the table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown key: {0}")]
pub struct KeyParseError(pub String);

// Canonical name first; aliases follow with the same code.
const KEY_TABLE: &[(&str, u16)] = &[
    ("ESC", 1),
    ("ESCAPE", 1),
    ("KEY_1", 2),
    ("1", 2),
    ("KEY_2", 3),
    ("2", 3),
    ("KEY_3", 4),
    ("3", 4),
    ("KEY_4", 5),
    ("4", 5),
    ("KEY_5", 6),
    ("5", 6),
    ("KEY_6", 7),
    ("6", 7),
    ("KEY_7", 8),
    ("7", 8),
    ("KEY_8", 9),
    ("8", 9),
    ("KEY_9", 10),
    ("9", 10),
    ("KEY_0", 11),
    ("0", 11),
    ("TAB", 15),
    ("Q", 16),
    ("W", 17),
    ("E", 18),
    ("R", 19),
    ("T", 20),
    ("Y", 21),
    ("U", 22),
    ("I", 23),
    ("O", 24),
    ("P", 25),
    ("LEFT_CTRL", 29),
    ("LEFTCTRL", 29),
    ("A", 30),
    ("S", 31),
    ("D", 32),
    ("F", 33),
    ("G", 34),
    ("H", 35),
    ("J", 36),
    ("K", 37),
    ("L", 38),
    ("LEFT_SHIFT", 42),
    ("LEFTSHIFT", 42),
    ("SHIFT", 42),
    ("Z", 44),
    ("X", 45),
    ("C", 46),
    ("V", 47),
    ("B", 48),
    ("N", 49),
    ("M", 50),
    ("RIGHT_SHIFT", 54),
    ("RIGHTSHIFT", 54),
    ("LEFT_ALT", 56),
    ("LEFTALT", 56),
    ("ALT", 56),
    ("SPACE", 57),
    ("CAPSLOCK", 58),
    ("CAPS_LOCK", 58),
    ("F1", 59),
    ("F2", 60),
    ("F3", 61),
    ("F4", 62),
    ("F5", 63),
    ("F6", 64),
    ("F7", 65),
    ("F8", 66),
    ("F9", 67),
    ("F10", 68),
    ("F11", 87),
    ("F12", 88),
    ("RIGHT_CTRL", 97),
    ("RIGHTCTRL", 97),
    ("RIGHT_ALT", 100),
    ("RIGHTALT", 100),
    ("LEFT_META", 125),
    ("LEFTMETA", 125),
    ("SUPER", 125),
    ("RIGHT_META", 126),
    ("RIGHTMETA", 126),
    ("BTN_SIDE", 275),
    ("MOUSE_SIDE", 275),
    ("BTN_EXTRA", 276),
    ("MOUSE_EXTRA", 276),
];

impl Key {
    pub const ESC: Key = Key(1);
    pub const A: Key = Key(30);
    pub const D: Key = Key(32);
    pub const LEFT_SHIFT: Key = Key(42);
    pub const SPACE: Key = Key(57);

    /// Get the raw numeric code value
    pub fn code(self) -> u16 {
        self.0
    }

    /// Canonical name, if this key is one the binder knows about
    pub fn name(self) -> Option<&'static str> {
        KEY_TABLE
            .iter()
            .find(|(_, code)| *code == self.0)
            .map(|(name, _)| *name)
    }

    /// Whether the key has a name in the table.
    ///
    /// Named keys are always accepted as activation triggers; other codes
    /// must be reported by an attached device.
    pub fn is_known(self) -> bool {
        self.name().is_some()
    }

    /// Every canonical key name, in code order.
    pub fn known_names() -> impl Iterator<Item = &'static str> {
        let mut last = 0;
        KEY_TABLE.iter().filter_map(move |(name, code)| {
            if *code == last {
                None
            } else {
                last = *code;
                Some(*name)
            }
        })
    }
}

impl From<u16> for Key {
    fn from(code: u16) -> Self {
        Key(code)
    }
}

impl From<Key> for u16 {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "KEY({})", self.0),
        }
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    /// Accepts a table name (case-insensitive) or a raw decimal code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u16>() {
            // Bare digits 0-9 are key names, not codes.
            if trimmed.len() > 1 {
                return Ok(Key(code));
            }
        }
        let upper = trimmed.to_uppercase();
        KEY_TABLE
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, code)| Key(*code))
            .ok_or_else(|| KeyParseError(trimmed.to_string()))
    }
}
