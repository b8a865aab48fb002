// MouseDirectionBinder Runtime Configuration
// Thread-safe configuration shared between the collaborator and the worker

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::Mutex;

use crate::input::{BrandFilter, BrandList};
use crate::key::Key;

/// Name of the virtual output device. Always appended to both block-lists.
pub const VIRTUAL_DEVICE_NAME: &str = "MouseDirectionBinder Virtual Keyboard";

/// Block-list entry that matches the virtual output device.
pub const VIRTUAL_DEVICE_BRAND: &str = "MouseDirectionBinder";

pub const DEFAULT_RANDOMIZER_MIN: i32 = 70;
pub const DEFAULT_RANDOMIZER_MAX: i32 = 90;

/// Composite values changed since the worker last looked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    pub activation_key: Option<Key>,
    pub pointer_filter: Option<BrandFilter>,
    pub keyboard_filter: Option<BrandFilter>,
}

impl ConfigSnapshot {
    pub fn is_empty(&self) -> bool {
        self.activation_key.is_none()
            && self.pointer_filter.is_none()
            && self.keyboard_filter.is_none()
    }
}

/// Configuration written by the collaborator, read by the worker.
///
/// Scalars are lock-free and read live. The activation key and brand
/// filters go through a pending snapshot that the worker takes once per
/// loop iteration.
#[derive(Debug)]
pub struct SharedConfig {
    randomizer_enabled: AtomicBool,
    randomizer_min: AtomicI32,
    randomizer_max: AtomicI32,
    pending: Mutex<ConfigSnapshot>,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedConfig {
    pub fn new() -> Self {
        Self {
            randomizer_enabled: AtomicBool::new(false),
            randomizer_min: AtomicI32::new(DEFAULT_RANDOMIZER_MIN),
            randomizer_max: AtomicI32::new(DEFAULT_RANDOMIZER_MAX),
            pending: Mutex::new(ConfigSnapshot::default()),
        }
    }

    pub fn set_activation_key(&self, key: Key) {
        self.pending.lock().activation_key = Some(key);
    }

    pub fn set_randomizer_enabled(&self, enabled: bool) {
        self.randomizer_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Both bounds are clamped to 0..=100; order does not matter.
    pub fn set_randomizer_range(&self, minimum_percent: i32, maximum_percent: i32) {
        self.randomizer_min
            .store(minimum_percent.clamp(0, 100), Ordering::Relaxed);
        self.randomizer_max
            .store(maximum_percent.clamp(0, 100), Ordering::Relaxed);
    }

    pub fn set_pointer_brand_filters(&self, allow: BrandList, block: BrandList) {
        let filter = with_self_block(allow, block);
        self.pending.lock().pointer_filter = Some(filter);
    }

    pub fn set_keyboard_brand_filters(&self, allow: BrandList, block: BrandList) {
        let filter = with_self_block(allow, block);
        self.pending.lock().keyboard_filter = Some(filter);
    }

    pub fn randomizer_enabled(&self) -> bool {
        self.randomizer_enabled.load(Ordering::Relaxed)
    }

    pub fn randomizer_range(&self) -> (i32, i32) {
        (
            self.randomizer_min.load(Ordering::Relaxed),
            self.randomizer_max.load(Ordering::Relaxed),
        )
    }

    /// Take the pending snapshot under a single lock acquisition.
    pub fn take_pending(&self) -> Option<ConfigSnapshot> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut *pending))
    }
}

/// Filter used before the collaborator sends one: admit all, block ourselves.
pub fn default_filter() -> BrandFilter {
    with_self_block(BrandList::new(), BrandList::new())
}

fn with_self_block(allow: BrandList, mut block: BrandList) -> BrandFilter {
    block.insert(VIRTUAL_DEVICE_BRAND);
    BrandFilter::new(allow, block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_pending_initially() {
        let config = SharedConfig::new();
        assert!(config.take_pending().is_none());
    }

    #[test]
    fn test_take_pending_clears_snapshot() {
        let config = SharedConfig::new();
        config.set_activation_key(Key::SPACE);
        let snapshot = config.take_pending().unwrap();
        assert_eq!(snapshot.activation_key, Some(Key::SPACE));
        assert!(snapshot.pointer_filter.is_none());
        assert!(config.take_pending().is_none());
    }

    #[test]
    fn test_snapshot_is_empty() {
        assert!(ConfigSnapshot::default().is_empty());
        let snapshot = ConfigSnapshot {
            activation_key: Some(Key::A),
            ..ConfigSnapshot::default()
        };
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_latest_value_wins() {
        let config = SharedConfig::new();
        config.set_activation_key(Key::SPACE);
        config.set_activation_key(Key::LEFT_SHIFT);
        let snapshot = config.take_pending().unwrap();
        assert_eq!(snapshot.activation_key, Some(Key::LEFT_SHIFT));
    }

    #[test]
    fn test_own_device_always_blocked() {
        let config = SharedConfig::new();
        config.set_pointer_brand_filters(BrandList::parse("Logitech"), BrandList::new());
        config.set_keyboard_brand_filters(BrandList::new(), BrandList::parse("virtual"));
        let snapshot = config.take_pending().unwrap();
        let pointer = snapshot.pointer_filter.unwrap();
        let keyboard = snapshot.keyboard_filter.unwrap();
        assert!(pointer.block.matches(VIRTUAL_DEVICE_NAME));
        assert!(keyboard.block.matches(VIRTUAL_DEVICE_NAME));
        assert_eq!(keyboard.block.len(), 2);
    }

    #[test]
    fn test_self_block_not_duplicated() {
        let config = SharedConfig::new();
        config.set_pointer_brand_filters(BrandList::new(), BrandList::parse("mousedirectionbinder"));
        let pointer = config.take_pending().unwrap().pointer_filter.unwrap();
        assert_eq!(pointer.block.len(), 1);
    }

    #[test]
    fn test_randomizer_range_is_clamped() {
        let config = SharedConfig::new();
        assert_eq!(config.randomizer_range(), (70, 90));
        config.set_randomizer_range(120, -4);
        assert_eq!(config.randomizer_range(), (100, 0));
        config.set_randomizer_enabled(true);
        assert!(config.randomizer_enabled());
    }
}
