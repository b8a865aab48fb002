// MouseDirectionBinder Input Layer - Device Filtering
// Brand allow/block matching for device admission

use super::device::{Capability, DeviceCapabilities, DeviceDescriptor};

/// Case-insensitive, de-duplicated list of brand substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandList {
    // Lower-cased entries, first occurrence order preserved.
    entries: Vec<String>,
}

impl BrandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a user string. Entries are separated by `,` or `;`.
    pub fn parse(value: &str) -> Self {
        value.split([',', ';']).collect()
    }

    /// Add an entry; blank and duplicate entries are ignored.
    pub fn insert(&mut self, entry: &str) -> bool {
        let normalised = entry.trim().to_lowercase();
        if normalised.is_empty() || self.entries.contains(&normalised) {
            return false;
        }
        self.entries.push(normalised);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Whether any entry is a substring of `name` (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.entries.iter().any(|entry| name.contains(entry.as_str()))
    }
}

impl<S: AsRef<str>> FromIterator<S> for BrandList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = BrandList::new();
        for entry in iter {
            list.insert(entry.as_ref());
        }
        list
    }
}

/// Allow and block lists for one device kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandFilter {
    pub allow: BrandList,
    pub block: BrandList,
}

impl BrandFilter {
    pub fn new(allow: BrandList, block: BrandList) -> Self {
        Self { allow, block }
    }

    /// Apply the filter to a device.
    pub fn admits(
        &self,
        descriptor: &DeviceDescriptor,
        capabilities: &DeviceCapabilities,
        required: Capability,
    ) -> bool {
        is_allowed(descriptor, capabilities, required, &self.allow, &self.block)
    }
}

/// Check if a device should be considered.
///
/// The filtering logic is:
///
/// 1. The device must expose the required capability
/// 2. A block-list match always rejects, whatever the allow-list says
/// 3. An empty allow-list admits everything else
/// 4. Otherwise at least one allow-list entry must match
///
/// Matching is case-insensitive substring containment within the name.
pub fn is_allowed(
    descriptor: &DeviceDescriptor,
    capabilities: &DeviceCapabilities,
    required: Capability,
    allow: &BrandList,
    block: &BrandList,
) -> bool {
    if !capabilities.has(required) {
        return false;
    }

    if block.matches(&descriptor.name) {
        return false;
    }

    allow.is_empty() || allow.matches(&descriptor.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer_caps() -> DeviceCapabilities {
        DeviceCapabilities::new(true, vec![0x110]).with_rel_x()
    }

    fn keyboard_caps() -> DeviceCapabilities {
        DeviceCapabilities::new(true, vec![16, 17, 18, 19, 20, 21, 30, 44, 57])
    }

    #[test]
    fn test_empty_allow_list_admits() {
        let device = DeviceDescriptor::new("Generic Touchpad", 0, 0);
        let block = BrandList::parse("virtual");
        assert!(is_allowed(
            &device,
            &pointer_caps(),
            Capability::Pointer,
            &BrandList::new(),
            &block
        ));
    }

    #[test]
    fn test_block_wins_over_allow() {
        let device = DeviceDescriptor::new("Logitech Virtual Mouse", 0x046d, 1);
        let allow = BrandList::parse("Logitech");
        let block = BrandList::parse("virtual");
        assert!(!is_allowed(
            &device,
            &pointer_caps(),
            Capability::Pointer,
            &allow,
            &block
        ));
    }

    #[test]
    fn test_non_empty_allow_requires_match() {
        let allow = BrandList::parse("Razer, SteelSeries");
        let razer = DeviceDescriptor::new("Razer DeathAdder V2", 0x1532, 0x84);
        let other = DeviceDescriptor::new("PixArt USB Optical Mouse", 0x093a, 0x2510);
        let caps = pointer_caps();
        assert!(is_allowed(&razer, &caps, Capability::Pointer, &allow, &BrandList::new()));
        assert!(!is_allowed(&other, &caps, Capability::Pointer, &allow, &BrandList::new()));
    }

    #[test]
    fn test_missing_capability_rejects() {
        let device = DeviceDescriptor::new("Logitech K120", 0x046d, 0xc31c);
        assert!(!is_allowed(
            &device,
            &keyboard_caps(),
            Capability::Pointer,
            &BrandList::new(),
            &BrandList::new()
        ));
        assert!(is_allowed(
            &device,
            &keyboard_caps(),
            Capability::Keyboard,
            &BrandList::new(),
            &BrandList::new()
        ));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let device = DeviceDescriptor::new("ELAN1200:00 04F3:3090 Touchpad", 0x04f3, 0x3090);
        let allow = BrandList::parse("elan");
        assert!(is_allowed(&device, &pointer_caps(), Capability::Pointer, &allow, &BrandList::new()));
    }

    #[test]
    fn test_brand_list_parse_dedups() {
        let list = BrandList::parse(" Logitech; logitech ,Razer,, ");
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["logitech", "razer"]);
    }

    #[test]
    fn test_filter_admits() {
        let filter = BrandFilter::new(BrandList::new(), BrandList::parse("MouseDirectionBinder"));
        let own = DeviceDescriptor::new("MouseDirectionBinder Virtual Keyboard", 0, 0);
        assert!(!filter.admits(&own, &keyboard_caps(), Capability::Keyboard));
    }
}
