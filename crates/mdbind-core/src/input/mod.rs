// MouseDirectionBinder Input Layer
// Device detection and filtering logic

mod device;
mod filter;

pub use device::{
    is_keyboard, is_pointer, Capability, DeviceCapabilities, DeviceDescriptor,
    BTN_LEFT, BTN_TOOL_FINGER, BTN_TOUCH,
};
pub use filter::{is_allowed, BrandFilter, BrandList};
