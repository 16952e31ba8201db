//! Graphics tablets (pen + pad).
//!
//! Only the names exist so far: neither trait has required members. Bindings
//! can implement them to mark a device as a tablet, and a pen/pad contract
//! can be added later without renaming anything.

use crate::device::Device;

/// Receives tablet events.
pub trait TabletListener {}

/// A graphics tablet device.
pub trait Tablet: Device {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceInfo, DeviceKind};

    struct Pad;

    impl Device for Pad {
        fn id(&self) -> &str {
            "tablet:0"
        }

        fn name(&self) -> &str {
            "Pen Tablet"
        }

        fn kind(&self) -> DeviceKind {
            DeviceKind::Tablet
        }
    }

    impl Tablet for Pad {}

    #[test]
    fn tablets_are_plain_devices() {
        let tablet: &dyn Tablet = &Pad;
        assert_eq!(DeviceInfo::of(tablet).kind, DeviceKind::Tablet);
    }
}
