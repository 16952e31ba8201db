use serde::Serialize;
use std::fmt;

/// Device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
    GameController,
    Tablet,
}

/// Identity shared by every device class.
pub trait Device {
    /// Stable id, unique within a [`DeviceManager`](crate::manager::DeviceManager).
    fn id(&self) -> &str;
    /// Human-friendly name.
    fn name(&self) -> &str;
    fn kind(&self) -> DeviceKind;
}

/// Owned description of a device, for listings and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
}

impl DeviceInfo {
    pub fn of(device: &(impl Device + ?Sized)) -> Self {
        Self {
            id: device.id().to_string(),
            name: device.name().to_string(),
            kind: device.kind(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:?}] ({})", self.name, self.kind, self.id)
    }
}
