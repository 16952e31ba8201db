//! Device ownership.
//!
//! A [`DeviceManager`] owns the devices a binding creates at startup and drops
//! them at shutdown. Listeners are registered on the devices it hands out.

use crate::backends::virtual_input::{VirtualGameController, VirtualKeyboard, VirtualMouse};
use crate::config::InputConfig;
use crate::device::{Device, DeviceInfo};
use crate::error::Result;
use crate::game_controller::{ControllerLayout, GameController};
use crate::keyboard::Keyboard;
use crate::mouse::Mouse;

#[derive(Default)]
pub struct DeviceManager {
    keyboards: Vec<Box<dyn Keyboard>>,
    mice: Vec<Box<dyn Mouse>>,
    controllers: Vec<Box<dyn GameController>>,
}

impl DeviceManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// One virtual keyboard, mouse and gamepad, configured from `config`.
    pub fn with_virtual_devices(config: &InputConfig) -> Result<Self> {
        let mut manager = Self::new();
        manager.add_keyboard(VirtualKeyboard::from_config(
            "virtual:keyboard:0",
            "Virtual Keyboard 0",
            config,
        )?);
        manager.add_mouse(VirtualMouse::new("virtual:mouse:0", "Virtual Mouse 0", config));
        manager.add_controller(VirtualGameController::new(
            "virtual:pad:0",
            "Virtual Gamepad 0",
            ControllerLayout::gamepad(),
            config,
        ));
        tracing::info!(devices = manager.len(), "created virtual devices");
        Ok(manager)
    }

    /// Keyboard and mouse bound to `hwnd` plus the four XInput slots.
    ///
    /// The host must forward its window messages to
    /// [`handle_message`](Self::handle_message).
    #[cfg(all(feature = "win32", target_os = "windows"))]
    pub fn discover_win32(
        hwnd: windows_sys::Win32::Foundation::HWND,
        config: &InputConfig,
    ) -> Result<Self> {
        use crate::backends::windows::{detect_controllers, Win32Keyboard, Win32Mouse};

        let mut manager = Self::new();
        manager.add_keyboard(Win32Keyboard::new(hwnd, config)?);
        manager.add_mouse(Win32Mouse::new(hwnd, config)?);
        for pad in detect_controllers(config) {
            manager.controllers.push(Box::new(pad));
        }
        tracing::info!(devices = manager.len(), "discovered Win32 devices");
        Ok(manager)
    }

    pub fn add_keyboard<K: Keyboard + 'static>(&mut self, keyboard: K) -> usize {
        self.keyboards.push(Box::new(keyboard));
        self.keyboards.len() - 1
    }

    pub fn add_mouse<M: Mouse + 'static>(&mut self, mouse: M) -> usize {
        self.mice.push(Box::new(mouse));
        self.mice.len() - 1
    }

    pub fn add_controller<C: GameController + 'static>(&mut self, controller: C) -> usize {
        self.controllers.push(Box::new(controller));
        self.controllers.len() - 1
    }

    pub fn keyboard(&self, index: usize) -> Option<&dyn Keyboard> {
        self.keyboards.get(index).map(|k| &**k)
    }

    pub fn keyboard_mut(&mut self, index: usize) -> Option<&mut (dyn Keyboard + 'static)> {
        self.keyboards.get_mut(index).map(|k| &mut **k)
    }

    pub fn mouse(&self, index: usize) -> Option<&dyn Mouse> {
        self.mice.get(index).map(|m| &**m)
    }

    pub fn mouse_mut(&mut self, index: usize) -> Option<&mut (dyn Mouse + 'static)> {
        self.mice.get_mut(index).map(|m| &mut **m)
    }

    pub fn controller(&self, index: usize) -> Option<&dyn GameController> {
        self.controllers.get(index).map(|c| &**c)
    }

    pub fn controller_mut(
        &mut self,
        index: usize,
    ) -> Option<&mut (dyn GameController + 'static)> {
        self.controllers.get_mut(index).map(|c| &mut **c)
    }

    pub fn keyboard_count(&self) -> usize {
        self.keyboards.len()
    }

    pub fn mouse_count(&self) -> usize {
        self.mice.len()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Total number of devices.
    pub fn len(&self) -> usize {
        self.keyboards.len() + self.mice.len() + self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors of every device: keyboards, then mice, then controllers.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        let keyboards = self.keyboards.iter().map(|d| DeviceInfo::of(&**d));
        let mice = self.mice.iter().map(|d| DeviceInfo::of(&**d));
        let pads = self.controllers.iter().map(|d| DeviceInfo::of(&**d));
        keyboards.chain(mice).chain(pads).collect()
    }

    /// Polls every controller, returning the total number of notifications.
    ///
    /// A failing controller is logged and skipped so the others still update.
    pub fn poll_controllers(&mut self) -> usize {
        let mut notified = 0;
        for pad in &mut self.controllers {
            match pad.poll() {
                Ok(n) => notified += n,
                Err(e) => tracing::warn!(device = pad.id(), error = %e, "controller poll failed"),
            }
        }
        notified
    }

    /// Routes a window message to every Win32 keyboard and mouse.
    ///
    /// Returns `true` when some device consumed it.
    #[cfg(all(feature = "win32", target_os = "windows"))]
    pub fn handle_message(&mut self, msg: u32, wparam: usize, lparam: isize) -> bool {
        use crate::backends::windows::MessageSink;

        let mut handled = false;
        for kb in &mut self.keyboards {
            if let Some(sink) = kb.message_sink() {
                handled |= sink.handle_message(msg, wparam, lparam);
            }
        }
        for m in &mut self.mice {
            if let Some(sink) = m.message_sink() {
                handled |= sink.handle_message(msg, wparam, lparam);
            }
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;

    #[test]
    fn virtual_devices_are_listed_in_order() {
        let manager = DeviceManager::with_virtual_devices(&InputConfig::default()).unwrap();
        let kinds: Vec<DeviceKind> = manager.devices().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DeviceKind::Keyboard, DeviceKind::Mouse, DeviceKind::GameController]
        );
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.devices()[0].id, "virtual:keyboard:0");
    }

    #[test]
    fn lookups_out_of_range_are_none() {
        let mut manager = DeviceManager::new();
        assert!(manager.is_empty());
        assert!(manager.keyboard(0).is_none());
        assert!(manager.mouse_mut(3).is_none());
        assert!(manager.controller(1).is_none());
    }

    #[test]
    fn push_driven_controllers_poll_to_zero() {
        let mut manager = DeviceManager::with_virtual_devices(&InputConfig::default()).unwrap();
        assert_eq!(manager.poll_controllers(), 0);
        assert!(!manager.controller(0).unwrap().connected());
    }

    #[test]
    fn config_flags_reach_devices() {
        let config = InputConfig {
            events_enabled: false,
            mouse_buttons: 3,
            ..InputConfig::default()
        };
        let manager = DeviceManager::with_virtual_devices(&config).unwrap();
        assert!(!manager.keyboard(0).unwrap().events_enabled());
        assert_eq!(manager.mouse(0).unwrap().button_count(), 3);
    }
}
