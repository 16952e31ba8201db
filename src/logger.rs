use crate::device::Device;
use crate::game_controller::{AxisPosition, GameController, GameControllerListener};
use crate::keyboard::{Keyboard, KeyboardListener, NpKey};
use crate::mouse::{Mouse, MouseListener, ScrollDirection};

/// A listener that logs every event it receives through `tracing` at debug level.
///
/// Register one instance on as many devices as needed.
#[derive(Debug, Default)]
pub struct EventLogger {
    received: u64,
}

impl EventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events logged so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl KeyboardListener for EventLogger {
    fn key_pressed(&mut self, source: &dyn Keyboard, key_num: u16, scan_code: u32) {
        self.received += 1;
        tracing::debug!(device = source.id(), key_num, scan_code, "key pressed");
    }

    fn key_released(&mut self, source: &dyn Keyboard, key_num: u16, scan_code: u32) {
        self.received += 1;
        tracing::debug!(device = source.id(), key_num, scan_code, "key released");
    }

    fn char_typed(&mut self, source: &dyn Keyboard, typed: char) {
        self.received += 1;
        tracing::debug!(device = source.id(), ?typed, "char typed");
    }

    fn non_print_key_typed(&mut self, source: &dyn Keyboard, key: NpKey) {
        self.received += 1;
        tracing::debug!(device = source.id(), ?key, "non-printable key typed");
    }
}

impl MouseListener for EventLogger {
    fn moved(&mut self, source: &dyn Mouse, x: u32, y: u32) {
        self.received += 1;
        tracing::debug!(device = source.id(), x, y, "mouse moved");
    }

    fn button_pressed(&mut self, source: &dyn Mouse, button: u16) {
        self.received += 1;
        tracing::debug!(device = source.id(), button, "mouse button pressed");
    }

    fn button_released(&mut self, source: &dyn Mouse, button: u16) {
        self.received += 1;
        tracing::debug!(device = source.id(), button, "mouse button released");
    }

    fn button_clicked(&mut self, source: &dyn Mouse, button: u16, click_count: u16) {
        self.received += 1;
        tracing::debug!(device = source.id(), button, click_count, "mouse button clicked");
    }

    fn scrolled(&mut self, source: &dyn Mouse, direction: ScrollDirection) {
        self.received += 1;
        tracing::debug!(device = source.id(), ?direction, "mouse scrolled");
    }

    fn entered(&mut self, source: &dyn Mouse) {
        self.received += 1;
        tracing::debug!(device = source.id(), "mouse entered client area");
    }

    fn exited(&mut self, source: &dyn Mouse) {
        self.received += 1;
        tracing::debug!(device = source.id(), "mouse exited client area");
    }
}

impl GameControllerListener for EventLogger {
    fn button_pressed(&mut self, source: &dyn GameController, button: u16) {
        self.received += 1;
        tracing::debug!(device = source.id(), button, "controller button pressed");
    }

    fn button_released(&mut self, source: &dyn GameController, button: u16) {
        self.received += 1;
        tracing::debug!(device = source.id(), button, "controller button released");
    }

    fn axis_moved(&mut self, source: &dyn GameController, axis: u16, delta: AxisPosition) {
        self.received += 1;
        tracing::debug!(
            device = source.id(),
            axis,
            dx = delta.x,
            dy = delta.y,
            dz = delta.z,
            "controller axis moved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{VirtualKeyboard, VirtualMouse};
    use crate::config::InputConfig;
    use crate::keymap::KeyMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn counts_events_from_every_device() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let logger = Rc::new(RefCell::new(EventLogger::new()));
        let mut kb = VirtualKeyboard::new("kbd:log", "Keyboard", KeyMap::pc_set1());
        let mut mouse = VirtualMouse::new("mouse:log", "Mouse", &InputConfig::default());
        kb.add_listener(logger.clone());
        mouse.add_listener(logger.clone());

        kb.feed_scan_code(0x01);
        kb.feed_scan_code(0x81);
        mouse.feed_move(1, 1);

        // Escape: press, NPK typed, release; then entered and moved.
        assert_eq!(logger.borrow().received(), 5);
    }
}
