//! In-memory devices fed by the host.
//!
//! These work on every platform. The host (or a test) injects raw input through
//! the `feed_*` methods; the shared state cores decode it and the device
//! dispatches the resulting events to its listeners synchronously. Each `feed_*`
//! returns the total number of listener notifications it caused.

use crate::config::InputConfig;
use crate::device::{Device, DeviceKind};
use crate::error::{InputError, Result};
use crate::game_controller::{
    self, AxisPosition, ControllerCore, ControllerLayout, ControllerState, GameController,
    GameControllerEvent, GameControllerListener,
};
use crate::keyboard::{self, Keyboard, KeyboardCore, KeyboardEvent, KeyboardListener, NpKey};
use crate::keymap::{KeyLayout, KeyMap, ScanCodePair};
use crate::mouse::{self, Mouse, MouseCore, MouseEvent, MouseListener, StandardCursor};
use crate::registry::ListenerRegistry;
use std::time::Instant;

/// Keyboard driven by injected scan codes and characters.
pub struct VirtualKeyboard {
    id: String,
    name: String,
    core: KeyboardCore,
    listeners: ListenerRegistry<dyn KeyboardListener>,
}

impl VirtualKeyboard {
    pub fn new(id: &str, name: &str, keymap: KeyMap) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            core: KeyboardCore::new(keymap),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn from_config(id: &str, name: &str, config: &InputConfig) -> Result<Self> {
        let mut kb = Self::new(id, name, config.key_map()?);
        kb.core.set_events_enabled(config.events_enabled);
        Ok(kb)
    }

    fn emit(&self, events: &[KeyboardEvent]) -> usize {
        events.iter().map(|e| keyboard::dispatch(self, e)).sum()
    }

    /// Injects one raw scan code (press or release).
    pub fn feed_scan_code(&mut self, scan_code: u32) -> usize {
        let events = self.core.process_scan_code(scan_code);
        self.emit(&events)
    }

    /// Injects a typed character.
    pub fn feed_char(&mut self, typed: char) -> usize {
        let events = self.core.process_char(typed);
        self.emit(&events)
    }

    /// Presses `key_num` using its press scan code.
    pub fn press_key(&mut self, key_num: u16) -> Result<usize> {
        let pair = self.pair(key_num)?;
        Ok(self.feed_scan_code(pair.press))
    }

    pub fn release_key(&mut self, key_num: u16) -> Result<usize> {
        let pair = self.pair(key_num)?;
        Ok(self.feed_scan_code(pair.release))
    }

    /// Press followed by release of the key mapped to `npk`.
    pub fn tap_npk(&mut self, npk: NpKey) -> Result<usize> {
        let key_num = self
            .core
            .keymap()
            .key_num_for_npk(npk)
            .ok_or_else(|| InputError::Layout(format!("{npk:?} is not mapped")))?;
        Ok(self.press_key(key_num)? + self.release_key(key_num)?)
    }

    /// Releases every held key (focus loss).
    pub fn release_all(&mut self) -> usize {
        let events = self.core.release_all();
        self.emit(&events)
    }

    fn pair(&self, key_num: u16) -> Result<ScanCodePair> {
        self.core
            .keymap()
            .scan_codes(key_num)
            .ok_or(InputError::UnknownKey(key_num))
    }
}

impl Device for VirtualKeyboard {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Keyboard
    }
}

impl Keyboard for VirtualKeyboard {
    fn layout_name(&self) -> String {
        self.core.keymap().name().to_string()
    }

    fn enable_events(&mut self, flag: bool) {
        self.core.set_events_enabled(flag);
    }

    fn events_enabled(&self) -> bool {
        self.core.events_enabled()
    }

    fn is_key_pressed(&self, key_num: u16) -> Result<bool> {
        self.core.is_pressed(key_num)
    }

    fn scan_codes_for_key_num(&self, key_num: u16) -> Option<ScanCodePair> {
        self.core.keymap().scan_codes(key_num)
    }

    fn key_num_for_scan_code(&self, scan_code: u32) -> Option<u16> {
        self.core.keymap().key_num_for_scan_code(scan_code)
    }

    fn npk_for_key_num(&self, key_num: u16) -> Option<NpKey> {
        self.core.keymap().npk(key_num)
    }

    fn key_num_for_npk(&self, npk: NpKey) -> Option<u16> {
        self.core.keymap().key_num_for_npk(npk)
    }

    fn set_layout(&mut self, layout: &KeyLayout) -> Result<()> {
        let keymap = KeyMap::from_layout(layout)?;
        let released = self.core.set_keymap(keymap);
        self.emit(&released);
        Ok(())
    }

    fn listeners(&self) -> &ListenerRegistry<dyn KeyboardListener> {
        &self.listeners
    }

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn KeyboardListener> {
        &mut self.listeners
    }
}

/// Mouse driven by injected positions, buttons and wheel deltas.
///
/// Cursor requests are recorded rather than rendered.
pub struct VirtualMouse {
    id: String,
    name: String,
    core: MouseCore,
    cursor: StandardCursor,
    cursor_hidden: bool,
    listeners: ListenerRegistry<dyn MouseListener>,
}

impl VirtualMouse {
    pub fn new(id: &str, name: &str, config: &InputConfig) -> Self {
        let mut core = MouseCore::new(config.mouse_buttons, config.double_click());
        core.set_client_size(config.client_size());
        core.set_events_enabled(config.events_enabled);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            core,
            cursor: StandardCursor::default(),
            cursor_hidden: false,
            listeners: ListenerRegistry::new(),
        }
    }

    fn emit(&self, events: &[MouseEvent]) -> usize {
        events.iter().map(|e| mouse::dispatch(self, e)).sum()
    }

    pub fn set_client_size(&mut self, width: u32, height: u32) {
        self.core.set_client_size(Some((width, height)));
    }

    pub fn feed_move(&mut self, x: i32, y: i32) -> usize {
        let events = self.core.process_move(x, y);
        self.emit(&events)
    }

    pub fn feed_leave(&mut self) -> usize {
        let events = self.core.process_leave();
        self.emit(&events)
    }

    pub fn feed_button(&mut self, button: u16, down: bool) -> Result<usize> {
        let events = self.core.process_button(button, down)?;
        Ok(self.emit(&events))
    }

    /// Like [`feed_button`](Self::feed_button) with an explicit timestamp.
    pub fn feed_button_at(&mut self, button: u16, down: bool, at: Instant) -> Result<usize> {
        let events = self.core.process_button_at(button, down, at)?;
        Ok(self.emit(&events))
    }

    pub fn feed_wheel(&mut self, dx: i32, dy: i32) -> usize {
        let events = self.core.process_wheel(dx, dy);
        self.emit(&events)
    }

    pub fn cursor(&self) -> StandardCursor {
        self.cursor
    }

    pub fn is_cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    pub fn is_captured(&self) -> bool {
        self.core.is_confined()
    }
}

impl Device for VirtualMouse {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Mouse
    }
}

impl Mouse for VirtualMouse {
    fn enable_events(&mut self, flag: bool) {
        self.core.set_events_enabled(flag);
    }

    fn events_enabled(&self) -> bool {
        self.core.events_enabled()
    }

    fn position(&self) -> Result<(u32, u32)> {
        self.core.position()
    }

    fn is_in_client_area(&self) -> bool {
        self.core.is_inside()
    }

    fn button_count(&self) -> u16 {
        self.core.button_count()
    }

    fn is_button_pressed(&self, button: u16) -> Result<bool> {
        self.core.is_button_pressed(button)
    }

    fn set_standard_cursor(&mut self, cursor: StandardCursor) -> Result<()> {
        self.cursor = cursor;
        Ok(())
    }

    fn hide_cursor(&mut self, hidden: bool) -> Result<()> {
        self.cursor_hidden = hidden;
        Ok(())
    }

    fn capture(&mut self, captured: bool) -> Result<()> {
        self.core.set_confined(captured);
        Ok(())
    }

    fn listeners(&self) -> &ListenerRegistry<dyn MouseListener> {
        &self.listeners
    }

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn MouseListener> {
        &mut self.listeners
    }
}

/// Controller driven by injected state snapshots.
pub struct VirtualGameController {
    id: String,
    name: String,
    core: ControllerCore,
    listeners: ListenerRegistry<dyn GameControllerListener>,
}

impl VirtualGameController {
    pub fn new(id: &str, name: &str, layout: ControllerLayout, config: &InputConfig) -> Self {
        let mut core = ControllerCore::new(layout, config.axis_dead_band);
        core.set_events_enabled(config.events_enabled);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            core,
            listeners: ListenerRegistry::new(),
        }
    }

    fn emit(&self, events: &[GameControllerEvent]) -> usize {
        events
            .iter()
            .map(|e| game_controller::dispatch(self, e))
            .sum()
    }

    /// Applies a full state snapshot.
    pub fn feed_state(&mut self, state: &ControllerState) -> Result<usize> {
        let events = self.core.process_state(state)?;
        Ok(self.emit(&events))
    }

    /// Changes one button, keeping everything else as last reported.
    pub fn set_button(&mut self, button: u16, down: bool) -> Result<usize> {
        let mut state = self.snapshot();
        let count = self.core.layout().button_count();
        let slot = state
            .buttons
            .get_mut(usize::from(button))
            .ok_or(InputError::InvalidButton { button, count })?;
        *slot = down;
        self.feed_state(&state)
    }

    /// Moves one axis, keeping everything else as last reported.
    pub fn set_axis(&mut self, axis: u16, position: AxisPosition) -> Result<usize> {
        self.core.layout().axis(axis)?;
        let mut state = self.snapshot();
        state.axes[usize::from(axis)] = position;
        self.feed_state(&state)
    }

    pub fn disconnect(&mut self) -> usize {
        let events = self.core.process_disconnect();
        self.emit(&events)
    }

    fn snapshot(&self) -> ControllerState {
        let layout = self.core.layout();
        let mut state = layout.rest_state();
        for (axis, slot) in state.axes.iter_mut().enumerate() {
            if let Ok(pos) = self.core.axis_position(axis as u16) {
                *slot = pos;
            }
        }
        for (button, slot) in state.buttons.iter_mut().enumerate() {
            if let Ok(down) = self.core.is_button_pressed(button as u16) {
                *slot = down;
            }
        }
        state
    }
}

impl Device for VirtualGameController {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::GameController
    }
}

impl GameController for VirtualGameController {
    fn layout(&self) -> &ControllerLayout {
        self.core.layout()
    }

    fn is_button_pressed(&self, button: u16) -> Result<bool> {
        self.core.is_button_pressed(button)
    }

    fn axis_position(&self, axis: u16) -> Result<AxisPosition> {
        self.core.axis_position(axis)
    }

    fn connected(&self) -> bool {
        self.core.connected()
    }

    fn enable_events(&mut self, flag: bool) {
        self.core.set_events_enabled(flag);
    }

    fn events_enabled(&self) -> bool {
        self.core.events_enabled()
    }

    fn listeners(&self) -> &ListenerRegistry<dyn GameControllerListener> {
        &self.listeners
    }

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn GameControllerListener> {
        &mut self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Keys {
        pressed: Vec<u16>,
        released: Vec<u16>,
        npks: Vec<NpKey>,
        chars: String,
        layouts: Vec<String>,
    }

    impl KeyboardListener for Keys {
        fn key_pressed(&mut self, source: &dyn Keyboard, key_num: u16, _scan_code: u32) {
            self.pressed.push(key_num);
            self.layouts.push(source.layout_name());
        }
        fn key_released(&mut self, _source: &dyn Keyboard, key_num: u16, _scan_code: u32) {
            self.released.push(key_num);
        }
        fn char_typed(&mut self, _source: &dyn Keyboard, typed: char) {
            self.chars.push(typed);
        }
        fn non_print_key_typed(&mut self, _source: &dyn Keyboard, key: NpKey) {
            self.npks.push(key);
        }
    }

    fn keyboard() -> VirtualKeyboard {
        VirtualKeyboard::new("kbd:0", "Virtual Keyboard", KeyMap::pc_set1())
    }

    #[test]
    fn keyboard_dispatches_with_source() {
        let mut kb = keyboard();
        let keys = Rc::new(RefCell::new(Keys::default()));
        kb.add_listener(keys.clone());

        assert_eq!(kb.feed_scan_code(0x1E), 1);
        assert!(kb.is_key_pressed(0x1E).unwrap());
        assert_eq!(kb.feed_char('a'), 1);
        assert_eq!(kb.feed_scan_code(0x9E), 1);
        assert_eq!(kb.tap_npk(NpKey::Escape).unwrap(), 3);

        let keys = keys.borrow();
        assert_eq!(keys.pressed, vec![0x1E, 0x01]);
        assert_eq!(keys.released, vec![0x1E, 0x01]);
        assert_eq!(keys.npks, vec![NpKey::Escape]);
        assert_eq!(keys.chars, "a");
        assert_eq!(keys.layouts[0], "pc-set1-us");
    }

    #[test]
    fn disabled_keyboard_tracks_state_silently() {
        let mut kb = keyboard();
        let keys = Rc::new(RefCell::new(Keys::default()));
        kb.add_listener(keys.clone());
        kb.enable_events(false);

        assert_eq!(kb.feed_scan_code(0x1E), 0);
        assert!(kb.is_key_pressed(0x1E).unwrap());
        kb.enable_events(true);
        assert_eq!(kb.feed_scan_code(0x9E), 1);
        assert_eq!(keys.borrow().released, vec![0x1E]);
        assert!(keys.borrow().pressed.is_empty());
    }

    #[test]
    fn layout_change_releases_held_keys() {
        let mut kb = keyboard();
        let keys = Rc::new(RefCell::new(Keys::default()));
        kb.add_listener(keys.clone());
        kb.press_key(0x1E).unwrap();

        let layout = KeyLayout::from_toml_str(
            "name = \"tiny\"\n[[keys]]\nkey_num = 7\npress = 0x1E\nrelease = 0x9E\n",
        )
        .unwrap();
        kb.set_layout(&layout).unwrap();

        assert_eq!(keys.borrow().released, vec![0x1E]);
        assert_eq!(kb.layout_name(), "tiny");
        assert_eq!(kb.key_num_for_scan_code(0x1E), Some(7));
        assert!(matches!(kb.is_key_pressed(0x1E), Err(InputError::UnknownKey(0x1E))));
    }

    #[test]
    fn unknown_key_cannot_be_pressed() {
        let mut kb = keyboard();
        assert!(matches!(kb.press_key(0x7FFF), Err(InputError::UnknownKey(0x7FFF))));
    }

    #[derive(Default)]
    struct Pointer {
        log: Vec<MouseEvent>,
    }

    impl MouseListener for Pointer {
        fn moved(&mut self, _source: &dyn Mouse, x: u32, y: u32) {
            self.log.push(MouseEvent::Moved { x, y });
        }
        fn scrolled(&mut self, _source: &dyn Mouse, direction: mouse::ScrollDirection) {
            self.log.push(MouseEvent::Scrolled(direction));
        }
        fn entered(&mut self, source: &dyn Mouse) {
            assert!(source.is_in_client_area());
            self.log.push(MouseEvent::Entered);
        }
    }

    #[test]
    fn mouse_listener_sees_state_through_source() {
        let mut m = VirtualMouse::new("mouse:0", "Virtual Mouse", &InputConfig::default());
        let p = Rc::new(RefCell::new(Pointer::default()));
        m.add_listener(p.clone());
        m.feed_move(3, 4);
        m.feed_wheel(0, -120);
        assert_eq!(
            p.borrow().log,
            vec![
                MouseEvent::Entered,
                MouseEvent::Moved { x: 3, y: 4 },
                MouseEvent::Scrolled(mouse::ScrollDirection::Down),
            ]
        );
        assert_eq!(m.x().unwrap(), 3);
        assert_eq!(m.y().unwrap(), 4);
    }

    #[test]
    fn cursor_requests_are_recorded() {
        let mut m = VirtualMouse::new("mouse:0", "Virtual Mouse", &InputConfig::default());
        m.set_standard_cursor(StandardCursor::Wait).unwrap();
        m.hide_cursor(true).unwrap();
        m.capture(true).unwrap();
        assert_eq!(m.cursor(), StandardCursor::Wait);
        assert!(m.is_cursor_hidden());
        assert!(m.is_captured());

        let err = m.set_custom_cursor(&42u32).unwrap_err();
        match err {
            InputError::Unsupported { detail, .. } => assert!(!detail.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[derive(Default)]
    struct Pad {
        pressed: Vec<u16>,
        released: Vec<u16>,
        moved: Vec<(u16, AxisPosition)>,
    }

    impl GameControllerListener for Pad {
        fn button_pressed(&mut self, _source: &dyn GameController, button: u16) {
            self.pressed.push(button);
        }
        fn button_released(&mut self, _source: &dyn GameController, button: u16) {
            self.released.push(button);
        }
        fn axis_moved(&mut self, _source: &dyn GameController, axis: u16, delta: AxisPosition) {
            self.moved.push((axis, delta));
        }
    }

    #[test]
    fn controller_setters_merge_with_last_state() {
        let mut pad = VirtualGameController::new(
            "pad:0",
            "Virtual Pad",
            ControllerLayout::gamepad(),
            &InputConfig::default(),
        );
        let rec = Rc::new(RefCell::new(Pad::default()));
        pad.add_listener(rec.clone());

        pad.set_button(0, true).unwrap();
        pad.set_axis(1, AxisPosition::new(-200, 300, 0)).unwrap();
        assert!(pad.is_button_pressed(0).unwrap());
        assert_eq!(pad.disconnect(), 1);
        assert!(!pad.connected());

        let rec = rec.borrow();
        assert_eq!(rec.pressed, vec![0]);
        assert_eq!(rec.released, vec![0]);
        assert_eq!(rec.moved, vec![(1, AxisPosition::new(-200, 300, 0))]);
        assert!(matches!(pad.set_button(99, true), Err(InputError::InvalidButton { .. })));
        assert!(matches!(pad.x_axis_range(9), Err(InputError::InvalidAxis { .. })));
    }
}
