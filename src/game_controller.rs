//! Game controllers: gamepads, joysticks, wheels, flight yokes.
//!
//! A controller has a fixed number of **axes** and **buttons**, both indexed from 0.
//! Each axis is a stick-like control with up to three components (x, y, z), and
//! every component has its own logical range. Unused components have the range
//! `0..=0`.
//!
//! Bindings report full state snapshots ([`ControllerState`]); the
//! [`ControllerCore`] diffs them against the last snapshot and produces edge
//! events for buttons and delta events for axes.

use crate::device::Device;
use crate::error::{InputError, Result};
use crate::registry::{ListenerId, ListenerRegistry};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ops::Sub;
use std::rc::Rc;

/// Inclusive logical range of one axis component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub const UNUSED: AxisRange = AxisRange { min: 0, max: 0 };

    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min.min(self.max), self.max.max(self.min))
    }

    /// Rest value: 0 when the range spans it, otherwise the minimum (triggers).
    pub fn rest(&self) -> i32 {
        self.clamp(0)
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::UNUSED
    }
}

/// Position (or position delta) of an axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisPosition {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
}

impl AxisPosition {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Largest absolute component.
    pub fn max_abs(&self) -> u32 {
        self.x
            .unsigned_abs()
            .max(self.y.unsigned_abs())
            .max(self.z.unsigned_abs())
    }
}

impl Sub for AxisPosition {
    type Output = AxisPosition;

    fn sub(self, rhs: Self) -> Self::Output {
        AxisPosition {
            x: self.x.saturating_sub(rhs.x),
            y: self.y.saturating_sub(rhs.y),
            z: self.z.saturating_sub(rhs.z),
        }
    }
}

/// Description of one axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub name: String,
    pub x: AxisRange,
    #[serde(default)]
    pub y: AxisRange,
    #[serde(default)]
    pub z: AxisRange,
}

impl AxisSpec {
    pub fn new(name: &str, x: AxisRange, y: AxisRange, z: AxisRange) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
            z,
        }
    }

    fn clamp(&self, pos: AxisPosition) -> AxisPosition {
        AxisPosition {
            x: self.x.clamp(pos.x),
            y: self.y.clamp(pos.y),
            z: self.z.clamp(pos.z),
        }
    }

    fn rest(&self) -> AxisPosition {
        AxisPosition::new(self.x.rest(), self.y.rest(), self.z.rest())
    }
}

/// Axis and button layout of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerLayout {
    pub axes: Vec<AxisSpec>,
    pub buttons: Vec<String>,
}

impl ControllerLayout {
    /// Xbox-style gamepad, raw XInput ranges.
    ///
    /// - axis 0: left stick (x, y), axis 1: right stick (x, y),
    ///   axis 2: triggers (x = left, y = right)
    /// - buttons: A, B, X, Y, LB, RB, Back, Start, LThumb, RThumb,
    ///   DPadUp, DPadDown, DPadLeft, DPadRight
    pub fn gamepad() -> Self {
        const STICK: AxisRange = AxisRange::new(-32768, 32767);
        const TRIGGER: AxisRange = AxisRange::new(0, 255);
        Self {
            axes: vec![
                AxisSpec::new("LeftStick", STICK, STICK, AxisRange::UNUSED),
                AxisSpec::new("RightStick", STICK, STICK, AxisRange::UNUSED),
                AxisSpec::new("Triggers", TRIGGER, TRIGGER, AxisRange::UNUSED),
            ],
            buttons: [
                "A", "B", "X", "Y", "LB", "RB", "Back", "Start", "LThumb", "RThumb", "DPadUp",
                "DPadDown", "DPadLeft", "DPadRight",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    pub fn axes_count(&self) -> u16 {
        self.axes.len() as u16
    }

    pub fn button_count(&self) -> u16 {
        self.buttons.len() as u16
    }

    pub fn axis(&self, axis: u16) -> Result<&AxisSpec> {
        self.axes.get(usize::from(axis)).ok_or(InputError::InvalidAxis {
            axis,
            count: self.axes_count(),
        })
    }

    /// Index of the button called `name`.
    pub fn button_index(&self, name: &str) -> Option<u16> {
        self.buttons.iter().position(|b| b == name).map(|i| i as u16)
    }

    /// All axes at rest, all buttons up.
    pub fn rest_state(&self) -> ControllerState {
        ControllerState {
            axes: self.axes.iter().map(AxisSpec::rest).collect(),
            buttons: vec![false; self.buttons.len()],
        }
    }
}

/// Full controller state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub axes: Vec<AxisPosition>,
    pub buttons: Vec<bool>,
}

/// Callbacks for controller events; all default to no-ops.
pub trait GameControllerListener {
    fn button_pressed(&mut self, _source: &dyn GameController, _button: u16) {}

    fn button_released(&mut self, _source: &dyn GameController, _button: u16) {}

    /// `delta` is the change since the axis was last reported.
    fn axis_moved(&mut self, _source: &dyn GameController, _axis: u16, _delta: AxisPosition) {}
}

pub type SharedGameControllerListener = Rc<RefCell<dyn GameControllerListener>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameControllerEvent {
    ButtonPressed(u16),
    ButtonReleased(u16),
    AxisMoved { axis: u16, delta: AxisPosition },
}

impl GameControllerEvent {
    pub fn deliver(&self, source: &dyn GameController, listener: &mut dyn GameControllerListener) {
        match *self {
            GameControllerEvent::ButtonPressed(b) => listener.button_pressed(source, b),
            GameControllerEvent::ButtonReleased(b) => listener.button_released(source, b),
            GameControllerEvent::AxisMoved { axis, delta } => {
                listener.axis_moved(source, axis, delta)
            }
        }
    }
}

/// Capability contract of a game controller.
///
/// Ranges and counts have default implementations driven by [`layout`](Self::layout).
pub trait GameController: Device {
    fn layout(&self) -> &ControllerLayout;

    fn axes_count(&self) -> u16 {
        self.layout().axes_count()
    }

    fn button_count(&self) -> u16 {
        self.layout().button_count()
    }

    fn x_axis_range(&self, axis: u16) -> Result<AxisRange> {
        Ok(self.layout().axis(axis)?.x)
    }

    fn y_axis_range(&self, axis: u16) -> Result<AxisRange> {
        Ok(self.layout().axis(axis)?.y)
    }

    fn z_axis_range(&self, axis: u16) -> Result<AxisRange> {
        Ok(self.layout().axis(axis)?.z)
    }

    fn is_button_pressed(&self, button: u16) -> Result<bool>;

    fn axis_position(&self, axis: u16) -> Result<AxisPosition>;

    fn connected(&self) -> bool;

    fn enable_events(&mut self, flag: bool);

    fn events_enabled(&self) -> bool;

    /// Polls the platform and dispatches changes. Push-driven controllers
    /// have nothing to poll.
    fn poll(&mut self) -> Result<usize> {
        Ok(0)
    }

    fn listeners(&self) -> &ListenerRegistry<dyn GameControllerListener>;

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn GameControllerListener>;

    fn add_listener(&mut self, listener: SharedGameControllerListener) -> ListenerId {
        self.listeners_mut().add_listener(listener)
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners_mut().remove(id)
    }
}

pub fn dispatch(source: &dyn GameController, event: &GameControllerEvent) -> usize {
    if !source.events_enabled() {
        return 0;
    }
    source
        .listeners()
        .dispatch(|listener| event.deliver(source, listener))
}

/// Platform-independent controller state: diffs snapshots into events.
#[derive(Debug, Clone)]
pub struct ControllerCore {
    layout: ControllerLayout,
    current: Option<ControllerState>,
    /// Last position reported per axis; deltas are measured from here.
    reported: Vec<AxisPosition>,
    dead_band: u32,
    events_enabled: bool,
}

impl ControllerCore {
    pub fn new(layout: ControllerLayout, dead_band: u32) -> Self {
        let reported = layout.rest_state().axes;
        Self {
            layout,
            current: None,
            reported,
            dead_band,
            events_enabled: true,
        }
    }

    pub fn layout(&self) -> &ControllerLayout {
        &self.layout
    }

    pub fn connected(&self) -> bool {
        self.current.is_some()
    }

    pub fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    pub fn set_events_enabled(&mut self, flag: bool) {
        self.events_enabled = flag;
    }

    fn state(&self) -> Result<&ControllerState> {
        self.current
            .as_ref()
            .ok_or(InputError::NotInitialized("controller state"))
    }

    pub fn is_button_pressed(&self, button: u16) -> Result<bool> {
        let count = self.layout.button_count();
        if button >= count {
            return Err(InputError::InvalidButton { button, count });
        }
        Ok(self.state()?.buttons[usize::from(button)])
    }

    pub fn axis_position(&self, axis: u16) -> Result<AxisPosition> {
        self.layout.axis(axis)?;
        Ok(self.state()?.axes[usize::from(axis)])
    }

    /// Applies a full snapshot. Positions are clamped into their ranges.
    ///
    /// Axis events come first (ascending axis), then button edges (ascending
    /// button). An axis is reported once any component moved more than the dead
    /// band from its last reported position.
    pub fn process_state(&mut self, state: &ControllerState) -> Result<Vec<GameControllerEvent>> {
        if state.axes.len() != self.layout.axes.len()
            || state.buttons.len() != self.layout.buttons.len()
        {
            return Err(InputError::SnapshotShape {
                axes: state.axes.len(),
                buttons: state.buttons.len(),
                expected_axes: self.layout.axes.len(),
                expected_buttons: self.layout.buttons.len(),
            });
        }

        let next = ControllerState {
            axes: self
                .layout
                .axes
                .iter()
                .zip(&state.axes)
                .map(|(spec, &pos)| spec.clamp(pos))
                .collect(),
            buttons: state.buttons.clone(),
        };
        let previous = match self.current.take() {
            Some(prev) => prev,
            None => {
                tracing::debug!("controller connected");
                self.layout.rest_state()
            }
        };

        let mut events = Vec::new();
        for (i, &pos) in next.axes.iter().enumerate() {
            let delta = pos - self.reported[i];
            if delta.max_abs() > self.dead_band {
                self.reported[i] = pos;
                events.push(GameControllerEvent::AxisMoved {
                    axis: i as u16,
                    delta,
                });
            }
        }
        for (i, (&was, &now)) in previous.buttons.iter().zip(&next.buttons).enumerate() {
            match (was, now) {
                (false, true) => events.push(GameControllerEvent::ButtonPressed(i as u16)),
                (true, false) => events.push(GameControllerEvent::ButtonReleased(i as u16)),
                _ => {}
            }
        }

        self.current = Some(next);
        Ok(events)
    }

    /// Controller went away: releases held buttons and recenters reporting.
    pub fn process_disconnect(&mut self) -> Vec<GameControllerEvent> {
        let Some(last) = self.current.take() else {
            return Vec::new();
        };
        tracing::debug!("controller disconnected");
        self.reported = self.layout.rest_state().axes;
        last.buttons
            .iter()
            .enumerate()
            .filter(|(_, down)| **down)
            .map(|(i, _)| GameControllerEvent::ButtonReleased(i as u16))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_state(lx: i32, ly: i32, buttons: &[u16]) -> ControllerState {
        let layout = ControllerLayout::gamepad();
        let mut state = layout.rest_state();
        state.axes[0] = AxisPosition::new(lx, ly, 0);
        for &b in buttons {
            state.buttons[usize::from(b)] = true;
        }
        state
    }

    #[test]
    fn gamepad_layout_ranges() {
        let layout = ControllerLayout::gamepad();
        assert_eq!(layout.axes_count(), 3);
        assert_eq!(layout.button_count(), 14);
        assert_eq!(layout.axis(2).unwrap().x, AxisRange::new(0, 255));
        assert_eq!(layout.axis(0).unwrap().z, AxisRange::UNUSED);
        assert!(matches!(layout.axis(3), Err(InputError::InvalidAxis { axis: 3, count: 3 })));
        assert_eq!(layout.button_index("Start"), Some(7));
    }

    #[test]
    fn queries_before_first_state_are_not_initialized() {
        let core = ControllerCore::new(ControllerLayout::gamepad(), 0);
        assert!(!core.connected());
        assert!(matches!(core.axis_position(0), Err(InputError::NotInitialized(_))));
        assert!(matches!(core.is_button_pressed(0), Err(InputError::NotInitialized(_))));
        assert!(matches!(core.is_button_pressed(14), Err(InputError::InvalidButton { .. })));
    }

    #[test]
    fn diff_emits_axis_deltas_then_button_edges() {
        let mut core = ControllerCore::new(ControllerLayout::gamepad(), 0);
        let events = core.process_state(&pad_state(1000, -500, &[0])).unwrap();
        assert_eq!(
            events,
            vec![
                GameControllerEvent::AxisMoved {
                    axis: 0,
                    delta: AxisPosition::new(1000, -500, 0)
                },
                GameControllerEvent::ButtonPressed(0),
            ]
        );

        let events = core.process_state(&pad_state(1500, -500, &[3])).unwrap();
        assert_eq!(
            events,
            vec![
                GameControllerEvent::AxisMoved {
                    axis: 0,
                    delta: AxisPosition::new(500, 0, 0)
                },
                GameControllerEvent::ButtonReleased(0),
                GameControllerEvent::ButtonPressed(3),
            ]
        );
        assert_eq!(core.axis_position(0).unwrap(), AxisPosition::new(1500, -500, 0));
        assert!(core.is_button_pressed(3).unwrap());
    }

    #[test]
    fn dead_band_accumulates_small_moves() {
        let mut core = ControllerCore::new(ControllerLayout::gamepad(), 100);
        assert!(core.process_state(&pad_state(60, 0, &[])).unwrap().is_empty());
        let events = core.process_state(&pad_state(120, 0, &[])).unwrap();
        assert_eq!(
            events,
            vec![GameControllerEvent::AxisMoved {
                axis: 0,
                delta: AxisPosition::new(120, 0, 0)
            }]
        );
    }

    #[test]
    fn positions_are_clamped_to_range() {
        let mut core = ControllerCore::new(ControllerLayout::gamepad(), 0);
        let mut state = ControllerLayout::gamepad().rest_state();
        state.axes[2] = AxisPosition::new(400, -3, 9);
        core.process_state(&state).unwrap();
        assert_eq!(core.axis_position(2).unwrap(), AxisPosition::new(255, 0, 0));
    }

    #[test]
    fn mismatched_snapshot_is_rejected() {
        let mut core = ControllerCore::new(ControllerLayout::gamepad(), 0);
        let state = ControllerState {
            axes: vec![AxisPosition::default()],
            buttons: vec![false; 14],
        };
        let err = core.process_state(&state).unwrap_err();
        assert!(matches!(
            err,
            InputError::SnapshotShape {
                axes: 1,
                buttons: 14,
                expected_axes: 3,
                expected_buttons: 14,
            }
        ));
        assert_eq!(
            err.to_string(),
            "snapshot has 1 axes and 14 buttons, layout expects 3 and 14"
        );

        let short = ControllerState {
            axes: vec![AxisPosition::default(); 3],
            buttons: vec![false; 2],
        };
        assert!(matches!(
            core.process_state(&short),
            Err(InputError::SnapshotShape { buttons: 2, .. })
        ));
        assert!(!core.connected());
    }

    #[test]
    fn disconnect_releases_held_buttons() {
        let mut core = ControllerCore::new(ControllerLayout::gamepad(), 0);
        core.process_state(&pad_state(0, 0, &[1, 5])).unwrap();
        assert_eq!(
            core.process_disconnect(),
            vec![
                GameControllerEvent::ButtonReleased(1),
                GameControllerEvent::ButtonReleased(5),
            ]
        );
        assert!(!core.connected());
        assert!(core.process_disconnect().is_empty());
    }
}
