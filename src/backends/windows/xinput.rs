#![cfg(target_os = "windows")]

//! XInput gamepads (slots 0–3).
//!
//! Uses the [`ControllerLayout::gamepad`] layout with raw XInput ranges:
//! sticks in `-32768..=32767` (y up is positive, as XInput reports it) and
//! triggers in `0..=255`. The D-pad is four ordinary buttons.

use crate::config::InputConfig;
use crate::device::{Device, DeviceKind};
use crate::error::Result;
use crate::game_controller::{
    self, AxisPosition, ControllerCore, ControllerLayout, ControllerState, GameController,
    GameControllerEvent, GameControllerListener,
};
use crate::registry::ListenerRegistry;
use windows_sys::Win32::UI::Input::XboxController::*;

/// Number of XInput user slots.
pub const SLOTS: u32 = 4;

/// Button masks in gamepad layout order.
const BUTTON_MASKS: [u16; 14] = [
    XINPUT_GAMEPAD_A,
    XINPUT_GAMEPAD_B,
    XINPUT_GAMEPAD_X,
    XINPUT_GAMEPAD_Y,
    XINPUT_GAMEPAD_LEFT_SHOULDER,
    XINPUT_GAMEPAD_RIGHT_SHOULDER,
    XINPUT_GAMEPAD_BACK,
    XINPUT_GAMEPAD_START,
    XINPUT_GAMEPAD_LEFT_THUMB,
    XINPUT_GAMEPAD_RIGHT_THUMB,
    XINPUT_GAMEPAD_DPAD_UP,
    XINPUT_GAMEPAD_DPAD_DOWN,
    XINPUT_GAMEPAD_DPAD_LEFT,
    XINPUT_GAMEPAD_DPAD_RIGHT,
];

pub struct XInputController {
    slot: u32,
    id: String,
    name: String,
    core: ControllerCore,
    /// Packet number of the last applied state; unchanged packets are skipped.
    last_packet: Option<u32>,
    listeners: ListenerRegistry<dyn GameControllerListener>,
}

impl XInputController {
    pub fn new(slot: u32, config: &InputConfig) -> Self {
        let mut core = ControllerCore::new(ControllerLayout::gamepad(), config.axis_dead_band);
        core.set_events_enabled(config.events_enabled);
        Self {
            slot,
            id: format!("xinput:{slot}"),
            name: format!("XInput Controller {slot}"),
            core,
            last_packet: None,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    fn emit(&self, events: &[GameControllerEvent]) -> usize {
        events
            .iter()
            .map(|e| game_controller::dispatch(self, e))
            .sum()
    }

    fn to_state(gp: &XINPUT_GAMEPAD) -> ControllerState {
        ControllerState {
            axes: vec![
                AxisPosition::new(i32::from(gp.sThumbLX), i32::from(gp.sThumbLY), 0),
                AxisPosition::new(i32::from(gp.sThumbRX), i32::from(gp.sThumbRY), 0),
                AxisPosition::new(
                    i32::from(gp.bLeftTrigger),
                    i32::from(gp.bRightTrigger),
                    0,
                ),
            ],
            buttons: BUTTON_MASKS
                .iter()
                .map(|&mask| gp.wButtons & mask != 0)
                .collect(),
        }
    }
}

/// One controller per XInput slot, connected or not. Disconnected slots report
/// `connected() == false` until a poll sees a pad.
pub fn detect_controllers(config: &InputConfig) -> Vec<XInputController> {
    (0..SLOTS)
        .map(|slot| {
            let mut pad = XInputController::new(slot, config);
            if let Err(e) = pad.poll() {
                tracing::warn!(slot, error = %e, "initial XInput poll failed");
            }
            pad
        })
        .collect()
}

impl Device for XInputController {
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

impl GameController for XInputController {
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

    /// Reads the slot with `XInputGetState`. A failing call means the pad is
    /// gone: held buttons are released and the controller reads disconnected.
    fn poll(&mut self) -> Result<usize> {
        let mut state: XINPUT_STATE = unsafe { std::mem::zeroed() };
        let res = unsafe { XInputGetState(self.slot, &mut state) };

        if res != 0 {
            if self.core.connected() {
                tracing::info!(slot = self.slot, code = res, "XInput controller disconnected");
            }
            self.last_packet = None;
            let events = self.core.process_disconnect();
            return Ok(self.emit(&events));
        }

        if self.last_packet == Some(state.dwPacketNumber) {
            return Ok(0);
        }
        if self.last_packet.is_none() {
            tracing::info!(slot = self.slot, "XInput controller connected");
        }
        self.last_packet = Some(state.dwPacketNumber);

        let events = self.core.process_state(&Self::to_state(&state.Gamepad))?;
        Ok(self.emit(&events))
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

    #[test]
    fn gamepad_maps_to_layout_order() {
        let mut gp: XINPUT_GAMEPAD = unsafe { std::mem::zeroed() };
        gp.wButtons = XINPUT_GAMEPAD_A | XINPUT_GAMEPAD_DPAD_RIGHT;
        gp.sThumbLX = i16::MIN;
        gp.sThumbLY = i16::MAX;
        gp.sThumbRY = -1;
        gp.bLeftTrigger = 255;

        let state = XInputController::to_state(&gp);
        let pressed: Vec<usize> = (0..state.buttons.len())
            .filter(|&i| state.buttons[i])
            .collect();
        assert_eq!(state.buttons.len(), 14);
        assert_eq!(pressed, vec![0, 13]);
        let layout = ControllerLayout::gamepad();
        assert_eq!(layout.buttons[0], "A");
        assert_eq!(layout.buttons[13], "DPadRight");
        assert_eq!(
            state.axes,
            vec![
                AxisPosition::new(-32768, 32767, 0),
                AxisPosition::new(0, -1, 0),
                AxisPosition::new(255, 0, 0),
            ]
        );
    }

    #[test]
    fn state_matches_gamepad_layout_shape() {
        let gp: XINPUT_GAMEPAD = unsafe { std::mem::zeroed() };
        let state = XInputController::to_state(&gp);
        let layout = ControllerLayout::gamepad();
        assert_eq!(state.axes.len(), layout.axes.len());
        assert_eq!(state.buttons.len(), layout.buttons.len());
    }
}
