//! Mouse interface, listener contract and the shared mouse state core.
//!
//! ## Conventions
//! - Buttons are numbered from **1** (1 = left, 2 = right, 3 = middle, 4/5 = X buttons).
//! - Positions are client-area coordinates. Coordinates left of or above the client
//!   origin are reported as 0.
//! - Wheel input uses Windows `WHEEL_DELTA` units: 120 per notch, positive = up/right.

use crate::device::Device;
use crate::error::{InputError, Result};
use crate::registry::{ListenerId, ListenerRegistry};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Wheel units per notch.
pub const WHEEL_DELTA: i32 = 120;

/// Most `Scrolled` events one wheel report produces per axis; the rest is dropped.
pub const MAX_WHEEL_NOTCHES: u16 = 64;

/// Scroll directions reported by wheels and tilt wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScrollDirection {
    Up = 1,
    Down,
    Left,
    Right,
}

/// Predefined cursor shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardCursor {
    #[default]
    Normal,
    TextInput,
    Wait,
    /// All-direction resize.
    Resize,
    ResizeNwse,
    ResizeNesw,
    ResizeEw,
    ResizeNs,
}

/// Callbacks for mouse events; all default to no-ops.
///
/// There is no drag callback: a drag is a [`moved`](Self::moved) while
/// [`Mouse::is_button_pressed`] holds.
pub trait MouseListener {
    fn moved(&mut self, _source: &dyn Mouse, _x: u32, _y: u32) {}

    fn button_pressed(&mut self, _source: &dyn Mouse, _button: u16) {}

    fn button_released(&mut self, _source: &dyn Mouse, _button: u16) {}

    /// Press and release inside the client area. `click_count` is 2 for a
    /// double click, 3 for a triple click and so on.
    fn button_clicked(&mut self, _source: &dyn Mouse, _button: u16, _click_count: u16) {}

    fn scrolled(&mut self, _source: &dyn Mouse, _direction: ScrollDirection) {}

    /// The pointer entered the client area.
    fn entered(&mut self, _source: &dyn Mouse) {}

    fn exited(&mut self, _source: &dyn Mouse) {}
}

pub type SharedMouseListener = Rc<RefCell<dyn MouseListener>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MouseEvent {
    Moved { x: u32, y: u32 },
    ButtonPressed(u16),
    ButtonReleased(u16),
    ButtonClicked { button: u16, click_count: u16 },
    Scrolled(ScrollDirection),
    Entered,
    Exited,
}

impl MouseEvent {
    pub fn deliver(&self, source: &dyn Mouse, listener: &mut dyn MouseListener) {
        match *self {
            MouseEvent::Moved { x, y } => listener.moved(source, x, y),
            MouseEvent::ButtonPressed(b) => listener.button_pressed(source, b),
            MouseEvent::ButtonReleased(b) => listener.button_released(source, b),
            MouseEvent::ButtonClicked {
                button,
                click_count,
            } => listener.button_clicked(source, button, click_count),
            MouseEvent::Scrolled(dir) => listener.scrolled(source, dir),
            MouseEvent::Entered => listener.entered(source),
            MouseEvent::Exited => listener.exited(source),
        }
    }
}

/// Capability contract of a mouse.
pub trait Mouse: Device {
    fn enable_events(&mut self, flag: bool);

    fn events_enabled(&self) -> bool;

    /// Current client-area position. Errors until the first position report.
    fn position(&self) -> Result<(u32, u32)>;

    fn x(&self) -> Result<u32> {
        Ok(self.position()?.0)
    }

    fn y(&self) -> Result<u32> {
        Ok(self.position()?.1)
    }

    fn is_in_client_area(&self) -> bool;

    fn button_count(&self) -> u16;

    /// Whether `button` (numbered from 1) is held.
    fn is_button_pressed(&self, button: u16) -> Result<bool>;

    fn set_standard_cursor(&mut self, cursor: StandardCursor) -> Result<()>;

    /// Hook for platform-specific cursors. The payload's meaning is up to the
    /// implementor; the default refuses with [`InputError::Unsupported`].
    fn set_custom_cursor(&mut self, _cursor: &dyn Any) -> Result<()> {
        Err(InputError::unsupported(
            "custom cursors are not implemented by this mouse",
        ))
    }

    fn hide_cursor(&mut self, hidden: bool) -> Result<()>;

    /// Captures (confines to the client area) or releases the pointer.
    fn capture(&mut self, captured: bool) -> Result<()>;

    /// Window-message entry point, for bindings that consume window messages.
    #[cfg(all(feature = "win32", target_os = "windows"))]
    fn message_sink(&mut self) -> Option<&mut dyn crate::backends::windows::MessageSink> {
        None
    }

    fn listeners(&self) -> &ListenerRegistry<dyn MouseListener>;

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn MouseListener>;

    fn add_listener(&mut self, listener: SharedMouseListener) -> ListenerId {
        self.listeners_mut().add_listener(listener)
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners_mut().remove(id)
    }
}

/// Delivers `event` to every listener of `source`. Returns how many were notified.
pub fn dispatch(source: &dyn Mouse, event: &MouseEvent) -> usize {
    if !source.events_enabled() {
        return 0;
    }
    source
        .listeners()
        .dispatch(|listener| event.deliver(source, listener))
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonState {
    down: bool,
    /// Pressed inside the client area; a release inside completes a click.
    armed: bool,
    last_click: Option<Instant>,
    click_count: u16,
}

/// Platform-independent mouse state.
#[derive(Debug, Clone)]
pub struct MouseCore {
    client_size: Option<(u32, u32)>,
    position: Option<(u32, u32)>,
    inside: bool,
    confined: bool,
    buttons: Vec<ButtonState>,
    double_click: Duration,
    wheel_remainder: (i64, i64),
    events_enabled: bool,
}

impl MouseCore {
    pub fn new(button_count: u16, double_click: Duration) -> Self {
        Self {
            client_size: None,
            position: None,
            inside: false,
            confined: false,
            buttons: vec![ButtonState::default(); usize::from(button_count)],
            double_click,
            wheel_remainder: (0, 0),
            events_enabled: true,
        }
    }

    /// Sets the client area size; `None` treats every position as inside.
    pub fn set_client_size(&mut self, size: Option<(u32, u32)>) {
        self.client_size = size.filter(|&(w, h)| w > 0 && h > 0);
    }

    pub fn client_size(&self) -> Option<(u32, u32)> {
        self.client_size
    }

    pub fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    pub fn set_events_enabled(&mut self, flag: bool) {
        self.events_enabled = flag;
    }

    /// While confined, reported positions are clamped into the client area.
    pub fn set_confined(&mut self, confined: bool) {
        self.confined = confined;
    }

    pub fn is_confined(&self) -> bool {
        self.confined
    }

    pub fn position(&self) -> Result<(u32, u32)> {
        self.position.ok_or(InputError::NotInitialized("mouse position"))
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    pub fn button_count(&self) -> u16 {
        self.buttons.len() as u16
    }

    pub fn is_button_pressed(&self, button: u16) -> Result<bool> {
        Ok(self.buttons[self.button_index(button)?].down)
    }

    fn button_index(&self, button: u16) -> Result<usize> {
        let count = self.button_count();
        if button == 0 || button > count {
            return Err(InputError::InvalidButton { button, count });
        }
        Ok(usize::from(button - 1))
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        match self.client_size {
            None => true,
            Some((w, h)) => x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h,
        }
    }

    /// Pointer moved to client coordinates `(x, y)` (may lie outside).
    pub fn process_move(&mut self, x: i32, y: i32) -> Vec<MouseEvent> {
        let mut events = Vec::new();
        let (x, y) = match (self.confined, self.client_size) {
            (true, Some((w, h))) => (x.clamp(0, last_coord(w)), y.clamp(0, last_coord(h))),
            _ => (x, y),
        };

        let inside = self.contains(x, y);
        if inside != self.inside {
            self.inside = inside;
            events.push(if inside {
                MouseEvent::Entered
            } else {
                MouseEvent::Exited
            });
        }

        let pos = (x.max(0) as u32, y.max(0) as u32);
        if self.position != Some(pos) {
            self.position = Some(pos);
            events.push(MouseEvent::Moved { x: pos.0, y: pos.1 });
        }
        events
    }

    /// Pointer left the window (e.g. `WM_MOUSELEAVE`).
    pub fn process_leave(&mut self) -> Vec<MouseEvent> {
        if !self.inside {
            return Vec::new();
        }
        self.inside = false;
        for state in &mut self.buttons {
            state.armed = false;
        }
        vec![MouseEvent::Exited]
    }

    pub fn process_button(&mut self, button: u16, down: bool) -> Result<Vec<MouseEvent>> {
        self.process_button_at(button, down, Instant::now())
    }

    /// Button transition observed at `at`. Repeated transitions in the same
    /// direction are ignored.
    pub fn process_button_at(
        &mut self,
        button: u16,
        down: bool,
        at: Instant,
    ) -> Result<Vec<MouseEvent>> {
        let idx = self.button_index(button)?;
        let inside = self.inside;
        let double_click = self.double_click;
        let state = &mut self.buttons[idx];
        let mut events = Vec::new();

        if state.down == down {
            return Ok(events);
        }
        state.down = down;

        if down {
            state.armed = inside;
            events.push(MouseEvent::ButtonPressed(button));
            return Ok(events);
        }

        events.push(MouseEvent::ButtonReleased(button));
        if state.armed && inside {
            let chained = state
                .last_click
                .is_some_and(|prev| at.saturating_duration_since(prev) <= double_click);
            state.click_count = if chained {
                state.click_count.saturating_add(1)
            } else {
                1
            };
            state.last_click = Some(at);
            events.push(MouseEvent::ButtonClicked {
                button,
                click_count: state.click_count,
            });
        }
        state.armed = false;
        Ok(events)
    }

    /// Wheel motion in `WHEEL_DELTA` units. Partial notches accumulate; at most
    /// [`MAX_WHEEL_NOTCHES`] events are emitted per axis.
    pub fn process_wheel(&mut self, dx: i32, dy: i32) -> Vec<MouseEvent> {
        let mut events = Vec::new();

        let vertical = wheel_notches(&mut self.wheel_remainder.1, dy);
        let direction = if vertical > 0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::Down
        };
        events.extend((0..vertical.unsigned_abs()).map(|_| MouseEvent::Scrolled(direction)));

        let horizontal = wheel_notches(&mut self.wheel_remainder.0, dx);
        let direction = if horizontal > 0 {
            ScrollDirection::Right
        } else {
            ScrollDirection::Left
        };
        events.extend((0..horizontal.unsigned_abs()).map(|_| MouseEvent::Scrolled(direction)));

        events
    }

    /// Releases every held button without producing clicks.
    pub fn release_all(&mut self) -> Vec<MouseEvent> {
        let mut events = Vec::new();
        for (i, state) in self.buttons.iter_mut().enumerate() {
            if state.down {
                state.down = false;
                state.armed = false;
                events.push(MouseEvent::ButtonReleased(i as u16 + 1));
            }
        }
        events
    }
}

/// Largest client coordinate along an axis of `len` pixels.
fn last_coord(len: u32) -> i32 {
    i32::try_from(len.saturating_sub(1)).unwrap_or(i32::MAX)
}

/// Adds `delta` to `remainder` and takes out whole notches, signed.
fn wheel_notches(remainder: &mut i64, delta: i32) -> i64 {
    let step = i64::from(WHEEL_DELTA);
    let max = i64::from(MAX_WHEEL_NOTCHES);
    *remainder += i64::from(delta);
    let notches = *remainder / step;
    *remainder -= notches * step;
    if notches.abs() > max {
        tracing::trace!(notches, "wheel report capped");
    }
    notches.clamp(-max, max)
}
