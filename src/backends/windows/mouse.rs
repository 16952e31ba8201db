#![cfg(target_os = "windows")]

//! Mouse bound to a window's client-area messages.

use super::{
    hiword, last_error, loword, point_from_lparam, MessageSink, HTCLIENT, WM_KILLFOCUS,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSELEAVE,
    WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SETCURSOR, WM_SIZE,
    WM_XBUTTONDOWN, WM_XBUTTONUP,
};
use crate::config::InputConfig;
use crate::device::{Device, DeviceKind};
use crate::error::Result;
use crate::mouse::{self, Mouse, MouseCore, MouseEvent, MouseListener, StandardCursor};
use crate::registry::ListenerRegistry;
use windows_sys::Win32::Foundation::{HWND, POINT, RECT};
use windows_sys::Win32::Graphics::Gdi::ClientToScreen;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    ReleaseCapture, SetCapture, TrackMouseEvent, TME_LEAVE, TRACKMOUSEEVENT,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    ClipCursor, GetClientRect, LoadCursorW, SetCursor, ShowCursor, IDC_ARROW, IDC_IBEAM,
    IDC_SIZEALL, IDC_SIZENESW, IDC_SIZENS, IDC_SIZENWSE, IDC_SIZEWE, IDC_WAIT,
};

pub struct Win32Mouse {
    hwnd: HWND,
    id: String,
    name: String,
    core: MouseCore,
    cursor: StandardCursor,
    cursor_hidden: bool,
    /// `WM_MOUSELEAVE` is requested once per stay inside the window.
    tracking_leave: bool,
    listeners: ListenerRegistry<dyn MouseListener>,
}

impl Win32Mouse {
    pub fn new(hwnd: HWND, config: &InputConfig) -> Result<Self> {
        let mut core = MouseCore::new(config.mouse_buttons, config.double_click());
        core.set_client_size(client_size(hwnd).or(config.client_size()));
        core.set_events_enabled(config.events_enabled);
        tracing::info!(hwnd = ?hwnd, client = ?core.client_size(), "mouse bound to window");
        Ok(Self {
            hwnd,
            id: "win32:mouse:0".to_string(),
            name: "System Mouse".to_string(),
            core,
            cursor: StandardCursor::default(),
            cursor_hidden: false,
            tracking_leave: false,
            listeners: ListenerRegistry::new(),
        })
    }

    fn emit(&self, events: &[MouseEvent]) -> usize {
        events.iter().map(|e| mouse::dispatch(self, e)).sum()
    }

    fn track_leave(&mut self) {
        if self.tracking_leave {
            return;
        }
        let mut tme = TRACKMOUSEEVENT {
            cbSize: core::mem::size_of::<TRACKMOUSEEVENT>() as u32,
            dwFlags: TME_LEAVE,
            hwndTrack: self.hwnd,
            dwHoverTime: 0,
        };
        if unsafe { TrackMouseEvent(&mut tme) } != 0 {
            self.tracking_leave = true;
        } else {
            tracing::warn!(error = %last_error("TrackMouseEvent"), "leave tracking failed");
        }
    }

    fn on_button(&mut self, button: u16, down: bool) -> bool {
        match self.core.process_button(button, down) {
            Ok(events) => {
                self.emit(&events);
                true
            }
            Err(e) => {
                tracing::trace!(error = %e, "button outside the configured count");
                false
            }
        }
    }

    fn apply_cursor(&self) -> Result<()> {
        let name = match self.cursor {
            StandardCursor::Normal => IDC_ARROW,
            StandardCursor::TextInput => IDC_IBEAM,
            StandardCursor::Wait => IDC_WAIT,
            StandardCursor::Resize => IDC_SIZEALL,
            StandardCursor::ResizeNwse => IDC_SIZENWSE,
            StandardCursor::ResizeNesw => IDC_SIZENESW,
            StandardCursor::ResizeEw => IDC_SIZEWE,
            StandardCursor::ResizeNs => IDC_SIZENS,
        };
        let handle = unsafe { LoadCursorW(core::ptr::null_mut(), name) };
        if handle.is_null() {
            return Err(last_error("LoadCursorW"));
        }
        unsafe { SetCursor(handle) };
        Ok(())
    }

    /// Clips the pointer to the client rectangle in screen coordinates.
    fn clip_to_client(&self) -> Result<()> {
        let mut rect = RECT { left: 0, top: 0, right: 0, bottom: 0 };
        if unsafe { GetClientRect(self.hwnd, &mut rect) } == 0 {
            return Err(last_error("GetClientRect"));
        }
        let mut top_left = POINT { x: rect.left, y: rect.top };
        let mut bottom_right = POINT { x: rect.right, y: rect.bottom };
        unsafe {
            ClientToScreen(self.hwnd, &mut top_left);
            ClientToScreen(self.hwnd, &mut bottom_right);
        }
        let screen = RECT {
            left: top_left.x,
            top: top_left.y,
            right: bottom_right.x,
            bottom: bottom_right.y,
        };
        if unsafe { ClipCursor(&screen) } == 0 {
            return Err(last_error("ClipCursor"));
        }
        Ok(())
    }
}

fn client_size(hwnd: HWND) -> Option<(u32, u32)> {
    let mut rect = RECT { left: 0, top: 0, right: 0, bottom: 0 };
    if unsafe { GetClientRect(hwnd, &mut rect) } == 0 {
        return None;
    }
    let w = u32::try_from(rect.right - rect.left).ok()?;
    let h = u32::try_from(rect.bottom - rect.top).ok()?;
    Some((w, h))
}

/// Button number and direction of a button message. X buttons are 4 and 5.
fn button_message(msg: u32, wparam: usize) -> Option<(u16, bool)> {
    match msg {
        WM_LBUTTONDOWN => Some((1, true)),
        WM_LBUTTONUP => Some((1, false)),
        WM_RBUTTONDOWN => Some((2, true)),
        WM_RBUTTONUP => Some((2, false)),
        WM_MBUTTONDOWN => Some((3, true)),
        WM_MBUTTONUP => Some((3, false)),
        WM_XBUTTONDOWN | WM_XBUTTONUP => {
            // XBUTTON1 = 1, XBUTTON2 = 2 in the high word.
            let button = match hiword(wparam) {
                1 => 4,
                2 => 5,
                _ => return None,
            };
            Some((button, msg == WM_XBUTTONDOWN))
        }
        _ => None,
    }
}

impl MessageSink for Win32Mouse {
    fn handle_message(&mut self, msg: u32, wparam: usize, lparam: isize) -> bool {
        match msg {
            WM_MOUSEMOVE => {
                self.track_leave();
                let (x, y) = point_from_lparam(lparam);
                let events = self.core.process_move(x, y);
                self.emit(&events);
                true
            }
            WM_MOUSELEAVE => {
                self.tracking_leave = false;
                let events = self.core.process_leave();
                self.emit(&events);
                true
            }
            WM_LBUTTONDOWN | WM_LBUTTONUP | WM_RBUTTONDOWN | WM_RBUTTONUP | WM_MBUTTONDOWN
            | WM_MBUTTONUP | WM_XBUTTONDOWN | WM_XBUTTONUP => match button_message(msg, wparam) {
                Some((button, down)) => self.on_button(button, down),
                None => false,
            },
            WM_MOUSEWHEEL => {
                let delta = i32::from(hiword(wparam) as i16);
                let events = self.core.process_wheel(0, delta);
                self.emit(&events);
                true
            }
            WM_MOUSEHWHEEL => {
                let delta = i32::from(hiword(wparam) as i16);
                let events = self.core.process_wheel(delta, 0);
                self.emit(&events);
                true
            }
            WM_SIZE => {
                let v = lparam as usize;
                self.core
                    .set_client_size(Some((u32::from(loword(v)), u32::from(hiword(v)))));
                if self.core.is_confined() {
                    if let Err(e) = self.clip_to_client() {
                        tracing::warn!(error = %e, "re-clipping after resize failed");
                    }
                }
                false
            }
            WM_SETCURSOR if loword(lparam as usize) == HTCLIENT => {
                if let Err(e) = self.apply_cursor() {
                    tracing::warn!(error = %e, "cursor update failed");
                    return false;
                }
                true
            }
            WM_KILLFOCUS => {
                let events = self.core.release_all();
                self.emit(&events);
                false
            }
            _ => false,
        }
    }
}

impl Device for Win32Mouse {
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

impl Mouse for Win32Mouse {
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

    /// Takes effect immediately while the pointer is inside, and on every
    /// `WM_SETCURSOR` for the client area afterwards.
    fn set_standard_cursor(&mut self, cursor: StandardCursor) -> Result<()> {
        self.cursor = cursor;
        if self.core.is_inside() {
            self.apply_cursor()?;
        }
        Ok(())
    }

    fn hide_cursor(&mut self, hidden: bool) -> Result<()> {
        // ShowCursor keeps a display counter; only touch it on transitions.
        if hidden != self.cursor_hidden {
            unsafe { ShowCursor(i32::from(!hidden)) };
            self.cursor_hidden = hidden;
        }
        Ok(())
    }

    fn capture(&mut self, captured: bool) -> Result<()> {
        if captured {
            unsafe { SetCapture(self.hwnd) };
            if let Err(e) = self.clip_to_client() {
                unsafe { ReleaseCapture() };
                return Err(e);
            }
        } else {
            unsafe { ClipCursor(core::ptr::null()) };
            if unsafe { ReleaseCapture() } == 0 {
                return Err(last_error("ReleaseCapture"));
            }
        }
        self.core.set_confined(captured);
        tracing::debug!(captured, "mouse capture changed");
        Ok(())
    }

    fn message_sink(&mut self) -> Option<&mut dyn MessageSink> {
        Some(self)
    }

    fn listeners(&self) -> &ListenerRegistry<dyn MouseListener> {
        &self.listeners
    }

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn MouseListener> {
        &mut self.listeners
    }
}

impl Drop for Win32Mouse {
    fn drop(&mut self) {
        if self.core.is_confined() {
            unsafe {
                ClipCursor(core::ptr::null());
                ReleaseCapture();
            }
        }
        if self.cursor_hidden {
            unsafe { ShowCursor(1) };
        }
    }
}
