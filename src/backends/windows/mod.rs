#![cfg(target_os = "windows")]

//! Win32 binding.
//!
//! - **Keyboard**: scan codes from Raw Input (`WM_INPUT`), characters from `WM_CHAR`.
//! - **Mouse**: client-area messages (`WM_MOUSEMOVE`, button messages, wheels,
//!   `WM_MOUSELEAVE`), cursors through user32.
//! - **Game controllers**: XInput slots 0–3, polled.
//!
//! The host owns the message loop and forwards `(msg, wparam, lparam)` from its
//! window procedure, either to each device's [`MessageSink`] or to
//! [`DeviceManager::handle_message`](crate::manager::DeviceManager::handle_message).

pub mod keyboard;
pub mod mouse;
pub(crate) mod raw_input;
pub mod xinput;

pub use keyboard::Win32Keyboard;
pub use mouse::Win32Mouse;
pub use xinput::{detect_controllers, XInputController};

/// Consumer of forwarded window messages.
pub trait MessageSink {
    /// Returns `true` if the message was consumed.
    fn handle_message(&mut self, msg: u32, wparam: usize, lparam: isize) -> bool;
}

// Local constants (avoid relying on module exports that vary by windows-sys version)
pub(crate) const WM_SIZE: u32 = 0x0005;
pub(crate) const WM_KILLFOCUS: u32 = 0x0008;
pub(crate) const WM_SETCURSOR: u32 = 0x0020;
pub(crate) const WM_INPUT: u32 = 0x00FF;
pub(crate) const WM_CHAR: u32 = 0x0102;
pub(crate) const WM_MOUSEMOVE: u32 = 0x0200;
pub(crate) const WM_LBUTTONDOWN: u32 = 0x0201;
pub(crate) const WM_LBUTTONUP: u32 = 0x0202;
pub(crate) const WM_RBUTTONDOWN: u32 = 0x0204;
pub(crate) const WM_RBUTTONUP: u32 = 0x0205;
pub(crate) const WM_MBUTTONDOWN: u32 = 0x0207;
pub(crate) const WM_MBUTTONUP: u32 = 0x0208;
pub(crate) const WM_MOUSEWHEEL: u32 = 0x020A;
pub(crate) const WM_XBUTTONDOWN: u32 = 0x020B;
pub(crate) const WM_XBUTTONUP: u32 = 0x020C;
pub(crate) const WM_MOUSEHWHEEL: u32 = 0x020E;
pub(crate) const WM_MOUSELEAVE: u32 = 0x02A3;

/// `HTCLIENT` hit-test code carried in the low word of `WM_SETCURSOR`'s lparam.
pub(crate) const HTCLIENT: u16 = 1;

#[inline]
pub(crate) fn loword(v: usize) -> u16 {
    (v & 0xFFFF) as u16
}

#[inline]
pub(crate) fn hiword(v: usize) -> u16 {
    ((v >> 16) & 0xFFFF) as u16
}

/// Signed client coordinates packed in a mouse message's lparam.
#[inline]
pub(crate) fn point_from_lparam(lparam: isize) -> (i32, i32) {
    let v = lparam as usize;
    (i32::from(loword(v) as i16), i32::from(hiword(v) as i16))
}

pub(crate) fn last_error(call: &'static str) -> crate::error::InputError {
    let code = unsafe { windows_sys::Win32::Foundation::GetLastError() };
    crate::error::InputError::Platform { call, code }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lparam(x: i16, y: i16) -> isize {
        ((u32::from(y as u16) << 16) | u32::from(x as u16)) as i32 as isize
    }

    #[test]
    fn words_split_low_and_high() {
        assert_eq!(loword(0x1234_5678), 0x5678);
        assert_eq!(hiword(0x1234_5678), 0x1234);
    }

    #[test]
    fn points_left_of_and_above_the_client_are_negative() {
        assert_eq!(point_from_lparam(lparam(-5, 7)), (-5, 7));
        assert_eq!(point_from_lparam(lparam(12, -1)), (12, -1));
        assert_eq!(point_from_lparam(lparam(-32768, 32767)), (-32768, 32767));
    }
}
