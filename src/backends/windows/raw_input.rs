//! Raw Input keyboard decoding.
//!
//! Only keyboard packets are read here; the mouse binding works from ordinary
//! client-area messages. Scan codes come out in the crate's set 1 encoding
//! (see [`crate::keymap`]), so they can be looked up in a [`KeyMap`](crate::keymap::KeyMap)
//! directly.

#![cfg(target_os = "windows")]

use crate::error::Result;
use crate::keymap::set1_scan_code;
use core::ffi::c_void;
use windows_sys::Win32::Foundation::HWND;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_VSC_EX};
use windows_sys::Win32::UI::Input::*;

const RI_KEY_BREAK: u16 = 0x0001;
const RI_KEY_E0: u16 = 0x0002;
const RI_KEY_E1: u16 = 0x0004;

const VK_PAUSE: u16 = 0x13;
/// Virtual key of synthetic packets (fake shifts, the tail of Pause).
const VK_FAKE: u16 = 0xFF;
/// Make code of Pause in the built-in layout (filed as `E0 45`).
const PAUSE_MAKE: u16 = 0x45;

const HID_USAGE_PAGE_GENERIC: u16 = 0x01;
const HID_USAGE_GENERIC_KEYBOARD: u16 = 0x06;

/// The fields of a `RAWKEYBOARD` packet the decoder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawKey {
    pub make_code: u16,
    pub flags: u16,
    pub vkey: u16,
}

/// Subscribes `hwnd` to keyboard `WM_INPUT` messages.
pub(crate) fn register_keyboard(hwnd: HWND) -> Result<()> {
    let device = RAWINPUTDEVICE {
        usUsagePage: HID_USAGE_PAGE_GENERIC,
        usUsage: HID_USAGE_GENERIC_KEYBOARD,
        dwFlags: 0,
        hwndTarget: hwnd,
    };
    let ok = unsafe {
        RegisterRawInputDevices(
            &device,
            1,
            core::mem::size_of::<RAWINPUTDEVICE>() as u32,
        )
    };
    if ok == 0 {
        return Err(super::last_error("RegisterRawInputDevices"));
    }
    Ok(())
}

/// Falls back to the virtual key when a packet carries no make code.
fn vkey_to_make_code(vkey: u16) -> Option<(u16, bool)> {
    // MAPVK_VK_TO_VSC_EX marks extended keys with a 0xE0 high byte.
    let sc = unsafe { MapVirtualKeyW(u32::from(vkey), MAPVK_VK_TO_VSC_EX) };
    if sc == 0 {
        return None;
    }
    if (sc & 0xFF00) == 0xE000 {
        Some(((sc & 0x00FF) as u16, true))
    } else {
        Some((sc as u16, false))
    }
}

/// Reads the `WM_INPUT` payload behind `lparam`, if it is a keyboard packet.
pub(crate) fn read_keyboard_packet(lparam: isize) -> Option<RawKey> {
    let hdr_sz = core::mem::size_of::<RAWINPUTHEADER>() as u32;
    unsafe {
        let mut size: u32 = 0;
        let r0 = GetRawInputData(
            lparam as HRAWINPUT,
            RID_INPUT,
            core::ptr::null_mut(),
            &mut size,
            hdr_sz,
        );
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        let mut buf = vec![0u8; size as usize];
        let r1 = GetRawInputData(
            lparam as HRAWINPUT,
            RID_INPUT,
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            hdr_sz,
        );
        if r1 == u32::MAX {
            return None;
        }
        parse_keyboard_packet(&buf)
    }
}

fn parse_keyboard_packet(buf: &[u8]) -> Option<RawKey> {
    let hdr_sz = core::mem::size_of::<RAWINPUTHEADER>();
    let need = hdr_sz + core::mem::size_of::<RAWKEYBOARD>();
    if buf.len() < need {
        return None;
    }

    unsafe {
        let hdr: RAWINPUTHEADER = core::ptr::read_unaligned(buf.as_ptr() as *const RAWINPUTHEADER);
        if hdr.dwType != RIM_TYPEKEYBOARD {
            return None;
        }
        let kbd: RAWKEYBOARD =
            core::ptr::read_unaligned(buf.as_ptr().add(hdr_sz) as *const RAWKEYBOARD);
        Some(RawKey {
            make_code: kbd.MakeCode,
            flags: kbd.Flags,
            vkey: kbd.VKey,
        })
    }
}

/// Turns raw keyboard packets into set 1 scan codes.
///
/// Pause arrives as two packets (`E1 1D` then `45`); it is reported once as
/// `E0 45` and the tail is dropped. Synthetic packets are dropped too.
#[derive(Debug, Default)]
pub(crate) struct ScanCodeDecoder {
    pause_tail: bool,
}

impl ScanCodeDecoder {
    pub fn decode(&mut self, key: RawKey) -> Option<u32> {
        let is_break = (key.flags & RI_KEY_BREAK) != 0;
        let e1 = (key.flags & RI_KEY_E1) != 0;

        if std::mem::take(&mut self.pause_tail) && !e1 && key.make_code == PAUSE_MAKE {
            return None;
        }
        if e1 || key.vkey == VK_PAUSE {
            self.pause_tail = e1;
            return Some(set1_scan_code(PAUSE_MAKE, true, is_break));
        }
        if key.vkey == VK_FAKE {
            tracing::trace!(make_code = key.make_code, "synthetic key packet dropped");
            return None;
        }

        let extended = (key.flags & RI_KEY_E0) != 0;
        let (make, mapped_ext) = if key.make_code != 0 {
            (key.make_code, false)
        } else {
            vkey_to_make_code(key.vkey)?
        };
        Some(set1_scan_code(make, extended || mapped_ext, is_break))
    }
}
