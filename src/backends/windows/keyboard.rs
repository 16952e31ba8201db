#![cfg(target_os = "windows")]

//! Keyboard bound to a window through Raw Input and `WM_CHAR`.

use super::raw_input::{read_keyboard_packet, register_keyboard, ScanCodeDecoder};
use super::{MessageSink, WM_CHAR, WM_INPUT, WM_KILLFOCUS};
use crate::config::InputConfig;
use crate::device::{Device, DeviceKind};
use crate::error::Result;
use crate::keyboard::{self, Keyboard, KeyboardCore, KeyboardEvent, KeyboardListener, NpKey};
use crate::keymap::{KeyLayout, KeyMap, ScanCodePair};
use crate::registry::ListenerRegistry;
use windows_sys::Win32::Foundation::HWND;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::GetKeyboardLayoutNameW;

const KL_NAMELENGTH: usize = 9;

pub struct Win32Keyboard {
    hwnd: HWND,
    id: String,
    name: String,
    core: KeyboardCore,
    listeners: ListenerRegistry<dyn KeyboardListener>,
    decoder: ScanCodeDecoder,
    chars: Utf16Chars,
}

impl Win32Keyboard {
    /// Registers `hwnd` for raw keyboard input.
    pub fn new(hwnd: HWND, config: &InputConfig) -> Result<Self> {
        register_keyboard(hwnd)?;
        let mut core = KeyboardCore::new(config.key_map()?);
        core.set_events_enabled(config.events_enabled);
        let kb = Self {
            hwnd,
            id: "win32:keyboard:0".to_string(),
            name: "System Keyboard".to_string(),
            core,
            listeners: ListenerRegistry::new(),
            decoder: ScanCodeDecoder::default(),
            chars: Utf16Chars::default(),
        };
        tracing::info!(
            hwnd = ?kb.hwnd,
            layout = %kb.layout_name(),
            "raw keyboard input registered"
        );
        Ok(kb)
    }

    fn emit(&self, events: &[KeyboardEvent]) -> usize {
        events.iter().map(|e| keyboard::dispatch(self, e)).sum()
    }

    fn on_char(&mut self, unit: u16) -> usize {
        match self.chars.push(unit) {
            Some(c) => {
                let events = self.core.process_char(c);
                self.emit(&events)
            }
            None => 0,
        }
    }

    /// Keyboard layout id of the calling thread, e.g. `00000409`.
    fn os_layout_id() -> Option<String> {
        let mut buf = [0u16; KL_NAMELENGTH];
        let ok = unsafe { GetKeyboardLayoutNameW(buf.as_mut_ptr()) };
        if ok == 0 {
            return None;
        }
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        Some(String::from_utf16_lossy(&buf[..len]))
    }
}

impl MessageSink for Win32Keyboard {
    fn handle_message(&mut self, msg: u32, wparam: usize, lparam: isize) -> bool {
        match msg {
            WM_INPUT => match read_keyboard_packet(lparam) {
                Some(raw) => {
                    if let Some(scan_code) = self.decoder.decode(raw) {
                        let events = self.core.process_scan_code(scan_code);
                        self.emit(&events);
                    }
                    true
                }
                None => false,
            },
            WM_CHAR => {
                self.on_char((wparam & 0xFFFF) as u16);
                true
            }
            WM_KILLFOCUS => {
                let events = self.core.release_all();
                self.emit(&events);
                // Other sinks may need focus loss too.
                false
            }
            _ => false,
        }
    }
}

impl Device for Win32Keyboard {
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

impl Keyboard for Win32Keyboard {
    /// Key map name, followed by the OS layout id when available.
    fn layout_name(&self) -> String {
        match Self::os_layout_id() {
            Some(klid) => format!("{} [{klid}]", self.core.keymap().name()),
            None => self.core.keymap().name().to_string(),
        }
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

    fn message_sink(&mut self) -> Option<&mut dyn MessageSink> {
        Some(self)
    }

    fn listeners(&self) -> &ListenerRegistry<dyn KeyboardListener> {
        &self.listeners
    }

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn KeyboardListener> {
        &mut self.listeners
    }
}

/// Joins `WM_CHAR` UTF-16 units into characters.
#[derive(Debug, Default)]
struct Utf16Chars {
    /// Leading half of a surrogate pair split across two messages.
    high: Option<u16>,
}

impl Utf16Chars {
    fn push(&mut self, unit: u16) -> Option<char> {
        match unit {
            0xD800..=0xDBFF => {
                if let Some(stale) = self.high.replace(unit) {
                    tracing::trace!(unit = stale, "unpaired surrogate");
                }
                None
            }
            0xDC00..=0xDFFF => match self.high.take() {
                Some(high) => char::decode_utf16([high, unit]).next()?.ok(),
                None => {
                    tracing::trace!(unit, "unpaired surrogate");
                    None
                }
            },
            _ => {
                if let Some(stale) = self.high.take() {
                    tracing::trace!(unit = stale, "unpaired surrogate");
                }
                char::from_u32(u32::from(unit))
            }
        }
    }
}
