//! Keyboard interface, listener contract and the shared keyboard state core.
//!
//! Keys are identified three ways:
//! - an abstract **key number** (`u16`) that is stable within a layout,
//! - a **scan code pair** (press/release) as produced by the hardware,
//! - optionally a **non-printable key** ([`NpKey`]) for control keys.
//!
//! The [`KeyMap`] ties these together. Printable text arrives separately as
//! [`KeyboardListener::char_typed`], because composing characters (dead keys,
//! IMEs) is the OS's job.

use crate::device::Device;
use crate::error::{InputError, Result};
use crate::keymap::{KeyLayout, KeyMap, KeyTransition, ScanCodePair};
use crate::registry::{ListenerId, ListenerRegistry};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Keys that produce no printable character.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NpKey {
    Enter = 1,
    LControl,
    RControl,
    LShift,
    RShift,
    RAlt,
    LAlt,
    /// OS key, e.g. the left Windows key.
    LOs,
    ROs,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    Escape,
    Backspace,
    CapsLock,
    NumLock,
    // Numpad keys while the pad is not in num mode.
    NumpadHome,
    NumpadUp,
    NumpadPgUp,
    NumpadLeft,
    NumpadCenter,
    NumpadRight,
    NumpadEnd,
    NumpadDown,
    NumpadPgDn,
    NumpadInsert,
    NumpadDelete,
    NumpadComma,
    ScrollLock,
    SysRq,
    Pause,
    Break,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PgUp,
    PgDown,
    Insert,
    Delete,
    Oem102,
    // Multimedia keyboards.
    PrevTrack,
    Stop,
    Ax,
    NextTrack,
    Mute,
    Calculator,
    PlayPause,
    MediaStop,
    VolumeDown,
    VolumeUp,
    WebHome,
    WebSearch,
    WebFavorites,
    WebRefresh,
    WebStop,
    WebForward,
    WebBack,
    MyComputer,
    Mail,
    MediaSelect,
    Apps,
    Power,
    Sleep,
    Wake,
}

impl NpKey {
    /// Every variant, in declaration order.
    pub const ALL: &'static [NpKey] = &[
        NpKey::Enter,
        NpKey::LControl,
        NpKey::RControl,
        NpKey::LShift,
        NpKey::RShift,
        NpKey::RAlt,
        NpKey::LAlt,
        NpKey::LOs,
        NpKey::ROs,
        NpKey::F1,
        NpKey::F2,
        NpKey::F3,
        NpKey::F4,
        NpKey::F5,
        NpKey::F6,
        NpKey::F7,
        NpKey::F8,
        NpKey::F9,
        NpKey::F10,
        NpKey::F11,
        NpKey::F12,
        NpKey::F13,
        NpKey::F14,
        NpKey::F15,
        NpKey::Escape,
        NpKey::Backspace,
        NpKey::CapsLock,
        NpKey::NumLock,
        NpKey::NumpadHome,
        NpKey::NumpadUp,
        NpKey::NumpadPgUp,
        NpKey::NumpadLeft,
        NpKey::NumpadCenter,
        NpKey::NumpadRight,
        NpKey::NumpadEnd,
        NpKey::NumpadDown,
        NpKey::NumpadPgDn,
        NpKey::NumpadInsert,
        NpKey::NumpadDelete,
        NpKey::NumpadComma,
        NpKey::ScrollLock,
        NpKey::SysRq,
        NpKey::Pause,
        NpKey::Break,
        NpKey::Up,
        NpKey::Down,
        NpKey::Left,
        NpKey::Right,
        NpKey::Home,
        NpKey::End,
        NpKey::PgUp,
        NpKey::PgDown,
        NpKey::Insert,
        NpKey::Delete,
        NpKey::Oem102,
        NpKey::PrevTrack,
        NpKey::Stop,
        NpKey::Ax,
        NpKey::NextTrack,
        NpKey::Mute,
        NpKey::Calculator,
        NpKey::PlayPause,
        NpKey::MediaStop,
        NpKey::VolumeDown,
        NpKey::VolumeUp,
        NpKey::WebHome,
        NpKey::WebSearch,
        NpKey::WebFavorites,
        NpKey::WebRefresh,
        NpKey::WebStop,
        NpKey::WebForward,
        NpKey::WebBack,
        NpKey::MyComputer,
        NpKey::Mail,
        NpKey::MediaSelect,
        NpKey::Apps,
        NpKey::Power,
        NpKey::Sleep,
        NpKey::Wake,
    ];

    /// Stable numeric id (starts at 1).
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Callbacks for keyboard events. Every method defaults to a no-op, so
/// implementors override only what they need.
pub trait KeyboardListener {
    /// A key went down. Each press is eventually matched by a
    /// [`key_released`](Self::key_released).
    fn key_pressed(&mut self, _source: &dyn Keyboard, _key_num: u16, _scan_code: u32) {}

    fn key_released(&mut self, _source: &dyn Keyboard, _key_num: u16, _scan_code: u32) {}

    /// A printable character was produced. Not 1:1 with key presses (dead keys).
    fn char_typed(&mut self, _source: &dyn Keyboard, _typed: char) {}

    /// A non-printable key was typed; repeats while the key is held.
    fn non_print_key_typed(&mut self, _source: &dyn Keyboard, _key: NpKey) {}
}

/// Shared, application-owned keyboard listener handle.
pub type SharedKeyboardListener = Rc<RefCell<dyn KeyboardListener>>;

/// Transient keyboard notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyboardEvent {
    KeyPressed { key_num: u16, scan_code: u32 },
    KeyReleased { key_num: u16, scan_code: u32 },
    CharTyped(char),
    NonPrintKeyTyped(NpKey),
}

impl KeyboardEvent {
    /// Invokes the matching callback on `listener`.
    pub fn deliver(&self, source: &dyn Keyboard, listener: &mut dyn KeyboardListener) {
        match *self {
            KeyboardEvent::KeyPressed { key_num, scan_code } => {
                listener.key_pressed(source, key_num, scan_code)
            }
            KeyboardEvent::KeyReleased { key_num, scan_code } => {
                listener.key_released(source, key_num, scan_code)
            }
            KeyboardEvent::CharTyped(c) => listener.char_typed(source, c),
            KeyboardEvent::NonPrintKeyTyped(key) => listener.non_print_key_typed(source, key),
        }
    }
}

/// Capability contract of a keyboard.
pub trait Keyboard: Device {
    /// Name of the active layout.
    fn layout_name(&self) -> String;

    /// Turns event dispatch on or off. State keeps being tracked either way.
    fn enable_events(&mut self, flag: bool);

    fn events_enabled(&self) -> bool;

    /// Whether the key is down right now. Unmapped key numbers are an error.
    fn is_key_pressed(&self, key_num: u16) -> Result<bool>;

    /// Press/release scan codes for a key number.
    fn scan_codes_for_key_num(&self, key_num: u16) -> Option<ScanCodePair>;

    /// Key number for either scan code of a pair.
    fn key_num_for_scan_code(&self, scan_code: u32) -> Option<u16>;

    fn npk_for_key_num(&self, key_num: u16) -> Option<NpKey>;

    fn key_num_for_npk(&self, npk: NpKey) -> Option<u16>;

    /// Replaces the active layout. Held keys are reported released first, and
    /// previously obtained mappings may no longer hold.
    fn set_layout(&mut self, layout: &KeyLayout) -> Result<()>;

    /// Window-message entry point, for bindings that consume window messages.
    #[cfg(all(feature = "win32", target_os = "windows"))]
    fn message_sink(&mut self) -> Option<&mut dyn crate::backends::windows::MessageSink> {
        None
    }

    fn listeners(&self) -> &ListenerRegistry<dyn KeyboardListener>;

    fn listeners_mut(&mut self) -> &mut ListenerRegistry<dyn KeyboardListener>;

    /// Registers a listener (set semantics; the keyboard does not own it).
    fn add_listener(&mut self, listener: SharedKeyboardListener) -> ListenerId {
        self.listeners_mut().add_listener(listener)
    }

    /// Deregisters a listener. Must happen before the listener is dropped.
    fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners_mut().remove(id)
    }
}

/// Delivers `event` to every listener of `source`, in registration order.
///
/// Returns how many listeners were notified (0 while events are disabled).
pub fn dispatch(source: &dyn Keyboard, event: &KeyboardEvent) -> usize {
    if !source.events_enabled() {
        return 0;
    }
    source
        .listeners()
        .dispatch(|listener| event.deliver(source, listener))
}

/// Platform-independent keyboard state: active key map, held keys and the
/// events flag. Bindings feed it raw scan codes and dispatch what it returns.
#[derive(Debug, Clone)]
pub struct KeyboardCore {
    keymap: KeyMap,
    pressed: BTreeSet<u16>,
    events_enabled: bool,
}

impl KeyboardCore {
    pub fn new(keymap: KeyMap) -> Self {
        Self {
            keymap,
            pressed: BTreeSet::new(),
            events_enabled: true,
        }
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    pub fn set_events_enabled(&mut self, flag: bool) {
        self.events_enabled = flag;
    }

    pub fn is_pressed(&self, key_num: u16) -> Result<bool> {
        if !self.keymap.contains(key_num) {
            return Err(InputError::UnknownKey(key_num));
        }
        Ok(self.pressed.contains(&key_num))
    }

    /// Key numbers currently held, ascending.
    pub fn pressed_keys(&self) -> impl Iterator<Item = u16> + '_ {
        self.pressed.iter().copied()
    }

    /// Swaps the key map. Returns releases for every key that was held.
    pub fn set_keymap(&mut self, keymap: KeyMap) -> Vec<KeyboardEvent> {
        let released = self.release_all();
        tracing::debug!(layout = keymap.name(), "keyboard layout changed");
        self.keymap = keymap;
        released
    }

    /// Decodes one raw scan code into events.
    ///
    /// - press of an idle key: `KeyPressed`, then `NonPrintKeyTyped` for NPKs
    /// - press of a held key (auto-repeat): only `NonPrintKeyTyped`
    /// - release of a held key: `KeyReleased`
    /// - unmapped codes and releases of idle keys are ignored
    pub fn process_scan_code(&mut self, scan_code: u32) -> Vec<KeyboardEvent> {
        let mut events = Vec::new();
        let Some((key_num, transition)) = self.keymap.transition(scan_code) else {
            tracing::trace!(scan_code = format_args!("{scan_code:#x}"), "unmapped scan code");
            return events;
        };

        match transition {
            KeyTransition::Press => {
                if self.pressed.insert(key_num) {
                    events.push(KeyboardEvent::KeyPressed { key_num, scan_code });
                }
                if let Some(npk) = self.keymap.npk(key_num) {
                    events.push(KeyboardEvent::NonPrintKeyTyped(npk));
                }
            }
            KeyTransition::Release => {
                if self.pressed.remove(&key_num) {
                    events.push(KeyboardEvent::KeyReleased { key_num, scan_code });
                } else {
                    tracing::trace!(key_num, "release of a key that was not down");
                }
            }
        }
        events
    }

    pub fn process_char(&mut self, typed: char) -> Vec<KeyboardEvent> {
        vec![KeyboardEvent::CharTyped(typed)]
    }

    /// Releases every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) -> Vec<KeyboardEvent> {
        let held = std::mem::take(&mut self.pressed);
        held.into_iter()
            .filter_map(|key_num| {
                self.keymap
                    .scan_codes(key_num)
                    .map(|pair| KeyboardEvent::KeyReleased {
                        key_num,
                        scan_code: pair.release,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{KeyEntry, KeyLayout};

    fn small_map() -> KeyMap {
        let layout = KeyLayout {
            name: "test".into(),
            keys: vec![
                KeyEntry::new(1, 0x1E, 0x9E, None, Some("a")),
                KeyEntry::new(2, 0x1C, 0x9C, Some(NpKey::Enter), Some("Enter")),
            ],
        };
        KeyMap::from_layout(&layout).expect("valid layout")
    }

    #[test]
    fn press_then_release() {
        let mut core = KeyboardCore::new(small_map());
        assert_eq!(
            core.process_scan_code(0x1E),
            vec![KeyboardEvent::KeyPressed { key_num: 1, scan_code: 0x1E }]
        );
        assert!(core.is_pressed(1).unwrap());
        assert_eq!(
            core.process_scan_code(0x9E),
            vec![KeyboardEvent::KeyReleased { key_num: 1, scan_code: 0x9E }]
        );
        assert!(!core.is_pressed(1).unwrap());
    }

    #[test]
    fn npk_press_also_types() {
        let mut core = KeyboardCore::new(small_map());
        assert_eq!(
            core.process_scan_code(0x1C),
            vec![
                KeyboardEvent::KeyPressed { key_num: 2, scan_code: 0x1C },
                KeyboardEvent::NonPrintKeyTyped(NpKey::Enter),
            ]
        );
    }

    #[test]
    fn auto_repeat_does_not_duplicate_press() {
        let mut core = KeyboardCore::new(small_map());
        core.process_scan_code(0x1C);
        assert_eq!(
            core.process_scan_code(0x1C),
            vec![KeyboardEvent::NonPrintKeyTyped(NpKey::Enter)]
        );
        assert!(core.process_scan_code(0x1E).len() == 1);
        assert!(core.process_scan_code(0x1E).is_empty());
    }

    #[test]
    fn stray_release_and_unknown_codes_are_ignored() {
        let mut core = KeyboardCore::new(small_map());
        assert!(core.process_scan_code(0x9E).is_empty());
        assert!(core.process_scan_code(0x42).is_empty());
    }

    #[test]
    fn unknown_key_query_is_an_error() {
        let core = KeyboardCore::new(small_map());
        assert!(matches!(core.is_pressed(99), Err(InputError::UnknownKey(99))));
    }

    #[test]
    fn release_all_reports_held_keys() {
        let mut core = KeyboardCore::new(small_map());
        core.process_scan_code(0x1E);
        core.process_scan_code(0x1C);
        let released = core.release_all();
        assert_eq!(
            released,
            vec![
                KeyboardEvent::KeyReleased { key_num: 1, scan_code: 0x9E },
                KeyboardEvent::KeyReleased { key_num: 2, scan_code: 0x9C },
            ]
        );
        assert_eq!(core.pressed_keys().count(), 0);
    }

    #[test]
    fn npk_codes_are_dense_from_one() {
        for (i, key) in NpKey::ALL.iter().enumerate() {
            assert_eq!(key.code() as usize, i + 1);
        }
    }
}
