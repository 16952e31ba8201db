//! Key mapping tables.
//!
//! A [`KeyLayout`] is the serializable description (TOML or JSON); a [`KeyMap`]
//! is the validated, indexed form used at runtime. Within one map the association
//! key number ⇄ scan code pair ⇄ NPK is a bijection: building a map rejects any
//! duplicate key number, scan code or NPK.
//!
//! ## Scan code encoding
//! Scan codes are `u32`. Single-byte codes are stored as-is; prefixed codes keep
//! the prefix in the next byte up, so extended (`E0`) keys look like `0xE0nn`.
//! The built-in layout ([`KeyLayout::pc_set1`]) follows IBM PC scan code set 1,
//! where a release code is the press code with bit 7 set.

use crate::error::{InputError, Result};
use crate::keyboard::NpKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Set 1 prefix for extended keys.
pub const EXTENDED_PREFIX: u32 = 0xE0;
/// Set 1 break bit.
pub const BREAK_BIT: u32 = 0x80;

/// Scan codes sent when a key is pressed and released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanCodePair {
    pub press: u32,
    pub release: u32,
}

/// Whether a scan code is the press or the release half of its pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Press,
    Release,
}

/// Builds a set 1 scan code from its parts (as reported by e.g. Raw Input).
pub fn set1_scan_code(make_code: u16, extended: bool, is_break: bool) -> u32 {
    let mut code = u32::from(make_code & 0x7F);
    if is_break {
        code |= BREAK_BIT;
    }
    if extended {
        code |= EXTENDED_PREFIX << 8;
    }
    code
}

/// Key number used by the built-in layout: the make code, with bit 15 set for
/// extended keys.
pub fn set1_key_num(make_code: u16, extended: bool) -> u16 {
    let mut num = make_code & 0x7FFF;
    if extended {
        num |= 0x8000;
    }
    num
}

/// One row of a layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key_num: u16,
    pub press: u32,
    pub release: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npk: Option<NpKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl KeyEntry {
    pub fn new(
        key_num: u16,
        press: u32,
        release: u32,
        npk: Option<NpKey>,
        label: Option<&str>,
    ) -> Self {
        Self {
            key_num,
            press,
            release,
            npk,
            label: label.map(str::to_string),
        }
    }

    pub fn scan_codes(&self) -> ScanCodePair {
        ScanCodePair {
            press: self.press,
            release: self.release,
        }
    }
}

/// Serializable keyboard layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLayout {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

impl KeyLayout {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a layout file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let layout = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text)?,
            _ => Self::from_toml_str(&text)?,
        };
        tracing::info!(
            path = %path.display(),
            name = %layout.name,
            keys = layout.keys.len(),
            "loaded key layout"
        );
        Ok(layout)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| InputError::Layout(e.to_string()))
    }

    /// US QWERTY on IBM PC scan code set 1.
    pub fn pc_set1() -> Self {
        let keys = PC_SET1
            .iter()
            .map(|&(make, extended, npk, label)| {
                KeyEntry::new(
                    set1_key_num(make, extended),
                    set1_scan_code(make, extended, false),
                    set1_scan_code(make, extended, true),
                    npk,
                    Some(label),
                )
            })
            .collect();
        Self {
            name: "pc-set1-us".to_string(),
            keys,
        }
    }
}

/// Validated bidirectional key mapping.
#[derive(Debug, Clone)]
pub struct KeyMap {
    name: String,
    by_key: HashMap<u16, KeyEntry>,
    by_scan: HashMap<u32, (u16, KeyTransition)>,
    by_npk: HashMap<NpKey, u16>,
}

impl KeyMap {
    pub fn from_layout(layout: &KeyLayout) -> Result<Self> {
        let mut map = KeyMap {
            name: layout.name.clone(),
            by_key: HashMap::with_capacity(layout.keys.len()),
            by_scan: HashMap::with_capacity(layout.keys.len() * 2),
            by_npk: HashMap::new(),
        };

        for entry in &layout.keys {
            if entry.press == entry.release {
                return Err(InputError::Layout(format!(
                    "key {:#06x} uses {:#x} for both press and release",
                    entry.key_num, entry.press
                )));
            }
            if map.by_key.contains_key(&entry.key_num) {
                return Err(InputError::Layout(format!(
                    "key number {:#06x} is mapped twice",
                    entry.key_num
                )));
            }
            for (code, transition) in [
                (entry.press, KeyTransition::Press),
                (entry.release, KeyTransition::Release),
            ] {
                if let Some((other, _)) = map.by_scan.insert(code, (entry.key_num, transition)) {
                    return Err(InputError::Layout(format!(
                        "scan code {code:#x} is used by keys {other:#06x} and {:#06x}",
                        entry.key_num
                    )));
                }
            }
            if let Some(npk) = entry.npk {
                if let Some(other) = map.by_npk.insert(npk, entry.key_num) {
                    return Err(InputError::Layout(format!(
                        "{npk:?} is mapped to keys {other:#06x} and {:#06x}",
                        entry.key_num
                    )));
                }
            }
            map.by_key.insert(entry.key_num, entry.clone());
        }

        Ok(map)
    }

    /// The built-in PC set 1 map.
    pub fn pc_set1() -> Self {
        // The built-in table is checked by `builtin_layout_is_consistent`.
        match Self::from_layout(&KeyLayout::pc_set1()) {
            Ok(map) => map,
            Err(e) => unreachable!("built-in layout is inconsistent: {e}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn contains(&self, key_num: u16) -> bool {
        self.by_key.contains_key(&key_num)
    }

    pub fn scan_codes(&self, key_num: u16) -> Option<ScanCodePair> {
        self.by_key.get(&key_num).map(KeyEntry::scan_codes)
    }

    /// Key number for a press or release code.
    pub fn key_num_for_scan_code(&self, scan_code: u32) -> Option<u16> {
        self.by_scan.get(&scan_code).map(|&(key, _)| key)
    }

    /// Key number and direction for a scan code.
    pub fn transition(&self, scan_code: u32) -> Option<(u16, KeyTransition)> {
        self.by_scan.get(&scan_code).copied()
    }

    pub fn npk(&self, key_num: u16) -> Option<NpKey> {
        self.by_key.get(&key_num).and_then(|e| e.npk)
    }

    pub fn key_num_for_npk(&self, npk: NpKey) -> Option<u16> {
        self.by_npk.get(&npk).copied()
    }

    pub fn label(&self, key_num: u16) -> Option<&str> {
        self.by_key.get(&key_num).and_then(|e| e.label.as_deref())
    }

    /// Entries in ascending key number order.
    pub fn entries(&self) -> Vec<&KeyEntry> {
        let mut out: Vec<&KeyEntry> = self.by_key.values().collect();
        out.sort_by_key(|e| e.key_num);
        out
    }
}

// (make code, extended, npk, label)
#[rustfmt::skip]
const PC_SET1: &[(u16, bool, Option<NpKey>, &str)] = &[
    (0x01, false, Some(NpKey::Escape), "Esc"),
    (0x02, false, None, "1"), (0x03, false, None, "2"), (0x04, false, None, "3"),
    (0x05, false, None, "4"), (0x06, false, None, "5"), (0x07, false, None, "6"),
    (0x08, false, None, "7"), (0x09, false, None, "8"), (0x0A, false, None, "9"),
    (0x0B, false, None, "0"), (0x0C, false, None, "-"), (0x0D, false, None, "="),
    (0x0E, false, Some(NpKey::Backspace), "Backspace"),
    (0x0F, false, None, "Tab"),
    (0x10, false, None, "Q"), (0x11, false, None, "W"), (0x12, false, None, "E"),
    (0x13, false, None, "R"), (0x14, false, None, "T"), (0x15, false, None, "Y"),
    (0x16, false, None, "U"), (0x17, false, None, "I"), (0x18, false, None, "O"),
    (0x19, false, None, "P"), (0x1A, false, None, "["), (0x1B, false, None, "]"),
    (0x1C, false, Some(NpKey::Enter), "Enter"),
    (0x1D, false, Some(NpKey::LControl), "LCtrl"),
    (0x1E, false, None, "A"), (0x1F, false, None, "S"), (0x20, false, None, "D"),
    (0x21, false, None, "F"), (0x22, false, None, "G"), (0x23, false, None, "H"),
    (0x24, false, None, "J"), (0x25, false, None, "K"), (0x26, false, None, "L"),
    (0x27, false, None, ";"), (0x28, false, None, "'"), (0x29, false, None, "`"),
    (0x2A, false, Some(NpKey::LShift), "LShift"),
    (0x2B, false, None, "\\"),
    (0x2C, false, None, "Z"), (0x2D, false, None, "X"), (0x2E, false, None, "C"),
    (0x2F, false, None, "V"), (0x30, false, None, "B"), (0x31, false, None, "N"),
    (0x32, false, None, "M"), (0x33, false, None, ","), (0x34, false, None, "."),
    (0x35, false, None, "/"),
    (0x36, false, Some(NpKey::RShift), "RShift"),
    (0x37, false, None, "KP*"),
    (0x38, false, Some(NpKey::LAlt), "LAlt"),
    (0x39, false, None, "Space"),
    (0x3A, false, Some(NpKey::CapsLock), "CapsLock"),
    (0x3B, false, Some(NpKey::F1), "F1"), (0x3C, false, Some(NpKey::F2), "F2"),
    (0x3D, false, Some(NpKey::F3), "F3"), (0x3E, false, Some(NpKey::F4), "F4"),
    (0x3F, false, Some(NpKey::F5), "F5"), (0x40, false, Some(NpKey::F6), "F6"),
    (0x41, false, Some(NpKey::F7), "F7"), (0x42, false, Some(NpKey::F8), "F8"),
    (0x43, false, Some(NpKey::F9), "F9"), (0x44, false, Some(NpKey::F10), "F10"),
    (0x45, false, Some(NpKey::NumLock), "NumLock"),
    (0x46, false, Some(NpKey::ScrollLock), "ScrollLock"),
    (0x47, false, Some(NpKey::NumpadHome), "KP7"),
    (0x48, false, Some(NpKey::NumpadUp), "KP8"),
    (0x49, false, Some(NpKey::NumpadPgUp), "KP9"),
    (0x4A, false, None, "KP-"),
    (0x4B, false, Some(NpKey::NumpadLeft), "KP4"),
    (0x4C, false, Some(NpKey::NumpadCenter), "KP5"),
    (0x4D, false, Some(NpKey::NumpadRight), "KP6"),
    (0x4E, false, None, "KP+"),
    (0x4F, false, Some(NpKey::NumpadEnd), "KP1"),
    (0x50, false, Some(NpKey::NumpadDown), "KP2"),
    (0x51, false, Some(NpKey::NumpadPgDn), "KP3"),
    (0x52, false, Some(NpKey::NumpadInsert), "KP0"),
    (0x53, false, Some(NpKey::NumpadDelete), "KP."),
    (0x56, false, Some(NpKey::Oem102), "OEM102"),
    (0x57, false, Some(NpKey::F11), "F11"),
    (0x58, false, Some(NpKey::F12), "F12"),
    (0x64, false, Some(NpKey::F13), "F13"),
    (0x65, false, Some(NpKey::F14), "F14"),
    (0x66, false, Some(NpKey::F15), "F15"),
    (0x10, true, Some(NpKey::PrevTrack), "PrevTrack"),
    (0x15, true, Some(NpKey::Stop), "Stop"),
    (0x16, true, Some(NpKey::Ax), "AX"),
    (0x19, true, Some(NpKey::NextTrack), "NextTrack"),
    (0x1C, true, None, "KPEnter"),
    (0x1D, true, Some(NpKey::RControl), "RCtrl"),
    (0x20, true, Some(NpKey::Mute), "Mute"),
    (0x21, true, Some(NpKey::Calculator), "Calculator"),
    (0x22, true, Some(NpKey::PlayPause), "PlayPause"),
    (0x24, true, Some(NpKey::MediaStop), "MediaStop"),
    (0x2E, true, Some(NpKey::VolumeDown), "VolumeDown"),
    (0x30, true, Some(NpKey::VolumeUp), "VolumeUp"),
    (0x32, true, Some(NpKey::WebHome), "WebHome"),
    (0x33, true, Some(NpKey::NumpadComma), "KP,"),
    (0x35, true, None, "KP/"),
    (0x37, true, Some(NpKey::SysRq), "PrintScreen"),
    (0x38, true, Some(NpKey::RAlt), "RAlt"),
    (0x45, true, Some(NpKey::Pause), "Pause"),
    (0x46, true, Some(NpKey::Break), "Break"),
    (0x47, true, Some(NpKey::Home), "Home"),
    (0x48, true, Some(NpKey::Up), "Up"),
    (0x49, true, Some(NpKey::PgUp), "PgUp"),
    (0x4B, true, Some(NpKey::Left), "Left"),
    (0x4D, true, Some(NpKey::Right), "Right"),
    (0x4F, true, Some(NpKey::End), "End"),
    (0x50, true, Some(NpKey::Down), "Down"),
    (0x51, true, Some(NpKey::PgDown), "PgDown"),
    (0x52, true, Some(NpKey::Insert), "Insert"),
    (0x53, true, Some(NpKey::Delete), "Delete"),
    (0x5B, true, Some(NpKey::LOs), "LWin"),
    (0x5C, true, Some(NpKey::ROs), "RWin"),
    (0x5D, true, Some(NpKey::Apps), "Apps"),
    (0x5E, true, Some(NpKey::Power), "Power"),
    (0x5F, true, Some(NpKey::Sleep), "Sleep"),
    (0x63, true, Some(NpKey::Wake), "Wake"),
    (0x65, true, Some(NpKey::WebSearch), "WebSearch"),
    (0x66, true, Some(NpKey::WebFavorites), "WebFavorites"),
    (0x67, true, Some(NpKey::WebRefresh), "WebRefresh"),
    (0x68, true, Some(NpKey::WebStop), "WebStop"),
    (0x69, true, Some(NpKey::WebForward), "WebForward"),
    (0x6A, true, Some(NpKey::WebBack), "WebBack"),
    (0x6B, true, Some(NpKey::MyComputer), "MyComputer"),
    (0x6C, true, Some(NpKey::Mail), "Mail"),
    (0x6D, true, Some(NpKey::MediaSelect), "MediaSelect"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_layout_is_consistent() {
        let map = KeyMap::from_layout(&KeyLayout::pc_set1()).expect("builtin layout");
        assert_eq!(map.len(), PC_SET1.len());
    }

    #[test]
    fn builtin_layout_covers_every_npk() {
        let map = KeyMap::pc_set1();
        for &npk in NpKey::ALL {
            assert!(map.key_num_for_npk(npk).is_some(), "{npk:?} is unmapped");
        }
    }

    #[test]
    fn scan_code_round_trip_for_every_key() {
        let map = KeyMap::pc_set1();
        for entry in map.entries() {
            let pair = map.scan_codes(entry.key_num).expect("mapped");
            assert_eq!(map.key_num_for_scan_code(pair.press), Some(entry.key_num));
            assert_eq!(map.key_num_for_scan_code(pair.release), Some(entry.key_num));
            assert_eq!(map.transition(pair.press), Some((entry.key_num, KeyTransition::Press)));
            assert_eq!(
                map.transition(pair.release),
                Some((entry.key_num, KeyTransition::Release))
            );
        }
    }

    #[test]
    fn npk_round_trip_and_explicit_absence() {
        let map = KeyMap::pc_set1();
        for entry in map.entries() {
            match map.npk(entry.key_num) {
                Some(npk) => assert_eq!(map.key_num_for_npk(npk), Some(entry.key_num)),
                None => assert!(entry.npk.is_none()),
            }
        }
        // "A" is printable
        assert_eq!(map.npk(0x1E), None);
        assert_eq!(map.npk(0x7777), None);
    }

    #[test]
    fn set1_encoding() {
        assert_eq!(set1_scan_code(0x1E, false, false), 0x1E);
        assert_eq!(set1_scan_code(0x1E, false, true), 0x9E);
        assert_eq!(set1_scan_code(0x48, true, false), 0xE048);
        assert_eq!(set1_scan_code(0x48, true, true), 0xE0C8);
        assert_eq!(set1_key_num(0x48, true), 0x8048);

        let map = KeyMap::pc_set1();
        assert_eq!(map.npk(0x8048), Some(NpKey::Up));
        assert_eq!(map.npk(0x48), Some(NpKey::NumpadUp));
    }

    #[test]
    fn duplicate_scan_code_is_rejected() {
        let layout = KeyLayout {
            name: "broken".into(),
            keys: vec![
                KeyEntry::new(1, 0x10, 0x90, None, None),
                KeyEntry::new(2, 0x11, 0x90, None, None),
            ],
        };
        assert!(matches!(KeyMap::from_layout(&layout), Err(InputError::Layout(_))));
    }

    #[test]
    fn duplicate_key_num_and_npk_are_rejected() {
        let dup_key = KeyLayout {
            name: "dup-key".into(),
            keys: vec![
                KeyEntry::new(1, 0x10, 0x90, None, None),
                KeyEntry::new(1, 0x11, 0x91, None, None),
            ],
        };
        assert!(KeyMap::from_layout(&dup_key).is_err());

        let dup_npk = KeyLayout {
            name: "dup-npk".into(),
            keys: vec![
                KeyEntry::new(1, 0x10, 0x90, Some(NpKey::F1), None),
                KeyEntry::new(2, 0x11, 0x91, Some(NpKey::F1), None),
            ],
        };
        assert!(KeyMap::from_layout(&dup_npk).is_err());

        let same_codes = KeyLayout {
            name: "same".into(),
            keys: vec![KeyEntry::new(1, 0x10, 0x10, None, None)],
        };
        assert!(KeyMap::from_layout(&same_codes).is_err());
    }

    #[test]
    fn layout_from_toml() {
        let text = r#"
            name = "mini"

            [[keys]]
            key_num = 1
            press = 0x1C
            release = 0x9C
            npk = "Enter"

            [[keys]]
            key_num = 2
            press = 0x1E
            release = 0x9E
            label = "A"
        "#;
        let layout = KeyLayout::from_toml_str(text).expect("parse");
        let map = KeyMap::from_layout(&layout).expect("valid");
        assert_eq!(map.name(), "mini");
        assert_eq!(map.key_num_for_npk(NpKey::Enter), Some(1));
        assert_eq!(map.label(2), Some("A"));
    }

    #[test]
    fn layout_from_json() {
        let text = r#"{"name":"j","keys":[{"key_num":5,"press":1,"release":129,"npk":"Escape"}]}"#;
        let layout = KeyLayout::from_json_str(text).expect("parse");
        let map = KeyMap::from_layout(&layout).expect("valid");
        assert_eq!(map.npk(5), Some(NpKey::Escape));
    }

    #[test]
    fn load_picks_format_from_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json = dir.path().join("layout.json");
        std::fs::write(&json, r#"{"name":"from-json","keys":[]}"#).expect("write");
        assert_eq!(KeyLayout::load(&json).expect("load").name, "from-json");

        let toml_path = dir.path().join("layout.toml");
        let text = KeyLayout::pc_set1().to_toml_string().expect("serialize");
        std::fs::write(&toml_path, text).expect("write");
        assert_eq!(KeyLayout::load(&toml_path).expect("load"), KeyLayout::pc_set1());
    }
}
