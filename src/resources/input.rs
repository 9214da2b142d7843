//! Raw per-frame keyboard input.
//!
//! The host input layer reports key edges ([`KeyEdge`]) once per frame; they
//! are stored in the [`FrameKeys`] resource and consumed by
//! [`route_input`](crate::systems::input::route_input). The headless runner
//! feeds them from a [`KeyScript`] instead of a window.
//!
//! Key names follow the canonical spelling of [`Key`]'s `Display` impl
//! (`"Q"`, `"Digit1"`, `"Space"`, `"Backquote"`, ...). Parsing is
//! case-insensitive and also accepts a few aliases (`"1"`, `"esc"`, `` "`" ``).
use std::fmt;
use std::str::FromStr;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

macro_rules! keys {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Keyboard keys the input layer can report.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Key {
            $($variant),*
        }

        impl Key {
            /// Every key with its canonical name.
            pub const ALL: &'static [(Key, &'static str)] = &[$((Key::$variant, $name)),*];
        }
    };
}

keys! {
    A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
    H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
    O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
    V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
    Digit0 => "Digit0", Digit1 => "Digit1", Digit2 => "Digit2", Digit3 => "Digit3",
    Digit4 => "Digit4", Digit5 => "Digit5", Digit6 => "Digit6", Digit7 => "Digit7",
    Digit8 => "Digit8", Digit9 => "Digit9",
    F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
    F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
    Up => "Up", Down => "Down", Left => "Left", Right => "Right",
    Space => "Space", Enter => "Enter", Escape => "Escape", Tab => "Tab",
    Backspace => "Backspace", Backquote => "Backquote",
    LeftShift => "LeftShift", LeftControl => "LeftControl", LeftAlt => "LeftAlt",
}

impl Key {
    pub fn name(self) -> &'static str {
        Key::ALL
            .iter()
            .find(|(k, _)| *k == self)
            .map_or("?", |(_, name)| *name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let alias = match trimmed.to_ascii_lowercase().as_str() {
            "`" | "~" | "grave" | "console" => Some(Key::Backquote),
            "esc" => Some(Key::Escape),
            "return" => Some(Key::Enter),
            "spacebar" => Some(Key::Space),
            _ => None,
        };
        if let Some(key) = alias {
            return Ok(key);
        }
        // Bare digits name the number row.
        if let [digit @ b'0'..=b'9'] = trimmed.as_bytes() {
            let index = (digit - b'0') as usize;
            return Ok(Key::ALL[26 + index].0);
        }
        Key::ALL
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(trimmed))
            .map(|(key, _)| *key)
            .ok_or_else(|| format!("unknown key '{s}'"))
    }
}

// Serialized by canonical name; deserialization accepts everything `FromStr` does.
impl Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A key transition observed during one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEdge {
    Pressed(Key),
    Released(Key),
}

impl KeyEdge {
    pub fn key(self) -> Key {
        match self {
            KeyEdge::Pressed(k) | KeyEdge::Released(k) => k,
        }
    }

    pub fn is_press(self) -> bool {
        matches!(self, KeyEdge::Pressed(_))
    }
}

/// Distinct keys with a press edge in `edges`, in first-seen order.
pub fn pressed_keys(edges: &[KeyEdge]) -> SmallVec<[Key; 8]> {
    let mut keys = SmallVec::new();
    for edge in edges {
        if let KeyEdge::Pressed(key) = edge {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
    }
    keys
}

/// Key edges reported for the current frame.
#[derive(Resource, Debug, Clone, Default)]
pub struct FrameKeys {
    pub edges: Vec<KeyEdge>,
}

impl FrameKeys {
    pub fn clear(&mut self) {
        self.edges.clear();
    }

    pub fn push(&mut self, edge: KeyEdge) {
        self.edges.push(edge);
    }

    pub fn pressed(&self) -> SmallVec<[Key; 8]> {
        pressed_keys(&self.edges)
    }
}

/// One scheduled key edge of a [`KeyScript`].
///
/// Frames are 1-based: frame 1 is the first simulated frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedKey {
    pub frame: u64,
    pub key: Key,
    #[serde(default)]
    pub release: bool,
}

/// Pre-recorded input for headless runs.
///
/// JSON form: `[{"frame": 1, "key": "Digit1"}, {"frame": 4, "key": "Q"}]`.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyScript {
    entries: Vec<ScriptedKey>,
}

impl KeyScript {
    pub fn new(mut entries: Vec<ScriptedKey>) -> Self {
        entries.sort_by_key(|e| e.frame);
        KeyScript { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let entries: Vec<ScriptedKey> =
            serde_json::from_str(json).map_err(|e| format!("Invalid key script: {}", e))?;
        Ok(KeyScript::new(entries))
    }

    /// Press `key` on `frame`.
    pub fn press(mut self, frame: u64, key: Key) -> Self {
        self.entries.push(ScriptedKey {
            frame,
            key,
            release: false,
        });
        self.entries.sort_by_key(|e| e.frame);
        self
    }

    /// Edges scheduled for `frame`, in script order.
    pub fn edges_at(&self, frame: u64) -> Vec<KeyEdge> {
        self.entries
            .iter()
            .filter(|e| e.frame == frame)
            .map(|e| {
                if e.release {
                    KeyEdge::Released(e.key)
                } else {
                    KeyEdge::Pressed(e.key)
                }
            })
            .collect()
    }

    /// Last frame with a scheduled edge.
    pub fn last_frame(&self) -> Option<u64> {
        self.entries.last().map(|e| e.frame)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_parse() {
        for (key, name) in Key::ALL {
            assert_eq!(key.name(), *name);
            assert_eq!(name.parse::<Key>(), Ok(*key));
        }
    }

    #[test]
    fn parse_is_case_insensitive_with_aliases() {
        assert_eq!("q".parse::<Key>(), Ok(Key::Q));
        assert_eq!("SPACE".parse::<Key>(), Ok(Key::Space));
        assert_eq!("1".parse::<Key>(), Ok(Key::Digit1));
        assert_eq!("0".parse::<Key>(), Ok(Key::Digit0));
        assert_eq!("`".parse::<Key>(), Ok(Key::Backquote));
        assert_eq!("Esc".parse::<Key>(), Ok(Key::Escape));
        assert!("Hyper".parse::<Key>().is_err());
    }

    #[test]
    fn pressed_keys_dedupes_and_ignores_releases() {
        let edges = [
            KeyEdge::Pressed(Key::A),
            KeyEdge::Released(Key::B),
            KeyEdge::Pressed(Key::A),
            KeyEdge::Pressed(Key::C),
        ];
        assert_eq!(pressed_keys(&edges).as_slice(), &[Key::A, Key::C]);
    }

    #[test]
    fn script_from_json_sorted_by_frame() {
        let script = KeyScript::from_json(
            r#"[{"frame": 3, "key": "Q"}, {"frame": 1, "key": "Digit1"}, {"frame": 3, "key": "Space", "release": true}]"#,
        )
        .unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script.edges_at(1), vec![KeyEdge::Pressed(Key::Digit1)]);
        assert_eq!(
            script.edges_at(3),
            vec![KeyEdge::Pressed(Key::Q), KeyEdge::Released(Key::Space)]
        );
        assert!(script.edges_at(2).is_empty());
        assert_eq!(script.last_frame(), Some(3));
    }

    #[test]
    fn script_accepts_aliases_and_serializes_canonically() {
        let script = KeyScript::from_json(r#"[{"frame": 2, "key": "`"}, {"frame": 2, "key": "esc"}]"#)
            .unwrap();
        assert_eq!(
            script.edges_at(2),
            vec![KeyEdge::Pressed(Key::Backquote), KeyEdge::Pressed(Key::Escape)]
        );
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(
            json,
            r#"[{"frame":2,"key":"Backquote","release":false},{"frame":2,"key":"Escape","release":false}]"#
        );
    }

    #[test]
    fn script_rejects_unknown_keys() {
        assert!(KeyScript::from_json(r#"[{"frame": 1, "key": "Hyper"}]"#).is_err());
    }
}
