//! Car color handling
//!
//! The dashboard hands colors around as `#RGB` / `#RRGGBB` strings; the game
//! only ever works with the parsed [`Rgb`] triple.

use serde::{Deserialize, Serialize};

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#RGB` or `#RRGGBB`. The leading `#` is required.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// True if `hex` is a well-formed `#RGB` or `#RRGGBB` string
pub fn is_valid_hex(hex: &str) -> bool {
    Rgb::from_hex(hex).is_some()
}

/// Preset swatches offered by the dashboard
pub const PRESET_COLORS: [(&str, &str); 12] = [
    ("#0f766e", "Teal Dark"),
    ("#0f7a2a", "Green Dark"),
    ("#075985", "Blue Dark"),
    ("#0ea5a4", "Cyan"),
    ("#9a3412", "Deep Orange"),
    ("#b91c1c", "Deep Red"),
    ("#6d28d9", "Deep Purple"),
    ("#92400e", "Amber Dark"),
    ("#0f172a", "Charcoal"),
    ("#9f1239", "Crimson"),
    ("#0b815a", "Emerald"),
    ("#78350f", "Bronze"),
];

/// Name of a preset swatch, if `hex` is one (case-insensitive)
pub fn preset_name(hex: &str) -> Option<&'static str> {
    PRESET_COLORS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(hex))
        .map(|(_, name)| *name)
}
