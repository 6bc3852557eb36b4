//! Palette text contract: `<char> <hex>` lines → character-keyed colors.
//!
//! The palette always carries a reserved `default` entry (packed value 0)
//! meaning "no defined color". A character can alias it explicitly with a
//! `<char> default` line. Malformed lines are skipped, never fatal, and
//! never stop the lines after them from parsing.

use crate::color::Color;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// The reserved key of the transparent entry.
pub const DEFAULT_KEY: &str = "default";

/// Packed value of the reserved entry.
pub const DEFAULT_VALUE: u32 = 0;

/// What a palette character maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swatch {
    /// Alias of the reserved `default` entry; compiles to transparent.
    Default,
    Color(Color),
}

impl Swatch {
    /// The color a brush pixel takes, `None` for transparent.
    pub fn color(self) -> Option<Color> {
        match self {
            Swatch::Default => None,
            Swatch::Color(c) => Some(c),
        }
    }

    fn to_token(self) -> String {
        match self {
            Swatch::Default => DEFAULT_KEY.to_string(),
            Swatch::Color(c) => c.to_hex(),
        }
    }
}

/// Ordered character → swatch mapping. Re-assigning a character keeps its
/// original position, so re-derived text lists entries in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<(char, Swatch)>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse palette text. Blank and malformed lines are dropped.
    pub fn parse(text: &str) -> Self {
        let mut palette = Self::new();
        for line in text.lines() {
            let mut rest = line.trim();
            if rest.is_empty() {
                continue;
            }
            match palette_line.parse_next(&mut rest) {
                Ok((key, swatch)) => palette.insert(key, swatch),
                Err(_) => log::trace!("skipping palette line {line:?}"),
            }
        }
        palette
    }

    /// Re-derive the text form: one `<char> <hex>` line per entry.
    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|(key, swatch)| format!("{key} {}", swatch.to_token()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn insert(&mut self, key: char, swatch: Swatch) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = swatch;
        } else {
            self.entries.push((key, swatch));
        }
    }

    pub fn swatch(&self, key: char) -> Option<Swatch> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, swatch)| *swatch)
    }

    /// Resolved color of a character; `None` when unmapped or default.
    pub fn color(&self, key: char) -> Option<Color> {
        self.swatch(key).and_then(Swatch::color)
    }

    /// Packed `0xRRGGBB` value by string key, including the reserved
    /// `default` entry (always present, always 0).
    pub fn value_of(&self, key: &str) -> Option<u32> {
        if key == DEFAULT_KEY {
            return Some(DEFAULT_VALUE);
        }
        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match self.swatch(c)? {
            Swatch::Default => Some(DEFAULT_VALUE),
            Swatch::Color(color) => Some(color.packed_rgb()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, Swatch)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of character entries, `<char> default` aliases included.
    /// The reserved `default` key is not counted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Line parser ─────────────────────────────────────────────────────────

fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn parse_swatch(token: &str) -> Option<Swatch> {
    if token == DEFAULT_KEY {
        Some(Swatch::Default)
    } else {
        Color::from_hex(token).map(Swatch::Color)
    }
}

fn token<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_till(1.., char::is_whitespace).parse_next(input)
}

/// `<char> <hex|default>`, trailing tokens ignored.
fn palette_line(input: &mut &str) -> ModalResult<(char, Swatch)> {
    let key = token.verify_map(single_char).parse_next(input)?;
    let _ = take_while(1.., char::is_whitespace).parse_next(input)?;
    let swatch = token.verify_map(parse_swatch).parse_next(input)?;
    Ok((key, swatch))
}
