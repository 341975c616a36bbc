//! ASCII folding for the two base-14 fonts the built-in writer uses.
//!
//! Status icons become bracketed tags through one lookup table, everything
//! else is decomposed and reduced to printable ASCII.

use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Ok,
    Warn,
    Bad,
    Lock,
    Up,
    Down,
    Green,
    Yellow,
    Red,
    Info,
    Star,
    Rocket,
}

impl IconKind {
    /// Tag used when the icon leads a bullet. Traffic-light colors collapse onto
    /// the matching status.
    pub fn marker(self) -> &'static str {
        match self {
            IconKind::Ok | IconKind::Green => "[OK]",
            IconKind::Warn | IconKind::Yellow => "[!]",
            IconKind::Bad | IconKind::Red => "[X]",
            IconKind::Lock => "[LOCK]",
            IconKind::Up => "[UP]",
            IconKind::Down => "[DOWN]",
            IconKind::Info => "[INFO]",
            IconKind::Star => "[STAR]",
            IconKind::Rocket => "[GO]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icon {
    pub ch: char,
    pub kind: IconKind,
    /// Tag used when the icon appears inline.
    pub tag: &'static str,
}

const VARIATION_SELECTOR_16: char = '\u{FE0F}';

pub const ICONS: [Icon; 13] = [
    Icon { ch: '\u{2705}', kind: IconKind::Ok, tag: "[OK]" },
    Icon { ch: '\u{274C}', kind: IconKind::Bad, tag: "[X]" },
    Icon { ch: '\u{26A0}', kind: IconKind::Warn, tag: "[!]" },
    Icon { ch: '\u{1F512}', kind: IconKind::Lock, tag: "[LOCK]" },
    Icon { ch: '\u{1F513}', kind: IconKind::Lock, tag: "[UNLOCK]" },
    Icon { ch: '\u{1F4C8}', kind: IconKind::Up, tag: "[UP]" },
    Icon { ch: '\u{1F4C9}', kind: IconKind::Down, tag: "[DOWN]" },
    Icon { ch: '\u{1F7E2}', kind: IconKind::Green, tag: "[GREEN]" },
    Icon { ch: '\u{1F7E1}', kind: IconKind::Yellow, tag: "[YELLOW]" },
    Icon { ch: '\u{1F534}', kind: IconKind::Red, tag: "[RED]" },
    Icon { ch: '\u{2139}', kind: IconKind::Info, tag: "[INFO]" },
    Icon { ch: '\u{2B50}', kind: IconKind::Star, tag: "[STAR]" },
    Icon { ch: '\u{1F680}', kind: IconKind::Rocket, tag: "[GO]" },
];

pub fn icon_for(ch: char) -> Option<&'static Icon> {
    ICONS.iter().find(|icon| icon.ch == ch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSpacing {
    /// `[OK] ` with a trailing space, for free text.
    Padded,
    /// `[OK]` only, for icons sitting between words.
    Tight,
}

/// Replaces every icon (and a following emoji variation selector) with its tag.
pub fn substitute_icons(text: &str, spacing: IconSpacing) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match icon_for(ch) {
            Some(icon) => {
                if chars.peek() == Some(&VARIATION_SELECTOR_16) {
                    chars.next();
                }
                out.push_str(icon.tag);
                if spacing == IconSpacing::Padded {
                    out.push(' ');
                }
            }
            None => out.push(ch),
        }
    }
    out
}

fn is_combining_mark(ch: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&ch)
}

/// Canonical decomposition, combining marks removed, then printable ASCII only.
pub fn fold_to_ascii(text: &str) -> String {
    text.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .filter(|ch| (' '..='~').contains(ch))
        .collect()
}

/// Icon tags plus ASCII folding; the result is measured by the wrapper.
pub fn normalize_text(text: &str) -> String {
    fold_to_ascii(&substitute_icons(text, IconSpacing::Padded))
}

/// Backslash-escapes the three characters with meaning inside `( ... )`.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            _ => out.push(ch),
        }
    }
    out
}

/// Ready to sit between the parentheses of a PDF string literal.
pub fn pdf_safe(text: &str) -> String {
    escape_literal(&normalize_text(text))
}

pub fn contains_icon(text: &str) -> bool {
    text.chars().any(|ch| icon_for(ch).is_some())
}

pub fn starts_with_icon(text: &str) -> bool {
    text.chars().next().and_then(icon_for).is_some()
}

/// Icon kind of a whitespace-delimited token that is exactly one icon
/// (optionally with a variation selector). Warning and info signs also match
/// as a prefix, since they are often glued to the selector or a word.
pub fn leading_icon(token: &str) -> Option<IconKind> {
    let mut chars = token.chars();
    let icon = icon_for(chars.next()?)?;
    let rest = chars.as_str();
    let rest = rest.strip_prefix(VARIATION_SELECTOR_16).unwrap_or(rest);
    if rest.is_empty() || matches!(icon.kind, IconKind::Warn | IconKind::Info) {
        Some(icon.kind)
    } else {
        None
    }
}

/// Drops a leading icon and the whitespace after it.
pub fn strip_leading_icon(text: &str) -> &str {
    let mut chars = text.chars();
    match chars.next().and_then(icon_for) {
        Some(_) => {
            let rest = chars.as_str();
            rest.strip_prefix(VARIATION_SELECTOR_16)
                .unwrap_or(rest)
                .trim_start()
        }
        None => text,
    }
}
