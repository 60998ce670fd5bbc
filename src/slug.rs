#![forbid(unsafe_code)]

//! Filesystem-safe slugs for titles, group names and source names.
//!
//! The output of [`sanitize_filename`] is part of the on-disk contract: files
//! written by earlier runs are found again only if the same title produces
//! the same slug, so the steps below must not be reordered.

use std::path::{Component, Path};

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

pub const DEFAULT_MAX_LEN: usize = 200;
pub const DEFAULT_TOKEN: &str = "video";

/// Code point ranges treated as emoji and removed outright.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F),
    (0x1F300, 0x1F5FF),
    (0x1F680, 0x1F6FF),
    (0x1F1E0, 0x1F1FF),
    (0x2702, 0x27B0),
    (0x24C2, 0x1F251),
];

/// Characters that NFD would either keep as non-ASCII or decompose into
/// something we do not want, mapped before normalization.
fn map_special(c: char) -> char {
    match c {
        '\u{00AA}' => 'a',
        '\u{00BA}' | '\u{00B0}' => 'o',
        '\u{00E7}' | '\u{00C7}' => 'c',
        '\u{00F1}' | '\u{00D1}' => 'n',
        other => other,
    }
}

fn is_emoji(c: char) -> bool {
    let code = c as u32;
    EMOJI_RANGES
        .iter()
        .any(|(start, end)| (*start..=*end).contains(&code))
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '.')
}

/// Turns arbitrary text into a lowercase `[a-z0-9_]` slug of at most
/// `max_len` characters. Never returns an empty string, so a `max_len` of
/// zero still yields one character.
pub fn sanitize_filename(text: &str, max_len: usize) -> String {
    let kept: String = text
        .chars()
        .filter(|c| !is_emoji(*c))
        .map(map_special)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let mut collapsed = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.chars() {
        if is_separator(c) {
            if !in_separator {
                collapsed.push('_');
            }
            in_separator = true;
        } else {
            collapsed.push(c);
            in_separator = false;
        }
    }

    let mut slug = collapsed.trim_matches('_').to_string();
    if slug.len() > max_len {
        // Every remaining char is ASCII, so byte truncation is char-safe.
        slug.truncate(max_len);
        slug = slug.trim_end_matches('_').to_string();
    }

    if slug.is_empty() {
        DEFAULT_TOKEN[..max_len.clamp(1, DEFAULT_TOKEN.len())].to_string()
    } else {
        slug
    }
}

/// [`sanitize_filename`] with the default length limit.
pub fn slugify(text: &str) -> String {
    sanitize_filename(text, DEFAULT_MAX_LEN)
}

/// Keeps `value` verbatim when it is a single plain path component, otherwise
/// falls back to its slug so it can never escape the directory it is joined
/// onto.
pub fn safe_segment(value: &str) -> String {
    let trimmed = value.trim();
    let path = Path::new(trimmed);
    let mut components = path.components();
    let is_plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !trimmed.contains(['/', '\\']);
    if is_plain {
        trimmed.to_string()
    } else {
        slugify(trimmed)
    }
}
