//! Text Sanitization - Fixed Transliteration Table
//!
//! The page serializer encodes text one byte per character, so every string
//! is folded through a fixed table before placement: Turkish accented
//! letters map to their closest unaccented Latin equivalents. The fold is
//! lossy and intentional.

/// Turkish accented letters and their unaccented replacements.
const TR_MAP: &[(char, char)] = &[
    ('İ', 'I'),
    ('ı', 'i'),
    ('Ğ', 'G'),
    ('ğ', 'g'),
    ('Ş', 'S'),
    ('ş', 's'),
    ('Ü', 'U'),
    ('ü', 'u'),
    ('Ö', 'O'),
    ('ö', 'o'),
    ('Ç', 'C'),
    ('ç', 'c'),
];

/// Fold Turkish accented letters to unaccented Latin. Characters outside the
/// table pass through unchanged.
pub fn transliterate(text: &str) -> String {
    text.chars()
        .map(|c| {
            TR_MAP
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Clean a display value for placement: the literal placeholders `"none"`
/// and `"nan"` (any case) become empty, everything else is transliterated.
pub fn clean_display(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower == "none" || lower == "nan" {
        return String::new();
    }
    transliterate(text)
}

/// Encode sanitized text as single-byte Latin-1. Characters still above
/// U+00FF after transliteration are replaced with `?` so serialization can
/// never fail on encoding grounds.
pub fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code < 256 {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}
