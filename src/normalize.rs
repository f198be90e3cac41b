use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonical form used for case and accent insensitive comparison.
///
/// The text is lower-cased, decomposed (NFD) and stripped of combining marks,
/// so "Café" and "CAFE" both become "cafe".
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}
