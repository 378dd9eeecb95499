use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Identity key for a place name: trimmed and upper-cased.
///
/// Two localities whose names share this key are duplicates.
pub fn identity_key(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Search folding: trimmed, lower-cased, with diacritics stripped.
pub fn fold(input: &str) -> String {
    input
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Case- and diacritic-insensitive substring test. `needle` must already be folded.
pub fn folded_contains(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key() {
        assert_eq!(identity_key("  Ilave "), "ILAVE");
        assert_eq!(identity_key("ilave"), identity_key("ILAVE"));
    }

    #[test]
    fn test_fold_strips_diacritics() {
        assert_eq!(fold(" Juliáca "), "juliaca");
        assert_eq!(fold("ÑUÑOA"), "nunoa");
        assert_eq!(fold("Puno"), "puno");
    }

    #[test]
    fn test_folded_contains() {
        assert!(folded_contains("San Martín de Porres", "martin"));
        assert!(!folded_contains("Juli", "puno"));
    }
}
