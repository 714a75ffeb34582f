use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;


#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}


#[inline]
pub fn safe_truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Folds a surface form into the key used for name matching: diacritics
/// stripped, lowercased, punctuation turned into spaces, whitespace collapsed.
pub fn normalize_name(s: &str) -> String {
    let folded: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}


pub fn contains_phrase(haystack_normalized: &str, phrase_normalized: &str) -> bool {
    if phrase_normalized.is_empty() {
        return false;
    }
    let padded = format!(" {} ", haystack_normalized);
    padded.contains(&format!(" {} ", phrase_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_ascii() {
        assert_eq!(safe_truncate("hello world", 5), "hello");
    }

    #[test]
    fn test_safe_truncate_multibyte() {
        assert_eq!(safe_truncate("Zürich hub", 6), "Zürich");
    }

    #[test]
    fn test_safe_truncate_ellipsis() {
        assert_eq!(safe_truncate_ellipsis("hello world", 5), "hello...");
        assert_eq!(safe_truncate_ellipsis("hi", 10), "hi");
    }

    #[test]
    fn test_normalize_name_folds_case_and_punctuation() {
        assert_eq!(normalize_name("TechFlow Inc."), "techflow inc");
        assert_eq!(normalize_name("  Singapore   Port-Strike "), "singapore port strike");
    }

    #[test]
    fn test_normalize_name_strips_diacritics() {
        assert_eq!(normalize_name("São Paulo"), "sao paulo");
        assert_eq!(normalize_name("Zürich Logistik"), "zurich logistik");
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("strike hits singapore port", "singapore"));
        assert!(contains_phrase("globaltech", "globaltech"));
        assert!(!contains_phrase("globaltechnology news", "globaltech"));
        assert!(!contains_phrase("anything", ""));
    }
}
