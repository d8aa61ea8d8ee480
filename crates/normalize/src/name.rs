//! Business name normalization

use unicode_segmentation::UnicodeSegmentation;

/// Canonicalize a business name for matching.
///
/// Lowercases, strips trademark/copyright marks and punctuation, collapses
/// whitespace. Letters, combining marks, digits, spaces, hyphens, and
/// apostrophes survive from any script, so Devanagari (and other Indic)
/// names normalize without loss.
pub fn normalize_business_name(input: &str) -> Option<String> {
    let lowered = input.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(lowered.len());
    for grapheme in lowered.graphemes(true) {
        let keep = grapheme.chars().all(|c| {
            c.is_alphanumeric()
                || is_combining_mark(c)
                || c == ' '
                || c == '-'
                || c == '\''
                || c == '\u{2019}'
        });
        if keep {
            if grapheme == "\u{2019}" {
                out.push('\'');
            } else {
                out.push_str(grapheme);
            }
        } else if !grapheme.trim().is_empty() {
            // Punctuation becomes a word break so "A.B.C" -> "a b c"
            out.push(' ');
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn is_combining_mark(c: char) -> bool {
    // Devanagari and general combining ranges; enough for the declared
    // normalization rules
    matches!(c,
        '\u{0300}'..='\u{036F}'
        | '\u{0900}'..='\u{0903}'
        | '\u{093A}'..='\u{094F}'
        | '\u{0951}'..='\u{0957}'
        | '\u{0962}'..='\u{0963}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_lowercase_and_trim() {
        assert_eq!(
            normalize_business_name("  Blue Tokai Coffee  "),
            Some("blue tokai coffee".to_string())
        );
    }

    #[test]
    fn test_strips_marks_and_punctuation() {
        assert_eq!(
            normalize_business_name("Café Coffee Day™"),
            Some("café coffee day".to_string())
        );
        assert_eq!(
            normalize_business_name("D-Mart (Powai)"),
            Some("d-mart powai".to_string())
        );
        assert_eq!(
            normalize_business_name("A.B.C. Stores®"),
            Some("a b c stores".to_string())
        );
    }

    #[test]
    fn test_preserves_apostrophes_and_hyphens() {
        assert_eq!(
            normalize_business_name("Domino's Pizza"),
            Some("domino's pizza".to_string())
        );
        assert_eq!(
            normalize_business_name("Shree Ram's Chai-Wala"),
            Some("shree ram's chai-wala".to_string())
        );
    }

    #[test]
    fn test_devanagari_survives() {
        assert_eq!(
            normalize_business_name("श्री गणेश भोजनालय"),
            Some("श्री गणेश भोजनालय".to_string())
        );
    }

    #[test]
    fn test_empty_and_symbol_only_are_none() {
        assert_eq!(normalize_business_name(""), None);
        assert_eq!(normalize_business_name("   "), None);
        assert_eq!(normalize_business_name("!!! ***"), None);
    }
}
