//! Phone number normalization to E.164
//!
//! Unknown-country numbers default to +91. Mobile numbers are ten digits
//! starting 6-9; landlines are accepted as trunk-prefixed eleven-digit
//! forms (leading 0 plus STD code) with the trunk dropped.

use once_cell::sync::Lazy;
use regex::Regex;

/// Ten national digits: mobiles start 6-9, landlines start with an STD
/// code (2-5 after the trunk 0 is dropped).
static NATIONAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[2-9]\d{9}$").unwrap());

/// Full international number without the plus, 8-15 digits.
static INTERNATIONAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8,15}$").unwrap());

/// Canonicalize a phone number to E.164. Returns `None` for anything that
/// does not fit the declared mobile/landline rules.
pub fn normalize_phone_number(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    // Already international
    if has_plus {
        if INTERNATIONAL.is_match(&digits) {
            return Some(format!("+{digits}"));
        }
        return None;
    }

    // 00-prefixed international dialing
    if let Some(rest) = digits.strip_prefix("00") {
        if INTERNATIONAL.is_match(rest) {
            return Some(format!("+{rest}"));
        }
        return None;
    }

    // Country code written without the plus
    if digits.len() == 12 && digits.starts_with("91") {
        let national = &digits[2..];
        if NATIONAL.is_match(national) {
            return Some(format!("+91{national}"));
        }
        return None;
    }

    // Trunk-prefixed national form (0 + STD/mobile)
    if digits.len() == 11 && digits.starts_with('0') {
        let national = &digits[1..];
        if NATIONAL.is_match(national) {
            return Some(format!("+91{national}"));
        }
        return None;
    }

    // Bare ten-digit national number
    if NATIONAL.is_match(&digits) {
        return Some(format!("+91{digits}"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_mobile_gets_country_code() {
        assert_eq!(
            normalize_phone_number("9876543210"),
            Some("+919876543210".to_string())
        );
    }

    #[test]
    fn test_formatting_stripped() {
        assert_eq!(
            normalize_phone_number("98765-43210"),
            Some("+919876543210".to_string())
        );
        assert_eq!(
            normalize_phone_number("(022) 2202-2202"),
            Some("+912222022202".to_string())
        );
    }

    #[test]
    fn test_trunk_prefix_dropped() {
        assert_eq!(
            normalize_phone_number("09876543210"),
            Some("+919876543210".to_string())
        );
    }

    #[test]
    fn test_existing_country_code_kept() {
        assert_eq!(
            normalize_phone_number("+91 98765 43210"),
            Some("+919876543210".to_string())
        );
        assert_eq!(
            normalize_phone_number("+1-415-555-0100"),
            Some("+14155550100".to_string())
        );
        assert_eq!(
            normalize_phone_number("919876543210"),
            Some("+919876543210".to_string())
        );
    }

    #[test]
    fn test_double_zero_international() {
        assert_eq!(
            normalize_phone_number("00919876543210"),
            Some("+919876543210".to_string())
        );
    }

    #[test]
    fn test_invalid_rejected() {
        assert_eq!(normalize_phone_number(""), None);
        assert_eq!(normalize_phone_number("12345"), None);
        assert_eq!(normalize_phone_number("1234567890"), None); // leading 1 invalid nationally
        assert_eq!(normalize_phone_number("hello"), None);
    }
}
