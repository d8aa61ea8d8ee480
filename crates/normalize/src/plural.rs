//! Deterministic English plural folding
//!
//! Rule order matters: -ies before the generic -s rule, -ves before -es.

/// Fold an English plural to its singular form. Returns `None` when the
/// word does not look plural.
pub fn fold_plural(word: &str) -> Option<String> {
    let w = word.trim();
    if w.len() < 3 || !w.ends_with('s') {
        return None;
    }

    // -ies -> y (bakeries -> bakery)
    if let Some(stem) = w.strip_suffix("ies") {
        if !stem.is_empty() {
            return Some(format!("{stem}y"));
        }
    }

    // -ves -> f / fe (shelves -> shelf, knives -> knife)
    if let Some(stem) = w.strip_suffix("ves") {
        if !stem.is_empty() {
            // Words ending -ives mostly fold to -ife
            if stem.ends_with('i') || stem.ends_with('a') {
                return Some(format!("{stem}fe"));
            }
            return Some(format!("{stem}f"));
        }
    }

    // -es after s/x/z/ch/sh (classes -> class, brunches -> brunch)
    if let Some(stem) = w.strip_suffix("es") {
        if stem.ends_with('s')
            || stem.ends_with('x')
            || stem.ends_with('z')
            || stem.ends_with("ch")
            || stem.ends_with("sh")
        {
            return Some(stem.to_string());
        }
    }

    // General -s (shops -> shop); skip -ss words like "brass"
    if !w.ends_with("ss") {
        return Some(w[..w.len() - 1].to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ies() {
        assert_eq!(fold_plural("bakeries"), Some("bakery".to_string()));
        assert_eq!(fold_plural("pharmacies"), Some("pharmacy".to_string()));
    }

    #[test]
    fn test_ves() {
        assert_eq!(fold_plural("shelves"), Some("shelf".to_string()));
        assert_eq!(fold_plural("knives"), Some("knife".to_string()));
    }

    #[test]
    fn test_es_after_sibilant() {
        assert_eq!(fold_plural("classes"), Some("class".to_string()));
        assert_eq!(fold_plural("boxes"), Some("box".to_string()));
        assert_eq!(fold_plural("churches"), Some("church".to_string()));
        assert_eq!(fold_plural("brushes"), Some("brush".to_string()));
    }

    #[test]
    fn test_general_s() {
        assert_eq!(fold_plural("shops"), Some("shop".to_string()));
        assert_eq!(fold_plural("restaurants"), Some("restaurant".to_string()));
        assert_eq!(fold_plural("cafes"), Some("cafe".to_string()));
    }

    #[test]
    fn test_not_plural() {
        assert_eq!(fold_plural("gym"), None);
        assert_eq!(fold_plural("brass"), None);
        assert_eq!(fold_plural("as"), None);
    }
}
