//! Category taxonomy
//!
//! A directed tree of categories with synonym and regional-term indices,
//! loaded once from embedded reference data. Resolution order for
//! `normalize_category`: exact id, synonym, regional term, model-derived
//! label table; subcategory matches fold to their root parent.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::plural::fold_plural;
use crate::NormalizeError;

/// Reserved root for low-confidence or unclassifiable queries.
pub const GENERAL_CATEGORY: &str = "general";

const TAXONOMY_YAML: &str = include_str!("../data/taxonomy.yaml");

/// Labels external models emit that are not taxonomy ids or synonyms.
/// Kept separate from the YAML so model-specific quirks stay in one place.
static MODEL_LABEL_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("restaurants", "food"),
        ("food and drink", "food"),
        ("food & drink", "food"),
        ("eating out", "food"),
        ("coffee shops", "cafe"),
        ("cafes", "cafe"),
        ("gyms", "fitness"),
        ("sports and fitness", "fitness"),
        ("wellness", "fitness"),
        ("retail", "shopping"),
        ("stores", "shopping"),
        ("medical", "health"),
        ("healthcare", "health"),
        ("doctors", "health"),
        ("personal care", "beauty"),
        ("salons", "beauty"),
        ("nightlife", "entertainment"),
        ("movies", "entertainment"),
        ("lodging", "travel"),
        ("hotels", "travel"),
        ("accommodation", "travel"),
        ("auto", "automotive"),
        ("vehicles", "automotive"),
        ("tutoring", "education"),
        ("learning", "education"),
        ("legal", "professional"),
        ("finance", "professional"),
        ("other", "general"),
        ("none", "general"),
    ])
});

/// One category node.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub regional_terms: Vec<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    categories: Vec<Category>,
}

/// The loaded taxonomy with derived indices.
pub struct Taxonomy {
    by_id: HashMap<String, Category>,
    synonym_index: HashMap<String, String>,
    regional_index: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl Taxonomy {
    /// Parse a taxonomy from YAML and build the derived indices.
    pub fn from_yaml(yaml: &str) -> Result<Self, NormalizeError> {
        let file: TaxonomyFile =
            serde_yaml::from_str(yaml).map_err(|e| NormalizeError::TaxonomyParse(e.to_string()))?;

        let mut by_id = HashMap::new();
        let mut synonym_index = HashMap::new();
        let mut regional_index = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for cat in file.categories {
            for syn in &cat.synonyms {
                synonym_index.insert(syn.to_lowercase(), cat.id.clone());
            }
            for term in &cat.regional_terms {
                regional_index.insert(term.to_lowercase(), cat.id.clone());
            }
            if let Some(parent) = &cat.parent {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(cat.id.clone());
            }
            by_id.insert(cat.id.clone(), cat);
        }

        let taxonomy = Self {
            by_id,
            synonym_index,
            regional_index,
            children,
        };
        taxonomy.verify_integrity()?;
        Ok(taxonomy)
    }

    /// Every non-root category must point at an existing parent.
    fn verify_integrity(&self) -> Result<(), NormalizeError> {
        for cat in self.by_id.values() {
            if let Some(parent) = &cat.parent {
                if !self.by_id.contains_key(parent) {
                    return Err(NormalizeError::TaxonomyIntegrity(format!(
                        "category {} has unknown parent {}",
                        cat.id, parent
                    )));
                }
            }
        }
        if !self.by_id.contains_key(GENERAL_CATEGORY) {
            return Err(NormalizeError::TaxonomyIntegrity(
                "reserved root category missing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn root_ids(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = self
            .by_id
            .values()
            .filter(|c| c.is_root())
            .map(|c| c.id.as_str())
            .collect();
        roots.sort();
        roots
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Walk parents up to the root id.
    pub fn root_of<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        let mut current = self.by_id.get(id)?;
        let mut hops = 0;
        while let Some(parent) = &current.parent {
            current = self.by_id.get(parent.as_str())?;
            hops += 1;
            if hops > 16 {
                // Defect in reference data; never loop forever
                tracing::warn!(category = id, "taxonomy parent chain too deep");
                return None;
            }
        }
        Some(current.id.as_str())
    }

    /// Whether `child` is `parent` itself or a descendant of it.
    pub fn is_within(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }
        let mut current = match self.by_id.get(child) {
            Some(c) => c,
            None => return false,
        };
        while let Some(p) = &current.parent {
            if p == parent {
                return true;
            }
            current = match self.by_id.get(p.as_str()) {
                Some(c) => c,
                None => return false,
            };
        }
        false
    }

    /// Resolve a raw category word to a taxonomy id without root folding.
    fn resolve_raw(&self, input: &str) -> Option<String> {
        if self.by_id.contains_key(input) {
            return Some(input.to_string());
        }
        if let Some(id) = self.synonym_index.get(input) {
            return Some(id.clone());
        }
        if let Some(id) = self.regional_index.get(input) {
            return Some(id.clone());
        }
        if let Some(id) = MODEL_LABEL_MAP.get(input) {
            return Some((*id).to_string());
        }
        None
    }

    /// Canonicalize free-form category input to a root taxonomy id.
    ///
    /// Resolution order: exact id, synonym, regional term, model-derived
    /// label, then the same sequence on the singular-folded form. A match on
    /// a subcategory returns its root parent.
    pub fn normalize_category(&self, input: &str) -> Option<String> {
        let cleaned = input.trim().to_lowercase();
        if cleaned.is_empty() {
            return None;
        }

        let resolved = self.resolve_raw(&cleaned).or_else(|| {
            fold_plural(&cleaned).and_then(|singular| self.resolve_raw(&singular))
        })?;

        self.root_of(&resolved).map(|root| root.to_string())
    }

    /// Extract category ids mentioned in a query: multi-word synonym and
    /// regional phrases first (in phrase order, so the result is stable),
    /// then single words in query order with plural folding. Duplicates
    /// keep their first occurrence.
    pub fn extract_categories(&self, query: &str) -> Vec<String> {
        let lowered = query.to_lowercase();
        let mut found: Vec<String> = Vec::new();

        let mut push = |id: String, found: &mut Vec<String>| {
            if !found.contains(&id) {
                found.push(id);
            }
        };

        // Multi-word phrases ("work out", "coffee shop", "beauty parlour")
        let mut phrase_hits: Vec<(&str, &str)> = self
            .synonym_index
            .iter()
            .chain(self.regional_index.iter())
            .filter(|(k, _)| k.contains(' '))
            .filter(|(phrase, _)| contains_phrase(&lowered, phrase))
            .map(|(phrase, id)| (phrase.as_str(), id.as_str()))
            .collect();
        phrase_hits.sort();
        for (_, id) in phrase_hits {
            if let Some(root) = self.root_of(id) {
                push(root.to_string(), &mut found);
            }
        }

        // Single words
        for word in lowered.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.len() < 3 {
                continue;
            }
            if let Some(id) = self.normalize_category(word) {
                push(id, &mut found);
            }
        }

        found
    }
}

/// Whole-word phrase containment.
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(phrase) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !text[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let end = abs + phrase.len();
        let after_ok = end >= text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
    }
    false
}

static TAXONOMY: Lazy<Taxonomy> = Lazy::new(|| {
    // The embedded data is part of the build; a parse failure is a defect
    // caught by the unit tests below
    Taxonomy::from_yaml(TAXONOMY_YAML).expect("embedded taxonomy is valid")
});

/// The process-wide taxonomy instance.
pub fn taxonomy() -> &'static Taxonomy {
    &TAXONOMY
}
