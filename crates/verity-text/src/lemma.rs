//! Noun lemmatizer modelled on WordNet's `morphy`.
//!
//! The built-in exception table is embedded at compile time from
//! `data/noun_exceptions.toml`. A full table with a lemma vocabulary can be
//! loaded from JSON, in which case candidate forms are checked against the
//! vocabulary exactly the way WordNet filters them.

use crate::artifact::{self, ArtifactError};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

const NOUN_EXCEPTIONS: &str = include_str!("../data/noun_exceptions.toml");

/// Noun detachment rules as (suffix, replacement).
const NOUN_RULES: [(&str, &str); 9] = [
    ("s", ""),
    ("ses", "s"),
    ("ves", "f"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

/// Shortest stem the rule-only mode will produce.
const MIN_STEM_LEN: usize = 3;

/// Endings the bare `s` rule leaves alone in rule-only mode.
const PROTECTED_ENDINGS: [&str; 3] = ["ss", "us", "is"];

static BUILTIN_EXCEPTIONS: OnceLock<HashMap<String, String>> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct ExceptionFile {
    exceptions: HashMap<String, String>,
}

/// Lemmatizer table as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LemmaTable {
    #[serde(default)]
    pub exceptions: HashMap<String, String>,
    #[serde(default)]
    pub lemmas: HashSet<String>,
}

fn builtin_exceptions() -> &'static HashMap<String, String> {
    BUILTIN_EXCEPTIONS.get_or_init(|| match toml::from_str::<ExceptionFile>(NOUN_EXCEPTIONS) {
        Ok(file) => file.exceptions,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse embedded noun exceptions");
            HashMap::new()
        }
    })
}

/// Reduces nouns to their dictionary base form.
#[derive(Debug, Clone)]
pub struct Lemmatizer {
    exceptions: HashMap<String, String>,
    /// Known lemmas. `None` selects rule-only mode.
    lemmas: Option<HashSet<String>>,
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lemmatizer {
    /// Rule-only lemmatizer over the embedded exception table.
    pub fn builtin() -> Self {
        Self {
            exceptions: builtin_exceptions().clone(),
            lemmas: None,
        }
    }

    /// Build from a table. Table exceptions override the built-in ones; an empty
    /// lemma set keeps rule-only mode.
    pub fn from_table(table: LemmaTable) -> Self {
        let mut exceptions = builtin_exceptions().clone();
        exceptions.extend(table.exceptions);
        let lemmas = (!table.lemmas.is_empty()).then_some(table.lemmas);
        Self { exceptions, lemmas }
    }

    /// Load a JSON lemma table (`{"exceptions": {..}, "lemmas": [..]}`).
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let table: LemmaTable = artifact::load_json(path)?;
        tracing::info!(
            path = %path.display(),
            exceptions = table.exceptions.len(),
            lemmas = table.lemmas.len(),
            "loaded lemma table"
        );
        Ok(Self::from_table(table))
    }

    pub fn has_vocabulary(&self) -> bool {
        self.lemmas.is_some()
    }

    /// Lemmatize a lowercase ASCII word as a noun.
    pub fn lemmatize(&self, word: &str) -> String {
        match &self.lemmas {
            Some(lemmas) => self.morphy(word, lemmas),
            None => self.rule_only(word),
        }
    }

    fn morphy(&self, word: &str, lemmas: &HashSet<String>) -> String {
        let known = |forms: &[String]| -> Vec<String> {
            let mut seen = HashSet::new();
            forms
                .iter()
                .filter(|f| lemmas.contains(f.as_str()) && seen.insert(f.as_str()))
                .cloned()
                .collect()
        };

        let found = if let Some(base) = self.exceptions.get(word) {
            known(&[word.to_string(), base.clone()])
        } else {
            let mut forms = apply_rules(&[word.to_string()]);
            let mut candidates = vec![word.to_string()];
            candidates.extend(forms.iter().cloned());
            let mut found = known(&candidates);
            // Keep detaching until something is known or no rule applies.
            while found.is_empty() && !forms.is_empty() {
                forms = apply_rules(&forms);
                found = known(&forms);
            }
            found
        };

        found
            .into_iter()
            .reduce(|best, f| if f.len() < best.len() { f } else { best })
            .unwrap_or_else(|| word.to_string())
    }

    fn rule_only(&self, word: &str) -> String {
        if let Some(base) = self.exceptions.get(word) {
            return base.clone();
        }

        NOUN_RULES
            .iter()
            .filter(|(suffix, _)| word.ends_with(suffix))
            .max_by_key(|(suffix, _)| suffix.len())
            .and_then(|(suffix, replacement)| {
                if *suffix == "s" && PROTECTED_ENDINGS.iter().any(|e| word.ends_with(e)) {
                    return None;
                }
                let stem = format!("{}{}", &word[..word.len() - suffix.len()], replacement);
                (stem.len() >= MIN_STEM_LEN).then_some(stem)
            })
            .unwrap_or_else(|| word.to_string())
    }
}

fn apply_rules(forms: &[String]) -> Vec<String> {
    forms
        .iter()
        .flat_map(|form| {
            NOUN_RULES.iter().filter_map(move |(suffix, replacement)| {
                form.strip_suffix(suffix)
                    .map(|stem| format!("{stem}{replacement}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_exceptions_parse() {
        assert_eq!(builtin_exceptions().get("children").map(String::as_str), Some("child"));
    }

    #[test]
    fn test_rule_only_regular_plurals() {
        let lem = Lemmatizer::builtin();
        assert_eq!(lem.lemmatize("cats"), "cat");
        assert_eq!(lem.lemmatize("stories"), "story");
        assert_eq!(lem.lemmatize("boxes"), "box");
        assert_eq!(lem.lemmatize("churches"), "church");
        assert_eq!(lem.lemmatize("wolves"), "wolf");
        assert_eq!(lem.lemmatize("firemen"), "fireman");
    }

    #[test]
    fn test_rule_only_leaves_singulars_alone() {
        let lem = Lemmatizer::builtin();
        assert_eq!(lem.lemmatize("economy"), "economy");
        assert_eq!(lem.lemmatize("class"), "class");
        assert_eq!(lem.lemmatize("bus"), "bus");
        assert_eq!(lem.lemmatize("analysis"), "analysis");
        // stem would be too short
        assert_eq!(lem.lemmatize("gas"), "gas");
    }

    #[test]
    fn test_rule_only_exceptions() {
        let lem = Lemmatizer::builtin();
        assert_eq!(lem.lemmatize("children"), "child");
        assert_eq!(lem.lemmatize("news"), "news");
        assert_eq!(lem.lemmatize("geese"), "goose");
    }

    #[test]
    fn test_vocabulary_filters_candidates() {
        let table = LemmaTable {
            exceptions: HashMap::new(),
            lemmas: ["dog", "glass", "bus", "news"].iter().map(|s| s.to_string()).collect(),
        };
        let lem = Lemmatizer::from_table(table);
        assert!(lem.has_vocabulary());
        assert_eq!(lem.lemmatize("dogs"), "dog");
        assert_eq!(lem.lemmatize("glasses"), "glass");
        assert_eq!(lem.lemmatize("buses"), "bus");
        assert_eq!(lem.lemmatize("news"), "news");
        // unknown words come back unchanged
        assert_eq!(lem.lemmatize("zorbles"), "zorbles");
    }

    #[test]
    fn test_vocabulary_prefers_shortest_known_form() {
        let table = LemmaTable {
            exceptions: HashMap::new(),
            lemmas: ["axes", "ax", "axe"].iter().map(|s| s.to_string()).collect(),
        };
        let lem = Lemmatizer::from_table(table);
        assert_eq!(lem.lemmatize("axes"), "ax");
    }

    #[test]
    fn test_empty_lemma_set_keeps_rule_only_mode() {
        let lem = Lemmatizer::from_table(LemmaTable::default());
        assert!(!lem.has_vocabulary());
        assert_eq!(lem.lemmatize("cats"), "cat");
    }
}
