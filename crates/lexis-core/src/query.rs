// crates/lexis-core/src/query.rs
//
// Normalized query model. Values of these types are produced by the external
// normalization subsystem and are treated as immutable input by the planner.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LexisError;

/// Languages with at least one dictionary backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Classical Latin (`lat`).
    Latin,
    /// Ancient Greek (`grc`).
    Greek,
    /// Classical Sanskrit (`san`).
    Sanskrit,
}

impl Language {
    /// Short language code used in plan parameters and hashes.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Latin => "lat",
            Language::Greek => "grc",
            Language::Sanskrit => "san",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = LexisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lat" | "la" | "latin" => Ok(Language::Latin),
            "grc" | "grk" | "greek" => Ok(Language::Greek),
            "san" | "sa" | "skt" | "sanskrit" => Ok(Language::Sanskrit),
            other => Err(LexisError::Config(format!("Unsupported language: {}", other))),
        }
    }
}

/// A normalized lemma proposed as a likely match for the raw query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCandidate {
    /// Canonical lemma form.
    pub lemma: String,
    /// Script/encoding variants keyed by scheme (e.g. "betacode", "slp1", "velthuis").
    #[serde(default)]
    pub encodings: BTreeMap<String, String>,
    /// Which normalizers or indices proposed this candidate.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl CanonicalCandidate {
    pub fn new(lemma: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            encodings: BTreeMap::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, scheme: impl Into<String>, value: impl Into<String>) -> Self {
        self.encodings.insert(scheme.into(), value.into());
        self
    }

    /// Return the variant for `scheme`, falling back to the bare lemma.
    pub fn encoded_or_lemma(&self, scheme: &str) -> &str {
        self.encodings
            .get(scheme)
            .map(String::as_str)
            .unwrap_or(&self.lemma)
    }
}

/// One step the normalizer took on the way from the raw string to the candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationStep {
    pub operation: String,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub tool: Option<String>,
}

/// A query after multi-script normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    /// The raw string the user typed.
    pub original: String,
    pub language: Language,
    /// Candidates in preference order.
    pub candidates: Vec<CanonicalCandidate>,
    #[serde(default)]
    pub normalizations: Vec<NormalizationStep>,
}

impl NormalizedQuery {
    pub fn new(
        original: impl Into<String>,
        language: Language,
        candidates: Vec<CanonicalCandidate>,
    ) -> Self {
        Self {
            original: original.into(),
            language,
            candidates,
            normalizations: Vec::new(),
        }
    }

    /// Identity material folded into the plan hash: the raw string, the
    /// language and the candidate lemmas with their encodings.
    pub fn identity(&self) -> serde_json::Value {
        serde_json::json!({
            "original": self.original,
            "language": self.language.code(),
            "candidates": self
                .candidates
                .iter()
                .map(|c| serde_json::json!({ "lemma": c.lemma, "encodings": c.encodings }))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("lat".parse::<Language>().unwrap(), Language::Latin);
        assert_eq!("Greek".parse::<Language>().unwrap(), Language::Greek);
        assert_eq!("grk".parse::<Language>().unwrap(), Language::Greek);
        assert_eq!(" SAN ".parse::<Language>().unwrap(), Language::Sanskrit);
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_encoded_or_lemma() {
        let candidate = CanonicalCandidate::new("λόγος").with_encoding("betacode", "lo/gos");
        assert_eq!(candidate.encoded_or_lemma("betacode"), "lo/gos");
        assert_eq!(candidate.encoded_or_lemma("slp1"), "λόγος");
    }

    #[test]
    fn test_identity_ignores_normalization_trail() {
        let mut a = NormalizedQuery::new("lupus", Language::Latin, vec![CanonicalCandidate::new("lupus")]);
        let b = a.clone();
        a.normalizations.push(NormalizationStep {
            operation: "lowercase".to_string(),
            input: "Lupus".to_string(),
            output: "lupus".to_string(),
            tool: None,
        });
        assert_eq!(a.identity(), b.identity());
    }
}
