// crates/lexis-cli/src/commands/query.rs
//
// Query arguments shared by `plan` and `run`. Normalization happens outside
// lexis, so the canonical form and its encodings are passed in directly.

use clap::Args;

use lexis_core::{CanonicalCandidate, Language, NormalizedQuery};

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Query language: lat, grc or san.
    #[arg(long)]
    pub language: Language,

    /// Canonical lemma to look up.
    #[arg(long)]
    pub lemma: String,

    /// Additional candidate lemmas, in preference order.
    #[arg(long = "candidate")]
    pub candidates: Vec<String>,

    /// Encoding of the primary lemma, as scheme=value (e.g. betacode=lo/gos).
    #[arg(long = "encoding", value_parser = parse_encoding)]
    pub encodings: Vec<(String, String)>,

    /// The text as the user typed it. Defaults to the lemma.
    #[arg(long)]
    pub original: Option<String>,

    /// How many candidates to plan calls for.
    #[arg(long, default_value = "1")]
    pub max_candidates: usize,
}

impl QueryArgs {
    pub fn to_query(&self) -> NormalizedQuery {
        let primary = self
            .encodings
            .iter()
            .fold(CanonicalCandidate::new(&self.lemma), |c, (scheme, value)| {
                c.with_encoding(scheme, value)
            });
        let candidates = std::iter::once(primary)
            .chain(self.candidates.iter().map(CanonicalCandidate::new))
            .collect();
        let original = self.original.clone().unwrap_or_else(|| self.lemma.clone());
        NormalizedQuery::new(original, self.language, candidates)
    }
}

fn parse_encoding(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((scheme, value)) if !scheme.trim().is_empty() => {
            Ok((scheme.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected scheme=value, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_encoding_pairs() {
        assert_eq!(
            parse_encoding("betacode=lo/gos").unwrap(),
            ("betacode".to_string(), "lo/gos".to_string())
        );
        assert!(parse_encoding("betacode").is_err());
        assert!(parse_encoding("=x").is_err());
    }

    #[test]
    fn builds_query_with_primary_encodings() {
        let args = QueryArgs {
            language: Language::Greek,
            lemma: "λόγος".to_string(),
            candidates: vec!["λέγω".to_string()],
            encodings: vec![("betacode".to_string(), "lo/gos".to_string())],
            original: None,
            max_candidates: 1,
        };
        let query = args.to_query();
        assert_eq!(query.original, "λόγος");
        assert_eq!(query.candidates.len(), 2);
        assert_eq!(query.candidates[0].encoded_or_lemma("betacode"), "lo/gos");
        assert_eq!(query.candidates[1].lemma, "λέγω");
    }
}
