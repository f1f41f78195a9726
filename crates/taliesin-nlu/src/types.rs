//! Parse candidates, scores, and the request/response shapes shared by the
//! client traits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Extracted entity placeholders, keyed by placeholder token
/// (e.g. `QUOTED_STRING_0`).
pub type EntityMap = BTreeMap<String, serde_json::Value>;

/// How confident the analyzer is in a candidate.
///
/// Exact matches come from the analyzer's exact-match store and outrank any
/// model score. Unsupported marks an utterance the analyzer recognized as
/// in-domain but cannot express; the attached code is a placeholder, not a
/// parse worth trusting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CandidateScore {
    /// Verbatim hit in the exact-match store.
    Exact,
    /// Model confidence in `[0, 1]`.
    Model(f64),
    /// Recognized but inexpressible.
    Unsupported,
}

impl CandidateScore {
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }

    /// The model confidence, if this is a model score.
    pub fn model(&self) -> Option<f64> {
        match self {
            Self::Model(score) => Some(*score),
            _ => None,
        }
    }
}

/// One candidate interpretation: a code token sequence in the semantic
/// grammar, plus the analyzer's confidence. The grammar collaborator owns
/// turning the tokens into a typed program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateParse {
    pub code: Vec<String>,
    pub score: CandidateScore,
}

impl CandidateParse {
    pub fn new(code: Vec<String>, score: CandidateScore) -> Self {
        Self { code, score }
    }

    /// An exact-match candidate from string tokens.
    pub fn exact(code: &[&str]) -> Self {
        Self::new(
            code.iter().map(|t| t.to_string()).collect(),
            CandidateScore::Exact,
        )
    }
}

/// The analyzer's answer for one utterance: candidates in descending
/// preference order, plus the tokenization it worked from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    pub tokens: Vec<String>,
    pub entities: EntityMap,
    pub candidates: Vec<CandidateParse>,
}

impl NluResult {
    pub fn new(candidates: Vec<CandidateParse>) -> Self {
        Self {
            tokens: Vec::new(),
            entities: EntityMap::new(),
            candidates,
        }
    }

    /// No usable candidate at all.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Hints forwarded to the analyzer about what the agent is waiting for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NluOptions {
    /// The expectation category token (`yesno`, `raw_string`, ...).
    pub expect: Option<String>,
    /// Labels of the multiple-choice options currently on screen.
    pub choices: Vec<String>,
}

impl NluOptions {
    pub fn expecting(expect: impl Into<String>) -> Self {
        Self {
            expect: Some(expect.into()),
            choices: Vec::new(),
        }
    }
}

/// One ranked surface form from the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedUtterance {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_accessors() {
        assert!(CandidateScore::Exact.is_exact());
        assert_eq!(CandidateScore::Model(0.7).model(), Some(0.7));
        assert_eq!(CandidateScore::Exact.model(), None);
        assert!(CandidateScore::Unsupported.is_unsupported());
    }

    #[test]
    fn test_score_serde_shape() {
        let json = serde_json::to_value(CandidateScore::Exact).unwrap();
        assert_eq!(json["type"], "exact");

        let json = serde_json::to_value(CandidateScore::Model(0.5)).unwrap();
        assert_eq!(json["value"], 0.5);
    }

    #[test]
    fn test_exact_candidate_from_tokens() {
        let candidate = CandidateParse::exact(&["bookkeeping", "special", "special:yes"]);
        assert_eq!(candidate.code.len(), 3);
        assert!(candidate.score.is_exact());
    }
}
