//! Candidate lists produced by the three retrieval sources.
//!
//! A [`CandidateList`] is one source's answer for one query: `(doc_id,
//! raw_score)` pairs on that source's own scale. Lists are validated on
//! construction (unique ids, finite scores) so fusion never has to guess.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};

/// The three retrieval signals fused by the engine.
///
/// The derived `Ord` (vector < fulltext < semantic) is the canonical
/// iteration order for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// ANN / cosine similarity over embeddings, raw scores in `[-1, 1]`.
    Vector,
    /// Keyword index relevance, raw scores unbounded and positive.
    Fulltext,
    /// Word-overlap ratio, raw scores in `[0, 1]`.
    Semantic,
}

impl SourceKind {
    pub const ALL: [Self; 3] = [Self::Vector, Self::Fulltext, Self::Semantic];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Fulltext => "fulltext",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "fulltext" => Ok(Self::Fulltext),
            "semantic" => Ok(Self::Semantic),
            other => Err(FusionError::malformed_candidates(format!(
                "unknown source kind '{other}'"
            ))),
        }
    }
}

/// One scored document from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub doc_id: String,
    pub raw_score: f64,
}

impl Candidate {
    pub fn new(doc_id: impl Into<String>, raw_score: f64) -> Self {
        Self {
            doc_id: doc_id.into(),
            raw_score,
        }
    }
}

/// A validated, source-tagged candidate list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateList {
    kind: SourceKind,
    candidates: Vec<Candidate>,
}

impl CandidateList {
    /// Build a list, rejecting duplicate ids, empty ids, and non-finite scores.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidArgument`] if the list violates its
    /// invariants.
    pub fn new(kind: SourceKind, candidates: Vec<Candidate>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(candidates.len());
        for candidate in &candidates {
            if candidate.doc_id.is_empty() {
                return Err(FusionError::malformed_candidates(format!(
                    "{kind} candidate list contains an empty doc_id"
                )));
            }
            if !candidate.raw_score.is_finite() {
                return Err(FusionError::malformed_candidates(format!(
                    "{kind} candidate '{}' has non-finite score {}",
                    candidate.doc_id, candidate.raw_score
                )));
            }
            if !seen.insert(candidate.doc_id.as_str()) {
                return Err(FusionError::malformed_candidates(format!(
                    "{kind} candidate list repeats doc_id '{}'",
                    candidate.doc_id
                )));
            }
        }

        Ok(Self { kind, candidates })
    }

    /// Convenience constructor from `(doc_id, raw_score)` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`CandidateList::new`].
    pub fn from_pairs<I, S>(kind: SourceKind, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let candidates = pairs
            .into_iter()
            .map(|(doc_id, score)| Candidate::new(doc_id, score))
            .collect();
        Self::new(kind, candidates)
    }

    #[must_use]
    pub const fn empty(kind: SourceKind) -> Self {
        Self {
            kind,
            candidates: Vec::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Candidate] {
        &self.candidates
    }

    #[must_use]
    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// The per-call set of candidate lists, one slot per [`SourceKind`].
///
/// Slots that were never filled hold an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLists {
    vector: CandidateList,
    fulltext: CandidateList,
    semantic: CandidateList,
}

impl Default for SourceLists {
    fn default() -> Self {
        Self {
            vector: CandidateList::empty(SourceKind::Vector),
            fulltext: CandidateList::empty(SourceKind::Fulltext),
            semantic: CandidateList::empty(SourceKind::Semantic),
        }
    }
}

impl SourceLists {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `list` in the slot matching its kind, replacing what was there.
    pub fn insert(&mut self, list: CandidateList) {
        match list.kind() {
            SourceKind::Vector => self.vector = list,
            SourceKind::Fulltext => self.fulltext = list,
            SourceKind::Semantic => self.semantic = list,
        }
    }

    #[must_use]
    pub fn with(mut self, list: CandidateList) -> Self {
        self.insert(list);
        self
    }

    #[must_use]
    pub const fn get(&self, kind: SourceKind) -> &CandidateList {
        match kind {
            SourceKind::Vector => &self.vector,
            SourceKind::Fulltext => &self.fulltext,
            SourceKind::Semantic => &self.semantic,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        SourceKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
    }

    /// Number of distinct doc ids across all three lists.
    #[must_use]
    pub fn distinct_doc_count(&self) -> usize {
        SourceKind::ALL
            .iter()
            .flat_map(|kind| self.get(*kind).iter())
            .map(|candidate| candidate.doc_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn source_kind_round_trips_through_str() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!(" Vector ".parse::<SourceKind>().unwrap(), SourceKind::Vector);
        assert!("graph".parse::<SourceKind>().is_err());
    }

    #[test]
    fn source_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SourceKind::Fulltext).unwrap();
        assert_eq!(json, "\"fulltext\"");
    }

    #[test]
    fn candidate_list_rejects_duplicate_ids() {
        let err = CandidateList::from_pairs(SourceKind::Vector, [("a", 0.9), ("a", 0.1)])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedCandidates);
        assert!(err.to_string().contains("repeats doc_id 'a'"));
    }

    #[test]
    fn candidate_list_rejects_non_finite_scores() {
        let err = CandidateList::from_pairs(SourceKind::Fulltext, [("a", f64::NAN)])
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = CandidateList::from_pairs(SourceKind::Fulltext, [("a", f64::INFINITY)])
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn candidate_list_rejects_empty_ids() {
        assert!(CandidateList::from_pairs(SourceKind::Semantic, [("", 0.5)]).is_err());
    }

    #[test]
    fn candidate_list_keeps_source_order() {
        let list =
            CandidateList::from_pairs(SourceKind::Vector, [("c", 0.1), ("a", 0.9)]).unwrap();
        let ids: Vec<_> = list.iter().map(|c| c.doc_id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(list.kind(), SourceKind::Vector);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn source_lists_slot_by_kind() {
        let lists = SourceLists::new()
            .with(CandidateList::from_pairs(SourceKind::Fulltext, [("b", 3.0)]).unwrap())
            .with(CandidateList::from_pairs(SourceKind::Vector, [("a", 0.2), ("b", 0.1)]).unwrap());

        assert_eq!(lists.get(SourceKind::Vector).len(), 2);
        assert_eq!(lists.get(SourceKind::Fulltext).len(), 1);
        assert!(lists.get(SourceKind::Semantic).is_empty());
        assert_eq!(lists.distinct_doc_count(), 2);
        assert!(!lists.is_empty());
        assert!(SourceLists::new().is_empty());
    }
}
