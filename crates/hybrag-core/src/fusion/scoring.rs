//! Weighted score fusion across the three candidate sources.
//!
//! # Algorithm Overview
//!
//! Each source list is min-max normalized (see [`super::normalize`]), then
//! every distinct `doc_id` gets
//!
//! ```text
//! fused = w_vector * n_vector + w_fulltext * n_fulltext + w_semantic * n_semantic
//! ```
//!
//! A source that did not return a document contributes `n = 0.0`: absence is
//! "no evidence", the document still competes on its other signals.
//!
//! # Ordering
//!
//! Results sort by `fused` descending. Ties fall back to the higher vector
//! normalized score, then the higher fulltext normalized score, then the
//! ascending `doc_id`, so the output order is total and reproducible.
//!
//! # Example
//!
//! ```
//! use hybrag_core::candidate::{CandidateList, SourceKind, SourceLists};
//! use hybrag_core::fusion::fuse;
//! use hybrag_core::weights::WeightConfig;
//!
//! let lists = SourceLists::new()
//!     .with(CandidateList::from_pairs(SourceKind::Vector, [("A", 0.9), ("B", 0.5), ("C", 0.1)]).unwrap())
//!     .with(CandidateList::from_pairs(SourceKind::Fulltext, [("B", 10.0), ("C", 2.0)]).unwrap());
//! let weights = WeightConfig::new(0.5, 0.3, 0.2).unwrap();
//!
//! let top = fuse(&lists, &weights, 2).unwrap();
//! assert_eq!(top[0].doc_id, "B");
//! assert_eq!(top[1].doc_id, "A");
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::normalize::normalize;
use crate::candidate::{CandidateList, SourceKind, SourceLists};
use crate::error::{FusionError, Result};
use crate::weights::WeightConfig;

/// One source's part in a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct SourceContribution {
    /// Raw score as reported by the source; `None` if the source did not
    /// return this document.
    pub raw: Option<f64>,
    /// Per-query normalized score in `[0, 1]`; `0.0` when absent.
    pub normalized: f64,
    /// Weight applied from the snapshot used for this call.
    pub weight: f64,
    /// `weight * normalized`.
    pub contribution: f64,
}

/// Per-source breakdown of a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Breakdown {
    pub vector: SourceContribution,
    pub fulltext: SourceContribution,
    pub semantic: SourceContribution,
}

impl Breakdown {
    #[must_use]
    pub const fn get(&self, kind: SourceKind) -> &SourceContribution {
        match kind {
            SourceKind::Vector => &self.vector,
            SourceKind::Fulltext => &self.fulltext,
            SourceKind::Semantic => &self.semantic,
        }
    }

    const fn get_mut(&mut self, kind: SourceKind) -> &mut SourceContribution {
        match kind {
            SourceKind::Vector => &mut self.vector,
            SourceKind::Fulltext => &mut self.fulltext,
            SourceKind::Semantic => &mut self.semantic,
        }
    }

    /// Sources that actually returned this document.
    pub fn present(&self) -> impl Iterator<Item = SourceKind> + '_ {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).raw.is_some())
    }
}

/// A document in the final ranking. Never carries passage text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub doc_id: String,
    pub fused_score: f64,
    pub breakdown: Breakdown,
}

/// Fuse the three lists and return the top `top_k` documents.
///
/// Fewer than `top_k` distinct documents returns all of them; three empty
/// lists return an empty ranking.
///
/// # Errors
///
/// - [`FusionError::InvalidArgument`] if `top_k == 0` or a weight is negative
///   or non-finite.
/// - [`FusionError::Configuration`] if every weight is zero.
pub fn fuse(lists: &SourceLists, weights: &WeightConfig, top_k: usize) -> Result<Vec<FusedResult>> {
    if top_k == 0 {
        return Err(FusionError::invalid_top_k(top_k));
    }
    weights.validate()?;

    let mut results = score_table(lists, weights);
    results.sort_by(fused_order);
    results.truncate(top_k);
    Ok(results)
}

/// Rank a single source on its own, bypassing weights.
///
/// The fused score is the source's normalized score. Ties break on higher raw
/// score, then ascending `doc_id`.
///
/// # Errors
///
/// [`FusionError::InvalidArgument`] if `top_k == 0`.
pub fn single_source(list: &CandidateList, top_k: usize) -> Result<Vec<FusedResult>> {
    if top_k == 0 {
        return Err(FusionError::invalid_top_k(top_k));
    }

    let kind = list.kind();
    let mut normalized = normalize(list);
    normalized.sort_by(|a, b| {
        b.raw_score
            .total_cmp(&a.raw_score)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    normalized.truncate(top_k);

    Ok(normalized
        .into_iter()
        .map(|candidate| {
            let mut breakdown = Breakdown::default();
            *breakdown.get_mut(kind) = SourceContribution {
                raw: Some(candidate.raw_score),
                normalized: candidate.normalized,
                weight: 1.0,
                contribution: candidate.normalized,
            };
            FusedResult {
                doc_id: candidate.doc_id,
                fused_score: candidate.normalized,
                breakdown,
            }
        })
        .collect())
}

/// Score every distinct document across `lists`, unordered.
///
/// Steps 1-2 of fusion, shared by [`fuse`] and the explainer.
pub(crate) fn score_table(lists: &SourceLists, weights: &WeightConfig) -> Vec<FusedResult> {
    let mut table: BTreeMap<String, Breakdown> = BTreeMap::new();

    for kind in SourceKind::ALL {
        let weight = weights.get(kind);
        for candidate in normalize(lists.get(kind)) {
            let slot = table.entry(candidate.doc_id).or_default().get_mut(kind);
            *slot = SourceContribution {
                raw: Some(candidate.raw_score),
                normalized: candidate.normalized,
                weight,
                contribution: weight * candidate.normalized,
            };
        }
    }

    table
        .into_iter()
        .map(|(doc_id, mut breakdown)| {
            // Absent sources still record the weight that would have applied.
            for kind in SourceKind::ALL {
                let slot = breakdown.get_mut(kind);
                if slot.raw.is_none() {
                    slot.weight = weights.get(kind);
                }
            }
            let fused_score = SourceKind::ALL
                .iter()
                .map(|kind| breakdown.get(*kind).contribution)
                .sum();
            FusedResult {
                doc_id,
                fused_score,
                breakdown,
            }
        })
        .collect()
}

/// Total order used for the final ranking.
pub(crate) fn fused_order(a: &FusedResult, b: &FusedResult) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| {
            b.breakdown
                .vector
                .normalized
                .total_cmp(&a.breakdown.vector.normalized)
        })
        .then_with(|| {
            b.breakdown
                .fulltext
                .normalized
                .total_cmp(&a.breakdown.fulltext.normalized)
        })
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
