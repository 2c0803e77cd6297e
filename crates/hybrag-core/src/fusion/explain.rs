//! Debug report of how a fused ranking was produced.
//!
//! The explainer never decides order. It takes the ranking from [`fuse`],
//! recomputes the per-source intermediates for the same lists and weight
//! snapshot, and attaches them to each ranked document.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::normalize::{NormalizedCandidate, normalize, score_range};
use super::scoring::{FusedResult, fuse, score_table};
use crate::candidate::{SourceKind, SourceLists};
use crate::error::Result;
use crate::weights::WeightConfig;

/// What one source returned for the query, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub count: usize,
    pub min_raw: Option<f64>,
    pub max_raw: Option<f64>,
    /// The source's own list, in the order the source returned it.
    pub candidates: Vec<NormalizedCandidate>,
}

/// A ranked document with its position (1-indexed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainedResult {
    pub rank: usize,
    #[serde(flatten)]
    pub result: FusedResult,
}

/// Full explanation of one hybrid retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub query: String,
    pub weights: WeightConfig,
    pub weight_shares: WeightConfig,
    pub sources: BTreeMap<SourceKind, SourceReport>,
    pub results: Vec<ExplainedResult>,
}

impl Explanation {
    #[must_use]
    pub fn source(&self, kind: SourceKind) -> Option<&SourceReport> {
        self.sources.get(&kind)
    }

    /// Number of distinct documents considered before truncation.
    #[must_use]
    pub fn candidate_pool(&self) -> usize {
        self.sources
            .values()
            .flat_map(|report| report.candidates.iter().map(|c| c.doc_id.as_str()))
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Build an [`Explanation`] for `lists` under `weights`.
///
/// # Errors
///
/// Same as [`fuse`].
pub fn explain(
    query: &str,
    lists: &SourceLists,
    weights: &WeightConfig,
    top_k: usize,
) -> Result<Explanation> {
    let ranked = fuse(lists, weights, top_k)?;

    let mut table: HashMap<String, FusedResult> = score_table(lists, weights)
        .into_iter()
        .map(|result| (result.doc_id.clone(), result))
        .collect();

    let results = ranked
        .into_iter()
        .enumerate()
        .map(|(idx, ranked)| ExplainedResult {
            rank: idx + 1,
            result: table.remove(&ranked.doc_id).unwrap_or(ranked),
        })
        .collect();

    let sources = SourceKind::ALL
        .into_iter()
        .map(|kind| {
            let list = lists.get(kind);
            let range = score_range(list);
            let report = SourceReport {
                count: list.len(),
                min_raw: range.map(|(min, _)| min),
                max_raw: range.map(|(_, max)| max),
                candidates: normalize(list),
            };
            (kind, report)
        })
        .collect();

    Ok(Explanation {
        query: query.to_string(),
        weights: *weights,
        weight_shares: weights.shares(),
        sources,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateList;

    fn lists() -> SourceLists {
        SourceLists::new()
            .with(
                CandidateList::from_pairs(SourceKind::Vector, [("A", 0.9), ("B", 0.5), ("C", 0.1)])
                    .unwrap(),
            )
            .with(CandidateList::from_pairs(SourceKind::Fulltext, [("B", 10.0), ("C", 2.0)]).unwrap())
    }

    #[test]
    fn explanation_follows_fusion_order() {
        let weights = WeightConfig::new(0.5, 0.3, 0.2).unwrap();
        let explanation = explain("auth", &lists(), &weights, 2).unwrap();
        let fused = fuse(&lists(), &weights, 2).unwrap();

        assert_eq!(explanation.results.len(), 2);
        for (explained, fused) in explanation.results.iter().zip(&fused) {
            assert_eq!(&explained.result, fused);
        }
        assert_eq!(explanation.results[0].rank, 1);
        assert_eq!(explanation.results[1].rank, 2);
    }

    #[test]
    fn explanation_reports_every_source() {
        let explanation = explain("auth", &lists(), &WeightConfig::default(), 5).unwrap();

        assert_eq!(explanation.sources.len(), 3);
        let vector = explanation.source(SourceKind::Vector).unwrap();
        assert_eq!(vector.count, 3);
        assert_eq!(vector.min_raw, Some(0.1));
        assert_eq!(vector.max_raw, Some(0.9));

        let semantic = explanation.source(SourceKind::Semantic).unwrap();
        assert_eq!(semantic.count, 0);
        assert_eq!(semantic.min_raw, None);
        assert_eq!(explanation.candidate_pool(), 3);
    }

    #[test]
    fn explanation_carries_weight_snapshot() {
        let weights = WeightConfig::new(2.0, 1.0, 1.0).unwrap();
        let explanation = explain("q", &lists(), &weights, 1).unwrap();
        assert_eq!(explanation.weights, weights);
        assert!((explanation.weight_shares.vector - 0.5).abs() < 1e-12);
        assert_eq!(explanation.query, "q");
    }

    #[test]
    fn explanation_propagates_fusion_errors() {
        assert!(explain("q", &lists(), &WeightConfig::default(), 0)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn explanation_serializes_flat_results() {
        let explanation = explain("q", &lists(), &WeightConfig::default(), 1).unwrap();
        let json = serde_json::to_value(&explanation).unwrap();
        assert_eq!(json["results"][0]["rank"], 1);
        assert!(json["results"][0]["doc_id"].is_string());
        assert!(json["sources"]["fulltext"]["candidates"].is_array());
    }
}
