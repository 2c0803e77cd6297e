//! Per-query min-max normalization of raw source scores.
//!
//! Every source reports on its own scale (cosine in `[-1, 1]`, BM25 unbounded,
//! overlap ratio in `[0, 1]`). Fusion weights are only comparable once each
//! list has been mapped onto `[0, 1]` relative to its own observed range:
//!
//! ```text
//! max > min   normalized = (raw - min) / (max - min)
//! max == min  normalized = 1.0            (all tied, or a single hit)
//! empty       empty                       (source contributes nothing)
//! ```

use serde::Serialize;

use crate::candidate::CandidateList;

/// A candidate with both its raw and its per-query normalized score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedCandidate {
    pub doc_id: String,
    pub raw_score: f64,
    /// In `[0, 1]`.
    pub normalized: f64,
}

/// Normalize one source's list, preserving its order.
#[must_use]
pub fn normalize(list: &CandidateList) -> Vec<NormalizedCandidate> {
    let Some((min, max)) = score_range(list) else {
        return Vec::new();
    };

    list.iter()
        .map(|candidate| NormalizedCandidate {
            doc_id: candidate.doc_id.clone(),
            raw_score: candidate.raw_score,
            normalized: scale(candidate.raw_score, min, max),
        })
        .collect()
}

/// Observed `(min, max)` of a list, `None` when empty.
#[must_use]
pub fn score_range(list: &CandidateList) -> Option<(f64, f64)> {
    list.iter().fold(None, |acc, candidate| {
        let raw = candidate.raw_score;
        Some(match acc {
            None => (raw, raw),
            Some((min, max)) => (f64::min(min, raw), f64::max(max, raw)),
        })
    })
}

fn scale(raw: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 1.0;
    }

    let range = max - min;
    let value = if range.is_finite() {
        (raw - min) / range
    } else {
        // Range overflowed (scores near f64::MAX with opposite signs);
        // halving both terms keeps the ratio.
        (raw / 2.0 - min / 2.0) / (max / 2.0 - min / 2.0)
    };
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SourceKind;

    fn list(pairs: &[(&str, f64)]) -> CandidateList {
        CandidateList::from_pairs(SourceKind::Fulltext, pairs.iter().copied()).unwrap()
    }

    fn normalized_of(out: &[NormalizedCandidate], id: &str) -> f64 {
        out.iter().find(|c| c.doc_id == id).unwrap().normalized
    }

    #[test]
    fn empty_list_normalizes_to_empty() {
        assert!(normalize(&CandidateList::empty(SourceKind::Vector)).is_empty());
    }

    #[test]
    fn single_candidate_gets_one() {
        let out = normalize(&list(&[("a", 7.5)]));
        assert_eq!(out.len(), 1);
        assert!((out[0].normalized - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tied_scores_all_get_one() {
        let out = normalize(&list(&[("a", 0.3), ("b", 0.3), ("c", 0.3)]));
        assert!(out.iter().all(|c| (c.normalized - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn min_max_maps_to_unit_interval() {
        let out = normalize(&list(&[("a", 10.0), ("b", 2.0), ("c", 6.0)]));
        assert!((normalized_of(&out, "a") - 1.0).abs() < 1e-12);
        assert!(normalized_of(&out, "b").abs() < 1e-12);
        assert!((normalized_of(&out, "c") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn negative_cosine_scores_normalize() {
        let out = normalize(&list(&[("a", -1.0), ("b", 1.0), ("c", 0.0)]));
        assert!(normalized_of(&out, "a").abs() < 1e-12);
        assert!((normalized_of(&out, "c") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn preserves_input_order_and_raw_scores() {
        let out = normalize(&list(&[("z", 1.0), ("a", 3.0)]));
        assert_eq!(out[0].doc_id, "z");
        assert!((out[0].raw_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(out[1].doc_id, "a");
    }

    #[test]
    fn extreme_range_stays_in_bounds() {
        let out = normalize(&list(&[("lo", -f64::MAX), ("hi", f64::MAX), ("mid", 0.0)]));
        assert!((normalized_of(&out, "hi") - 1.0).abs() < 1e-12);
        assert!(normalized_of(&out, "lo").abs() < 1e-12);
        assert!((normalized_of(&out, "mid") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn score_range_reports_bounds() {
        assert_eq!(score_range(&list(&[("a", 2.0), ("b", -1.0)])), Some((-1.0, 2.0)));
        assert_eq!(score_range(&CandidateList::empty(SourceKind::Semantic)), None);
    }
}
