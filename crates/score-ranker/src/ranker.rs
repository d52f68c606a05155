//! Probability normalization and top-K ranking

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{LabelTable, RankError};

/// Default number of ranked predictions returned
pub const DEFAULT_TOP_K: usize = 5;

/// Tolerance for treating a vector as an existing probability distribution
const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// How raw output was turned into probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Numerically stable softmax over logits
    Softmax,
    /// Divided by the vector sum
    Sum,
    /// Emitted unscaled (sum was zero or not finite)
    Raw,
}

/// One entry of the ranked list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub label: String,
    pub confidence: f32,
    pub index: usize,
}

/// Classification answer for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Top-1 label
    #[serde(rename = "predicted_disease")]
    pub predicted_label: String,
    /// Top-1 probability
    pub confidence: f32,
    /// Highest probabilities in descending order
    pub top_k: Vec<RankedLabel>,
    /// Number of entries in the label table
    pub num_labels: usize,
    /// Normalization path that produced the probabilities
    pub normalization: Normalization,
}

impl PredictionResult {
    /// Output index of the top-1 prediction
    pub fn predicted_index(&self) -> Option<usize> {
        self.top_k.first().map(|r| r.index)
    }
}

/// Turn raw model output into probabilities.
///
/// Softmax is applied to logit vectors. Vectors that are not logits go through
/// sum normalization instead: anything containing a non-finite value, and
/// vectors whose values all lie in `[0, 1]` and already sum to one (or are all
/// zero). Non-finite and negative entries count as zero mass. Sum
/// normalization never divides by a zero or non-finite sum; it emits the
/// cleaned values instead.
pub fn normalize(raw: &[f32]) -> (Vec<f32>, Normalization) {
    if raw.iter().all(|v| v.is_finite()) && !is_probability_like(raw) {
        return (softmax(raw), Normalization::Softmax);
    }

    let cleaned: Vec<f32> = raw
        .iter()
        .map(|&v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
        .collect();
    let sum: f32 = cleaned.iter().sum();

    if sum > 0.0 && sum.is_finite() {
        (cleaned.into_iter().map(|v| v / sum).collect(), Normalization::Sum)
    } else {
        (cleaned, Normalization::Raw)
    }
}

fn is_probability_like(raw: &[f32]) -> bool {
    if !raw.iter().all(|v| (0.0..=1.0).contains(v)) {
        return false;
    }
    let sum: f32 = raw.iter().sum();
    sum == 0.0 || (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    // max element contributes exp(0) = 1, so the sum is at least 1
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Indices ordered by descending probability, ties broken by lower index
fn ranked_indices(probs: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    // sort_by is stable, so equal probabilities keep ascending index order
    indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    indices
}

/// Rank raw model output against `labels`, keeping at most `top_k` entries.
///
/// `top_k` is clamped to the output length; a `top_k` of zero still reports
/// the top-1 prediction but an empty ranked list.
pub fn rank(
    raw: &[f32],
    labels: &LabelTable,
    top_k: usize,
) -> Result<PredictionResult, RankError> {
    if raw.is_empty() {
        return Err(RankError::EmptyOutput);
    }

    let (probs, normalization) = normalize(raw);
    let order = ranked_indices(&probs);
    let top_index = order[0];

    let top_k: Vec<RankedLabel> = order
        .iter()
        .take(top_k.min(probs.len()))
        .map(|&index| RankedLabel {
            label: labels.resolve(index).into_owned(),
            confidence: probs[index],
            index,
        })
        .collect();

    debug!(
        "Ranked {} outputs via {:?}: top={} ({:.4})",
        probs.len(),
        normalization,
        top_index,
        probs[top_index]
    );

    Ok(PredictionResult {
        predicted_label: labels.resolve(top_index).into_owned(),
        confidence: probs[top_index],
        top_k,
        num_labels: labels.len(),
        normalization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(names: &[&str]) -> LabelTable {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_softmax_two_of_three() {
        let result = rank(&[2.0, 1.0, 0.0], &labels(&["a", "b", "c"]), 2).unwrap();

        assert_eq!(result.normalization, Normalization::Softmax);
        assert_eq!(result.predicted_label, "a");
        assert_eq!(result.predicted_index(), Some(0));
        assert_eq!(result.top_k.len(), 2);
        assert_eq!(result.top_k[0].index, 0);
        assert_eq!(result.top_k[1].index, 1);
        assert!(result.top_k[0].confidence > result.top_k[1].confidence);

        let (probs, _) = normalize(&[2.0, 1.0, 0.0]);
        let listed: f32 = result.top_k.iter().map(|r| r.confidence).sum();
        assert!((listed + probs[2] - 1.0).abs() < 1e-6);
        assert!((result.confidence - 0.665_240_9).abs() < 1e-5);
    }

    #[test]
    fn test_all_zero_vector_emits_zeros() {
        let result = rank(&[0.0; 4], &LabelTable::empty(), 5).unwrap();
        assert_eq!(result.normalization, Normalization::Raw);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.top_k.len(), 4);
        assert!(result.top_k.iter().all(|r| r.confidence == 0.0));
        // ties resolve to the lowest index
        assert_eq!(result.predicted_label, "class_0");
        let order: Vec<usize> = result.top_k.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_existing_probabilities_use_sum_path() {
        let (probs, how) = normalize(&[0.1, 0.7, 0.2]);
        assert_eq!(how, Normalization::Sum);
        assert!((probs[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_values_fall_back() {
        let (probs, how) = normalize(&[f32::NAN, 3.0, 1.0]);
        assert_eq!(how, Normalization::Sum);
        assert_eq!(probs, vec![0.0, 0.75, 0.25]);

        let (probs, how) = normalize(&[f32::INFINITY, -2.0]);
        assert_eq!(how, Normalization::Raw);
        assert_eq!(probs, vec![0.0, 0.0]);
    }

    #[test]
    fn test_negatives_beside_non_finite_carry_no_mass() {
        let result = rank(&[f32::NAN, -1.0, 3.0], &LabelTable::empty(), 3).unwrap();
        assert_eq!(result.normalization, Normalization::Sum);
        assert_eq!(result.predicted_index(), Some(2));
        assert_eq!(result.confidence, 1.0);
        let confidences: Vec<f32> = result.top_k.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_top_k_clamped_and_labels_synthesized() {
        let result = rank(&[0.5, 3.0], &labels(&["only"]), 5).unwrap();
        assert_eq!(result.top_k.len(), 2);
        assert_eq!(result.predicted_label, "class_1");
        assert_eq!(result.top_k[1].label, "only");
        assert_eq!(result.num_labels, 1);
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let result = rank(&[1.0, 5.0, 1.0, 5.0], &LabelTable::empty(), 4).unwrap();
        let order: Vec<usize> = result.top_k.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_empty_output_rejected() {
        assert_eq!(rank(&[], &LabelTable::empty(), 5), Err(RankError::EmptyOutput));
    }

    #[test]
    fn test_serialized_shape() {
        let result = rank(&[1.0, 0.0], &labels(&["mange", "healthy"]), 1).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["predicted_disease"], "mange");
        assert_eq!(json["num_labels"], 2);
        assert_eq!(json["normalization"], "softmax");
        assert_eq!(json["top_k"][0]["index"], 0);
        assert_eq!(json["top_k"][0]["label"], "mange");
    }

    proptest! {
        #[test]
        fn prop_softmax_sums_to_one(raw in prop::collection::vec(-50.0f32..50.0, 1..64)) {
            let (probs, how) = normalize(&raw);
            if how == Normalization::Softmax {
                let sum: f32 = probs.iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-4, "sum was {}", sum);
            }
        }

        #[test]
        fn prop_top_k_sorted_and_never_fails(
            raw in prop::collection::vec(-1e6f32..1e6, 1..64),
            top_k in 0usize..10,
        ) {
            let result = rank(&raw, &LabelTable::empty(), top_k).unwrap();
            prop_assert_eq!(result.top_k.len(), top_k.min(raw.len()));
            for pair in result.top_k.windows(2) {
                prop_assert!(pair[0].confidence >= pair[1].confidence);
                if pair[0].confidence == pair[1].confidence {
                    prop_assert!(pair[0].index < pair[1].index);
                }
            }
            prop_assert!(result.confidence.is_finite());
            prop_assert!((0.0..=1.0).contains(&result.confidence));
        }

        #[test]
        fn prop_confidences_in_unit_range_with_nan(
            raw in prop::collection::vec(-100.0f32..100.0, 1..32),
            nan_at in 0usize..32,
        ) {
            let mut raw = raw;
            let at = nan_at % raw.len();
            raw[at] = f32::NAN;
            let result = rank(&raw, &LabelTable::empty(), raw.len()).unwrap();
            for entry in &result.top_k {
                prop_assert!((0.0..=1.0).contains(&entry.confidence));
            }
        }

        #[test]
        fn prop_out_of_range_labels_synthesized(len in 1usize..32, known in 0usize..32) {
            let table: LabelTable = (0..known).map(|i| format!("label{}", i)).collect();
            let raw: Vec<f32> = (0..len).map(|i| i as f32).collect();
            let result = rank(&raw, &table, len).unwrap();
            for entry in &result.top_k {
                if entry.index >= known {
                    prop_assert_eq!(&entry.label, &format!("class_{}", entry.index));
                } else {
                    prop_assert_eq!(&entry.label, &format!("label{}", entry.index));
                }
            }
        }
    }
}
