//! Confusion-matrix metrics and log-loss for binary shot outcomes.

/// Probability cutoff used when deriving classes for F1 during model
/// selection and labeled-subset evaluation. Deliberately distinct from the
/// production decision threshold (`pipeline::score::DEFAULT_DECISION_THRESHOLD`,
/// 0.35); the two are never unified.
pub const EVAL_PROBABILITY_THRESHOLD: f64 = 0.5;

const EPS: f64 = 1e-6;

/// Convert probabilities to class decisions. The boundary is inclusive:
/// a probability exactly at the threshold predicts the positive class.
pub fn threshold_predictions(probabilities: &[f64], threshold: f64) -> Vec<i64> {
    probabilities
        .iter()
        .map(|&p| i64::from(p >= threshold))
        .collect()
}

/// Mean negative log-likelihood of binary labels under predicted
/// probabilities. Restricted to the two known label values (0 and 1), so a
/// batch where only one class appears still has a defined loss.
pub fn log_loss(probabilities: &[f64], labels: &[f64]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for (&p, &y) in probabilities.iter().zip(labels.iter()) {
        let p = p.clamp(EPS, 1.0 - EPS);
        total -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
    }
    total / probabilities.len() as f64
}

/// Confusion-matrix summary of binary predictions against labels.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Compute precision, recall and F1 from predictions and ground truth.
/// Degenerate denominators yield 0.0 rather than NaN.
pub fn classification_report(predictions: &[i64], labels: &[f64]) -> ClassificationReport {
    debug_assert_eq!(predictions.len(), labels.len());

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_count = 0usize;
    for (&pred, &label) in predictions.iter().zip(labels.iter()) {
        match (pred, label > 0.5) {
            (1, true) => tp += 1,
            (1, false) => fp += 1,
            (0, false) => tn += 1,
            (0, true) => fn_count += 1,
            _ => {}
        }
    }

    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_count > 0 {
        tp as f64 / (tp + fn_count) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ClassificationReport {
        f1,
        precision,
        recall,
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_count,
    }
}

impl std::fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "f1={:.4} precision={:.4} recall={:.4} (tp={} fp={} tn={} fn={})",
            self.f1,
            self.precision,
            self.recall,
            self.true_positives,
            self.false_positives,
            self.true_negatives,
            self.false_negatives,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn boundary_probability_predicts_positive() {
        let preds = threshold_predictions(&[0.349_999, 0.35, 0.350_001], 0.35);
        assert_eq!(preds, vec![0, 1, 1]);
    }

    #[test]
    fn perfect_predictions_score_one() {
        let report = classification_report(&[0, 0, 1, 1], &[0.0, 0.0, 1.0, 1.0]);
        assert_relative_eq!(report.f1, 1.0);
        assert_relative_eq!(report.precision, 1.0);
        assert_relative_eq!(report.recall, 1.0);
    }

    #[test]
    fn all_wrong_predictions_score_zero_without_nan() {
        let report = classification_report(&[1, 1, 0, 0], &[0.0, 0.0, 1.0, 1.0]);
        assert_relative_eq!(report.f1, 0.0);
        assert_relative_eq!(report.precision, 0.0);
        assert_relative_eq!(report.recall, 0.0);
    }

    #[test]
    fn mixed_predictions_match_hand_computation() {
        // tp=2 fp=1 fn=1 -> precision=2/3, recall=2/3, f1=2/3
        let report = classification_report(&[1, 1, 1, 0], &[1.0, 0.0, 1.0, 1.0]);
        assert_relative_eq!(report.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(report.recall, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(report.f1, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(report.true_negatives, 0);
    }

    #[test]
    fn log_loss_is_defined_for_single_class_batches() {
        let loss = log_loss(&[0.8, 0.8], &[1.0, 1.0]);
        assert_relative_eq!(loss, -(0.8_f64.ln()), epsilon = 1e-12);
        assert!(loss.is_finite());
    }

    #[test]
    fn log_loss_clamps_extreme_probabilities() {
        let loss = log_loss(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }

    #[test]
    fn log_loss_of_empty_batch_is_zero() {
        assert_relative_eq!(log_loss(&[], &[]), 0.0);
    }

    #[test]
    fn confident_correct_probabilities_beat_uncertain_ones() {
        let labels = [1.0, 0.0, 1.0, 0.0];
        let sharp = log_loss(&[0.9, 0.1, 0.9, 0.1], &labels);
        let flat = log_loss(&[0.5, 0.5, 0.5, 0.5], &labels);
        assert!(sharp < flat);
    }
}
