//! Platt scaling of raw classifier probabilities.
//!
//! The calibration model is `p_calibrated = sigmoid(a * logit(p_raw) + b)`,
//! fit by gradient descent on probabilities the classifier produced for a
//! held-out calibration slice of the training subset.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-6;

/// Below this many samples the fit is too noisy to trust.
const MIN_SAMPLES: usize = 8;

/// Fitted calibration coefficients, persisted inside the model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Map a raw positive-class probability through the calibration curve.
    pub fn apply(self, raw_prob: f64) -> f64 {
        let x = logit(raw_prob);
        sigmoid(self.a * x + self.b).clamp(0.0, 1.0)
    }
}

/// How much the fit moved the calibration sample's loss.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationMetrics {
    pub log_loss_before: f64,
    pub log_loss_after: f64,
    pub brier_before: f64,
    pub brier_after: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationFit {
    pub scaling: PlattScaling,
    pub metrics: CalibrationMetrics,
}

fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn logit(p: f64) -> f64 {
    let p = clamp_prob(p);
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn logloss(p: f64, y: f64) -> f64 {
    let p = clamp_prob(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// Fit Platt scaling on `(raw probability, binary label)` samples.
///
/// Returns `None` when the sample set is too small, contains a single
/// class, or the descent diverges; callers fall back to the uncalibrated
/// probabilities in that case.
pub fn fit_platt(
    samples: &[(f64, f64)],
    max_iters: usize,
    learning_rate: f64,
    l2: f64,
) -> Option<CalibrationFit> {
    if samples.len() < MIN_SAMPLES {
        return None;
    }
    let positives = samples.iter().filter(|(_, y)| *y > 0.5).count();
    if positives == 0 || positives == samples.len() {
        return None;
    }

    let n = samples.len() as f64;
    let mut a = 1.0f64;
    let mut b = 0.0f64;

    for i in 0..max_iters.max(1) {
        let lr = learning_rate / (1.0 + 0.01 * i as f64);
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for (raw_p, y) in samples {
            let x = logit(*raw_p);
            let p = sigmoid(a * x + b);
            let err = p - *y;
            grad_a += err * x;
            grad_b += err;
        }
        grad_a = grad_a / n + l2 * a;
        grad_b /= n;
        a -= lr * grad_a;
        b -= lr * grad_b;
        if !a.is_finite() || !b.is_finite() {
            return None;
        }
    }

    let scaling = PlattScaling { a, b };
    let mut ll_before = 0.0;
    let mut ll_after = 0.0;
    let mut br_before = 0.0;
    let mut br_after = 0.0;
    for (raw_p, y) in samples {
        let before = clamp_prob(*raw_p);
        let after = scaling.apply(*raw_p);
        ll_before += logloss(before, *y);
        ll_after += logloss(after, *y);
        br_before += (before - *y).powi(2);
        br_after += (after - *y).powi(2);
    }
    let metrics = CalibrationMetrics {
        log_loss_before: ll_before / n,
        log_loss_after: ll_after / n,
        brier_before: br_before / n,
        brier_after: br_after / n,
    };
    Some(CalibrationFit { scaling, metrics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fit_sharpens_underconfident_probabilities() {
        // Clean labels but probabilities that never stray far from even odds.
        let mut samples = Vec::new();
        for i in 0..75 {
            let strength = i as f64 / 75.0;
            samples.push((0.5 - 0.12 * strength, 0.0));
            samples.push((0.5 + 0.12 * strength, 1.0));
        }
        let fit = fit_platt(&samples, 400, 0.25, 1e-3).expect("fit should succeed");
        assert!(fit.metrics.log_loss_after < fit.metrics.log_loss_before);
        assert!(fit.metrics.brier_after < fit.metrics.brier_before);
    }

    #[test]
    fn apply_bounds_output() {
        let scaling = PlattScaling { a: 1.2, b: -0.1 };
        let p = scaling.apply(0.999_999);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn identity_coefficients_leave_probabilities_nearly_unchanged() {
        let identity = PlattScaling { a: 1.0, b: 0.0 };
        for p in [0.1, 0.35, 0.5, 0.9] {
            assert_relative_eq!(identity.apply(p), p, epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_samples_are_refused() {
        // Too few samples.
        assert!(fit_platt(&[(0.5, 1.0); 4], 100, 0.2, 1e-3).is_none());
        // Single class.
        let one_class: Vec<(f64, f64)> = (0..20).map(|i| (i as f64 / 20.0, 1.0)).collect();
        assert!(fit_platt(&one_class, 100, 0.2, 1e-3).is_none());
    }
}
