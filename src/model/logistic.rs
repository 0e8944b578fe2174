//! Logistic-regression candidate over the six-feature shot vector.
//!
//! Features are z-score normalized from training statistics, then the
//! weights are fit by full-batch gradient descent with a decaying learning
//! rate and L2 shrinkage. Training is deterministic: zero initialization,
//! fixed iteration count, no sampling.

use serde::{Deserialize, Serialize};

use super::{Classifier, FeatureVector, FEATURE_COUNT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Per-feature training mean, applied before the dot product.
    pub feature_mean: Vec<f64>,
    /// Per-feature training standard deviation; constant columns keep 1.0.
    pub feature_std: Vec<f64>,
    pub max_iters: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl LogisticRegression {
    pub fn new(max_iters: usize, learning_rate: f64, l2: f64) -> Self {
        LogisticRegression {
            weights: vec![0.0; FEATURE_COUNT],
            bias: 0.0,
            feature_mean: vec![0.0; FEATURE_COUNT],
            feature_std: vec![1.0; FEATURE_COUNT],
            max_iters,
            learning_rate,
            l2,
        }
    }

    fn normalize(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = (features[j] - self.feature_mean[j]) / self.feature_std[j];
        }
        out
    }

    fn decision(&self, features: &FeatureVector) -> f64 {
        let x = self.normalize(features);
        let dot: f64 = self
            .weights
            .iter()
            .zip(x.iter())
            .map(|(w, v)| w * v)
            .sum();
        dot + self.bias
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, features: &[FeatureVector], labels: &[f64]) {
        self.weights = vec![0.0; FEATURE_COUNT];
        self.bias = 0.0;
        self.feature_mean = vec![0.0; FEATURE_COUNT];
        self.feature_std = vec![1.0; FEATURE_COUNT];

        let n = features.len();
        if n == 0 {
            return;
        }

        for row in features {
            for j in 0..FEATURE_COUNT {
                self.feature_mean[j] += row[j];
            }
        }
        for m in &mut self.feature_mean {
            *m /= n as f64;
        }
        let mut variance = [0.0; FEATURE_COUNT];
        for row in features {
            for j in 0..FEATURE_COUNT {
                let d = row[j] - self.feature_mean[j];
                variance[j] += d * d;
            }
        }
        for j in 0..FEATURE_COUNT {
            let std = (variance[j] / n as f64).sqrt();
            if std > 0.0 {
                self.feature_std[j] = std;
            }
        }

        let normalized: Vec<[f64; FEATURE_COUNT]> =
            features.iter().map(|row| self.normalize(row)).collect();

        for i in 0..self.max_iters.max(1) {
            let lr = self.learning_rate / (1.0 + 0.01 * i as f64);
            let mut grad_w = [0.0; FEATURE_COUNT];
            let mut grad_b = 0.0;
            for (x, &y) in normalized.iter().zip(labels.iter()) {
                let p = sigmoid(
                    self.weights
                        .iter()
                        .zip(x.iter())
                        .map(|(w, v)| w * v)
                        .sum::<f64>()
                        + self.bias,
                );
                let err = p - y;
                for j in 0..FEATURE_COUNT {
                    grad_w[j] += err * x[j];
                }
                grad_b += err;
            }
            for j in 0..FEATURE_COUNT {
                self.weights[j] -= lr * (grad_w[j] / n as f64 + self.l2 * self.weights[j]);
            }
            self.bias -= lr * grad_b / n as f64;

            if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
                self.weights = vec![0.0; FEATURE_COUNT];
                self.bias = 0.0;
                break;
            }
        }
    }

    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        sigmoid(self.decision(features))
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    /// Label depends only on shot distance: close shots go in.
    fn distance_dataset() -> (Vec<FeatureVector>, Vec<f64>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let distance = i as f64 / 2.0;
            features.push([33.9, -118.2, 5.0, 2.0, 0.0, distance]);
            labels.push(if distance < 15.0 { 1.0 } else { 0.0 });
        }
        (features, labels)
    }

    #[test]
    fn learns_a_separable_distance_rule() {
        let (features, labels) = distance_dataset();
        let mut model = LogisticRegression::new(500, 0.5, 1e-4);
        model.fit(&features, &labels);

        let close = model.predict_proba(&[33.9, -118.2, 5.0, 2.0, 0.0, 2.0]);
        let far = model.predict_proba(&[33.9, -118.2, 5.0, 2.0, 0.0, 28.0]);
        assert!(close > 0.8, "close shot should look makeable, got {close:.3}");
        assert!(far < 0.2, "deep shot should look unlikely, got {far:.3}");
        assert_eq!(model.predict(&[33.9, -118.2, 5.0, 2.0, 0.0, 2.0]), 1);
        assert_eq!(model.predict(&[33.9, -118.2, 5.0, 2.0, 0.0, 28.0]), 0);
    }

    #[test]
    fn refitting_identical_data_is_deterministic() {
        let (features, labels) = distance_dataset();
        let mut a = LogisticRegression::new(200, 0.3, 1e-4);
        let mut b = LogisticRegression::new(200, 0.3, 1e-4);
        a.fit(&features, &labels);
        b.fit(&features, &labels);
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn constant_columns_do_not_poison_the_fit() {
        // Every feature except distance is constant; std guard keeps 1.0.
        let (features, labels) = distance_dataset();
        let mut model = LogisticRegression::new(100, 0.3, 1e-4);
        model.fit(&features, &labels);
        for p in features.iter().map(|f| model.predict_proba(f)) {
            assert!(p.is_finite());
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn unfit_or_empty_fit_predicts_the_even_prior() {
        let mut model = LogisticRegression::new(100, 0.3, 1e-4);
        model.fit(&[], &[]);
        let p = model.predict_proba(&[33.9, -118.2, 5.0, 2.0, 0.0, 12.0]);
        assert!((p - 0.5).abs() < 1e-12);
    }
}
