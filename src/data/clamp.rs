use super::{FeatureField, ShotRecord};

/// Inclusive value bounds for one feature column.
///
/// The bounds were fixed from the original training distribution and are
/// applied identically to every dataset (training, holdout, production)
/// before any split or inference, so training and serving see the same
/// ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampRule {
    pub field: FeatureField,
    pub min: f64,
    pub max: f64,
}

impl ClampRule {
    pub fn new(field: FeatureField, min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "clamp bounds inverted for {}", field.name());
        ClampRule { field, min, max }
    }

    fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// The canonical bounds: shot_distance to [0, 35] feet, lat/lon to the
/// home-court coordinate window.
pub fn default_clamp_rules() -> Vec<ClampRule> {
    vec![
        ClampRule::new(FeatureField::ShotDistance, 0.0, 35.0),
        ClampRule::new(FeatureField::Lat, 33.2, 34.1),
        ClampRule::new(FeatureField::Lon, -118.52, -118.02),
    ]
}

/// Clip each ruled field into its bounds, in place. Fields without a rule
/// are untouched. Total and deterministic: never fails, whatever the input
/// range.
pub fn apply_clamp(records: &mut [ShotRecord], rules: &[ClampRule]) {
    for record in records.iter_mut() {
        for rule in rules {
            let clamped = rule.apply(rule.field.get(record));
            rule.field.set(record, clamped);
        }
    }
}
