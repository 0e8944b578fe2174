use crate::error::{PipelineError, Result};

pub mod clamp;
pub mod split;
pub mod store;

pub use clamp::{apply_clamp, default_clamp_rules, ClampRule};
pub use split::{stratified_split, SplitResult};

/// Canonical feature columns, in the order the model consumes them.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "lat",
    "lon",
    "minutes_remaining",
    "period",
    "playoffs",
    "shot_distance",
];

/// Binary outcome column. Present on development data, optional in production.
pub const LABEL_COLUMN: &str = "shot_made_flag";

/// One attempted shot with its spatial and game-context features.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    pub lat: f64,
    pub lon: f64,
    pub minutes_remaining: f64,
    /// Period number (1-4, overtime periods beyond)
    pub period: f64,
    /// 1.0 for playoff games, 0.0 for regular season
    pub playoffs: f64,
    /// Distance from the basket in feet
    pub shot_distance: f64,
    /// 1.0 made, 0.0 missed, None for unlabeled production rows
    pub shot_made_flag: Option<f64>,
}

impl ShotRecord {
    /// Feature vector in `FEATURE_COLUMNS` order.
    pub fn features(&self) -> [f64; 6] {
        [
            self.lat,
            self.lon,
            self.minutes_remaining,
            self.period,
            self.playoffs,
            self.shot_distance,
        ]
    }
}

/// Feature fields addressable by position, used by clamp rules and the
/// column-oriented storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureField {
    Lat,
    Lon,
    MinutesRemaining,
    Period,
    Playoffs,
    ShotDistance,
}

impl FeatureField {
    pub const ALL: [FeatureField; 6] = [
        FeatureField::Lat,
        FeatureField::Lon,
        FeatureField::MinutesRemaining,
        FeatureField::Period,
        FeatureField::Playoffs,
        FeatureField::ShotDistance,
    ];

    pub fn name(self) -> &'static str {
        FEATURE_COLUMNS[self.index()]
    }

    /// Position within `FEATURE_COLUMNS` / the feature vector.
    pub fn index(self) -> usize {
        match self {
            FeatureField::Lat => 0,
            FeatureField::Lon => 1,
            FeatureField::MinutesRemaining => 2,
            FeatureField::Period => 3,
            FeatureField::Playoffs => 4,
            FeatureField::ShotDistance => 5,
        }
    }

    pub fn get(self, record: &ShotRecord) -> f64 {
        match self {
            FeatureField::Lat => record.lat,
            FeatureField::Lon => record.lon,
            FeatureField::MinutesRemaining => record.minutes_remaining,
            FeatureField::Period => record.period,
            FeatureField::Playoffs => record.playoffs,
            FeatureField::ShotDistance => record.shot_distance,
        }
    }

    pub fn set(self, record: &mut ShotRecord, value: f64) {
        match self {
            FeatureField::Lat => record.lat = value,
            FeatureField::Lon => record.lon = value,
            FeatureField::MinutesRemaining => record.minutes_remaining = value,
            FeatureField::Period => record.period = value,
            FeatureField::Playoffs => record.playoffs = value,
            FeatureField::ShotDistance => record.shot_distance = value,
        }
    }
}

/// A shot augmented with the model's verdict. Produced fresh on every
/// scoring run and never fed back into training.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub shot: ShotRecord,
    /// Calibrated probability of the positive class (shot made)
    pub probability: f64,
    /// 1 when `probability` reaches the decision threshold, else 0
    pub prediction: i64,
}

/// Column-oriented rows as read from disk, before completeness filtering.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// One entry per row, positionally aligned with `FEATURE_COLUMNS`.
    pub features: Vec<[Option<f64>; 6]>,
    /// None when the label column is absent from the file entirely.
    pub labels: Option<Vec<Option<f64>>>,
}

impl RawTable {
    pub fn height(&self) -> usize {
        self.features.len()
    }

    /// Fails when the label column is missing; preparation and training
    /// inputs must carry it even if individual values are null.
    pub fn require_label(&self) -> Result<&[Option<f64>]> {
        match &self.labels {
            Some(labels) => Ok(labels),
            None => Err(PipelineError::MissingColumn(LABEL_COLUMN.to_string())),
        }
    }
}

/// All-or-nothing completeness filter over the canonical columns.
///
/// A row survives only when every feature value is present and, if the label
/// column exists, its label is present too. No imputation. Returns the
/// surviving records and the dropped-row count for the caller to log.
pub fn filter_complete(table: &RawTable) -> (Vec<ShotRecord>, usize) {
    let mut kept = Vec::with_capacity(table.height());
    let mut dropped = 0usize;

    for (i, row) in table.features.iter().enumerate() {
        let label = table.labels.as_ref().map(|l| l[i]);
        let label_ok = match label {
            Some(None) => false,
            _ => true,
        };
        if label_ok && row.iter().all(|v| v.is_some()) {
            kept.push(build_record(row, label.flatten()));
        } else {
            dropped += 1;
        }
    }

    (kept, dropped)
}

/// Strict conversion for scoring inputs: every feature value must be
/// present, while labels may be null row by row. The first feature column
/// with any missing value fails the whole snapshot.
pub fn require_complete_features(table: &RawTable) -> Result<Vec<ShotRecord>> {
    for field in FeatureField::ALL {
        let missing = table
            .features
            .iter()
            .filter(|row| row[field.index()].is_none())
            .count();
        if missing > 0 {
            return Err(PipelineError::IncompleteFeature {
                column: field.name().to_string(),
                count: missing,
            });
        }
    }

    let records = table
        .features
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let label = table.labels.as_ref().and_then(|l| l[i]);
            build_record(row, label)
        })
        .collect();
    Ok(records)
}

fn build_record(row: &[Option<f64>; 6], label: Option<f64>) -> ShotRecord {
    ShotRecord {
        lat: row[0].unwrap_or_default(),
        lon: row[1].unwrap_or_default(),
        minutes_remaining: row[2].unwrap_or_default(),
        period: row[3].unwrap_or_default(),
        playoffs: row[4].unwrap_or_default(),
        shot_distance: row[5].unwrap_or_default(),
        shot_made_flag: label,
    }
}
