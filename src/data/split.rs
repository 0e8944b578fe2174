use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{ShotRecord, LABEL_COLUMN};
use crate::error::{PipelineError, Result};

/// Preparation defaults: fixed seed so repeated runs on the same input
/// produce the identical partition.
pub const SPLIT_SEED: u64 = 42;
pub const HOLDOUT_RATIO: f64 = 0.2;

/// Disjoint train/holdout partition covering every input row.
#[derive(Debug, Clone)]
pub struct SplitResult {
    pub train: Vec<ShotRecord>,
    pub holdout: Vec<ShotRecord>,
}

/// Label-stratified random split with a seeded shuffle.
///
/// Per class, holdout size = round(class size * `holdout_ratio`), so both
/// subsets keep the source class proportions within rounding. Every record
/// must carry a label, and both label classes must be observed; anything
/// else is a fatal input error, not a recoverable one.
pub fn stratified_split(
    records: &[ShotRecord],
    holdout_ratio: f64,
    seed: u64,
) -> Result<SplitResult> {
    let mut class0: Vec<usize> = Vec::new();
    let mut class1: Vec<usize> = Vec::new();
    let mut unlabeled = 0usize;

    for (i, record) in records.iter().enumerate() {
        match record.shot_made_flag {
            Some(v) if v > 0.5 => class1.push(i),
            Some(_) => class0.push(i),
            None => unlabeled += 1,
        }
    }

    if unlabeled > 0 {
        return Err(PipelineError::IncompleteFeature {
            column: LABEL_COLUMN.to_string(),
            count: unlabeled,
        });
    }
    if class0.is_empty() || class1.is_empty() {
        let observed = usize::from(!class0.is_empty()) + usize::from(!class1.is_empty());
        return Err(PipelineError::SingleClassLabel {
            column: LABEL_COLUMN.to_string(),
            observed,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    class0.shuffle(&mut rng);
    class1.shuffle(&mut rng);

    let holdout0 = (class0.len() as f64 * holdout_ratio).round() as usize;
    let holdout1 = (class1.len() as f64 * holdout_ratio).round() as usize;

    let holdout: Vec<ShotRecord> = class0[..holdout0]
        .iter()
        .chain(class1[..holdout1].iter())
        .map(|&i| records[i].clone())
        .collect();
    let train: Vec<ShotRecord> = class0[holdout0..]
        .iter()
        .chain(class1[holdout1..].iter())
        .map(|&i| records[i].clone())
        .collect();

    Ok(SplitResult { train, holdout })
}
