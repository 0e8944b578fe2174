//! Scoring stage: batch predictions at the operating threshold.
//!
//! The input snapshot must carry every feature column with no missing
//! values; the label column is optional and only drives the evaluation
//! metrics. Features are clamped to the canonical bounds before inference
//! so out-of-range rows score like their nearest in-range neighbour.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::ScoreArgs;
use crate::data::store;
use crate::data::{apply_clamp, default_clamp_rules, require_complete_features, ScoredRecord};
use crate::model::{classification_report, log_loss, ModelArtifact};
use crate::pipeline::EXPERIMENT_SCORING;
use crate::tracking::{self, StageRun, STATUS_FAILED, STATUS_FINISHED};

/// Production decision cutoff, tuned for recall on the original data.
/// Deliberately lower than the 0.5 evaluation cutoff used in selection.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.35;

pub const PREDICTIONS_FILE: &str = "predictions.parquet";

pub fn run(args: &ScoreArgs, tracking_db: &Path) -> Result<()> {
    let run = tracking::start_stage_run(tracking_db, EXPERIMENT_SCORING, "batch_scoring");
    let outcome = execute(args, &run);
    run.finish(if outcome.is_ok() {
        STATUS_FINISHED
    } else {
        STATUS_FAILED
    });
    outcome
}

fn execute(args: &ScoreArgs, run: &StageRun) -> Result<()> {
    run.param("threshold", args.threshold);

    let artifact = ModelArtifact::load(&args.model)
        .with_context(|| format!("loading model artifact {}", args.model.display()))?;
    info!(
        "loaded {} (holdout f1={:.4}) trained at {}",
        artifact.model_name, artifact.holdout_f1, artifact.trained_at
    );

    let table = store::read_table(&args.input)
        .with_context(|| format!("reading input snapshot {}", args.input.display()))?;
    let mut records = require_complete_features(&table)?;
    apply_clamp(&mut records, &default_clamp_rules());

    let scored: Vec<ScoredRecord> = records
        .into_iter()
        .map(|shot| {
            let probability = artifact.predict_proba(&shot.features());
            let prediction = i64::from(probability >= args.threshold);
            ScoredRecord {
                shot,
                probability,
                prediction,
            }
        })
        .collect();

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;
    let out_path = args.out_dir.join(PREDICTIONS_FILE);
    store::write_scored(&out_path, &scored)?;
    info!(
        "scored {} rows at threshold {} -> {}",
        scored.len(),
        args.threshold,
        out_path.display()
    );

    let total = scored.len();
    let positives = scored.iter().filter(|r| r.prediction == 1).count();
    run.metric("scored_rows", total as f64);
    if total > 0 {
        run.metric("pred_class_1", positives as f64 / total as f64);
        run.metric("pred_class_0", (total - positives) as f64 / total as f64);
    }

    let labeled: Vec<&ScoredRecord> = scored
        .iter()
        .filter(|r| r.shot.shot_made_flag.is_some())
        .collect();
    run.metric("labeled_rows", labeled.len() as f64);
    if labeled.is_empty() {
        warn!("no labeled rows in the input, skipping evaluation metrics");
    } else {
        let probabilities: Vec<f64> = labeled.iter().map(|r| r.probability).collect();
        let labels: Vec<f64> = labeled
            .iter()
            .map(|r| r.shot.shot_made_flag.unwrap_or_default())
            .collect();
        let predictions: Vec<i64> = labeled.iter().map(|r| r.prediction).collect();
        let ll = log_loss(&probabilities, &labels);
        let report = classification_report(&predictions, &labels);
        info!(
            "labeled subset of {} rows: log_loss={:.4} {}",
            labeled.len(),
            ll,
            report
        );
        run.metric("log_loss_prod", ll);
        run.metric("f1_prod", report.f1);
    }

    run.artifact(&out_path);
    Ok(())
}
