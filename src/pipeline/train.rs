//! Training stage: fit the candidates, calibrate, keep the best.
//!
//! Every candidate follows the same recipe. A seeded stratified slice of
//! the training base is held aside, the classifier is fit on the rest, and
//! Platt scaling is fit on the slice's raw probabilities. The classifier is
//! then refit on the full training base and judged on the test base with
//! calibrated probabilities: log-loss plus F1 at the 0.5 evaluation cutoff.
//! The candidate with the strictly highest F1 wins; a tie keeps the earlier
//! one in declaration order.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::TrainArgs;
use crate::data::store;
use crate::data::{filter_complete, stratified_split, ShotRecord};
use crate::error::PipelineError;
use crate::model::{
    candidates, classification_report, fit_platt, log_loss, threshold_predictions, Classifier,
    FeatureVector, ModelArtifact, ModelKind, PlattScaling, TrainConfig,
    EVAL_PROBABILITY_THRESHOLD,
};
use crate::pipeline::EXPERIMENT_TRAINING;
use crate::tracking::{self, StageRun, STATUS_FAILED, STATUS_FINISHED};

pub const MODEL_FILE: &str = "final_model.json";

struct CandidateOutcome {
    model: ModelKind,
    calibration: Option<PlattScaling>,
    log_loss: f64,
    f1: f64,
}

pub fn run(args: &TrainArgs, tracking_db: &Path) -> Result<()> {
    let run = tracking::start_stage_run(tracking_db, EXPERIMENT_TRAINING, "train");
    let outcome = execute(args, &run);
    run.finish(if outcome.is_ok() {
        STATUS_FINISHED
    } else {
        STATUS_FAILED
    });
    outcome
}

fn execute(args: &TrainArgs, run: &StageRun) -> Result<()> {
    run.param("seed", args.seed);

    let train_rows = load_labeled(&args.train, "training")?;
    let test_rows = load_labeled(&args.test, "test")?;
    let (test_features, test_labels) = features_and_labels(&test_rows);

    let config = TrainConfig {
        seed: args.seed,
        ..TrainConfig::default()
    };

    let mut outcomes = Vec::new();
    for candidate in candidates(&config) {
        let outcome =
            evaluate_candidate(candidate, &train_rows, &test_features, &test_labels, &config, run)?;
        info!(
            "candidate {}: log_loss={:.4} f1={:.4}",
            outcome.model.name(),
            outcome.log_loss,
            outcome.f1
        );
        run.metric(&format!("{}_log_loss", outcome.model.name()), outcome.log_loss);
        run.metric(&format!("{}_f1", outcome.model.name()), outcome.f1);
        outcomes.push(outcome);
    }

    let best = select_best(outcomes).ok_or(PipelineError::NoCandidate)?;
    info!(
        "selected {} with f1={:.4} log_loss={:.4}",
        best.model.name(),
        best.f1,
        best.log_loss
    );

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;
    let model_path = args.out_dir.join(MODEL_FILE);
    let artifact = ModelArtifact::new(best.model, best.calibration, best.log_loss, best.f1);
    artifact.save(&model_path)?;
    info!("model written to {}", model_path.display());

    run.param("selected_model", &artifact.model_name);
    run.metric("log_loss", artifact.holdout_log_loss);
    run.metric("f1_score", artifact.holdout_f1);
    run.artifact(&model_path);
    Ok(())
}

fn evaluate_candidate(
    mut model: ModelKind,
    train_rows: &[ShotRecord],
    test_features: &[FeatureVector],
    test_labels: &[f64],
    config: &TrainConfig,
    run: &StageRun,
) -> Result<CandidateOutcome> {
    let name = model.name();

    // Carve the calibration slice out of the training base.
    let carve = stratified_split(train_rows, config.calibration_ratio, config.seed)?;
    let (fit_features, fit_labels) = features_and_labels(&carve.train);
    model.fit(&fit_features, &fit_labels);

    let samples: Vec<(f64, f64)> = carve
        .holdout
        .iter()
        .map(|r| {
            (
                model.predict_proba(&r.features()),
                r.shot_made_flag.unwrap_or_default(),
            )
        })
        .collect();
    let calibration = match fit_platt(
        &samples,
        config.calibration_max_iters,
        config.calibration_learning_rate,
        config.calibration_l2,
    ) {
        Some(fit) => {
            info!(
                "{}: calibration log_loss {:.4} -> {:.4}, brier {:.4} -> {:.4}",
                name,
                fit.metrics.log_loss_before,
                fit.metrics.log_loss_after,
                fit.metrics.brier_before,
                fit.metrics.brier_after
            );
            run.metric(
                &format!("{name}_calibration_log_loss_before"),
                fit.metrics.log_loss_before,
            );
            run.metric(
                &format!("{name}_calibration_log_loss_after"),
                fit.metrics.log_loss_after,
            );
            run.metric(
                &format!("{name}_calibration_brier_before"),
                fit.metrics.brier_before,
            );
            run.metric(
                &format!("{name}_calibration_brier_after"),
                fit.metrics.brier_after,
            );
            Some(fit.scaling)
        }
        None => {
            warn!("{}: calibration slice unusable, keeping raw probabilities", name);
            None
        }
    };

    // Finalize on the full training base before judging on the test base.
    let (full_features, full_labels) = features_and_labels(train_rows);
    model.fit(&full_features, &full_labels);

    let probabilities: Vec<f64> = test_features
        .iter()
        .map(|f| {
            let raw = model.predict_proba(f);
            calibration.map_or(raw, |scaling| scaling.apply(raw))
        })
        .collect();
    let ll = log_loss(&probabilities, test_labels);
    let predictions = threshold_predictions(&probabilities, EVAL_PROBABILITY_THRESHOLD);
    let report = classification_report(&predictions, test_labels);

    Ok(CandidateOutcome {
        model,
        calibration,
        log_loss: ll,
        f1: report.f1,
    })
}

/// Strictly higher F1 replaces the incumbent, so a tie keeps the earlier
/// candidate.
fn select_best(outcomes: Vec<CandidateOutcome>) -> Option<CandidateOutcome> {
    let mut winner: Option<CandidateOutcome> = None;
    for outcome in outcomes {
        let replace = winner.as_ref().map_or(true, |best| outcome.f1 > best.f1);
        if replace {
            winner = Some(outcome);
        }
    }
    winner
}

fn load_labeled(path: &Path, role: &str) -> Result<Vec<ShotRecord>> {
    let table = store::read_table(path)
        .with_context(|| format!("reading {} base {}", role, path.display()))?;
    table.require_label()?;
    let (records, dropped) = filter_complete(&table);
    if dropped > 0 {
        warn!("{} base: dropped {} incomplete rows", role, dropped);
    }
    Ok(records)
}

fn features_and_labels(rows: &[ShotRecord]) -> (Vec<FeatureVector>, Vec<f64>) {
    let features = rows.iter().map(|r| r.features()).collect();
    let labels = rows
        .iter()
        .map(|r| r.shot_made_flag.unwrap_or_default())
        .collect();
    (features, labels)
}
