//! Single-shot simulation appended to the dashboard log.
//!
//! Takes one shot from command-line flags, clamps it, scores it with the
//! persisted model and appends the verdict to a CSV the dashboards tail.
//! The header is written only when the log is new or empty, so repeated
//! simulations accumulate rows under a single header.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::config::SimulateArgs;
use crate::data::{apply_clamp, default_clamp_rules, ShotRecord, FEATURE_COLUMNS};
use crate::model::ModelArtifact;
use crate::pipeline::EXPERIMENT_SCORING;
use crate::tracking::{self, StageRun, STATUS_FAILED, STATUS_FINISHED};

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn run(args: &SimulateArgs, tracking_db: &Path) -> Result<()> {
    let run = tracking::start_stage_run(tracking_db, EXPERIMENT_SCORING, "simulation");
    let outcome = execute(args, &run);
    run.finish(if outcome.is_ok() {
        STATUS_FINISHED
    } else {
        STATUS_FAILED
    });
    outcome
}

fn execute(args: &SimulateArgs, run: &StageRun) -> Result<()> {
    let artifact = ModelArtifact::load(&args.model)
        .with_context(|| format!("loading model artifact {}", args.model.display()))?;

    let mut shot = ShotRecord {
        lat: args.lat,
        lon: args.lon,
        minutes_remaining: args.minutes_remaining,
        period: args.period,
        playoffs: args.playoffs,
        shot_distance: args.shot_distance,
        shot_made_flag: None,
    };
    apply_clamp(std::slice::from_mut(&mut shot), &default_clamp_rules());

    let probability = artifact.predict_proba(&shot.features());
    let prediction = i64::from(probability >= args.threshold);
    info!(
        "shot from {:.1} ft in period {}: proba={:.4} -> {}",
        shot.shot_distance,
        shot.period,
        probability,
        if prediction == 1 { "made" } else { "missed" }
    );

    let timestamp = Local::now().format(LOG_TIMESTAMP_FORMAT).to_string();
    append_log(&args.log_file, &shot, probability, prediction, &timestamp)
        .with_context(|| format!("appending to {}", args.log_file.display()))?;
    info!("logged to {}", args.log_file.display());

    for (name, value) in FEATURE_COLUMNS.iter().zip(shot.features()) {
        run.param(name, value);
    }
    run.metric("proba", probability);
    run.metric("prediction", prediction as f64);
    run.artifact(&args.log_file);
    Ok(())
}

/// Append one simulation row, emitting the header first when the log file
/// is absent or empty.
fn append_log(
    path: &Path,
    shot: &ShotRecord,
    probability: f64,
    prediction: i64,
    timestamp: &str,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if needs_header {
        writeln!(file, "{},prediction,proba,timestamp", FEATURE_COLUMNS.join(","))?;
    }
    writeln!(
        file,
        "{},{},{},{},{},{},{},{},{}",
        shot.lat,
        shot.lon,
        shot.minutes_remaining,
        shot.period,
        shot.playoffs,
        shot.shot_distance,
        prediction,
        probability,
        timestamp
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogisticRegression, ModelKind};
    use crate::tracking::TrackingStore;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn model_path(dir: &Path) -> PathBuf {
        let logistic = LogisticRegression {
            weights: vec![0.0; 6],
            bias: 0.0,
            feature_mean: vec![0.0; 6],
            feature_std: vec![1.0; 6],
            max_iters: 0,
            learning_rate: 0.0,
            l2: 0.0,
        };
        let artifact =
            ModelArtifact::new(ModelKind::LogisticRegression(logistic), None, 0.0, 0.0);
        let path = dir.join("final_model.json");
        artifact.save(&path).unwrap();
        path
    }

    fn args(model: PathBuf, log_file: PathBuf) -> SimulateArgs {
        SimulateArgs {
            model,
            log_file,
            lat: 33.93,
            lon: -118.05,
            minutes_remaining: 5.0,
            period: 2.0,
            playoffs: 0.0,
            shot_distance: 18.0,
            threshold: 0.35,
        }
    }

    #[test]
    fn header_is_written_once_across_appends() {
        let dir = tempdir().unwrap();
        let model = model_path(dir.path());
        let log_file = dir.path().join("logs").join("simulations.csv");
        let db = dir.path().join("tracking.db");

        run(&args(model.clone(), log_file.clone()), &db).unwrap();
        run(&args(model, log_file.clone()), &db).unwrap();

        let contents = fs::read_to_string(&log_file).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "lat,lon,minutes_remaining,period,playoffs,shot_distance,prediction,proba,timestamp"
        );
        assert!(lines[1].starts_with("33.93,-118.05,5,2,0,18,1,0.5,"));
        assert_eq!(lines[1].matches(',').count(), 8);
    }

    #[test]
    fn empty_existing_log_still_gets_the_header() {
        let dir = tempdir().unwrap();
        let model = model_path(dir.path());
        let log_file = dir.path().join("simulations.csv");
        fs::write(&log_file, b"").unwrap();

        run(&args(model, log_file.clone()), &dir.path().join("tracking.db")).unwrap();

        let contents = fs::read_to_string(&log_file).unwrap();
        assert!(contents.starts_with("lat,lon,"));
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn populated_log_is_appended_without_a_second_header() {
        let dir = tempdir().unwrap();
        let model = model_path(dir.path());
        let log_file = dir.path().join("simulations.csv");
        fs::write(&log_file, "lat,lon,minutes_remaining,period,playoffs,shot_distance,prediction,proba,timestamp\n1,2,3,4,5,6,1,0.9,t\n").unwrap();

        run(&args(model, log_file.clone()), &dir.path().join("tracking.db")).unwrap();

        let contents = fs::read_to_string(&log_file).unwrap();
        assert_eq!(contents.matches("lat,lon").count(), 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn out_of_range_flags_are_clamped_before_scoring() {
        let dir = tempdir().unwrap();
        let model = model_path(dir.path());
        let log_file = dir.path().join("simulations.csv");
        let mut wild = args(model, log_file.clone());
        wild.lat = 99.0;
        wild.shot_distance = -4.0;

        run(&wild, &dir.path().join("tracking.db")).unwrap();

        let contents = fs::read_to_string(&log_file).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.starts_with("34.1,-118.05,5,2,0,0,"));
    }

    #[test]
    fn missing_model_marks_the_run_failed() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("tracking.db");
        let absent = dir.path().join("no_such_model.json");
        let log_file = dir.path().join("simulations.csv");

        run(&args(absent, log_file.clone()), &db).unwrap_err();
        assert!(!log_file.exists());

        let store = TrackingStore::open(&db).unwrap();
        let runs = store.list_runs(EXPERIMENT_SCORING).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, STATUS_FAILED);
    }
}
