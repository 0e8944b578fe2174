//! Preparation stage: filter, clamp and split the development snapshot.
//!
//! Both input snapshots must carry the full seven-column layout. Rows with
//! any missing value are dropped whole, the survivors are clamped to the
//! canonical court bounds, and the development rows are written out as the
//! filtered base plus a seeded stratified train/holdout split. The
//! production snapshot goes through the same filter and clamp for early
//! validation but has no output of its own; scoring reads it raw later.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::PrepareArgs;
use crate::data::store;
use crate::data::{
    apply_clamp, default_clamp_rules, filter_complete, stratified_split, ClampRule, ShotRecord,
};
use crate::pipeline::EXPERIMENT_PREPARATION;
use crate::tracking::{self, StageRun, STATUS_FAILED, STATUS_FINISHED};

pub const FILTERED_FILE: &str = "data_filtered.parquet";
pub const TRAIN_FILE: &str = "base_train.parquet";
pub const TEST_FILE: &str = "base_test.parquet";

pub fn run(args: &PrepareArgs, tracking_db: &Path) -> Result<()> {
    let run = tracking::start_stage_run(tracking_db, EXPERIMENT_PREPARATION, "prepare");
    let outcome = execute(args, &run);
    run.finish(if outcome.is_ok() {
        STATUS_FINISHED
    } else {
        STATUS_FAILED
    });
    outcome
}

fn execute(args: &PrepareArgs, run: &StageRun) -> Result<()> {
    run.param("test_size", args.test_size);
    run.param("seed", args.seed);

    let rules = default_clamp_rules();
    for rule in &rules {
        run.param(&format!("{}_min_clip", rule.field.name()), rule.min);
        run.param(&format!("{}_max_clip", rule.field.name()), rule.max);
    }

    let dev = load_clamped(&args.dev, &rules, "development")?;
    // Validated for schema and completeness only; not persisted.
    load_clamped(&args.prod, &rules, "production")?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;
    let filtered_path = args.out_dir.join(FILTERED_FILE);
    store::write_records(&filtered_path, &dev)?;

    let split = stratified_split(&dev, args.test_size, args.seed)?;
    let train_path = args.out_dir.join(TRAIN_FILE);
    let test_path = args.out_dir.join(TEST_FILE);
    store::write_records(&train_path, &split.train)?;
    store::write_records(&test_path, &split.holdout)?;

    let made = dev
        .iter()
        .filter(|r| r.shot_made_flag.unwrap_or_default() > 0.5)
        .count();
    info!(
        "prepared {} rows ({} made / {} missed): {} train, {} holdout",
        dev.len(),
        made,
        dev.len() - made,
        split.train.len(),
        split.holdout.len()
    );

    run.metric("filtered_rows", dev.len() as f64);
    run.metric("train_size", split.train.len() as f64);
    run.metric("test_size", split.holdout.len() as f64);
    run.metric("class_0_count", (dev.len() - made) as f64);
    run.metric("class_1_count", made as f64);
    run.artifact(&filtered_path);
    run.artifact(&train_path);
    run.artifact(&test_path);
    Ok(())
}

/// Read one snapshot, drop incomplete rows and clamp the rest.
fn load_clamped(path: &Path, rules: &[ClampRule], role: &str) -> Result<Vec<ShotRecord>> {
    let table = store::read_table(path)
        .with_context(|| format!("reading {} snapshot {}", role, path.display()))?;
    table.require_label()?;
    let (mut records, dropped) = filter_complete(&table);
    apply_clamp(&mut records, rules);
    info!(
        "{} snapshot: kept {} of {} rows ({} dropped as incomplete)",
        role,
        records.len(),
        table.height(),
        dropped
    );
    Ok(records)
}
