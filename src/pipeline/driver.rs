//! End-to-end orchestration: prepare, train and score as child processes.
//!
//! The driver re-invokes the current executable once per stage over a
//! conventional data-directory layout and stops at the first non-zero exit
//! status. There are no retries and no cleanup of partial outputs; rerunning
//! the pipeline overwrites them.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::RunArgs;
use crate::pipeline::{prepare, train};

pub const RAW_DIR: &str = "raw";
pub const PROCESSED_DIR: &str = "processed";
pub const MODELING_DIR: &str = "modeling";
pub const DEV_FILE: &str = "dataset_dev.parquet";
pub const PROD_FILE: &str = "dataset_prod.parquet";

struct StageCommand {
    name: &'static str,
    args: Vec<String>,
}

pub fn run(args: &RunArgs, tracking_db: &Path) -> Result<()> {
    let exe = std::env::current_exe().context("locating the pipeline executable")?;

    for stage in stage_commands(args, tracking_db) {
        info!("starting stage {}", stage.name);
        let status = Command::new(&exe)
            .args(&stage.args)
            .status()
            .with_context(|| format!("spawning stage {}", stage.name))?;
        if !status.success() {
            bail!("stage {} failed ({})", stage.name, status);
        }
        info!("stage {} finished", stage.name);
    }

    let model = args.data_dir.join(MODELING_DIR).join(train::MODEL_FILE);
    let log_file = args.data_dir.join(PROCESSED_DIR).join("simulations.csv");
    info!(
        "pipeline complete; try a single shot with: shotcast simulate --model {} --log-file {}",
        model.display(),
        log_file.display()
    );
    Ok(())
}

/// The three stage invocations, in execution order.
fn stage_commands(args: &RunArgs, tracking_db: &Path) -> Vec<StageCommand> {
    let raw_dev = args.data_dir.join(RAW_DIR).join(DEV_FILE);
    let raw_prod = args.data_dir.join(RAW_DIR).join(PROD_FILE);
    let processed = args.data_dir.join(PROCESSED_DIR);
    let modeling = args.data_dir.join(MODELING_DIR);
    let db = path_arg(tracking_db);

    vec![
        StageCommand {
            name: "prepare",
            args: vec![
                "prepare".into(),
                path_arg(&raw_dev),
                path_arg(&raw_prod),
                path_arg(&processed),
                "--seed".into(),
                args.seed.to_string(),
                "--tracking-db".into(),
                db.clone(),
            ],
        },
        StageCommand {
            name: "train",
            args: vec![
                "train".into(),
                path_arg(&processed.join(prepare::TRAIN_FILE)),
                path_arg(&processed.join(prepare::TEST_FILE)),
                path_arg(&modeling),
                "--seed".into(),
                args.seed.to_string(),
                "--tracking-db".into(),
                db.clone(),
            ],
        },
        StageCommand {
            name: "score",
            args: vec![
                "score".into(),
                path_arg(&modeling.join(train::MODEL_FILE)),
                path_arg(&raw_prod),
                path_arg(&processed),
                "--threshold".into(),
                args.threshold.to_string(),
                "--tracking-db".into(),
                db,
            ],
        },
    ]
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
