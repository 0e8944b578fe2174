//! Pipeline stages and the end-to-end driver.
//!
//! Each stage is a self-contained batch step over files: `prepare` turns the
//! raw snapshots into training bases, `train` fits and picks a classifier,
//! `score` applies it to a snapshot, `simulate` scores a single shot from
//! the command line. `driver` chains prepare, train and score as child
//! processes. Stages record themselves under these experiment names.

pub mod driver;
pub mod prepare;
pub mod score;
pub mod simulate;
pub mod train;

pub const EXPERIMENT_PREPARATION: &str = "data_preparation";
pub const EXPERIMENT_TRAINING: &str = "training";
pub const EXPERIMENT_SCORING: &str = "scoring";
