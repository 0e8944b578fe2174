use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use super::{RawTable, ScoredRecord, ShotRecord, FEATURE_COLUMNS, LABEL_COLUMN};
use crate::error::{PipelineError, Result};

/// Columns added by the scorer on top of the canonical set.
pub const PROBA_COLUMN: &str = "proba";
pub const PREDICTION_COLUMN: &str = "prediction";

/// Read a parquet snapshot into row form.
///
/// All six feature columns must exist (missing one is a schema error); the
/// label column is optional and its values keep their nulls. Integer
/// columns are widened to f64, anything non-numeric fails.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;

    let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(FEATURE_COLUMNS.len());
    for name in FEATURE_COLUMNS {
        let values = numeric_column(&df, name)?
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        columns.push(values);
    }
    let labels = numeric_column(&df, LABEL_COLUMN)?;

    let mut features = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = [None; 6];
        for (j, column) in columns.iter().enumerate() {
            row[j] = column[i];
        }
        features.push(row);
    }

    Ok(RawTable { features, labels })
}

/// Write filtered/split snapshots: the six features plus the label column.
pub fn write_records(path: &Path, records: &[ShotRecord]) -> Result<()> {
    let mut columns = feature_columns(records.iter().map(|r| r.features()));
    let labels: Vec<Option<f64>> = records.iter().map(|r| r.shot_made_flag).collect();
    columns.push(Series::new(LABEL_COLUMN.into(), labels).into());
    write_frame(path, columns)
}

/// Write the scored-predictions snapshot: features, label (nulls kept),
/// positive-class probability and the thresholded prediction.
pub fn write_scored(path: &Path, records: &[ScoredRecord]) -> Result<()> {
    let mut columns = feature_columns(records.iter().map(|r| r.shot.features()));
    let labels: Vec<Option<f64>> = records.iter().map(|r| r.shot.shot_made_flag).collect();
    columns.push(Series::new(LABEL_COLUMN.into(), labels).into());
    let probas: Vec<f64> = records.iter().map(|r| r.probability).collect();
    columns.push(Series::new(PROBA_COLUMN.into(), probas).into());
    let predictions: Vec<i64> = records.iter().map(|r| r.prediction).collect();
    columns.push(Series::new(PREDICTION_COLUMN.into(), predictions).into());
    write_frame(path, columns)
}

fn feature_columns(rows: impl Iterator<Item = [f64; 6]> + Clone) -> Vec<Column> {
    FEATURE_COLUMNS
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = rows.clone().map(|row| row[j]).collect();
            Series::new((*name).into(), values).into()
        })
        .collect()
}

fn write_frame(path: &Path, columns: Vec<Column>) -> Result<()> {
    let mut df = DataFrame::new(columns)?;
    let file = File::create(path)?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

/// Some(values) when the column exists, None when it is absent entirely.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lat: f64, label: Option<f64>) -> ShotRecord {
        ShotRecord {
            lat,
            lon: -118.2,
            minutes_remaining: 5.0,
            period: 2.0,
            playoffs: 0.0,
            shot_distance: 12.0,
            shot_made_flag: label,
        }
    }

    #[test]
    fn roundtrip_preserves_label_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.parquet");
        let records = vec![
            record(33.8, Some(1.0)),
            record(33.9, None),
            record(34.0, Some(0.0)),
        ];
        write_records(&path, &records).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.height(), 3);
        let labels = table.labels.as_ref().unwrap();
        assert_eq!(labels, &vec![Some(1.0), None, Some(0.0)]);
        assert_eq!(table.features[1][0], Some(33.9));
    }

    #[test]
    fn missing_feature_column_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.parquet");

        // Snapshot lacking the `lon` column.
        let mut df = DataFrame::new(vec![
            Series::new("lat".into(), vec![33.9_f64]).into(),
            Series::new("minutes_remaining".into(), vec![5.0_f64]).into(),
            Series::new("period".into(), vec![2.0_f64]).into(),
            Series::new("playoffs".into(), vec![0.0_f64]).into(),
            Series::new("shot_distance".into(), vec![12.0_f64]).into(),
        ])
        .unwrap();
        ParquetWriter::new(File::create(&path).unwrap())
            .finish(&mut df)
            .unwrap();

        let err = read_table(&path).unwrap_err();
        match err {
            PipelineError::MissingColumn(column) => assert_eq!(column, "lon"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn absent_label_column_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unlabeled.parquet");

        let columns: Vec<Column> = FEATURE_COLUMNS
            .iter()
            .map(|name| Series::new((*name).into(), vec![1.0_f64, 2.0]).into())
            .collect();
        let mut df = DataFrame::new(columns).unwrap();
        ParquetWriter::new(File::create(&path).unwrap())
            .finish(&mut df)
            .unwrap();

        let table = read_table(&path).unwrap();
        assert!(table.labels.is_none());
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn integer_columns_are_widened_to_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ints.parquet");

        let mut columns: Vec<Column> = FEATURE_COLUMNS
            .iter()
            .map(|name| Series::new((*name).into(), vec![3_i64, 7]).into())
            .collect();
        columns.push(Series::new(LABEL_COLUMN.into(), vec![0_i64, 1]).into());
        let mut df = DataFrame::new(columns).unwrap();
        ParquetWriter::new(File::create(&path).unwrap())
            .finish(&mut df)
            .unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.features[0][3], Some(3.0));
        assert_eq!(table.labels.as_ref().unwrap()[1], Some(1.0));
    }

    #[test]
    fn scored_snapshot_carries_proba_and_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scored.parquet");
        let scored = vec![
            ScoredRecord {
                shot: record(33.8, None),
                probability: 0.72,
                prediction: 1,
            },
            ScoredRecord {
                shot: record(33.9, Some(0.0)),
                probability: 0.15,
                prediction: 0,
            },
        ];
        write_scored(&path, &scored).unwrap();

        let df = ParquetReader::new(File::open(&path).unwrap())
            .finish()
            .unwrap();
        assert_eq!(df.height(), 2);
        assert!(df.column(PROBA_COLUMN).is_ok());
        let predictions: Vec<Option<i64>> = df
            .column(PREDICTION_COLUMN)
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(predictions, vec![Some(1), Some(0)]);
    }
}
