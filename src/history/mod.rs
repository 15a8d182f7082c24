// src/history/mod.rs

use anyhow::{bail, Context, Result};
use arrow::{
    array::{Array, Int64Array, StringArray, TimestampMicrosecondArray, UInt64Array},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{DateTime, TimeZone, Utc};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::{self, File},
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, warn};

use crate::pipeline::QualityReport;
use crate::schema::write_parquet;

/// One completed refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_seen: u64,
    pub rows_accepted: u64,
    pub rows_rejected: u64,
    pub output_dir: String,
}

impl RunRecord {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        report: &QualityReport,
        output_dir: impl Into<String>,
    ) -> Self {
        Self {
            started_at,
            finished_at,
            rows_seen: report.rows_seen,
            rows_accepted: report.rows_accepted,
            rows_rejected: report.rows_rejected,
            output_dir: output_dir.into(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

fn run_schema() -> Arc<Schema> {
    let ts = DataType::Timestamp(TimeUnit::Microsecond, None);
    Arc::new(Schema::new(vec![
        Field::new("started_at", ts.clone(), false),
        Field::new("finished_at", ts, false),
        Field::new("duration_ms", DataType::Int64, false),
        Field::new("rows_seen", DataType::UInt64, false),
        Field::new("rows_accepted", DataType::UInt64, false),
        Field::new("rows_rejected", DataType::UInt64, false),
        Field::new("output_dir", DataType::Utf8, false),
    ]))
}

fn micros_to_utc(micros: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_micros(micros)
        .single()
        .with_context(|| format!("timestamp {} out of range", micros))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .with_context(|| format!("run ledger file lacks column `{}`", name))?
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("run ledger column `{}` has unexpected type", name))
}

/// Ledger of refresh runs: one single-row Parquet file per run, named
/// `run---<started_at micros>.parquet`.
pub struct RunHistory {
    history_dir: PathBuf,
}

impl RunHistory {
    /// Open the ledger at `history_dir`, creating the directory if needed.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating history directory {}", history_dir.display()))?;
        Ok(Self { history_dir })
    }

    pub fn record_run(&self, run: &RunRecord) -> Result<PathBuf> {
        let file_name = format!("run---{}.parquet", run.started_at.timestamp_micros());
        let path = self.history_dir.join(file_name);
        if path.exists() {
            bail!("run starting at {} is already recorded", run.started_at);
        }

        let batch = RecordBatch::try_new(
            run_schema(),
            vec![
                Arc::new(TimestampMicrosecondArray::from(vec![
                    run.started_at.timestamp_micros()
                ])),
                Arc::new(TimestampMicrosecondArray::from(vec![
                    run.finished_at.timestamp_micros()
                ])),
                Arc::new(Int64Array::from(vec![run.duration_ms()])),
                Arc::new(UInt64Array::from(vec![run.rows_seen])),
                Arc::new(UInt64Array::from(vec![run.rows_accepted])),
                Arc::new(UInt64Array::from(vec![run.rows_rejected])),
                Arc::new(StringArray::from(vec![run.output_dir.clone()])),
            ],
        )
        .context("building run ledger batch")?;
        write_parquet(&path, &batch)?;
        debug!(path = %path.display(), "recorded run");
        Ok(path)
    }

    /// Every recorded run, oldest first. Unreadable files are skipped with a
    /// warning.
    pub fn load_runs(&self) -> Result<Vec<RunRecord>> {
        let pattern = format!("{}/run---*.parquet", self.history_dir.display());
        let mut runs = Vec::new();
        for entry in glob(&pattern).context("invalid glob pattern for run ledger")? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "cannot read ledger entry");
                    continue;
                }
            };
            match Self::read_file(&path) {
                Ok(mut recs) => runs.append(&mut recs),
                Err(e) => warn!(path = %path.display(), error = %format!("{:#}", e), "skipping ledger file"),
            }
        }
        runs.sort_by_key(|r| r.started_at);
        Ok(runs)
    }

    fn read_file(path: &std::path::Path) -> Result<Vec<RunRecord>> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading Parquet metadata of {}", path.display()))?
            .build()?;

        let mut out = Vec::new();
        for batch in reader {
            let batch = batch.with_context(|| format!("reading batch from {}", path.display()))?;
            let started = column::<TimestampMicrosecondArray>(&batch, "started_at")?;
            let finished = column::<TimestampMicrosecondArray>(&batch, "finished_at")?;
            let seen = column::<UInt64Array>(&batch, "rows_seen")?;
            let accepted = column::<UInt64Array>(&batch, "rows_accepted")?;
            let rejected = column::<UInt64Array>(&batch, "rows_rejected")?;
            let dir = column::<StringArray>(&batch, "output_dir")?;
            for i in 0..batch.num_rows() {
                out.push(RunRecord {
                    started_at: micros_to_utc(started.value(i))?,
                    finished_at: micros_to_utc(finished.value(i))?,
                    rows_seen: seen.value(i),
                    rows_accepted: accepted.value(i),
                    rows_rejected: rejected.value(i),
                    output_dir: dir.value(i).to_string(),
                });
            }
        }
        Ok(out)
    }
}
