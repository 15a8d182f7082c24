// src/pipeline/mod.rs
//! One refresh: read every extract, transform rows in parallel, order and
//! number the accepted loans, then publish the outputs as a unit.

pub mod quality;
pub mod source;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, info, instrument, warn};

use crate::config::{GenerationMapping, PipelineConfig};
use crate::identity::{assign_ids, sort_for_assignment};
use crate::metrics::metrics_to_batch;
use crate::schema::{loans_to_batch, write_json, write_parquet, CanonicalLoan, LoanRecord};
use crate::transform::{Outcome, RecordTransformer, RejectReason};

pub use quality::{ColumnCounts, ColumnSummary, QualityReport, QualitySummary, SourceCounts};
pub use source::{CsvSource, Extract, MemorySource, RecordSource, RowError, SourceRow};

pub const CANONICAL_FILE: &str = "canonical_loans.parquet";
pub const METRICS_FILE: &str = "loan_metrics.parquet";
pub const REPORT_FILE: &str = "quality_report.json";

/// Result of [`ingest`]: the numbered loans and the run's counters.
#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub loans: Vec<CanonicalLoan>,
    pub report: QualityReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    pub output_dir: PathBuf,
    pub loans: usize,
    pub canonical_bytes: u64,
    pub metrics_bytes: u64,
}

/// File-backed sources in configuration order.
pub fn sources_from_config(cfg: &PipelineConfig) -> Vec<Box<dyn RecordSource>> {
    cfg.sources
        .iter()
        .map(|s| Box::new(CsvSource::from_config(s)) as Box<dyn RecordSource>)
        .collect()
}

fn check_headers(extract: &Extract, mapping: &GenerationMapping) {
    let missing: Vec<&str> = mapping
        .columns
        .keys()
        .filter(|name| !extract.headers.contains(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        warn!(
            source = %extract.name,
            generation = %extract.generation,
            ?missing,
            "mapped columns absent from extract; values will be empty"
        );
    }
    let unmapped: Vec<&str> = extract
        .headers
        .iter()
        .filter(|h| !mapping.columns.contains_key(h.as_str()))
        .map(String::as_str)
        .collect();
    if !unmapped.is_empty() {
        warn!(source = %extract.name, ?unmapped, "ignoring unmapped columns");
    }
}

/// Transform one extract. Accepted records keep row order; the report is
/// folded per rayon split and merged.
fn transform_extract(
    extract: &Extract,
    transformer: &RecordTransformer<'_>,
) -> (Vec<LoanRecord>, QualityReport) {
    let outcomes: Vec<std::result::Result<Outcome, &RowError>> = extract
        .rows
        .par_iter()
        .map(|row| match row {
            Ok(raw) => Ok(transformer.transform(raw)),
            Err(e) => Err(e),
        })
        .collect();

    let source = extract.name.as_str();
    let report = outcomes
        .par_iter()
        .fold(QualityReport::new, |mut report, outcome| {
            match outcome {
                Ok(out) => {
                    if let Outcome::Rejected(reason) = out {
                        debug!(source, %reason, "row rejected");
                    }
                    report.record(source, out);
                }
                Err(e) => {
                    debug!(source, file = %e.file, row = e.row, error = %e.message, "undecodable row");
                    report.record_rejection(source, RejectReason::MalformedRow, true);
                }
            }
            report
        })
        .reduce(QualityReport::new, QualityReport::merge);

    let records = outcomes
        .into_iter()
        .filter_map(|o| o.ok().and_then(Outcome::accepted))
        .map(|a| a.loan)
        .collect();
    (records, report)
}

/// Read, transform, sort and number. Any source failing to read aborts the
/// run before anything is produced; bad rows only show up in the report.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub fn ingest(cfg: &PipelineConfig, sources: &[Box<dyn RecordSource>]) -> Result<IngestOutput> {
    let start = Instant::now();

    let extracts = sources
        .iter()
        .map(|s| {
            s.read()
                .with_context(|| format!("reading source `{}`", s.name()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut accepted: Vec<LoanRecord> = Vec::new();
    let mut report = QualityReport::new();
    for extract in &extracts {
        let mapping = cfg.generations.get(&extract.generation).with_context(|| {
            format!(
                "source `{}` uses unknown generation `{}`",
                extract.name, extract.generation
            )
        })?;
        check_headers(extract, mapping);

        let transformer = RecordTransformer::new(mapping, &cfg.normalize);
        let (records, part) = transform_extract(extract, &transformer);
        info!(
            source = %extract.name,
            rows = extract.rows.len(),
            accepted = records.len(),
            "transformed extract"
        );
        accepted.extend(records);
        report = report.merge(part);
    }

    sort_for_assignment(&mut accepted);
    let loans = assign_ids(&cfg.identity, accepted);

    info!(
        loans = loans.len(),
        rejected = report.rows_rejected,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "ingestion complete"
    );
    Ok(IngestOutput { loans, report })
}

/// [`ingest`] over the sources named in `cfg`.
pub fn run(cfg: &PipelineConfig) -> Result<IngestOutput> {
    ingest(cfg, &sources_from_config(cfg))
}

fn write_outputs(output: &IngestOutput, dir: &Path) -> Result<(u64, u64)> {
    let canonical = loans_to_batch(&output.loans)?;
    let canonical_bytes = write_parquet(&dir.join(CANONICAL_FILE), &canonical)
        .context("writing canonical table")?;
    let metrics = metrics_to_batch(&output.loans)?;
    let metrics_bytes =
        write_parquet(&dir.join(METRICS_FILE), &metrics).context("writing metrics table")?;
    write_json(&dir.join(REPORT_FILE), &output.report.summary())
        .context("writing quality report")?;
    Ok((canonical_bytes, metrics_bytes))
}

/// A run that stopped between moving the old output aside and swapping in
/// the new one leaves `previous` as the only copy. Put it back.
fn recover_interrupted_swap(out_dir: &Path, previous: &Path) -> Result<bool> {
    if out_dir.exists() || !previous.exists() {
        return Ok(false);
    }
    warn!(
        from = %previous.display(),
        to = %out_dir.display(),
        "restoring output left aside by an interrupted publish"
    );
    fs::rename(previous, out_dir)
        .with_context(|| format!("restoring {}", out_dir.display()))?;
    Ok(true)
}

/// Write every output into a sibling staging directory, then swap it in for
/// `out_dir`. Until the swap the previous contents of `out_dir` are
/// untouched; on a failed swap they are put back.
#[instrument(level = "info", skip(output), fields(loans = output.loans.len()))]
pub fn publish(output: &IngestOutput, out_dir: &Path) -> Result<PublishSummary> {
    let parent = out_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dir_name = out_dir
        .file_name()
        .with_context(|| format!("output path {} has no directory name", out_dir.display()))?
        .to_string_lossy()
        .to_string();
    fs::create_dir_all(parent)
        .with_context(|| format!("creating parent of {}", out_dir.display()))?;

    let staging = parent.join(format!(".{}.staging", dir_name));
    let previous = parent.join(format!(".{}.previous", dir_name));
    recover_interrupted_swap(out_dir, &previous)?;
    for leftover in [&staging, &previous] {
        if leftover.exists() {
            fs::remove_dir_all(leftover)
                .with_context(|| format!("clearing leftover {}", leftover.display()))?;
        }
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("creating staging dir {}", staging.display()))?;

    let (canonical_bytes, metrics_bytes) = match write_outputs(output, &staging) {
        Ok(sizes) => sizes,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    let had_previous = out_dir.exists();
    if had_previous {
        fs::rename(out_dir, &previous)
            .with_context(|| format!("moving aside {}", out_dir.display()))?;
    }
    if let Err(e) = fs::rename(&staging, out_dir) {
        if had_previous {
            let _ = fs::rename(&previous, out_dir);
        }
        return Err(e).with_context(|| format!("swapping in {}", out_dir.display()));
    }
    if had_previous {
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!(path = %previous.display(), error = %e, "could not remove previous output");
        }
    }

    info!(
        dir = %out_dir.display(),
        canonical_bytes,
        metrics_bytes,
        "published outputs"
    );
    Ok(PublishSummary {
        output_dir: out_dir.to_path_buf(),
        loans: output.loans.len(),
        canonical_bytes,
        metrics_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IdentityConfig, NormalizeSettings, SourceConfig};
    use crate::schema::{Column, LoanField, RawRecord};
    use anyhow::bail;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,sbaloans::pipeline=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn config() -> PipelineConfig {
        let mut generations = BTreeMap::new();
        generations.insert(
            "legacy".to_string(),
            GenerationMapping::new([
                ("LoanNr_ChkDgt", LoanField::LenderLocationId),
                ("Name", LoanField::BusinessName),
                ("ApprovalDate", LoanField::ApprovalDate),
                ("ApprovalFY", LoanField::ApprovalFiscalYear),
                ("GrAppv", LoanField::GrossApproved),
            ]),
        );
        generations.insert(
            "foia".to_string(),
            GenerationMapping::new([
                ("LocationID", LoanField::LenderLocationId),
                ("BorrName", LoanField::BusinessName),
                ("ApprovalDate", LoanField::ApprovalDate),
                ("ApprovalFiscalYear", LoanField::ApprovalFiscalYear),
                ("GrossApproval", LoanField::GrossApproved),
            ]),
        );
        PipelineConfig {
            output_dir: PathBuf::from("out"),
            history_dir: None,
            identity: IdentityConfig::default(),
            normalize: NormalizeSettings::default(),
            sources: vec![
                SourceConfig {
                    name: "early".into(),
                    path: "unused".into(),
                    generation: "legacy".into(),
                    delimiter: ',',
                },
                SourceConfig {
                    name: "late".into(),
                    path: "unused".into(),
                    generation: "foia".into(),
                    delimiter: ',',
                },
            ],
            generations,
        }
    }

    fn scenario_sources() -> Vec<Box<dyn RecordSource>> {
        vec![
            Box::new(MemorySource::new(
                "early",
                "legacy",
                vec![
                    RawRecord::from_pairs([
                        ("LoanNr_ChkDgt", "1001"),
                        ("Name", "Zephyr Tools"),
                        ("ApprovalDate", "03/15/2004"),
                        ("ApprovalFY", "2004"),
                        ("GrAppv", "50000"),
                    ]),
                    RawRecord::from_pairs([
                        ("LoanNr_ChkDgt", ""),
                        ("Name", "Nobody"),
                        ("ApprovalDate", "03/15/2004"),
                        ("ApprovalFY", "2004"),
                        ("GrAppv", "1"),
                    ]),
                ],
            )),
            Box::new(MemorySource::new(
                "late",
                "foia",
                vec![
                    RawRecord::from_pairs([
                        ("LocationID", "2002"),
                        ("BorrName", "Acme Diner"),
                        ("ApprovalDate", "2004-13-40"),
                        ("ApprovalFiscalYear", "2004"),
                        ("GrossApproval", "25000"),
                    ]),
                    RawRecord::from_pairs([
                        ("LocationID", "3003"),
                        ("BorrName", "Bolt Works"),
                        ("ApprovalDate", "2003-11-02"),
                        ("ApprovalFiscalYear", "2004"),
                        ("GrossApproval", "$1,234.50"),
                    ]),
                ],
            )),
        ]
    }

    #[test]
    fn two_generations_end_to_end() -> Result<()> {
        init_test_logging();
        let out = ingest(&config(), &scenario_sources())?;

        assert_eq!(out.loans.len(), 3);
        assert_eq!(out.report.rows_seen, 4);
        assert_eq!(out.report.rows_rejected, 1);
        assert_eq!(out.report.rejections[&RejectReason::MissingIdentifier], 1);
        assert_eq!(out.report.column(Column::ApprovalDate).invalid, 1);

        // FY 2004 throughout: dated rows first by date, the undated one last.
        let ids: Vec<(&str, &str)> = out
            .loans
            .iter()
            .map(|l| (l.id.as_str(), l.loan.lender_location_id.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("SBA-00000001", "3003"),
                ("SBA-00000002", "1001"),
                ("SBA-00000003", "2002"),
            ]
        );
        assert_eq!(
            out.loans[0].loan.gross_approved.map(|d| d.to_string()),
            Some("1234.50".to_string())
        );
        Ok(())
    }

    #[test]
    fn blank_identifier_drops_exactly_one_row() -> Result<()> {
        let row = |id: &str| {
            RawRecord::from_pairs([("LocationID", id), ("BorrName", "Same Co"), ("GrossApproval", "10")])
        };
        let sources: Vec<Box<dyn RecordSource>> = vec![Box::new(MemorySource::new(
            "late",
            "foia",
            vec![row("77"), row(" ")],
        ))];
        let out = ingest(&config(), &sources)?;
        assert_eq!(out.loans.len(), 1);
        assert_eq!(out.report.rows_rejected, 1);
        Ok(())
    }

    struct BrokenRows;

    impl RecordSource for BrokenRows {
        fn name(&self) -> &str {
            "broken"
        }
        fn generation(&self) -> &str {
            "foia"
        }
        fn read(&self) -> Result<Extract> {
            Ok(Extract {
                name: "broken".into(),
                generation: "foia".into(),
                headers: BTreeSet::from(["LocationID".to_string()]),
                rows: vec![
                    Ok(RawRecord::from_pairs([("LocationID", "9")])),
                    Err(RowError {
                        file: "x.csv".into(),
                        row: 2,
                        message: "invalid UTF-8".into(),
                    }),
                ],
            })
        }
    }

    struct Unavailable;

    impl RecordSource for Unavailable {
        fn name(&self) -> &str {
            "gone"
        }
        fn generation(&self) -> &str {
            "foia"
        }
        fn read(&self) -> Result<Extract> {
            bail!("extract gone")
        }
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() -> Result<()> {
        let sources: Vec<Box<dyn RecordSource>> = vec![Box::new(BrokenRows)];
        let out = ingest(&config(), &sources)?;
        assert_eq!(out.loans.len(), 1);
        assert_eq!(out.report.rows_seen, 2);
        assert_eq!(out.report.rejections[&RejectReason::MalformedRow], 1);
        assert_eq!(out.report.sources["broken"].rejected, 1);
        Ok(())
    }

    #[test]
    fn unavailable_source_fails_the_run() {
        let mut sources = scenario_sources();
        sources.push(Box::new(Unavailable));
        let err = ingest(&config(), &sources).unwrap_err();
        assert!(format!("{:#}", err).contains("reading source `gone`"));
    }

    #[test]
    fn interrupted_swap_is_restored_before_cleanup() -> Result<()> {
        let dir = tempdir()?;
        let out_dir = dir.path().join("current");
        let previous = dir.path().join(".current.previous");
        fs::create_dir_all(&previous)?;
        fs::write(previous.join(CANONICAL_FILE), "last good")?;

        assert!(recover_interrupted_swap(&out_dir, &previous)?);
        assert!(!previous.exists());
        assert_eq!(fs::read_to_string(out_dir.join(CANONICAL_FILE))?, "last good");

        // Nothing to do once the output is in place.
        assert!(!recover_interrupted_swap(&out_dir, &previous)?);
        Ok(())
    }

    #[test]
    fn publish_after_interrupted_swap_leaves_one_directory() -> Result<()> {
        let dir = tempdir()?;
        let previous = dir.path().join(".current.previous");
        fs::create_dir_all(&previous)?;
        fs::write(previous.join("stale.txt"), "old")?;

        let out_dir = dir.path().join("current");
        publish(&ingest(&config(), &scenario_sources())?, &out_dir)?;
        assert!(out_dir.join(CANONICAL_FILE).exists());
        assert!(!out_dir.join("stale.txt").exists());
        assert!(!previous.exists());
        Ok(())
    }

    #[test]
    fn publish_replaces_previous_output() -> Result<()> {
        let dir = tempdir()?;
        let out_dir = dir.path().join("current");
        fs::create_dir_all(&out_dir)?;
        fs::write(out_dir.join("stale.txt"), "old")?;

        let out = ingest(&config(), &scenario_sources())?;
        let summary = publish(&out, &out_dir)?;
        assert_eq!(summary.loans, 3);
        assert!(summary.canonical_bytes > 0);

        assert!(out_dir.join(CANONICAL_FILE).exists());
        assert!(out_dir.join(METRICS_FILE).exists());
        assert!(out_dir.join(REPORT_FILE).exists());
        assert!(!out_dir.join("stale.txt").exists());

        let leftovers: Vec<_> = fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["current".to_string()]);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join(REPORT_FILE))?)?;
        assert_eq!(report["rows_accepted"], 3);
        assert_eq!(report["rows_rejected"], 1);
        Ok(())
    }
}
