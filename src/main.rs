use anyhow::{Context, Result};
use chrono::Utc;
use sbaloans::{
    config::PipelineConfig,
    history::{RunHistory, RunRecord},
    pipeline,
};
use std::{env, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <CONFIG_YAML>", args[0]);
        exit(2);
    }

    if let Err(e) = run(PathBuf::from(&args[1])) {
        error!(error = %format!("{:#}", e), "refresh failed; previous output left in place");
        exit(1);
    }
}

fn run(config_path: PathBuf) -> Result<()> {
    let started_at = Utc::now();
    info!(config = %config_path.display(), "startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let cfg = PipelineConfig::load(&config_path)?;
    info!(
        sources = cfg.sources.len(),
        generations = cfg.generations.len(),
        out = %cfg.output_dir.display(),
        "loaded config"
    );

    // ─── 3) ingest & publish ─────────────────────────────────────────
    let output = pipeline::run(&cfg)?;
    let published = pipeline::publish(&output, &cfg.output_dir)?;
    output.report.log_summary();

    // ─── 4) record the run ───────────────────────────────────────────
    if let Some(dir) = &cfg.history_dir {
        let ledger = RunHistory::new(dir)?;
        let record = RunRecord::new(
            started_at,
            Utc::now(),
            &output.report,
            published.output_dir.display().to_string(),
        );
        let path = ledger
            .record_run(&record)
            .context("recording run in ledger")?;
        info!(ledger = %path.display(), "run recorded");
    }

    info!(
        loans = published.loans,
        canonical_bytes = published.canonical_bytes,
        metrics_bytes = published.metrics_bytes,
        "refresh complete"
    );
    Ok(())
}
