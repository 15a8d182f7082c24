use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::metadata::RowGroupMetaData;
use std::{env, fs::File, path::Path, process::exit};

const PREVIEW_ROWS: usize = 5;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <PARQUET_FILE>", args[0]);
        exit(1);
    }
    if let Err(e) = inspect(Path::new(&args[1])) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Print file metadata, the Arrow schema, per-row-group sizes and the first
/// few rows of a published table.
fn inspect(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading Parquet metadata of {}", path.display()))?;

    let meta = builder.metadata().clone();
    let file_meta = meta.file_metadata();
    let size_on_disk = std::fs::metadata(path)?.len();

    println!("=== Parquet File: {} ===", path.display());
    println!(
        "Created by:           {}",
        file_meta.created_by().unwrap_or("<unknown>")
    );
    println!("Total rows:           {}", file_meta.num_rows());
    println!("Number of row groups: {}", meta.num_row_groups());
    println!("File-size on disk:    {} bytes", size_on_disk);
    println!();

    println!("=== Schema ===");
    for field in builder.schema().fields() {
        println!(
            "- {:<24} | {:<20} | nullable: {}",
            field.name(),
            format!("{}", field.data_type()),
            field.is_nullable()
        );
    }
    println!();

    for (idx, rg) in meta.row_groups().iter().enumerate() {
        print_row_group(idx, rg);
    }

    let reader = builder
        .with_batch_size(PREVIEW_ROWS)
        .build()
        .context("building record batch reader")?;
    if let Some(batch) = reader.into_iter().next() {
        let batch = batch.context("reading first batch")?;
        let preview = batch.slice(0, batch.num_rows().min(PREVIEW_ROWS));
        println!("=== First {} rows ===", preview.num_rows());
        println!("{}", pretty_format_batches(&[preview])?);
    }
    Ok(())
}

fn print_row_group(idx: usize, rg: &RowGroupMetaData) {
    println!("--- Row Group {} ---", idx);
    println!("  Rows:              {}", rg.num_rows());
    println!("  Uncompressed size: {} bytes", rg.total_byte_size());
    println!("  Compressed size:   {} bytes", rg.compressed_size());
    for col in rg.columns() {
        let nulls = col
            .statistics()
            .and_then(|s| s.null_count_opt())
            .map_or("-".to_string(), |n| n.to_string());
        println!(
            "  > {:<24} {:?}, nulls: {}",
            col.column_descr().name(),
            col.compression(),
            nulls
        );
    }
    println!();
}
