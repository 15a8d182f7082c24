// src/pipeline/source.rs

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use glob::glob;
use std::{
    collections::BTreeSet,
    fs::File,
    io::{Cursor, Read},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};
use zip::ZipArchive;

use crate::config::SourceConfig;
use crate::schema::RawRecord;

/// A row the reader could not decode. Counted and dropped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub file: String,
    pub row: u64,
    pub message: String,
}

pub type SourceRow = std::result::Result<RawRecord, RowError>;

/// Everything one extract yielded, in file then row order.
#[derive(Debug, Clone)]
pub struct Extract {
    pub name: String,
    pub generation: String,
    /// Every header seen across the extract's files.
    pub headers: BTreeSet<String>,
    pub rows: Vec<SourceRow>,
}

/// A supplier of raw rows for one extract. `read` failing means the extract
/// is unavailable, which aborts the run.
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;
    fn generation(&self) -> &str;
    fn read(&self) -> Result<Extract>;
}

/// Delimited text files, or ZIP archives of them, matched by a glob.
#[derive(Debug, Clone)]
pub struct CsvSource {
    name: String,
    pattern: String,
    generation: String,
    delimiter: u8,
}

impl CsvSource {
    pub fn new(name: &str, pattern: &str, generation: &str, delimiter: u8) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            generation: generation.to_string(),
            delimiter,
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Self {
        Self::new(&cfg.name, &cfg.path, &cfg.generation, cfg.delimiter as u8)
    }

    fn matched_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in glob(&self.pattern)
            .with_context(|| format!("invalid glob pattern `{}`", self.pattern))?
        {
            let path = entry.with_context(|| format!("reading match for `{}`", self.pattern))?;
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_delimited(
        &self,
        data: impl Read,
        file_name: &str,
        out: &mut Extract,
    ) -> Result<()> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let headers: Vec<String> = rdr
            .byte_headers()
            .with_context(|| format!("reading header row of {}", file_name))?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();
        out.headers.extend(headers.iter().cloned());

        let mut count = 0u64;
        for (idx, result) in rdr.byte_records().enumerate() {
            let row = idx as u64 + 1;
            match result {
                Ok(record) => {
                    let mut raw = RawRecord::new();
                    for (name, value) in headers.iter().zip(record.iter()) {
                        raw.insert(name.as_str(), String::from_utf8_lossy(value));
                    }
                    out.rows.push(Ok(raw));
                }
                Err(e) => out.rows.push(Err(RowError {
                    file: file_name.to_string(),
                    row,
                    message: e.to_string(),
                })),
            }
            count += 1;
        }
        debug!(file = file_name, rows = count, "read delimited file");
        Ok(())
    }

    /// Buffer every `.csv` entry of the archive, then parse them in archive order.
    fn read_zip(&self, path: &Path, out: &mut Extract) -> Result<()> {
        let file = File::open(path).with_context(|| format!("opening ZIP {}", path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("reading ZIP archive {}", path.display()))?;

        let mut buffers: Vec<(String, Vec<u8>)> = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("accessing ZIP entry #{} in {}", i, path.display()))?;
            let name = entry.name().to_string();
            if entry.is_file() && name.to_lowercase().ends_with(".csv") {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut buf)
                    .with_context(|| format!("reading {} into memory", name))?;
                buffers.push((name, buf));
            }
        }
        drop(archive);

        if buffers.is_empty() {
            bail!("ZIP {} contains no .csv entries", path.display());
        }
        for (name, data) in buffers {
            let label = format!("{}!{}", path.display(), name);
            self.read_delimited(Cursor::new(data), &label, out)?;
        }
        Ok(())
    }
}

impl RecordSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn generation(&self) -> &str {
        &self.generation
    }

    #[instrument(level = "info", skip(self), fields(source = %self.name))]
    fn read(&self) -> Result<Extract> {
        let paths = self.matched_paths()?;
        if paths.is_empty() {
            bail!(
                "source `{}` is unavailable: nothing matches `{}`",
                self.name,
                self.pattern
            );
        }

        let mut out = Extract {
            name: self.name.clone(),
            generation: self.generation.clone(),
            headers: BTreeSet::new(),
            rows: Vec::new(),
        };
        for path in &paths {
            let is_zip = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
            if is_zip {
                self.read_zip(path, &mut out)?;
            } else {
                let file =
                    File::open(path).with_context(|| format!("opening {}", path.display()))?;
                self.read_delimited(file, &path.display().to_string(), &mut out)?;
            }
        }
        Ok(out)
    }
}

/// Rows already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    generation: String,
    rows: Vec<RawRecord>,
}

impl MemorySource {
    pub fn new(name: &str, generation: &str, rows: Vec<RawRecord>) -> Self {
        Self {
            name: name.to_string(),
            generation: generation.to_string(),
            rows,
        }
    }
}

impl RecordSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn generation(&self) -> &str {
        &self.generation
    }

    fn read(&self) -> Result<Extract> {
        let mut headers = BTreeSet::new();
        for row in &self.rows {
            headers.extend(row.names().map(str::to_string));
        }
        Ok(Extract {
            name: self.name.clone(),
            generation: self.generation.clone(),
            headers,
            rows: self.rows.iter().cloned().map(Ok).collect(),
        })
    }
}
