// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::schema::LoanField;

/// Top-level run configuration, read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub normalize: NormalizeSettings,
    pub sources: Vec<SourceConfig>,
    pub generations: BTreeMap<String, GenerationMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub prefix: String,
    pub width: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            prefix: "SBA".into(),
            width: 8,
        }
    }
}

/// Limits applied while normalizing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    pub employee_ceiling: u32,
    pub name_max_len: usize,
    pub city_max_len: usize,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            employee_ceiling: 9999,
            name_max_len: 255,
            city_max_len: 100,
        }
    }
}

/// One raw extract. `path` is a glob; all matches belong to the extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: String,
    pub generation: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

/// Raw column name → logical field, for one generation of the source data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationMapping {
    pub columns: BTreeMap<String, LoanField>,
}

impl GenerationMapping {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, LoanField)>,
        S: Into<String>,
    {
        Self {
            columns: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Reverse lookup: logical field → raw column name.
    pub fn by_field(&self) -> HashMap<LoanField, &str> {
        self.columns
            .iter()
            .map(|(raw, field)| (*field, raw.as_str()))
            .collect()
    }

    pub fn maps(&self, field: LoanField) -> bool {
        self.columns.values().any(|f| *f == field)
    }

    /// Each logical field may be fed by at most one raw column, and the
    /// lender location id must be mapped.
    pub fn validate(&self, generation: &str) -> Result<()> {
        let mut seen: HashMap<LoanField, &str> = HashMap::new();
        for (raw, field) in &self.columns {
            if let Some(prev) = seen.insert(*field, raw) {
                bail!(
                    "generation `{}` maps both `{}` and `{}` to {:?}",
                    generation,
                    prev,
                    raw,
                    field
                );
            }
        }
        if !seen.contains_key(&LoanField::LenderLocationId) {
            bail!(
                "generation `{}` has no column mapped to lender_location_id",
                generation
            );
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Read and validate a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_yaml::from_str(text).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no sources configured");
        }
        if self.identity.prefix.trim().is_empty() {
            bail!("identity prefix must not be empty");
        }
        for (name, mapping) in &self.generations {
            mapping.validate(name)?;
        }
        for src in &self.sources {
            if !self.generations.contains_key(&src.generation) {
                bail!(
                    "source `{}` refers to unknown generation `{}`",
                    src.name,
                    src.generation
                );
            }
            if !src.delimiter.is_ascii() {
                bail!("source `{}` delimiter must be a single ASCII character", src.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
output_dir: out
identity:
  prefix: LN
sources:
  - name: early
    path: raw/early_*.csv
    generation: legacy
  - name: late
    path: raw/late.csv
    generation: foia
    delimiter: ";"
generations:
  legacy:
    LoanNr_ChkDgt: lender_location_id
    Name: business_name
    GrAppv: gross_approved
  foia:
    LocationID: lender_location_id
    BorrName: business_name
    GrossApproval: gross_approved
"#;

    #[test]
    fn loads_sample_yaml() -> Result<()> {
        let cfg = PipelineConfig::from_yaml(SAMPLE)?;
        assert_eq!(cfg.identity.prefix, "LN");
        assert_eq!(cfg.identity.width, 8);
        assert_eq!(cfg.normalize.employee_ceiling, 9999);
        assert_eq!(cfg.sources[0].delimiter, ',');
        assert_eq!(cfg.sources[1].delimiter, ';');
        let legacy = &cfg.generations["legacy"];
        assert_eq!(legacy.columns["GrAppv"], LoanField::GrossApproved);
        assert_eq!(legacy.by_field()[&LoanField::BusinessName], "Name");
        Ok(())
    }

    #[test]
    fn rejects_unknown_generation() {
        let bad = SAMPLE.replace("generation: foia", "generation: nope");
        let err = PipelineConfig::from_yaml(&bad).unwrap_err();
        assert!(err.to_string().contains("unknown generation"));
    }

    #[test]
    fn rejects_duplicate_field_mapping() {
        let mapping = GenerationMapping::new([
            ("A", LoanField::LenderLocationId),
            ("B", LoanField::City),
            ("C", LoanField::City),
        ]);
        assert!(mapping.validate("g").is_err());
    }

    #[test]
    fn rejects_generation_without_identifier() {
        let mapping = GenerationMapping::new([("B", LoanField::City)]);
        let err = mapping.validate("g").unwrap_err();
        assert!(err.to_string().contains("lender_location_id"));
    }
}
