//! `deid.toml` configuration.
//!
//! ```toml
//! dialect = "bigquery"
//!
//! [dataset]
//! input = "synpuf"
//! output_suffix = "_deid"
//!
//! [rules]
//! path = "rules.json"
//! apply_defaults = true
//! shift = "map"
//!
//! [submit]
//! write_disposition = "WRITE_TRUNCATE"
//! output_dir = "out"
//!
//! [wait]
//! retry_count = 8
//! max_poll_interval_secs = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ast::TableRef;
use crate::engine::WriteDisposition;
use crate::error::{DeidError, DeidResult};
use crate::transpiler::{Dialect, ShiftSource};

pub const CONFIG_FILE: &str = "deid.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeidConfig {
    pub dialect: Dialect,
    pub dataset: DatasetConfig,
    pub rules: RulesConfig,
    pub submit: SubmitConfig,
    pub wait: WaitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub input: Option<String>,
    pub output_suffix: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_suffix: "_deid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftMode {
    #[default]
    Random,
    Map,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub path: Option<PathBuf>,
    pub apply_defaults: bool,
    pub shift: ShiftMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    pub write_disposition: WriteDisposition,
    pub output_dir: PathBuf,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            write_disposition: WriteDisposition::default(),
            output_dir: PathBuf::from("deid-out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub retry_count: u32,
    pub max_poll_interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            retry_count: 8,
            max_poll_interval_secs: 60,
        }
    }
}

impl WaitConfig {
    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_secs(self.max_poll_interval_secs)
    }
}

impl DeidConfig {
    pub fn from_toml(text: &str) -> DeidResult<Self> {
        toml::from_str(text).map_err(|e| {
            let position = e.span().map_or(0, |span| span.start);
            DeidError::parse(position, format!("{}: {}", CONFIG_FILE, e.message()))
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> DeidResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DeidError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Load from an explicit path, `./deid.toml`, or the user config
    /// directory, in that order; defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> DeidResult<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        for candidate in Self::search_paths() {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading configuration");
                return Self::from_path(candidate);
            }
        }
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("deid").join(CONFIG_FILE));
        }
        paths
    }

    /// The input table identity, `dataset.table`.
    pub fn input_table(&self, table: &str) -> TableRef {
        match &self.dataset.input {
            Some(dataset) => TableRef::new(dataset, table),
            None => TableRef::parse(table),
        }
    }

    pub fn output_table(&self, input: &TableRef) -> TableRef {
        input.output(&self.dataset.output_suffix)
    }

    /// Shift amount source for one input table.
    pub fn shift_source(&self, input: &TableRef) -> ShiftSource {
        match self.rules.shift {
            ShiftMode::Random => ShiftSource::Random,
            ShiftMode::Map => ShiftSource::map_table(input.dataset_or_empty(), &input.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DeidConfig::from_toml("").unwrap();
        assert_eq!(config, DeidConfig::default());
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.dataset.output_suffix, "_deid");
        assert_eq!(config.submit.write_disposition, WriteDisposition::WriteEmpty);
    }

    #[test]
    fn test_full_file() {
        let config = DeidConfig::from_toml(
            r#"
            dialect = "bigquery"

            [dataset]
            input = "synpuf"

            [rules]
            path = "rules.json"
            apply_defaults = true
            shift = "map"

            [submit]
            write_disposition = "WRITE_TRUNCATE"

            [wait]
            retry_count = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect, Dialect::BigQuery);
        assert_eq!(config.rules.path, Some(PathBuf::from("rules.json")));
        assert!(config.rules.apply_defaults);
        assert_eq!(config.submit.write_disposition, WriteDisposition::WriteTruncate);
        assert_eq!(config.wait.retry_count, 3);
        assert_eq!(config.wait.max_poll_interval(), Duration::from_secs(60));

        let input = config.input_table("person");
        assert_eq!(input.to_string(), "synpuf.person");
        assert_eq!(config.output_table(&input).to_string(), "synpuf_deid.person");
        assert_eq!(config.shift_source(&input), ShiftSource::map_table("synpuf", "person"));
    }

    #[test]
    fn test_map_shift_without_input_dataset() {
        let config = DeidConfig::from_toml("[rules]\nshift = \"map\"\n").unwrap();
        let input = config.input_table("person");
        let source = config.shift_source(&input);
        assert_eq!(source, ShiftSource::map_table("", "person"));
        assert_eq!(
            source.amount(Dialect::Sqlite.profile()),
            "SELECT shift FROM :idataset.deid_map WHERE deid_map.person_id = person.person_id"
        );
    }

    #[test]
    fn test_unknown_dialect_is_rejected() {
        let err = DeidConfig::from_toml(r#"dialect = "oracle""#).unwrap_err();
        assert!(matches!(err, DeidError::Parse { .. }));
    }

    #[test]
    fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "dialect = \"postgresql\"\n").unwrap();
        assert_eq!(DeidConfig::load(Some(&path)).unwrap().dialect, Dialect::Postgres);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(DeidConfig::load(Some(&missing)), Err(DeidError::Config(_))));
    }
}
