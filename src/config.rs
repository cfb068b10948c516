// Pipeline configuration
// Defaults reproduce the classic run; a TOML file and CLI flags override them.

use crate::error::{EtlError, Result};
use crate::model::{derived_column, is_sql_identifier, DEFAULT_NAME_COLUMN, DEFAULT_USD_COLUMN};
use crate::transform::normalize_currencies;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE_URL: &str =
    "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";
pub const DEFAULT_RATES_URL: &str = "https://cf-courses-data.s3.us.cloud-object-storage.appdomain.cloud/IBMSkillsNetwork-PY0221EN-Coursera/labs/v2/exchange_rate.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Ranking page URL (ignored when `source_file` is set)
    pub source_url: String,
    pub source_file: Option<PathBuf>,

    /// Exchange-rate CSV URL (ignored when `rates_file` is set)
    pub rates_url: String,
    pub rates_file: Option<PathBuf>,

    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub db_table_name: String,

    /// Derived columns, in output order
    pub target_currencies: Vec<String>,

    /// Base columns: [name, market cap in USD]
    pub table_attribs: Vec<String>,

    pub log_path: PathBuf,
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            source_file: None,
            rates_url: DEFAULT_RATES_URL.to_string(),
            rates_file: None,
            csv_path: PathBuf::from("Largest_banks_data.csv"),
            db_path: PathBuf::from("Banks.db"),
            db_table_name: "Largest_banks".to_string(),
            target_currencies: vec!["GBP".into(), "EUR".into(), "INR".into()],
            table_attribs: vec![DEFAULT_NAME_COLUMN.into(), DEFAULT_USD_COLUMN.into()],
            log_path: PathBuf::from("code_log.txt"),
            fetch_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EtlError::Config(format!("invalid config: {}", e)))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EtlError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check everything that ends up in SQL or on disk, and normalize
    /// currency codes to uppercase.
    pub fn validated(mut self) -> Result<Self> {
        if !is_sql_identifier(&self.db_table_name) {
            return Err(EtlError::Config(format!(
                "table name '{}' must match [A-Za-z_][A-Za-z0-9_]*",
                self.db_table_name
            )));
        }

        if self.table_attribs.len() != 2 {
            return Err(EtlError::Config(format!(
                "table_attribs needs exactly 2 columns (name, market cap), got {}",
                self.table_attribs.len()
            )));
        }
        if let Some(bad) = self.table_attribs.iter().find(|c| !is_sql_identifier(c)) {
            return Err(EtlError::Config(format!("column name '{}' is not a valid identifier", bad)));
        }

        if self.target_currencies.is_empty() {
            return Err(EtlError::Config("at least one target currency is required".into()));
        }
        self.target_currencies = normalize_currencies(&self.target_currencies)?;

        for (label, path) in [
            ("csv_path", &self.csv_path),
            ("db_path", &self.db_path),
            ("log_path", &self.log_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(EtlError::Config(format!("{} must not be empty", label)));
            }
        }

        if self.fetch_timeout_secs == 0 {
            return Err(EtlError::Config("fetch_timeout_secs must be positive".into()));
        }

        Ok(self)
    }

    pub fn name_column(&self) -> &str {
        self.table_attribs
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_NAME_COLUMN)
    }

    /// Column averaged by the default queries: the first target currency
    pub fn average_column(&self) -> String {
        self.target_currencies
            .first()
            .map(|code| derived_column(code))
            .unwrap_or_else(|| DEFAULT_USD_COLUMN.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default().validated().unwrap();
        assert_eq!(config.db_table_name, "Largest_banks");
        assert_eq!(config.target_currencies, vec!["GBP", "EUR", "INR"]);
        assert_eq!(config.average_column(), "MC_GBP_Billion");
        assert_eq!(config.name_column(), "Name");
    }

    #[test]
    fn test_toml_overrides_and_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            db_table_name = "Banks_2023"
            target_currencies = ["eur", "jpy"]
            source_file = "page.html"
            "#,
        )
        .unwrap()
        .validated()
        .unwrap();

        assert_eq!(config.db_table_name, "Banks_2023");
        assert_eq!(config.target_currencies, vec!["EUR", "JPY"]);
        assert_eq!(config.source_file, Some(PathBuf::from("page.html")));
        assert_eq!(config.csv_path, PathBuf::from("Largest_banks_data.csv"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = PipelineConfig::from_toml_str("db_name = \"x\"");
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let config = PipelineConfig {
            db_table_name: "banks; DROP TABLE x".into(),
            ..Default::default()
        };
        assert!(matches!(config.validated(), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_currency_validation() {
        let empty = PipelineConfig {
            target_currencies: vec![],
            ..Default::default()
        };
        assert!(empty.validated().is_err());

        let dup = PipelineConfig {
            target_currencies: vec!["GBP".into(), "gbp".into()],
            ..Default::default()
        };
        assert!(dup.validated().is_err());

        let bad = PipelineConfig {
            target_currencies: vec!["G-B".into()],
            ..Default::default()
        };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn test_table_attribs_must_be_two_identifiers() {
        let three = PipelineConfig {
            table_attribs: vec!["Name".into(), "MC_USD_Billion".into(), "Extra".into()],
            ..Default::default()
        };
        assert!(three.validated().is_err());

        let spaced = PipelineConfig {
            table_attribs: vec!["Bank Name".into(), "MC_USD_Billion".into()],
            ..Default::default()
        };
        assert!(spaced.validated().is_err());
    }
}
