// Error taxonomy for the ETL run
// Every stage fails fast; the caller decides whether to re-run.

use thiserror::Error;

/// Errors raised by the pipeline stages.
///
/// Each stage maps its own I/O and SQLite failures into the variant that
/// names the stage, so the caller can tell *where* a run broke:
/// - `Parse` → Extract
/// - `MissingRate` / `InvalidRates` → Transform and its rate reference
/// - `Storage` → Load
/// - `Query` → Query
#[derive(Debug, Error)]
pub enum EtlError {
    /// Source document does not match the expected structure
    #[error("parse error: {0}")]
    Parse(String),

    /// Rate reference lacks a currency the transformer needs
    #[error("missing exchange rate for currency '{code}'")]
    MissingRate { code: String },

    /// Rate reference exists but is malformed
    #[error("invalid rate reference: {0}")]
    InvalidRates(String),

    /// Filesystem or store failure while persisting
    #[error("storage error: {0}")]
    Storage(String),

    /// Query against an absent or incompatible schema, or a mutating statement
    #[error("query error: {0}")]
    Query(String),

    /// A data provider did not return data
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Short stage label used in progress-log failure lines
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Parse(_) => "ParseError",
            EtlError::MissingRate { .. } => "MissingRateError",
            EtlError::InvalidRates(_) => "InvalidRatesError",
            EtlError::Storage(_) => "StorageError",
            EtlError::Query(_) => "QueryError",
            EtlError::Fetch(_) => "FetchError",
            EtlError::Config(_) => "ConfigError",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rate_message_names_code() {
        let err = EtlError::MissingRate {
            code: "XYZ".to_string(),
        };
        assert_eq!(err.to_string(), "missing exchange rate for currency 'XYZ'");
        assert_eq!(err.kind(), "MissingRateError");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(EtlError::Parse("x".into()).kind(), "ParseError");
        assert_eq!(EtlError::Storage("x".into()).kind(), "StorageError");
        assert_eq!(EtlError::Query("x".into()).kind(), "QueryError");
    }
}
