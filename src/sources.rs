// Data providers - where the ranking page and the rate reference come from
// Both are opaque: the pipeline only needs "text or an error".

use crate::error::{EtlError, Result};
use crate::rates::ExchangeRateMap;
use std::path::PathBuf;

/// Supplies the raw HTML of the ranking page
pub trait DocumentSource {
    fn fetch_document(&self) -> Result<String>;

    /// Where the document comes from (for logs)
    fn describe(&self) -> String;
}

/// Supplies the exchange-rate reference
pub trait RateSource {
    fn fetch_rates(&self) -> Result<ExchangeRateMap>;

    fn describe(&self) -> String;
}

fn non_empty(text: String, origin: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(EtlError::Fetch(format!("{} returned no data", origin)));
    }
    Ok(text)
}

// ============================================================================
// LOCAL FILES
// ============================================================================

/// A saved copy of the page or the rate CSV
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }

    fn read(&self) -> Result<String> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| EtlError::Fetch(format!("failed to read {}: {}", self.path.display(), e)))?;
        non_empty(text, &self.path.display().to_string())
    }
}

impl DocumentSource for FileSource {
    fn fetch_document(&self) -> Result<String> {
        self.read()
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

impl RateSource for FileSource {
    fn fetch_rates(&self) -> Result<ExchangeRateMap> {
        ExchangeRateMap::from_csv_str(&self.read()?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Rates already in memory
pub struct StaticRates(pub ExchangeRateMap);

impl RateSource for StaticRates {
    fn fetch_rates(&self) -> Result<ExchangeRateMap> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("{} static rates", self.0.len())
    }
}

// ============================================================================
// HTTP (feature = "http")
// ============================================================================

#[cfg(feature = "http")]
pub use http::HttpSource;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use reqwest::blocking::Client;
    use std::time::Duration;

    /// Blocking GET with a request timeout; no retry
    pub struct HttpSource {
        client: Client,
        url: String,
    }

    impl HttpSource {
        pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(concat!("largest-banks/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| EtlError::Fetch(format!("failed to build HTTP client: {}", e)))?;
            Ok(HttpSource {
                client,
                url: url.into(),
            })
        }

        fn get_text(&self) -> Result<String> {
            let text = self
                .client
                .get(&self.url)
                .send()
                .and_then(|resp| resp.error_for_status())
                .and_then(|resp| resp.text())
                .map_err(|e| EtlError::Fetch(format!("GET {} failed: {}", self.url, e)))?;
            non_empty(text, &self.url)
        }
    }

    impl DocumentSource for HttpSource {
        fn fetch_document(&self) -> Result<String> {
            self.get_text()
        }

        fn describe(&self) -> String {
            self.url.clone()
        }
    }

    impl RateSource for HttpSource {
        fn fetch_rates(&self) -> Result<ExchangeRateMap> {
            ExchangeRateMap::from_csv_str(&self.get_text()?)
        }

        fn describe(&self) -> String {
            self.url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_reads_document_and_rates() {
        let page = FileSource::new("tests/fixtures/largest_banks.html");
        assert!(page.fetch_document().unwrap().contains("<tbody>"));

        let rates = FileSource::new("tests/fixtures/exchange_rate.csv")
            .fetch_rates()
            .unwrap();
        assert_eq!(rates.get("INR"), Some(82.95));
    }

    #[test]
    fn test_missing_file_is_fetch_error() {
        let result = FileSource::new("tests/fixtures/does_not_exist.html").fetch_document();
        assert!(matches!(result, Err(EtlError::Fetch(_))));
    }

    #[test]
    fn test_empty_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.html");
        std::fs::write(&path, "  \n").unwrap();

        let result = DocumentSource::fetch_document(&FileSource::new(&path));
        assert!(matches!(result, Err(EtlError::Fetch(_))));
    }
}
