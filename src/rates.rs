// Exchange-rate reference
// Two-column CSV (Currency,Rate) → code → rate map.
// Convention: target_amount = usd_amount * rate

use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct RateRow {
    #[serde(rename = "Currency")]
    currency: String,

    #[serde(rename = "Rate")]
    rate: f64,
}

/// Currency code (uppercase) → units of that currency per 1 USD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRateMap {
    rates: HashMap<String, f64>,
}

impl ExchangeRateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (code, rate) pairs, applying the same checks as the CSV path
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut map = ExchangeRateMap::new();
        for (code, rate) in pairs {
            map.insert(code.as_ref(), rate)?;
        }
        Ok(map)
    }

    /// Parse a `Currency,Rate` CSV reference
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut map = ExchangeRateMap::new();
        for (line_num, result) in rdr.deserialize::<RateRow>().enumerate() {
            // +2: 1-indexed + header row
            let row = result.map_err(|e| {
                EtlError::InvalidRates(format!("line {}: {}", line_num + 2, e))
            })?;
            map.insert(&row.currency, row.rate)?;
        }

        if map.is_empty() {
            return Err(EtlError::InvalidRates("reference contains no rates".into()));
        }

        Ok(map)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    fn insert(&mut self, code: &str, rate: f64) -> Result<()> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(EtlError::InvalidRates("blank currency code".into()));
        }
        if !rate.is_finite() || rate < 0.0 {
            return Err(EtlError::InvalidRates(format!(
                "rate for {} must be a finite non-negative number, got {}",
                code, rate
            )));
        }
        if self.rates.insert(code.clone(), rate).is_some() {
            return Err(EtlError::InvalidRates(format!("duplicate currency code {}", code)));
        }
        Ok(())
    }

    /// Rate for `code` (case-insensitive)
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.trim().to_ascii_uppercase()).copied()
    }

    /// Rate for `code`, or `MissingRate`
    pub fn require(&self, code: &str) -> Result<f64> {
        self.get(code).ok_or_else(|| EtlError::MissingRate {
            code: code.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Codes in sorted order
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}
