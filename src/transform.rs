// Transformer - append converted market caps
// All-or-nothing: every rate is resolved before any record is touched.

use crate::error::{EtlError, Result};
use crate::model::RankedTable;
use crate::rates::ExchangeRateMap;
use std::collections::HashSet;
use tracing::debug;

/// Round to 2 decimals, ties to even on the scaled value
/// (same rule as NumPy's `round(x, 2)`).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Uppercase, trim and reject blank or repeated codes
pub fn normalize_currencies(target_currencies: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut codes = Vec::with_capacity(target_currencies.len());

    for raw in target_currencies {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(EtlError::Config(format!("invalid currency code '{}'", raw)));
        }
        if !seen.insert(code.clone()) {
            return Err(EtlError::Config(format!("currency {} listed twice", code)));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Consume `table` and return it with one derived column per target currency,
/// in the order given. Derived columns already on the input are replaced.
///
/// Fails with `MissingRate` before computing anything if a code is absent
/// from `rates`.
pub fn transform(
    table: RankedTable,
    rates: &ExchangeRateMap,
    target_currencies: &[String],
) -> Result<RankedTable> {
    let codes = normalize_currencies(target_currencies)?;

    let factors = codes
        .iter()
        .map(|code| rates.require(code))
        .collect::<Result<Vec<f64>>>()?;

    let RankedTable {
        name_column,
        usd_column,
        records,
        ..
    } = table;

    let records = records
        .into_iter()
        .map(|mut record| {
            record.converted = factors
                .iter()
                .map(|rate| round2(record.market_cap_usd * rate))
                .collect();
            record
        })
        .collect();

    debug!(currencies = ?codes, "applied exchange rates");

    Ok(RankedTable {
        name_column,
        usd_column,
        currencies: codes,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankRecord;

    fn currencies(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn sample_rates() -> ExchangeRateMap {
        ExchangeRateMap::from_pairs([("GBP", 0.8), ("EUR", 0.93), ("INR", 82.5)]).unwrap()
    }

    #[test]
    fn test_transform_example_values() {
        let table = RankedTable::with_default_columns(vec![BankRecord::new("Example Bank", 100.0)]);
        let out = transform(table, &sample_rates(), &currencies(&["GBP", "EUR", "INR"])).unwrap();

        assert_eq!(out.currencies, vec!["GBP", "EUR", "INR"]);
        assert_eq!(out.records[0].converted, vec![80.00, 93.00, 8250.00]);
        assert_eq!(
            out.columns(),
            vec!["Name", "MC_USD_Billion", "MC_GBP_Billion", "MC_EUR_Billion", "MC_INR_Billion"]
        );
        assert_eq!(out.records[0].market_cap_usd, 100.0);
    }

    #[test]
    fn test_reference_rates_on_real_row() {
        let rates = ExchangeRateMap::from_csv_str(include_str!("../tests/fixtures/exchange_rate.csv")).unwrap();
        let table = RankedTable::with_default_columns(vec![BankRecord::new("JPMorgan Chase", 432.92)]);
        let out = transform(table, &rates, &currencies(&["GBP", "EUR", "INR"])).unwrap();

        // usd * rate, 2 decimals
        assert_eq!(out.converted_value(0, "GBP"), Some(346.34));
        assert_eq!(out.converted_value(0, "EUR"), Some(402.62));
        assert_eq!(out.converted_value(0, "INR"), Some(35910.71));
    }

    #[test]
    fn test_missing_rate_aborts_without_output() {
        let table = RankedTable::with_default_columns(vec![BankRecord::new("A", 1.0)]);
        let result = transform(table, &sample_rates(), &currencies(&["GBP", "XYZ"]));

        match result {
            Err(EtlError::MissingRate { code }) => assert_eq!(code, "XYZ"),
            other => panic!("expected MissingRate, got {:?}", other),
        }
    }

    #[test]
    fn test_every_record_gets_every_column() {
        let table = RankedTable::with_default_columns(vec![
            BankRecord::new("A", 10.0),
            BankRecord::new("B", 0.0),
            BankRecord::new("C", 3.333),
        ]);
        let out = transform(table, &sample_rates(), &currencies(&["inr", "gbp"])).unwrap();

        assert_eq!(out.currencies, vec!["INR", "GBP"]);
        assert!(out.is_consistent());
        assert_eq!(out.records[1].converted, vec![0.0, 0.0]);
        assert_eq!(out.records[2].converted, vec![274.97, 2.67]);
    }

    #[test]
    fn test_retransform_replaces_columns() {
        let table = RankedTable::with_default_columns(vec![BankRecord::new("A", 100.0)]);
        let first = transform(table, &sample_rates(), &currencies(&["GBP", "EUR"])).unwrap();
        let second = transform(first, &sample_rates(), &currencies(&["INR"])).unwrap();

        assert_eq!(second.currencies, vec!["INR"]);
        assert_eq!(second.records[0].converted, vec![8250.0]);
    }

    #[test]
    fn test_duplicate_currency_rejected() {
        let table = RankedTable::with_default_columns(vec![BankRecord::new("A", 1.0)]);
        let result = transform(table, &sample_rates(), &currencies(&["GBP", "gbp"]));
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(93.00000000000001), 93.0);
        assert_eq!(round2(2.0), 2.0);
    }
}
