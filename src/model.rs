// Working table - ranked banks and their market caps
// Created fresh each run, handed stage to stage by value.

use serde::{Deserialize, Serialize};

// ============================================================================
// COLUMN NAMING
// ============================================================================

pub const DEFAULT_NAME_COLUMN: &str = "Name";
pub const DEFAULT_USD_COLUMN: &str = "MC_USD_Billion";

/// Column label for a derived currency: "GBP" → "MC_GBP_Billion"
pub fn derived_column(code: &str) -> String {
    format!("MC_{}_Billion", code)
}

/// Inverse of [`derived_column`]. Returns None for anything else.
pub fn currency_from_column(column: &str) -> Option<&str> {
    column
        .strip_prefix("MC_")
        .and_then(|rest| rest.strip_suffix("_Billion"))
        .filter(|code| !code.is_empty())
}

/// `[A-Za-z_][A-Za-z0-9_]*` - the only identifiers we interpolate into SQL
pub fn is_sql_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// BANK RECORD
// ============================================================================

/// One row of the working table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRecord {
    /// Institution display name (trimmed link text)
    pub name: String,

    /// Market cap in billions of USD - the only value read from the source
    pub market_cap_usd: f64,

    /// Derived market caps, aligned with `RankedTable::currencies`
    #[serde(default)]
    pub converted: Vec<f64>,
}

impl BankRecord {
    pub fn new(name: impl Into<String>, market_cap_usd: f64) -> Self {
        BankRecord {
            name: name.into(),
            market_cap_usd,
            converted: Vec::new(),
        }
    }
}

// ============================================================================
// RANKED TABLE
// ============================================================================

/// Ordered bank records. Row order is rank order (rank 1 = first row).
///
/// Every record carries exactly one converted value per entry of
/// `currencies`; only the transformer adds derived columns, and it builds
/// a whole new table or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTable {
    pub name_column: String,
    pub usd_column: String,
    pub currencies: Vec<String>,
    pub records: Vec<BankRecord>,
}

impl RankedTable {
    /// Table with only the base columns populated
    pub fn new(
        name_column: impl Into<String>,
        usd_column: impl Into<String>,
        records: Vec<BankRecord>,
    ) -> Self {
        RankedTable {
            name_column: name_column.into(),
            usd_column: usd_column.into(),
            currencies: Vec::new(),
            records,
        }
    }

    /// Table with the default `Name` / `MC_USD_Billion` labels
    pub fn with_default_columns(records: Vec<BankRecord>) -> Self {
        Self::new(DEFAULT_NAME_COLUMN, DEFAULT_USD_COLUMN, records)
    }

    /// Header in output order: name, USD, then one column per currency
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(2 + self.currencies.len());
        columns.push(self.name_column.clone());
        columns.push(self.usd_column.clone());
        columns.extend(self.currencies.iter().map(|c| derived_column(c)));
        columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Converted value of `record_index` in `code`, if that column exists
    pub fn converted_value(&self, record_index: usize, code: &str) -> Option<f64> {
        let col = self.currencies.iter().position(|c| c == code)?;
        self.records
            .get(record_index)
            .and_then(|r| r.converted.get(col))
            .copied()
    }

    /// True when every record has one value per currency column
    pub fn is_consistent(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.converted.len() == self.currencies.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_column_round_trip() {
        assert_eq!(derived_column("GBP"), "MC_GBP_Billion");
        assert_eq!(currency_from_column("MC_GBP_Billion"), Some("GBP"));
        assert_eq!(currency_from_column("MC__Billion"), None);
        assert_eq!(currency_from_column("Name"), None);
    }

    #[test]
    fn test_sql_identifier() {
        assert!(is_sql_identifier("Largest_banks"));
        assert!(is_sql_identifier("_t1"));
        assert!(!is_sql_identifier("1banks"));
        assert!(!is_sql_identifier("banks; DROP TABLE x"));
        assert!(!is_sql_identifier(""));
    }

    #[test]
    fn test_columns_follow_currency_order() {
        let mut table = RankedTable::with_default_columns(vec![BankRecord::new("JPMorgan Chase", 432.92)]);
        table.currencies = vec!["GBP".into(), "EUR".into()];
        table.records[0].converted = vec![346.34, 402.62];

        assert_eq!(
            table.columns(),
            vec!["Name", "MC_USD_Billion", "MC_GBP_Billion", "MC_EUR_Billion"]
        );
        assert_eq!(table.converted_value(0, "EUR"), Some(402.62));
        assert_eq!(table.converted_value(0, "INR"), None);
        assert!(table.is_consistent());
    }
}
