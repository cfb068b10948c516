// QueryEngine - read-only SQL against the loaded store

use crate::error::{EtlError, Result};
use crate::model::{currency_from_column, BankRecord, RankedTable};
use crate::store::Store;
use rusqlite::types::Value;
use serde::Serialize;
use std::fmt;

// ============================================================================
// RESULT SET
// ============================================================================

/// One SQLite value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Real(v) => Some(*v),
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Integer(v) => Cell::Integer(v),
            Value::Real(v) => Cell::Real(v),
            Value::Text(s) => Cell::Text(s),
            Value::Blob(b) => Cell::Blob(b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Real(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Columns + rows of one statement, in result order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub statement: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Single value of a one-row, one-column result (e.g. an aggregate)
    pub fn scalar(&self) -> Option<&Cell> {
        match (self.rows.as_slice(), self.columns.len()) {
            ([row], 1) => row.first(),
            _ => None,
        }
    }

    /// Rebuild a table from a `SELECT *` over a loaded table
    pub fn into_ranked_table(self) -> Result<RankedTable> {
        if self.columns.len() < 2 {
            return Err(EtlError::Query(format!(
                "result has {} columns, a bank table needs at least 2",
                self.columns.len()
            )));
        }

        let currencies = self.columns[2..]
            .iter()
            .map(|col| {
                currency_from_column(col)
                    .map(str::to_string)
                    .ok_or_else(|| EtlError::Query(format!("'{}' is not a currency column", col)))
            })
            .collect::<Result<Vec<_>>>()?;

        let records = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| -> Result<BankRecord> {
                let bad = |what: &str| EtlError::Query(format!("row {}: {}", i + 1, what));
                let name = row.first().and_then(Cell::as_str).ok_or_else(|| bad("name is not text"))?;
                let numbers = row[1..]
                    .iter()
                    .map(|c| c.as_f64().ok_or_else(|| bad("monetary value is not numeric")))
                    .collect::<Result<Vec<f64>>>()?;

                let mut record = BankRecord::new(name, numbers[0]);
                record.converted = numbers[1..].to_vec();
                Ok(record)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut table = RankedTable::new(&self.columns[0], &self.columns[1], records);
        table.currencies = currencies;
        Ok(table)
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::to_string).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &rendered {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        write_padded(f, &self.columns, &widths)?;
        for row in &rendered {
            write_padded(f, row, &widths)?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

fn write_padded(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{:<width$}", c, width = *w))
        .collect();
    writeln!(f, "{}", padded.join("  ").trim_end())
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct QueryEngine<'a> {
    store: &'a Store,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        QueryEngine { store }
    }

    /// Run statements in order; stops at the first failure
    pub fn run<S: AsRef<str>>(&self, statements: &[S]) -> Result<Vec<ResultSet>> {
        statements.iter().map(|s| self.run_one(s.as_ref())).collect()
    }

    /// Run one read-only statement.
    ///
    /// Unknown tables or columns fail here (at prepare time), so querying a
    /// store that was never loaded is an error, not an empty result.
    pub fn run_one(&self, sql: &str) -> Result<ResultSet> {
        let query_err = |e: rusqlite::Error| EtlError::Query(format!("{}: {}", sql.trim(), e));

        let mut stmt = self.store.connection().prepare(sql).map_err(query_err)?;
        if !stmt.readonly() {
            return Err(EtlError::Query(format!("refusing to run mutating statement: {}", sql.trim())));
        }
        // ATTACH, DETACH and BEGIN count as read-only to SQLite but return no rows
        if stmt.column_count() == 0 {
            return Err(EtlError::Query(format!("statement returns no rows: {}", sql.trim())));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([]).map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(query_err)? {
            let cells = (0..width)
                .map(|i| row.get::<_, Value>(i).map(Cell::from))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(query_err)?;
            out.push(cells);
        }

        Ok(ResultSet {
            statement: sql.to_string(),
            columns,
            rows: out,
        })
    }
}

/// The default consumer queries: every row, the average of one derived
/// column, and the names of the top 5 banks.
///
/// Identifiers go in bare: a double-quoted unknown column would silently
/// become a string literal in SQLite instead of failing.
pub fn default_queries(table_name: &str, name_column: &str, average_column: &str) -> Vec<String> {
    vec![
        format!("SELECT * FROM {}", table_name),
        format!("SELECT AVG({}) FROM {}", average_column, table_name),
        format!("SELECT {} FROM {} LIMIT 5", name_column, table_name),
    ]
}
