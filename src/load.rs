// Loader - persist the table as a CSV snapshot and a SQLite table
//
// Order matters: CSV first (cheap, local), then the database inside one
// transaction. Both artifacts are fully replaced on every run.

use crate::error::{EtlError, Result};
use crate::model::{currency_from_column, is_sql_identifier, BankRecord, RankedTable};
use crate::store::{quote_ident, Store};
use rusqlite::types::Value;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a run's artifacts go
#[derive(Debug, Clone)]
pub struct Destinations {
    pub csv_path: PathBuf,
    pub table_name: String,
}

/// Confirmation that both artifacts were written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadAck {
    pub rows: usize,
    pub csv_path: PathBuf,
    pub csv_sha256: String,
    pub table_name: String,
    /// COUNT(*) read back after commit
    pub stored_rows: i64,
}

pub struct Loader {
    destinations: Destinations,
}

impl Loader {
    pub fn new(destinations: Destinations) -> Self {
        Loader { destinations }
    }

    /// Write the CSV snapshot, then replace the database table.
    ///
    /// The run only counts as loaded once both writes succeed and the stored
    /// row count matches the table.
    pub fn load(&self, table: &RankedTable, store: &mut Store) -> Result<LoadAck> {
        let csv_sha256 = self.snapshot_csv(table)?;
        let stored_rows = self.replace_table(table, store)?;
        Ok(self.ack(table, csv_sha256, stored_rows))
    }

    /// First half of a load: the CSV snapshot. Returns its SHA-256.
    pub fn snapshot_csv(&self, table: &RankedTable) -> Result<String> {
        write_csv(table, &self.destinations.csv_path)
    }

    /// Second half of a load: drop-and-recreate the database table
    pub fn replace_table(&self, table: &RankedTable, store: &mut Store) -> Result<i64> {
        write_table(table, store, &self.destinations.table_name)
    }

    pub fn ack(&self, table: &RankedTable, csv_sha256: String, stored_rows: i64) -> LoadAck {
        LoadAck {
            rows: table.len(),
            csv_path: self.destinations.csv_path.clone(),
            csv_sha256,
            table_name: self.destinations.table_name.clone(),
            stored_rows,
        }
    }
}

// ============================================================================
// CSV SNAPSHOT
// ============================================================================

/// Serialize `table` to CSV bytes: header row, then one row per record
pub fn to_csv_bytes(table: &RankedTable) -> Result<Vec<u8>> {
    if !table.is_consistent() {
        return Err(EtlError::Storage("table has records with missing currency columns".into()));
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(table.columns())
        .map_err(|e| EtlError::Storage(format!("failed to write CSV header: {}", e)))?;

    for record in &table.records {
        let mut fields = Vec::with_capacity(2 + record.converted.len());
        fields.push(record.name.clone());
        fields.push(record.market_cap_usd.to_string());
        fields.extend(record.converted.iter().map(|v| v.to_string()));

        wtr.write_record(&fields)
            .map_err(|e| EtlError::Storage(format!("failed to write CSV row: {}", e)))?;
    }

    wtr.into_inner()
        .map_err(|e| EtlError::Storage(format!("failed to finish CSV: {}", e)))
}

/// Atomically replace `csv_path` with the table; returns the SHA-256 of the bytes
pub fn write_csv(table: &RankedTable, csv_path: &Path) -> Result<String> {
    let bytes = to_csv_bytes(table)?;

    let dir = match csv_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        EtlError::Storage(format!("failed to create temp file in {}: {}", dir.display(), e))
    })?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| EtlError::Storage(format!("failed to write CSV: {}", e)))?;
    tmp.persist(csv_path).map_err(|e| {
        EtlError::Storage(format!("failed to replace {}: {}", csv_path.display(), e.error))
    })?;

    let digest = format!("{:x}", Sha256::digest(&bytes));
    info!(path = %csv_path.display(), rows = table.len(), "CSV snapshot written");
    Ok(digest)
}

/// Read a snapshot written by [`write_csv`] back into a table
pub fn read_csv_snapshot(csv_path: &Path) -> Result<RankedTable> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .map_err(|e| EtlError::Storage(format!("failed to open {}: {}", csv_path.display(), e)))?;

    let headers = rdr
        .headers()
        .map_err(|e| EtlError::Storage(format!("failed to read CSV header: {}", e)))?
        .clone();

    if headers.len() < 2 {
        return Err(EtlError::Storage(format!(
            "snapshot header has {} columns, expected at least 2",
            headers.len()
        )));
    }

    let currencies = headers
        .iter()
        .skip(2)
        .map(|column| {
            currency_from_column(column)
                .map(str::to_string)
                .ok_or_else(|| EtlError::Storage(format!("unexpected column '{}'", column)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::new();
    for (line_num, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| {
            EtlError::Storage(format!("failed to read CSV line {}: {}", line_num + 2, e))
        })?;

        let number = |idx: usize| -> Result<f64> {
            row.get(idx)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    EtlError::Storage(format!("line {}: column {} is not numeric", line_num + 2, idx + 1))
                })
        };

        let mut record = BankRecord::new(row.get(0).unwrap_or_default(), number(1)?);
        record.converted = (2..headers.len()).map(number).collect::<Result<Vec<_>>>()?;
        records.push(record);
    }

    let mut table = RankedTable::new(&headers[0], &headers[1], records);
    table.currencies = currencies;
    Ok(table)
}

// ============================================================================
// DATABASE TABLE
// ============================================================================

fn create_table_sql(table: &RankedTable, table_name: &str) -> Result<String> {
    let columns = table.columns();
    if let Some(bad) = std::iter::once(table_name)
        .chain(columns.iter().map(String::as_str))
        .find(|ident| !is_sql_identifier(ident))
    {
        return Err(EtlError::Storage(format!("'{}' is not a valid SQL identifier", bad)));
    }

    let column_defs: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let ty = if i == 0 { "TEXT" } else { "REAL" };
            format!("{} {} NOT NULL", quote_ident(col), ty)
        })
        .collect();

    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(table_name),
        column_defs.join(", ")
    ))
}

/// Drop and recreate `table_name` with the table's rows, in one transaction.
/// Returns the row count read back after commit.
pub fn write_table(table: &RankedTable, store: &mut Store, table_name: &str) -> Result<i64> {
    if !table.is_consistent() {
        return Err(EtlError::Storage("table has records with missing currency columns".into()));
    }

    let create_sql = create_table_sql(table, table_name)?;
    let width = 2 + table.currencies.len();
    let placeholders: Vec<String> = (1..=width).map(|i| format!("?{}", i)).collect();
    let insert_sql = format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(table_name),
        placeholders.join(", ")
    );

    let storage = |e: rusqlite::Error| EtlError::Storage(format!("failed to load {}: {}", table_name, e));

    // dropping `tx` without commit rolls back, leaving the previous table intact
    let tx = store.connection_mut().transaction().map_err(storage)?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)), [])
        .map_err(storage)?;
    tx.execute(&create_sql, []).map_err(storage)?;
    {
        let mut stmt = tx.prepare(&insert_sql).map_err(storage)?;
        for record in &table.records {
            let mut values = Vec::with_capacity(width);
            values.push(Value::Text(record.name.clone()));
            values.push(Value::Real(record.market_cap_usd));
            values.extend(record.converted.iter().map(|v| Value::Real(*v)));
            stmt.execute(rusqlite::params_from_iter(values)).map_err(storage)?;
        }
    }
    tx.commit().map_err(storage)?;

    let stored = store.row_count(table_name)?;
    if stored != table.len() as i64 {
        return Err(EtlError::Storage(format!(
            "{} holds {} rows after load, expected {}",
            table_name,
            stored,
            table.len()
        )));
    }

    debug!(table = table_name, rows = stored, "database table replaced");
    Ok(stored)
}
