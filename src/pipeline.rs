// Pipeline - Extract → Transform → Load → Query, strictly in order
//
// Each stage owns the table it was handed and returns a new one. The store
// connection is opened once the CSV snapshot exists and is released on every
// exit path (explicit close on success, drop on failure).

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::Extractor;
use crate::load::{Destinations, LoadAck, Loader};
use crate::progress::ProgressSink;
use crate::query::{default_queries, QueryEngine, ResultSet};
use crate::sources::{DocumentSource, RateSource};
use crate::store::Store;
use crate::transform::transform;
use serde::Serialize;
use tracing::{error, info};

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub ack: LoadAck,
    pub results: Vec<ResultSet>,
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    document: &'a dyn DocumentSource,
    rates: &'a dyn RateSource,
    progress: &'a dyn ProgressSink,
    extractor: Extractor,
    queries: Vec<String>,
}

impl<'a> Pipeline<'a> {
    /// Pipeline with the default extractor and the default query set.
    /// The config is validated here, before anything touches disk.
    pub fn new(
        config: PipelineConfig,
        document: &'a dyn DocumentSource,
        rates: &'a dyn RateSource,
        progress: &'a dyn ProgressSink,
    ) -> Result<Self> {
        let config = config.validated()?;
        let queries = default_queries(
            &config.db_table_name,
            config.name_column(),
            &config.average_column(),
        );

        Ok(Pipeline {
            config,
            document,
            rates,
            progress,
            extractor: Extractor::new(),
            queries,
        })
    }

    /// Builder: swap the extraction rule set
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Builder: replace the query set (empty = skip the query stage)
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    /// Run to completion. Any failure aborts the run and is recorded in the
    /// progress log before it is returned.
    pub fn run(&self) -> Result<RunReport> {
        match self.run_stages() {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(kind = err.kind(), "{}", err);
                // best effort: the run error is returned either way
                let _ = self.progress.log(&format!("Process failed: {}: {}", err.kind(), err));
                Err(err)
            }
        }
    }

    fn run_stages(&self) -> Result<RunReport> {
        let config = &self.config;
        self.progress.log("Initiating ETL process")?;

        // Extract
        info!(source = %self.document.describe(), "fetching ranking page");
        let document = self.document.fetch_document()?;
        let attribs: Vec<&str> = config.table_attribs.iter().map(String::as_str).collect();
        let table = self.extractor.extract(&document, &attribs)?;
        self.progress
            .log("Data extraction complete. Initiating Transformation process")?;

        // Transform
        info!(source = %self.rates.describe(), "fetching exchange rates");
        let rates = self.rates.fetch_rates()?;
        let table = transform(table, &rates, &config.target_currencies)?;
        self.progress
            .log("Data transformation complete. Initiating Loading process")?;

        // Load
        let loader = Loader::new(Destinations {
            csv_path: config.csv_path.clone(),
            table_name: config.db_table_name.clone(),
        });
        let csv_sha256 = loader.snapshot_csv(&table)?;
        self.progress.log("Data saved to CSV file")?;

        let mut store = Store::open(&config.db_path)?;
        self.progress.log("SQL Connection initiated")?;

        let stored_rows = loader.replace_table(&table, &mut store)?;
        let ack = loader.ack(&table, csv_sha256, stored_rows);
        drop(table);
        self.progress
            .log("Data loaded to Database as a table, Executing queries")?;

        // Query
        let results = QueryEngine::new(&store).run(&self.queries)?;
        self.progress.log("Process Complete")?;

        store.close()?;
        self.progress.log("Server Connection closed")?;

        info!(rows = ack.rows, table = %ack.table_name, "run complete");
        Ok(RunReport { ack, results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::progress::MemoryLog;
    use crate::rates::ExchangeRateMap;
    use crate::sources::{FileSource, StaticRates};
    use std::path::Path;

    fn config_in(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            csv_path: dir.join("Largest_banks_data.csv"),
            db_path: dir.join("Banks.db"),
            log_path: dir.join("code_log.txt"),
            ..Default::default()
        }
    }

    fn page() -> FileSource {
        FileSource::new("tests/fixtures/largest_banks.html")
    }

    fn rates() -> FileSource {
        FileSource::new("tests/fixtures/exchange_rate.csv")
    }

    #[test]
    fn test_full_run_logs_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let (doc, fx) = (page(), rates());

        let report = Pipeline::new(config_in(dir.path()), &doc, &fx, &log)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.ack.rows, 10);
        assert_eq!(report.ack.stored_rows, 10);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[2].len(), 5);
        assert_eq!(
            log.messages(),
            vec![
                "Initiating ETL process",
                "Data extraction complete. Initiating Transformation process",
                "Data transformation complete. Initiating Loading process",
                "Data saved to CSV file",
                "SQL Connection initiated",
                "Data loaded to Database as a table, Executing queries",
                "Process Complete",
                "Server Connection closed",
            ]
        );
    }

    #[test]
    fn test_missing_rate_leaves_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.csv_path, "previous,run\n").unwrap();

        let log = MemoryLog::new();
        let doc = page();
        let fx = StaticRates(ExchangeRateMap::from_pairs([("GBP", 0.8)]).unwrap());

        let err = Pipeline::new(config.clone(), &doc, &fx, &log)
            .unwrap()
            .run()
            .unwrap_err();

        assert!(matches!(err, EtlError::MissingRate { ref code } if code == "EUR"));
        assert_eq!(std::fs::read_to_string(&config.csv_path).unwrap(), "previous,run\n");
        assert!(!config.db_path.exists());
        assert!(log
            .messages()
            .last()
            .unwrap()
            .starts_with("Process failed: MissingRateError"));
    }

    #[test]
    fn test_bad_query_fails_run_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let (doc, fx) = (page(), rates());

        let err = Pipeline::new(config_in(dir.path()), &doc, &fx, &log)
            .unwrap()
            .with_queries(vec!["SELECT * FROM no_such_table".into()])
            .run()
            .unwrap_err();

        assert!(matches!(err, EtlError::Query(_)));
        // the load itself went through; the connection was dropped with the error
        let store = Store::open(&dir.path().join("Banks.db")).unwrap();
        assert_eq!(store.row_count("Largest_banks").unwrap(), 10);
    }

    #[test]
    fn test_unopenable_store_fails_run_after_csv() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            db_path: dir.path().to_path_buf(),
            ..config_in(dir.path())
        };
        let log = MemoryLog::new();
        let (doc, fx) = (page(), rates());

        let err = Pipeline::new(config.clone(), &doc, &fx, &log)
            .unwrap()
            .run()
            .unwrap_err();

        assert!(matches!(err, EtlError::Storage(_)), "got: {:?}", err);
        assert!(config.csv_path.exists());

        let messages = log.messages();
        let (last, before) = messages.split_last().unwrap();
        assert!(last.starts_with("Process failed: StorageError"), "got: {}", last);
        assert_eq!(before.last().unwrap(), "Data saved to CSV file");
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let (doc, fx) = (page(), rates());
        let config = PipelineConfig {
            db_table_name: "bad name".into(),
            ..config_in(dir.path())
        };

        assert!(matches!(
            Pipeline::new(config, &doc, &fx, &log),
            Err(EtlError::Config(_))
        ));
        assert!(log.messages().is_empty());
    }

    #[test]
    fn test_no_queries_skips_query_stage() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new();
        let (doc, fx) = (page(), rates());

        let report = Pipeline::new(config_in(dir.path()), &doc, &fx, &log)
            .unwrap()
            .with_queries(Vec::new())
            .run()
            .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(log.messages().len(), 8);
    }
}
