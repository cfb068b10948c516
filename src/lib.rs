// Largest Banks ETL - Core Library
// Extract → Transform → Load → Query over the "largest banks" ranking page

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod rates;
pub mod sources;
pub mod store;
pub mod transform;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{EtlError, Result};
pub use extract::{ExtractionRule, Extractor, SecondLinkRule};
pub use load::{read_csv_snapshot, write_csv, write_table, Destinations, LoadAck, Loader};
pub use model::{BankRecord, RankedTable};
pub use pipeline::{Pipeline, RunReport};
pub use progress::{MemoryLog, ProgressLog, ProgressSink};
pub use query::{default_queries, Cell, QueryEngine, ResultSet};
pub use rates::ExchangeRateMap;
pub use sources::{DocumentSource, FileSource, RateSource, StaticRates};
pub use store::Store;
pub use transform::{round2, transform};

#[cfg(feature = "http")]
pub use sources::HttpSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
