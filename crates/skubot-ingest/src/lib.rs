//! Offline ingestion: spreadsheet rows become rendered catalog records and
//! metadata in the vector index, plus the vocabulary files chat loads.

pub mod excel;
pub mod pipeline;
pub mod record;

pub use excel::load_rows;
pub use pipeline::{run_ingest, IngestSummary};
pub use record::{build_metadata, row_to_text, CellValue, RawRow};
