/// Records sink integration
///
/// Creates and updates rows in named tables of one base. Writes are chunked
/// into batches of at most ten rows with a fixed pause between batches; a
/// write aborts once three batches have failed.
///
/// Rows are submitted as given. Nothing is deduplicated, so writing the same
/// rows twice creates two sets of records.
pub mod client;
pub mod types;

pub use client::AirtableClient;
pub use types::{ListRecordsOptions, RecordsResponse, WriteMode};
