//! SPENDWATCH Sources - Upstream Feed Integration
//!
//! The boundary between the aggregation engine and the outside world:
//! - `SourceAdapter` - one upstream feed, owning a set of field groups
//! - `AdapterRegistry` - adapters per jurisdiction tier, plus static profiles
//! - `parse` - untyped JSON payloads into typed records
//! - `SourceProbe` - cheap reachability checks for the health vector
//! - `DatasetAvailability` - polling for datasets that are not published yet
//! - `upload` - user-supplied spreadsheets and their summaries

pub mod adapter;
pub mod parse;
pub mod probe;
pub mod registry;
pub mod upload;

pub use adapter::{FetchParams, HttpJsonAdapter, PayloadParser, SourceAdapter};
pub use parse::{
    chamber_records, electoral_records, senate_records, transparency_records, ExpenseFields,
};
pub use probe::{
    parse_probe_urls, DatasetAvailability, HttpDatasetAvailability, HttpProbe, SourceProbe,
};
pub use registry::AdapterRegistry;
pub use upload::{
    DelimitedUploadParser, GroupSummary, ParsedUpload, UploadAdapter, UploadAnalysis,
    UploadFilter, UploadParser, UploadRecord, UploadRowError,
};
