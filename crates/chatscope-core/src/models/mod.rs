pub mod alias;
pub mod filters;
pub mod record;
pub mod timestamp;

pub use alias::AliasFamily;
pub use filters::SearchFilters;
pub use record::{Record, RecordRef};
pub use timestamp::{format_timestamp, parse_timestamp, parse_timestamp_str, time_of_day_fraction};
