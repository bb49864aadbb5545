pub mod job_record;
pub mod listing;

pub use job_record::FlatJobRecord;
pub use listing::RawListing;
