//! Core domain logic for the playtime activity ledger.
//!
//! This crate contains the storage-independent pieces:
//! - Segmentation: splitting finished sessions at local midnights
//! - History: merging contiguous segments back into sessions
//! - Buckets: series bucket keys, labels and report periods
//! - Timeline: clipping intervals to one day in a chosen zone
//! - Filters: whitelist/blacklist substring matching

pub mod bucket;
pub mod filter;
pub mod history;
pub mod segment;
pub mod timeline;
pub mod types;

pub use bucket::{BucketScheme, Granularity, Period, period_range};
pub use filter::FilterSnapshot;
pub use history::{HistoryEntry, merge_contiguous};
pub use segment::{ActivitySegment, format_stored_timestamp, local_midnight, segment_session};
pub use timeline::{TimelineInterval, TimelineSegment, TimelineZone, clip_to_day};
pub use types::{
    DATE_FORMAT, DateRange, DisplayName, FilterKind, RawIdentity, ValidationError, parse_date,
    parse_timestamp,
};
