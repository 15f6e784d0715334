//! Music library: scanning, track records, ordering

pub mod engine;
pub mod ordering;
pub mod track;

pub use engine::{LibraryEngine, LibraryEvent, LibrarySnapshot, ScanError, ScanSummary};
pub use ordering::{compare_tracks, group_into_albums, sort_tracks, Album};
pub use track::{RecordBuildError, RecordBuilder, TrackRecord, TrackRecordBuilder, UNKNOWN_ALBUM};
