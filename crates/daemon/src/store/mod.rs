// Persistence: workspace records and the local handle index.

pub mod local_index;
pub mod records;

pub use local_index::LocalIndex;
pub use records::{
    CorruptRecord, LoadedRecord, NewWorkspace, RecordListing, RecordPatch, RecordStore,
    Registration, StoredRecord,
};
