//! framestitch-io: NeXus/HDF5 event I/O for framestitch.
//!
//! This crate loads `NXevent_data` entries into event batches, writes
//! stitched batches back with their original unit conventions, and runs
//! the copy-then-patch cycle over whole files.
//!

pub mod catalogue;
mod category;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod options;
mod units;

pub use catalogue::{parse_catalogue, read_catalogue};
pub use category::resolve_category;
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use self::hdf5::{
    discover_entries, list_entries, load_entries, load_entry, stitch_file, store_entry,
    EntryReport, FileReport, LoadedEntry, TimeEncoding, TimeStorage,
};
pub use options::{IndexConvention, StitchOptions, WriteOptions};
pub use units::TimeUnit;
