//! framestitch-core: Core types for WFM event stitching.
//!
//! This crate provides the event batch data model, the frame catalogue
//! describing WFM frame windows and their unwrap shifts, and the error
//! types shared by the stitching and I/O crates.
//!

pub mod error;
pub mod event;
pub mod frame;

pub use error::{Error, MalformedBatch, Result};
pub use event::{EventBatch, StitchedEventBatch};
pub use frame::{CatalogueWarning, FrameCatalogue, FrameDescriptor, SourceCategory};
