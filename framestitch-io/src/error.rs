//! I/O error types.

use framestitch_core::MalformedBatch;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Frame catalogue could not be parsed.
    #[error("catalogue error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// A stitched time does not fit the stored representation.
    #[error("time-of-flight {value} {unit} does not fit a {storage} dataset")]
    TimeOutOfRange {
        value: f64,
        unit: &'static str,
        storage: &'static str,
    },

    /// Invalid processing options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Error raised while handling one entry of a file.
    #[error("entry '{entry}': {source}")]
    Entry {
        entry: String,
        #[source]
        source: Box<Error>,
    },

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] framestitch_core::Error),
}

impl Error {
    /// Attach the entry name to an error.
    #[must_use]
    pub fn in_entry(self, entry: &str) -> Self {
        match self {
            Self::Entry { .. } => self,
            other => Self::Entry {
                entry: entry.to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl From<MalformedBatch> for Error {
    fn from(err: MalformedBatch) -> Self {
        Self::CoreError(framestitch_core::Error::MalformedBatch(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_context_in_message() {
        let err = Error::from(MalformedBatch::LengthMismatch { times: 4, ids: 3 })
            .in_entry("/entry/monitor_1/events");
        assert_eq!(
            err.to_string(),
            "entry '/entry/monitor_1/events': core error: malformed event batch: \
             times has 4 values but ids has 3"
        );

        // Context is attached once.
        let again = err.in_entry("/other");
        assert!(again.to_string().starts_with("entry '/entry/monitor_1/events'"));
    }
}
