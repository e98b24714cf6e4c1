//! Options for file-level stitching.

use crate::{Error, Result};
use framestitch_algorithms::ClassifierKind;
use std::path::{Path, PathBuf};

/// Layout of the stored `event_index` dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexConvention {
    /// First event of each pulse, one entry per pulse (`NXevent_data`).
    #[default]
    PulseStart,
    /// Cumulative counts with a leading 0 and a trailing total.
    FencePost,
}

/// Dataset creation settings for rewritten event arrays.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Chunk length in events.
    pub chunk_events: usize,
    /// Deflate level, or `None` for uncompressed datasets.
    pub compression: Option<u8>,
    /// Enable the shuffle filter.
    pub shuffle: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            chunk_events: 100_000,
            compression: Some(1),
            shuffle: false,
        }
    }
}

/// Configuration for stitching whole files.
#[derive(Clone, Debug)]
pub struct StitchOptions {
    /// Classifier used for every entry.
    pub classifier: ClassifierKind,
    /// Layout of `event_index` on disk.
    pub index_convention: IndexConvention,
    /// Optional number of worker threads for stitching entries.
    pub parallelism: Option<usize>,
    /// Entries to process; discovered automatically when `None`.
    pub entries: Option<Vec<String>>,
    /// Suffix appended to the file stem of the output copy.
    pub output_suffix: String,
    /// Directory for output copies; defaults to the input's directory.
    pub output_dir: Option<PathBuf>,
    /// Dataset creation settings.
    pub write: WriteOptions,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            classifier: ClassifierKind::Linear,
            index_convention: IndexConvention::PulseStart,
            parallelism: None,
            entries: None,
            output_suffix: "_stitched".to_string(),
            output_dir: None,
            write: WriteOptions::default(),
        }
    }
}

impl StitchOptions {
    /// Set the classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: ClassifierKind) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the on-disk `event_index` layout.
    #[must_use]
    pub fn with_index_convention(mut self, convention: IndexConvention) -> Self {
        self.index_convention = convention;
        self
    }

    /// Set the number of worker threads.
    ///
    /// Values less than 1 are clamped to 1. Use [`Self::try_with_parallelism`]
    /// to surface invalid values as an error instead.
    #[must_use]
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads.max(1));
        self
    }

    /// Restrict processing to the given entries.
    #[must_use]
    pub fn with_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries = Some(entries.into_iter().map(Into::into).collect());
        self
    }

    /// Write output copies into `dir`.
    #[must_use]
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the dataset creation settings.
    #[must_use]
    pub fn with_write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }

    /// Fallible variant of [`Self::with_parallelism`].
    ///
    /// # Errors
    /// Returns an error if `threads` is 0.
    pub fn try_with_parallelism(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidOptions(
                "parallelism must be at least 1".to_string(),
            ));
        }
        self.parallelism = Some(threads);
        Ok(self)
    }

    /// Set the output suffix.
    ///
    /// # Errors
    /// Returns an error if the suffix is empty, which would make the output
    /// overwrite its input.
    pub fn try_with_output_suffix<S: Into<String>>(mut self, suffix: S) -> Result<Self> {
        let suffix = suffix.into();
        if suffix.is_empty() {
            return Err(Error::InvalidOptions(
                "output suffix must not be empty".to_string(),
            ));
        }
        self.output_suffix = suffix;
        Ok(self)
    }

    /// Set the chunk length of rewritten datasets.
    ///
    /// # Errors
    /// Returns an error if `chunk_events` is 0.
    pub fn try_with_chunk_events(mut self, chunk_events: usize) -> Result<Self> {
        if chunk_events == 0 {
            return Err(Error::InvalidOptions(
                "chunk_events must be at least 1".to_string(),
            ));
        }
        self.write.chunk_events = chunk_events;
        Ok(self)
    }

    /// Return the configured worker thread count, if any.
    #[must_use]
    pub fn effective_parallelism(&self) -> Option<usize> {
        self.parallelism.map(|threads| threads.max(1))
    }

    /// Path of the stitched copy of `input`: `<stem><suffix>.<ext>`.
    #[must_use]
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{stem}{}", self.output_suffix);
        if let Some(ext) = input.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        match &self.output_dir {
            Some(dir) => dir.join(name),
            None => input.with_file_name(name),
        }
    }
}
