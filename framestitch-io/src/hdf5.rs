//! HDF5/NeXus event entry I/O (`NXevent_data`).
//!
//! Entries are groups holding `event_time_offset`, `event_id` and
//! `event_index`. Loading converts offsets to microseconds using the
//! dataset's `units` attribute; storing converts back to the same unit and
//! element type, so downstream readers see the layout they expect.

use crate::options::{IndexConvention, StitchOptions, WriteOptions};
use crate::units::TimeUnit;
use crate::{resolve_category, Error, Result};
use framestitch_algorithms::{stitch_many, StitchOutcome, StitchStatistics};
use framestitch_core::{EventBatch, FrameCatalogue, FrameDescriptor, SourceCategory};
use hdf5::types::{
    FixedAscii, FloatSize, H5Type, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode,
};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Time-of-flight dataset of an event entry.
pub const EVENT_TIME_OFFSET: &str = "event_time_offset";
/// Pixel id dataset of an event entry.
pub const EVENT_ID: &str = "event_id";
/// Pulse index dataset of an event entry.
pub const EVENT_INDEX: &str = "event_index";

const STAGING_SUFFIX: &str = "__framestitch_new";
const MAX_GROUP_DEPTH: usize = 32;

/// Element type of a stored `event_time_offset` dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeStorage {
    #[default]
    U32,
    U64,
    I32,
    I64,
    F32,
    F64,
}

impl TimeStorage {
    fn from_descriptor(descriptor: &TypeDescriptor) -> Result<Self> {
        match descriptor {
            TypeDescriptor::Unsigned(IntSize::U8) => Ok(Self::U64),
            TypeDescriptor::Unsigned(_) => Ok(Self::U32),
            TypeDescriptor::Integer(IntSize::U8) => Ok(Self::I64),
            TypeDescriptor::Integer(_) => Ok(Self::I32),
            TypeDescriptor::Float(FloatSize::U4) => Ok(Self::F32),
            TypeDescriptor::Float(_) => Ok(Self::F64),
            other => Err(Error::InvalidFormat(format!(
                "unsupported {EVENT_TIME_OFFSET} type: {other:?}"
            ))),
        }
    }

    /// Short type name used in messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for TimeStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit and element type of a stored `event_time_offset` dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeEncoding {
    pub unit: TimeUnit,
    pub storage: TimeStorage,
}

/// One loaded event entry.
#[derive(Clone, Debug)]
pub struct LoadedEntry {
    /// Group path of the entry.
    pub name: String,
    /// Category resolved from the entry name.
    pub category: SourceCategory,
    /// Events with times in microseconds.
    pub batch: EventBatch,
    /// On-disk time layout, reused when storing.
    pub encoding: TimeEncoding,
}

/// Outcome of stitching one entry of a file.
#[derive(Debug)]
pub struct EntryReport {
    pub entry: String,
    pub category: SourceCategory,
    pub result: Result<StitchStatistics>,
}

/// Outcome of stitching one file.
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub entries: Vec<EntryReport>,
}

impl FileReport {
    /// Entries that could not be stitched.
    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> + '_ {
        self.entries.iter().filter(|report| report.result.is_err())
    }

    /// Returns true if every entry was stitched.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Sum of the statistics of all stitched entries.
    #[must_use]
    pub fn totals(&self) -> StitchStatistics {
        let mut totals = StitchStatistics::default();
        for stats in self.entries.iter().filter_map(|r| r.result.as_ref().ok()) {
            totals.pulses += stats.pulses;
            totals.input_events += stats.input_events;
            totals.output_events += stats.output_events;
            totals.dropped_events += stats.dropped_events;
        }
        totals
    }
}

/// Find every group below `root` that holds an `event_time_offset` dataset.
///
/// # Errors
/// Returns an error if the group hierarchy cannot be traversed.
pub fn discover_entries(root: &Group) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    collect_entries(root, 0, &mut entries)?;
    entries.sort();
    entries.dedup();
    Ok(entries)
}

fn collect_entries(group: &Group, depth: usize, entries: &mut Vec<String>) -> Result<()> {
    if group.link_exists(EVENT_TIME_OFFSET) && group.dataset(EVENT_TIME_OFFSET).is_ok() {
        entries.push(group.name());
    }
    if depth >= MAX_GROUP_DEPTH {
        return Ok(());
    }
    for child in group.groups()? {
        collect_entries(&child, depth + 1, entries)?;
    }
    Ok(())
}

/// Open `path` read-only and list its event entries.
///
/// # Errors
/// Returns an error if the file cannot be opened or traversed.
pub fn list_entries<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let file = File::open(path)?;
    discover_entries(&file)
}

/// Load one entry.
///
/// # Errors
/// Returns an error carrying the entry name if a dataset is missing, has
/// an unsupported type or unit, or if the arrays are inconsistent.
pub fn load_entry(root: &Group, entry: &str, convention: IndexConvention) -> Result<LoadedEntry> {
    load_entry_inner(root, entry, convention).map_err(|err| err.in_entry(entry))
}

fn load_entry_inner(root: &Group, entry: &str, convention: IndexConvention) -> Result<LoadedEntry> {
    let group = root.group(entry_path(entry))?;

    let offsets = group.dataset(EVENT_TIME_OFFSET)?;
    let encoding = read_time_encoding(&offsets)?;
    let times: Vec<f64> = offsets
        .read_raw::<f64>()?
        .into_iter()
        .map(|value| encoding.unit.to_microseconds(value))
        .collect();
    let ids = read_dataset_vec::<u32>(&group, EVENT_ID)?;
    let index = read_dataset_vec::<u64>(&group, EVENT_INDEX)?;

    let batch = match convention {
        IndexConvention::PulseStart => EventBatch::from_pulse_starts(times, ids, index)?,
        IndexConvention::FencePost => EventBatch::new(times, ids, index)?,
    };
    debug!(
        entry,
        unit = %encoding.unit,
        storage = %encoding.storage,
        events = batch.len(),
        pulses = batch.pulse_count(),
        "loaded entry"
    );

    Ok(LoadedEntry {
        name: entry.to_string(),
        category: resolve_category(entry),
        batch,
        encoding,
    })
}

/// Load several entries from a file opened read-only.
///
/// Entries are discovered automatically when `entries` is `None`.
///
/// # Errors
/// Returns the first error encountered.
pub fn load_entries<P: AsRef<Path>>(
    path: P,
    entries: Option<&[String]>,
    convention: IndexConvention,
) -> Result<Vec<LoadedEntry>> {
    let file = File::open(path)?;
    let names = match entries {
        Some(names) => names.to_vec(),
        None => discover_entries(&file)?,
    };
    names
        .iter()
        .map(|name| load_entry(&file, name, convention))
        .collect()
}

/// Replace the three event arrays of an entry.
///
/// The new arrays are encoded and written under staging names first and
/// only then swapped in, so a failure leaves the original arrays intact.
///
/// # Errors
/// Returns an error carrying the entry name if a time does not fit the
/// stored representation or if HDF5 I/O fails.
pub fn store_entry(
    root: &Group,
    entry: &str,
    batch: &EventBatch,
    encoding: TimeEncoding,
    convention: IndexConvention,
    write: &WriteOptions,
) -> Result<()> {
    store_entry_inner(root, entry, batch, encoding, convention, write)
        .map_err(|err| err.in_entry(entry))
}

fn store_entry_inner(
    root: &Group,
    entry: &str,
    batch: &EventBatch,
    encoding: TimeEncoding,
    convention: IndexConvention,
    write: &WriteOptions,
) -> Result<()> {
    let group = root.group(entry_path(entry))?;
    let offsets = EncodedTimes::encode(batch.times(), encoding)?;
    let index = match convention {
        IndexConvention::PulseStart => batch.pulse_starts(),
        IndexConvention::FencePost => batch.pulse_index(),
    };

    for name in [EVENT_TIME_OFFSET, EVENT_ID, EVENT_INDEX] {
        let staged = staging_name(name);
        if group.link_exists(&staged) {
            group.unlink(&staged)?;
        }
    }

    let time_ds = offsets.write(&group, &staging_name(EVENT_TIME_OFFSET), write)?;
    set_dataset_units(&time_ds, encoding.unit.as_str())?;
    write_dataset(&group, &staging_name(EVENT_ID), batch.ids(), write)?;
    write_dataset(&group, &staging_name(EVENT_INDEX), index, write)?;

    for name in [EVENT_TIME_OFFSET, EVENT_ID, EVENT_INDEX] {
        if group.link_exists(name) {
            group.unlink(name)?;
        }
        group.relink(&staging_name(name), name)?;
    }
    Ok(())
}

/// Copy `input` and stitch every event entry of the copy in place.
///
/// Entries are loaded one by one, stitched in parallel and written back
/// one by one. A failing entry is reported and left untouched; the other
/// entries are still processed.
///
/// # Errors
/// Returns an error if the copy cannot be created or opened, or if entry
/// discovery fails. Per-entry failures are returned in the report.
pub fn stitch_file<P: AsRef<Path>>(
    input: P,
    catalogue: &FrameCatalogue,
    options: &StitchOptions,
) -> Result<FileReport> {
    let input = input.as_ref();
    let output = options.output_path_for(input);
    if output == input {
        return Err(Error::InvalidOptions(format!(
            "output path {} equals the input path",
            output.display()
        )));
    }

    info!(input = %input.display(), output = %output.display(), "copying input file");
    std::fs::copy(input, &output)?;
    let file = File::open_rw(&output)?;

    let entries = match &options.entries {
        Some(entries) => entries.clone(),
        None => discover_entries(&file)?,
    };
    if entries.is_empty() {
        warn!(file = %output.display(), "no event entries found");
    }

    let prepared: Vec<Result<(LoadedEntry, &[FrameDescriptor])>> = entries
        .iter()
        .map(|entry| {
            let descriptors = catalogue
                .descriptors_for(resolve_category(entry))
                .map_err(|err| Error::from(err).in_entry(entry))?;
            let loaded = load_entry(&file, entry, options.index_convention)?;
            Ok((loaded, descriptors))
        })
        .collect();

    let jobs: Vec<(&EventBatch, &[FrameDescriptor])> = prepared
        .iter()
        .filter_map(|job| job.as_ref().ok())
        .map(|(loaded, descriptors)| (&loaded.batch, *descriptors))
        .collect();
    let mut outcomes = run_stitch(&jobs, options)?.into_iter();

    let reports = entries
        .iter()
        .zip(prepared)
        .map(|(entry, prepared)| {
            let result = prepared.and_then(|(loaded, _)| {
                let outcome = outcomes.next().ok_or_else(|| {
                    Error::InvalidFormat("stitching produced fewer outcomes than jobs".to_string())
                })?;
                store_entry(
                    &file,
                    entry,
                    &outcome.batch,
                    loaded.encoding,
                    options.index_convention,
                    &options.write,
                )?;
                Ok(outcome.statistics)
            });
            log_entry(entry, &result);
            EntryReport {
                entry: entry.clone(),
                category: resolve_category(entry),
                result,
            }
        })
        .collect();

    Ok(FileReport {
        input: input.to_path_buf(),
        output,
        entries: reports,
    })
}

fn run_stitch(
    jobs: &[(&EventBatch, &[FrameDescriptor])],
    options: &StitchOptions,
) -> Result<Vec<StitchOutcome>> {
    match options.effective_parallelism() {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::InvalidOptions(format!("failed to build thread pool: {e}")))?;
            Ok(pool.install(|| stitch_many(jobs, options.classifier)))
        }
        None => Ok(stitch_many(jobs, options.classifier)),
    }
}

fn log_entry(entry: &str, result: &Result<StitchStatistics>) {
    match result {
        Ok(stats) => {
            info!(
                entry,
                events = stats.input_events,
                kept = stats.output_events,
                dropped = stats.dropped_events,
                pulses = stats.pulses,
                "stitched entry"
            );
            debug!(entry, frame_counts = ?stats.frame_counts, "frame populations");
        }
        Err(err) => warn!(entry, error = %err, "entry not stitched"),
    }
}

fn entry_path(entry: &str) -> &str {
    let trimmed = entry.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn staging_name(name: &str) -> String {
    format!("{name}{STAGING_SUFFIX}")
}

fn read_time_encoding(dataset: &Dataset) -> Result<TimeEncoding> {
    let storage = TimeStorage::from_descriptor(&dataset.dtype()?.to_descriptor()?)?;
    let unit = match read_units(dataset)? {
        Some(units) => TimeUnit::from_str(&units).map_err(Error::InvalidFormat)?,
        None => {
            debug!("no units attribute on {EVENT_TIME_OFFSET}, assuming ns");
            TimeUnit::Nanoseconds
        }
    };
    Ok(TimeEncoding { unit, storage })
}

fn read_units(dataset: &Dataset) -> Result<Option<String>> {
    let Ok(attr) = dataset.attr("units") else {
        return Ok(None);
    };
    if let Ok(value) = attr.read_scalar::<VarLenUnicode>() {
        return Ok(Some(value.to_string()));
    }
    if let Ok(value) = attr.read_scalar::<VarLenAscii>() {
        return Ok(Some(value.to_string()));
    }
    if let Ok(value) = attr.read_scalar::<FixedAscii<32>>() {
        return Ok(Some(value.as_str().trim_end_matches('\0').to_string()));
    }
    Err(Error::InvalidFormat(format!(
        "unreadable units attribute on {EVENT_TIME_OFFSET}"
    )))
}

/// Stitched times converted to the stored unit and element type.
enum EncodedTimes {
    U32(Vec<u32>),
    U64(Vec<u64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl EncodedTimes {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn encode(times_us: &[f64], encoding: TimeEncoding) -> Result<Self> {
        let scaled = times_us
            .iter()
            .map(|&t| encoding.unit.convert_microseconds(t));
        Ok(match encoding.storage {
            TimeStorage::U32 => Self::U32(round_into(
                scaled,
                encoding,
                0.0,
                f64::from(u32::MAX),
                |v| v as u32,
            )?),
            TimeStorage::U64 => Self::U64(round_into(
                scaled,
                encoding,
                0.0,
                u64::MAX as f64,
                |v| v as u64,
            )?),
            TimeStorage::I32 => Self::I32(round_into(
                scaled,
                encoding,
                f64::from(i32::MIN),
                f64::from(i32::MAX),
                |v| v as i32,
            )?),
            TimeStorage::I64 => Self::I64(round_into(
                scaled,
                encoding,
                i64::MIN as f64,
                i64::MAX as f64,
                |v| v as i64,
            )?),
            TimeStorage::F32 => Self::F32(scaled.map(|v| v as f32).collect()),
            TimeStorage::F64 => Self::F64(scaled.collect()),
        })
    }

    fn write(&self, group: &Group, name: &str, write: &WriteOptions) -> Result<Dataset> {
        match self {
            Self::U32(values) => write_dataset(group, name, values, write),
            Self::U64(values) => write_dataset(group, name, values, write),
            Self::I32(values) => write_dataset(group, name, values, write),
            Self::I64(values) => write_dataset(group, name, values, write),
            Self::F32(values) => write_dataset(group, name, values, write),
            Self::F64(values) => write_dataset(group, name, values, write),
        }
    }
}

fn round_into<T>(
    values: impl Iterator<Item = f64>,
    encoding: TimeEncoding,
    min: f64,
    max: f64,
    cast: impl Fn(f64) -> T,
) -> Result<Vec<T>> {
    values
        .map(|value| {
            let rounded = value.round();
            if rounded.is_finite() && rounded >= min && rounded <= max {
                Ok(cast(rounded))
            } else {
                Err(Error::TimeOutOfRange {
                    value,
                    unit: encoding.unit.as_str(),
                    storage: encoding.storage.as_str(),
                })
            }
        })
        .collect()
}

fn write_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    data: &[T],
    write: &WriteOptions,
) -> Result<Dataset> {
    let dataset = create_extendable_dataset::<T>(
        group,
        name,
        write.chunk_events,
        write.compression,
        write.shuffle,
    )?;
    append_slice(&dataset, 0, data)?;
    Ok(dataset)
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    chunk_events: usize,
    compression: Option<u8>,
    shuffle: bool,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((chunk_events.max(1),));

    if let Some(level) = compression {
        builder = builder.deflate(level);
    }

    if shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
