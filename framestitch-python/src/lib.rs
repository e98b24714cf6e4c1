//! framestitch-python: PyO3 Python bindings for framestitch.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args
)]
//!
//! Event arrays cross the boundary as numpy arrays; whole files are
//! stitched with the same copy-then-patch cycle as the CLI.

use framestitch_algorithms::{stitch_with, ClassifierKind, IntervalClassifier, LinearClassifier};
use framestitch_core::{EventBatch, FrameCatalogue, FrameDescriptor, SourceCategory};
use framestitch_io::{IndexConvention, StitchOptions};
use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

fn parse_category(name: &str) -> PyResult<SourceCategory> {
    match name.to_ascii_lowercase().as_str() {
        "monitor" => Ok(SourceCategory::Monitor),
        "detector" => Ok(SourceCategory::Detector),
        other => Err(value_error("category", format!("unknown category '{other}'"))),
    }
}

fn parse_classifier(name: &str) -> PyResult<ClassifierKind> {
    match name.to_ascii_lowercase().as_str() {
        "linear" => Ok(ClassifierKind::Linear),
        "interval" => Ok(ClassifierKind::Interval),
        other => Err(value_error(
            "classifier",
            format!("unknown classifier '{other}'"),
        )),
    }
}

/// Python wrapper for FrameDescriptor.
#[pyclass(name = "FrameDescriptor")]
#[derive(Clone)]
pub struct PyFrameDescriptor {
    inner: FrameDescriptor,
}

#[pymethods]
impl PyFrameDescriptor {
    #[new]
    fn new(lower_bound: f64, upper_bound: f64, shift: f64) -> PyResult<Self> {
        FrameDescriptor::try_new(lower_bound, upper_bound, shift)
            .map(|inner| Self { inner })
            .map_err(|e| value_error("FrameDescriptor", e))
    }

    #[getter]
    fn lower_bound(&self) -> f64 {
        self.inner.lower_bound
    }

    #[getter]
    fn upper_bound(&self) -> f64 {
        self.inner.upper_bound
    }

    #[getter]
    fn shift(&self) -> f64 {
        self.inner.shift
    }

    fn contains(&self, time: f64) -> bool {
        self.inner.contains(time)
    }

    fn __repr__(&self) -> String {
        format!(
            "FrameDescriptor(lower_bound={}, upper_bound={}, shift={})",
            self.inner.lower_bound, self.inner.upper_bound, self.inner.shift
        )
    }
}

/// Python wrapper for FrameCatalogue.
#[pyclass(name = "FrameCatalogue")]
#[derive(Clone, Default)]
pub struct PyFrameCatalogue {
    inner: FrameCatalogue,
}

#[pymethods]
impl PyFrameCatalogue {
    #[new]
    #[pyo3(signature = (monitor=None, detector=None))]
    fn new(
        monitor: Option<Vec<PyFrameDescriptor>>,
        detector: Option<Vec<PyFrameDescriptor>>,
    ) -> Self {
        let mut inner = FrameCatalogue::new();
        for (category, frames) in [
            (SourceCategory::Monitor, monitor),
            (SourceCategory::Detector, detector),
        ] {
            if let Some(frames) = frames {
                inner = inner.with_frames(category, frames.into_iter().map(|f| f.inner).collect());
            }
        }
        Self { inner }
    }

    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        framestitch_io::read_catalogue(path)
            .map(|inner| Self { inner })
            .map_err(|e| io_error(&format!("FrameCatalogue.from_file({path})"), e))
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        framestitch_io::parse_catalogue(json)
            .map(|inner| Self { inner })
            .map_err(|e| value_error("FrameCatalogue.from_json", e))
    }

    fn frames(&self, category: &str) -> PyResult<Vec<PyFrameDescriptor>> {
        let descriptors = self
            .inner
            .descriptors_for(parse_category(category)?)
            .map_err(|e| value_error("FrameCatalogue.frames", e))?;
        Ok(descriptors
            .iter()
            .map(|&inner| PyFrameDescriptor { inner })
            .collect())
    }

    /// Overlap and empty-window warnings as strings.
    fn validate(&self) -> Vec<String> {
        self.inner
            .validate()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

/// Stitch one batch of events held in numpy arrays.
///
/// `times` are in microseconds. With `fence_post=True` the index has one
/// more element than there are pulses and ends with the event count;
/// otherwise it holds the first event of each pulse. The returned
/// `pulse_index` uses the same layout as the input.
#[pyfunction]
#[pyo3(signature = (times, ids, pulse_index, frames, fence_post=true, classifier="linear"))]
fn stitch_events_numpy<'py>(
    py: Python<'py>,
    times: PyReadonlyArray1<'py, f64>,
    ids: PyReadonlyArray1<'py, u32>,
    pulse_index: PyReadonlyArray1<'py, u64>,
    frames: Vec<PyFrameDescriptor>,
    fence_post: bool,
    classifier: &str,
) -> PyResult<Bound<'py, PyDict>> {
    let times = times.as_slice()?.to_vec();
    let ids = ids.as_slice()?.to_vec();
    let pulse_index = pulse_index.as_slice()?.to_vec();
    let frames: Vec<FrameDescriptor> = frames.into_iter().map(|f| f.inner).collect();

    let batch = if fence_post {
        EventBatch::new(times, ids, pulse_index)
    } else {
        EventBatch::from_pulse_starts(times, ids, pulse_index)
    }
    .map_err(|e| value_error("stitch_events_numpy", e))?;

    let kind = parse_classifier(classifier)?;
    let outcome = py.allow_threads(|| match kind {
        ClassifierKind::Linear => stitch_with(&batch, &LinearClassifier::new(&frames)),
        ClassifierKind::Interval => stitch_with(&batch, &IntervalClassifier::new(&frames)),
    });

    let index = if fence_post {
        outcome.batch.pulse_index().to_vec()
    } else {
        outcome.batch.pulse_starts().to_vec()
    };
    let (times, ids, _) = outcome.batch.into_batch().into_parts();

    let dict = PyDict::new(py);
    dict.set_item("times", PyArray1::from_vec(py, times))?;
    dict.set_item("ids", PyArray1::from_vec(py, ids))?;
    dict.set_item("pulse_index", PyArray1::from_vec(py, index))?;
    dict.set_item("dropped", outcome.statistics.dropped_events)?;
    dict.set_item("frame_counts", outcome.statistics.frame_counts)?;
    Ok(dict)
}

/// Load one NeXus event entry as numpy arrays (times in microseconds).
#[pyfunction]
#[pyo3(signature = (path, entry, fence_post=false))]
fn load_entry_numpy<'py>(
    py: Python<'py>,
    path: &str,
    entry: &str,
    fence_post: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let convention = if fence_post {
        IndexConvention::FencePost
    } else {
        IndexConvention::PulseStart
    };
    let name = entry.to_string();
    let mut loaded =
        framestitch_io::load_entries(path, Some(std::slice::from_ref(&name)), convention)
            .map_err(|e| io_error(&format!("load_entry_numpy: {path}"), e))?;
    let loaded = loaded
        .pop()
        .ok_or_else(|| value_error("load_entry_numpy", format!("entry {entry} not found")))?;

    let index = if fence_post {
        loaded.batch.pulse_index().to_vec()
    } else {
        loaded.batch.pulse_starts().to_vec()
    };
    let (times, ids, _) = loaded.batch.into_parts();

    let dict = PyDict::new(py);
    dict.set_item("times", PyArray1::from_vec(py, times))?;
    dict.set_item("ids", PyArray1::from_vec(py, ids))?;
    dict.set_item("pulse_index", PyArray1::from_vec(py, index))?;
    dict.set_item("category", loaded.category.as_str())?;
    dict.set_item("units", loaded.encoding.unit.as_str())?;
    Ok(dict)
}

/// Stitch a NeXus file into `<stem>_stitched.<ext>`.
///
/// Returns the output path and one summary dict per entry. Entries that
/// fail carry an `error` message and are left unchanged in the output.
#[pyfunction]
#[pyo3(signature = (path, catalogue, entries=None, output_dir=None, classifier="linear", threads=None))]
fn stitch_file<'py>(
    py: Python<'py>,
    path: &str,
    catalogue: PyFrameCatalogue,
    entries: Option<Vec<String>>,
    output_dir: Option<String>,
    classifier: &str,
    threads: Option<usize>,
) -> PyResult<(String, Vec<Bound<'py, PyDict>>)> {
    let mut options = StitchOptions::default().with_classifier(parse_classifier(classifier)?);
    if let Some(entries) = entries {
        options = options.with_entries(entries);
    }
    if let Some(dir) = output_dir {
        options = options.with_output_dir(dir);
    }
    if let Some(threads) = threads {
        options = options
            .try_with_parallelism(threads)
            .map_err(|e| value_error("stitch_file", e))?;
    }

    let report = py
        .allow_threads(|| framestitch_io::stitch_file(path, &catalogue.inner, &options))
        .map_err(|e| io_error(&format!("stitch_file: {path}"), e))?;

    let mut summaries = Vec::with_capacity(report.entries.len());
    for entry in &report.entries {
        let dict = PyDict::new(py);
        dict.set_item("entry", &entry.entry)?;
        dict.set_item("category", entry.category.as_str())?;
        match &entry.result {
            Ok(stats) => {
                dict.set_item("input_events", stats.input_events)?;
                dict.set_item("output_events", stats.output_events)?;
                dict.set_item("dropped", stats.dropped_events)?;
                dict.set_item("frame_counts", stats.frame_counts.clone())?;
            }
            Err(err) => dict.set_item("error", err.to_string())?,
        }
        summaries.push(dict);
    }
    Ok((report.output.display().to_string(), summaries))
}

/// Python module for framestitch.
#[pymodule]
fn framestitch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFrameDescriptor>()?;
    m.add_class::<PyFrameCatalogue>()?;
    m.add_function(wrap_pyfunction!(stitch_events_numpy, m)?)?;
    m.add_function(wrap_pyfunction!(load_entry_numpy, m)?)?;
    m.add_function(wrap_pyfunction!(stitch_file, m)?)?;
    Ok(())
}
