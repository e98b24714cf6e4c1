#![cfg(feature = "hdf5")]
#![allow(clippy::cast_possible_truncation, clippy::float_cmp)]
use framestitch_algorithms::{rebuild_index, stitch, ClassifierKind};
use framestitch_core::{EventBatch, SourceCategory};
use framestitch_io::{
    load_entries, parse_catalogue, stitch_file, IndexConvention, StitchOptions, TimeUnit,
};
use hdf5::types::VarLenUnicode;
use hdf5::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;

const CATALOGUE: &str = r#"{
    "monitor": [
        { "lower_bound": 9000.0, "upper_bound": 17500.0, "shift": -6630.0 },
        { "lower_bound": 17500.0, "upper_bound": 26000.0, "shift": -11200.0 }
    ],
    "detector": [
        { "lower_bound": 16000.0, "upper_bound": 25000.0, "shift": -13000.0 },
        { "lower_bound": 25000.0, "upper_bound": 34000.0, "shift": -18500.0 },
        { "lower_bound": 34500.0, "upper_bound": 43000.0, "shift": -23800.0 }
    ]
}"#;

// Offsets in ns stored as u32.
fn write_entry(file: &File, path: &str, offsets_ns: &[u32], ids: &[u32], starts: &[u64]) {
    let group = file.create_group(path).unwrap();
    let offsets = group
        .new_dataset_builder()
        .with_data(offsets_ns)
        .create("event_time_offset")
        .unwrap();
    offsets
        .new_attr::<VarLenUnicode>()
        .create("units")
        .unwrap()
        .write_scalar(&VarLenUnicode::from_str("ns").unwrap())
        .unwrap();
    group
        .new_dataset_builder()
        .with_data(ids)
        .create("event_id")
        .unwrap();
    group
        .new_dataset_builder()
        .with_data(starts)
        .create("event_index")
        .unwrap();
}

// Events spread over 0..48 ms, ten per pulse.
fn synthetic_events(pulses: usize, seed: u32) -> (Vec<u32>, Vec<u32>, Vec<u64>) {
    let mut offsets = Vec::new();
    let mut ids = Vec::new();
    let mut counts = Vec::new();
    let mut state = seed;
    for _ in 0..pulses {
        for _ in 0..10 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            offsets.push((state >> 8) % 48_000_000);
            ids.push(state % 4096);
        }
        counts.push(10);
    }
    let fence_post = rebuild_index(&counts);
    let starts = fence_post[..pulses].to_vec();
    (offsets, ids, starts)
}

fn sample_file(dir: &Path) -> PathBuf {
    let path = dir.join("wfm_run.nxs");
    let file = File::create(&path).unwrap();
    file.create_group("entry").unwrap();

    let (offsets, ids, starts) = synthetic_events(20, 1);
    write_entry(&file, "entry/detector_1/events", &offsets, &ids, &starts);
    let (offsets, ids, starts) = synthetic_events(20, 2);
    write_entry(&file, "entry/monitor_2/events", &offsets, &ids, &starts);
    path
}

#[test]
fn test_file_matches_in_memory_stitching() {
    let dir = TempDir::new().unwrap();
    let input = sample_file(dir.path());
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let catalogue = parse_catalogue(CATALOGUE).unwrap();
    let before = load_entries(&input, None, IndexConvention::PulseStart).unwrap();
    assert_eq!(before.len(), 2);

    let options = StitchOptions::default()
        .with_classifier(ClassifierKind::Interval)
        .with_output_dir(&out_dir)
        .with_parallelism(2);
    let report = stitch_file(&input, &catalogue, &options).unwrap();
    assert!(report.is_success());
    assert_eq!(report.output, out_dir.join("wfm_run_stitched.nxs"));

    let after = load_entries(&report.output, None, IndexConvention::PulseStart).unwrap();
    for (original, stitched) in before.iter().zip(&after) {
        assert_eq!(original.name, stitched.name);
        assert_eq!(stitched.encoding.unit, TimeUnit::Nanoseconds);

        let descriptors = catalogue.descriptors_for(original.category).unwrap();
        let expected = stitch(&original.batch, descriptors);
        let expected_ns: Vec<f64> = expected.times().iter().map(|t| (t * 1e3).round()).collect();
        let actual_ns: Vec<f64> = stitched.batch.times().iter().map(|t| (t * 1e3).round()).collect();
        assert_eq!(actual_ns, expected_ns);
        assert_eq!(stitched.batch.ids(), expected.ids());
        assert_eq!(stitched.batch.pulse_index(), expected.pulse_index());
    }

    let monitor = after.iter().find(|e| e.name.contains("monitor")).unwrap();
    assert_eq!(monitor.category, SourceCategory::Monitor);
}

#[test]
fn test_fence_post_file_keeps_its_layout() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("fence.h5");
    {
        let file = File::create(&input).unwrap();
        write_entry(
            &file,
            "detector_events",
            &[20_000_000, 30_000_000, 1_000, 40_000_000],
            &[1, 2, 3, 4],
            &[0, 2, 2, 4],
        );
    }

    let catalogue = parse_catalogue(CATALOGUE).unwrap();
    let options = StitchOptions::default().with_index_convention(IndexConvention::FencePost);
    let report = stitch_file(&input, &catalogue, &options).unwrap();
    assert!(report.is_success());

    let stitched = load_entries(&report.output, None, IndexConvention::FencePost).unwrap();
    let batch: &EventBatch = &stitched[0].batch;
    assert_eq!(batch.ids(), &[1, 2, 4]);
    assert_eq!(batch.pulse_index(), &[0, 2, 2, 3]);
    assert_eq!(batch.times(), &[7_000.0, 11_500.0, 16_200.0]);
}

#[test]
fn test_rerun_on_same_input_overwrites_previous_output() {
    let dir = TempDir::new().unwrap();
    let input = sample_file(dir.path());
    let catalogue = parse_catalogue(CATALOGUE).unwrap();
    let options = StitchOptions::default().with_entries(["/entry/detector_1/events"]);

    let first = stitch_file(&input, &catalogue, &options).unwrap();
    let second = stitch_file(&input, &catalogue, &options).unwrap();
    assert_eq!(first.output, second.output);
    assert_eq!(first.totals(), second.totals());
    assert_eq!(second.entries.len(), 1);
}
