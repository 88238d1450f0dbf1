//! Discovery and ingestion of labeled pressure recordings.
//!
//! A recording is a delimited text file with a header row containing the eight
//! channel columns `L1..L4, R1..R4`. Other columns (the recorder writes a leading
//! `Time` column) are ignored. The label of every row in a recording is derived
//! from the file's base name alone, so `alice/lean_left.csv` and
//! `bob/lean_left.csv` land in the same class.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{info, warn};
use serde::Deserialize;

/// Channel names in the fixed order used for every feature vector.
pub const CHANNELS: [&str; 8] = ["L1", "L2", "L3", "L4", "R1", "R2", "R3", "R4"];

/// Number of pressure channels per reading.
pub const NUM_CHANNELS: usize = CHANNELS.len();

lazy_static! {
    /// Recognized recording names and the canonical label each one maps to.
    static ref CANONICAL_LABELS: HashMap<&'static str, &'static str> = {
        let mut table = HashMap::new();
        table.insert("straight", "straight");
        table.insert("lean_left", "lean_left");
        table.insert("lean_right", "lean_right");
        table.insert("lean_forward", "lean_forward");
        table.insert("lean_back", "lean_back");
        table
    };
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Data directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("No usable samples found under {0}")]
    Empty(PathBuf),
    #[error("Failed to read recording {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One instant's eight-channel pressure vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    values: [f64; NUM_CHANNELS],
}

impl SensorReading {
    pub fn new(values: [f64; NUM_CHANNELS]) -> Self {
        Self { values }
    }

    /// Channel values in `CHANNELS` order.
    pub fn values(&self) -> &[f64; NUM_CHANNELS] {
        &self.values
    }

    pub fn channel(&self, name: &str) -> Option<f64> {
        CHANNELS.iter().position(|c| *c == name).map(|i| self.values[i])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub reading: SensorReading,
    pub label: String,
}

/// All merged labeled samples.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<LabeledSample>,
}

impl Dataset {
    pub fn new(samples: Vec<LabeledSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = LabeledSample>) {
        self.samples.extend(samples);
    }

    /// Number of samples per label.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(sample.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Maps a recording's base name to its canonical label.
///
/// Names outside the table pass through unchanged and become their own class.
pub fn canonical_label(base_name: &str) -> String {
    CANONICAL_LABELS
        .get(base_name)
        .map(|label| label.to_string())
        .unwrap_or_else(|| base_name.to_string())
}

/// Derives the label for a recording from its file name (extension stripped).
pub fn label_for_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(canonical_label)
}

#[derive(Debug, Deserialize)]
struct RecordingRow {
    #[serde(rename = "L1")]
    l1: f64,
    #[serde(rename = "L2")]
    l2: f64,
    #[serde(rename = "L3")]
    l3: f64,
    #[serde(rename = "L4")]
    l4: f64,
    #[serde(rename = "R1")]
    r1: f64,
    #[serde(rename = "R2")]
    r2: f64,
    #[serde(rename = "R3")]
    r3: f64,
    #[serde(rename = "R4")]
    r4: f64,
}

impl RecordingRow {
    fn into_reading(self) -> Option<SensorReading> {
        let values = [
            self.l1, self.l2, self.l3, self.l4, self.r1, self.r2, self.r3, self.r4,
        ];
        values
            .iter()
            .all(|v| v.is_finite())
            .then(|| SensorReading::new(values))
    }
}

/// Outcome of reading one recording file.
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub label: String,
    pub samples: Vec<LabeledSample>,
    pub skipped_rows: usize,
}

/// Totals across one `load_dataset` run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub files_read: usize,
    pub files_failed: usize,
    pub rows_accepted: usize,
    pub rows_skipped: usize,
}

/// Recursively finds `.csv` recordings under `root`, sorted by path.
///
/// Symlinked directories are not followed. A subdirectory that cannot be read
/// is skipped with a warning; only an unreadable `root` is an error.
pub fn discover_recordings(root: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    if !root.is_dir() {
        return Err(DatasetError::RootNotFound(root.to_path_buf()));
    }

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir.as_path() == root => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable directory {:?}: {}", dir, e);
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("Skipping {:?}: {}", path, e);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                warn!("Not following symlinked directory {:?}", path);
            } else if is_recording(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_recording(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Reads one recording, labeling every row with `label`.
///
/// Rows that do not parse into eight finite channel values are skipped with a
/// warning; only failure to open the file or read its header is an error.
pub fn read_recording(path: &Path, label: &str) -> Result<RecordingSummary, DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut samples = Vec::new();
    let mut skipped_rows = 0;
    for (i, record) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = i + 2;
        let parsed = record
            .and_then(|r| r.deserialize::<RecordingRow>(Some(&headers)))
            .map_err(|e| e.to_string())
            .and_then(|row| {
                row.into_reading()
                    .ok_or_else(|| "non-finite channel value".to_string())
            });
        match parsed {
            Ok(reading) => samples.push(LabeledSample {
                reading,
                label: label.to_string(),
            }),
            Err(e) => {
                warn!("Skipping {}:{}: {}", path.display(), line, e);
                skipped_rows += 1;
            }
        }
    }

    Ok(RecordingSummary {
        path: path.to_path_buf(),
        label: label.to_string(),
        samples,
        skipped_rows,
    })
}

/// Loads and merges every recording under `root` into one dataset.
///
/// Fails with `DatasetError::Empty` when no usable sample was read.
pub fn load_dataset(root: &Path) -> Result<(Dataset, LoadReport), DatasetError> {
    let paths = discover_recordings(root)?;
    info!("Found {} recording(s) under {:?}", paths.len(), root);

    let mut dataset = Dataset::default();
    let mut report = LoadReport::default();
    for path in paths {
        let Some(label) = label_for_path(&path) else {
            warn!("Skipping {:?}: file name is not valid UTF-8", path);
            report.files_failed += 1;
            continue;
        };
        match read_recording(&path, &label) {
            Ok(summary) => {
                info!(
                    "  {:?} -> '{}' ({} rows, {} skipped)",
                    summary.path,
                    summary.label,
                    summary.samples.len(),
                    summary.skipped_rows
                );
                report.files_read += 1;
                report.rows_accepted += summary.samples.len();
                report.rows_skipped += summary.skipped_rows;
                dataset.extend(summary.samples);
            }
            Err(e) => {
                warn!("Error reading recording: {}", e);
                report.files_failed += 1;
            }
        }
    }

    if dataset.is_empty() {
        return Err(DatasetError::Empty(root.to_path_buf()));
    }

    info!("Total data points: {}", dataset.len());
    info!("Unique labels found: {:?}", dataset.class_counts());
    Ok((dataset, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Time,L1,L2,L3,L4,R1,R2,R3,R4";

    fn write_recording(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(f, "{}", row).unwrap();
        }
        path
    }

    #[test]
    fn test_canonical_label_table() {
        for name in ["straight", "lean_left", "lean_right", "lean_forward", "lean_back"] {
            assert_eq!(canonical_label(name), name);
        }
    }

    #[test]
    fn test_canonical_label_passthrough() {
        assert_eq!(canonical_label("slouch"), "slouch");
        assert_eq!(canonical_label("Straight"), "Straight");
    }

    #[test]
    fn test_label_ignores_parent_folder() {
        let a = label_for_path(Path::new("data/alice/lean_left.csv"));
        let b = label_for_path(Path::new("data\\bob/lean_left.csv"));
        assert_eq!(a.as_deref(), Some("lean_left"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unparseable_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recording(
            dir.path(),
            "straight.csv",
            &[
                "0.0,1,2,3,4,5,6,7,8",
                "0.1,1,2,oops,4,5,6,7,8",
                "0.2,1,2,3",
                "0.3,8,7,6,5,4,3,2,1",
            ],
        );
        let summary = read_recording(&path, "straight").unwrap();
        assert_eq!(summary.samples.len(), 2);
        assert_eq!(summary.skipped_rows, 2);
        assert_eq!(summary.samples[1].reading.channel("L1"), Some(8.0));
        assert_eq!(summary.samples[1].reading.channel("R4"), Some(1.0));
    }

    #[test]
    fn test_discover_is_recursive_and_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_recording(&dir.path().join("p1"), "straight.csv", &["0,1,1,1,1,1,1,1,1"]);
        write_recording(&dir.path().join("p2/deep"), "lean_back.CSV", &["0,1,1,1,1,1,1,1,1"]);
        fs::write(dir.path().join("notes.txt"), "not a recording").unwrap();

        let found = discover_recordings(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let alice = dir.path().join("alice");
        write_recording(&alice, "straight.csv", &["0,1,1,1,1,1,1,1,1"]);
        std::os::unix::fs::symlink(&alice, dir.path().join("alice_again")).unwrap();
        // a cycle back to the root
        std::os::unix::fs::symlink(dir.path(), alice.join("loop")).unwrap();

        let found = discover_recordings(dir.path()).unwrap();
        assert_eq!(found, vec![alice.join("straight.csv")]);

        let (dataset, _) = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_recording_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        let source = write_recording(&raw, "lean_back.csv", &["0,1,1,1,1,1,1,1,1"]);
        let linked = dir.path().join("linked");
        fs::create_dir_all(&linked).unwrap();
        std::os::unix::fs::symlink(&source, linked.join("lean_left.csv")).unwrap();

        let (dataset, _) = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.class_counts()["lean_left"], 1);
        assert_eq!(dataset.class_counts()["lean_back"], 1);
    }

    #[test]
    fn test_merge_same_label_across_folders() {
        let dir = tempfile::tempdir().unwrap();
        write_recording(
            &dir.path().join("alice"),
            "lean_left.csv",
            &["0,1,1,1,1,1,1,1,1", "0,2,2,2,2,2,2,2,2"],
        );
        write_recording(&dir.path().join("bob"), "lean_left.csv", &["0,3,3,3,3,3,3,3,3"]);
        write_recording(&dir.path().join("bob"), "straight.csv", &["0,4,4,4,4,4,4,4,4"]);

        let (dataset, report) = load_dataset(dir.path()).unwrap();
        let counts = dataset.class_counts();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["lean_left"], 3);
        assert_eq!(counts["straight"], 1);
        assert_eq!(report.files_read, 3);
        assert_eq!(report.rows_accepted, 4);
    }

    #[test]
    fn test_empty_dataset_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_recording(dir.path(), "straight.csv", &["0,a,b,c,d,e,f,g,h"]);
        let result = load_dataset(dir.path());
        assert!(matches!(result, Err(DatasetError::Empty(_))));
    }

    #[test]
    fn test_missing_root() {
        let result = load_dataset(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(DatasetError::RootNotFound(_))));
    }
}
