//! Training dataset loading
//!
//! Reads the subject CSV, validates its header, drops incomplete rows and plans the
//! seeded train/test split.

use crate::error::DetoxError;
use crate::features::FEATURE_NAMES;
use crate::types::{RawRecord, SubjectRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Score column used to derive the risk tier
pub const TARGET_COLUMN: &str = "Addiction_Level";

/// Identifying columns that are discarded on load
pub const IDENTIFYING_COLUMNS: [&str; 3] = ["ID", "Name", "Location"];

/// Rows as read from the CSV, before cleaning
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<RawRecord>,
    /// Identifying columns that were present in the header and discarded
    pub discarded_columns: Vec<String>,
}

/// Outcome of the cleaning step
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub records: Vec<SubjectRecord>,
    /// Rows dropped for a missing or non-finite value
    pub dropped_rows: usize,
}

/// Load the training CSV from disk
pub fn load_csv(path: &Path) -> Result<LoadedDataset, DetoxError> {
    let file = File::open(path).map_err(|e| {
        DetoxError::DataLoad(format!("Cannot open {}: {}", path.display(), e))
    })?;
    let dataset = read_csv(file)?;
    info!(
        path = %path.display(),
        rows = dataset.records.len(),
        "loaded training data"
    );
    Ok(dataset)
}

/// Parse training CSV from any reader
pub fn read_csv<R: Read>(reader: R) -> Result<LoadedDataset, DetoxError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| DetoxError::DataLoad(format!("Unreadable CSV header: {e}")))?
        .clone();

    let missing: Vec<&str> = FEATURE_NAMES
        .iter()
        .chain(std::iter::once(&TARGET_COLUMN))
        .filter(|column| !headers.iter().any(|h| h == **column))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(DetoxError::DataLoad(format!(
            "CSV is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let discarded_columns = headers
        .iter()
        .filter(|h| IDENTIFYING_COLUMNS.contains(h))
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<RawRecord>().enumerate() {
        let record = result.map_err(|e| {
            DetoxError::DataLoad(format!("Malformed CSV row {}: {}", row + 1, e))
        })?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(DetoxError::DataLoad("CSV contains no data rows".to_string()));
    }

    Ok(LoadedDataset {
        records,
        discarded_columns,
    })
}

/// Drop rows with any missing modeled value
pub fn clean(records: Vec<RawRecord>) -> Result<CleanedDataset, DetoxError> {
    let total = records.len();
    let records: Vec<SubjectRecord> = records.into_iter().filter_map(RawRecord::complete).collect();
    let dropped_rows = total - records.len();

    if dropped_rows > 0 {
        warn!(dropped_rows, total, "dropped incomplete rows");
    }
    if records.is_empty() {
        return Err(DetoxError::DataLoad(format!(
            "No usable rows after cleaning ({total} rows, all incomplete)"
        )));
    }

    Ok(CleanedDataset {
        records,
        dropped_rows,
    })
}

/// Seeded partition of row indices into train and test sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitPlan {
    /// Shuffle `0..n` with `seed`; the first `ceil(n * test_ratio)` indices are the test set
    pub fn new(n: usize, test_ratio: f64, seed: u64) -> Result<Self, DetoxError> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(DetoxError::Training(format!(
                "test_ratio must be between 0 and 1, got {test_ratio}"
            )));
        }

        let n_test = (n as f64 * test_ratio).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(DetoxError::Training(format!(
                "Cannot split {n} rows with test_ratio {test_ratio}: need at least one row on each side"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let train = indices.split_off(n_test);
        Ok(Self {
            train,
            test: indices,
        })
    }
}
