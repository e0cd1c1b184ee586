use parser::{
    BenchLogParser, ChartError, Dataset, DatasetError, ParseError, Record, RecognizerError,
    SectionParser, StatParser,
};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filename substrings marking files that never hold parseable run output.
pub const DEFAULT_EXCLUDES: [&str; 2] = ["txt", "DRAM"];

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("missing dataset checkpoint {0}; run the parse stage first")]
    MissingCheckpoint(PathBuf),
}

/// Parses one log file as a single section and returns its final record.
pub fn parse_stat_file(path: &Path) -> Result<Record, EtlError> {
    let file = File::open(path)?;
    let mut sections = SectionParser::new(None);
    sections.register(StatParser::new(BenchLogParser::new()));
    sections.parse(BufReader::new(file))?;
    Ok(sections.parsers()[0].dataset().clone())
}

/// Scans a log directory into a dataset.
///
/// `coords` maps a candidate filename to the leading label tuple (one label
/// per dimension except the trailing measurements dimension); returning
/// `None` skips the file. Files matching an exclusion substring are skipped
/// up front, and files that fail to open or read are skipped with a warning
/// rather than aborting the batch. Returns the number of inserted stats.
pub fn scan_into<F>(
    dir: &Path,
    dataset: &mut Dataset,
    excludes: &[&str],
    mut coords: F,
) -> Result<usize, EtlError>
where
    F: FnMut(&str) -> Option<Vec<String>>,
{
    let mut inserted = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if excludes.iter().any(|token| name.contains(token)) {
            debug!(file = %name, "excluded by name");
            continue;
        }
        let Some(prefix) = coords(&name) else {
            debug!(file = %name, "filename not recognized, skipping");
            continue;
        };
        let record = match parse_stat_file(&entry.path()) {
            Ok(record) => record,
            Err(err) => {
                warn!(file = %name, %err, "unreadable log file, skipping");
                continue;
            }
        };
        for (key, value) in record.iter() {
            let mut labels: Vec<&str> = prefix.iter().map(String::as_str).collect();
            labels.push(key);
            dataset.insert(&labels, value)?;
            inserted += 1;
        }
    }
    info!(dir = %dir.display(), inserted, "directory scan complete");
    Ok(inserted)
}

/// Writes a dataset checkpoint.
pub fn write_checkpoint(dataset: &Dataset, path: &Path, indent: usize) -> Result<(), EtlError> {
    let file = File::create(path)?;
    dataset.dump(BufWriter::new(file), indent)?;
    info!(path = %path.display(), "wrote dataset checkpoint");
    Ok(())
}

/// Reloads a dataset checkpoint. A missing checkpoint is fatal: slicing
/// stages must not silently run against nothing.
pub fn load_checkpoint(path: &Path) -> Result<Dataset, EtlError> {
    let file = File::open(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            EtlError::MissingCheckpoint(path.to_path_buf())
        } else {
            EtlError::Io(err)
        }
    })?;
    Ok(Dataset::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::{LabelRecognizer, Select, Vocabulary};
    use std::io::Write as _;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_scan_skips_excluded_and_unrecognized_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bc-8-baseType3", "core_exe_time0: 120\n");
        write_file(dir.path(), "bc-8-flatflash", "core_exe_time0: 80\n");
        write_file(dir.path(), "readme.txt", "core_exe_time0: 999\n");
        write_file(dir.path(), "bc-8-assd-WP-DRAM", "core_exe_time0: 999\n");
        write_file(dir.path(), "mystery-file", "core_exe_time0: 999\n");

        let mut recognizer = LabelRecognizer::new();
        recognizer.register(Vocabulary::exact(["baseType3", "flatflash"]));
        recognizer.register(Vocabulary::exact(["bc-8"]));

        let mut dataset = Dataset::from_dim_names(["settings", "workloads", "measurements"]);
        scan_into(dir.path(), &mut dataset, &DEFAULT_EXCLUDES, |name| {
            let found = recognizer.recognize(name);
            if !found.is_exhausted() {
                return None;
            }
            Some(vec![
                found.label(0)?.to_string(),
                found.label(1)?.to_string(),
            ])
        })
        .unwrap();

        assert_eq!(dataset.labels("settings").unwrap().len(), 2);
        // Directory iteration order is arbitrary, so pin the settings order.
        let slice = dataset
            .slice(&[
                Select::many(["baseType3", "flatflash"]),
                "bc-8".into(),
                "core_exe_time0".into(),
            ])
            .unwrap();
        assert_eq!(slice.values(), &[120.0, 80.0]);
    }

    #[test]
    fn test_missing_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_checkpoint(&dir.path().join("all.dat"));
        assert!(matches!(result, Err(EtlError::MissingCheckpoint(_))));
    }

    #[test]
    fn test_checkpoint_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.dat");

        let mut dataset = Dataset::from_dim_names(["settings", "workloads", "measurements"]);
        dataset.insert(&["A", "bc", "m"], 1.5).unwrap();
        write_checkpoint(&dataset, &path, 0).unwrap();

        let reloaded = load_checkpoint(&path).unwrap();
        assert_eq!(reloaded.get(&["A", "bc", "m"]).unwrap(), 1.5);
    }
}
