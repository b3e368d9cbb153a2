//! Document ingestion: walks a directory, matches files against a glob
//! pattern, and turns each supported file into a single `DocumentRecord`.

pub mod formats;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{DocumentRecord, SkippedFile};

pub use formats::{DocumentKind, GenericFormat, TextUnit};

/// Which extracted units of a file make up its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSelection {
    /// Only the first page/row/sheet is kept.
    #[default]
    First,
    /// All units are concatenated in order, separated by a blank line.
    All,
}

/// Records that were produced and files that were skipped, with reasons.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub records: Vec<DocumentRecord>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    units: UnitSelection,
    exclude: Vec<PathBuf>,
}

impl Ingestor {
    pub fn new(units: UnitSelection) -> Self {
        Self { units, exclude: Vec::new() }
    }

    /// Never descend into `dir` (e.g. the persisted index living under the
    /// documents root).
    #[must_use]
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
        self.exclude.push(dir);
        self
    }

    /// Load every file under `root` whose relative path matches `pattern`.
    ///
    /// Per-file failures (unsupported extension, parse errors, unreadable
    /// entries met while walking) are collected in `IngestOutcome::skipped`. Only an invalid pattern or an unreadable
    /// root fail the call.
    pub fn load_directory(&self, root: &Path, pattern: &str) -> Result<IngestOutcome> {
        let (files, unreadable) = self.list_files(root, pattern)?;
        if files.is_empty() {
            info!(root = %root.display(), pattern, "no files matched");
        }
        let mut outcome = IngestOutcome { skipped: unreadable, ..IngestOutcome::default() };
        for (file_index, path) in files.iter().enumerate() {
            debug!("Processing file {}/{}: {}", file_index + 1, files.len(), path.display());
            match self.load_file(path) {
                Ok(record) => outcome.records.push(record),
                Err(e) if e.is_per_file() => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    outcome.skipped.push(SkippedFile { path: path.clone(), reason: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            files = files.len(),
            records = outcome.records.len(),
            skipped = outcome.skipped.len(),
            "ingested directory"
        );
        Ok(outcome)
    }

    pub fn load_file(&self, path: &Path) -> Result<DocumentRecord> {
        let kind = DocumentKind::from_path(path)?;
        let mut units = kind.extract_units(path)?;
        if units.is_empty() {
            return Err(Error::parse_failure(path, "no extractable content"));
        }
        let source = path.to_string_lossy().to_string();
        let record = match self.units {
            UnitSelection::First => {
                let unit = units.swap_remove(0);
                let record = DocumentRecord::new(unit.text, source);
                match unit.label {
                    Some((key, value)) => record.with_meta(key, value),
                    None => record,
                }
            }
            UnitSelection::All => {
                let count = units.len();
                let text = units.into_iter().map(|u| u.text).collect::<Vec<_>>().join("\n\n");
                DocumentRecord::new(text, source).with_meta("units", count.to_string())
            }
        };
        Ok(record)
    }

    fn list_files(&self, root: &Path, pattern: &str) -> Result<(Vec<PathBuf>, Vec<SkippedFile>)> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| Error::InvalidConfig(format!("invalid glob pattern '{pattern}': {e}")))?;
        let options = MatchOptions { require_literal_separator: true, ..MatchOptions::new() };
        if !root.is_dir() {
            return Err(Error::storage_io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "documents directory not found"),
            ));
        }

        let mut files = Vec::new();
        let mut unreadable = Vec::new();
        let walker = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && self.is_excluded(e.path())));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    warn!(path = %path.display(), error = %e, "cannot read directory entry");
                    unreadable.push(SkippedFile { path, reason: format!("unreadable: {e}") });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if pattern.matches_path_with(relative, options) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        unreadable.sort_by(|a, b| a.path.cmp(&b.path));
        Ok((files, unreadable))
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        self.exclude.iter().any(|ex| dir.starts_with(ex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_unit_keeps_only_first_csv_row() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("people.csv");
        fs::write(&path, "name,age\nana,31\nbruno,45\n").unwrap();

        let record = Ingestor::new(UnitSelection::First).load_file(&path).unwrap();
        assert_eq!(record.text, "name: ana\nage: 31");
        assert_eq!(record.metadata.get("row").map(String::as_str), Some("0"));

        let record = Ingestor::new(UnitSelection::All).load_file(&path).unwrap();
        assert_eq!(record.text, "name: ana\nage: 31\n\nname: bruno\nage: 45");
        assert_eq!(record.metadata.get("units").map(String::as_str), Some("2"));
    }

    #[test]
    fn header_only_csv_is_a_parse_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.csv");
        fs::write(&path, "name,age\n").unwrap();
        let err = Ingestor::default().load_file(&path).unwrap_err();
        assert!(matches!(err, Error::ParseFailure { .. }));
    }

    #[test]
    fn pattern_is_matched_against_relative_path() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("top.txt"), "top").unwrap();
        fs::write(tmp.path().join("sub/inner.txt"), "inner").unwrap();
        fs::write(tmp.path().join("sub/notes.md"), "# notes").unwrap();

        let ingestor = Ingestor::default();
        let all = ingestor.load_directory(tmp.path(), "**/*.txt").unwrap();
        assert_eq!(all.records.len(), 2);
        let top_only = ingestor.load_directory(tmp.path(), "*.txt").unwrap();
        assert_eq!(top_only.records.len(), 1);
        assert_eq!(top_only.records[0].text, "top");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_reported_as_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ok.txt"), "fine").unwrap();
        let locked = tmp.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.txt"), "hidden").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let readable_anyway = fs::read_dir(&locked).is_ok();

        let outcome = Ingestor::default().load_directory(tmp.path(), "**/*");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let outcome = outcome.unwrap();

        // Permission bits do not apply to privileged users.
        if readable_anyway {
            return;
        }
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].path, locked);
        assert!(outcome.skipped[0].reason.starts_with("unreadable"));
    }

    #[test]
    fn excluded_directory_is_not_visited() {
        let tmp = TempDir::new().unwrap();
        let index_dir = tmp.path().join("index");
        fs::create_dir_all(&index_dir).unwrap();
        fs::write(index_dir.join("stale.txt"), "should not be read").unwrap();
        fs::write(tmp.path().join("doc.txt"), "read me").unwrap();

        let outcome = Ingestor::default().exclude(&index_dir).load_directory(tmp.path(), "**/*").unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = Ingestor::default().load_directory(tmp.path(), "[").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
