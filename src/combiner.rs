use crate::{
    error::{Error, Result},
    lister::FileEntry,
};
use serde::Serialize;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Default text placed after every combined document.
pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

/// Outcome of a [`combine`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CombineReport {
    /// Destination file
    pub output_path: PathBuf,

    /// Names that were written, in output order
    pub combined: Vec<String>,

    /// Inputs that could not be read and were skipped
    pub failures: Vec<Error>,

    /// Bytes written to the destination, separators included
    pub bytes_written: u64,
}

impl CombineReport {
    /// Returns true if every input was combined.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Concatenates `names` from `directory` into `output_path`.
///
/// Each document is followed by `separator`, the last one included. The
/// destination is truncated first. Unreadable inputs are recorded in the
/// report and skipped.
///
/// # Errors
///
/// Returns an error if the destination cannot be created, written or
/// flushed. Input failures never abort the call.
#[instrument(skip(names, separator), fields(output = %output_path.display(), files = names.len()))]
pub fn combine(
    directory: &Path,
    names: &[String],
    output_path: &Path,
    separator: &str,
) -> Result<CombineReport> {
    let inputs: Vec<(&str, PathBuf)> = names
        .iter()
        .map(|name| (name.as_str(), directory.join(name)))
        .collect();
    write_combined(&inputs, output_path, separator)
}

/// Concatenates listed entries into `output_path`, reading each one
/// through its on-disk name.
///
/// # Errors
///
/// See [`combine`].
#[instrument(skip(entries, separator), fields(output = %output_path.display(), files = entries.len()))]
pub fn combine_entries(
    entries: &[FileEntry],
    output_path: &Path,
    separator: &str,
) -> Result<CombineReport> {
    let inputs: Vec<(&str, PathBuf)> = entries
        .iter()
        .map(|entry| (entry.name.as_str(), entry.path()))
        .collect();
    write_combined(&inputs, output_path, separator)
}

fn write_combined(
    inputs: &[(&str, PathBuf)],
    output_path: &Path,
    separator: &str,
) -> Result<CombineReport> {
    let file = fs::File::create(output_path).map_err(|e| Error::io("create", output_path, e))?;
    let mut writer = BufWriter::new(file);

    let mut report = CombineReport {
        output_path: output_path.to_path_buf(),
        ..CombineReport::default()
    };

    for (name, path) in inputs {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                let err = Error::io("read", path, e);
                warn!("Skipping input: {}", err);
                report.failures.push(err);
                continue;
            }
        };

        writer
            .write_all(content.as_bytes())
            .map_err(|e| Error::io("write", output_path, e))?;
        writer
            .write_all(separator.as_bytes())
            .map_err(|e| Error::io("write", output_path, e))?;

        report.bytes_written += (content.len() + separator.len()) as u64;
        report.combined.push((*name).to_string());
        debug!("Appended {} ({} bytes)", name, content.len());
    }

    writer
        .flush()
        .map_err(|e| Error::io("write", output_path, e))?;

    info!(
        "Combined {} of {} file(s) into {}",
        report.combined.len(),
        inputs.len(),
        output_path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_combine_emits_trailing_separator() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("1").unwrap();
        temp.child("b.md").write_str("2").unwrap();
        let out = temp.child("combined.md");

        let report = combine(temp.path(), &owned(&["a.md", "b.md"]), out.path(), "|").unwrap();

        assert_eq!(fs::read_to_string(out.path()).unwrap(), "1|2|");
        assert_eq!(report.combined, owned(&["a.md", "b.md"]));
        assert_eq!(report.bytes_written, 4);
        assert!(report.is_complete());
    }

    #[test]
    fn test_combine_follows_given_order_and_splits_back() {
        let temp = assert_fs::TempDir::new().unwrap();
        let docs = [
            ("z.md", "# Zed\n\nlast letter"),
            ("m.md", "middle\n"),
            ("a.md", ""),
        ];
        for (name, content) in docs {
            temp.child(name).write_str(content).unwrap();
        }
        let out = temp.child("out.md");

        combine(
            temp.path(),
            &owned(&["z.md", "m.md", "a.md"]),
            out.path(),
            DEFAULT_SEPARATOR,
        )
        .unwrap();

        let combined = fs::read_to_string(out.path()).unwrap();
        let segments: Vec<&str> = combined.split(DEFAULT_SEPARATOR).collect();
        assert_eq!(segments, vec!["# Zed\n\nlast letter", "middle\n", "", ""]);
    }

    #[test]
    fn test_missing_input_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("1").unwrap();
        temp.child("c.md").write_str("3").unwrap();
        let out = temp.child("out.md");

        let report = combine(
            temp.path(),
            &owned(&["a.md", "b.md", "c.md"]),
            out.path(),
            "|",
        )
        .unwrap();

        assert_eq!(fs::read_to_string(out.path()).unwrap(), "1|3|");
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], Error::FileNotFound { .. }));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_invalid_utf8_input_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("bad.md").write_binary(&[0xff, 0xfe, 0x00]).unwrap();
        temp.child("good.md").write_str("ok").unwrap();
        let out = temp.child("out.md");

        let report = combine(temp.path(), &owned(&["bad.md", "good.md"]), out.path(), "\n").unwrap();

        assert_eq!(fs::read_to_string(out.path()).unwrap(), "ok\n");
        assert!(matches!(report.failures[0], Error::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_existing_output_is_overwritten() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("fresh").unwrap();
        let out = temp.child("out.md");
        out.write_str("stale content that is much longer").unwrap();

        combine(temp.path(), &owned(&["a.md"]), out.path(), "").unwrap();

        assert_eq!(fs::read_to_string(out.path()).unwrap(), "fresh");
    }

    #[test]
    fn test_unwritable_destination_is_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("1").unwrap();
        let out = temp.path().join("missing-dir").join("out.md");

        let result = combine(temp.path(), &owned(&["a.md"]), &out, "|");

        assert!(result.is_err());
    }

    #[test]
    fn test_combine_entries() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("A").unwrap();
        let out = temp.child("out.md");

        let entries = vec![FileEntry::new(temp.path(), "a.md")];
        combine_entries(&entries, out.path(), "--").unwrap();

        assert_eq!(fs::read_to_string(out.path()).unwrap(), "A--");
    }

    #[cfg(unix)]
    #[test]
    fn test_combine_entries_reads_non_utf8_names() {
        use crate::lister::{list_files, SortOrder};
        use std::os::unix::ffi::OsStrExt;

        let temp = assert_fs::TempDir::new().unwrap();
        let docs = temp.child("docs");
        docs.create_dir_all().unwrap();
        let raw = std::ffi::OsStr::from_bytes(b"caf\xe9.md");
        fs::write(docs.path().join(raw), "bonjour").unwrap();
        let out = temp.child("out.md");

        let entries = list_files(docs.path(), ".md", SortOrder::Ascending).unwrap();
        let report = combine_entries(&entries, out.path(), "|").unwrap();

        assert_eq!(fs::read_to_string(out.path()).unwrap(), "bonjour|");
        assert!(report.is_complete());
    }
}
