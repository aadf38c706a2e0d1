//! Append-only local sample log.
//!
//! Each run writes to a fresh file in the storage directory, named with the
//! first unused six-digit number (`000001.txt`, `000002.txt`, ...). The header
//! goes in when the file is created; every save reopens the file in append
//! mode, writes one line and closes it again, so a power cut loses at most the
//! line being written.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

const MAX_FILE_NUMBER: u32 = 999_999;

#[derive(Debug, Clone)]
pub struct LocalLog {
    path: PathBuf,
}

impl LocalLog {
    /// Picks the next free file name in `directory` and writes `header` to it.
    pub fn open(directory: &Path, extension: &str, header: &str) -> Result<Self> {
        fs::create_dir_all(directory)
            .with_context(|| format!("cannot create storage directory {}", directory.display()))?;

        let path = next_free_file(directory, extension)?;
        let log = Self { path };
        log.append(header)?;
        info!(path = %log.path.display(), "local log opened");
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("cannot open {}", self.path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("cannot write to {}", self.path.display()))?;
        Ok(())
    }
}

fn next_free_file(directory: &Path, extension: &str) -> Result<PathBuf> {
    for n in 1..=MAX_FILE_NUMBER {
        let candidate = directory.join(format!("{n:06}.{extension}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    bail!("no free log file name left in {}", directory.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_file_is_numbered_one() {
        let dir = tempfile::tempdir().unwrap();
        let log = LocalLog::open(dir.path(), "txt", "pH_1#").unwrap();
        assert_eq!(log.path(), dir.path().join("000001.txt"));
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "pH_1#\n");
    }

    #[test]
    fn existing_files_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("000001.txt"), "old").unwrap();
        fs::write(dir.path().join("000002.txt"), "old").unwrap();

        let log = LocalLog::open(dir.path(), "txt", "h#").unwrap();
        assert_eq!(log.path(), dir.path().join("000003.txt"));
        assert_eq!(fs::read_to_string(dir.path().join("000001.txt")).unwrap(), "old");
    }

    #[test]
    fn lines_are_appended_after_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = LocalLog::open(&dir.path().join("data"), "csv", "pH_1#pH_2#").unwrap();
        log.append("9.80#10.05#").unwrap();
        log.append("9.81##").unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "pH_1#pH_2#\n9.80#10.05#\n9.81##\n");
        assert!(log.path().ends_with("000001.csv"));
    }

    #[test]
    fn vanished_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let log = LocalLog::open(&data, "txt", "h#").unwrap();
        fs::remove_dir_all(&data).unwrap();
        assert!(log.append("1#").is_err());
    }
}
