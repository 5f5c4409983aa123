//! Reads the CSV name database.
//!
//! Each line is `first,nickname,last,gender`. The first line is a header and is always skipped.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::NameRecord;
use crate::error::Result;

/// The raw fields of one line of the database.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameRow {
    first: String,
    nick: String,
    last: String,
    gender: String,
}

impl NameRow {
    pub fn new(first: &str, nick: &str, last: &str, gender: &str) -> NameRow {
        NameRow {
            first: first.to_string(),
            nick: nick.to_string(),
            last: last.to_string(),
            gender: gender.to_string(),
        }
    }

    /// Splits a line into fields. Missing fields are left empty and extra fields are ignored.
    pub fn parse(line: &str) -> NameRow {
        let mut fields = line.split(',').map(str::trim);
        let mut next = || fields.next().unwrap_or_default();

        let (first, nick, last, gender) = (next(), next(), next(), next());
        NameRow::new(first, nick, last, gender)
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    /// Converts the row to a record, or returns `None` if it is missing a first or last name.
    pub fn to_record(&self) -> Option<NameRecord> {
        NameRecord::new(&self.first, &self.nick, &self.last)
    }
}

#[cfg(windows)]
fn open_shared(path: &Path) -> std::io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x1;
    const FILE_SHARE_WRITE: u32 = 0x2;

    OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .open(path)
}

#[cfg(not(windows))]
fn open_shared(path: &Path) -> std::io::Result<File> {
    // Opens here never lock the file against other readers or writers.
    OpenOptions::new().read(true).open(path)
}

/// Returns every line after the header, without blank lines. The file is opened so that anyone
/// else can keep reading and writing it while we read.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let reader = BufReader::new(open_shared(path.as_ref())?);
    let mut lines = vec![];

    for line in reader.lines().skip(1) {
        let line = line?;

        if !line.trim().is_empty() {
            lines.push(line);
        }
    }

    Ok(lines)
}

/// Reads and parses every row of the database at `path`.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<NameRow>> {
    Ok(read_lines(path)?
        .iter()
        .map(|line| NameRow::parse(line))
        .collect())
}
