//! Dump files
//!
//! Plain text, one record per line, fields separated by single spaces:
//!
//! ```text
//! key last_name first_name year_of_birth city coins
//! ```
//!
//! Fields therefore cannot contain whitespace. Blank lines are skipped on
//! read. Both engines go through these two functions for Upload and Export.

use crate::error::{Result, StoreError};
use crate::storage::record::Record;
use bytes::BytesMut;
use std::fs;
use std::path::Path;

/// Parses every non-blank line of the file at `path`.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    Ok(text.lines().filter_map(Record::parse_line).collect())
}

/// Writes `records` to `path`, replacing its contents. Returns the number of
/// records written.
pub fn write_records<'a, I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buf = BytesMut::with_capacity(4096);
    let mut count = 0;
    for record in records {
        record.write_line(&mut buf);
        count += 1;
    }

    fs::write(path, &buf).map_err(|e| StoreError::io(path, e))?;
    Ok(count)
}
