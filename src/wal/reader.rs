//! WAL Reader
//!
//! Handles reading raw lines from the WAL file.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

/// One raw line of the log
#[derive(Debug, Clone)]
pub struct LogLine {
    /// 1-based line number
    pub number: u64,

    /// Line contents without the newline
    pub bytes: Vec<u8>,

    /// Byte offset just past this line
    pub end_offset: u64,

    /// Whether the line ended with `\n` (false only for a torn tail)
    pub terminated: bool,
}

impl LogLine {
    /// Line contents as text, if valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Reads lines from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    position: u64,
    line_number: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(Self {
            reader: BufReader::new(file),
            position: 0,
            line_number: 0,
        }))
    }

    /// Read the next line from the WAL
    pub fn next_line(&mut self) -> Result<Option<LogLine>> {
        let mut bytes = Vec::new();
        let read = self.reader.read_until(b'\n', &mut bytes)?;
        if read == 0 {
            return Ok(None);
        }

        self.position += read as u64;
        self.line_number += 1;

        let terminated = bytes.last() == Some(&b'\n');
        if terminated {
            bytes.pop();
        }

        Ok(Some(LogLine {
            number: self.line_number,
            bytes,
            end_offset: self.position,
            terminated,
        }))
    }
}

impl Iterator for WalReader {
    type Item = Result<LogLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
