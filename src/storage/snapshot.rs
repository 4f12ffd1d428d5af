//! Snapshot file
//!
//! Writes and loads the compacted copy of the store.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Magic bytes identifying a snapshot file
pub const MAGIC: &[u8; 4] = b"EMBS";

/// Snapshot format version
pub const VERSION: u16 = 1;

/// magic (4) + version (2) + payload length (8) + crc32 (4)
pub const HEADER_SIZE: usize = 18;

/// Payload written on compaction, borrowing the live map
#[derive(Serialize)]
struct SnapshotPayload<'a> {
    entries: &'a HashMap<String, String>,
}

/// Payload read back at startup
#[derive(Deserialize)]
struct LoadedPayload {
    entries: HashMap<String, String>,
}

/// Handle to the snapshot location inside the data directory
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the snapshot path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("bin.tmp")
    }

    /// Write `data` as the new snapshot
    ///
    /// The previous snapshot stays intact until the new one is fully synced,
    /// then it is superseded by an atomic rename. Returns the file size.
    pub fn write(&self, data: &HashMap<String, String>) -> Result<u64> {
        let payload = bincode::serialize(&SnapshotPayload { entries: data })?;
        let crc = crc32fast::hash(&payload);
        let temp_path = self.temp_path();

        let file = File::create(&temp_path).map_err(|e| {
            EmberError::Snapshot(format!("failed to create {}: {}", temp_path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);

        if let Err(e) = write_contents(&mut writer, crc, &payload) {
            drop(writer);
            let _ = fs::remove_file(&temp_path);
            return Err(EmberError::Snapshot(format!("failed to write snapshot: {}", e)));
        }
        drop(writer);

        fs::rename(&temp_path, &self.path)
            .map_err(|e| EmberError::Snapshot(format!("failed to rename snapshot: {}", e)))?;
        sync_parent_dir(&self.path)
            .map_err(|e| EmberError::Snapshot(format!("failed to sync directory: {}", e)))?;

        Ok((HEADER_SIZE + payload.len()) as u64)
    }

    /// Load the snapshot
    ///
    /// Returns `Ok(None)` when no snapshot exists. A snapshot that fails
    /// validation is an error, never silently ignored.
    pub fn load(&self) -> Result<Option<HashMap<String, String>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        decode(&bytes).map(Some)
    }
}

fn write_contents(writer: &mut BufWriter<File>, crc: u32, payload: &[u8]) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn decode(bytes: &[u8]) -> Result<HashMap<String, String>> {
    if bytes.len() < HEADER_SIZE {
        return Err(EmberError::SnapshotCorrupt(format!(
            "file too small: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != MAGIC {
        return Err(EmberError::SnapshotCorrupt("bad magic".to_string()));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(EmberError::SnapshotCorrupt(format!(
            "unsupported version {}",
            version
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[6..14]);
    let payload_len = u64::from_le_bytes(len_bytes) as usize;

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&bytes[14..18]);
    let expected_crc = u32::from_le_bytes(crc_bytes);

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != payload_len {
        return Err(EmberError::SnapshotCorrupt(format!(
            "payload length mismatch: header says {}, found {}",
            payload_len,
            payload.len()
        )));
    }

    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(EmberError::SnapshotCorrupt(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    bincode::deserialize::<LoadedPayload>(payload)
        .map(|loaded| loaded.entries)
        .map_err(|e| EmberError::SnapshotCorrupt(e.to_string()))
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
