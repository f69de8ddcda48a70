use bincode::{Options, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::store::Database;

/// Upper bound on the decompressed size of a snapshot
pub const MAX_SNAPSHOT_BYTES: u64 = 512 * 1024 * 1024;

/// Decode a gzip bincode stream without trusting its length prefixes
///
/// Options match what `serialize_into` writes (fixed-width integers,
/// trailing bytes allowed) with a size limit on top.
fn decode(input: impl Read) -> std::io::Result<Database> {
    let reader = BufReader::new(GzDecoder::new(input).take(MAX_SNAPSHOT_BYTES));
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_SNAPSHOT_BYTES)
        .deserialize_from(reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Write a gzip-compressed bincode snapshot of the database
///
/// The snapshot goes to a temporary file next to `path` first and is then
/// renamed over it, so a crash never leaves a half written file behind.
pub fn save_database(db: &Database, path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut writer = BufWriter::new(encoder);
        serialize_into(&mut writer, db)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

pub fn load_database(path: &Path) -> std::io::Result<Database> {
    let file = File::open(path)?;
    decode(file)
}

/// Serialize the database into an in-memory gzip buffer (backup download)
pub fn serialize_to_memory(db: &Database) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serialize_into(&mut encoder, db)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    encoder.finish()
}

/// Read a database back from a gzip buffer produced by [`serialize_to_memory`]
pub fn deserialize_from_memory(buffer: &[u8]) -> std::io::Result<Database> {
    decode(Cursor::new(buffer))
}
