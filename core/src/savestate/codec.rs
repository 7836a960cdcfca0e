//! On-disk save-state file format.
//!
//! ```text
//! i32 LE  snapshot_len
//! i32 LE  preview_len
//! [u8; snapshot_len]  snapshot   (opaque core state)
//! [u8; preview_len]   preview    (PNG)
//! ```
//!
//! The save time is the file's modification time; it is not stored in the
//! payload. Writes go to `<name>.tmp` and are renamed into place, so a
//! failed write never leaves a partial file behind and an existing save is
//! only replaced once the new one is complete.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::frame::Frame;

use super::preview;

const HEADER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Writing a save file failed. No partial file is left on disk.
#[derive(Debug)]
pub struct PersistError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to write {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A save file could not be read back.
#[derive(Debug)]
pub enum CorruptStateError {
    /// The file could not be read at all.
    Io(io::Error),

    /// Fewer bytes than the 8-byte header.
    TruncatedHeader { len: usize },

    /// A length field is negative.
    NegativeLength { field: &'static str, value: i32 },

    /// The declared payload lengths run past the end of the file.
    Overrun { declared: usize, available: usize },

    /// The preview payload is not a usable image.
    Preview(String),
}

impl std::fmt::Display for CorruptStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::TruncatedHeader { len } => {
                write!(f, "save file too short for header ({len} bytes)")
            }
            Self::NegativeLength { field, value } => {
                write!(f, "negative {field} length: {value}")
            }
            Self::Overrun {
                declared,
                available,
            } => write!(
                f,
                "payload declares {declared} bytes but only {available} are present"
            ),
            Self::Preview(reason) => write!(f, "bad preview image: {reason}"),
        }
    }
}

impl std::error::Error for CorruptStateError {}

impl From<io::Error> for CorruptStateError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// A save file read back from disk.
#[derive(Clone, Debug)]
pub struct DecodedState {
    pub snapshot: Vec<u8>,
    pub preview: Frame,
    pub saved_at: SystemTime,
}

/// Write `snapshot` and a PNG of `preview` to `path`.
pub fn encode(path: &Path, snapshot: &[u8], preview: &Frame) -> Result<(), PersistError> {
    let fail = |source: io::Error| PersistError {
        path: path.to_path_buf(),
        source,
    };

    let preview_png = preview::encode_png(preview).map_err(|e| fail(io::Error::other(e)))?;

    let tmp = temp_path(path);
    let written = write_file(&tmp, snapshot, &preview_png).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(fail(e));
    }
    Ok(())
}

/// Serialize the header and both payloads to `writer`.
pub fn write_to<W: Write>(writer: &mut W, snapshot: &[u8], preview_png: &[u8]) -> io::Result<()> {
    writer.write_all(&length_field(snapshot.len())?.to_le_bytes())?;
    writer.write_all(&length_field(preview_png.len())?.to_le_bytes())?;
    writer.write_all(snapshot)?;
    writer.write_all(preview_png)?;
    Ok(())
}

/// Read a save file, taking its modification time as the save time.
pub fn decode(path: &Path) -> Result<DecodedState, CorruptStateError> {
    let bytes = fs::read(path)?;
    let saved_at = fs::metadata(path)?.modified()?;
    let (snapshot, preview) = decode_bytes(&bytes)?;
    Ok(DecodedState {
        snapshot,
        preview,
        saved_at,
    })
}

/// Parse an in-memory save file into (snapshot, preview).
pub fn decode_bytes(bytes: &[u8]) -> Result<(Vec<u8>, Frame), CorruptStateError> {
    let (snapshot, preview_png) = split_payloads(bytes)?;
    let preview = preview::decode_png(preview_png)?;
    Ok((snapshot.to_vec(), preview))
}

/// Validate the header and return slices of the two payloads.
pub fn split_payloads(bytes: &[u8]) -> Result<(&[u8], &[u8]), CorruptStateError> {
    if bytes.len() < HEADER_LEN {
        return Err(CorruptStateError::TruncatedHeader { len: bytes.len() });
    }
    let snapshot_len = read_length(bytes, 0, "snapshot")?;
    let preview_len = read_length(bytes, 4, "preview")?;

    let available = bytes.len() - HEADER_LEN;
    let declared = snapshot_len.saturating_add(preview_len);
    if declared > available {
        return Err(CorruptStateError::Overrun {
            declared,
            available,
        });
    }

    let snapshot = &bytes[HEADER_LEN..HEADER_LEN + snapshot_len];
    let preview = &bytes[HEADER_LEN + snapshot_len..HEADER_LEN + declared];
    Ok((snapshot, preview))
}

fn read_length(
    bytes: &[u8],
    offset: usize,
    field: &'static str,
) -> Result<usize, CorruptStateError> {
    let raw = [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ];
    let value = i32::from_le_bytes(raw);
    if value < 0 {
        return Err(CorruptStateError::NegativeLength { field, value });
    }
    Ok(value as usize)
}

fn length_field(len: usize) -> io::Result<i32> {
    i32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {len} bytes exceeds the i32 length field"),
        )
    })
}

fn write_file(path: &Path, snapshot: &[u8], preview_png: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(&mut writer, snapshot, preview_png)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// `<name>.tmp` next to `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_bytes(snapshot: &[u8], preview: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_to(&mut out, snapshot, preview).unwrap();
        out
    }

    #[test]
    fn header_is_little_endian() {
        let bytes = file_bytes(&[0xAA; 3], &[0xBB; 2]);
        assert_eq!(&bytes[..8], &[3, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(&bytes[8..11], &[0xAA; 3]);
        assert_eq!(&bytes[11..], &[0xBB; 2]);
    }

    #[test]
    fn split_returns_both_payloads() {
        let bytes = file_bytes(b"state", b"img");
        let (snapshot, preview) = split_payloads(&bytes).unwrap();
        assert_eq!(snapshot, b"state");
        assert_eq!(preview, b"img");
    }

    #[test]
    fn short_header_is_corrupt() {
        let err = split_payloads(&[1, 0, 0]).unwrap_err();
        assert!(matches!(err, CorruptStateError::TruncatedHeader { len: 3 }));
    }

    #[test]
    fn negative_length_is_corrupt() {
        let mut bytes = file_bytes(b"x", b"y");
        bytes[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        let err = split_payloads(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CorruptStateError::NegativeLength {
                field: "preview",
                value: -1
            }
        ));
    }

    #[test]
    fn overrun_is_corrupt() {
        let mut bytes = file_bytes(b"abcd", b"ef");
        bytes.truncate(bytes.len() - 1);
        let err = split_payloads(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CorruptStateError::Overrun {
                declared: 6,
                available: 5
            }
        ));
    }

    #[test]
    fn huge_lengths_do_not_overflow() {
        let mut bytes = vec![0u8; 8];
        bytes[0..4].copy_from_slice(&i32::MAX.to_le_bytes());
        bytes[4..8].copy_from_slice(&i32::MAX.to_le_bytes());
        assert!(matches!(
            split_payloads(&bytes),
            Err(CorruptStateError::Overrun { .. })
        ));
    }

    #[test]
    fn temp_path_appends_suffix() {
        let tmp = temp_path(Path::new("/saves/Foo_auto.sav"));
        assert_eq!(tmp, Path::new("/saves/Foo_auto.sav.tmp"));
    }
}
