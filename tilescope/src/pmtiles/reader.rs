//! Random-access archive reader.
//!
//! Opens an archive from a filesystem path (memory-mapped read-only,
//! with a heap-buffer fallback) or from an in-memory byte vector, and
//! serves single-tile lookups by (z, x, y). All section accesses are
//! bounds-checked against the mapped buffer; any out-of-range offset
//! or corrupt directory yields "absent" rather than a failure.
//!
//! The reader is immutable after open and safe to share across
//! threads for concurrent lookups.

use super::directory::{deserialize_entries, find_entry};
use super::error::ArchiveError;
use super::header::{Compression, Header, HEADER_BYTES};
use super::tile_id::tile_id;
use crate::coord::TileCoord;
use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Maximum leaf-directory depth followed during lookup.
const MAX_DIRECTORY_DEPTH: usize = 4;

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Heap(Vec<u8>),
}

impl Backing {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Heap(buf) => buf,
        }
    }
}

/// A read-only tile archive.
#[derive(Debug)]
pub struct ArchiveReader {
    backing: Backing,
    header: Option<Header>,
}

impl ArchiveReader {
    /// Open an archive file.
    ///
    /// The file is memory-mapped read-only where the platform allows
    /// it; otherwise the whole file is read into a heap buffer. The
    /// archive is open exactly when the buffer exceeds the 127-byte
    /// header; a header that fails to parse leaves the archive open
    /// but serving no tiles.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let backing = match File::open(path) {
            Ok(file) => match unsafe { Mmap::map(&file) } {
                Ok(map) => Backing::Mapped(map),
                Err(_) => {
                    let mut buf = Vec::new();
                    let mut file = File::open(path).map_err(|e| ArchiveError::Open {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                    file.read_to_end(&mut buf).map_err(|e| ArchiveError::Open {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                    Backing::Heap(buf)
                }
            },
            Err(e) => {
                return Err(ArchiveError::Open {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::from_backing(backing)
    }

    /// Open an archive already held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        Self::from_backing(Backing::Heap(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self, ArchiveError> {
        let bytes = backing.bytes();
        if bytes.len() <= HEADER_BYTES {
            return Err(ArchiveError::BadHeader(format!(
                "{} bytes, need more than {}",
                bytes.len(),
                HEADER_BYTES
            )));
        }
        let header = Header::deserialize(bytes).ok();
        Ok(Self { backing, header })
    }

    /// The parsed archive header, when the leading bytes decode as
    /// one.
    #[inline]
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Total buffer length in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.backing.bytes().len()
    }

    /// Retrieve one tile payload. Absent tiles, invalid addresses, a
    /// malformed header, and any bounds or directory inconsistency
    /// all return `None`.
    pub fn get(&self, z: u8, x: u32, y: u32) -> Option<Vec<u8>> {
        let header = self.header.as_ref()?;
        let tile = TileCoord::new(z, x, y).ok()?;
        let target = tile_id(tile);

        let mut dir_offset = header.root_dir_offset;
        let mut dir_length = header.root_dir_bytes;

        for _ in 0..MAX_DIRECTORY_DEPTH {
            let raw = self.section(dir_offset, dir_length)?;
            let decoded = self.decode_internal(header, raw)?;
            let entries = deserialize_entries(&decoded)?;
            let entry = find_entry(&entries, target)?;

            if entry.run_length > 0 {
                let payload = self.section(
                    header.tile_data_offset.checked_add(entry.offset)?,
                    entry.length as u64,
                )?;
                return Some(payload.to_vec());
            }

            // Run-length zero: descend into the leaf directory
            dir_offset = header.leaf_dirs_offset.checked_add(entry.offset)?;
            dir_length = entry.length as u64;
        }

        None
    }

    /// The archive's JSON metadata blob, decoded per the internal
    /// compression code.
    pub fn metadata(&self) -> Option<String> {
        let header = self.header.as_ref()?;
        let raw = self.section(header.json_metadata_offset, header.json_metadata_bytes)?;
        let decoded = self.decode_internal(header, raw)?;
        String::from_utf8(decoded.into_owned()).ok()
    }

    /// Bounds-checked slice of the backing buffer.
    fn section(&self, offset: u64, length: u64) -> Option<&[u8]> {
        let bytes = self.backing.bytes();
        let start = usize::try_from(offset).ok()?;
        let len = usize::try_from(length).ok()?;
        let end = start.checked_add(len)?;
        if end > bytes.len() {
            return None;
        }
        Some(&bytes[start..end])
    }

    /// Decode an internal section (directory or metadata) per the
    /// header's internal compression code. Unknown codecs are
    /// treated as unreadable.
    fn decode_internal<'a>(&self, header: &Header, data: &'a [u8]) -> Option<Cow<'a, [u8]>> {
        match header.internal_compression {
            Compression::None | Compression::Unknown => Some(Cow::Borrowed(data)),
            Compression::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data).read_to_end(&mut out).ok()?;
                Some(Cow::Owned(out))
            }
            _ => None,
        }
    }
}
