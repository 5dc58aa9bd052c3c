//! Archive header construction and parsing.
//!
//! The header is exactly 127 bytes, little-endian:
//!
//! | Bytes   | Field                                         |
//! |---------|-----------------------------------------------|
//! | 0-6     | Magic `PMTiles`                               |
//! | 7       | Version (3)                                   |
//! | 8-71    | Offset/length pairs: root dir, JSON metadata, |
//! |         | leaf dirs, tile data (u64 each)               |
//! | 72-95   | Addressed / entry / content tile counts       |
//! | 96      | Clustered flag                                |
//! | 97-99   | Internal compression, tile compression, type  |
//! | 100-101 | Min/max zoom                                  |
//! | 102-117 | Bounds as i32 degrees x 10^7                  |
//! | 118-126 | Center zoom and center as i32 degrees x 10^7  |

use super::error::ArchiveError;

/// Fixed header size in bytes.
pub const HEADER_BYTES: usize = 127;

/// Magic prefix identifying the archive format.
pub const MAGIC: &[u8; 7] = b"PMTiles";

/// Format version this codec reads and writes.
pub const VERSION: u8 = 3;

/// Compression codes for tile payloads and internal structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    Unknown = 0,
    None = 1,
    Gzip = 2,
    Brotli = 3,
    Zstd = 4,
}

impl From<u8> for Compression {
    fn from(value: u8) -> Self {
        match value {
            1 => Compression::None,
            2 => Compression::Gzip,
            3 => Compression::Brotli,
            4 => Compression::Zstd,
            _ => Compression::Unknown,
        }
    }
}

/// Tile payload type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TileType {
    Unknown = 0,
    Mvt = 1,
    Png = 2,
    Jpeg = 3,
    Webp = 4,
    Avif = 5,
}

impl From<u8> for TileType {
    fn from(value: u8) -> Self {
        match value {
            1 => TileType::Mvt,
            2 => TileType::Png,
            3 => TileType::Jpeg,
            4 => TileType::Webp,
            5 => TileType::Avif,
            _ => TileType::Unknown,
        }
    }
}

/// The 127-byte archive header.
///
/// Geographic bounds and center are stored as degrees multiplied by
/// 10^7 in signed 32-bit integers, exactly as on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub root_dir_offset: u64,
    pub root_dir_bytes: u64,
    pub json_metadata_offset: u64,
    pub json_metadata_bytes: u64,
    pub leaf_dirs_offset: u64,
    pub leaf_dirs_bytes: u64,
    pub tile_data_offset: u64,
    pub tile_data_bytes: u64,
    pub addressed_tiles_count: u64,
    pub tile_entries_count: u64,
    pub tile_contents_count: u64,
    pub clustered: bool,
    pub internal_compression: Compression,
    pub tile_compression: Compression,
    pub tile_type: TileType,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_lon_e7: i32,
    pub min_lat_e7: i32,
    pub max_lon_e7: i32,
    pub max_lat_e7: i32,
    pub center_zoom: u8,
    pub center_lon_e7: i32,
    pub center_lat_e7: i32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            root_dir_offset: 0,
            root_dir_bytes: 0,
            json_metadata_offset: 0,
            json_metadata_bytes: 0,
            leaf_dirs_offset: 0,
            leaf_dirs_bytes: 0,
            tile_data_offset: 0,
            tile_data_bytes: 0,
            addressed_tiles_count: 0,
            tile_entries_count: 0,
            tile_contents_count: 0,
            clustered: false,
            internal_compression: Compression::None,
            tile_compression: Compression::None,
            tile_type: TileType::Unknown,
            min_zoom: 0,
            max_zoom: 0,
            min_lon_e7: 0,
            min_lat_e7: 0,
            max_lon_e7: 0,
            max_lat_e7: 0,
            center_zoom: 0,
            center_lon_e7: 0,
            center_lat_e7: 0,
        }
    }
}

/// Encode a degree value as the on-disk i32 x 10^7 representation.
pub fn degrees_to_e7(value: f64, limit: f64) -> i32 {
    (value.clamp(-limit, limit) * 1e7).round() as i32
}

impl Header {
    /// Serialize to exactly [`HEADER_BYTES`] bytes.
    pub fn serialize(&self) -> [u8; HEADER_BYTES] {
        let mut buf = [0u8; HEADER_BYTES];

        buf[0..7].copy_from_slice(MAGIC);
        buf[7] = VERSION;

        buf[8..16].copy_from_slice(&self.root_dir_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.root_dir_bytes.to_le_bytes());
        buf[24..32].copy_from_slice(&self.json_metadata_offset.to_le_bytes());
        buf[32..40].copy_from_slice(&self.json_metadata_bytes.to_le_bytes());
        buf[40..48].copy_from_slice(&self.leaf_dirs_offset.to_le_bytes());
        buf[48..56].copy_from_slice(&self.leaf_dirs_bytes.to_le_bytes());
        buf[56..64].copy_from_slice(&self.tile_data_offset.to_le_bytes());
        buf[64..72].copy_from_slice(&self.tile_data_bytes.to_le_bytes());

        buf[72..80].copy_from_slice(&self.addressed_tiles_count.to_le_bytes());
        buf[80..88].copy_from_slice(&self.tile_entries_count.to_le_bytes());
        buf[88..96].copy_from_slice(&self.tile_contents_count.to_le_bytes());

        buf[96] = u8::from(self.clustered);
        buf[97] = self.internal_compression as u8;
        buf[98] = self.tile_compression as u8;
        buf[99] = self.tile_type as u8;

        buf[100] = self.min_zoom;
        buf[101] = self.max_zoom;

        buf[102..106].copy_from_slice(&self.min_lon_e7.to_le_bytes());
        buf[106..110].copy_from_slice(&self.min_lat_e7.to_le_bytes());
        buf[110..114].copy_from_slice(&self.max_lon_e7.to_le_bytes());
        buf[114..118].copy_from_slice(&self.max_lat_e7.to_le_bytes());

        buf[118] = self.center_zoom;
        buf[119..123].copy_from_slice(&self.center_lon_e7.to_le_bytes());
        buf[123..127].copy_from_slice(&self.center_lat_e7.to_le_bytes());

        buf
    }

    /// Parse a header from the first [`HEADER_BYTES`] of a buffer.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if bytes.len() < HEADER_BYTES {
            return Err(ArchiveError::BadHeader(format!(
                "{} bytes, need {}",
                bytes.len(),
                HEADER_BYTES
            )));
        }
        if &bytes[0..7] != MAGIC {
            return Err(ArchiveError::BadHeader("bad magic".to_string()));
        }
        if bytes[7] != VERSION {
            return Err(ArchiveError::BadHeader(format!(
                "unsupported version {}",
                bytes[7]
            )));
        }

        let u64_at = |at: usize| u64::from_le_bytes(bytes[at..at + 8].try_into().expect("8 bytes"));
        let i32_at = |at: usize| i32::from_le_bytes(bytes[at..at + 4].try_into().expect("4 bytes"));

        Ok(Self {
            root_dir_offset: u64_at(8),
            root_dir_bytes: u64_at(16),
            json_metadata_offset: u64_at(24),
            json_metadata_bytes: u64_at(32),
            leaf_dirs_offset: u64_at(40),
            leaf_dirs_bytes: u64_at(48),
            tile_data_offset: u64_at(56),
            tile_data_bytes: u64_at(64),
            addressed_tiles_count: u64_at(72),
            tile_entries_count: u64_at(80),
            tile_contents_count: u64_at(88),
            clustered: bytes[96] != 0,
            internal_compression: Compression::from(bytes[97]),
            tile_compression: Compression::from(bytes[98]),
            tile_type: TileType::from(bytes[99]),
            min_zoom: bytes[100],
            max_zoom: bytes[101],
            min_lon_e7: i32_at(102),
            min_lat_e7: i32_at(106),
            max_lon_e7: i32_at(110),
            max_lat_e7: i32_at(114),
            center_zoom: bytes[118],
            center_lon_e7: i32_at(119),
            center_lat_e7: i32_at(123),
        })
    }
}
