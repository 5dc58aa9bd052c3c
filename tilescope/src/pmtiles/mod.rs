//! Tile archive codec.
//!
//! Reader and writer for the single-file tile archive format used as
//! the tile source and as the subset transport: a 127-byte header, a
//! root directory, optional leaf directories, concatenated tile
//! payloads, and a JSON metadata blob. Tiles are addressed by a
//! 64-bit Hilbert-ordered tile-id; directories are varint-encoded
//! columnar entry lists with run-length collapsing.
//!
//! The format is bit-exact with other PMTiles v3 consumers.
//!
//! # Example
//!
//! ```ignore
//! use tilescope::coord::TileCoord;
//! use tilescope::pmtiles::{write_archive, ArchiveReader, Compression, TileType};
//!
//! let tiles = vec![(TileCoord { z: 0, x: 0, y: 0 }, b"payload".to_vec())];
//! let blob = write_archive(&tiles, "{}", TileType::Mvt, Compression::None)?;
//!
//! let reader = ArchiveReader::from_bytes(blob)?;
//! assert!(reader.get(0, 0, 0).is_some());
//! ```

mod directory;
mod error;
mod header;
mod reader;
mod tile_id;
mod writer;

pub use directory::{deserialize_entries, find_entry, serialize_entries, Entry};
pub use error::ArchiveError;
pub use header::{Compression, Header, TileType, HEADER_BYTES};
pub use reader::ArchiveReader;
pub use tile_id::tile_id;
pub use writer::{write_archive, write_archive_to_path};
