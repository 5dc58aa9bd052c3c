//! Archive writer.
//!
//! Assembles a complete, valid archive from a list of
//! `(tile, payload)` pairs plus a metadata string. The output layout
//! is header, root directory, leaf directories, tile data, metadata,
//! with every header offset pointing at its section.
//!
//! Payloads are laid out in (z ascending, x ascending, y descending)
//! order; directory entries are encoded in ascending tile-id order,
//! which is the order the reader's binary search assumes.

use super::directory::{serialize_entries, Entry};
use super::error::ArchiveError;
use super::header::{degrees_to_e7, Compression, Header, TileType, HEADER_BYTES};
use super::tile_id::tile_id;
use crate::coord::{tile_x_to_lon, tile_y_to_lat, TileCoord};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Byte budget for the root directory; entry lists that would exceed
/// it are split into fixed-size leaf buckets.
const MAX_ROOT_DIR_BYTES: usize = 16_384;

/// Starting leaf bucket size in entries.
const LEAF_BUCKET_ENTRIES: usize = 4_096;

/// Build an archive in memory.
///
/// An empty tile list produces a header-and-metadata-only archive
/// with zeroed section offsets and bounds. A payload larger than the
/// 32-bit entry length limit fails the whole operation.
pub fn write_archive(
    tiles: &[(TileCoord, Vec<u8>)],
    metadata_json: &str,
    tile_type: TileType,
    tile_compression: Compression,
) -> Result<Vec<u8>, ArchiveError> {
    let mut sorted: Vec<&(TileCoord, Vec<u8>)> = tiles.iter().collect();
    sorted.sort_by(|a, b| {
        a.0.z
            .cmp(&b.0.z)
            .then(a.0.x.cmp(&b.0.x))
            .then(b.0.y.cmp(&a.0.y))
    });

    let mut entries = Vec::with_capacity(sorted.len());
    let mut tile_data = Vec::new();
    let mut min_zoom = u8::MAX;
    let mut max_zoom = 0u8;
    let mut min_lon = 180.0f64;
    let mut min_lat = 90.0f64;
    let mut max_lon = -180.0f64;
    let mut max_lat = -90.0f64;

    for (tile, payload) in &sorted {
        if payload.len() as u64 > u32::MAX as u64 {
            return Err(ArchiveError::PayloadTooLarge(payload.len() as u64));
        }

        entries.push(Entry {
            tile_id: tile_id(*tile),
            offset: tile_data.len() as u64,
            length: payload.len() as u32,
            run_length: 1,
        });
        tile_data.extend_from_slice(payload);

        min_zoom = min_zoom.min(tile.z);
        max_zoom = max_zoom.max(tile.z);

        // Each tile contributes its geographic corners
        min_lon = min_lon.min(tile_x_to_lon(tile.x, tile.z));
        max_lon = max_lon.max(tile_x_to_lon(tile.x + 1, tile.z));
        min_lat = min_lat.min(tile_y_to_lat(tile.y + 1, tile.z));
        max_lat = max_lat.max(tile_y_to_lat(tile.y, tile.z));
    }

    entries.sort_by_key(|e| e.tile_id);

    let metadata = if metadata_json.is_empty() {
        "{}"
    } else {
        metadata_json
    };

    let (root_bytes, leaf_bytes) = if entries.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        make_root_leaves(&entries)
    };

    let root_offset = HEADER_BYTES as u64;
    let leaf_offset = root_offset + root_bytes.len() as u64;
    let tile_offset = leaf_offset + leaf_bytes.len() as u64;
    let metadata_offset = tile_offset + tile_data.len() as u64;

    let mut header = Header {
        root_dir_offset: if root_bytes.is_empty() { 0 } else { root_offset },
        root_dir_bytes: root_bytes.len() as u64,
        leaf_dirs_offset: if leaf_bytes.is_empty() { 0 } else { leaf_offset },
        leaf_dirs_bytes: leaf_bytes.len() as u64,
        tile_data_offset: if tile_data.is_empty() { 0 } else { tile_offset },
        tile_data_bytes: tile_data.len() as u64,
        json_metadata_offset: metadata_offset,
        json_metadata_bytes: metadata.len() as u64,
        addressed_tiles_count: entries.len() as u64,
        tile_entries_count: entries.len() as u64,
        tile_contents_count: entries.len() as u64,
        clustered: false,
        internal_compression: Compression::None,
        tile_compression,
        tile_type,
        ..Header::default()
    };

    if !entries.is_empty() {
        header.min_zoom = min_zoom;
        header.max_zoom = max_zoom;
        header.min_lon_e7 = degrees_to_e7(min_lon, 180.0);
        header.min_lat_e7 = degrees_to_e7(min_lat, 90.0);
        header.max_lon_e7 = degrees_to_e7(max_lon, 180.0);
        header.max_lat_e7 = degrees_to_e7(max_lat, 90.0);
        header.center_zoom = max_zoom;
        header.center_lon_e7 = degrees_to_e7((min_lon + max_lon) * 0.5, 180.0);
        header.center_lat_e7 = degrees_to_e7((min_lat + max_lat) * 0.5, 90.0);
    }

    let mut out = Vec::with_capacity(
        HEADER_BYTES + root_bytes.len() + leaf_bytes.len() + tile_data.len() + metadata.len(),
    );
    out.extend_from_slice(&header.serialize());
    out.extend_from_slice(&root_bytes);
    out.extend_from_slice(&leaf_bytes);
    out.extend_from_slice(&tile_data);
    out.extend_from_slice(metadata.as_bytes());
    Ok(out)
}

/// Build an archive and write it to a file, flushing before return.
pub fn write_archive_to_path(
    path: &Path,
    tiles: &[(TileCoord, Vec<u8>)],
    metadata_json: &str,
    tile_type: TileType,
    tile_compression: Compression,
) -> Result<(), ArchiveError> {
    let blob = write_archive(tiles, metadata_json, tile_type, tile_compression)?;
    let mut file = File::create(path)?;
    file.write_all(&blob)?;
    file.flush()?;
    Ok(())
}

/// Encode the directory tree: the whole entry list as the root when
/// it fits the root byte budget, otherwise fixed-size leaf buckets
/// with a root of run-length-zero pointers. The bucket size doubles
/// until the root fits.
fn make_root_leaves(entries: &[Entry]) -> (Vec<u8>, Vec<u8>) {
    let direct = serialize_entries(entries);
    if direct.len() <= MAX_ROOT_DIR_BYTES {
        return (direct, Vec::new());
    }

    let mut bucket = LEAF_BUCKET_ENTRIES.max(entries.len() / LEAF_BUCKET_ENTRIES);
    loop {
        let (root, leaves) = build_buckets(entries, bucket);
        if root.len() <= MAX_ROOT_DIR_BYTES {
            return (root, leaves);
        }
        bucket *= 2;
    }
}

fn build_buckets(entries: &[Entry], bucket: usize) -> (Vec<u8>, Vec<u8>) {
    let mut root_entries = Vec::new();
    let mut leaf_bytes = Vec::new();
    for chunk in entries.chunks(bucket) {
        let serialized = serialize_entries(chunk);
        root_entries.push(Entry {
            tile_id: chunk[0].tile_id,
            offset: leaf_bytes.len() as u64,
            length: serialized.len() as u32,
            run_length: 0,
        });
        leaf_bytes.extend_from_slice(&serialized);
    }
    (serialize_entries(&root_entries), leaf_bytes)
}
