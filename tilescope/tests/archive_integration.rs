//! Archive codec integration tests: write archives to disk and
//! memory, read them back, and check the on-disk header contract.

use tilescope::coord::TileCoord;
use tilescope::pmtiles::{
    write_archive, write_archive_to_path, ArchiveReader, Compression, Header, TileType,
    HEADER_BYTES,
};

fn tile(z: u8, x: u32, y: u32, payload: &[u8]) -> (TileCoord, Vec<u8>) {
    (TileCoord { z, x, y }, payload.to_vec())
}

#[test]
fn test_minimal_archive_on_disk() {
    // One tile at 0/0/0 with a known payload and empty metadata
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minimal.pmtiles");
    let tiles = vec![tile(0, 0, 0, b"test_tile_data")];
    write_archive_to_path(&path, &tiles, "{}", TileType::Mvt, Compression::None).unwrap();

    // The first 127 bytes decode to the expected header
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.len() > HEADER_BYTES);
    let header = Header::deserialize(&bytes[..HEADER_BYTES]).unwrap();
    assert_eq!(header.addressed_tiles_count, 1);
    assert_eq!(header.tile_data_bytes, 14);
    assert_eq!(header.tile_type, TileType::Mvt);
}

#[test]
fn test_mapped_reader_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.pmtiles");

    let mut tiles = Vec::new();
    for x in 0..4u32 {
        for y in 0..4u32 {
            tiles.push(tile(6, x + 10, y + 20, format!("{}:{}", x, y).as_bytes()));
        }
    }
    write_archive_to_path(&path, &tiles, r#"{"name":"t"}"#, TileType::Mvt, Compression::None)
        .unwrap();

    let reader = ArchiveReader::open(&path).unwrap();
    for x in 0..4u32 {
        for y in 0..4u32 {
            let payload = reader.get(6, x + 10, y + 20).unwrap();
            assert_eq!(payload, format!("{}:{}", x, y).as_bytes());
        }
    }
    assert_eq!(reader.metadata().unwrap(), r#"{"name":"t"}"#);
}

#[test]
fn test_unknown_keys_are_absent() {
    let tiles = vec![tile(4, 3, 3, b"only")];
    let blob = write_archive(&tiles, "{}", TileType::Mvt, Compression::None).unwrap();
    let reader = ArchiveReader::from_bytes(blob).unwrap();

    assert!(reader.get(4, 3, 3).is_some());
    assert_eq!(reader.get(4, 3, 2), None);
    assert_eq!(reader.get(5, 3, 3), None);
    assert_eq!(reader.get(0, 0, 0), None);
    // Out-of-grid addresses are absent, not errors
    assert_eq!(reader.get(4, 16, 0), None);
}

#[test]
fn test_subset_of_subset_is_stable() {
    // Extracting tiles from an archive and re-archiving them must
    // preserve the payload bytes exactly
    let original: Vec<(TileCoord, Vec<u8>)> = (0..16u32)
        .map(|i| tile(5, i, 7, format!("payload-{}", i).as_bytes()))
        .collect();
    let blob = write_archive(&original, "{}", TileType::Mvt, Compression::Gzip).unwrap();
    let reader = ArchiveReader::from_bytes(blob).unwrap();

    let extracted: Vec<(TileCoord, Vec<u8>)> = (4..8u32)
        .map(|i| (TileCoord { z: 5, x: i, y: 7 }, reader.get(5, i, 7).unwrap()))
        .collect();
    let subset_blob =
        write_archive(&extracted, "{}", TileType::Mvt, Compression::Gzip).unwrap();
    let subset = ArchiveReader::from_bytes(subset_blob).unwrap();

    let header = subset.header().unwrap();
    assert_eq!(header.addressed_tiles_count, 4);
    assert_eq!(header.tile_compression, Compression::Gzip);
    for i in 4..8u32 {
        assert_eq!(subset.get(5, i, 7).unwrap(), format!("payload-{}", i).as_bytes());
    }
}
