//! Directory encoding, decoding, and lookup.
//!
//! Directories are columnar: an entry-count varint, then the
//! delta-encoded tile-ids of every entry, then all run-lengths, all
//! lengths, and all offsets. Offsets use the contiguity shortcut: a
//! zero means "immediately after the previous entry's data", any
//! other value is the real offset plus one.
//!
//! An entry with run-length zero is a pointer to a leaf directory at
//! `offset`/`length` within the leaf-directory section; a run-length
//! of `n >= 1` makes the entry cover tile-ids `[tile_id, tile_id+n)`,
//! all sharing one payload.

/// A directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub tile_id: u64,
    pub offset: u64,
    pub length: u32,
    pub run_length: u32,
}

/// Append a protobuf-style little-endian varint.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decode a varint. Returns the value and the bytes consumed, or
/// `None` when the input is truncated or overlong.
pub fn decode_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
    None
}

/// Encode entries in the columnar directory format.
///
/// Entries must already be sorted by tile-id ascending.
pub fn serialize_entries(entries: &[Entry]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_varint(entries.len() as u64, &mut buf);
    if entries.is_empty() {
        return buf;
    }

    let mut last_id = 0u64;
    for entry in entries {
        encode_varint(entry.tile_id - last_id, &mut buf);
        last_id = entry.tile_id;
    }
    for entry in entries {
        encode_varint(entry.run_length as u64, &mut buf);
    }
    for entry in entries {
        encode_varint(entry.length as u64, &mut buf);
    }

    let mut expected = 0u64;
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && entry.offset == expected {
            encode_varint(0, &mut buf);
        } else {
            encode_varint(entry.offset + 1, &mut buf);
        }
        if entry.run_length > 0 {
            expected = entry.offset + entry.length as u64;
        }
    }

    buf
}

/// Decode a directory serialized by [`serialize_entries`].
///
/// Returns `None` on any truncation or inconsistency; directory
/// corruption is treated as "no entries" by callers.
pub fn deserialize_entries(data: &[u8]) -> Option<Vec<Entry>> {
    let mut at = 0usize;
    let mut next = |data: &[u8]| -> Option<u64> {
        let (value, used) = decode_varint(&data[at..])?;
        at += used;
        Some(value)
    };

    let count = next(data)? as usize;
    // Each entry occupies at least one byte per column
    if count > data.len() {
        return None;
    }
    let mut entries = vec![
        Entry {
            tile_id: 0,
            offset: 0,
            length: 0,
            run_length: 0,
        };
        count
    ];

    let mut id = 0u64;
    for entry in entries.iter_mut() {
        id = id.checked_add(next(data)?)?;
        entry.tile_id = id;
    }
    for entry in entries.iter_mut() {
        entry.run_length = u32::try_from(next(data)?).ok()?;
    }
    for entry in entries.iter_mut() {
        entry.length = u32::try_from(next(data)?).ok()?;
    }

    let mut expected = 0u64;
    for i in 0..count {
        let raw = next(data)?;
        let offset = if raw == 0 {
            if i == 0 {
                return None;
            }
            expected
        } else {
            raw - 1
        };
        entries[i].offset = offset;
        if entries[i].run_length > 0 {
            expected = offset + entries[i].length as u64;
        }
    }

    Some(entries)
}

/// Find the entry responsible for `tile_id`: the last entry whose id
/// is not greater than the query, provided its run covers the query
/// or it is a leaf pointer (run-length zero).
pub fn find_entry(entries: &[Entry], tile_id: u64) -> Option<&Entry> {
    let idx = match entries.binary_search_by(|e| e.tile_id.cmp(&tile_id)) {
        Ok(i) => i,
        Err(0) => return None,
        Err(i) => i - 1,
    };
    let entry = &entries[idx];
    if entry.run_length == 0 {
        return Some(entry);
    }
    if tile_id - entry.tile_id < entry.run_length as u64 {
        return Some(entry);
    }
    None
}
