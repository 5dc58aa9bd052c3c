//! Record layout constants and stride arithmetic.
//!
//! A feature record is a `u32` vertex count, padding to the record
//! alignment, then `count` vertices of two `f64` each. Records are
//! packed back-to-back; every record starts on an 8-byte boundary,
//! which is sufficient for both the count field and the vertex pairs.

/// Alignment of every record start, in bytes.
pub const RECORD_ALIGN: usize = 8;

/// Bytes occupied by the vertex count plus its padding.
pub const RECORD_HEADER_BYTES: usize = 8;

/// Bytes per vertex (two `f64`).
pub const VERTEX_BYTES: usize = 16;

/// Total bytes a record with `coords_count` vertices occupies in the
/// buffer, rounded up to the record alignment.
#[inline]
pub fn aligned_stride(coords_count: usize) -> usize {
    let bytes = RECORD_HEADER_BYTES + coords_count * VERTEX_BYTES;
    (bytes + (RECORD_ALIGN - 1)) & !(RECORD_ALIGN - 1)
}
