//! Feature corpus - the packed polygon store.
//!
//! All ingested features live in one contiguous byte buffer of
//! variable-length records (see [`layout`]). Components downstream of
//! ingest hold byte offsets into this buffer instead of owned
//! polygons; the flat layout keeps the per-feature bounding-box pass
//! and BVH construction cache-friendly.
//!
//! The corpus is read-only after construction. Re-initialization is
//! allowed but must complete before any dependent component observes
//! the new buffer.

pub mod layout;

use crate::geom::Vertex;
use layout::{aligned_stride, RECORD_HEADER_BYTES, VERTEX_BYTES};
use std::fmt;

/// Identifies a feature record by its byte offset in the corpus
/// buffer. Offsets are stable for the lifetime of the corpus and act
/// as the feature identity everywhere downstream.
pub type FeatureId = usize;

/// Errors that can occur while building or walking the corpus.
#[derive(Debug, Clone, PartialEq)]
pub enum CorpusError {
    /// Record count exceeds the signed 32-bit limit of the layout
    TooManyRecords(usize),
    /// Stride walk did not land exactly on the buffer end
    LayoutMismatch { expected: usize, actual: usize },
    /// A record's declared extent runs past the buffer end
    RecordOutOfBounds { offset: usize },
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusError::TooManyRecords(count) => {
                write!(f, "Record count {} exceeds i32::MAX", count)
            }
            CorpusError::LayoutMismatch { expected, actual } => {
                write!(
                    f,
                    "Record traversal ended at {} bytes, expected {}",
                    actual, expected
                )
            }
            CorpusError::RecordOutOfBounds { offset } => {
                write!(f, "Record at offset {} exceeds the corpus buffer", offset)
            }
        }
    }
}

impl std::error::Error for CorpusError {}

/// The packed feature store: one owned buffer, a record count, and
/// the total byte length.
#[derive(Debug, Default)]
pub struct FeatureCorpus {
    data: Vec<u8>,
    record_count: usize,
}

impl FeatureCorpus {
    /// An empty corpus with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from per-feature vertex lists.
    ///
    /// This is the serial second pass of ingestion: the total size is
    /// computed from the per-record strides, one buffer is allocated,
    /// and each record is copied into place. The cursor must land
    /// exactly on the buffer end; any mismatch is a hard accounting
    /// error and yields no corpus.
    pub fn from_vertex_lists(features: &[Vec<Vertex>]) -> Result<Self, CorpusError> {
        if features.len() > i32::MAX as usize {
            return Err(CorpusError::TooManyRecords(features.len()));
        }

        let total_bytes: usize = features.iter().map(|v| aligned_stride(v.len())).sum();
        let mut data = vec![0u8; total_bytes];

        let mut cursor = 0usize;
        for verts in features {
            let stride = aligned_stride(verts.len());
            if cursor + stride > total_bytes {
                return Err(CorpusError::RecordOutOfBounds { offset: cursor });
            }
            data[cursor..cursor + 4].copy_from_slice(&(verts.len() as u32).to_ne_bytes());
            let mut at = cursor + RECORD_HEADER_BYTES;
            for v in verts {
                data[at..at + 8].copy_from_slice(&v.x.to_ne_bytes());
                data[at + 8..at + 16].copy_from_slice(&v.y.to_ne_bytes());
                at += VERTEX_BYTES;
            }
            cursor += stride;
        }

        if cursor != total_bytes {
            return Err(CorpusError::LayoutMismatch {
                expected: total_bytes,
                actual: cursor,
            });
        }

        Ok(Self {
            data,
            record_count: features.len(),
        })
    }

    /// Number of feature records.
    #[inline]
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Total byte length of the packed buffer.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// True when the corpus holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Access the record at a byte offset previously produced by
    /// [`FeatureCorpus::iter`] or stored in a feature reference.
    ///
    /// Returns `None` when the offset or the record's declared extent
    /// falls outside the buffer.
    pub fn record_at(&self, offset: FeatureId) -> Option<FeatureRecord<'_>> {
        if offset + RECORD_HEADER_BYTES > self.data.len() {
            return None;
        }
        let count =
            u32::from_ne_bytes(self.data[offset..offset + 4].try_into().expect("4 bytes")) as usize;
        let end = offset + RECORD_HEADER_BYTES + count * VERTEX_BYTES;
        if end > self.data.len() {
            return None;
        }
        Some(FeatureRecord {
            corpus: self,
            offset,
            coords_count: count,
        })
    }

    /// Iterate all records in buffer order, yielding their offsets.
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            corpus: self,
            cursor: 0,
            visited: 0,
        }
    }

    /// Walk the buffer by stride and verify the accounting invariant:
    /// the walk visits exactly `record_count` records and lands
    /// exactly on the buffer end.
    pub fn validate(&self) -> Result<(), CorpusError> {
        let mut cursor = 0usize;
        for _ in 0..self.record_count {
            let rec = self
                .record_at(cursor)
                .ok_or(CorpusError::RecordOutOfBounds { offset: cursor })?;
            cursor += aligned_stride(rec.coords_count);
            if cursor > self.data.len() {
                return Err(CorpusError::RecordOutOfBounds { offset: cursor });
            }
        }
        if cursor != self.data.len() {
            return Err(CorpusError::LayoutMismatch {
                expected: self.data.len(),
                actual: cursor,
            });
        }
        Ok(())
    }
}

/// A borrowed view of a single feature record.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRecord<'a> {
    corpus: &'a FeatureCorpus,
    offset: usize,
    coords_count: usize,
}

impl<'a> FeatureRecord<'a> {
    /// Byte offset of this record in the corpus buffer.
    #[inline]
    pub fn id(&self) -> FeatureId {
        self.offset
    }

    /// Declared vertex count.
    #[inline]
    pub fn coords_count(&self) -> usize {
        self.coords_count
    }

    /// Iterate the record's vertices.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + 'a {
        let base = self.offset + RECORD_HEADER_BYTES;
        let data = &self.corpus.data;
        (0..self.coords_count).map(move |i| {
            let at = base + i * VERTEX_BYTES;
            Vertex {
                x: f64::from_ne_bytes(data[at..at + 8].try_into().expect("8 bytes")),
                y: f64::from_ne_bytes(data[at + 8..at + 16].try_into().expect("8 bytes")),
            }
        })
    }
}

/// Iterator over record offsets, advancing by aligned stride.
pub struct RecordIter<'a> {
    corpus: &'a FeatureCorpus,
    cursor: usize,
    visited: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = FeatureRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.visited >= self.corpus.record_count {
            return None;
        }
        let rec = self.corpus.record_at(self.cursor)?;
        self.cursor += aligned_stride(rec.coords_count);
        self.visited += 1;
        Some(rec)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.corpus.record_count - self.visited;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(base_x: f64, base_y: f64, size: f64) -> Vec<Vertex> {
        vec![
            Vertex::new(base_x, base_y),
            Vertex::new(base_x, base_y + size),
            Vertex::new(base_x + size, base_y + size),
            Vertex::new(base_x + size, base_y),
        ]
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn test_empty_corpus() {
        let corpus = FeatureCorpus::from_vertex_lists(&[]).unwrap();
        assert_eq!(corpus.record_count(), 0);
        assert_eq!(corpus.byte_len(), 0);
        assert!(corpus.is_empty());
        assert!(corpus.validate().is_ok());
    }

    #[test]
    fn test_single_record_layout() {
        let corpus = FeatureCorpus::from_vertex_lists(&[square(0.0, 0.0, 5.0)]).unwrap();
        assert_eq!(corpus.record_count(), 1);
        assert_eq!(corpus.byte_len(), aligned_stride(4));
        assert!(corpus.validate().is_ok());
    }

    #[test]
    fn test_mixed_record_sizes() {
        let features = vec![
            square(0.0, 0.0, 1.0),
            vec![Vertex::new(3.0, 4.0)],
            square(10.0, 10.0, 2.0),
        ];
        let corpus = FeatureCorpus::from_vertex_lists(&features).unwrap();
        assert_eq!(corpus.record_count(), 3);
        assert_eq!(
            corpus.byte_len(),
            aligned_stride(4) + aligned_stride(1) + aligned_stride(4)
        );
        assert!(corpus.validate().is_ok());
    }

    #[test]
    fn test_zero_vertex_record_is_representable() {
        let corpus = FeatureCorpus::from_vertex_lists(&[vec![]]).unwrap();
        assert_eq!(corpus.record_count(), 1);
        let rec = corpus.iter().next().unwrap();
        assert_eq!(rec.coords_count(), 0);
        assert_eq!(rec.vertices().count(), 0);
    }

    // =========================================================================
    // Traversal invariant
    // =========================================================================

    #[test]
    fn test_stride_walk_lands_on_buffer_end() {
        let features: Vec<Vec<Vertex>> = (0..37)
            .map(|i| square(i as f64 * 10.0, 0.0, 5.0))
            .collect();
        let corpus = FeatureCorpus::from_vertex_lists(&features).unwrap();

        let mut cursor = 0usize;
        let mut visited = 0usize;
        for rec in corpus.iter() {
            assert_eq!(rec.id(), cursor);
            cursor += aligned_stride(rec.coords_count());
            visited += 1;
        }
        assert_eq!(visited, corpus.record_count());
        assert_eq!(cursor, corpus.byte_len());
    }

    #[test]
    fn test_vertices_roundtrip() {
        let original = vec![
            Vertex::new(-5.5, 7.25),
            Vertex::new(0.0, -0.125),
            Vertex::new(123456.789, -98765.4321),
        ];
        let corpus = FeatureCorpus::from_vertex_lists(&[original.clone()]).unwrap();
        let rec = corpus.iter().next().unwrap();
        let decoded: Vec<Vertex> = rec.vertices().collect();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_record_at_rejects_out_of_bounds_offset() {
        let corpus = FeatureCorpus::from_vertex_lists(&[square(0.0, 0.0, 1.0)]).unwrap();
        assert!(corpus.record_at(corpus.byte_len()).is_none());
        assert!(corpus.record_at(corpus.byte_len() + 8).is_none());
    }

    #[test]
    fn test_offsets_are_stable_identities() {
        let features = vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)];
        let corpus = FeatureCorpus::from_vertex_lists(&features).unwrap();
        let ids: Vec<FeatureId> = corpus.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![0, aligned_stride(4)]);
        // Looking a record up again by its id yields the same data
        let rec = corpus.record_at(ids[1]).unwrap();
        assert_eq!(rec.vertices().next().unwrap(), Vertex::new(5.0, 5.0));
    }
}
