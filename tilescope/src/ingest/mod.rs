//! Feature ingestion pipeline.
//!
//! Reads polygon features from an ordered list of vector datasets,
//! reprojects them into the target planar metric CRS, and packs the
//! flattened vertex rings into the [`FeatureCorpus`](crate::corpus::FeatureCorpus).
//!
//! Per-dataset decoding runs in parallel; the final buffer layout is
//! a serial second pass so record order is deterministic. Dataset
//! failures are logged and skipped; only whole-corpus accounting
//! failures abort the ingest.

pub mod source;

pub use source::{GeoJsonSource, MemorySource, SourceError, SourceLayer, VectorSource};

use crate::corpus::{CorpusError, FeatureCorpus};
use crate::geom::Vertex;
use geo_types::{Geometry, LineString, Polygon};
use proj::Proj;
use rayon::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Default target CRS: global Web Mercator meters.
pub const DEFAULT_TARGET_CRS: &str = "EPSG:3857";

/// Errors that abort the whole ingest.
///
/// Dataset-level problems never surface here; they are logged and
/// the dataset is skipped.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("corpus accounting failed: {0}")]
    Corpus(#[from] CorpusError),
}

/// Ingest a list of GeoJSON dataset paths.
///
/// Convenience wrapper over [`ingest_sources`] for the common case.
pub fn ingest_paths(
    paths: &[PathBuf],
    target_crs: &str,
    threads: usize,
) -> Result<FeatureCorpus, IngestError> {
    let sources: Vec<Box<dyn VectorSource>> = paths
        .iter()
        .map(|p| Box::new(GeoJsonSource::new(p)) as Box<dyn VectorSource>)
        .collect();
    ingest_sources(&sources, target_crs, threads)
}

/// Ingest all sources into a fresh corpus.
///
/// Pass 1 decodes and reprojects each source (parallel over sources
/// when `threads > 1`); pass 2 lays the flattened features into one
/// contiguous buffer. The record count must fit a signed 32-bit
/// integer and the layout cursor must land exactly on the buffer
/// end; either failure empties the corpus.
pub fn ingest_sources(
    sources: &[Box<dyn VectorSource>],
    target_crs: &str,
    threads: usize,
) -> Result<FeatureCorpus, IngestError> {
    let per_source: Vec<Vec<Vec<Vertex>>> = if threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("ingest thread pool");
        pool.install(|| {
            sources
                .par_iter()
                .map(|s| read_source(s.as_ref(), target_crs))
                .collect()
        })
    } else {
        sources
            .iter()
            .map(|s| read_source(s.as_ref(), target_crs))
            .collect()
    };

    let features: Vec<Vec<Vertex>> = per_source.into_iter().flatten().collect();
    let corpus = FeatureCorpus::from_vertex_lists(&features)?;
    corpus.validate()?;

    info!(
        records = corpus.record_count(),
        bytes = corpus.byte_len(),
        sources = sources.len(),
        "corpus ingested"
    );
    Ok(corpus)
}

/// Decode one source into flattened, reprojected vertex lists.
///
/// Open and decode failures are non-fatal: the source contributes
/// nothing and ingestion continues.
fn read_source(source: &dyn VectorSource, target_crs: &str) -> Vec<Vec<Vertex>> {
    let layer = match source.read_layer() {
        Ok(layer) => layer,
        Err(err) => {
            warn!(source = %source.name(), error = %err, "skipping dataset");
            return Vec::new();
        }
    };

    let transform = if layer.crs != target_crs {
        match Proj::new_known_crs(&layer.crs, target_crs, None) {
            Ok(t) => Some(t),
            Err(err) => {
                warn!(
                    source = %source.name(),
                    crs = %layer.crs,
                    error = %err,
                    "no transform to target CRS, skipping dataset"
                );
                return Vec::new();
            }
        }
    } else {
        None
    };

    layer
        .geometries
        .iter()
        .filter_map(|geom| flatten_feature(geom, transform.as_ref()))
        .collect()
}

/// Flatten every ring of a polygonal geometry into one vertex list.
///
/// The closing duplicate vertex of each ring is dropped, non-finite
/// vertices are skipped, and a reprojection failure anywhere in the
/// feature drops the whole feature. Features that end up empty are
/// dropped by the caller.
fn flatten_feature(geom: &Geometry<f64>, transform: Option<&Proj>) -> Option<Vec<Vertex>> {
    let mut verts = Vec::new();
    let ok = match geom {
        Geometry::Polygon(poly) => flatten_polygon(poly, transform, &mut verts),
        Geometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .all(|poly| flatten_polygon(poly, transform, &mut verts)),
        _ => false,
    };
    if !ok || verts.is_empty() {
        return None;
    }
    Some(verts)
}

fn flatten_polygon(poly: &Polygon<f64>, transform: Option<&Proj>, out: &mut Vec<Vertex>) -> bool {
    if !flatten_ring(poly.exterior(), transform, out) {
        return false;
    }
    for interior in poly.interiors() {
        if !flatten_ring(interior, transform, out) {
            return false;
        }
    }
    true
}

fn flatten_ring(ring: &LineString<f64>, transform: Option<&Proj>, out: &mut Vec<Vertex>) -> bool {
    let coords = &ring.0;
    // Rings close by repeating the first vertex; drop the repeat.
    let end = if coords.len() > 1 && coords.first() == coords.last() {
        coords.len() - 1
    } else {
        coords.len()
    };

    for coord in &coords[..end] {
        let (x, y) = match transform {
            Some(proj) => match proj.convert((coord.x, coord.y)) {
                Ok(pair) => pair,
                Err(_) => return false,
            },
            None => (coord.x, coord.y),
        };
        let vertex = Vertex::new(x, y);
        if !vertex.is_finite() {
            continue;
        }
        out.push(vertex);
    }
    true
}
