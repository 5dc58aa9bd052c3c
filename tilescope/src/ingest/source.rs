//! Vector dataset sources.
//!
//! The ingester reads geometries through the [`VectorSource`] trait
//! so dataset formats stay pluggable. The shipped implementation
//! parses GeoJSON FeatureCollections; a GDAL-class reader would slot
//! in behind the same seam.

use geo_types::{Geometry, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors raised while opening or decoding a single dataset.
#[derive(Debug)]
pub enum SourceError {
    /// Dataset could not be opened read-only
    Open(PathBuf, std::io::Error),
    /// Dataset contents could not be decoded
    Decode(PathBuf, String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Open(path, err) => {
                write!(f, "Failed to open dataset {}: {}", path.display(), err)
            }
            SourceError::Decode(path, msg) => {
                write!(f, "Failed to decode dataset {}: {}", path.display(), msg)
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// One decoded dataset layer: its declared CRS and the polygonal
/// geometries it contains.
#[derive(Debug)]
pub struct SourceLayer {
    pub crs: String,
    pub geometries: Vec<Geometry<f64>>,
}

/// Trait for vector feature datasets.
///
/// Implementors open their backing storage read-only and yield all
/// polygon-bearing geometries in one pass.
pub trait VectorSource: Send + Sync {
    /// Decode the dataset into a layer of geometries.
    fn read_layer(&self) -> Result<SourceLayer, SourceError>;

    /// A human-readable name for logging.
    fn name(&self) -> String;
}

/// GeoJSON FeatureCollection source.
///
/// GeoJSON geometries are WGS84 by definition; a legacy top-level
/// `crs` member overrides the declared CRS when present.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    path: PathBuf,
}

impl GeoJsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VectorSource for GeoJsonSource {
    fn read_layer(&self) -> Result<SourceLayer, SourceError> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SourceError::Open(self.path.clone(), e))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| SourceError::Decode(self.path.clone(), e.to_string()))?;

        let crs = declared_crs(&value);

        let mut geometries = Vec::new();
        match value.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                let features = value
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        SourceError::Decode(
                            self.path.clone(),
                            "FeatureCollection without features array".to_string(),
                        )
                    })?;
                for feature in features {
                    if let Some(geom) = feature.get("geometry").and_then(parse_geometry) {
                        geometries.push(geom);
                    }
                }
            }
            Some("Feature") => {
                if let Some(geom) = value.get("geometry").and_then(parse_geometry) {
                    geometries.push(geom);
                }
            }
            Some(_) => {
                if let Some(geom) = parse_geometry(&value) {
                    geometries.push(geom);
                }
            }
            None => {
                return Err(SourceError::Decode(
                    self.path.clone(),
                    "missing type member".to_string(),
                ));
            }
        }

        Ok(SourceLayer { crs, geometries })
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// An already-decoded in-memory layer, used by startup wiring and
/// tests that synthesize geometry without touching the filesystem.
#[derive(Debug)]
pub struct MemorySource {
    pub crs: String,
    pub geometries: Vec<Geometry<f64>>,
    pub label: String,
}

impl VectorSource for MemorySource {
    fn read_layer(&self) -> Result<SourceLayer, SourceError> {
        Ok(SourceLayer {
            crs: self.crs.clone(),
            geometries: self.geometries.clone(),
        })
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}

fn declared_crs(value: &Value) -> String {
    value
        .get("crs")
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(Value::as_str)
        .map(normalize_crs_name)
        .unwrap_or_else(|| "EPSG:4326".to_string())
}

/// Map legacy GeoJSON CRS URNs onto authority:code form.
fn normalize_crs_name(name: &str) -> String {
    if let Some(code) = name.strip_prefix("urn:ogc:def:crs:EPSG::") {
        return format!("EPSG:{}", code);
    }
    if name == "urn:ogc:def:crs:OGC:1.3:CRS84" {
        return "EPSG:4326".to_string();
    }
    name.to_string()
}

/// Decode a GeoJSON geometry object into `geo-types`, keeping only
/// the polygonal kinds the corpus stores.
fn parse_geometry(value: &Value) -> Option<Geometry<f64>> {
    let kind = value.get("type")?.as_str()?;
    let coords = value.get("coordinates")?;
    match kind {
        "Polygon" => parse_polygon(coords).map(Geometry::Polygon),
        "MultiPolygon" => {
            let polys: Vec<Polygon<f64>> = coords
                .as_array()?
                .iter()
                .filter_map(parse_polygon)
                .collect();
            if polys.is_empty() {
                None
            } else {
                Some(Geometry::MultiPolygon(MultiPolygon(polys)))
            }
        }
        _ => None,
    }
}

fn parse_polygon(coords: &Value) -> Option<Polygon<f64>> {
    let rings = coords.as_array()?;
    let mut parsed: Vec<LineString<f64>> = rings.iter().filter_map(parse_ring).collect();
    if parsed.is_empty() {
        return None;
    }
    let exterior = parsed.remove(0);
    Some(Polygon::new(exterior, parsed))
}

fn parse_ring(coords: &Value) -> Option<LineString<f64>> {
    let points = coords.as_array()?;
    let mut ring = Vec::with_capacity(points.len());
    for point in points {
        let pair = point.as_array()?;
        let x = pair.first()?.as_f64()?;
        let y = pair.get(1)?.as_f64()?;
        ring.push((x, y));
    }
    Some(LineString::from(ring))
}
