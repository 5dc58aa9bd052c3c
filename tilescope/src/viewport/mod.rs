//! Viewport request pipeline.
//!
//! Turns an incoming camera envelope into a response: reprojects the
//! geographic viewport into CRS meters, publishes the camera
//! snapshot, queries the BVH for the visible-feature count, derives
//! the detail factor from zoom, and - when detail is enabled -
//! extracts the covered tiles from the source archive and packages
//! them as a self-contained subset archive blob.
//!
//! The subset travels with the response both base64-encoded (for the
//! JSON envelope) and raw (for the WebSocket binary path); passing
//! the raw bytes by value means no per-thread staging state exists
//! between frames.

mod envelope;

pub use envelope::{
    mode_name, CameraRequest, CameraResponse, GeoBounds, SubsetEnvelope, ViewBounds,
};

use crate::bvh::Bvh;
use crate::camera::{CameraState, CameraStore};
use crate::coord::{self, TileCoord};
use crate::geom::Aabb;
use crate::pmtiles::{write_archive, ArchiveReader};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use proj::Proj;
use thiserror::Error;
use tracing::{debug, warn};

/// Zoom at and above which full detail is served.
pub const ZOOM_FULL_DETAIL: f64 = 15.0;

/// Zoom at and below which no detail is served.
pub const ZOOM_NO_DETAIL: f64 = 9.0;

/// Hard cap on tiles in one subset response.
pub const MAX_TILES_PER_RESPONSE: usize = 256;

/// Geographic source CRS of incoming bounds.
const BOUNDS_CRS: &str = "EPSG:4326";

/// Planar metric CRS the camera and corpus live in.
const VIEW_CRS: &str = "EPSG:3857";

/// Errors that prevent any meaningful response (mapped to 400).
#[derive(Debug, Error)]
pub enum ViewportError {
    #[error("Failed to create coordinate transformation")]
    TransformUnavailable,

    #[error("Camera bounds fall outside the supported projection extent")]
    OutsideProjection,
}

/// A processed request: the JSON envelope plus the raw subset bytes
/// for transports that can carry them out-of-band.
#[derive(Debug)]
pub struct ProcessedResponse {
    pub envelope: CameraResponse,
    pub raw_subset: Option<Vec<u8>>,
}

/// Detail factor for a zoom level: 0 at or below
/// [`ZOOM_NO_DETAIL`], 1 at or above [`ZOOM_FULL_DETAIL`], linear
/// in between.
#[inline]
pub fn detail_factor(zoom: f64) -> f64 {
    ((zoom - ZOOM_NO_DETAIL) / (ZOOM_FULL_DETAIL - ZOOM_NO_DETAIL)).clamp(0.0, 1.0)
}

/// Zoom level used for the subset archive: two above the camera,
/// clamped to [5, 15].
#[inline]
pub fn subset_zoom(zoom: f64) -> u8 {
    (zoom + 2.0).clamp(5.0, 15.0).round() as u8
}

/// Reproject canonical geographic bounds into the viewport box in
/// CRS meters: transform the four corners, take the component-wise
/// extremes.
pub fn view_meters(bounds: &GeoBounds) -> Result<Aabb, ViewportError> {
    let b = bounds.canonical();
    let south = coord::clamp_lat(b.south);
    let north = coord::clamp_lat(b.north);

    let transform = Proj::new_known_crs(BOUNDS_CRS, VIEW_CRS, None)
        .map_err(|_| ViewportError::TransformUnavailable)?;

    let corners = [
        (b.west, south),
        (b.east, south),
        (b.east, north),
        (b.west, north),
    ];

    let mut view = Aabb::empty();
    for (lon, lat) in corners {
        let (x, y) = transform
            .convert((lon, lat))
            .map_err(|_| ViewportError::OutsideProjection)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(ViewportError::OutsideProjection);
        }
        view.expand(&Aabb::new([x, y], [x, y]));
    }
    Ok(view)
}

/// Process one camera-state request end to end.
///
/// The camera snapshot is published before any response is built, so
/// for a single request the write happens-before the response. Subset
/// assembly failures degrade the response (no subset) instead of
/// failing it.
pub fn process_camera_state(
    request: &CameraRequest,
    bvh: &Bvh,
    reader: Option<&ArchiveReader>,
    camera: &CameraStore,
) -> Result<ProcessedResponse, ViewportError> {
    let mode = request.camera_mode();
    let view = view_meters(&request.bounds)?;

    camera.publish(CameraState {
        view,
        meters_per_pixel: request.meters_per_pixel,
        zoom: request.zoom,
        mode,
    });

    let factor = detail_factor(request.zoom);
    let allow_detail = factor > 0.0;

    let visible_count = if allow_detail {
        bvh.collect_visible(&view).len()
    } else {
        0
    };

    let mut envelope = CameraResponse {
        status: "ok".to_string(),
        mode: mode_name(mode).to_string(),
        visible_count,
        view_bounds: ViewBounds {
            min_x: view.min[0],
            min_y: view.min[1],
            max_x: view.max[0],
            max_y: view.max[1],
        },
        detail_enabled: allow_detail,
        detail_factor: factor,
        pmtiles_subset: None,
    };

    let mut raw_subset = None;
    if allow_detail {
        let max_tiles = ((factor * MAX_TILES_PER_RESPONSE as f64).round() as usize).max(1);
        let zoom = subset_zoom(request.zoom);
        if let Some(reader) = reader {
            if let Some((blob, tile_count)) =
                build_subset(reader, &request.bounds, zoom, max_tiles)
            {
                envelope.pmtiles_subset = Some(SubsetEnvelope {
                    zoom,
                    tile_count,
                    encoding: "base64".to_string(),
                    data: Some(BASE64.encode(&blob)),
                });
                raw_subset = Some(blob);
            }
        }
    }

    debug!(
        visible = visible_count,
        detail = factor,
        subset = envelope.pmtiles_subset.is_some(),
        "camera state processed"
    );

    Ok(ProcessedResponse {
        envelope,
        raw_subset,
    })
}

/// Extract the tiles covering `bounds` at `zoom` and package them as
/// a subset archive. Returns `None` when no tiles are found or the
/// writer fails; both leave the response without a subset.
fn build_subset(
    reader: &ArchiveReader,
    bounds: &GeoBounds,
    zoom: u8,
    max_tiles: usize,
) -> Option<(Vec<u8>, usize)> {
    if max_tiles == 0 {
        return None;
    }
    let header = reader.header()?;

    let b = bounds.canonical();
    let rect = coord::tile_rect(b.west, b.south, b.east, b.north, zoom);

    let mut tiles: Vec<(TileCoord, Vec<u8>)> = Vec::new();
    for tile in rect.iter() {
        if tiles.len() >= max_tiles {
            break;
        }
        match reader.get(tile.z, tile.x, tile.y) {
            Some(payload) if !payload.is_empty() => tiles.push((tile, payload)),
            _ => {}
        }
    }

    if tiles.is_empty() {
        return None;
    }
    let tile_count = tiles.len();

    match write_archive(&tiles, "{}", header.tile_type, header.tile_compression) {
        Ok(blob) => Some((blob, tile_count)),
        Err(err) => {
            warn!(error = %err, "subset archive assembly failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::FeatureCorpus;
    use crate::pmtiles::{Compression, TileType};

    // =========================================================================
    // Detail factor
    // =========================================================================

    #[test]
    fn test_detail_factor_table() {
        assert_eq!(detail_factor(0.0), 0.0);
        assert_eq!(detail_factor(9.0), 0.0);
        assert!((detail_factor(10.0) - 1.0 / 6.0).abs() < 1e-12);
        assert!((detail_factor(12.0) - 0.5).abs() < 1e-12);
        assert_eq!(detail_factor(15.0), 1.0);
        assert_eq!(detail_factor(20.0), 1.0);
    }

    #[test]
    fn test_subset_zoom_clamps() {
        assert_eq!(subset_zoom(0.0), 5);
        assert_eq!(subset_zoom(3.0), 5);
        assert_eq!(subset_zoom(10.0), 12);
        assert_eq!(subset_zoom(12.6), 15);
        assert_eq!(subset_zoom(18.0), 15);
    }

    // =========================================================================
    // Subset assembly against a synthetic archive
    // =========================================================================

    fn bounds(west: f64, south: f64, east: f64, north: f64) -> GeoBounds {
        GeoBounds {
            west,
            south,
            east,
            north,
        }
    }

    /// Archive holding every tile of the rectangle covering the test
    /// viewport at zoom 15.
    fn test_archive() -> ArchiveReader {
        let rect = coord::tile_rect(-74.02, 40.70, -74.00, 40.72, 15);
        let tiles: Vec<(TileCoord, Vec<u8>)> = rect
            .iter()
            .map(|t| (t, format!("tile-{}-{}", t.x, t.y).into_bytes()))
            .collect();
        assert!(!tiles.is_empty());
        let blob = write_archive(&tiles, "{}", TileType::Mvt, Compression::None).unwrap();
        ArchiveReader::from_bytes(blob).unwrap()
    }

    #[test]
    fn test_build_subset_returns_valid_archive() {
        let reader = test_archive();
        let (blob, count) = build_subset(
            &reader,
            &bounds(-74.02, 40.70, -74.00, 40.72),
            15,
            MAX_TILES_PER_RESPONSE,
        )
        .unwrap();
        assert!(count >= 1);

        let subset = ArchiveReader::from_bytes(blob).unwrap();
        let header = subset.header().unwrap();
        assert_eq!(header.addressed_tiles_count as usize, count);
        assert_eq!(header.tile_type, TileType::Mvt);
    }

    #[test]
    fn test_build_subset_respects_tile_cap() {
        let reader = test_archive();
        let (_, count) = build_subset(
            &reader,
            &bounds(-74.02, 40.70, -74.00, 40.72),
            15,
            2,
        )
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_build_subset_empty_region_is_none() {
        let reader = test_archive();
        // A region on the other side of the world has no tiles
        let result = build_subset(&reader, &bounds(100.0, -40.0, 101.0, -39.0), 15, 16);
        assert!(result.is_none());
    }

    // =========================================================================
    // Full pipeline
    // =========================================================================

    fn empty_bvh() -> Bvh {
        Bvh::build_with_threads(&FeatureCorpus::new(), 1)
    }

    fn request(zoom: f64) -> CameraRequest {
        serde_json::from_value(serde_json::json!({
            "bounds": {"west": -74.02, "south": 40.70, "east": -74.00, "north": 40.72},
            "metersPerPixel": 1.2,
            "zoom": zoom,
        }))
        .unwrap()
    }

    #[test]
    fn test_full_detail_response_has_subset() {
        let reader = test_archive();
        let camera = CameraStore::new();
        let processed =
            process_camera_state(&request(15.0), &empty_bvh(), Some(&reader), &camera).unwrap();

        let envelope = &processed.envelope;
        assert_eq!(envelope.status, "ok");
        assert!(envelope.detail_enabled);
        assert_eq!(envelope.detail_factor, 1.0);
        let subset = envelope.pmtiles_subset.as_ref().unwrap();
        assert_eq!(subset.zoom, 15);
        assert!(subset.tile_count >= 1);
        assert_eq!(subset.encoding, "base64");

        // The inline data decodes to the same bytes as the raw copy
        let decoded = BASE64.decode(subset.data.as_ref().unwrap()).unwrap();
        assert_eq!(Some(decoded), processed.raw_subset);
    }

    #[test]
    fn test_no_detail_response_has_no_subset() {
        let reader = test_archive();
        let camera = CameraStore::new();
        let processed =
            process_camera_state(&request(5.0), &empty_bvh(), Some(&reader), &camera).unwrap();

        let envelope = &processed.envelope;
        assert!(!envelope.detail_enabled);
        assert_eq!(envelope.detail_factor, 0.0);
        assert!(envelope.pmtiles_subset.is_none());
        assert!(processed.raw_subset.is_none());
        assert_eq!(envelope.visible_count, 0);
    }

    #[test]
    fn test_missing_reader_still_succeeds() {
        let camera = CameraStore::new();
        let processed =
            process_camera_state(&request(15.0), &empty_bvh(), None, &camera).unwrap();
        assert!(processed.envelope.pmtiles_subset.is_none());
        assert_eq!(processed.envelope.status, "ok");
    }

    #[test]
    fn test_camera_snapshot_published_before_response() {
        let camera = CameraStore::new();
        let processed =
            process_camera_state(&request(11.5), &empty_bvh(), None, &camera).unwrap();
        let snap = camera.snapshot();
        assert_eq!(snap.zoom, 11.5);
        assert_eq!(snap.meters_per_pixel, 1.2);
        assert_eq!(snap.view.min[0], processed.envelope.view_bounds.min_x);
        assert_eq!(snap.view.max[1], processed.envelope.view_bounds.max_y);
    }

    #[test]
    fn test_view_meters_requires_proj() {
        // Reprojection of a normal viewport succeeds and orders the box
        let view = view_meters(&bounds(-74.02, 40.70, -74.00, 40.72)).unwrap();
        assert!(view.is_valid());
        assert!(view.min[0] < view.max[0]);
        assert!(view.min[1] < view.max[1]);
    }

    #[test]
    fn test_view_meters_clamps_polar_latitudes() {
        let view = view_meters(&bounds(-10.0, -89.9, 10.0, 89.9)).unwrap();
        assert!(view.is_valid());
        // Web Mercator is bounded once latitudes are clamped
        assert!(view.max[1] < 25_000_000.0);
        assert!(view.min[1] > -25_000_000.0);
    }
}
