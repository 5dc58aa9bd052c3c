//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates
//! (latitude/longitude) and Web Mercator tile coordinates, used to
//! translate camera viewports into tile-index rectangles and archive
//! tiles back into their geographic corners.

mod types;

pub use types::{CoordError, TileCoord, TileRect, MAX_LAT, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM};

use std::f64::consts::PI;

/// Clamp a latitude to the Web Mercator valid range.
#[inline]
pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(MIN_LAT, MAX_LAT)
}

/// Converts a longitude to a fractional tile X coordinate at `zoom`.
///
/// The result is clamped to `[0, 2^zoom)` so that flooring always
/// yields a valid tile index, including at exactly 180 degrees.
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    let x = (lon + 180.0) / 360.0 * n;
    x.clamp(0.0, next_below(n))
}

/// Converts a latitude to a fractional tile Y coordinate at `zoom`.
///
/// Latitudes beyond the Web Mercator range are clamped first; the
/// result is clamped to `[0, 2^zoom)` like [`lon_to_tile_x`].
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = clamp_lat(lat).to_radians();
    let merc = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    let y = (1.0 - merc / PI) / 2.0 * n;
    y.clamp(0.0, next_below(n))
}

/// Longitude of the western edge of tile column `x` at `zoom`.
#[inline]
pub fn tile_x_to_lon(x: u32, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    x as f64 / n * 360.0 - 180.0
}

/// Latitude of the northern edge of tile row `y` at `zoom`.
#[inline]
pub fn tile_y_to_lat(y: u32, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    let t = PI - 2.0 * PI * y as f64 / n;
    t.sinh().atan().to_degrees()
}

/// Compute the inclusive tile rectangle covering a geographic
/// bounding box at `zoom`.
///
/// Bounds are canonicalized (west <= east, south <= north) before
/// conversion, fractional indices are floored and clamped to the
/// grid. Expanding the input box never shrinks the result.
pub fn tile_rect(west: f64, south: f64, east: f64, north: f64, zoom: u8) -> TileRect {
    let (west, east) = if east < west { (east, west) } else { (west, east) };
    let (south, north) = if south > north { (north, south) } else { (south, north) };

    let x_min_f = lon_to_tile_x(west, zoom);
    let x_max_f = lon_to_tile_x(east, zoom);
    let y_min_f = lat_to_tile_y(north, zoom);
    let y_max_f = lat_to_tile_y(south, zoom);

    let max_index = (1u64 << zoom) - 1;
    let clamp_floor = |v: f64| -> u32 { (v.floor().max(0.0) as u64).min(max_index) as u32 };

    TileRect {
        z: zoom,
        x_min: clamp_floor(x_min_f.min(x_max_f)),
        x_max: clamp_floor(x_min_f.max(x_max_f)),
        y_min: clamp_floor(y_min_f.min(y_max_f)),
        y_max: clamp_floor(y_min_f.max(y_max_f)),
    }
}

/// Largest representable value strictly below `n`.
#[inline]
fn next_below(n: f64) -> f64 {
    f64::from_bits(n.to_bits() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128 N, 74.0060 W
        let x = lon_to_tile_x(-74.0060, 16).floor() as u32;
        let y = lat_to_tile_y(40.7128, 16).floor() as u32;
        assert_eq!(x, 19295);
        assert_eq!(y, 24640);
    }

    #[test]
    fn test_zoom_zero_single_tile() {
        assert_eq!(lon_to_tile_x(-180.0, 0).floor() as u32, 0);
        assert_eq!(lon_to_tile_x(179.999, 0).floor() as u32, 0);
        assert_eq!(lat_to_tile_y(85.0, 0).floor() as u32, 0);
        assert_eq!(lat_to_tile_y(-85.0, 0).floor() as u32, 0);
    }

    #[test]
    fn test_antimeridian_clamps_into_grid() {
        // Exactly 180 degrees must not produce index 2^z
        let x = lon_to_tile_x(180.0, 10);
        assert!(x < 1024.0);
        assert_eq!(x.floor() as u32, 1023);
    }

    #[test]
    fn test_polar_latitude_clamps_into_grid() {
        let y = lat_to_tile_y(-90.0, 10);
        assert!(y < 1024.0);
        assert_eq!(y.floor() as u32, 1023);
        assert_eq!(lat_to_tile_y(90.0, 10).floor() as u32, 0);
    }

    #[test]
    fn test_tile_corner_roundtrip() {
        let lon = tile_x_to_lon(19295, 16);
        let lat = tile_y_to_lat(24640, 16);
        assert_eq!(lon_to_tile_x(lon, 16).floor() as u32, 19295);
        assert_eq!(lat_to_tile_y(lat, 16).floor() as u32, 24640);
    }

    #[test]
    fn test_tile_y_to_lat_is_northern_edge() {
        // Row 0 starts at the top of the mercator world
        let lat = tile_y_to_lat(0, 5);
        assert!((lat - MAX_LAT).abs() < 1e-6);
    }

    #[test]
    fn test_tile_rect_canonicalizes_swapped_bounds() {
        let a = tile_rect(-74.1, 40.6, -73.9, 40.8, 12);
        let b = tile_rect(-73.9, 40.8, -74.1, 40.6, 12);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tile_rect_monotone_under_expansion() {
        let inner = tile_rect(-74.1, 40.6, -73.9, 40.8, 12);
        let outer = tile_rect(-75.0, 40.0, -73.0, 41.5, 12);
        assert!(outer.x_min <= inner.x_min);
        assert!(outer.x_max >= inner.x_max);
        assert!(outer.y_min <= inner.y_min);
        assert!(outer.y_max >= inner.y_max);
    }

    #[test]
    fn test_tile_rect_iterates_x_major() {
        let rect = TileRect {
            z: 3,
            x_min: 1,
            x_max: 2,
            y_min: 4,
            y_max: 5,
        };
        let tiles: Vec<_> = rect.iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(tiles, vec![(1, 4), (1, 5), (2, 4), (2, 5)]);
        assert_eq!(rect.count(), 4);
    }

    #[test]
    fn test_tile_coord_validation() {
        assert!(TileCoord::new(0, 0, 0).is_ok());
        assert!(TileCoord::new(31, 0, 0).is_err());
        assert!(TileCoord::new(2, 4, 0).is_err());
        assert!(TileCoord::new(2, 3, 3).is_ok());
    }
}
