//! Request and response envelope types.
//!
//! Wire-format models for the camera-state endpoint and the
//! WebSocket frames, matching the JSON contract exactly.

use crate::camera::CameraMode;
use serde::{Deserialize, Serialize};

/// Geographic viewport bounds in degrees.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// Canonical form: west <= east and south <= north.
    pub fn canonical(mut self) -> Self {
        if self.east < self.west {
            std::mem::swap(&mut self.east, &mut self.west);
        }
        if self.south > self.north {
            std::mem::swap(&mut self.south, &mut self.north);
        }
        self
    }
}

/// The incoming camera-state envelope (POST body or WebSocket text
/// frame).
#[derive(Debug, Clone, Deserialize)]
pub struct CameraRequest {
    pub bounds: GeoBounds,
    #[serde(rename = "metersPerPixel")]
    pub meters_per_pixel: f64,
    #[serde(default)]
    pub zoom: f64,
    #[serde(default)]
    pub mode: Option<String>,
    /// WebSocket only: request the subset bytes as a binary frame.
    #[serde(rename = "acceptBinary", default)]
    pub accept_binary: bool,
}

impl CameraRequest {
    /// Parse the optional mode string; anything but `THREE_D` is 2D.
    pub fn camera_mode(&self) -> CameraMode {
        match self.mode.as_deref() {
            Some("THREE_D") => CameraMode::ThreeD,
            _ => CameraMode::TwoD,
        }
    }
}

/// Viewport bounds echoed back in CRS meters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// The embedded subset archive description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetEnvelope {
    pub zoom: u8,
    pub tile_count: usize,
    pub encoding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// The outgoing camera-state envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraResponse {
    pub status: String,
    pub mode: String,
    pub visible_count: usize,
    pub view_bounds: ViewBounds,
    pub detail_enabled: bool,
    pub detail_factor: f64,
    pub pmtiles_subset: Option<SubsetEnvelope>,
}

/// Wire name of a camera mode.
pub fn mode_name(mode: CameraMode) -> &'static str {
    match mode {
        CameraMode::TwoD => "TWO_D",
        CameraMode::ThreeD => "THREE_D",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_full_envelope() {
        let req: CameraRequest = serde_json::from_str(
            r#"{"bounds":{"west":-74.1,"south":40.6,"east":-73.9,"north":40.8},
                "metersPerPixel":2.4,"zoom":15.0,"mode":"THREE_D","acceptBinary":true}"#,
        )
        .unwrap();
        assert_eq!(req.camera_mode(), crate::camera::CameraMode::ThreeD);
        assert_eq!(req.zoom, 15.0);
        assert!(req.accept_binary);
    }

    #[test]
    fn test_request_optional_fields_default() {
        let req: CameraRequest = serde_json::from_str(
            r#"{"bounds":{"west":0,"south":0,"east":1,"north":1},"metersPerPixel":1.0}"#,
        )
        .unwrap();
        assert_eq!(req.zoom, 0.0);
        assert!(!req.accept_binary);
        assert_eq!(req.camera_mode(), crate::camera::CameraMode::TwoD);
    }

    #[test]
    fn test_unknown_mode_falls_back_to_two_d() {
        let req: CameraRequest = serde_json::from_str(
            r#"{"bounds":{"west":0,"south":0,"east":1,"north":1},
                "metersPerPixel":1.0,"mode":"FOUR_D"}"#,
        )
        .unwrap();
        assert_eq!(req.camera_mode(), crate::camera::CameraMode::TwoD);
    }

    #[test]
    fn test_missing_bounds_is_an_error() {
        let result: Result<CameraRequest, _> =
            serde_json::from_str(r#"{"metersPerPixel":1.0,"zoom":5.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_canonical_swaps_inverted_bounds() {
        let b = GeoBounds {
            west: 10.0,
            south: 50.0,
            east: -10.0,
            north: 40.0,
        }
        .canonical();
        assert_eq!(b.west, -10.0);
        assert_eq!(b.east, 10.0);
        assert_eq!(b.south, 40.0);
        assert_eq!(b.north, 50.0);
    }

    #[test]
    fn test_subset_data_omitted_when_binary() {
        let subset = SubsetEnvelope {
            zoom: 15,
            tile_count: 4,
            encoding: "binary".to_string(),
            data: None,
        };
        let json = serde_json::to_string(&subset).unwrap();
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_response_serializes_null_subset() {
        let resp = CameraResponse {
            status: "ok".to_string(),
            mode: "TWO_D".to_string(),
            visible_count: 0,
            view_bounds: ViewBounds {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 1.0,
                max_y: 1.0,
            },
            detail_enabled: false,
            detail_factor: 0.0,
            pmtiles_subset: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"pmtiles_subset\":null"));
    }
}
