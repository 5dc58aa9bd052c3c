//! Tilescope - Camera-driven vector tile subset streaming
//!
//! This library provides the core functionality for serving small,
//! self-contained vector tile archives to an interactive map client
//! driven by a moving camera.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides the wired-up
//! HTTP/WebSocket surface:
//!
//! ```ignore
//! use tilescope::config::Settings;
//! use tilescope::service::{AppState, serve};
//!
//! let settings = Settings::from_env();
//! let state = AppState::build(&settings);
//!
//! // Serve /health, /api/camera-state and /ws/camera
//! serve(state, settings.listen_port).await?;
//! ```
//!
//! The lower layers are usable on their own: [`corpus`] and [`bvh`]
//! for spatial indexing of ingested features, [`pmtiles`] for the
//! tile archive codec, and [`viewport`] for the request pipeline.

pub mod bvh;
pub mod camera;
pub mod config;
pub mod coord;
pub mod corpus;
pub mod geom;
pub mod ingest;
pub mod pmtiles;
pub mod service;
pub mod viewport;

/// Version of the Tilescope library and server.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
