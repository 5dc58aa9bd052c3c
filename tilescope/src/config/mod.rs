//! Runtime configuration.
//!
//! Settings resolve from the environment with built-in defaults; the
//! server binary layers CLI arguments on top.

mod settings;

pub use settings::{resolve_source_path, Settings, DEFAULT_LISTEN_PORT, SOURCE_PATH_ENV};
