//! HTTP/WebSocket service surface.
//!
//! Wires the viewport pipeline to the outside world:
//!
//! * `GET /health` - liveness probe
//! * `OPTIONS /api/camera-state` - CORS preflight (204)
//! * `POST /api/camera-state` - one camera-state round trip
//! * `GET /ws/camera` - WebSocket stream of camera-state envelopes,
//!   with an optional binary frame for the subset bytes
//!
//! Every response carries permissive CORS headers. Each connection is
//! served by its own task; the camera snapshot is the only shared
//! mutable state and is written before the response is emitted.

mod handlers;
mod ws;

pub use ws::{outbound_frames, WsFrame};

use crate::bvh::Bvh;
use crate::camera::CameraStore;
use crate::config::Settings;
use crate::corpus::FeatureCorpus;
use crate::ingest;
use crate::pmtiles::ArchiveReader;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpSocket;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Listen backlog for the accept socket.
const LISTEN_BACKLOG: u32 = 16;

/// Cap on a single WebSocket message.
pub const MAX_WS_MESSAGE_BYTES: usize = 1 << 20;

/// Shared per-process state handed to every handler.
///
/// The corpus and index are built once at startup and immutable
/// thereafter; the camera store is the only mutable singleton.
#[derive(Clone)]
pub struct AppState {
    pub corpus: Arc<FeatureCorpus>,
    pub bvh: Arc<Bvh>,
    pub reader: Option<Arc<ArchiveReader>>,
    pub camera: Arc<CameraStore>,
}

impl AppState {
    pub fn new(corpus: FeatureCorpus, bvh: Bvh, reader: Option<ArchiveReader>) -> Self {
        Self {
            corpus: Arc::new(corpus),
            bvh: Arc::new(bvh),
            reader: reader.map(Arc::new),
            camera: Arc::new(CameraStore::new()),
        }
    }

    /// Build the process state from settings: ingest the configured
    /// datasets, index them, and open the source archive.
    ///
    /// Ingest and archive failures are logged and degrade the state
    /// (empty index, closed reader) rather than failing startup; the
    /// caller decides whether a missing archive is fatal.
    pub fn build(settings: &Settings) -> Self {
        let threads = settings.effective_threads();

        let corpus = if settings.datasets.is_empty() {
            Default::default()
        } else {
            match ingest::ingest_paths(&settings.datasets, &settings.target_crs, threads) {
                Ok(corpus) => corpus,
                Err(err) => {
                    warn!(error = %err, "ingest failed, serving with an empty corpus");
                    Default::default()
                }
            }
        };

        let bvh = Bvh::build_with_threads(&corpus, threads);
        info!(
            features = corpus.record_count(),
            nodes = bvh.node_count(),
            "feature index built"
        );

        let reader = match &settings.source_path {
            Some(path) => match ArchiveReader::open(path) {
                Ok(reader) => {
                    info!(path = %path.display(), bytes = reader.byte_len(), "tile archive ready");
                    Some(reader)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to open tile archive");
                    None
                }
            },
            None => None,
        };

        Self::new(corpus, bvh, reader)
    }
}

/// Build the service router.
///
/// Every method/path combination outside the four supported ones
/// answers with the same 400 JSON error body; the per-route
/// fallbacks cover method mismatches on known paths, the router
/// fallback covers unknown paths.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(handlers::health).fallback(handlers::unsupported),
        )
        .route(
            "/api/camera-state",
            post(handlers::camera_state)
                .options(handlers::camera_state_preflight)
                .fallback(handlers::unsupported),
        )
        .route(
            "/ws/camera",
            get(ws::ws_camera).fallback(handlers::unsupported),
        )
        .fallback(handlers::unsupported)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(handlers::cors))
        .with_state(state)
}

/// Bind the listen socket and serve until the process exits.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(LISTEN_BACKLOG)?;

    info!(%addr, "listening");
    axum::serve(listener, router(state)).await
}
