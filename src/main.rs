//! BD Pipeline API - Business Development Pipeline Engine
//!
//! Tracks deals and contacts through fixed stage funnels and keeps a
//! prioritized roadmap of business-development work.
//!
//! - Deals are read from and written to a remote record service when
//!   `PIPELINE_API_URL` is set, otherwise from the local record store.
//! - Contacts and roadmap items always live in the local record store
//!   (`DATA_DIR`, or process memory when unset).
//! - Every failed read falls back to built-in seed data; every failed write
//!   keeps the local change and is reported as unsynced.

mod config;
mod error;
mod models;
mod pipeline;
mod remote;
mod roadmap;
mod routes;
mod seed;
mod state;
mod store;
mod sync;

use crate::config::Settings;
use crate::remote::{HttpRemote, PipelineRemote, StoreRemote};
use crate::routes::create_router;
use crate::seed::SeedData;
use crate::state::AppState;
use crate::store::{JsonFileStore, MemoryStore, RecordStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before tracing so LOG_FORMAT from .env applies
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting BD Pipeline API...");
    info!("📋 Configuration loaded successfully");

    let store = init_store(&settings).await?;
    let deal_remote = init_remote(&settings, store.clone())?;

    let state = Arc::new(AppState::new(store, deal_remote, SeedData::builtin(), &settings));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Funnels ───");
    info!("   GET  /api/funnels                              - Funnel catalogue");
    info!("   POST /api/normalize                            - Normalize a stage label");
    info!("");
    info!("   ─── Deals ───");
    info!("   GET  /api/deals/{{container}}                    - Stage board (?type=)");
    info!("   GET  /api/deals/{{container}}/summary            - Stage counts and totals");
    info!("   GET  /api/deals/{{container}}/records/{{id}}     - Record and next stages");
    info!("   POST /api/deals/{{container}}/records/{{id}}/advance - Guided advance");
    info!("   PUT  /api/deals/{{container}}/records/{{id}}/stage   - Manual override");
    info!("   POST /api/deals/{{container}}/resync             - Retry unsynced writes");
    info!("");
    info!("   ─── Contacts ───");
    info!("   GET  /api/contacts                             - Lifecycle board");
    info!("   POST /api/contacts/{{id}}/advance                - Guided advance");
    info!("   GET  /api/contacts/unsynced                    - Unsynced contact writes");
    info!("   POST /api/contacts/resync                      - Retry unsynced contact writes");
    info!("");
    info!("   ─── Roadmap ───");
    info!("   GET  /api/roadmap                              - Prioritized items (?phase=&status=)");
    info!("   GET  /api/roadmap/grouped                      - Items grouped by phase");
    info!("   POST /api/roadmap/{{id}}/cycle                   - Cycle item status");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging. `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bd_pipeline=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Open the record store: JSON files under `DATA_DIR`, or process memory
async fn init_store(settings: &Settings) -> anyhow::Result<Arc<dyn RecordStore>> {
    match settings.store.data_dir {
        Some(ref dir) => {
            let store = JsonFileStore::open(dir).await?;
            info!("💾 Record store: {}", store.dir().display());
            Ok(Arc::new(store))
        }
        None => {
            warn!("⚠️  DATA_DIR not set, records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Deal remote: the HTTP record service when configured, else the local store
fn init_remote(
    settings: &Settings,
    store: Arc<dyn RecordStore>,
) -> anyhow::Result<Arc<dyn PipelineRemote>> {
    match settings.remote.base_url {
        Some(ref base) => {
            let remote = HttpRemote::new(base.clone(), &settings.remote)?;
            info!(
                "🔗 Record service: {} (timeout {}s)",
                remote.base_url(),
                settings.remote.timeout_secs
            );
            Ok(Arc::new(remote))
        }
        None => {
            info!("🔗 PIPELINE_API_URL not set, deals are served from the record store");
            Ok(Arc::new(StoreRemote::new(store)))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
