//! Matchday board binary entrypoint wiring the tree store, board session, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use matchday_board::{
    config::{AppConfig, StoreBackend},
    dao::tree_store::{TreeStore, memory::MemoryTreeStore},
    routes,
    state::{AppState, SharedState, clock::SystemClock},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = build_store(StoreBackend::from_env()).await?;
    let app_state = AppState::new(store, Arc::new(SystemClock), config.session_settings());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Open the configured tree store.
async fn build_store(backend: StoreBackend) -> anyhow::Result<Arc<dyn TreeStore>> {
    match backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store; the board is not shared between server instances");
            Ok(Arc::new(MemoryTreeStore::new()))
        }
        StoreBackend::Firebase => connect_firebase().await,
    }
}

#[cfg(feature = "firebase-store")]
async fn connect_firebase() -> anyhow::Result<Arc<dyn TreeStore>> {
    use matchday_board::dao::tree_store::firebase::{FirebaseConfig, FirebaseTreeStore};

    let config = FirebaseConfig::from_env().context("reading Firebase configuration")?;
    let store = FirebaseTreeStore::connect(config)
        .await
        .context("connecting to Firebase")?;
    info!("connected to Firebase Realtime Database");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "firebase-store"))]
async fn connect_firebase() -> anyhow::Result<Arc<dyn TreeStore>> {
    anyhow::bail!("firebase store requested but the `firebase-store` feature is disabled")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
