// Framework bootstrap for the game server runtime.

use crate::domain::GameTuning;
use crate::frameworks::config;
use crate::interface_adapters::net::{health_handler, spawn_update_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{GameHandle, GameSettings};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tower_http::services::ServeDir;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();
    let static_dir = config::static_dir();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(&static_dir))
        .with_state(state);

    tracing::info!(%address, static_dir = %static_dir.display(), "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_addr(), config::http_port());

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let tuning = GameTuning::default();
    tracing::debug!(
        grid = tuning.board.grid_count,
        tick_ms = tuning.board.tick_period.as_millis() as u64,
        max_players = tuning.board.max_players,
        "game tuning loaded"
    );

    // The single authoritative world and its serializer.
    let game = GameHandle::spawn(GameSettings {
        input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
        broadcast_capacity: config::BROADCAST_CAPACITY,
        tuning,
    });
    spawn_update_serializer(&game);

    Arc::new(AppState {
        game,
        direct_channel_capacity: config::DIRECT_CHANNEL_CAPACITY,
    })
}
