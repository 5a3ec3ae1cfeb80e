use minddigit::room::{
    repository::{InMemoryPlayerRepository, InMemoryRoomRepository},
    start_cleanup_task, GameStore, RoomService,
};
use minddigit::{AppState, ServerConfig};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minddigit=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    info!(
        min_digits = config.game.code_rules.min_digits,
        max_digits = config.game.code_rules.max_digits,
        digit_policy = %config.game.digit_policy,
        first_turn = %config.game.first_turn,
        "Starting Bulls and Cows game server"
    );

    // In-memory backends; any RoomRepository / PlayerRepository can be swapped in here
    let room_repository = Arc::new(InMemoryRoomRepository::new(config.store.room_ttl));
    let player_repository = Arc::new(InMemoryPlayerRepository::new(config.store.player_ttl));
    let store = Arc::new(GameStore::new(
        room_repository,
        player_repository,
        config.store.clone(),
    ));
    let room_service = Arc::new(RoomService::new(store, config.game.clone()));

    tokio::spawn(start_cleanup_task(
        Arc::clone(&room_service),
        config.cleanup.clone(),
    ));

    let app = minddigit::router()
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(room_service));

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!(bind_addr = %config.bind_addr, "Server running");
    axum::serve(listener, app).await
}
