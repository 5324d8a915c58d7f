use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use relay_chat_service::{
    config::Config,
    error::AppError,
    logging,
    relay::{HeartbeatConfig, HeartbeatMonitor, MessageRouter, RoomDirectory, SessionRegistry},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = Config::from_env()?;

    // All relay state is in-memory: empty at startup, drained on shutdown.
    let sessions = SessionRegistry::new();
    let rooms = RoomDirectory::new();
    let router = Arc::new(MessageRouter::new(
        sessions.clone(),
        rooms.clone(),
        cfg.decode_policy,
    ));

    let monitor = HeartbeatMonitor::start(
        sessions,
        rooms,
        HeartbeatConfig {
            interval: cfg.heartbeat_interval,
            liveness_window: cfg.liveness_window,
        },
    );

    let state = AppState {
        router: router.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting relay-chat-service");

    let server = HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind: {e}")))?
    .run();

    let result = server.await;

    // Stop probing first, then close whatever is still connected.
    monitor.stop().await;
    router.shutdown().await;

    result.map_err(|e| AppError::StartServer(format!("run: {e}")))
}
