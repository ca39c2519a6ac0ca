use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quayside_api::{app, build_state, AuthSettings};
use quayside_core::GateRules;
use quayside_domain::{CapacityConfig, TerminalStore};
use quayside_store::{Config, DbClient, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quayside_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Quayside API on port {}", config.server.port);

    let store: Arc<dyn TerminalStore> = match config.database.driver.as_str() {
        "postgres" => {
            let db = DbClient::new(&config.database.url)
                .await
                .expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");
            Arc::new(PostgresStore::new(db.pool))
        }
        "memory" => Arc::new(MemoryStore::with_config(CapacityConfig::new(
            config.defaults.capacity,
            config.defaults.late_capacity,
        ))),
        other => panic!("Unknown database driver: {other}"),
    };

    let rules = GateRules {
        late_search_horizon_days: config.gate.late_search_horizon_days,
    };
    let auth = AuthSettings {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };

    let state = build_state(store, rules, auth);
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
