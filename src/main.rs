use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, extract::State, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use copronomie_api::config;
use copronomie_api::identity::PgIdentityProvider;
use copronomie_api::middleware::{request_gate, require_auth};
use copronomie_api::state::AppState;
use copronomie_api::store::PgRecordStore;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Copronomie API in {:?} mode", config.environment);

    // Lazy pool: the server starts and reports degraded health while the
    // database is unreachable.
    let store = PgRecordStore::connect_lazy()
        .unwrap_or_else(|e| panic!("failed to initialize record store: {}", e));
    let provider = PgIdentityProvider::new(store.pool());
    let state = AppState::new(Arc::new(store), Arc::new(provider));

    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("COPRONOMIE_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Copronomie API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Public auth routes (allow-listed in the gate config)
        .merge(auth_public_routes())
        // Protected API behind the authenticated handler wrapper
        .merge(protected_routes(state.clone()))
        // Request gate in front of everything that is not allow-listed
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_gate,
        ))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use axum::routing::post;
    use copronomie_api::handlers::public::auth;

    Router::new()
        .route("/api/auth/signup", post(auth::signup_post))
        .route("/api/auth/signin", post(auth::signin_post))
        .route("/api/auth/signout", post(auth::signout_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use axum::routing::post;
    use copronomie_api::handlers::protected::{auth, devis};

    // Body limit sized for the PDF validation cap plus slack, so oversized
    // uploads are rejected by validate() with a clear error.
    let body_limit = config::config().extraction.max_pdf_bytes + 1024 * 1024;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/devis/analyze", post(devis::analyze_post))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(axum::middleware::from_fn_with_state(state, require_auth))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "name": "Copronomie API",
        "version": version,
        "description": "Quote management backend for property organizations",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth": "/api/auth/signup, /api/auth/signin, /api/auth/signout (public)",
            "whoami": "/api/auth/whoami (protected)",
            "devis": "/api/devis/analyze (protected)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                axum::response::Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
