use axum::{extract::DefaultBodyLimit, middleware, Router};
use std::path::Path;
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::auth::middleware::JwtSecret;
use crate::auth::phone;
use crate::state::AppState;
use crate::users::profile;
use crate::ws::handler as ws_handler;

/// Request body cap for the multipart profile-setup upload.
const MAX_UPLOAD_BYTES: usize = 6 * 1024 * 1024;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on the code endpoints
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5) // Allow burst of 5
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let cors = if state.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
                axum::http::header::ACCEPT,
            ])
    };

    // Phone code routes with rate limiting
    let auth_routes = Router::new()
        .route(
            "/api/auth/send-code",
            axum::routing::post(phone::send_code),
        )
        .route(
            "/api/auth/verify-code",
            axum::routing::post(phone::verify_code),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Authenticated routes (JWT required — Claims extractor validates token)
    let authenticated_routes = Router::new().route("/api/auth/me", axum::routing::get(phone::me));

    // Profile and presence-snapshot routes
    let user_routes = Router::new()
        .route(
            "/api/users/setup",
            axum::routing::post(profile::setup_profile),
        )
        .route(
            "/api/users/online",
            axum::routing::get(profile::online_users),
        )
        .route("/api/user/{id}", axum::routing::get(profile::get_profile))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    // WebSocket endpoint (identity is bound by the join event, not at upgrade)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health checks
    let health = Router::new()
        .route("/", axum::routing::get(root))
        .route("/health", axum::routing::get(health_check));

    // Stored avatars served statically
    let uploads_dir = Path::new(&state.data_dir).join("uploads");

    Router::new()
        .merge(auth_routes)
        .merge(authenticated_routes)
        .merge(user_routes)
        .merge(ws_routes)
        .merge(health)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Liveness probe matching what clients poll
async fn root() -> &'static str {
    "Chat Server API is running!"
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
