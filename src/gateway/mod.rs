//! Axum-based HTTP gateway in front of the authentication gate.
//!
//! Routes:
//! - `POST /register`: JSON `{username, password}` → 201 / 400 / 409
//! - `POST /login`: JSON `{username, password}` → 200 / 400 / 401
//! - `GET  /tasks`: HTTP Basic protected welcome page
//! - `GET  /health`: always public
//!
//! Request bodies are capped and requests time out (tower-http layers).

pub mod pages;

use crate::auth::{
    AuthError, AuthOutcome, Challenge, Gate, HashingPolicy, Identity, SqliteCredentialStore,
};
use crate::config::{Config, GatewayConfig, StorageConfig};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Body of every 401 produced by the Basic gate.
const UNAUTHORIZED_BODY: &str = "Authentication required";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<Gate>,
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let store = open_store(&config.storage)?;

    let policy = HashingPolicy::new(config.hashing.rounds);
    let realm = config.gateway.realm.clone();
    let workers = config.hashing.workers;
    // Building the gate computes one full-cost hash.
    let gate = tokio::task::spawn_blocking(move || {
        Gate::new(Arc::new(store), policy, &realm, workers)
    })
    .await
    .context("Gate construction panicked")??;

    let state = AppState {
        gate: Arc::new(gate),
    };
    let app = build_router(state, &config.gateway);

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        rounds = policy.rounds(),
        hash_workers = workers,
        "Gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// Open the credential database and make sure it can be read before serving.
fn open_store(storage: &StorageConfig) -> Result<SqliteCredentialStore> {
    let path = storage.db_path.display();
    let store = SqliteCredentialStore::open(&storage.db_path, storage.pool_size)
        .with_context(|| format!("Failed to open credential store at {path}"))?;
    let users = store
        .user_count()
        .with_context(|| format!("Failed to read credential store at {path}"))?;
    tracing::info!(path = %path, users, "Credential store ready");
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Build the router with body-limit and timeout middleware.
pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    let protected = Router::new()
        .route("/tasks", get(handle_tasks))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .route("/register", post(handle_register))
        .route("/login", post(handle_login))
        .merge(protected)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
}

// ══════════════════════════════════════════════════════════════════════════════
// BASIC AUTH MIDDLEWARE
// ══════════════════════════════════════════════════════════════════════════════

/// Run the gate on the `Authorization` header. Verified requests continue
/// with an [`Identity`] extension; everything else gets the same 401.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // A header that is not visible ASCII is malformed, not missing.
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_owned());

    match state.gate.authenticate(authorization.as_deref()).await {
        Ok(AuthOutcome::Verified(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(AuthOutcome::Rejected(challenge)) => unauthorized(&challenge),
        Err(e) => error_response(&e).into_response(),
    }
}

fn unauthorized(challenge: &Challenge) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge.header_value())],
        UNAUTHORIZED_BODY,
    )
        .into_response()
}

// ══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for JSON handlers (avoids `impl IntoResponse` inference issues).
type AuthResponse = (StatusCode, Json<serde_json::Value>);

/// Request body for registration and login. Both fields are required.
#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

fn json_error(status: StatusCode, message: &str) -> AuthResponse {
    (status, Json(serde_json::json!({ "error": message })))
}

fn bad_request(rejection: &JsonRejection) -> AuthResponse {
    json_error(
        StatusCode::BAD_REQUEST,
        &format!("Invalid request: {}", rejection.body_text()),
    )
}

/// Map gate failures to status codes. Internal details stay in the logs.
fn error_response(err: &AuthError) -> AuthResponse {
    match err {
        AuthError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        AuthError::DuplicateUsername => {
            json_error(StatusCode::CONFLICT, "Username is already registered")
        }
        AuthError::StorageUnavailable(detail) => {
            tracing::error!("Credential storage unavailable: {detail}");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Credential storage unavailable",
            )
        }
        AuthError::Hashing(detail) => {
            tracing::error!("Password hashing failed: {detail}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// GET /health: always public
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /register: create a new user account.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> AuthResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_request(&e),
    };

    match state.gate.register(&body.username, &body.password).await {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "status": "registered",
                "user_id": user_id,
            })),
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /login: verify credentials without issuing any session.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_request(&e).into_response(),
    };

    match state.gate.login(&body.username, &body.password).await {
        Ok(AuthOutcome::Verified(identity)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "authenticated",
                "user_id": identity.user_id,
                "username": identity.username,
            })),
        )
            .into_response(),
        Ok(AuthOutcome::Rejected(challenge)) => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, challenge.header_value())],
            Json(serde_json::json!({ "error": "Invalid username or password" })),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /tasks: protected welcome page.
async fn handle_tasks(Extension(identity): Extension<Identity>) -> Html<String> {
    Html(pages::render_welcome_page(&identity))
}
