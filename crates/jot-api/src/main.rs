//! jot-api - HTTP API server for jot

mod auth;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use jot_core::{
    CreateLabelRequest, CreateNoteRequest, CreateUserRequest, LabelRepository, ListNotesRequest,
    NotePatch, NoteRepository, RetentionWindow, UserPublic, UserRepository,
};
use jot_db::Database;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Global rate limiter type (direct quota, no keyed bucketing for a
/// personal server).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Absolute URL prefix used when rendering share links.
    base_url: String,
    /// How long trashed notes remain restorable.
    retention: RetentionWindow,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "jot_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jot_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("jot-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:jot.db".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    // Share links are rendered against this prefix.
    let base_url = std::env::var("PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("http://{}:{}", host, port));

    // Trash retention window in seconds (the reference behavior is an
    // unusually short 30 seconds; keep it configurable).
    let retention_secs: i64 = std::env::var("TRASH_RETENTION_SECS")
        .unwrap_or_else(|_| jot_core::lifecycle::DEFAULT_RETENTION_SECS.to_string())
        .parse()
        .unwrap_or(jot_core::lifecycle::DEFAULT_RETENTION_SECS);

    // Rate limiting configuration (generous for a personal server)
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60 = 1 minute)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    // Create app state
    let state = AppState {
        db,
        base_url,
        retention: RetentionWindow::from_secs(retention_secs),
        rate_limiter,
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full application router with middleware layers.
fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Accounts
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // Notes CRUD and lifecycle
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/trash", get(list_trash))
        .route("/notes/cleanup", post(cleanup_notes))
        .route(
            "/notes/:id",
            get(get_note)
                .put(update_note)
                .patch(patch_note)
                .delete(delete_note),
        )
        // Labels
        .route("/labels", get(list_labels).post(create_label))
        // Share capability
        .route("/shared/:token", get(get_shared_note))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct RegisterBody {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    let email = non_empty(body.email)
        .ok_or_else(|| ApiError::BadRequest("All fields are required".to_string()))?;
    let password = non_empty(body.password)
        .ok_or_else(|| ApiError::BadRequest("All fields are required".to_string()))?;
    let name = non_empty(body.name)
        .ok_or_else(|| ApiError::BadRequest("All fields are required".to_string()))?;

    let password_hash = auth::hash_password(&password)?;
    let user = state
        .db
        .users
        .create(CreateUserRequest {
            email,
            password_hash,
            name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Registration successful",
            "user": user,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let email = non_empty(body.email)
        .ok_or_else(|| ApiError::BadRequest("Email and password are required".to_string()))?;
    let password = non_empty(body.password)
        .ok_or_else(|| ApiError::BadRequest("Email and password are required".to_string()))?;

    let user = state
        .db
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    if !auth::verify_password(&password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Incorrect password".to_string()));
    }

    Ok(Json(serde_json::json!({
        "message": "Login successful",
        "user": UserPublic::from(user),
    })))
}

/// Treat missing and blank strings the same way: absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// NOTE HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListNotesQuery {
    #[serde(rename = "userId")]
    user_id: Option<Uuid>,
    search: Option<String>,
    archived: Option<bool>,
}

async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let notes = state
        .db
        .notes
        .list(ListNotesRequest {
            user_id,
            search: query.search,
            archived: query.archived,
        })
        .await?;

    Ok(Json(serde_json::json!({ "notes": notes })))
}

#[derive(Debug, Deserialize)]
struct CreateNoteBody {
    title: Option<String>,
    content: Option<String>,
    labels: Option<Vec<String>>,
    #[serde(rename = "userId")]
    user_id: Option<Uuid>,
}

async fn create_note(
    State(state): State<AppState>,
    Json(body): Json<CreateNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let content = non_empty(body.content)
        .ok_or_else(|| ApiError::BadRequest("Content and userId are required".to_string()))?;
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::BadRequest("Content and userId are required".to_string()))?;

    if !state.db.users.exists(user_id).await? {
        return Err(ApiError::BadRequest("Unknown user".to_string()));
    }

    let note = state
        .db
        .notes
        .insert(CreateNoteRequest {
            title: body.title,
            content,
            labels: body.labels,
            user_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Note created",
            "note": note,
        })),
    ))
}

async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.db.notes.fetch(id).await?;
    Ok(Json(serde_json::json!({ "note": note })))
}

#[derive(Debug, Deserialize)]
struct UpdateNoteBody {
    title: Option<String>,
    content: Option<String>,
    is_archived: Option<bool>,
    is_shared: Option<bool>,
    labels: Option<Vec<String>>,
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = NotePatch {
        title: body.title,
        content: body.content,
        is_archived: body.is_archived,
        is_shared: body.is_shared,
        labels: body.labels,
    };

    let note = state.db.notes.update(id, patch).await?;

    let share_url = note
        .share_token
        .as_ref()
        .map(|token| format!("{}/shared/{}", state.base_url, token));

    let mut response = serde_json::json!({
        "message": "Note updated",
        "note": note,
    });
    if let Some(url) = share_url {
        response["share_url"] = serde_json::Value::String(url);
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct PatchNoteBody {
    action: Option<String>,
}

async fn patch_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    match body.action.as_deref() {
        Some("restore") => {
            let note = state.db.notes.restore(id).await?;
            Ok(Json(serde_json::json!({
                "message": "Note restored",
                "note": note,
            })))
        }
        _ => Err(ApiError::BadRequest("Invalid action".to_string())),
    }
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.notes.soft_delete(id).await?;
    Ok(Json(serde_json::json!({
        "message": "Note moved to trash",
    })))
}

#[derive(Debug, Deserialize)]
struct TrashQuery {
    #[serde(rename = "userId")]
    user_id: Option<Uuid>,
}

async fn list_trash(
    State(state): State<AppState>,
    Query(query): Query<TrashQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let notes = state.db.notes.list_trash(user_id, state.retention).await?;
    Ok(Json(serde_json::json!({ "notes": notes })))
}

/// Sweep expired trash across all users. Invoked opportunistically by
/// clients; safe to call concurrently and with nothing to do.
async fn cleanup_notes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cleaned = state.db.notes.purge_expired(state.retention).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Cleaned up {} expired notes", cleaned),
        "cleaned_count": cleaned,
    })))
}

// =============================================================================
// LABEL HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListLabelsQuery {
    #[serde(rename = "userId")]
    user_id: Option<Uuid>,
}

async fn list_labels(
    State(state): State<AppState>,
    Query(query): Query<ListLabelsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let labels = state.db.labels.list_for_user(user_id).await?;
    Ok(Json(serde_json::json!({ "labels": labels })))
}

#[derive(Debug, Deserialize)]
struct CreateLabelBody {
    name: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<Uuid>,
}

async fn create_label(
    State(state): State<AppState>,
    Json(body): Json<CreateLabelBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = non_empty(body.name)
        .ok_or_else(|| ApiError::BadRequest("Label name and userId are required".to_string()))?;
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::BadRequest("Label name and userId are required".to_string()))?;

    let label = state
        .db
        .labels
        .create(CreateLabelRequest { name, user_id })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Label created",
            "label": label,
        })),
    ))
}

// =============================================================================
// SHARE HANDLER
// =============================================================================

async fn get_shared_note(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.db.notes.fetch_shared(&token).await?;
    Ok(Json(serde_json::json!({ "note": note })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(jot_core::Error),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<jot_core::Error> for ApiError {
    fn from(err: jot_core::Error) -> Self {
        match &err {
            jot_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            jot_core::Error::NoteNotFound(id) => {
                ApiError::NotFound(format!("Note {} not found", id))
            }
            jot_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            jot_core::Error::Conflict(msg) => ApiError::Conflict(msg.clone()),
            jot_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            jot_core::Error::Database(sqlx_err) => {
                // Share-token collisions land here; the UNIQUE constraint
                // is the backstop for the no-retry token generator.
                if sqlx_err.to_string().contains("UNIQUE constraint failed") {
                    return ApiError::Conflict("Resource already exists".to_string());
                }
                ApiError::Database(err)
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => {
                // Internals are logged, never surfaced.
                error!(subsystem = "api", error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use serde_json::{json, Value};

    /// Spin up the full router over a fresh in-memory database.
    /// Returns the base URL (e.g., "http://127.0.0.1:PORT").
    async fn spawn_test_server_with(retention: RetentionWindow) -> (String, Client) {
        let db = Database::connect_memory().await.expect("connect test db");
        db.migrate().await.expect("migrate test db");

        let state = AppState {
            db,
            base_url: "http://localhost:3000".to_string(),
            retention,
            rate_limiter: None,
        };
        let router = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        // Give server a moment to start
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        (format!("http://{}", addr), Client::new())
    }

    async fn spawn_test_server() -> (String, Client) {
        spawn_test_server_with(RetentionWindow::from_secs(30)).await
    }

    /// Register a user and return its public JSON projection.
    async fn register_user(base: &str, client: &Client, email: &str) -> Value {
        let resp = client
            .post(format!("{}/auth/register", base))
            .json(&json!({
                "email": email,
                "password": "hunter2",
                "name": "Test User",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        resp.json::<Value>().await.unwrap()["user"].clone()
    }

    async fn create_note(base: &str, client: &Client, user_id: &str, content: &str) -> Value {
        let resp = client
            .post(format!("{}/notes", base))
            .json(&json!({ "content": content, "userId": user_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        resp.json::<Value>().await.unwrap()["note"].clone()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (base, client) = spawn_test_server().await;
        let resp = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_register_returns_public_user() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        assert_eq!(user["email"], "a@example.com");
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_register_missing_field_is_400() {
        let (base, client) = spawn_test_server().await;
        let resp = client
            .post(format!("{}/auth/register", base))
            .json(&json!({ "email": "a@example.com", "password": "hunter2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_409() {
        let (base, client) = spawn_test_server().await;
        register_user(&base, &client, "a@example.com").await;
        let resp = client
            .post(format!("{}/auth/register", base))
            .json(&json!({
                "email": "a@example.com",
                "password": "other",
                "name": "Clone",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let (base, client) = spawn_test_server().await;
        register_user(&base, &client, "a@example.com").await;

        let resp = client
            .post(format!("{}/auth/login", base))
            .json(&json!({ "email": "a@example.com", "password": "hunter2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert!(body["user"].get("password_hash").is_none());

        // Wrong password and unknown user both come back 401.
        let resp = client
            .post(format!("{}/auth/login", base))
            .json(&json!({ "email": "a@example.com", "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .post(format!("{}/auth/login", base))
            .json(&json!({ "email": "ghost@example.com", "password": "hunter2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn test_list_notes_requires_user_id() {
        let (base, client) = spawn_test_server().await;
        let resp = client.get(format!("{}/notes", base)).send().await.unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_create_note_requires_content() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let resp = client
            .post(format!("{}/notes", base))
            .json(&json!({ "content": "   ", "userId": user["id"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_note_crud_flow() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let user_id = user["id"].as_str().unwrap();

        let note = create_note(&base, &client, user_id, "buy milk").await;
        let note_id = note["id"].as_str().unwrap();
        assert_eq!(note["title"], "");
        assert_eq!(note["labels"], json!([]));

        let resp = client
            .get(format!("{}/notes?userId={}", base, user_id))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["notes"].as_array().unwrap().len(), 1);

        let resp = client
            .get(format!("{}/notes/{}", base, note_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .put(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "title": "Groceries", "labels": ["errands"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["note"]["title"], "Groceries");
        assert_eq!(body["note"]["content"], "buy milk");
        assert_eq!(body["note"]["labels"], json!(["errands"]));
        assert!(body.get("share_url").is_none());

        let resp = client
            .get(format!("{}/notes/{}", base, Uuid::new_v4()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_search_notes_via_http() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let user_id = user["id"].as_str().unwrap();
        create_note(&base, &client, user_id, "Buy milk").await;
        create_note(&base, &client, user_id, "Call mom").await;

        let resp = client
            .get(format!("{}/notes?userId={}&search=MILK", base, user_id))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        let notes = body["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["content"], "Buy milk");
    }

    #[tokio::test]
    async fn test_trash_and_restore_flow() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let user_id = user["id"].as_str().unwrap();
        let note = create_note(&base, &client, user_id, "buy milk").await;
        let note_id = note["id"].as_str().unwrap();

        let resp = client
            .delete(format!("{}/notes/{}", base, note_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // Gone from the active listing, visible in trash with the clock
        // still nearly full.
        let body: Value = client
            .get(format!("{}/notes?userId={}", base, user_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["notes"].as_array().unwrap().is_empty());

        let body: Value = client
            .get(format!("{}/notes/trash?userId={}", base, user_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let trash = body["notes"].as_array().unwrap();
        assert_eq!(trash.len(), 1);
        let time_left = trash[0]["time_left"].as_i64().unwrap();
        assert!((29..=30).contains(&time_left));

        // A second delete reports the missing-or-already-deleted class.
        let resp = client
            .delete(format!("{}/notes/{}", base, note_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        // Restore brings it back and empties the trash.
        let resp = client
            .patch(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "action": "restore" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = client
            .get(format!("{}/notes?userId={}", base, user_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["notes"].as_array().unwrap().len(), 1);

        let body: Value = client
            .get(format!("{}/notes/trash?userId={}", base, user_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["notes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_of_active_note_is_404() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let note = create_note(&base, &client, user["id"].as_str().unwrap(), "note").await;

        let resp = client
            .patch(format!("{}/notes/{}", base, note["id"].as_str().unwrap()))
            .json(&json!({ "action": "restore" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_patch_unknown_action_is_400() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let note = create_note(&base, &client, user["id"].as_str().unwrap(), "note").await;

        let resp = client
            .patch(format!("{}/notes/{}", base, note["id"].as_str().unwrap()))
            .json(&json!({ "action": "explode" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_cleanup_purges_expired_notes() {
        // Zero-length retention expires notes the instant they are
        // deleted, so the purge path is observable without sleeping.
        let (base, client) = spawn_test_server_with(RetentionWindow::from_secs(0)).await;
        let user = register_user(&base, &client, "a@example.com").await;
        let user_id = user["id"].as_str().unwrap();
        let note = create_note(&base, &client, user_id, "doomed").await;
        let note_id = note["id"].as_str().unwrap();

        client
            .delete(format!("{}/notes/{}", base, note_id))
            .send()
            .await
            .unwrap();

        // Already invisible in trash, even before the sweep.
        let body: Value = client
            .get(format!("{}/notes/trash?userId={}", base, user_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["notes"].as_array().unwrap().is_empty());

        let resp = client
            .post(format!("{}/notes/cleanup", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert!(body["cleaned_count"].as_u64().unwrap() >= 1);

        // Permanently unfetchable, and restore finds nothing either.
        let resp = client
            .get(format!("{}/notes/{}", base, note_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let resp = client
            .patch(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "action": "restore" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_cleanup_with_nothing_expired() {
        let (base, client) = spawn_test_server().await;
        let resp = client
            .post(format!("{}/notes/cleanup", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["cleaned_count"].as_u64().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_share_flow() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let note = create_note(&base, &client, user["id"].as_str().unwrap(), "shared note").await;
        let note_id = note["id"].as_str().unwrap();

        let resp = client
            .put(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "is_shared": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let share_url = body["share_url"].as_str().unwrap();
        let token = share_url.rsplit('/').next().unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        let resp = client
            .get(format!("{}/shared/{}", base, token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["note"]["content"], "shared note");
        assert_eq!(body["note"]["owner_name"], "Test User");
        assert!(body["note"].get("user_id").is_none());
        assert!(body["note"].get("share_token").is_none());

        // Unshare kills the link; re-sharing mints a different token.
        client
            .put(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "is_shared": false }))
            .send()
            .await
            .unwrap();
        let resp = client
            .get(format!("{}/shared/{}", base, token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let body: Value = client
            .put(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "is_shared": true }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let second_url = body["share_url"].as_str().unwrap();
        assert_ne!(second_url, share_url);
    }

    #[tokio::test]
    async fn test_update_on_trashed_note_is_404() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let note = create_note(&base, &client, user["id"].as_str().unwrap(), "note").await;
        let note_id = note["id"].as_str().unwrap();

        client
            .delete(format!("{}/notes/{}", base, note_id))
            .send()
            .await
            .unwrap();

        let resp = client
            .put(format!("{}/notes/{}", base, note_id))
            .json(&json!({ "content": "rewrite" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_label_endpoints() {
        let (base, client) = spawn_test_server().await;
        let user = register_user(&base, &client, "a@example.com").await;
        let user_id = user["id"].as_str().unwrap();

        let resp = client
            .post(format!("{}/labels", base))
            .json(&json!({ "userId": user_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{}/labels", base))
            .json(&json!({ "name": "work", "userId": user_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let resp = client
            .post(format!("{}/labels", base))
            .json(&json!({ "name": "work", "userId": user_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        let body: Value = client
            .get(format!("{}/labels?userId={}", base, user_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let labels = body["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0]["name"], "work");
    }

    #[tokio::test]
    async fn test_unknown_share_token_is_404() {
        let (base, client) = spawn_test_server().await;
        let resp = client
            .get(format!("{}/shared/{}", base, "0".repeat(32)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}
