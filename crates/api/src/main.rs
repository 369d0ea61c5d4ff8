//! SMSVault HTTP API server.
//!
//! Routes authenticate against the token issuer, then read or mutate a
//! user's message store. Bulk submissions go through the reconcile fold
//! and report partial success distinctly from total success or failure.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use auth::{hash_password, verify_password, AuthError, TokenIssuer, UserIdentity};
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use database::{message, user, Database, DatabaseError, ListFilter, Message, MessageStats};
use serde::{Deserialize, Serialize};
use sync_core::{
    normalize, reconcile, BatchOutcome, BatchReport, RawMessage, SyncError, ValidationError,
};
use tracing::{info, warn};

/// Processing deadline for one bulk request; items beyond it are reported
/// as skipped rather than left half-done.
const BULK_DEADLINE: Duration = Duration::from_secs(25);

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 64;

const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Clone)]
struct AppState {
    db: Database,
    tokens: Arc<TokenIssuer>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let addr = env::var("SMSVAULT_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let db_url = env::var("SMSVAULT_DB_URL").unwrap_or_else(|_| "sqlite:smsvault.db?mode=rwc".to_string());
    let token_secret = env::var("SMSVAULT_TOKEN_SECRET").unwrap_or_else(|_| {
        warn!("SMSVAULT_TOKEN_SECRET not set, using an insecure development secret");
        "smsvault-dev-secret".to_string()
    });
    let token_ttl = env::var("SMSVAULT_TOKEN_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24 * 3600);

    let db = Database::connect(&db_url).await.expect("database connection failed");
    db.migrate().await.expect("database migration failed");

    let state = AppState {
        db,
        tokens: Arc::new(TokenIssuer::new(&token_secret, Duration::from_secs(token_ttl))),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/messages", post(submit_message).get(list))
        .route("/messages/bulk", post(submit_bulk))
        .route("/messages/stats", get(stats))
        .route("/messages/:external_id", delete(delete_message))
        .with_state(state);

    let addr: SocketAddr = addr.parse().expect("Invalid SMSVAULT_ADDR");
    info!(%addr, "SMSVault API listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

// ---------------------------------------------------------------------------
// Response envelope

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn envelope<T: Serialize>(
    status: StatusCode,
    success: bool,
    message: impl Into<String>,
    data: Option<T>,
) -> Response {
    let body = Envelope {
        success,
        message: message.into(),
        data,
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Request/response shapes

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct PublicUser {
    id: i64,
    username: String,
    display_name: Option<String>,
}

impl From<database::User> for PublicUser {
    fn from(user: database::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthData {
    token: String,
    user: PublicUser,
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Serialize)]
struct BulkData {
    outcome: BatchOutcome,
    #[serde(flatten)]
    report: BatchReport,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    address: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListData {
    messages: Vec<Message>,
    total: i64,
    page: i64,
    page_size: i64,
}

#[derive(Debug, Serialize)]
struct Health {
    status: String,
}

// ---------------------------------------------------------------------------
// Handlers

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "username is too long (max {MAX_USERNAME_LENGTH})"
        )));
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let password_hash = hash_password(&payload.password)?;
    let created = user::create_user(
        state.db.pool(),
        username,
        &password_hash,
        payload.display_name.as_deref(),
    )
    .await?;

    info!(user_id = created.id, "user registered");
    let token = state.tokens.issue(created.id, &created.username)?;
    Ok(envelope(
        StatusCode::CREATED,
        true,
        "registered",
        Some(AuthData {
            token,
            user: created.into(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let account = match user::get_user_by_username(state.db.pool(), payload.username.trim()).await {
        Ok(account) => account,
        // Unknown user and wrong password must be indistinguishable.
        Err(DatabaseError::NotFound { .. }) => return Err(ApiError::Auth(AuthError::BadLogin)),
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&payload.password, &account.password_hash) {
        return Err(ApiError::Auth(AuthError::BadLogin));
    }

    let token = state.tokens.issue(account.id, &account.username)?;
    Ok(envelope(
        StatusCode::OK,
        true,
        "logged in",
        Some(AuthData {
            token,
            user: account.into(),
        }),
    ))
}

async fn submit_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RawMessage>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers)?;

    // A single-item submission fails the whole request on invalid input,
    // unlike bulk where validation errors are per-item.
    normalize(&payload).map_err(ApiError::Validation)?;

    let report = reconcile(&state.db, &state.db, identity.id, vec![payload], None).await?;
    if report.inserted == 1 {
        return Ok(envelope::<()>(
            StatusCode::CREATED,
            true,
            "message stored",
            None,
        ));
    }
    if report.duplicate == 1 {
        return Ok(envelope::<()>(
            StatusCode::OK,
            true,
            "duplicate message ignored",
            None,
        ));
    }
    // Normalization passed, so the only way here is a storage rejection.
    let code = report
        .errors
        .first()
        .map(|e| e.code.clone())
        .unwrap_or_else(|| "rejected".to_string());
    Err(ApiError::BadRequest(format!("message rejected: {code}")))
}

async fn submit_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BulkRequest>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers)?;

    let deadline = Instant::now() + BULK_DEADLINE;
    let report = reconcile(
        &state.db,
        &state.db,
        identity.id,
        payload.messages,
        Some(deadline),
    )
    .await?;

    let outcome = report.outcome();
    let (status, success, message) = match outcome {
        BatchOutcome::Complete => (StatusCode::OK, true, "batch processed"),
        BatchOutcome::Partial => (StatusCode::MULTI_STATUS, true, "batch partially processed"),
        BatchOutcome::Failed => (StatusCode::BAD_REQUEST, false, "no items processed"),
    };
    Ok(envelope(
        status,
        success,
        message,
        Some(BulkData { outcome, report }),
    ))
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers)?;

    let filter = ListFilter {
        address: query.address.filter(|a| !a.trim().is_empty()),
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, database::MAX_PAGE_SIZE);

    let (messages, total) =
        message::list_messages(state.db.pool(), identity.id, &filter, page, page_size).await?;

    Ok(envelope(
        StatusCode::OK,
        true,
        "messages",
        Some(ListData {
            messages,
            total,
            page,
            page_size,
        }),
    ))
}

async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers)?;
    let stats: MessageStats = message::message_stats(state.db.pool(), identity.id).await?;
    Ok(envelope(StatusCode::OK, true, "stats", Some(stats)))
}

async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(external_id): Path<String>,
) -> Result<Response, ApiError> {
    let identity = authorize(&state, &headers)?;
    message::delete_message_by_external_id(state.db.pool(), identity.id, &external_id).await?;
    Ok(envelope::<()>(StatusCode::OK, true, "message deleted", None))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<UserIdentity, ApiError> {
    let header_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Ok(state.tokens.authorize(header_value)?)
}

// ---------------------------------------------------------------------------
// Error mapping

#[derive(Debug)]
enum ApiError {
    Auth(AuthError),
    Validation(ValidationError),
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    Storage(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::StorageUnavailable(detail) => ApiError::Storage(detail),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} not found: {id}"))
            }
            DatabaseError::AlreadyExists { entity, id } => {
                ApiError::Conflict(format!("{entity} already exists: {id}"))
            }
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Auth(err) => {
                let status = match err {
                    AuthError::BadLogin
                    | AuthError::Unauthenticated
                    | AuthError::InvalidCredential
                    | AuthError::CredentialExpired => StatusCode::UNAUTHORIZED,
                    AuthError::Hashing(_) | AuthError::TokenIssuance(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.code(), err.to_string())
            }
            ApiError::Validation(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "bad_request", message.clone())
            }
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message.clone()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message.clone()),
            ApiError::Storage(detail) => {
                warn!(%detail, "storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "storage unavailable".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
            "data": { "code": code },
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_outcomes_map_to_distinct_statuses() {
        let mut report = BatchReport::new(3);
        report.inserted = 3;
        assert_eq!(report.outcome(), BatchOutcome::Complete);

        report.record_error(2, "constraint", None, "rejected");
        assert_eq!(report.outcome(), BatchOutcome::Partial);

        let mut failed = BatchReport::new(1);
        failed.record_error(0, "empty_field", Some("body".into()), "empty");
        assert_eq!(failed.outcome(), BatchOutcome::Failed);
    }

    #[test]
    fn auth_errors_map_to_unauthorized() {
        for err in [
            AuthError::Unauthenticated,
            AuthError::InvalidCredential,
            AuthError::CredentialExpired,
            AuthError::BadLogin,
        ] {
            let response = ApiError::Auth(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn validation_errors_map_to_unprocessable() {
        let err = ValidationError::Negative {
            field: "timestamp",
            value: -1,
        };
        let response = ApiError::Validation(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
