use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::db::{Database, PreferenceUpdate};
use crate::models::{
    AddPreferenceRequest, ArticleResponse, CategorizedHeadlines, ErrorBody, LoginRequest,
    MessageResponse, PreferencesResponse, RegisterRequest, UserEnvelope, ARTICLE_NOT_FOUND,
};
use crate::password::{hash_password, verify_password_or_dummy};
use crate::validation::{validate_registration, MSG_MISSING_FIELDS};

pub struct AppState {
    pub db: Arc<Database>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/user-preferences", get(user_preferences))
        .route("/preferences", post(add_preference))
        .route("/news", get(news))
        .route("/article", get(article))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Custom error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

// Extractor rejections still answer with a JSON `message`
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".to_string())
}

// Route handlers
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    validate_registration(
        &request.name,
        &request.email,
        &request.password,
        &request.password,
    )
    .map_err(|message| ApiError::BadRequest(message.to_string()))?;

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")??;

    let user = state
        .db
        .create_user(request.name.trim(), &request.email, &password_hash)
        .await
        .context("Server error during registration")?
        .ok_or_else(|| ApiError::Conflict("Email is already registered".to_string()))?;

    info!(user_id = user.id, "Registered new user");
    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let Json(request) = payload?;
    if request.email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(MSG_MISSING_FIELDS.to_string()));
    }

    let record = state.db.find_user_by_email(&request.email).await?;

    // Unknown emails still run one verification
    let password = request.password;
    let stored_hash = record.as_ref().map(|r| r.password_hash.clone());
    let matches = tokio::task::spawn_blocking(move || {
        verify_password_or_dummy(&password, stored_hash.as_deref())
    })
    .await
    .context("password verification task failed")??;

    let record = record.ok_or_else(invalid_credentials)?;
    if !matches {
        warn!(user_id = record.id, "Rejected login with wrong password");
        return Err(invalid_credentials());
    }

    info!(user_id = record.id, "User logged in");
    Ok(Json(UserEnvelope {
        user: record.into(),
    }))
}

#[derive(Deserialize)]
pub struct PreferencesQuery {
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
}

pub async fn user_preferences(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PreferencesQuery>, QueryRejection>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let Query(query) = query?;
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let categories = state.db.get_preferences(user_id).await?;
    if categories.is_empty() {
        return Err(ApiError::NotFound("User preferences not found".to_string()));
    }

    Ok(Json(PreferencesResponse { categories }))
}

pub async fn add_preference(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddPreferenceRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let user_id = request
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;
    let category = request
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("category is required".to_string()))?;

    let message = match state.db.add_preference(user_id, category).await? {
        PreferenceUpdate::Added => {
            info!(user_id, category, "Added category preference");
            "Preference saved"
        }
        PreferenceUpdate::AlreadyPresent => "Preference already saved",
        PreferenceUpdate::UnknownUser => {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
        success: true,
    }))
}

pub async fn news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategorizedHeadlines>, ApiError> {
    let headlines = state
        .db
        .get_categorized_headlines()
        .await
        .context("Failed to fetch news")?;
    Ok(Json(headlines))
}

#[derive(Deserialize)]
pub struct ArticleQuery {
    #[serde(default)]
    pub link: Option<String>,
}

/// Never fails on an unknown link; the placeholder body is returned instead.
pub async fn article(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ArticleQuery>, QueryRejection>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let Query(query) = query?;
    let article = match query.link.as_deref() {
        Some(link) => state
            .db
            .get_article(link)
            .await
            .context("Failed to fetch article")?,
        None => None,
    };

    Ok(Json(ArticleResponse {
        article: article.unwrap_or_else(|| ARTICLE_NOT_FOUND.to_string()),
    }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
