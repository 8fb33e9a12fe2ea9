// HTTP surface: router, handlers, and session-cookie plumbing
//
// Routes and response envelopes follow the service's public API:
// one upload endpoint driving the pipeline, plus session-scoped history,
// statistics, and liveness endpoints.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::errors::{PipelineError, StorageError, StorageResult};
use crate::core::types::{AppState, TextFragment};
use crate::storage::{Database, NewRecord};

/// Session cookie name
pub const SESSION_COOKIE: &str = "sid";

/// Hard cap on history page size
const MAX_PER_PAGE: u64 = 50;

type ApiError = (StatusCode, Json<Value>);

pub fn router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body = state.config.upload.max_bytes;

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/translate", post(translate_image))
        .route("/api/history", get(history))
        .route("/api/history/clear", delete(clear_history))
        .route(
            "/api/history/:id",
            get(history_detail).delete(delete_history_entry),
        )
        .route("/api/stats", get(session_stats))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Signboard Translator API",
        "endpoints": {
            "/api/translate": "POST - Upload image for translation",
            "/api/history": "GET - Get translation history",
            "/api/history/{id}": "GET/DELETE - Get or delete specific translation",
            "/api/history/clear": "DELETE - Clear all history",
            "/api/stats": "GET - Get session statistics",
            "/api/health": "GET - Health check",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Signboard Translator API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

#[derive(Debug, Serialize)]
struct TranslateResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation_id: Option<i64>,
    original_texts: Vec<String>,
    translated_texts: Vec<String>,
    fragments: Vec<TextFragment>,
    /// Base64-encoded PNG with overlays, when composition succeeded
    processed_image: Option<String>,
    /// Seconds, rounded to two decimals
    processing_time: f64,
}

/// Process an uploaded signboard image
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": the image file (png/jpg/jpeg/gif)
/// - Field "target_language" (optional): two-letter target code
async fn translate_image(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<TranslateResponse>), ApiError> {
    let (session_id, jar) = resolve_session(&state, jar, &headers).await?;

    let mut filename: Option<String> = None;
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut target_language = state.config.translation.default_target.clone();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {e}")))?
    {
        match field.name().unwrap_or("") {
            "image" => {
                filename = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {e}")))?;
                image_bytes = Some(data.to_vec());
            }
            "target_language" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {e}")))?;
                if !value.trim().is_empty() {
                    target_language = value.trim().to_lowercase();
                }
            }
            _ => {}
        }
    }

    let Some(image_bytes) = image_bytes else {
        return Err(bad_request("No image file provided"));
    };
    let filename = match filename.filter(|f| !f.is_empty()) {
        Some(f) => f,
        None => return Err(bad_request("No file selected")),
    };
    if !extension_allowed(&filename, &state.config.upload.allowed_extensions) {
        return Err(bad_request("Invalid file type"));
    }

    info!(
        "processing upload '{}' ({} bytes, target '{}')",
        filename,
        image_bytes.len(),
        target_language
    );

    let output = match state.pipeline.run(&image_bytes, &target_language).await {
        Ok(output) => output,
        Err(PipelineError::InvalidImage(e)) => {
            warn!("rejecting undecodable upload '{filename}': {e}");
            state.metrics.record_failure();
            return Err(bad_request("Invalid image file"));
        }
    };

    state.metrics.record_run(
        output.fragments.len(),
        output.composed_png.is_some(),
        output.elapsed,
    );

    let processing_time = round2(output.elapsed.as_secs_f64());
    let record = NewRecord {
        session_id: session_id.clone(),
        original_filename: filename,
        image_size: image_bytes.len(),
        image_dimensions: Some(format!("{}x{}", output.dimensions.0, output.dimensions.1)),
        original_texts: output.original_texts(),
        translated_texts: output.translated_texts(),
        detected_language: dominant_language(&output.fragments),
        confidence_scores: output.confidence_scores(),
        processing_time,
    };

    // A failed write must not cost the caller an otherwise successful run
    let translation_id = match with_db(&state.db, move |db| db.insert_record(&record)).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!("failed to persist translation record: {e}");
            None
        }
    };

    let message = if output.fragments.is_empty() {
        "No text detected in the image".to_string()
    } else {
        "Translation completed successfully".to_string()
    };

    Ok((
        jar,
        Json(TranslateResponse {
            message,
            translation_id,
            original_texts: output.original_texts(),
            translated_texts: output.translated_texts(),
            fragments: output.fragments,
            processed_image: output
                .composed_png
                .map(|png| general_purpose::STANDARD.encode(png)),
            processing_time,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn history(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session_id, jar) = resolve_session(&state, jar, &headers).await?;
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, MAX_PER_PAGE);

    let listing = with_db(&state.db, move |db| db.list(&session_id, page, per_page))
        .await
        .map_err(internal_error)?;

    Ok((
        jar,
        Json(json!({
            "translations": listing.translations,
            "total": listing.total,
            "pages": listing.pages,
            "current_page": listing.current_page,
            "has_next": listing.has_next,
            "has_prev": listing.has_prev,
        })),
    ))
}

async fn history_detail(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session_id, jar) = resolve_session(&state, jar, &headers).await?;

    let record = with_db(&state.db, move |db| db.get(&session_id, id))
        .await
        .map_err(internal_error)?;

    match record {
        Some(record) => Ok((jar, Json(json!(record)))),
        None => Err(not_found("Translation not found")),
    }
}

async fn delete_history_entry(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session_id, jar) = resolve_session(&state, jar, &headers).await?;

    let deleted = with_db(&state.db, move |db| db.delete(&session_id, id))
        .await
        .map_err(internal_error)?;

    if deleted {
        Ok((jar, Json(json!({"message": "Translation deleted successfully"}))))
    } else {
        Err(not_found("Translation not found"))
    }
}

async fn clear_history(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session_id, jar) = resolve_session(&state, jar, &headers).await?;

    let deleted = with_db(&state.db, move |db| db.clear_session(&session_id))
        .await
        .map_err(internal_error)?;

    Ok((
        jar,
        Json(json!({
            "message": format!("Cleared {deleted} translations from history")
        })),
    ))
}

async fn session_stats(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (session_id, jar) = resolve_session(&state, jar, &headers).await?;

    let stats = with_db(&state.db, move |db| db.session_stats(&session_id))
        .await
        .map_err(internal_error)?;

    Ok((jar, Json(json!(stats))))
}

/// Resolve the caller's session from the `sid` cookie, creating one (and
/// setting the cookie) on first contact. Activity is refreshed either way.
async fn resolve_session(
    state: &AppState,
    jar: CookieJar,
    headers: &HeaderMap,
) -> Result<(String, CookieJar), ApiError> {
    let presented = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let presented_for_db = presented.clone();
    let session_id = with_db(&state.db, move |db| {
        let sid = db.get_or_create_session(
            presented_for_db.as_deref(),
            ip_address.as_deref(),
            user_agent.as_deref(),
        )?;
        db.touch_session(&sid)?;
        Ok(sid)
    })
    .await
    .map_err(internal_error)?;

    let jar = if presented.as_deref() == Some(session_id.as_str()) {
        jar
    } else {
        jar.add(
            Cookie::build((SESSION_COOKIE, session_id.clone()))
                .path("/")
                .http_only(true)
                .build(),
        )
    };

    Ok((session_id, jar))
}

/// Run a storage closure off the async runtime
async fn with_db<T, F>(db: &Arc<Database>, f: F) -> StorageResult<T>
where
    F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| StorageError::TaskJoinFailed(e.to_string()))?
}

/// Most frequent detected source language across the fragments
fn dominant_language(fragments: &[TextFragment]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for fragment in fragments {
        if let Some(language) = fragment.detected_language.as_deref() {
            *counts.entry(language).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(language, _)| language.to_string())
}

fn extension_allowed(filename: &str, allowed: &[String]) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| allowed.iter().any(|a| a == &ext.to_lowercase()))
        .unwrap_or(false)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.into()})),
    )
}

fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": message.into()})),
    )
}

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": format!("{e}")})),
    )
}
