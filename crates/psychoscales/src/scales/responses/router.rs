use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::repository::{ResponseRepository, SubmissionContext};
use super::service::{ResponseServiceError, ScaleResponseService};
use crate::scales::scoring::RawAnswers;
use crate::scales::views::ScaleView;

/// Router builder exposing catalog, submission and export endpoints.
pub fn scale_router<R>(service: Arc<ScaleResponseService<R>>) -> Router
where
    R: ResponseRepository + 'static,
{
    Router::new()
        .route("/api/v1/scales", get(list_handler::<R>))
        .route("/api/v1/scales/:scale_id", get(scale_handler::<R>))
        .route(
            "/api/v1/scales/:scale_id/responses",
            post(submit_handler::<R>),
        )
        .route("/api/v1/scales/:scale_id/export", get(export_handler::<R>))
        .route("/api/v1/catalog/reload", post(reload_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub(crate) lang: Option<String>,
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<ScaleResponseService<R>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ResponseRepository + 'static,
{
    let snapshot = service.catalog().snapshot();
    let language = query
        .lang
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty());
    let payload = json!({
        "language": language,
        "tags": snapshot.grouped_by_tag(language),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn scale_handler<R>(
    State(service): State<Arc<ScaleResponseService<R>>>,
    Path(scale_id): Path<String>,
) -> Response
where
    R: ResponseRepository + 'static,
{
    match service.scale(&scale_id) {
        Ok(scale) => (StatusCode::OK, Json(ScaleView::from_scale(&scale))).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ScaleResponseService<R>>>,
    Path(scale_id): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response
where
    R: ResponseRepository + 'static,
{
    let context = submission_context(&headers);
    match service.submit(&scale_id, RawAnswers::from(fields), context) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn export_handler<R>(
    State(service): State<Arc<ScaleResponseService<R>>>,
    Path(scale_id): Path<String>,
) -> Response
where
    R: ResponseRepository + 'static,
{
    match service.export_csv(&scale_id) {
        Ok(body) => {
            let disposition = format!(
                "attachment; filename=\"{}-responses.csv\"",
                export_file_stem(&scale_id)
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn reload_handler<R>(
    State(service): State<Arc<ScaleResponseService<R>>>,
) -> Response
where
    R: ResponseRepository + 'static,
{
    match service.catalog().reload() {
        Ok(snapshot) => {
            let payload = json!({
                "loaded": snapshot.len(),
                "rejected": snapshot.rejected(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "catalog reload failed");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn error_response(error: ResponseServiceError) -> Response {
    match error {
        ResponseServiceError::UnknownScale(_) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        ResponseServiceError::Answer(answer) => {
            let payload = json!({
                "error": "incomplete or invalid submission",
                "detail": answer.to_string(),
                "item": answer.item(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        other => {
            warn!(error = %other, "scale request failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

/// Scale id reduced to characters that are safe inside a quoted header parameter.
pub(crate) fn export_file_stem(scale_id: &str) -> String {
    let stem: String = scale_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "scale".to_string()
    } else {
        stem
    }
}

/// Builds request metadata from proxy and client headers.
pub(crate) fn submission_context(headers: &HeaderMap) -> SubmissionContext {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let client_ip = text("x-forwarded-for")
        .and_then(|chain| chain.split(',').next().map(|first| first.trim().to_string()))
        .filter(|first| !first.is_empty())
        .or_else(|| text("x-real-ip"));

    SubmissionContext {
        submitted_at: Utc::now(),
        user_id: text("x-user-id"),
        user_agent: text(header::USER_AGENT.as_str()),
        client_ip,
        location: text("cf-ipcountry"),
    }
}
