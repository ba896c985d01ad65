use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};

use super::domain::ApplicationId;
use super::repository::ApplicationCollection;
use super::service::{ApplicationStore, ApplicationStoreError};

/// Router builder exposing the application store over HTTP.
pub fn application_router<C>(store: Arc<ApplicationStore<C>>) -> Router
where
    C: ApplicationCollection + 'static,
{
    Router::new()
        .route("/api/v1/mortgage/applications", post(create_handler::<C>))
        .route(
            "/api/v1/mortgage/applications/:identifier",
            get(fetch_handler::<C>)
                .patch(update_handler::<C>)
                .delete(delete_handler::<C>),
        )
        .with_state(store)
}

pub(crate) async fn create_handler<C>(
    State(store): State<Arc<ApplicationStore<C>>>,
    axum::Json(payload): axum::Json<Value>,
) -> Response
where
    C: ApplicationCollection + 'static,
{
    match store.create(&payload).await {
        Ok(identifier) => {
            let payload = json!({ "identifier": identifier });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn fetch_handler<C>(
    State(store): State<Arc<ApplicationStore<C>>>,
    Path(identifier): Path<String>,
) -> Response
where
    C: ApplicationCollection + 'static,
{
    let identifier = ApplicationId(identifier);
    match store.get(&identifier).await {
        Ok(Some(application)) => (StatusCode::OK, axum::Json(application)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": "application not found",
                "identifier": identifier,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<C>(
    State(store): State<Arc<ApplicationStore<C>>>,
    Path(identifier): Path<String>,
    axum::Json(fields): axum::Json<Map<String, Value>>,
) -> Response
where
    C: ApplicationCollection + 'static,
{
    let identifier = ApplicationId(identifier);
    match store.update(&identifier, &fields).await {
        Ok(updated) => {
            let payload = json!({ "identifier": identifier, "updated": updated });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<C>(
    State(store): State<Arc<ApplicationStore<C>>>,
    Path(identifier): Path<String>,
) -> Response
where
    C: ApplicationCollection + 'static,
{
    let identifier = ApplicationId(identifier);
    match store.delete(&identifier).await {
        Ok(deleted) => {
            let payload = json!({ "identifier": identifier, "deleted": deleted });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn error_response(err: ApplicationStoreError) -> Response {
    match err {
        ApplicationStoreError::Validation(error) => {
            let payload = json!({
                "error": error.to_string(),
                "field": error.field(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ApplicationStoreError::DuplicateKey { identifier } => {
            let payload = json!({
                "error": "application already exists",
                "identifier": identifier,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other @ ApplicationStoreError::StoreUnavailable(_) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}
