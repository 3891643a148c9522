// src/core/master/path_handlers.rs

//! HTTP endpoints served by the master's embedded web server.

use crate::core::MasterError;
use crate::core::discovery::MasterSetDiscovery;
use crate::core::metrics::gather_metrics;
use crate::core::registration::RegistrationBuilder;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct WebContext {
    pub registration: Arc<RegistrationBuilder>,
    pub discovery: Arc<MasterSetDiscovery>,
}

pub fn router(ctx: WebContext) -> Router {
    Router::new()
        .route("/api/v1/registration", get(registration_handler))
        .route("/api/v1/masters", get(masters_handler))
        .route("/healthz", get(|| async { "OK" }))
        .route("/metrics", get(metrics_handler))
        .with_state(ctx)
}

async fn registration_handler(State(ctx): State<WebContext>) -> Response {
    match ctx.registration.get() {
        Ok(descriptor) => Json(descriptor).into_response(),
        Err(e) => error_response(e),
    }
}

async fn masters_handler(State(ctx): State<WebContext>) -> Response {
    match ctx.discovery.list_masters().await {
        Ok(masters) => Json(json!({ "masters": masters })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

fn error_response(e: MasterError) -> Response {
    let status = match e {
        MasterError::NotReady(_) | MasterError::ServiceUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "code": e.code().to_string(), "error": e.message() })),
    )
        .into_response()
}
