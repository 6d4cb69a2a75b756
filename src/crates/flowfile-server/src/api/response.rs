//! Success-response helpers, grounded on `orchestrator::api::response`'s
//! `ok`/`created`/`no_content` family, minus the `{success, data}` envelope
//! — spec §6 returns the resource directly on 2xx, reserving an envelope
//! only for the error case (`api::error::ErrorBody`).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(data))
}

pub fn no_content() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
