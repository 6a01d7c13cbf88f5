use axum::{http::StatusCode, Json};

use crate::app::dto::Envelope;

pub async fn root() -> Json<Envelope> {
    Json(Envelope::message("Root Page"))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}
