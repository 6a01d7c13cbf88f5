use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::app::dto::{AccountRequest, CreatedId, Envelope, LoginRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<AccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<CreatedId<String>>>)> {
    let Json(body) = body?;
    let id = services.register(body.validate()?).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_data(
            "User created successfully",
            CreatedId { id: id.to_string() },
        )),
    ))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<String>>> {
    let Json(body) = body?;
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(ApiError::InvalidCredentials);
    };

    let token = services.login(username.trim(), &password).await?;
    Ok(Json(Envelope::with_data("Success login", token)))
}
