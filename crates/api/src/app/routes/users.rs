use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::app::dto::{
    AccountRequest, AccountView, CreatedId, Envelope, ListParams, UpdateAccountRequest,
};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::middleware::Caller;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:user_id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Vec<AccountView>>>> {
    let claim = caller.authenticated()?;
    let query = params.into_query()?;
    let page = services.list_accounts(claim, &query).await?;
    Ok(Json(Envelope::page(page.map(AccountView::from))))
}

/// Admin-only creation; unlike registration the body may pick a role.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<AccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<CreatedId<String>>>)> {
    let claim = caller.authenticated()?;
    let Json(body) = body?;
    let id = services.create_account(claim, body.validate()?).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_data(
            "User created successfully",
            CreatedId { id: id.to_string() },
        )),
    ))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Envelope<AccountView>>> {
    let account = services.get_account(caller.authenticated()?, &user_id).await?;
    Ok(Json(Envelope::data(account.into())))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<AccountView>>> {
    let claim = caller.authenticated()?;
    let Json(body) = body?;
    let account = services.update_account(claim, &user_id, body).await?;
    Ok(Json(Envelope::with_data(
        "User updated successfully",
        account.into(),
    )))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Envelope>> {
    services.delete_account(caller.authenticated()?, &user_id).await?;
    Ok(Json(Envelope::message("User deleted successfully")))
}
