use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::app::dto::{CreateStoreRequest, CreatedId, Envelope, ListParams, StoreView};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::middleware::Caller;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stores).post(create_store))
        .route("/:store_id", get(get_store).delete(delete_store))
}

/// Public listing; owner ids are only shown to admins.
pub async fn list_stores(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Envelope<Vec<StoreView>>>> {
    let claim = caller.claim();
    let query = params.into_query()?;
    let page = services.list_stores(claim, &query).await?;

    let show_owner = claim.is_admin();
    Ok(Json(Envelope::page(page.map(|s| StoreView::new(s, show_owner)))))
}

pub async fn get_store(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Envelope<StoreView>>> {
    let store = services.get_store(caller.claim(), &store_id).await?;
    Ok(Json(Envelope::data(StoreView::new(store, false))))
}

pub async fn create_store(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CreateStoreRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<CreatedId<String>>>)> {
    let claim = caller.authenticated()?;
    let Json(body) = body?;
    let id = services.create_store(claim, body.validate()?).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_data(
            "Store created successfully",
            CreatedId { id: id.to_string() },
        )),
    ))
}

pub async fn delete_store(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<Caller>,
    Path(store_id): Path<String>,
) -> ApiResult<Json<Envelope>> {
    services.delete_store(caller.authenticated()?, &store_id).await?;
    Ok(Json(Envelope::message("Store deleted successfully")))
}
