use axum::Router;

pub mod auth;
pub mod stores;
pub mod system;
pub mod users;

/// Router for everything under `/api`. Every route sees a resolved `Claim`.
pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/stores", stores::router())
        .nest("/users", users::router())
}
