pub mod auth;
pub mod location;
pub mod partner;
pub mod restaurant;
pub mod review;
pub mod role;
pub mod token;
pub mod user;

use axum::{http::Uri, routing, Router};

use crate::{app::AppState, error::Error};

pub const GREETING: &str = "Tasty drop on the way toooo!";

pub async fn index() -> &'static str {
    GREETING
}

async fn not_found(uri: Uri) -> Error {
    Error::NotFound(uri)
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(index))
        .route("/reviews", routing::get(review::index))
        .route("/api/restaurants", routing::get(restaurant::by_location))
        .route(
            "/api/searched-location/:search_query",
            routing::get(restaurant::search),
        )
        .route("/singleRestaurant/:id", routing::get(restaurant::show))
        .route("/restaurants", routing::get(restaurant::index))
        .route("/restaurant-data", routing::get(restaurant::menu))
        .route("/business", routing::post(role::business))
        .route("/rider", routing::post(role::rider))
        .route("/partner", routing::post(partner::submit))
        .route("/jwt", routing::post(token::issue))
        .route(
            "/users",
            routing::get(user::index).post(user::create),
        )
        .route("/userRole", routing::get(user::role))
        .route("/division", routing::get(location::divisions))
        .route("/districts", routing::get(location::districts))
        .route("/upazila", routing::get(location::upazilas))
        .fallback(not_found)
        .with_state(app_state)
        .layer(tower_http::cors::CorsLayer::very_permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
