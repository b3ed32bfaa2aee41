use axum::{routing::get, Router};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::events::{
    create_event, delete_event, get_event, list_events, patch_event, update_event,
};
use crate::handlers::health_check;
use crate::handlers::pages::{home, login_page, logout};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/events/", get(list_events).post(create_event))
        .route(
            "/api/v1/events/:id/",
            get(get_event)
                .put(update_event)
                .patch(patch_event)
                .delete(delete_event),
        )
        .route("/login/", get(login_page))
        .route("/logout/", get(logout))
        .route("/", get(home))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
