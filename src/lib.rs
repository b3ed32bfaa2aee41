pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repo;
pub mod routes;
pub mod utils;

use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}
