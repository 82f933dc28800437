pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod validation;

use actix_web::web;

/// Mounts every route group on the given service config. main and the
/// integration tests build their apps through this single entry point.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    routes::configure(cfg);
    routes::auth::configure(cfg);
    routes::services::configure(cfg);
    routes::bookings::configure(cfg);
    routes::reviews::configure(cfg);
    routes::providers::configure(cfg);
    routes::payments::configure(cfg);
}
