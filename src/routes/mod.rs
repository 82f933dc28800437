use actix_web::{web, HttpResponse};
use serde_json::json;

pub mod auth;
pub mod bookings;
pub mod payments;
pub mod providers;
pub mod reviews;
pub mod services;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "Service marketplace API is running"
    }))
}
