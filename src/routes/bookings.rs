use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::{fetch_booking, fetch_service, fetch_user, now_rfc3339},
    error::ApiError,
    models::BookingStatus,
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    service_id: Option<i64>,
    buyer_id: Option<i64>,
    booking_date: Option<String>,
    duration: Option<f64>,
    location_address: Option<String>,
    special_requests: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdateRequest {
    status: String,
}

#[derive(Debug, Deserialize)]
struct CompleteBookingRequest {
    booking_id: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct BookingListItem {
    id: i64,
    service_title: String,
    booking_date: String,
    total_price: f64,
    status: String,
    buyer_name: String,
    provider_name: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/bookings").route(web::post().to(create_booking)))
        .service(web::resource("/bookings/complete").route(web::post().to(complete_booking)))
        .service(web::resource("/bookings/user/{user_id}").route(web::get().to(user_bookings)))
        .service(web::resource("/bookings/{id}/status").route(web::put().to(update_status)))
        .service(
            web::resource("/users/{user_id}/completed-unpaid")
                .route(web::get().to(completed_unpaid)),
        );
}

async fn create_booking(
    state: web::Data<AppState>,
    body: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let mut errors = Vec::new();
    if body.service_id.is_none() {
        errors.push("Service ID is required".to_string());
    }
    if body.buyer_id.is_none() {
        errors.push("Buyer ID is required".to_string());
    }
    if body.booking_date.as_deref().unwrap_or("").trim().is_empty() {
        errors.push("Booking date is required".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    let service_id = body.service_id.unwrap_or_default();
    let buyer_id = body.buyer_id.unwrap_or_default();
    let booking_date = body.booking_date.unwrap_or_default();

    let service = fetch_service(&state.db, service_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;
    if fetch_user(&state.db, buyer_id).await?.is_none() {
        return Err(ApiError::NotFound("Buyer not found".to_string()));
    }

    let duration = body.duration.unwrap_or(1.0);
    if duration <= 0.0 {
        return Err(ApiError::Validation("Duration must be positive".to_string()));
    }

    // Price is computed server-side and frozen; any client-supplied total is
    // ignored. The provider is captured from the service at creation time.
    let total_price = service.price * duration;

    let result = sqlx::query(
        r#"INSERT INTO bookings
           (service_id, buyer_id, provider_id, booking_date, duration, total_price,
            status, location_address, special_requests, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(service_id)
    .bind(buyer_id)
    .bind(service.provider_id)
    .bind(&booking_date)
    .bind(duration)
    .bind(total_price)
    .bind(BookingStatus::Pending.as_str())
    .bind(&body.location_address)
    .bind(&body.special_requests)
    .bind(now_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Booking created successfully",
        "booking_id": result.last_insert_rowid(),
    })))
}

async fn user_bookings(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();

    // Union of both roles: a provider who books other services sees their
    // buyer-side and provider-side bookings in one list.
    let bookings = sqlx::query_as::<_, BookingListItem>(
        r#"SELECT b.id, s.title AS service_title, b.booking_date, b.total_price, b.status,
                  ub.name AS buyer_name, up.name AS provider_name
           FROM bookings b
           JOIN services s ON b.service_id = s.id
           JOIN users ub ON b.buyer_id = ub.id
           JOIN users up ON b.provider_id = up.id
           WHERE b.buyer_id = ? OR b.provider_id = ?
           ORDER BY b.created_at DESC, b.id DESC"#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(bookings))
}

async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = path.into_inner();
    let next = BookingStatus::parse(&body.status).ok_or_else(|| {
        ApiError::Validation(format!("Unknown booking status \"{}\"", body.status))
    })?;

    apply_transition(&state, booking_id, next).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Booking status updated successfully" })))
}

async fn complete_booking(
    state: web::Data<AppState>,
    body: web::Json<CompleteBookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let booking_id = body
        .booking_id
        .ok_or_else(|| ApiError::Validation("Booking ID is required".to_string()))?;

    apply_transition(&state, booking_id, BookingStatus::Completed).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Booking completed" })))
}

async fn apply_transition(
    state: &web::Data<AppState>,
    booking_id: i64,
    next: BookingStatus,
) -> Result<(), ApiError> {
    let booking = fetch_booking(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    let current = BookingStatus::parse(&booking.status)
        .ok_or_else(|| ApiError::State("Booking is in an unknown state".to_string()))?;
    if !current.can_transition_to(next) {
        return Err(ApiError::State(format!(
            "Cannot transition booking from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(next.as_str())
        .bind(booking_id)
        .execute(&state.db)
        .await?;

    log::info!(
        "Booking {booking_id} moved from {} to {}",
        current.as_str(),
        next.as_str()
    );
    Ok(())
}

async fn completed_unpaid(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();

    // A failed payment attempt does not count as paid; pending and successful
    // payments both take a booking off this list.
    let bookings = sqlx::query_as::<_, BookingListItem>(
        r#"SELECT b.id, s.title AS service_title, b.booking_date, b.total_price, b.status,
                  ub.name AS buyer_name, up.name AS provider_name
           FROM bookings b
           JOIN services s ON b.service_id = s.id
           JOIN users ub ON b.buyer_id = ub.id
           JOIN users up ON b.provider_id = up.id
           WHERE (b.buyer_id = ? OR b.provider_id = ?)
             AND b.status = 'completed'
             AND NOT EXISTS (
                 SELECT 1 FROM payments p
                 WHERE p.booking_id = b.id AND p.status IN ('pending', 'success')
             )
           ORDER BY b.created_at DESC, b.id DESC"#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(bookings))
}
