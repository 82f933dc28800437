use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::{fetch_booking, now_rfc3339, recompute_service_rating},
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct CreateReviewRequest {
    booking_id: Option<i64>,
    reviewer_id: Option<i64>,
    reviewee_id: Option<i64>,
    rating: Option<i64>,
    comment: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct ReviewListItem {
    id: i64,
    rating: i64,
    comment: Option<String>,
    reviewer_name: String,
    created_at: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/reviews").route(web::post().to(create_review)))
        .service(web::resource("/reviews/service/{service_id}").route(web::get().to(service_reviews)))
        .service(
            web::resource("/reviews/provider/{provider_id}").route(web::get().to(provider_reviews)),
        );
}

async fn create_review(
    state: web::Data<AppState>,
    body: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let mut errors = Vec::new();
    if body.booking_id.is_none() {
        errors.push("Booking ID is required".to_string());
    }
    if body.reviewer_id.is_none() {
        errors.push("Reviewer ID is required".to_string());
    }
    if body.reviewee_id.is_none() {
        errors.push("Reviewee ID is required".to_string());
    }
    match body.rating {
        None => errors.push("Rating is required".to_string()),
        Some(rating) if !(1..=5).contains(&rating) => {
            errors.push("Rating must be between 1 and 5".to_string())
        }
        Some(_) => {}
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    let booking_id = body.booking_id.unwrap_or_default();
    let reviewer_id = body.reviewer_id.unwrap_or_default();
    let reviewee_id = body.reviewee_id.unwrap_or_default();
    let rating = body.rating.unwrap_or_default();

    let booking = fetch_booking(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    // Reviewer and reviewee must be the two parties of the booking, in either
    // direction (buyer reviews provider or provider reviews buyer).
    let buyer_reviews_provider =
        reviewer_id == booking.buyer_id && reviewee_id == booking.provider_id;
    let provider_reviews_buyer =
        reviewer_id == booking.provider_id && reviewee_id == booking.buyer_id;
    if !buyer_reviews_provider && !provider_reviews_buyer {
        return Err(ApiError::Validation(
            "Reviewer and reviewee must be the booking's buyer and provider".to_string(),
        ));
    }

    let existing = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM reviews WHERE booking_id = ? AND reviewer_id = ? LIMIT 1",
    )
    .bind(booking_id)
    .bind(reviewer_id)
    .fetch_optional(&state.db)
    .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "Review already submitted for this booking".to_string(),
        ));
    }

    // The insert and the derived rating/review_count update commit together.
    let mut tx = state.db.begin().await?;

    let result = sqlx::query(
        r#"INSERT INTO reviews (booking_id, reviewer_id, reviewee_id, rating, comment, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(booking_id)
    .bind(reviewer_id)
    .bind(reviewee_id)
    .bind(rating)
    .bind(&body.comment)
    .bind(now_rfc3339())
    .execute(&mut *tx)
    .await?;

    recompute_service_rating(&mut *tx, booking.service_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Review created successfully",
        "review_id": result.last_insert_rowid(),
    })))
}

async fn service_reviews(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let service_id = path.into_inner();

    let reviews = sqlx::query_as::<_, ReviewListItem>(
        r#"SELECT r.id, r.rating, r.comment, u.name AS reviewer_name, r.created_at
           FROM reviews r
           JOIN bookings b ON r.booking_id = b.id
           JOIN users u ON r.reviewer_id = u.id
           WHERE b.service_id = ?
           ORDER BY r.created_at DESC, r.id DESC"#,
    )
    .bind(service_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(reviews))
}

async fn provider_reviews(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let provider_id = path.into_inner();

    let reviews = sqlx::query_as::<_, ReviewListItem>(
        r#"SELECT r.id, r.rating, r.comment, u.name AS reviewer_name, r.created_at
           FROM reviews r
           JOIN users u ON r.reviewer_id = u.id
           WHERE r.reviewee_id = ?
           ORDER BY r.created_at DESC, r.id DESC"#,
    )
    .bind(provider_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(reviews))
}
