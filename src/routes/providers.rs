use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize)]
struct DashboardStats {
    total_services: i64,
    total_bookings: i64,
    pending_bookings: i64,
    total_earnings: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct RecentBooking {
    id: i64,
    service_title: String,
    booking_date: String,
    status: String,
    total_price: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct ProviderBooking {
    id: i64,
    service_title: String,
    booking_date: String,
    total_price: f64,
    status: String,
    buyer_name: String,
    buyer_phone: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct RecentPayment {
    id: i64,
    service_title: String,
    amount: f64,
    date: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/provider/{id}/dashboard").route(web::get().to(dashboard)))
        .service(web::resource("/provider/{id}/bookings").route(web::get().to(provider_bookings)))
        .service(web::resource("/providers/{id}/earnings").route(web::get().to(earnings)));
}

async fn dashboard(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let provider_id = path.into_inner();

    let total_services = count(
        &state.db,
        "SELECT COUNT(*) FROM services WHERE provider_id = ?",
        provider_id,
    )
    .await?;
    let total_bookings = count(
        &state.db,
        "SELECT COUNT(*) FROM bookings WHERE provider_id = ?",
        provider_id,
    )
    .await?;
    let pending_bookings = count(
        &state.db,
        "SELECT COUNT(*) FROM bookings WHERE provider_id = ? AND status = 'pending'",
        provider_id,
    )
    .await?;
    let total_earnings = completed_earnings(&state.db, provider_id).await?;

    let recent_bookings = sqlx::query_as::<_, RecentBooking>(
        r#"SELECT b.id, s.title AS service_title, b.booking_date, b.status, b.total_price
           FROM bookings b
           JOIN services s ON b.service_id = s.id
           WHERE b.provider_id = ?
           ORDER BY b.created_at DESC, b.id DESC
           LIMIT 5"#,
    )
    .bind(provider_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "stats": DashboardStats {
            total_services,
            total_bookings,
            pending_bookings,
            total_earnings,
        },
        "recent_bookings": recent_bookings,
    })))
}

async fn provider_bookings(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let provider_id = path.into_inner();

    let bookings = sqlx::query_as::<_, ProviderBooking>(
        r#"SELECT b.id, s.title AS service_title, b.booking_date, b.total_price, b.status,
                  u.name AS buyer_name, u.phone AS buyer_phone
           FROM bookings b
           JOIN services s ON b.service_id = s.id
           JOIN users u ON b.buyer_id = u.id
           WHERE b.provider_id = ?
           ORDER BY b.created_at DESC, b.id DESC"#,
    )
    .bind(provider_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(bookings))
}

async fn earnings(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let provider_id = path.into_inner();

    let total_earnings = completed_earnings(&state.db, provider_id).await?;

    let total_commission = sqlx::query_scalar::<_, f64>(
        r#"SELECT COALESCE(SUM(p.commission), 0.0)
           FROM payments p
           JOIN bookings b ON p.booking_id = b.id
           WHERE b.provider_id = ? AND p.status = 'success'"#,
    )
    .bind(provider_id)
    .fetch_one(&state.db)
    .await?;

    let payment_count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*)
           FROM payments p
           JOIN bookings b ON p.booking_id = b.id
           WHERE b.provider_id = ? AND p.status = 'success'"#,
    )
    .bind(provider_id)
    .fetch_one(&state.db)
    .await?;

    let recent_payments = sqlx::query_as::<_, RecentPayment>(
        r#"SELECT p.id, s.title AS service_title, p.amount, p.created_at AS date
           FROM payments p
           JOIN bookings b ON p.booking_id = b.id
           JOIN services s ON b.service_id = s.id
           WHERE b.provider_id = ? AND p.status = 'success'
           ORDER BY p.created_at DESC, p.id DESC
           LIMIT 5"#,
    )
    .bind(provider_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "total_earnings": total_earnings,
        "total_commission": total_commission,
        "payment_count": payment_count,
        "recent_payments": recent_payments,
    })))
}

/// Earnings are always recomputed from completed bookings, never stored.
async fn completed_earnings(pool: &SqlitePool, provider_id: i64) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        r#"SELECT COALESCE(SUM(total_price), 0.0)
           FROM bookings
           WHERE provider_id = ? AND status = 'completed'"#,
    )
    .bind(provider_id)
    .fetch_one(pool)
    .await
}

async fn count(pool: &SqlitePool, query: &str, param: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(query)
        .bind(param)
        .fetch_one(pool)
        .await
}
