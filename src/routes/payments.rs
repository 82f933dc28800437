use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::{fetch_booking, fetch_payment, now_rfc3339},
    error::ApiError,
    models::{BookingStatus, PaymentStatus},
    state::AppState,
    validation::is_valid_phone,
};

/// Platform commission withheld from every payment.
const COMMISSION_RATE: f64 = 0.10;

#[derive(Debug, Deserialize)]
struct InitiatePaymentRequest {
    booking_id: Option<i64>,
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmPaymentRequest {
    payment_id: Option<i64>,
    mpesa_receipt: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaymentDetail {
    id: i64,
    booking_id: i64,
    amount: f64,
    commission: f64,
    seller_amount: f64,
    mpesa_receipt: Option<String>,
    phone_number: String,
    status: String,
    created_at: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/payments/initiate").route(web::post().to(initiate_payment)))
        .service(web::resource("/payments/confirm").route(web::post().to(confirm_payment)))
        .service(web::resource("/payments/{id}").route(web::get().to(payment_detail)));
}

async fn initiate_payment(
    state: web::Data<AppState>,
    body: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let mut errors = Vec::new();
    if body.booking_id.is_none() {
        errors.push("Booking ID is required".to_string());
    }
    match body.phone_number.as_deref() {
        None | Some("") => errors.push("Phone number is required".to_string()),
        Some(phone) if !is_valid_phone(phone) => {
            errors.push("Valid phone number is required".to_string())
        }
        Some(_) => {}
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    let booking_id = body.booking_id.unwrap_or_default();
    let phone_number = body.phone_number.unwrap_or_default();

    let booking = fetch_booking(&state.db, booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    let open_payment = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM payments WHERE booking_id = ? AND status IN ('pending', 'success') LIMIT 1",
    )
    .bind(booking_id)
    .fetch_optional(&state.db)
    .await?;
    if open_payment.is_some() {
        return Err(ApiError::Conflict(
            "A payment for this booking is already in progress or settled".to_string(),
        ));
    }

    let amount = booking.total_price;
    let commission = amount * COMMISSION_RATE;
    let seller_amount = amount - commission;

    let result = sqlx::query(
        r#"INSERT INTO payments
           (booking_id, amount, commission, seller_amount, phone_number, status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(booking_id)
    .bind(amount)
    .bind(commission)
    .bind(seller_amount)
    .bind(&phone_number)
    .bind(PaymentStatus::Pending.as_str())
    .bind(now_rfc3339())
    .execute(&state.db)
    .await?;

    let payment_id = result.last_insert_rowid();
    log::info!("Payment {payment_id} initiated for booking {booking_id}");

    Ok(HttpResponse::Created().json(json!({
        "message": "Payment initiated",
        "payment_id": payment_id,
        "amount": amount,
        "commission": commission,
        "seller_amount": seller_amount,
        "status": PaymentStatus::Pending.as_str(),
    })))
}

async fn confirm_payment(
    state: web::Data<AppState>,
    body: web::Json<ConfirmPaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let payment_id = body
        .payment_id
        .ok_or_else(|| ApiError::Validation("Payment ID is required".to_string()))?;
    let next = match body.status.as_deref() {
        None | Some("") | Some("success") => PaymentStatus::Success,
        Some("failed") => PaymentStatus::Failed,
        Some(other) => {
            return Err(ApiError::Validation(format!(
                "Payment can only be confirmed as \"success\" or \"failed\", got \"{other}\""
            )))
        }
    };

    let payment = fetch_payment(&state.db, payment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    let current = PaymentStatus::parse(&payment.status)
        .ok_or_else(|| ApiError::State("Payment is in an unknown state".to_string()))?;
    if !current.can_transition_to(next) {
        return Err(ApiError::State(format!(
            "Cannot transition payment from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    // The payment settlement and the booking completion commit together.
    let mut tx = state.db.begin().await?;

    sqlx::query("UPDATE payments SET status = ?, mpesa_receipt = ? WHERE id = ?")
        .bind(next.as_str())
        .bind(&body.mpesa_receipt)
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

    if next == PaymentStatus::Success {
        let booking = fetch_booking_tx(&mut tx, payment.booking_id).await?;
        if booking.as_deref() == Some(BookingStatus::Confirmed.as_str()) {
            sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
                .bind(BookingStatus::Completed.as_str())
                .bind(payment.booking_id)
                .execute(&mut *tx)
                .await?;
            log::info!(
                "Booking {} completed by payment {payment_id}",
                payment.booking_id
            );
        }
    }

    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Payment confirmed",
        "payment_id": payment_id,
        "status": next.as_str(),
    })))
}

async fn fetch_booking_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    booking_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT status FROM bookings WHERE id = ? LIMIT 1")
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
}

async fn payment_detail(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let payment_id = path.into_inner();

    let payment = fetch_payment(&state.db, payment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    Ok(HttpResponse::Ok().json(PaymentDetail {
        id: payment.id,
        booking_id: payment.booking_id,
        amount: payment.amount,
        commission: payment.commission,
        seller_amount: payment.seller_amount,
        mpesa_receipt: payment.mpesa_receipt,
        phone_number: payment.phone_number,
        status: payment.status,
        created_at: payment.created_at,
    }))
}
