use std::{fs, path::Path};

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::hash_password,
    models::{BookingRow, PaymentRow, Role, ServiceRow, UserRow},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn fetch_user(pool: &SqlitePool, user_id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ? LIMIT 1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_service(
    pool: &SqlitePool,
    service_id: i64,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRow>("SELECT * FROM services WHERE id = ? LIMIT 1")
        .bind(service_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_booking(
    pool: &SqlitePool,
    booking_id: i64,
) -> Result<Option<BookingRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = ? LIMIT 1")
        .bind(booking_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_payment(
    pool: &SqlitePool,
    payment_id: i64,
) -> Result<Option<PaymentRow>, sqlx::Error> {
    sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = ? LIMIT 1")
        .bind(payment_id)
        .fetch_optional(pool)
        .await
}

/// Recomputes a service's rating and review_count from the reviews attached
/// to its bookings. Runs inside the caller's transaction so the derived
/// values never drift from the review set.
pub async fn recompute_service_rating(
    conn: &mut SqliteConnection,
    service_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE services
           SET rating = COALESCE(
                   (SELECT AVG(r.rating)
                    FROM reviews r
                    JOIN bookings b ON r.booking_id = b.id
                    WHERE b.service_id = ?),
                   0.0),
               review_count =
                   (SELECT COUNT(*)
                    FROM reviews r
                    JOIN bookings b ON r.booking_id = b.id
                    WHERE b.service_id = ?)
           WHERE id = ?"#,
    )
    .bind(service_id)
    .bind(service_id)
    .bind(service_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn seed_demo(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing =
        sqlx::query_as::<_, (i64,)>("SELECT id FROM users LIMIT 1")
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    log::info!("Seeding demo marketplace data");

    let users = vec![
        ("John Kamau", "john.kamau@example.com", Role::Provider, "+254712345678", "Nairobi", "Nairobi County"),
        ("Grace Wanjiku", "grace.wanjiku@example.com", Role::Provider, "+254723456789", "Mombasa", "Mombasa County"),
        ("Sarah Achieng", "sarah.achieng@example.com", Role::Buyer, "+254745678901", "Nairobi", "Nairobi County"),
        ("Michael Njoroge", "michael.njoroge@example.com", Role::Buyer, "+254756789012", "Nakuru", "Nakuru County"),
    ];

    let mut provider_ids = Vec::new();
    for (name, email, role, phone, city, state) in users {
        let password_hash = hash_password("password123")
            .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
        let result = sqlx::query(
            r#"INSERT INTO users (name, email, password_hash, role, phone, city, state, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(phone)
        .bind(city)
        .bind(state)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        if role == Role::Provider {
            provider_ids.push(result.last_insert_rowid());
        }
    }

    let services = vec![
        (
            "Professional Home Cleaning Services",
            "Thorough home cleaning including living rooms, bedrooms, kitchen, and bathrooms. Eco-friendly products.",
            "cleaning",
            provider_ids[0],
            1500.0,
            "fixed",
            "Nairobi",
            "Nairobi County",
            "Westlands, Kilimani, Lavington, Karen",
            "mon,tue,wed,thu,fri,sat",
        ),
        (
            "KCSE Mathematics Tutoring",
            "Experienced mathematics tutor specializing in KCSE exam preparation. Covers Form 1-4 syllabus.",
            "tutoring",
            provider_ids[1],
            800.0,
            "hourly",
            "Mombasa",
            "Mombasa County",
            "Nyali, Bamburi, Mombasa Island, Likoni",
            "mon,wed,fri,sat,sun",
        ),
        (
            "Emergency Plumbing & Pipe Repair",
            "Licensed plumber for leak repairs, pipe installation, toilet fixes, and water heater maintenance.",
            "plumbing",
            provider_ids[0],
            2500.0,
            "fixed",
            "Nairobi",
            "Nairobi County",
            "Nairobi CBD, Thika Road, Ngong Road",
            "mon,tue,wed,thu,fri,sat,sun",
        ),
    ];

    for (title, description, category, provider_id, price, price_type, city, state, serves_area, days) in services {
        sqlx::query(
            r#"INSERT INTO services
               (title, description, category, provider_id, price, price_type, city, state,
                serves_area, availability_days, availability_start, availability_end, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '08:00', '18:00', ?)"#,
        )
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(provider_id)
        .bind(price)
        .bind(price_type)
        .bind(city)
        .bind(state)
        .bind(serves_area)
        .bind(days)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}
