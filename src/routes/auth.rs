use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{hash_password, verify_password},
    db::now_rfc3339,
    error::ApiError,
    models::UserRow,
    state::AppState,
    validation::validate_registration,
};

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    role: String,
    phone: Option<String>,
    city: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct RegisteredUser {
    id: i64,
    name: String,
    email: String,
    role: String,
}

#[derive(Debug, Serialize)]
struct LoggedInUser {
    id: i64,
    name: String,
    email: String,
    role: String,
    city: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/register").route(web::post().to(register)))
        .service(web::resource("/auth/login").route(web::post().to(login)));
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let errors = validate_registration(
        &body.name,
        &body.email,
        &body.password,
        &body.role,
        body.phone.as_deref(),
    );
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    // Uniqueness is byte-exact: Foo@example.com and foo@example.com are
    // distinct accounts.
    let existing = sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE email = ? LIMIT 1")
        .bind(&body.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let password_hash = hash_password(&body.password)
        .map_err(|_| ApiError::Database(sqlx::Error::Protocol("password hash failed".into())))?;

    let result = sqlx::query(
        r#"INSERT INTO users (name, email, password_hash, role, phone, city, state, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&body.name)
    .bind(&body.email)
    .bind(&password_hash)
    .bind(&body.role)
    .bind(&body.phone)
    .bind(&body.city)
    .bind(&body.state)
    .bind(now_rfc3339())
    .execute(&state.db)
    .await?;

    let user_id = result.last_insert_rowid();
    log::info!("Registered {} user {user_id}", body.role);

    Ok(HttpResponse::Created().json(json!({
        "message": "User created successfully",
        "user_id": user_id,
        "user": RegisteredUser {
            id: user_id,
            name: body.name,
            email: body.email,
            role: body.role,
        },
    })))
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ? LIMIT 1")
        .bind(&body.email)
        .fetch_optional(&state.db)
        .await?;

    // Unknown email and wrong password produce the identical response so the
    // endpoint cannot be used to enumerate accounts.
    let user = user.ok_or(ApiError::Auth)?;
    if !verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Auth);
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successful",
        "user": LoggedInUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            city: user.city,
        },
    })))
}
