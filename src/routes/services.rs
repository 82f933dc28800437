use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite};

use crate::{
    db::{fetch_service, fetch_user, now_rfc3339},
    error::ApiError,
    models::PriceType,
    state::AppState,
    validation::validate_service,
};

#[derive(Debug, Deserialize)]
struct ListFilters {
    category: Option<String>,
    city: Option<String>,
    min_rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SearchFilters {
    q: Option<String>,
    category: Option<String>,
    city: Option<String>,
    max_price: Option<f64>,
    min_rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CreateServiceRequest {
    title: String,
    description: String,
    category: String,
    provider_id: i64,
    price: f64,
    price_type: Option<String>,
    city: String,
    state: Option<String>,
    serves_area: Option<String>,
    availability_days: Option<String>,
    availability_start: Option<String>,
    availability_end: Option<String>,
    images: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MyServicesQuery {
    user_id: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct ServiceListItem {
    id: i64,
    title: String,
    description: String,
    category: String,
    price: f64,
    price_type: String,
    city: Option<String>,
    rating: f64,
    review_count: i64,
    provider_name: String,
}

#[derive(Debug, Serialize)]
struct ProviderInfo {
    id: i64,
    name: String,
    phone: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServiceDetail {
    id: i64,
    title: String,
    description: String,
    category: String,
    price: f64,
    price_type: String,
    city: Option<String>,
    state: Option<String>,
    serves_area: Option<String>,
    rating: f64,
    review_count: i64,
    is_active: bool,
    availability_days: Option<String>,
    availability_start: Option<String>,
    availability_end: Option<String>,
    provider: ProviderInfo,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct OwnedServiceItem {
    id: i64,
    title: String,
    description: String,
    category: String,
    price: f64,
    rating: f64,
    review_count: i64,
    is_active: i64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/services")
            .route(web::get().to(list_services))
            .route(web::post().to(create_service)),
    )
    .service(web::resource("/services/search").route(web::get().to(search_services)))
    .service(web::resource("/services/provider/{provider_id}").route(web::get().to(provider_services)))
    .service(
        web::resource("/services/{id}")
            .route(web::get().to(service_detail))
            .route(web::delete().to(deactivate_service)),
    )
    .service(web::resource("/me/services").route(web::get().to(my_services)))
    .service(web::resource("/categories").route(web::get().to(categories)));
}

const LIST_SELECT: &str = r#"SELECT s.id, s.title, s.description, s.category, s.price,
              s.price_type, s.city, s.rating, s.review_count,
              u.name AS provider_name
       FROM services s
       JOIN users u ON s.provider_id = u.id
       WHERE s.is_active = 1"#;

async fn list_services(
    state: web::Data<AppState>,
    query: web::Query<ListFilters>,
) -> Result<HttpResponse, ApiError> {
    let filters = query.into_inner();

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(LIST_SELECT);
    push_common_filters(
        &mut builder,
        filters.category.as_deref(),
        filters.city.as_deref(),
        filters.min_rating,
    );
    builder.push(" ORDER BY s.created_at DESC, s.id DESC");

    let services = builder
        .build_query_as::<ServiceListItem>()
        .fetch_all(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(services))
}

async fn search_services(
    state: web::Data<AppState>,
    query: web::Query<SearchFilters>,
) -> Result<HttpResponse, ApiError> {
    let filters = query.into_inner();

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(LIST_SELECT);

    if let Some(q) = filters.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let needle = format!("%{}%", q.trim().to_lowercase());
        builder.push(" AND (LOWER(s.title) LIKE ");
        builder.push_bind(needle.clone());
        builder.push(" OR LOWER(s.description) LIKE ");
        builder.push_bind(needle);
        builder.push(")");
    }
    push_common_filters(
        &mut builder,
        filters.category.as_deref(),
        filters.city.as_deref(),
        filters.min_rating,
    );
    if let Some(max_price) = filters.max_price {
        builder.push(" AND s.price <= ");
        builder.push_bind(max_price);
    }
    builder.push(" ORDER BY s.created_at DESC, s.id DESC");

    let services = builder
        .build_query_as::<ServiceListItem>()
        .fetch_all(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(services))
}

fn push_common_filters(
    builder: &mut QueryBuilder<Sqlite>,
    category: Option<&str>,
    city: Option<&str>,
    min_rating: Option<f64>,
) {
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        builder.push(" AND s.category = ");
        builder.push_bind(category.to_string());
    }
    if let Some(city) = city.filter(|c| !c.is_empty()) {
        builder.push(" AND LOWER(s.city) LIKE ");
        builder.push_bind(format!("%{}%", city.to_lowercase()));
    }
    if let Some(min_rating) = min_rating {
        builder.push(" AND s.rating >= ");
        builder.push_bind(min_rating);
    }
}

async fn create_service(
    state: web::Data<AppState>,
    body: web::Json<CreateServiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let errors = validate_service(
        &body.title,
        &body.description,
        &body.category,
        body.price,
        &body.city,
    );
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let price_type = match body.price_type.as_deref() {
        None | Some("") => PriceType::Hourly,
        Some(value) => PriceType::parse(value)
            .ok_or_else(|| ApiError::Validation("Price type must be either \"hourly\" or \"fixed\"".to_string()))?,
    };

    if fetch_user(&state.db, body.provider_id).await?.is_none() {
        return Err(ApiError::NotFound("Provider not found".to_string()));
    }

    let result = sqlx::query(
        r#"INSERT INTO services
           (title, description, category, provider_id, price, price_type, city, state,
            serves_area, availability_days, availability_start, availability_end, images, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(&body.category)
    .bind(body.provider_id)
    .bind(body.price)
    .bind(price_type.as_str())
    .bind(&body.city)
    .bind(body.state.unwrap_or_default())
    .bind(body.serves_area.unwrap_or_default())
    .bind(body.availability_days.unwrap_or_default())
    .bind(body.availability_start.unwrap_or_else(|| "09:00".to_string()))
    .bind(body.availability_end.unwrap_or_else(|| "17:00".to_string()))
    .bind(&body.images)
    .bind(now_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Service created successfully",
        "service_id": result.last_insert_rowid(),
    })))
}

async fn service_detail(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let service_id = path.into_inner();

    let service = fetch_service(&state.db, service_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;
    let provider = fetch_user(&state.db, service.provider_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Provider not found".to_string()))?;

    Ok(HttpResponse::Ok().json(ServiceDetail {
        id: service.id,
        title: service.title,
        description: service.description,
        category: service.category,
        price: service.price,
        price_type: service.price_type,
        city: service.city,
        state: service.state,
        serves_area: service.serves_area,
        rating: service.rating,
        review_count: service.review_count,
        is_active: service.is_active != 0,
        availability_days: service.availability_days,
        availability_start: service.availability_start,
        availability_end: service.availability_end,
        provider: ProviderInfo {
            id: provider.id,
            name: provider.name,
            phone: provider.phone,
            city: provider.city,
        },
    }))
}

async fn provider_services(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let provider_id = path.into_inner();

    let services = sqlx::query_as::<_, OwnedServiceItem>(
        r#"SELECT id, title, description, category, price, rating, review_count, is_active
           FROM services
           WHERE provider_id = ? AND is_active = 1
           ORDER BY created_at DESC, id DESC"#,
    )
    .bind(provider_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(owned_to_json(services)))
}

async fn my_services(
    state: web::Data<AppState>,
    query: web::Query<MyServicesQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = query
        .into_inner()
        .user_id
        .ok_or_else(|| ApiError::Validation("user_id query parameter is required".to_string()))?;

    // Includes deactivated services so owners can see their full catalog.
    let services = sqlx::query_as::<_, OwnedServiceItem>(
        r#"SELECT id, title, description, category, price, rating, review_count, is_active
           FROM services
           WHERE provider_id = ?
           ORDER BY created_at DESC, id DESC"#,
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(owned_to_json(services)))
}

fn owned_to_json(services: Vec<OwnedServiceItem>) -> Vec<serde_json::Value> {
    services
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "title": s.title,
                "description": s.description,
                "category": s.category,
                "price": s.price,
                "rating": s.rating,
                "review_count": s.review_count,
                "is_active": s.is_active != 0,
            })
        })
        .collect()
}

async fn deactivate_service(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let service_id = path.into_inner();

    let result = sqlx::query("UPDATE services SET is_active = 0 WHERE id = ?")
        .bind(service_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Service not found".to_string()));
    }

    log::info!("Service {service_id} deactivated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Service deactivated" })))
}

async fn categories(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT DISTINCT category FROM services WHERE TRIM(category) <> '' ORDER BY category",
    )
    .fetch_all(&state.db)
    .await?;

    let categories: Vec<String> = rows.into_iter().map(|(category,)| category).collect();
    Ok(HttpResponse::Ok().json(categories))
}
