use actix_http::Request;
use actix_web::{
    body::BoxBody,
    dev::{Service, ServiceResponse},
    test, web, App, Error,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;

use sokohub::{configure_app, state::AppState};

async fn spawn_app() -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    test::init_service(
        App::new()
            .app_data(web::Data::new(AppState { db: pool }))
            .configure(configure_app),
    )
    .await
}

async fn post_json<S>(app: &S, path: &str, body: Value) -> (u16, Value)
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let req = test::TestRequest::post()
        .uri(path)
        .set_json(&body)
        .to_request();
    let res = test::call_service(app, req).await;
    let status = res.status().as_u16();
    (status, test::read_body_json(res).await)
}

async fn put_json<S>(app: &S, path: &str, body: Value) -> (u16, Value)
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let req = test::TestRequest::put()
        .uri(path)
        .set_json(&body)
        .to_request();
    let res = test::call_service(app, req).await;
    let status = res.status().as_u16();
    (status, test::read_body_json(res).await)
}

async fn get_json<S>(app: &S, path: &str) -> (u16, Value)
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let req = test::TestRequest::get().uri(path).to_request();
    let res = test::call_service(app, req).await;
    let status = res.status().as_u16();
    (status, test::read_body_json(res).await)
}

async fn register<S>(app: &S, name: &str, email: &str, role: &str) -> i64
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let (status, body) = post_json(
        app,
        "/auth/register",
        json!({
            "name": name,
            "email": email,
            "password": "password123",
            "role": role,
            "phone": "+254712345678",
            "city": "Nairobi",
        }),
    )
    .await;
    assert_eq!(status, 201, "register failed: {body}");
    body["user_id"].as_i64().expect("user_id")
}

async fn create_service<S>(
    app: &S,
    provider_id: i64,
    title: &str,
    category: &str,
    city: &str,
    price: f64,
) -> i64
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let (status, body) = post_json(
        app,
        "/services",
        json!({
            "title": title,
            "description": "A detailed description of what this service offers",
            "category": category,
            "provider_id": provider_id,
            "price": price,
            "city": city,
        }),
    )
    .await;
    assert_eq!(status, 201, "create service failed: {body}");
    body["service_id"].as_i64().expect("service_id")
}

async fn create_booking<S>(app: &S, service_id: i64, buyer_id: i64, duration: f64) -> i64
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let (status, body) = post_json(
        app,
        "/bookings",
        json!({
            "service_id": service_id,
            "buyer_id": buyer_id,
            "booking_date": "2026-09-01T10:00:00",
            "duration": duration,
        }),
    )
    .await;
    assert_eq!(status, 201, "create booking failed: {body}");
    body["booking_id"].as_i64().expect("booking_id")
}

async fn set_booking_status<S>(app: &S, booking_id: i64, status: &str) -> u16
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let (code, _) = put_json(
        app,
        &format!("/bookings/{booking_id}/status"),
        json!({ "status": status }),
    )
    .await;
    code
}

#[actix_web::test]
async fn health_reports_liveness() {
    let app = spawn_app().await;
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn register_validates_input_and_rejects_duplicates() {
    let app = spawn_app().await;

    let (status, body) = post_json(
        &app,
        "/auth/register",
        json!({
            "name": "J",
            "email": "not-an-email",
            "password": "123",
            "role": "admin",
        }),
    )
    .await;
    assert_eq!(status, 400);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Name"), "unexpected error: {message}");
    assert!(message.contains("email"), "unexpected error: {message}");
    assert!(message.contains("Password"), "unexpected error: {message}");
    assert!(message.contains("Role"), "unexpected error: {message}");

    register(&app, "John Kamau", "john@example.com", "provider").await;

    let (status, body) = post_json(
        &app,
        "/auth/register",
        json!({
            "name": "John Again",
            "email": "john@example.com",
            "password": "password123",
            "role": "provider",
        }),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "User already exists");
}

#[actix_web::test]
async fn email_uniqueness_is_case_sensitive() {
    let app = spawn_app().await;

    register(&app, "Upper", "John@Example.com", "buyer").await;
    // Same letters, different case: a distinct account, not a conflict.
    register(&app, "Lower", "john@example.com", "buyer").await;
}

#[actix_web::test]
async fn login_hides_account_enumeration() {
    let app = spawn_app().await;
    register(&app, "Grace Wanjiku", "grace@example.com", "provider").await;

    let (status, body) = post_json(
        &app,
        "/auth/login",
        json!({ "email": "grace@example.com", "password": "password123" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["user"]["email"], "grace@example.com");
    assert_eq!(body["user"]["role"], "provider");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["user"].get("password").is_none());

    let (wrong_status, wrong_body) = post_json(
        &app,
        "/auth/login",
        json!({ "email": "grace@example.com", "password": "wrong-password" }),
    )
    .await;
    let (missing_status, missing_body) = post_json(
        &app,
        "/auth/login",
        json!({ "email": "nobody@example.com", "password": "password123" }),
    )
    .await;
    assert_eq!(wrong_status, 401);
    assert_eq!(missing_status, 401);
    assert_eq!(wrong_body, missing_body);
}

#[actix_web::test]
async fn service_round_trips_with_defaults() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;

    let (status, body) = post_json(
        &app,
        "/services",
        json!({
            "title": "Professional Home Cleaning",
            "description": "Thorough home cleaning with eco-friendly products",
            "category": "cleaning",
            "provider_id": provider,
            "price": 1500.0,
            "price_type": "fixed",
            "city": "Nairobi",
            "serves_area": "Westlands, Kilimani",
            "availability_days": "mon,tue,wed",
            "availability_start": "08:00",
            "availability_end": "18:00",
        }),
    )
    .await;
    assert_eq!(status, 201, "create failed: {body}");
    let service_id = body["service_id"].as_i64().unwrap();

    let (status, body) = get_json(&app, &format!("/services/{service_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(body["title"], "Professional Home Cleaning");
    assert_eq!(body["category"], "cleaning");
    assert_eq!(body["price"], 1500.0);
    assert_eq!(body["price_type"], "fixed");
    assert_eq!(body["city"], "Nairobi");
    assert_eq!(body["serves_area"], "Westlands, Kilimani");
    assert_eq!(body["availability_days"], "mon,tue,wed");
    assert_eq!(body["availability_start"], "08:00");
    assert_eq!(body["availability_end"], "18:00");
    assert_eq!(body["rating"], 0.0);
    assert_eq!(body["review_count"], 0);
    assert_eq!(body["is_active"], true);
    assert_eq!(body["provider"]["id"], provider);
    assert_eq!(body["provider"]["name"], "John Kamau");

    let (status, _) = get_json(&app, "/services/9999").await;
    assert_eq!(status, 404);

    let (status, body) = post_json(
        &app,
        "/services",
        json!({
            "title": "Bad",
            "description": "short",
            "category": "",
            "provider_id": provider,
            "price": 0.0,
            "city": "",
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("Title"));
}

#[actix_web::test]
async fn service_filters_combine_with_and() {
    let app = spawn_app().await;
    let p1 = register(&app, "John Kamau", "john@example.com", "provider").await;
    let p2 = register(&app, "Grace Wanjiku", "grace@example.com", "provider").await;

    create_service(&app, p1, "Home Cleaning Nairobi", "cleaning", "Nairobi", 1500.0).await;
    create_service(&app, p1, "Plumbing Repairs", "plumbing", "Nairobi", 2500.0).await;
    create_service(&app, p2, "Cleaning Mombasa Homes", "cleaning", "Mombasa", 1200.0).await;

    let (status, body) = get_json(&app, "/services").await;
    assert_eq!(status, 200);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = get_json(&app, "/services?category=cleaning&city=nairobi").await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Home Cleaning Nairobi");
    assert_eq!(items[0]["provider_name"], "John Kamau");

    // Case-insensitive substring over title OR description.
    let (_, body) = get_json(&app, "/services/search?q=CLEANING").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = get_json(&app, "/services/search?q=cleaning&max_price=1300").await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Cleaning Mombasa Homes");

    let (_, body) = get_json(&app, "/categories").await;
    assert_eq!(body, json!(["cleaning", "plumbing"]));
}

#[actix_web::test]
async fn deactivated_services_drop_out_of_listings() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let service = create_service(&app, provider, "Home Cleaning", "cleaning", "Nairobi", 1500.0).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/services/{service}"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 200);

    let (_, body) = get_json(&app, "/services").await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (_, body) = get_json(&app, &format!("/services/provider/{provider}")).await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    // The owner's view still includes it, flagged inactive.
    let (_, body) = get_json(&app, &format!("/me/services?user_id={provider}")).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["is_active"], false);
}

#[actix_web::test]
async fn booking_price_is_computed_server_side() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;
    let service = create_service(&app, provider, "Math Tutoring", "tutoring", "Nairobi", 800.0).await;

    // A client-supplied total_price is ignored.
    let (status, body) = post_json(
        &app,
        "/bookings",
        json!({
            "service_id": service,
            "buyer_id": buyer,
            "booking_date": "2026-09-01T10:00:00",
            "duration": 2.0,
            "total_price": 1.0,
        }),
    )
    .await;
    assert_eq!(status, 201);
    let booking = body["booking_id"].as_i64().unwrap();

    let (_, body) = get_json(&app, &format!("/bookings/user/{buyer}")).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], booking);
    assert_eq!(items[0]["total_price"], 1600.0);
    assert_eq!(items[0]["status"], "pending");

    // Duration defaults to 1.
    let (status, body) = post_json(
        &app,
        "/bookings",
        json!({
            "service_id": service,
            "buyer_id": buyer,
            "booking_date": "2026-09-02T10:00:00",
        }),
    )
    .await;
    assert_eq!(status, 201, "default-duration booking failed: {body}");
    let (_, body) = get_json(&app, &format!("/bookings/user/{buyer}")).await;
    assert_eq!(body.as_array().unwrap()[0]["total_price"], 800.0);
}

#[actix_web::test]
async fn booking_rejects_missing_fields_and_unknown_service() {
    let app = spawn_app().await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;

    let (status, body) = post_json(&app, "/bookings", json!({ "buyer_id": buyer })).await;
    assert_eq!(status, 400);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Service ID"));
    assert!(message.contains("Booking date"));

    let (status, body) = post_json(
        &app,
        "/bookings",
        json!({
            "service_id": 9999,
            "buyer_id": buyer,
            "booking_date": "2026-09-01T10:00:00",
        }),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Service not found");
}

#[actix_web::test]
async fn booking_status_transitions_are_enforced() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;
    let service = create_service(&app, provider, "Home Cleaning", "cleaning", "Nairobi", 1500.0).await;

    let cancelled = create_booking(&app, service, buyer, 1.0).await;
    assert_eq!(set_booking_status(&app, cancelled, "cancelled").await, 200);
    // Terminal: nothing leaves cancelled.
    assert_eq!(set_booking_status(&app, cancelled, "confirmed").await, 409);

    let booking = create_booking(&app, service, buyer, 1.0).await;
    // pending cannot skip straight to completed.
    assert_eq!(set_booking_status(&app, booking, "completed").await, 409);
    assert_eq!(set_booking_status(&app, booking, "confirmed").await, 200);
    assert_eq!(set_booking_status(&app, booking, "completed").await, 200);
    assert_eq!(set_booking_status(&app, booking, "pending").await, 409);

    let (status, body) = put_json(
        &app,
        &format!("/bookings/{booking}/status"),
        json!({ "status": "accepted" }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("Unknown booking status"));

    let (status, _) = put_json(
        &app,
        "/bookings/9999/status",
        json!({ "status": "confirmed" }),
    )
    .await;
    assert_eq!(status, 404);

    // The dedicated completion endpoint applies the same table.
    let other = create_booking(&app, service, buyer, 1.0).await;
    let (status, body) = post_json(&app, "/bookings/complete", json!({ "booking_id": other })).await;
    assert_eq!(status, 409, "pending booking completed directly: {body}");
    assert_eq!(set_booking_status(&app, other, "confirmed").await, 200);
    let (status, _) = post_json(&app, "/bookings/complete", json!({ "booking_id": other })).await;
    assert_eq!(status, 200);
}

#[actix_web::test]
async fn user_bookings_union_both_roles() {
    let app = spawn_app().await;
    let alice = register(&app, "Alice Provider", "alice@example.com", "provider").await;
    let bob = register(&app, "Bob Provider", "bob@example.com", "provider").await;

    let alice_service = create_service(&app, alice, "Alice Cleaning", "cleaning", "Nairobi", 1000.0).await;
    let bob_service = create_service(&app, bob, "Bob Plumbing", "plumbing", "Nakuru", 2000.0).await;

    // Alice books Bob's service (buyer side) and receives a booking on her own
    // service (provider side).
    let as_buyer = create_booking(&app, bob_service, alice, 1.0).await;
    let as_provider = create_booking(&app, alice_service, bob, 1.0).await;

    let (_, body) = get_json(&app, &format!("/bookings/user/{alice}")).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&as_buyer));
    assert!(ids.contains(&as_provider));
}

#[actix_web::test]
async fn dashboard_earnings_track_completed_bookings() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;
    let service = create_service(&app, provider, "Home Cleaning", "cleaning", "Nairobi", 1500.0).await;

    let booking = create_booking(&app, service, buyer, 2.0).await;

    let (_, body) = get_json(&app, &format!("/provider/{provider}/dashboard")).await;
    assert_eq!(body["stats"]["total_services"], 1);
    assert_eq!(body["stats"]["total_bookings"], 1);
    assert_eq!(body["stats"]["pending_bookings"], 1);
    // A pending booking earns nothing.
    assert_eq!(body["stats"]["total_earnings"], 0.0);
    assert_eq!(body["recent_bookings"].as_array().unwrap().len(), 1);

    set_booking_status(&app, booking, "confirmed").await;
    set_booking_status(&app, booking, "completed").await;

    let (_, body) = get_json(&app, &format!("/provider/{provider}/dashboard")).await;
    assert_eq!(body["stats"]["pending_bookings"], 0);
    assert_eq!(body["stats"]["total_earnings"], 3000.0);

    let (_, body) = get_json(&app, &format!("/providers/{provider}/earnings")).await;
    assert_eq!(body["total_earnings"], 3000.0);
    assert_eq!(body["payment_count"], 0);

    let (_, body) = get_json(&app, &format!("/provider/{provider}/bookings")).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["buyer_name"], "Sarah Achieng");
}

#[actix_web::test]
async fn reviews_recompute_rating_and_enforce_rules() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;
    let outsider = register(&app, "Random User", "random@example.com", "buyer").await;
    let service = create_service(&app, provider, "Home Cleaning", "cleaning", "Nairobi", 1500.0).await;

    let first = create_booking(&app, service, buyer, 1.0).await;
    let second = create_booking(&app, service, buyer, 1.0).await;

    let (status, body) = post_json(
        &app,
        "/reviews",
        json!({
            "booking_id": first,
            "reviewer_id": outsider,
            "reviewee_id": provider,
            "rating": 5,
        }),
    )
    .await;
    assert_eq!(status, 400, "outsider review allowed: {body}");

    let (status, _) = post_json(
        &app,
        "/reviews",
        json!({
            "booking_id": first,
            "reviewer_id": buyer,
            "reviewee_id": provider,
            "rating": 6,
        }),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post_json(
        &app,
        "/reviews",
        json!({
            "booking_id": first,
            "reviewer_id": buyer,
            "reviewee_id": provider,
            "rating": 5,
            "comment": "Excellent job, asante sana!",
        }),
    )
    .await;
    assert_eq!(status, 201);

    let (_, body) = get_json(&app, &format!("/services/{service}")).await;
    assert_eq!(body["rating"], 5.0);
    assert_eq!(body["review_count"], 1);

    // One review per (booking, reviewer).
    let (status, body) = post_json(
        &app,
        "/reviews",
        json!({
            "booking_id": first,
            "reviewer_id": buyer,
            "reviewee_id": provider,
            "rating": 1,
        }),
    )
    .await;
    assert_eq!(status, 409, "duplicate review allowed: {body}");

    // The provider can review the buyer on the same booking.
    let (status, _) = post_json(
        &app,
        "/reviews",
        json!({
            "booking_id": first,
            "reviewer_id": provider,
            "reviewee_id": buyer,
            "rating": 4,
            "comment": "Great client",
        }),
    )
    .await;
    assert_eq!(status, 201);

    let (status, _) = post_json(
        &app,
        "/reviews",
        json!({
            "booking_id": second,
            "reviewer_id": buyer,
            "reviewee_id": provider,
            "rating": 3,
        }),
    )
    .await;
    assert_eq!(status, 201);

    // Rating averages the buyer's 5 and 3 plus the provider's 4 across the
    // service's bookings.
    let (_, body) = get_json(&app, &format!("/services/{service}")).await;
    assert_eq!(body["rating"], 4.0);
    assert_eq!(body["review_count"], 3);

    let (_, body) = get_json(&app, &format!("/reviews/provider/{provider}")).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|r| r["reviewer_name"] == "Sarah Achieng"));

    let (_, body) = get_json(&app, &format!("/reviews/service/{service}")).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    // min_rating is an inclusive floor over the recomputed value.
    let (_, body) = get_json(&app, "/services?min_rating=4.0").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = get_json(&app, "/services?min_rating=4.5").await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn payment_flow_settles_and_completes_booking() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;
    let service = create_service(&app, provider, "Home Cleaning", "cleaning", "Nairobi", 1500.0).await;
    let booking = create_booking(&app, service, buyer, 2.0).await;

    set_booking_status(&app, booking, "confirmed").await;

    let (status, body) = post_json(
        &app,
        "/payments/initiate",
        json!({ "booking_id": booking, "phone_number": "+254712345678" }),
    )
    .await;
    assert_eq!(status, 201, "initiate failed: {body}");
    let payment = body["payment_id"].as_i64().unwrap();
    assert_eq!(body["amount"], 3000.0);
    assert_eq!(body["commission"], 300.0);
    assert_eq!(body["seller_amount"], 2700.0);
    assert_eq!(body["status"], "pending");

    // A second initiation for the same booking conflicts while one is open.
    let (status, _) = post_json(
        &app,
        "/payments/initiate",
        json!({ "booking_id": booking, "phone_number": "+254712345678" }),
    )
    .await;
    assert_eq!(status, 409);

    let (status, body) = post_json(
        &app,
        "/payments/confirm",
        json!({ "payment_id": payment, "mpesa_receipt": "MPESA12345" }),
    )
    .await;
    assert_eq!(status, 200, "confirm failed: {body}");
    assert_eq!(body["status"], "success");

    // Payment success moved the confirmed booking to completed.
    let (_, body) = get_json(&app, &format!("/bookings/user/{buyer}")).await;
    assert_eq!(body.as_array().unwrap()[0]["status"], "completed");

    let (_, body) = get_json(&app, &format!("/payments/{payment}")).await;
    assert_eq!(body["booking_id"], booking);
    assert_eq!(body["mpesa_receipt"], "MPESA12345");
    assert_eq!(body["status"], "success");
    assert_eq!(body["phone_number"], "+254712345678");

    // Settled payments are terminal.
    let (status, _) = post_json(
        &app,
        "/payments/confirm",
        json!({ "payment_id": payment }),
    )
    .await;
    assert_eq!(status, 409);

    let (_, body) = get_json(&app, &format!("/providers/{provider}/earnings")).await;
    assert_eq!(body["total_earnings"], 3000.0);
    assert_eq!(body["total_commission"], 300.0);
    assert_eq!(body["payment_count"], 1);
    let recent = body["recent_payments"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["service_title"], "Home Cleaning");
    assert_eq!(recent[0]["amount"], 3000.0);
}

#[actix_web::test]
async fn completed_unpaid_tracks_outstanding_payments() {
    let app = spawn_app().await;
    let provider = register(&app, "John Kamau", "john@example.com", "provider").await;
    let buyer = register(&app, "Sarah Achieng", "sarah@example.com", "buyer").await;
    let service = create_service(&app, provider, "Home Cleaning", "cleaning", "Nairobi", 1500.0).await;
    let booking = create_booking(&app, service, buyer, 1.0).await;

    set_booking_status(&app, booking, "confirmed").await;
    set_booking_status(&app, booking, "completed").await;

    // Completed with no payment: outstanding for both parties.
    let (_, body) = get_json(&app, &format!("/users/{buyer}/completed-unpaid")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = get_json(&app, &format!("/users/{provider}/completed-unpaid")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = post_json(
        &app,
        "/payments/initiate",
        json!({ "booking_id": booking, "phone_number": "+254712345678" }),
    )
    .await;
    let payment = body["payment_id"].as_i64().unwrap();

    // A pending payment already takes the booking off the list.
    let (_, body) = get_json(&app, &format!("/users/{buyer}/completed-unpaid")).await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    // A failed attempt puts it back and allows re-initiation.
    let (status, _) = post_json(
        &app,
        "/payments/confirm",
        json!({ "payment_id": payment, "status": "failed" }),
    )
    .await;
    assert_eq!(status, 200);
    let (_, body) = get_json(&app, &format!("/users/{buyer}/completed-unpaid")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (status, _) = post_json(
        &app,
        "/payments/initiate",
        json!({ "booking_id": booking, "phone_number": "+254712345678" }),
    )
    .await;
    assert_eq!(status, 201);
}
