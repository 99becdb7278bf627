//! Shared mock of the customer API for integration tests.
//!
//! Serves the envelope protocol (`{success, data, message}`) over a real
//! socket so the full client stack - bearer auth, 401 recovery, form
//! encoding - is exercised end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use clovemart_client::config::ClientConfig;
use clovemart_client::CustomerClient;

pub const LOGIN_TOKEN: &str = "tok-login";
pub const REFRESHED_TOKEN: &str = "tok-refreshed";

/// One server-side cart line. Prices are plain rupee amounts.
#[derive(Clone)]
pub struct MockLine {
    pub variant_id: i64,
    pub product_name: &'static str,
    pub variant_name: &'static str,
    pub price: i64,
    pub quantity: u32,
    pub stock: u32,
}

struct MockInner {
    /// The bearer token the server currently accepts.
    accepted_token: Mutex<String>,
    refresh_calls: AtomicUsize,
    /// When false, the refresh endpoint rejects the exchange.
    refresh_succeeds: AtomicBool,
    /// Token handed out by a successful refresh.
    refresh_token: Mutex<String>,
    /// When false, `cart/validate` flags every line as unavailable.
    stock_available: AtomicBool,
    order_creates: AtomicUsize,
    last_order_form: Mutex<Option<HashMap<String, String>>>,
    cart: Mutex<Vec<MockLine>>,
}

#[derive(Clone)]
pub struct MockApi {
    inner: Arc<MockInner>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner {
                accepted_token: Mutex::new(LOGIN_TOKEN.to_string()),
                refresh_calls: AtomicUsize::new(0),
                refresh_succeeds: AtomicBool::new(true),
                refresh_token: Mutex::new(REFRESHED_TOKEN.to_string()),
                stock_available: AtomicBool::new(true),
                order_creates: AtomicUsize::new(0),
                last_order_form: Mutex::new(None),
                cart: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Bind an ephemeral port, serve the API under `/customer`, and return
    /// the base URL.
    pub async fn spawn(&self) -> String {
        let customer = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh-token", post(refresh_token))
            .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
            .route("/cart/count", get(cart_count))
            .route("/cart/validate", post(validate_stock))
            .route("/cart/update", axum::routing::patch(update_cart))
            .route("/cart/remove", delete(remove_from_cart))
            .route("/addresses/{id}", get(get_address))
            .route("/coupons/{code}", get(get_coupon))
            .route("/orders", post(create_order))
            .with_state(self.clone());
        let app = Router::new().nest("/customer", customer);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve mock api");
        });

        format!("http://{addr}/customer")
    }

    /// A client wired to this mock with an in-memory token store.
    pub async fn client(&self) -> CustomerClient {
        let base = self.spawn().await;
        let config = ClientConfig::new(&base).expect("client config");
        CustomerClient::new(config).expect("client")
    }

    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn order_creates(&self) -> usize {
        self.inner.order_creates.load(Ordering::SeqCst)
    }

    pub fn last_order_form(&self) -> Option<HashMap<String, String>> {
        self.inner
            .last_order_form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make the server reject the currently held client token, simulating
    /// expiry server-side.
    pub fn expire_current_token(&self) {
        *self
            .inner
            .accepted_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = "tok-rotated-away".to_string();
    }

    pub fn set_refresh_succeeds(&self, succeeds: bool) {
        self.inner.refresh_succeeds.store(succeeds, Ordering::SeqCst);
    }

    /// Hand out a refresh token the server will not accept afterwards,
    /// forcing the replayed request to fail again.
    pub fn poison_refresh_token(&self) {
        *self
            .inner
            .refresh_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = "tok-still-wrong".to_string();
    }

    pub fn set_stock_available(&self, available: bool) {
        self.inner.stock_available.store(available, Ordering::SeqCst);
    }

    pub fn seed_cart(&self, lines: Vec<MockLine>) {
        *self.inner.cart.lock().unwrap_or_else(PoisonError::into_inner) = lines;
    }

    pub fn cart_len(&self) -> usize {
        self.inner
            .cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let accepted = self
            .inner
            .accepted_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let expected = format!("Bearer {accepted}");
        let presented = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented == expected {
            Ok(())
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"success": false, "message": "unauthorized"})),
            )
                .into_response())
        }
    }

    fn cart_json(&self) -> Value {
        let cart = self
            .inner
            .cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let items: Vec<Value> = cart
            .iter()
            .map(|line| {
                json!({
                    "product_variant_id": line.variant_id,
                    "product_name": line.product_name,
                    "variant_name": line.variant_name,
                    "price": line.price,
                    "quantity": line.quantity,
                    "available_stock": line.stock,
                })
            })
            .collect();
        let total_items: u32 = cart.iter().map(|l| l.quantity).sum();
        let subtotal: i64 = cart
            .iter()
            .map(|l| l.price * i64::from(l.quantity))
            .sum();
        json!({
            "items": items,
            "summary": {
                "totalItems": total_items,
                "subtotal": subtotal,
                "tax": 0,
                "total": subtotal,
            },
        })
    }
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({"success": true, "data": data}))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn login(
    State(api): State<MockApi>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if form.get("password").map(String::as_str) != Some("secret") {
        return Json(json!({"success": false, "message": "Invalid credentials"}))
            .into_response();
    }
    *api.inner
        .accepted_token
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = LOGIN_TOKEN.to_string();
    ok(json!({
        "accessToken": LOGIN_TOKEN,
        "user": {"id": 7, "name": "Asha", "email": form.get("email"), "phone": null},
    }))
    .into_response()
}

async fn refresh_token(State(api): State<MockApi>) -> Response {
    api.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Widen the race window so truly concurrent callers overlap here.
    tokio::time::sleep(Duration::from_millis(50)).await;

    if !api.inner.refresh_succeeds.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "refresh cookie invalid"})),
        )
            .into_response();
    }

    let fresh = api
        .inner
        .refresh_token
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    *api.inner
        .accepted_token
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = REFRESHED_TOKEN.to_string();
    ok(json!({"accessToken": fresh})).into_response()
}

async fn get_cart(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    match api.authorize(&headers) {
        Ok(()) => ok(api.cart_json()).into_response(),
        Err(denied) => denied,
    }
}

async fn cart_count(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    let count: u32 = api
        .inner
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|l| l.quantity)
        .sum();
    ok(json!({"itemCount": count})).into_response()
}

async fn add_to_cart(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    let variant_id: i64 = form
        .get("product_variant_id")
        .and_then(|v| v.parse().ok())
        .expect("variant id");
    let quantity: u32 = form
        .get("quantity")
        .and_then(|v| v.parse().ok())
        .expect("quantity");

    let mut cart = api
        .inner
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(line) = cart.iter_mut().find(|l| l.variant_id == variant_id) {
        line.quantity += quantity;
    } else {
        cart.push(MockLine {
            variant_id,
            product_name: "Basmati Rice",
            variant_name: "1 kg",
            price: 100,
            quantity,
            stock: 10,
        });
    }
    ok(Value::Null).into_response()
}

async fn update_cart(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    let variant_id: i64 = form
        .get("product_variant_id")
        .and_then(|v| v.parse().ok())
        .expect("variant id");
    let quantity: u32 = form
        .get("quantity")
        .and_then(|v| v.parse().ok())
        .expect("quantity");

    let mut cart = api
        .inner
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(line) = cart.iter_mut().find(|l| l.variant_id == variant_id) {
        line.quantity = quantity;
    }
    ok(Value::Null).into_response()
}

async fn remove_from_cart(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    let variant_id: i64 = form
        .get("product_variant_id")
        .and_then(|v| v.parse().ok())
        .expect("variant id");
    api.inner
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|l| l.variant_id != variant_id);
    ok(Value::Null).into_response()
}

async fn clear_cart(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    api.inner
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    ok(Value::Null).into_response()
}

async fn validate_stock(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    if api.inner.stock_available.load(Ordering::SeqCst) {
        return ok(json!({"isValid": true, "invalidItems": []})).into_response();
    }
    let invalid: Vec<Value> = api
        .inner
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|l| {
            json!({
                "product_variant_id": l.variant_id,
                "product_name": l.product_name,
                "requested": l.quantity,
                "available": 1,
            })
        })
        .collect();
    ok(json!({"isValid": false, "invalidItems": invalid})).into_response()
}

async fn get_address(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    if id != 11 {
        return Json(json!({"success": false, "message": "Address not found"}))
            .into_response();
    }
    ok(json!({
        "id": id,
        "address": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "country": "India",
        "pincode": "560001",
        "is_default": true,
    }))
    .into_response()
}

async fn get_coupon(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    match code.as_str() {
        "SAVE100" => ok(json!({
            "code": "SAVE100",
            "flat_discount": 100,
            "valid_to_date": "2099-12-31",
            "quantity": 5,
        }))
        .into_response(),
        "OLD50" => ok(json!({
            "code": "OLD50",
            "flat_discount": 50,
            "valid_to_date": "2020-01-01",
            "quantity": 5,
        }))
        .into_response(),
        _ => Json(json!({"success": false, "message": "Coupon not found"})).into_response(),
    }
}

async fn create_order(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = api.authorize(&headers) {
        return denied;
    }
    api.inner.order_creates.fetch_add(1, Ordering::SeqCst);
    let subtotal = form
        .get("subtotal")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or_default();
    let total = form
        .get("total")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or_default();
    *api.inner
        .last_order_form
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(form);

    ok(json!({
        "order": {
            "id": 901,
            "delivery_status": "pending",
            "payment_mode": "cod",
            "subtotal": subtotal,
            "total": total,
            "created_at": "2026-08-26T10:00:00Z",
        },
    }))
    .into_response()
}
