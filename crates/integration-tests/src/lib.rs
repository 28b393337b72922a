//! Integration tests for Spaza.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p spaza-integration-tests
//! ```
//!
//! No external services are needed: [`FakeShop`] serves the shop REST API
//! from memory on an ephemeral local port, and [`storefront`] wires an
//! [`AppState`] against it with the session persisted under a temp dir.
//!
//! # Test Categories
//!
//! - `api_client` - Wire format and status handling of the HTTP client
//! - `shopping_flow` - Sign-in, cart, checkout and invoice end to end
//! - `session_expiry` - Stored tokens the server no longer accepts

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use spaza_storefront::AppState;
use spaza_storefront::config::StorefrontConfig;
use spaza_storefront::models::FileSessionStore;
use spaza_storefront::services::{NoticeReceiver, TextInvoiceRenderer, notices};

// =============================================================================
// Fake shop
// =============================================================================

/// In-memory stand-in for the remote shop API.
///
/// Stops serving when dropped.
pub struct FakeShop {
    addr: SocketAddr,
    shared: Arc<Mutex<Shop>>,
    server: JoinHandle<()>,
}

#[derive(Default)]
struct Shop {
    products: Vec<Value>,
    /// email → (password, first name)
    users: HashMap<String, (String, String)>,
    /// token → email
    tokens: HashMap<String, String>,
    /// email → lines
    carts: HashMap<String, Vec<StoredLine>>,
    orders: Vec<Value>,
    /// Status to answer the next order request with instead of 200.
    order_status: Option<StatusCode>,
    /// Paths of requests made to authenticated endpoints.
    authorized_calls: HashSet<String>,
    next_id: u64,
}

struct StoredLine {
    id: String,
    product_id: String,
    quantity: u32,
}

impl Shop {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn product(&self, id: &str) -> Option<&Value> {
        self.products.iter().find(|p| p["id"] == id)
    }

    fn user_for(&mut self, path: &str, headers: &HeaderMap) -> Result<String, Response> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        self.authorized_calls.insert(path.to_string());
        token
            .and_then(|t| self.tokens.get(t).cloned())
            .ok_or_else(|| message(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }

    fn cart_json(&self, email: &str) -> Value {
        let lines: Vec<Value> = self
            .carts
            .get(email)
            .into_iter()
            .flatten()
            .filter_map(|line| {
                self.product(&line.product_id).map(|product| {
                    json!({ "id": line.id, "product": product, "quantity": line.quantity })
                })
            })
            .collect();
        json!({ "cartItems": lines })
    }
}

impl FakeShop {
    /// Start serving a small seeded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        let shop = Shop {
            products: vec![
                product("p-chips", "Simba Chips", 19.99, "Snacks"),
                product("p-rooibos", "Rooibos Tea", 45.50, "Drinks"),
                product("p-rusks", "Ouma Rusks", 54.00, "Snacks"),
            ],
            ..Shop::default()
        };
        let shared = Arc::new(Mutex::new(shop));

        let router = Router::new()
            .route("/auth/validate", get(validate))
            .route("/product/", get(list_products))
            .route("/product/{id}", get(get_product))
            .route("/cart/", get(get_cart))
            .route("/cart/add", post(add_to_cart))
            .route("/cart/delete/{id}", delete(remove_from_cart))
            .route("/cart/update/{id}", patch(update_quantity))
            .route("/order/create-checkout-session", post(create_order))
            .route("/user/signup", post(sign_up))
            .route("/user/signin", post(sign_in))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            addr,
            shared,
            server,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register an account directly, bypassing the sign-up endpoint.
    pub async fn register(&self, email: &str, password: &str) {
        self.shared
            .lock()
            .await
            .users
            .insert(email.to_string(), (password.to_string(), "Test".to_string()));
    }

    /// Issue a token for a registered account without a sign-in request.
    pub async fn issue_token(&self, email: &str) -> String {
        let mut shop = self.shared.lock().await;
        let token = shop.next_id("token");
        shop.tokens.insert(token.clone(), email.to_string());
        token
    }

    /// Invalidate every token handed out so far.
    pub async fn revoke_tokens(&self) {
        self.shared.lock().await.tokens.clear();
    }

    /// Answer the next order request with `status` and no order.
    pub async fn fail_next_order(&self, status: u16) {
        self.shared.lock().await.order_status = StatusCode::from_u16(status).ok();
    }

    /// Order request bodies received so far.
    pub async fn orders(&self) -> Vec<Value> {
        self.shared.lock().await.orders.clone()
    }

    /// `(product_id, quantity)` pairs of a user's server-side cart.
    pub async fn cart_of(&self, email: &str) -> Vec<(String, u32)> {
        self.shared
            .lock()
            .await
            .carts
            .get(email)
            .into_iter()
            .flatten()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect()
    }

    /// Whether a request reached the authenticated endpoint at `path`.
    pub async fn was_called(&self, path: &str) -> bool {
        self.shared.lock().await.authorized_calls.contains(path)
    }
}

impl Drop for FakeShop {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Wire an [`AppState`] against `shop`, persisting the session in `dir`.
///
/// # Errors
///
/// Returns an error if the state cannot be created.
pub fn storefront(
    shop: &FakeShop,
    dir: &Path,
) -> Result<(AppState, NoticeReceiver), Box<dyn std::error::Error>> {
    let mut config = StorefrontConfig::for_base_url(&shop.base_url())?;
    config.session_file = dir.join("session.json");
    config.invoice_dir = dir.to_path_buf();

    let api = Arc::new(spaza_storefront::api::HttpStoreApi::new(&config.api)?);
    let store = Arc::new(FileSessionStore::new(&config.session_file));
    let (notifier, notices) = notices::channel();
    let state = AppState::new(config, api, store, Arc::new(TextInvoiceRenderer), notifier)?;
    Ok((state, notices))
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<Mutex<Shop>>>;

fn product(id: &str, name: &str, price: f64, category: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "imageURL": format!("https://img.example/{id}.png"),
        "category": category,
        "description": format!("{name}, a pantry favourite."),
    })
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

async fn validate(State(shop): Shared, headers: HeaderMap) -> Response {
    match shop.lock().await.user_for("/auth/validate", &headers) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(response) => response,
    }
}

async fn list_products(State(shop): Shared) -> Response {
    Json(shop.lock().await.products.clone()).into_response()
}

async fn get_product(State(shop): Shared, UrlPath(id): UrlPath<String>) -> Response {
    match shop.lock().await.product(&id) {
        Some(product) => Json(product.clone()).into_response(),
        None => message(StatusCode::NOT_FOUND, "Product not found"),
    }
}

async fn get_cart(State(shop): Shared, headers: HeaderMap) -> Response {
    let mut shop = shop.lock().await;
    match shop.user_for("/cart/", &headers) {
        Ok(email) => Json(shop.cart_json(&email)).into_response(),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBody {
    product_id: String,
    quantity: u32,
}

async fn add_to_cart(
    State(shop): Shared,
    headers: HeaderMap,
    Json(body): Json<AddBody>,
) -> Response {
    let mut shop = shop.lock().await;
    let email = match shop.user_for("/cart/add", &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    if shop.product(&body.product_id).is_none() {
        return message(StatusCode::NOT_FOUND, "Product not found");
    }
    let id = shop.next_id("line");
    let lines = shop.carts.entry(email).or_default();
    if lines.iter().any(|l| l.product_id == body.product_id) {
        return message(StatusCode::CONFLICT, "Product already in cart");
    }
    lines.push(StoredLine {
        id,
        product_id: body.product_id,
        quantity: body.quantity,
    });
    StatusCode::CREATED.into_response()
}

async fn remove_from_cart(
    State(shop): Shared,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
) -> Response {
    let mut shop = shop.lock().await;
    let email = match shop.user_for("/cart/delete", &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let lines = shop.carts.entry(email).or_default();
    let before = lines.len();
    lines.retain(|l| l.id != id);
    if lines.len() == before {
        return message(StatusCode::NOT_FOUND, "Cart item not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn update_quantity(
    State(shop): Shared,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<QuantityBody>,
) -> Response {
    let mut shop = shop.lock().await;
    let email = match shop.user_for("/cart/update", &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let lines = shop.carts.entry(email).or_default();
    match lines.iter_mut().find(|l| l.id == id) {
        Some(line) => {
            line.quantity = body.quantity;
            StatusCode::OK.into_response()
        }
        None => message(StatusCode::NOT_FOUND, "Cart item not found"),
    }
}

async fn create_order(
    State(shop): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut shop = shop.lock().await;
    if let Err(response) = shop.user_for("/order/create-checkout-session", &headers) {
        return response;
    }
    if let Some(status) = shop.order_status.take() {
        return message(status, "Order could not be created");
    }
    let id = shop.next_id("order");
    shop.orders.push(body);
    Json(json!({ "orderId": id, "status": "pending" })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpBody {
    first_name: String,
    email: String,
    password: String,
}

async fn sign_up(State(shop): Shared, Json(body): Json<SignUpBody>) -> Response {
    let mut shop = shop.lock().await;
    if shop.users.contains_key(&body.email) {
        return message(StatusCode::CONFLICT, "Email already registered");
    }
    shop.users.insert(body.email, (body.password, body.first_name));
    message(StatusCode::CREATED, "User created")
}

#[derive(Deserialize)]
struct SignInBody {
    email: String,
    password: String,
}

async fn sign_in(State(shop): Shared, Json(body): Json<SignInBody>) -> Response {
    let mut shop = shop.lock().await;
    let known = shop
        .users
        .get(&body.email)
        .is_some_and(|(password, _)| *password == body.password);
    if !known {
        return message(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let token = shop.next_id("token");
    shop.tokens.insert(token.clone(), body.email);
    Json(json!({ "token": token })).into_response()
}
