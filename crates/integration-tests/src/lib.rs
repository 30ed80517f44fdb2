//! Integration tests for Cyclemart.
//!
//! # Running Tests
//!
//! ```bash
//! # Tests that need no database
//! cargo test -p cyclemart-integration-tests
//!
//! # Database-backed tests (migrations are applied automatically)
//! CYCLEMART_TEST_DATABASE_URL=postgres://localhost/cyclemart_test \
//!     cargo test -p cyclemart-integration-tests -- --include-ignored
//! ```
//!
//! Requests go through the real router with `tower::ServiceExt::oneshot`, so
//! no server has to be running. Stripe and storage point at an unroutable
//! address; tests never reach them.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use cyclemart_server::config::{
    AuthConfig, MarketplaceConfig, ServerConfig, StorageConfig, StripeConfig,
};
use cyclemart_server::routes;
use cyclemart_server::state::AppState;

/// Signing secret shared by [`test_config`] and [`bearer`].
pub const JWT_SECRET: &str = "k3J9x!Qm2vT8#pL5wZ7rB4nY6cH1dF0gS";

/// Environment variable naming the test database.
pub const TEST_DATABASE_URL_VAR: &str = "CYCLEMART_TEST_DATABASE_URL";

const UNUSED_DATABASE_URL: &str = "postgres://localhost/cyclemart_unused";

/// Server configuration for tests.
#[must_use]
pub fn test_config(database_url: &str) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from(database_url),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        auth: AuthConfig {
            jwt_secret: SecretString::from(JWT_SECRET),
            audience: "authenticated".to_string(),
        },
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_51NzQ8dLkA93bXvR2mTqW7hY"),
            webhook_secret: Some(SecretString::from("whsec_Zp4rN8vK2qL7xM3tB9wC")),
            api_base: "http://127.0.0.1:9".to_string(),
            currency: "usd".to_string(),
        },
        storage: StorageConfig {
            url: "http://127.0.0.1:9".to_string(),
            service_key: SecretString::from("svc_Qe7Lm2Xr9Tz4Kb8Nw3Hp"),
            bucket: "product-images".to_string(),
        },
        marketplace: MarketplaceConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The application over a pool that never connects.
///
/// Good for anything rejected before the first query: auth, validation,
/// malformed input.
///
/// # Panics
///
/// Panics if the state cannot be built.
#[must_use]
pub fn offline_app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy(UNUSED_DATABASE_URL)
        .expect("Failed to create lazy pool");
    let state = AppState::new(test_config(UNUSED_DATABASE_URL), pool)
        .expect("Failed to create application state");
    routes::app(state)
}

/// A migrated test database and the application on top of it.
pub struct TestContext {
    pub pool: PgPool,
    pub app: Router,
}

impl TestContext {
    /// Connect to the test database and apply migrations.
    ///
    /// # Panics
    ///
    /// Panics if the database URL is unset or the database is unreachable.
    pub async fn new() -> Self {
        let url = std::env::var(TEST_DATABASE_URL_VAR)
            .unwrap_or_else(|_| panic!("{TEST_DATABASE_URL_VAR} must be set"));

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("../server/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let state =
            AppState::new(test_config(&url), pool.clone()).expect("Failed to create state");

        Self {
            pool,
            app: routes::app(state),
        }
    }

    /// Send a request to the application.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        call(&self.app, method, uri, token, body).await
    }
}

/// A bearer token for `user`.
///
/// # Panics
///
/// Panics if encoding fails.
#[must_use]
pub fn bearer(user: Uuid, admin: bool) -> String {
    let mut claims = json!({
        "sub": user,
        "email": format!("{}@riders.test", user.simple()),
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    if admin {
        claims["app_metadata"] = json!({ "role": "admin" });
    }
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode token");
    format!("Bearer {token}")
}

/// Send a request through `app` and decode the JSON response (if any).
///
/// # Panics
///
/// Panics if the request cannot be built or the body cannot be read.
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// A short unique suffix for slugs, so tests can share a database.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id.get(..12).unwrap_or(&id))
}

/// A seller with a store, plus a top-level category to list under.
pub struct Marketplace {
    pub admin: String,
    pub seller: String,
    pub store_id: String,
    pub category_id: String,
}

impl Marketplace {
    /// Create a category and a store through the API.
    ///
    /// # Panics
    ///
    /// Panics if any setup request fails.
    pub async fn seed(ctx: &TestContext) -> Self {
        let admin = bearer(Uuid::new_v4(), true);
        let seller = bearer(Uuid::new_v4(), false);

        let (status, category) = ctx
            .call(
                Method::POST,
                "/api/admin/categories",
                Some(&admin),
                Some(json!({ "name": "Road", "slug": unique("road"), "position": 0 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{category}");

        let (status, store) = ctx
            .call(
                Method::POST,
                "/api/stores",
                Some(&seller),
                Some(json!({ "slug": unique("shop"), "name": "Spoke & Chain" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{store}");

        Self {
            admin,
            seller,
            store_id: json_str(&store, "id"),
            category_id: json_str(&category, "id"),
        }
    }

    /// Create an active listing with the given attributes.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn list_bike(&self, ctx: &TestContext, mut attributes: Value) -> Value {
        attributes["category_id"] = json!(self.category_id);
        if attributes.get("status").is_none() {
            attributes["status"] = json!("active");
        }
        let (status, product) = ctx
            .call(Method::POST, "/api/products", Some(&self.seller), Some(attributes))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{product}");
        product
    }
}

/// Read a string field from a JSON object.
///
/// # Panics
///
/// Panics if the field is missing or not a string.
#[must_use]
pub fn json_str(value: &Value, field: &str) -> String {
    value[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing string field {field} in {value}"))
        .to_string()
}
