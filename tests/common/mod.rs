use std::net::SocketAddr;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use user_address_api::config::{Config, GeocoderConfig};

pub const PASSWORD: &str = "password123";

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub background: TaskTracker,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        send(self.client.post(self.url(path)).json(body)).await
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> (Value, StatusCode) {
        self.post_json(
            "/api/register",
            &json!({
                "name": name,
                "email": email,
                "password": password,
                "password_confirmation": password,
            }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post_json("/api/login", &json!({ "email": email, "password": password }))
            .await
    }

    /// Register a user and return their API token.
    pub async fn register_user(&self, email: &str) -> String {
        let (body, status) = self.register(email, PASSWORD, "Test User").await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Create a contact from `valid_contact()` merged with `overrides`.
    pub async fn create_contact(&self, token: &str, overrides: Value) -> Value {
        let mut body = valid_contact();
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        let (resp, status) = self.post_auth("/api/contacts", token, &body).await;
        assert_eq!(status, StatusCode::CREATED, "create contact failed: {resp}");
        resp["data"].clone()
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        send(self.client.get(self.url(path)).bearer_auth(token)).await
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        send(self.client.post(self.url(path)).bearer_auth(token).json(body)).await
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        send(self.client.put(self.url(path)).bearer_auth(token).json(body)).await
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        send(self.client.delete(self.url(path)).bearer_auth(token)).await
    }
}

/// Send `request` and return its JSON body (or `null`) with the status.
async fn send(request: RequestBuilder) -> (Value, StatusCode) {
    let resp = request.send().await.expect("request failed");
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (body, status)
}

pub fn valid_contact() -> Value {
    json!({
        "name": "Maria Silva",
        "email": "maria@example.com",
        "cpf": "529.982.247-25",
        "phone": "(11) 98765-4321",
        "cep": "01310-100",
        "street": "Avenida Paulista",
        "number": "1000",
        "neighborhood": "Bela Vista",
        "city": "São Paulo",
        "state": "SP",
    })
}

fn database_url(base_url: &str, db_name: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    // Create a unique test database
    let db_name = format!(
        "user_address_api_test_{}",
        Uuid::now_v7().to_string().replace('-', "")
    );

    let admin = admin_pool(&base_url).await;
    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin)
        .await
        .expect("Failed to create test database");
    admin.close().await;

    let test_url = database_url(&base_url, &db_name);
    let pool = user_address_api::connect_database(&test_url, 5)
        .await
        .expect("Failed to prepare test database");

    let config = Config {
        database_url: test_url,
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        frontend_url: "http://localhost:3000".to_string(),
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
        smtp: None,
        geocoder: GeocoderConfig::Disabled,
        // nothing listens here; lookups fail fast as upstream errors
        via_cep_base_url: "http://127.0.0.1:9".to_string(),
    };

    let background = TaskTracker::new();
    let app = user_address_api::build_app(pool.clone(), config, background.clone())
        .expect("Failed to build app");

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        pool,
        client: Client::new(),
        db_name,
        background,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let admin = admin_pool(&base_url).await;
    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin)
        .await;
    admin.close().await;
}

/// Connection to the server's `postgres` database for creating and dropping test databases.
async fn admin_pool(base_url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url(base_url, "postgres"))
        .await
        .expect("Failed to connect to the postgres database")
}
