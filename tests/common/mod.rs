//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::Arc;

use quillpress::data::User;
use quillpress::service::{ContentClassifier, DisabledClassifier};
use quillpress::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

pub fn test_config(db_path: std::path::PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "test.example.com".to_string(),
            protocol: "https".to_string(),
        },
        database: config::DatabaseConfig {
            path: db_path,
            max_connections: 4,
            busy_timeout_ms: 5000,
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 604800,
        },
        moderation: config::ModerationConfig {
            enabled: false,
            endpoint: None,
            api_key: None,
            model: None,
            media_base_url: None,
            timeout_ms: 1000,
        },
        publishing: config::PublishingConfig {
            label_utc_offset_minutes: 0,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server with moderation disabled
    pub async fn new() -> Self {
        Self::with_classifier(Arc::new(DisabledClassifier)).await
    }

    /// Create a new test server scanning content with `classifier`
    pub async fn with_classifier(classifier: Arc<dyn ContentClassifier>) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path().join("test.db"));

        quillpress::metrics::init_metrics();
        let state = AppState::with_classifier(config, classifier).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = quillpress::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user and a session token for it
    pub async fn create_user(&self, username: &str, is_moderator: bool) -> (User, String) {
        let user = self
            .state
            .db
            .create_user(username, is_moderator)
            .await
            .unwrap();
        let token = self.create_token(user.id);
        (user, token)
    }

    pub fn create_token(&self, user_id: i64) -> String {
        quillpress::auth::create_session_token(
            user_id,
            &self.state.config.auth.session_secret,
            self.state.config.auth.session_max_age,
        )
        .expect("Failed to create test token")
    }

    /// Send an authenticated JSON request and return status and body
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (reqwest::StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        let text = response.text().await.unwrap();
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, body)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (reqwest::StatusCode, Value) {
        self.request(reqwest::Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (reqwest::StatusCode, Value) {
        self.request(reqwest::Method::POST, path, Some(token), Some(body))
            .await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (reqwest::StatusCode, Value) {
        self.request(reqwest::Method::DELETE, path, Some(token), None)
            .await
    }

    /// Create a novel series with one volume; returns `(series_id, volume_id)`
    pub async fn create_series_with_volume(&self, token: &str) -> (i64, i64) {
        let (status, series) = self
            .post(
                "/api/series",
                token,
                json!({ "title": "The Long Road", "kind": "novel" }),
            )
            .await;
        assert_eq!(status, 201, "{series}");
        let series_id = series["id"].as_i64().unwrap();

        let (status, volume) = self
            .post(
                &format!("/api/series/{series_id}/volumes"),
                token,
                json!({ "title": "Volume One" }),
            )
            .await;
        assert_eq!(status, 201, "{volume}");
        (series_id, volume["id"].as_i64().unwrap())
    }

    /// Create a novel chapter; returns the chapter response
    pub async fn create_chapter(&self, token: &str, volume_id: i64, title: &str) -> Value {
        let (status, chapter) = self
            .post(
                &format!("/api/volumes/{volume_id}/chapters"),
                token,
                novel_version(title, &format!("<p>{title}</p>")),
            )
            .await;
        assert_eq!(status, 201, "{chapter}");
        chapter
    }
}

pub fn novel_version(title: &str, html: &str) -> Value {
    json!({
        "title": title,
        "content": { "kind": "novel", "html": html },
    })
}
