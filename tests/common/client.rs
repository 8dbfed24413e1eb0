//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn file_form(file_name: &str, content_type: &str, bytes: &[u8]) -> Form {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .expect("Invalid content type");
        Form::new().part("file", part)
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    pub async fn health(&self) -> Response {
        self.client
            .get(self.url("/api/health"))
            .send()
            .await
            .expect("Health request failed")
    }

    pub async fn get_state(&self) -> Response {
        self.client
            .get(self.url("/api/state"))
            .send()
            .await
            .expect("State request failed")
    }

    pub async fn get_genres(&self) -> Response {
        self.client
            .get(self.url("/api/genres"))
            .send()
            .await
            .expect("Genres request failed")
    }

    pub async fn upload_audio(&self, file_name: &str, content_type: &str) -> Response {
        self.client
            .post(self.url("/api/audio"))
            .multipart(Self::file_form(file_name, content_type, &[0u8; 64]))
            .send()
            .await
            .expect("Audio upload failed")
    }

    pub async fn submit_link(&self, link: &str) -> Response {
        self.client
            .post(self.url("/api/link"))
            .json(&json!({ "link": link }))
            .send()
            .await
            .expect("Link request failed")
    }

    pub async fn edit_field(&self, field: &str, value: &str) -> Response {
        self.client
            .patch(self.url("/api/fields"))
            .json(&json!({ "field": field, "value": value }))
            .send()
            .await
            .expect("Field edit failed")
    }

    pub async fn upload_cover(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Response {
        self.client
            .post(self.url("/api/cover"))
            .multipart(Self::file_form(file_name, content_type, bytes))
            .send()
            .await
            .expect("Cover upload failed")
    }

    pub async fn delete_cover(&self) -> Response {
        self.client
            .delete(self.url("/api/cover"))
            .send()
            .await
            .expect("Cover delete failed")
    }

    pub async fn download_cover(&self) -> Response {
        self.client
            .get(self.url("/api/cover/download"))
            .send()
            .await
            .expect("Cover download failed")
    }

    pub async fn regenerate(&self, image: bool) -> Response {
        self.client
            .post(self.url("/api/regenerate"))
            .json(&json!({ "image": image }))
            .send()
            .await
            .expect("Regenerate request failed")
    }

    pub async fn metrics(&self) -> Response {
        self.client
            .get(self.url("/metrics"))
            .send()
            .await
            .expect("Metrics request failed")
    }

    // ========================================================================
    // State helpers
    // ========================================================================

    pub async fn state(&self) -> Value {
        self.get_state()
            .await
            .json()
            .await
            .expect("State is not JSON")
    }

    /// Polls the state until `condition` holds, panicking on timeout
    pub async fn wait_for_state(&self, condition: impl Fn(&Value) -> bool) -> Value {
        let start = Instant::now();
        loop {
            let state = self.state().await;
            if condition(&state) {
                return state;
            }
            if start.elapsed() > Duration::from_millis(STATE_TIMEOUT_MS) {
                panic!("State did not reach the expected condition: {}", state);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// Waits until a generation cycle has completed and nothing is queued
    pub async fn wait_until_generated(&self) -> Value {
        self.wait_for_state(|s| {
            s["progress"]["analysis"] == 100 && s["busy"] == false && s["pending"] == false
        })
        .await
    }

    /// Waits long enough for any debounce gate to have fired
    pub async fn let_edits_settle(&self) {
        tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 4)).await;
    }
}
