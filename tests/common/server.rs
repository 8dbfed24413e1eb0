//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own sync controller and
//! fake generation backend.

use super::constants::*;
use super::fixtures::FakeGenerationService;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use track_metadata_sync::generation::CompletionOptions;
use track_metadata_sync::server::state::ServerState;
use track_metadata_sync::server::{make_app, RequestsLoggingLevel, ServerConfig};
use track_metadata_sync::sync::{
    spawn_controller, GenerationPipeline, SimulatedLinkResolver, SyncHandle, SyncSettings,
};

/// Test server instance
///
/// When dropped, the server and its controller shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The fake backend, for asserting on calls
    pub service: Arc<FakeGenerationService>,

    /// Direct access to the controller
    #[allow(dead_code)]
    pub sync: SyncHandle,

    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port with short sync timings
    pub async fn spawn() -> Self {
        let service = Arc::new(FakeGenerationService::default());
        let pipeline = GenerationPipeline::new(
            service.clone(),
            CompletionOptions::default(),
            Duration::from_secs(5),
        );
        let settings = SyncSettings {
            debounce: Duration::from_millis(DEBOUNCE_MS),
            upload_step_interval: Duration::from_millis(1),
            upload_step_percent: 25,
        };

        let shutdown_token = CancellationToken::new();
        let (sync, _controller_task) = spawn_controller(
            pipeline,
            Arc::new(SimulatedLinkResolver::new(Duration::from_millis(
                LINK_DELAY_MS,
            ))),
            settings,
            shutdown_token.clone(),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..ServerConfig::default()
        };
        let state = ServerState {
            config: config.clone(),
            start_time: Instant::now(),
            sync: sync.clone(),
            provider: "fake".to_string(),
            model: "fake-model".to_string(),
        };
        let app = make_app(config, state);

        let server_token = shutdown_token.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            service,
            sync,
            shutdown_token,
        };
        server.wait_for_ready().await;
        server
    }

    /// Waits for the server to become ready by polling the health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client
                .get(format!("{}/api/health", self.base_url))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await,
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
