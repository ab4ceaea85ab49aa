//! Shared fixture: a wiremock server driven from synchronous tests.
//!
//! The blocking reqwest client must not run inside a tokio runtime, so the
//! runtime here is only used to talk to the mock server.

#![allow(dead_code)]

use moltbook_cli::config::ClientConfig;
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer, Request};

pub const API_PREFIX: &str = "/api/v1";

pub struct MockApi {
    pub server: MockServer,
    rt: Runtime,
}

impl MockApi {
    pub fn start() -> Self {
        let rt = Runtime::new().expect("failed to build tokio runtime");
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    /// Client config whose base URL points at this server.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::with_base_url(&format!("{}{}", self.server.uri(), API_PREFIX))
            .expect("mock server URI should be valid")
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    pub fn received(&self) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .expect("request recording is enabled by default")
    }

    /// Panics if any `expect(n)` on a mounted mock was not met.
    pub fn verify(&self) {
        self.rt.block_on(self.server.verify());
    }
}

/// Endpoint path as the mock server sees it.
pub fn api_path(endpoint: &str) -> String {
    format!("{}{}", API_PREFIX, endpoint)
}
