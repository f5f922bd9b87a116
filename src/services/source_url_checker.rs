use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, StatusCode};

use crate::errors::{AppError, AppResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceUrlChecker: Send + Sync {
    /// True if the URL answered with a 2xx or 3xx status.
    async fn is_reachable(&self, url: &str) -> bool;
}

pub fn is_acceptable_status(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

fn is_http_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some())
        .unwrap_or(false)
}

/// Checks liveness with a GET; some servers answer HEAD incorrectly.
pub struct HttpSourceUrlChecker {
    client: reqwest::Client,
}

impl HttpSourceUrlChecker {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::none())
            .user_agent("numeracy-server/0.1 (source check)")
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SourceUrlChecker for HttpSourceUrlChecker {
    async fn is_reachable(&self, url: &str) -> bool {
        if !is_http_url(url) {
            log::debug!("Rejecting non-http source URL {}", url);
            return false;
        }

        // `send` resolves once the status line and headers arrive. Dropping the
        // response without reading it closes the connection before the body.
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                drop(response);
                if !is_acceptable_status(status) {
                    log::info!("Source URL {} answered {}", url, status);
                }
                is_acceptable_status(status)
            }
            Err(e) => {
                log::info!("Source URL {} unreachable: {}", url, e);
                false
            }
        }
    }
}
