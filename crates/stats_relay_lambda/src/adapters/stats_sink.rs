use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::handlers::relay::{CallSite, RelayError};
use crate::runtime::config::StatsServiceSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Write side of the relay: delivers one serialized payload per invocation.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn submit(&self, token: &str, body: &str) -> Result<(), RelayError>;
}

/// HTTP sink that POSTs the payload with basic auth, the way the stats
/// service expects it (username from configuration, token as the password).
#[derive(Debug, Clone)]
pub struct HttpStatsSink {
    client: Client,
    url: String,
    username: String,
}

impl HttpStatsSink {
    pub fn new(settings: &StatsServiceSettings) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build stats client");
        Self {
            client,
            url: settings.url.clone(),
            username: settings.username.clone(),
        }
    }
}

#[async_trait]
impl StatsSink for HttpStatsSink {
    async fn submit(&self, token: &str, body: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(token))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|error| RelayError::Transport {
                call: CallSite::StatsSubmit,
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail = detail.trim();
            return Err(RelayError::RejectedWrite {
                status: status.as_u16(),
                message: if detail.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("no response body")
                        .to_string()
                } else {
                    detail.to_string()
                },
            });
        }

        Ok(())
    }
}
