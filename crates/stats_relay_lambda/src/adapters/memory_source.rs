use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::handlers::relay::{CallSite, RelayError};
use crate::runtime::config::ScreepsConnection;
use crate::runtime::envelope;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read side of the relay: yields the raw memory JSON text behind a memory
/// path, optionally scoped to a shard.
#[async_trait]
pub trait MemorySource: Send + Sync {
    async fn fetch_memory(
        &self,
        token: Option<&str>,
        memory_path: &str,
        shard: Option<&str>,
    ) -> Result<String, RelayError>;
}

/// HTTP client for the game server's user-memory endpoint.
#[derive(Debug, Clone)]
pub struct ScreepsMemoryClient {
    client: Client,
    connection: ScreepsConnection,
}

impl ScreepsMemoryClient {
    pub fn new(connection: ScreepsConnection) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build memory client");
        Self { client, connection }
    }
}

#[async_trait]
impl MemorySource for ScreepsMemoryClient {
    async fn fetch_memory(
        &self,
        token: Option<&str>,
        memory_path: &str,
        shard: Option<&str>,
    ) -> Result<String, RelayError> {
        let url = memory_url(&self.connection, memory_path, shard)?;

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header("X-Token", token);
        }

        let response = request.send().await.map_err(|error| RelayError::Transport {
            call: CallSite::MemoryRead,
            message: error.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| RelayError::Transport {
            call: CallSite::MemoryRead,
            message: format!("failed to read memory response body: {error}"),
        })?;

        if !status.is_success() {
            return Err(RelayError::ResponseFormat {
                message: format!("memory API answered status {status}"),
            });
        }

        envelope::decode_memory_text(&body).map_err(|error| RelayError::ResponseFormat {
            message: error.to_string(),
        })
    }
}

fn memory_url(
    connection: &ScreepsConnection,
    memory_path: &str,
    shard: Option<&str>,
) -> Result<Url, RelayError> {
    let scheme = if connection.secure { "https" } else { "http" };
    let base = format!(
        "{scheme}://{}:{}{}api/user/memory",
        connection.host, connection.port, connection.api_path
    );
    let mut url = Url::parse(&base).map_err(|error| RelayError::Transport {
        call: CallSite::MemoryRead,
        message: format!("failed to build memory URL from '{base}': {error}"),
    })?;

    url.query_pairs_mut().append_pair("path", memory_path);
    if let Some(shard) = shard {
        url.query_pairs_mut().append_pair("shard", shard);
    }
    Ok(url)
}
