use async_trait::async_trait;

use crate::handlers::relay::{CallSite, RelayError};

/// Lookup-by-reference access to stored credentials. `Ok(None)` means the
/// store has nothing under that reference; transport failures are reported
/// separately so callers can tell the two apart.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, reference: &str) -> Result<Option<String>, RelayError>;
}

/// Secret store backed by SSM Parameter Store. References are parameter
/// names, read with decryption so SecureString values come back in plain
/// text.
#[derive(Debug, Clone)]
pub struct SsmSecretStore {
    client: aws_sdk_ssm::Client,
}

impl SsmSecretStore {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get_secret(&self, reference: &str) -> Result<Option<String>, RelayError> {
        match self
            .client
            .get_parameter()
            .name(reference)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|parameter| parameter.value())
                .map(str::to_string)),
            Err(error) => {
                let service_error = error.into_service_error();
                if service_error.is_parameter_not_found() {
                    return Ok(None);
                }
                Err(RelayError::Transport {
                    call: CallSite::SecretLookup,
                    message: format!("get_parameter failed for '{reference}': {service_error}"),
                })
            }
        }
    }
}
