use async_trait::async_trait;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use stats_relay_lambda::adapters::env_config;
use stats_relay_lambda::adapters::memory_source::ScreepsMemoryClient;
use stats_relay_lambda::adapters::secret_store::SecretStore;
use stats_relay_lambda::adapters::stats_sink::HttpStatsSink;
use stats_relay_lambda::handlers::relay::{run_relay, RelayError, RelayReport};
use stats_relay_lambda::runtime::config::{CredentialSource, RelayProfile};

/// Stands in for the secret store on deployments whose tokens are bound
/// inline; the relay never calls it.
struct NoopSecretStore;

#[async_trait]
impl SecretStore for NoopSecretStore {
    async fn get_secret(&self, _reference: &str) -> Result<Option<String>, RelayError> {
        Ok(None)
    }
}

async fn handle_request(
    _event: LambdaEvent<Value>,
    profile: &RelayProfile,
    memory: &ScreepsMemoryClient,
    secrets: &NoopSecretStore,
    sink: &HttpStatsSink,
) -> Result<RelayReport, Error> {
    let report = run_relay(profile, memory, secrets, sink).await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let profile = env_config::profile_from_env()?;
    if !matches!(profile.credentials, CredentialSource::Inline { .. }) {
        return Err(Error::from(
            "this binary takes inline tokens; set SCREEPS_TOKEN and STATS_TOKEN, or deploy \
             ssm_relay_lambda for stored credentials",
        ));
    }

    let memory = ScreepsMemoryClient::new(profile.screeps.connection.clone());
    let sink = HttpStatsSink::new(&profile.stats);
    let secrets = NoopSecretStore;

    let profile_ref = &profile;
    let memory_ref = &memory;
    let secrets_ref = &secrets;
    let sink_ref = &sink;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, profile_ref, memory_ref, secrets_ref, sink_ref).await
    }))
    .await
}
