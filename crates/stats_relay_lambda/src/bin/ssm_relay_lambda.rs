use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use stats_relay_lambda::adapters::env_config;
use stats_relay_lambda::adapters::memory_source::ScreepsMemoryClient;
use stats_relay_lambda::adapters::secret_store::SsmSecretStore;
use stats_relay_lambda::adapters::stats_sink::HttpStatsSink;
use stats_relay_lambda::handlers::relay::{run_relay, RelayReport};
use stats_relay_lambda::runtime::config::{CredentialSource, RelayProfile};

async fn handle_request(
    _event: LambdaEvent<Value>,
    profile: &RelayProfile,
    memory: &ScreepsMemoryClient,
    secrets: &SsmSecretStore,
    sink: &HttpStatsSink,
) -> Result<RelayReport, Error> {
    let report = run_relay(profile, memory, secrets, sink).await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let profile = env_config::profile_from_env()?;
    if !matches!(profile.credentials, CredentialSource::SecretRefs { .. }) {
        return Err(Error::from(
            "this binary resolves tokens per invocation; set SCREEPS_TOKEN_PARAM and \
             STATS_TOKEN_PARAM, or deploy relay_lambda for inline tokens",
        ));
    }

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let secrets = SsmSecretStore::new(aws_sdk_ssm::Client::new(&aws_config));
    let memory = ScreepsMemoryClient::new(profile.screeps.connection.clone());
    let sink = HttpStatsSink::new(&profile.stats);

    let profile_ref = &profile;
    let memory_ref = &memory;
    let secrets_ref = &secrets;
    let sink_ref = &sink;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, profile_ref, memory_ref, secrets_ref, sink_ref).await
    }))
    .await
}
