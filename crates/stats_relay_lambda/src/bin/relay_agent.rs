use std::env;

use async_trait::async_trait;
use serde_json::json;
use stats_relay_lambda::adapters::env_config;
use stats_relay_lambda::adapters::memory_source::ScreepsMemoryClient;
use stats_relay_lambda::adapters::secret_store::{SecretStore, SsmSecretStore};
use stats_relay_lambda::adapters::stats_sink::HttpStatsSink;
use stats_relay_lambda::handlers::relay::{run_relay, RelayError};
use stats_relay_lambda::runtime::config::CredentialSource;
use stats_relay_lambda::runtime::schedule::ScheduleExpression;
use tokio::time::{interval, MissedTickBehavior};

type Error = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_SCHEDULE: &str = "rate(15 minutes)";

struct NoopSecretStore;

#[async_trait]
impl SecretStore for NoopSecretStore {
    async fn get_secret(&self, _reference: &str) -> Result<Option<String>, RelayError> {
        Ok(None)
    }
}

/// Local stand-in for the deployed schedule: runs the same relay pipeline
/// from a terminal, on a fixed-rate loop or once with RELAY_ONCE=1.
#[tokio::main]
async fn main() -> Result<(), Error> {
    let profile = env_config::profile_from_env()?;

    let schedule_text =
        env::var("RELAY_SCHEDULE").unwrap_or_else(|_| DEFAULT_SCHEDULE.to_string());
    let schedule = ScheduleExpression::parse(&schedule_text)?;

    let memory = ScreepsMemoryClient::new(profile.screeps.connection.clone());
    let sink = HttpStatsSink::new(&profile.stats);
    let secrets: Box<dyn SecretStore> = match &profile.credentials {
        CredentialSource::Inline { .. } => Box::new(NoopSecretStore),
        CredentialSource::SecretRefs { .. } => {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Box::new(SsmSecretStore::new(aws_sdk_ssm::Client::new(&aws_config)))
        }
    };

    if run_once_requested() {
        run_relay(&profile, &memory, secrets.as_ref(), &sink).await?;
        return Ok(());
    }

    let Some(every) = schedule.fixed_interval() else {
        return Err(Error::from(format!(
            "the local agent supports rate(...) schedules only; '{schedule}' belongs to a \
             deployed event rule"
        )));
    };

    log_agent_event(
        "agent_started",
        json!({
            "schedule": schedule.to_string(),
            "interval_secs": every.as_secs(),
        }),
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        // Failure visibility lives in the relay's own log events; the
        // agent's only policy is to keep ticking.
        let _ = run_relay(&profile, &memory, secrets.as_ref(), &sink).await;
    }
}

fn run_once_requested() -> bool {
    matches!(
        env::var("RELAY_ONCE").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

fn log_agent_event(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "relay_agent",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}
