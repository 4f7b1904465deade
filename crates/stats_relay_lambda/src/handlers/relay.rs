use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapters::memory_source::MemorySource;
use crate::adapters::secret_store::SecretStore;
use crate::adapters::stats_sink::StatsSink;
use crate::runtime::config::{CredentialSource, RelayProfile};
use crate::runtime::payload;

/// The network call sites one invocation can touch, in pipeline order.
/// Failures name their site so logs show where the pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSite {
    SecretLookup,
    MemoryRead,
    StatsSubmit,
}

impl CallSite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SecretLookup => "secret_lookup",
            Self::MemoryRead => "memory_read",
            Self::StatsSubmit => "stats_submit",
        }
    }
}

/// Failure taxonomy for one relay invocation. Nothing here is retried or
/// swallowed; every variant surfaces as a failed invocation so the
/// scheduling substrate sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A secret reference resolved to no usable value. Raised before any
    /// memory or stats call is made.
    MissingCredential { reference: String },
    /// Network-level failure (DNS, TLS, connect, timeout, body transfer).
    Transport { call: CallSite, message: String },
    /// The memory API produced a body the relay could not interpret.
    ResponseFormat { message: String },
    /// The stats service answered the write with a non-success status.
    RejectedWrite { status: u16, message: String },
}

impl RelayError {
    /// The call site a failure is attributed to in logs.
    pub fn call_site(&self) -> CallSite {
        match self {
            Self::MissingCredential { .. } => CallSite::SecretLookup,
            Self::Transport { call, .. } => *call,
            Self::ResponseFormat { .. } => CallSite::MemoryRead,
            Self::RejectedWrite { .. } => CallSite::StatsSubmit,
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential { reference } => {
                write!(f, "no credential value found for reference '{reference}'")
            }
            Self::Transport { call, message } => {
                write!(f, "{} transport failure: {message}", call.as_str())
            }
            Self::ResponseFormat { message } => {
                write!(f, "memory response format error: {message}")
            }
            Self::RejectedWrite { status, message } => {
                write!(f, "stats submit rejected with status {status}: {message}")
            }
        }
    }
}

impl std::error::Error for RelayError {}

/// Returned to the scheduling runtime after a successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayReport {
    pub status: String,
    pub memory_path: String,
    pub shard: Option<String>,
    pub payload_fingerprint: String,
    pub payload_bytes: usize,
}

/// Tokens in hand for the current invocation, wherever they came from.
pub struct ResolvedCredentials {
    pub screeps_token: String,
    pub stats_token: String,
}

/// Execute one relay tick: resolve credentials, read the memory snapshot,
/// shape the payload, submit it. At most one read and one write call per
/// invocation, with no internal retry.
pub async fn run_relay(
    profile: &RelayProfile,
    memory: &dyn MemorySource,
    secrets: &dyn SecretStore,
    sink: &dyn StatsSink,
) -> Result<RelayReport, RelayError> {
    let started_at = Instant::now();
    log_relay_info(
        "relay_started",
        json!({
            "memory_path": profile.screeps.memory_path.clone(),
            "shard": profile.screeps.shard.clone(),
            "credential_mode": credential_mode(&profile.credentials),
        }),
    );

    let outcome = relay_once(profile, memory, secrets, sink).await;
    let duration_ms = started_at.elapsed().as_millis();

    match &outcome {
        Ok(report) => log_relay_info(
            "stats_submitted",
            json!({
                "memory_path": report.memory_path.clone(),
                "shard": report.shard.clone(),
                "payload_fingerprint": report.payload_fingerprint.clone(),
                "payload_bytes": report.payload_bytes,
                "duration_ms": duration_ms,
            }),
        ),
        Err(error) => log_relay_error(
            "relay_failed",
            json!({
                "memory_path": profile.screeps.memory_path.clone(),
                "shard": profile.screeps.shard.clone(),
                "failed_call": error.call_site().as_str(),
                "error": error.to_string(),
                "duration_ms": duration_ms,
            }),
        ),
    }

    outcome
}

async fn relay_once(
    profile: &RelayProfile,
    memory: &dyn MemorySource,
    secrets: &dyn SecretStore,
    sink: &dyn StatsSink,
) -> Result<RelayReport, RelayError> {
    let credentials = resolve_credentials(&profile.credentials, secrets).await?;

    let memory_text = memory
        .fetch_memory(
            Some(&credentials.screeps_token),
            &profile.screeps.memory_path,
            profile.screeps.shard.as_deref(),
        )
        .await?;

    let snapshot = payload::parse_stats(&memory_text).map_err(|error| RelayError::ResponseFormat {
        message: format!("memory text is not JSON: {error}"),
    })?;

    let submission = payload::apply_prefix(snapshot, profile.stats.prefix.as_deref());
    let body = payload::stable_stats_json(&submission);
    let payload_fingerprint = payload::payload_fingerprint(&submission);

    sink.submit(&credentials.stats_token, &body).await?;

    Ok(RelayReport {
        status: "ok".to_string(),
        memory_path: profile.screeps.memory_path.clone(),
        shard: profile.screeps.shard.clone(),
        payload_fingerprint,
        payload_bytes: body.len(),
    })
}

/// Resolve the invocation's tokens. Inline profiles perform no I/O. Stored
/// profiles issue both lookups concurrently and abort on the first failure,
/// before any memory or stats call.
pub async fn resolve_credentials(
    source: &CredentialSource,
    secrets: &dyn SecretStore,
) -> Result<ResolvedCredentials, RelayError> {
    match source {
        CredentialSource::Inline {
            screeps_token,
            stats_token,
        } => Ok(ResolvedCredentials {
            screeps_token: screeps_token.clone(),
            stats_token: stats_token.clone(),
        }),
        CredentialSource::SecretRefs {
            screeps_token_ref,
            stats_token_ref,
        } => {
            let (screeps_token, stats_token) = tokio::try_join!(
                lookup_secret(secrets, screeps_token_ref),
                lookup_secret(secrets, stats_token_ref),
            )?;
            Ok(ResolvedCredentials {
                screeps_token,
                stats_token,
            })
        }
    }
}

async fn lookup_secret(secrets: &dyn SecretStore, reference: &str) -> Result<String, RelayError> {
    secrets
        .get_secret(reference)
        .await?
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| RelayError::MissingCredential {
            reference: reference.to_string(),
        })
}

fn credential_mode(source: &CredentialSource) -> &'static str {
    match source {
        CredentialSource::Inline { .. } => "inline",
        CredentialSource::SecretRefs { .. } => "secret_refs",
    }
}

fn log_relay_info(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "stats_relay",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_relay_error(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "stats_relay",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::runtime::config::{ScreepsConnection, ScreepsSettings, StatsServiceSettings};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct MemoryCall {
        token: Option<String>,
        memory_path: String,
        shard: Option<String>,
    }

    struct ScriptedMemory {
        response: Result<String, RelayError>,
        calls: Mutex<Vec<MemoryCall>>,
    }

    impl ScriptedMemory {
        fn returning(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: RelayError) -> Self {
            Self {
                response: Err(error),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<MemoryCall> {
            self.calls.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl MemorySource for ScriptedMemory {
        async fn fetch_memory(
            &self,
            token: Option<&str>,
            memory_path: &str,
            shard: Option<&str>,
        ) -> Result<String, RelayError> {
            self.calls.lock().expect("poisoned mutex").push(MemoryCall {
                token: token.map(str::to_string),
                memory_path: memory_path.to_string(),
                shard: shard.map(str::to_string),
            });
            self.response.clone()
        }
    }

    struct RecordingSink {
        response: Result<(), RelayError>,
        submissions: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn accepting() -> Self {
            Self {
                response: Ok(()),
                submissions: Mutex::new(Vec::new()),
            }
        }

        fn rejecting(status: u16, message: &str) -> Self {
            Self {
                response: Err(RelayError::RejectedWrite {
                    status,
                    message: message.to_string(),
                }),
                submissions: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> Vec<(String, String)> {
            self.submissions.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl StatsSink for RecordingSink {
        async fn submit(&self, token: &str, body: &str) -> Result<(), RelayError> {
            self.submissions
                .lock()
                .expect("poisoned mutex")
                .push((token.to_string(), body.to_string()));
            self.response.clone()
        }
    }

    struct MapSecretStore {
        values: HashMap<String, String>,
        lookups: Mutex<Vec<String>>,
    }

    impl MapSecretStore {
        fn with(entries: &[(&str, &str)]) -> Self {
            Self {
                values: entries
                    .iter()
                    .map(|(reference, value)| (reference.to_string(), value.to_string()))
                    .collect(),
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self::with(&[])
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl SecretStore for MapSecretStore {
        async fn get_secret(&self, reference: &str) -> Result<Option<String>, RelayError> {
            self.lookups
                .lock()
                .expect("poisoned mutex")
                .push(reference.to_string());
            Ok(self.values.get(reference).cloned())
        }
    }

    fn sample_profile(credentials: CredentialSource) -> RelayProfile {
        RelayProfile {
            screeps: ScreepsSettings {
                connection: ScreepsConnection {
                    host: "screeps.com".to_string(),
                    port: 443,
                    secure: true,
                    api_path: "/".to_string(),
                },
                shard: Some("shard0".to_string()),
                memory_path: "stats".to_string(),
            },
            stats: StatsServiceSettings {
                url: "https://stats.example.net/submit".to_string(),
                username: "token".to_string(),
                prefix: None,
            },
            credentials,
        }
    }

    fn inline_credentials() -> CredentialSource {
        CredentialSource::Inline {
            screeps_token: "screeps-secret".to_string(),
            stats_token: "stats-secret".to_string(),
        }
    }

    fn stored_credentials() -> CredentialSource {
        CredentialSource::SecretRefs {
            screeps_token_ref: "/screeps/token".to_string(),
            stats_token_ref: "/screeps/statsToken".to_string(),
        }
    }

    #[tokio::test]
    async fn relays_the_snapshot_exactly_once() {
        let profile = sample_profile(inline_credentials());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::accepting();

        let report = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");

        assert_eq!(report.status, "ok");
        assert_eq!(report.memory_path, "stats");
        assert_eq!(report.shard, Some("shard0".to_string()));
        assert_eq!(report.payload_bytes, r#"{"gcl":123}"#.len());

        let calls = memory.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            MemoryCall {
                token: Some("screeps-secret".to_string()),
                memory_path: "stats".to_string(),
                shard: Some("shard0".to_string()),
            }
        );

        let submissions = sink.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0],
            ("stats-secret".to_string(), r#"{"gcl":123}"#.to_string())
        );
    }

    #[tokio::test]
    async fn nests_the_snapshot_under_the_configured_prefix() {
        let mut profile = sample_profile(inline_credentials());
        profile.stats.prefix = Some("myBot".to_string());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::accepting();

        let report = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");

        let expected = payload::stable_stats_json(&json!({"myBot": {"gcl": 123}}));
        assert_eq!(sink.submissions()[0].1, expected);
        assert_eq!(report.payload_bytes, expected.len());
        assert_eq!(
            report.payload_fingerprint,
            payload::payload_fingerprint(&json!({"myBot": {"gcl": 123}}))
        );
    }

    #[tokio::test]
    async fn inline_profiles_never_consult_the_secret_store() {
        let profile = sample_profile(inline_credentials());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::accepting();

        run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");

        assert!(secrets.lookups().is_empty());
    }

    #[tokio::test]
    async fn stored_profiles_resolve_both_references_each_invocation() {
        let profile = sample_profile(stored_credentials());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::with(&[
            ("/screeps/token", "stored-screeps-secret"),
            ("/screeps/statsToken", "stored-stats-secret"),
        ]);
        let sink = RecordingSink::accepting();

        run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");
        run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");

        let mut lookups = secrets.lookups();
        lookups.sort();
        assert_eq!(
            lookups,
            vec![
                "/screeps/statsToken".to_string(),
                "/screeps/statsToken".to_string(),
                "/screeps/token".to_string(),
                "/screeps/token".to_string(),
            ]
        );
        assert_eq!(memory.calls()[0].token, Some("stored-screeps-secret".to_string()));
        assert_eq!(sink.submissions()[0].0, "stored-stats-secret");
    }

    #[tokio::test]
    async fn a_missing_secret_aborts_before_any_network_call() {
        let profile = sample_profile(stored_credentials());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::with(&[("/screeps/statsToken", "stored-stats-secret")]);
        let sink = RecordingSink::accepting();

        let error = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect_err("relay should fail");

        assert_eq!(
            error,
            RelayError::MissingCredential {
                reference: "/screeps/token".to_string(),
            }
        );
        assert_eq!(error.call_site(), CallSite::SecretLookup);
        assert!(memory.calls().is_empty());
        assert!(sink.submissions().is_empty());
    }

    #[tokio::test]
    async fn a_blank_secret_value_counts_as_missing() {
        let profile = sample_profile(stored_credentials());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::with(&[
            ("/screeps/token", "stored-screeps-secret"),
            ("/screeps/statsToken", "   "),
        ]);
        let sink = RecordingSink::accepting();

        let error = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect_err("relay should fail");

        assert_eq!(
            error,
            RelayError::MissingCredential {
                reference: "/screeps/statsToken".to_string(),
            }
        );
        assert!(memory.calls().is_empty());
    }

    #[tokio::test]
    async fn unparseable_memory_fails_without_submitting() {
        let profile = sample_profile(inline_credentials());
        let memory = ScriptedMemory::returning("Memory.stats is not set");
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::accepting();

        let error = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect_err("relay should fail");

        assert!(matches!(error, RelayError::ResponseFormat { .. }));
        assert_eq!(error.call_site(), CallSite::MemoryRead);
        assert!(sink.submissions().is_empty());
    }

    #[tokio::test]
    async fn a_read_transport_failure_skips_the_write() {
        let profile = sample_profile(inline_credentials());
        let memory = ScriptedMemory::failing(RelayError::Transport {
            call: CallSite::MemoryRead,
            message: "connection refused".to_string(),
        });
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::accepting();

        let error = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect_err("relay should fail");

        assert_eq!(error.call_site(), CallSite::MemoryRead);
        assert!(sink.submissions().is_empty());
    }

    #[tokio::test]
    async fn a_rejected_write_surfaces_after_one_attempt() {
        let profile = sample_profile(inline_credentials());
        let memory = ScriptedMemory::returning(r#"{"gcl":123}"#);
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::rejecting(500, "ingest backend unavailable");

        let error = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect_err("relay should fail");

        assert_eq!(
            error,
            RelayError::RejectedWrite {
                status: 500,
                message: "ingest backend unavailable".to_string(),
            }
        );
        assert_eq!(error.call_site(), CallSite::StatsSubmit);
        assert_eq!(memory.calls().len(), 1);
        assert_eq!(sink.submissions().len(), 1);
    }

    #[tokio::test]
    async fn repeated_invocations_submit_identical_bytes() {
        let profile = sample_profile(inline_credentials());
        let memory = ScriptedMemory::returning(r#"{"b":1,"a":2}"#);
        let secrets = MapSecretStore::empty();
        let sink = RecordingSink::accepting();

        let first = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");
        let second = run_relay(&profile, &memory, &secrets, &sink)
            .await
            .expect("relay should succeed");

        let submissions = sink.submissions();
        assert_eq!(submissions[0].1, submissions[1].1);
        assert_eq!(first.payload_fingerprint, second.payload_fingerprint);
    }
}
