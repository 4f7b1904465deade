use std::error::Error;
use std::fmt;

pub const DEFAULT_SCREEPS_HOST: &str = "screeps.com";
pub const DEFAULT_SCREEPS_PORT: u16 = 443;
pub const DEFAULT_API_PATH: &str = "/";
pub const DEFAULT_STATS_URL: &str = "https://screepspl.us/api/stats/submit";
pub const DEFAULT_STATS_USERNAME: &str = "token";

/// Where and how to reach the memory API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreepsConnection {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// Mount point of the API on the host, normalized to lead and trail
    /// with `/` (the official server uses `/`, private servers often `/ptr/`).
    pub api_path: String,
}

/// Read-side settings: the connection plus which memory value to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreepsSettings {
    pub connection: ScreepsConnection,
    pub shard: Option<String>,
    pub memory_path: String,
}

/// Write-side settings for the stats service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsServiceSettings {
    pub url: String,
    pub username: String,
    /// Optional namespace key; when set, the snapshot is nested under it
    /// before submission.
    pub prefix: Option<String>,
}

/// Where invocation credentials come from.
///
/// `Inline` tokens are bound into the deployment and used as-is.
/// `SecretRefs` name entries in a secret store that are resolved freshly on
/// every invocation, never cached.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Inline {
        screeps_token: String,
        stats_token: String,
    },
    SecretRefs {
        screeps_token_ref: String,
        stats_token_ref: String,
    },
}

// Token values stay out of Debug output; references are not secret.
impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline { .. } => f.debug_struct("Inline").finish_non_exhaustive(),
            Self::SecretRefs {
                screeps_token_ref,
                stats_token_ref,
            } => f
                .debug_struct("SecretRefs")
                .field("screeps_token_ref", screeps_token_ref)
                .field("stats_token_ref", stats_token_ref)
                .finish(),
        }
    }
}

/// Validated, immutable settings for one relay deployment. Built once by
/// [`normalize_config`] and shared by every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayProfile {
    pub screeps: ScreepsSettings,
    pub stats: StatsServiceSettings,
    pub credentials: CredentialSource,
}

/// Pre-validation option bag, exactly as read from the environment. Every
/// field is optional here; [`normalize_config`] decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRelayConfig {
    pub shard: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub secure: Option<String>,
    pub api_path: Option<String>,
    pub memory_path: Option<String>,
    pub stats_url: Option<String>,
    pub stats_username: Option<String>,
    pub prefix: Option<String>,
    pub screeps_token: Option<String>,
    pub stats_token: Option<String>,
    pub screeps_token_ref: Option<String>,
    pub stats_token_ref: Option<String>,
}

/// Validate the raw option bag and apply defaults.
///
/// Fails on a missing memory path, an unusable port or stats URL, and on
/// credential sets that are incomplete or mix inline tokens with secret
/// references. Blank values are treated as absent throughout.
pub fn normalize_config(raw: RawRelayConfig) -> Result<RelayProfile, ValidationError> {
    let memory_path = required_trimmed(raw.memory_path, "memory path")?;

    let host = defaulted_trimmed(raw.host, DEFAULT_SCREEPS_HOST);
    let port = parse_port(raw.port)?;
    let secure = parse_secure(raw.secure)?;
    let api_path = normalize_api_path(raw.api_path);

    let url = defaulted_trimmed(raw.stats_url, DEFAULT_STATS_URL);
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ValidationError::new(format!(
            "stats URL must start with http:// or https://, got '{url}'"
        )));
    }
    let username = defaulted_trimmed(raw.stats_username, DEFAULT_STATS_USERNAME);

    let credentials = normalize_credentials(
        raw.screeps_token,
        raw.stats_token,
        raw.screeps_token_ref,
        raw.stats_token_ref,
    )?;

    Ok(RelayProfile {
        screeps: ScreepsSettings {
            connection: ScreepsConnection {
                host,
                port,
                secure,
                api_path,
            },
            shard: optional_trimmed(raw.shard),
            memory_path,
        },
        stats: StatsServiceSettings {
            url,
            username,
            prefix: optional_trimmed(raw.prefix),
        },
        credentials,
    })
}

fn parse_port(port: Option<String>) -> Result<u16, ValidationError> {
    let Some(text) = optional_trimmed(port) else {
        return Ok(DEFAULT_SCREEPS_PORT);
    };
    match text.parse::<u16>() {
        Ok(0) | Err(_) => Err(ValidationError::new(format!(
            "port must be an integer in 1..=65535, got '{text}'"
        ))),
        Ok(value) => Ok(value),
    }
}

fn parse_secure(secure: Option<String>) -> Result<bool, ValidationError> {
    let Some(text) = optional_trimmed(secure) else {
        return Ok(true);
    };
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ValidationError::new(format!(
            "secure flag must be true or false, got '{text}'"
        ))),
    }
}

fn normalize_api_path(api_path: Option<String>) -> String {
    let mut path = optional_trimmed(api_path).unwrap_or_else(|| DEFAULT_API_PATH.to_string());
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

fn normalize_credentials(
    screeps_token: Option<String>,
    stats_token: Option<String>,
    screeps_token_ref: Option<String>,
    stats_token_ref: Option<String>,
) -> Result<CredentialSource, ValidationError> {
    let screeps_token = optional_trimmed(screeps_token);
    let stats_token = optional_trimmed(stats_token);
    let screeps_token_ref = optional_trimmed(screeps_token_ref);
    let stats_token_ref = optional_trimmed(stats_token_ref);

    let has_inline = screeps_token.is_some() || stats_token.is_some();
    let has_refs = screeps_token_ref.is_some() || stats_token_ref.is_some();

    match (has_inline, has_refs) {
        (true, true) => Err(ValidationError::new(
            "configure either inline tokens or secret references, not both",
        )),
        (false, false) => Err(ValidationError::new(
            "credentials are required: set inline tokens or secret references",
        )),
        (true, false) => {
            let screeps_token = screeps_token.ok_or_else(|| {
                ValidationError::new("screeps token is required alongside the stats token")
            })?;
            let stats_token = stats_token.ok_or_else(|| {
                ValidationError::new("stats token is required alongside the screeps token")
            })?;
            Ok(CredentialSource::Inline {
                screeps_token,
                stats_token,
            })
        }
        (false, true) => {
            let screeps_token_ref = screeps_token_ref.ok_or_else(|| {
                ValidationError::new("screeps token reference is required alongside the stats one")
            })?;
            let stats_token_ref = stats_token_ref.ok_or_else(|| {
                ValidationError::new("stats token reference is required alongside the screeps one")
            })?;
            Ok(CredentialSource::SecretRefs {
                screeps_token_ref,
                stats_token_ref,
            })
        }
    }
}

fn required_trimmed(value: Option<String>, label: &str) -> Result<String, ValidationError> {
    optional_trimmed(value).ok_or_else(|| ValidationError::new(format!("{label} is required")))
}

fn defaulted_trimmed(value: Option<String>, default: &str) -> String {
    optional_trimmed(value).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Error raised when the relay configuration cannot be validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ValidationError {}
