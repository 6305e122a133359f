use serde::{Deserialize, Serialize};

/// CHAR node RPC endpoint and the application domain whose ballots carry
/// did:char payloads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default)]
    pub rpc_user: String,
    #[serde(default)]
    pub rpc_password: String,
    #[serde(default = "default_app_domain")]
    pub app_domain: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            rpc_user: String::new(),
            rpc_password: String::new(),
            app_domain: default_app_domain(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthoringConfig {
    #[serde(default = "default_keys_dir")]
    pub keys_dir: String,
}

impl Default for AuthoringConfig {
    fn default() -> Self {
        Self { keys_dir: default_keys_dir() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Seconds between polls when the log has nothing new.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Bounded retry for ballot-log reads.
    #[serde(default = "default_rpc_retry_attempts")]
    pub rpc_retry_attempts: usize,
    /// Initial backoff; doubles per failure.
    #[serde(default = "default_rpc_retry_backoff_ms")]
    pub rpc_retry_backoff_ms: u64,
    /// Confirmation polls after submitting an operation.
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: usize,
    /// Log level for the chardid crates (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional directory for rolling log files.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            rpc_retry_attempts: default_rpc_retry_attempts(),
            rpc_retry_backoff_ms: default_rpc_retry_backoff_ms(),
            confirm_attempts: default_confirm_attempts(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

/// BLS aggregation policy. Aggregated operations verify only against
/// signer keys with a recorded proof-of-possession.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlsConfig {
    /// Hex-encoded 48-byte G1 public keys.
    #[serde(default)]
    pub proof_of_possession_keys: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub authoring: AuthoringConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub bls: BlsConfig,
}

fn default_rpc_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    8332
}

fn default_app_domain() -> String {
    "did:char".to_string()
}

fn default_data_dir() -> String {
    ".chardid".to_string()
}

fn default_keys_dir() -> String {
    ".chardid/keys".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_rpc_retry_attempts() -> usize {
    5
}

fn default_rpc_retry_backoff_ms() -> u64 {
    500
}

fn default_confirm_attempts() -> usize {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}
