use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub relational: RelationalConfig,
    #[serde(default)]
    pub mock_db: MockDbConfig,
    #[serde(default)]
    pub logs: LogSourcesConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub etl: EtlConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Relational source (history / event_history tables partitioned by date).
///
/// `mode = "SINGLE"` uses host/port/service_name; `mode = "RAC"` builds a
/// multi-address descriptor from `rac_hosts` with independent load-balance
/// and failover flags.
#[derive(Debug, Deserialize, Clone)]
pub struct RelationalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub rac_hosts: Vec<String>,
    #[serde(default = "default_db_port")]
    pub rac_port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_true")]
    pub load_balance: bool,
    #[serde(default = "default_true")]
    pub failover: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    // Recorded for operators; connect() walks the address list instead of
    // looping on these.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        RelationalConfig {
            enabled: false,
            mode: default_mode(),
            host: default_host(),
            port: default_db_port(),
            service_name: default_service_name(),
            user: default_db_user(),
            password: String::new(),
            rac_hosts: Vec::new(),
            rac_port: default_db_port(),
            protocol: default_protocol(),
            load_balance: true,
            failover: true,
            connect_timeout_secs: default_connect_timeout(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

fn default_mode() -> String {
    "SINGLE".to_string()
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_service_name() -> String {
    "telemetry".to_string()
}
fn default_db_user() -> String {
    "opspulse".to_string()
}
fn default_protocol() -> String {
    "TCP".to_string()
}
fn default_true() -> bool {
    true
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_retry_count() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1
}

/// File-based stand-in for the relational source: CSV exports per date.
/// Takes precedence over `[relational]` when both are enabled.
#[derive(Debug, Deserialize, Clone)]
pub struct MockDbConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mock_dir")]
    pub dir: PathBuf,
}

impl Default for MockDbConfig {
    fn default() -> Self {
        MockDbConfig {
            enabled: false,
            dir: default_mock_dir(),
        }
    }
}

fn default_mock_dir() -> PathBuf {
    PathBuf::from("mock_data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSourcesConfig {
    #[serde(default)]
    pub was_enabled: bool,
    #[serde(default)]
    pub db_enabled: bool,
    #[serde(default = "default_was_dir")]
    pub was_dir: PathBuf,
    #[serde(default = "default_db_log_dir")]
    pub db_dir: PathBuf,
}

impl Default for LogSourcesConfig {
    fn default() -> Self {
        LogSourcesConfig {
            was_enabled: false,
            db_enabled: false,
            was_dir: default_was_dir(),
            db_dir: default_db_log_dir(),
        }
    }
}

fn default_was_dir() -> PathBuf {
    PathBuf::from("/swlog/was")
}
fn default_db_log_dir() -> PathBuf {
    PathBuf::from("/swlog/db")
}

/// Vector store (PostgreSQL + pgvector).
#[derive(Debug, Deserialize, Clone)]
pub struct VectorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_vector_db")]
    pub db: String,
    #[serde(default = "default_vector_db")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
    /// Embedding dimension declared at schema creation. Changing it
    /// requires a new schema/index.
    #[serde(default = "default_dim")]
    pub dim: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        VectorConfig {
            enabled: false,
            host: default_host(),
            port: default_db_port(),
            db: default_vector_db(),
            user: default_vector_db(),
            password: String::new(),
            sslmode: default_sslmode(),
            dim: default_dim(),
        }
    }
}

fn default_vector_db() -> String {
    "opspulse".to_string()
}
fn default_sslmode() -> String {
    "disable".to_string()
}
fn default_dim() -> usize {
    768
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `hash`, `ollama`, `openai`, or `local` (feature-gated).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_dim")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `auto` | `cpu` | `cuda` — advisory; the local runtime picks.
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: default_provider(),
            model: None,
            url: None,
            dims: default_dim(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            device: default_device(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    16
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_device() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EtlConfig {
    /// Trailing window size in days, evaluated most-recent-first.
    #[serde(default = "default_etl_days")]
    pub days: u32,
    /// Sidecar output directory for runs with the vector backend disabled.
    #[serde(default = "default_offline_dir")]
    pub offline_dir: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            days: default_etl_days(),
            offline_dir: default_offline_dir(),
        }
    }
}

fn default_etl_days() -> u32 {
    7
}
fn default_offline_dir() -> PathBuf {
    PathBuf::from("offline_corpus")
}

/// Scheduling is external (cron invokes `opspulse etl`); these fields are
/// recorded so deployments carry the intended cadence with the config.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cron")]
    pub cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            enabled: false,
            cron: default_cron(),
        }
    }
}

fn default_cron() -> String {
    "0 3 * * *".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            default_top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Internal chat proxy (Ollama-style). Disabled by default; the retrieval
/// path never depends on it.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_llm_model")]
    pub default_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            enabled: false,
            base_url: default_llm_url(),
            chat_path: default_chat_path(),
            default_model: default_llm_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_chat_path() -> String {
    "/api/chat".to_string()
}
fn default_llm_model() -> String {
    "llama3".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.relational.mode.to_uppercase().as_str() {
        "SINGLE" | "RAC" => {}
        other => anyhow::bail!("relational.mode must be SINGLE or RAC, got '{}'", other),
    }

    if config.relational.enabled
        && config.relational.mode.eq_ignore_ascii_case("RAC")
        && config.relational.rac_hosts.is_empty()
    {
        anyhow::bail!("relational.rac_hosts must not be empty in RAC mode");
    }

    if config.vector.enabled {
        if config.vector.dim == 0 {
            anyhow::bail!("vector.dim must be > 0 when the vector backend is enabled");
        }
        if config.embedding.dims != config.vector.dim {
            anyhow::bail!(
                "embedding.dims ({}) must match vector.dim ({})",
                config.embedding.dims,
                config.vector.dim
            );
        }
    }

    match config.embedding.provider.as_str() {
        "hash" => {}
        "ollama" | "openai" | "local" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, ollama, openai, or local.",
            other
        ),
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if config.etl.days == 0 {
        anyhow::bail!("etl.days must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.etl.days, 7);
        assert_eq!(config.embedding.provider, "hash");
        assert!(config.relational.load_balance);
        assert!(config.relational.failover);
    }

    #[test]
    fn rejects_unknown_provider() {
        let config: Config = toml::from_str("[embedding]\nprovider = \"bert\"").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_rac_without_hosts() {
        let config: Config =
            toml::from_str("[relational]\nenabled = true\nmode = \"RAC\"").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_dim_mismatch_when_vector_enabled() {
        let config: Config = toml::from_str(
            "[vector]\nenabled = true\ndim = 384\n[embedding]\ndims = 768",
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn model_required_for_remote_providers() {
        let config: Config = toml::from_str("[embedding]\nprovider = \"ollama\"").unwrap();
        assert!(validate(&config).is_err());
    }
}
