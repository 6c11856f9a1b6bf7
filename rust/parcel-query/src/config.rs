use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

/// Hard ceiling on rows returned by any executed query.
pub const ROW_LIMIT_CEILING: i64 = 100;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub max_pool_size: u32,
    pub pg_ssl_root_cert: Option<String>,
    pub pg_ssl_cert: Option<String>,
    pub pg_ssl_key: Option<String>,
    pub max_rows: i64,
    pub request_timeout: Duration,
    pub llm: LlmConfig,
}

/// Settings for the OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout: Duration::from_secs(default_llm_timeout_secs()),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    parcel_listen_addr: Option<String>,
    #[serde(default)]
    parcel_listen_host: Option<String>,
    #[serde(default)]
    parcel_listen_port: Option<u16>,
    #[serde(default)]
    parcel_database_url: Option<String>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_pool_size")]
    parcel_max_pool_size: u32,
    #[serde(default)]
    parcel_pg_ssl_root_cert: Option<String>,
    #[serde(default)]
    parcel_pg_ssl_cert: Option<String>,
    #[serde(default)]
    parcel_pg_ssl_key: Option<String>,
    #[serde(default = "default_max_rows")]
    parcel_max_rows: i64,
    #[serde(default = "default_timeout_secs")]
    parcel_request_timeout_secs: u64,
    #[serde(default)]
    parcel_llm_api_key: Option<String>,
    #[serde(default)]
    openai_api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    parcel_llm_base_url: String,
    #[serde(default = "default_llm_model")]
    parcel_llm_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    parcel_llm_timeout_secs: u64,
    #[serde(default = "default_llm_temperature")]
    parcel_llm_temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    parcel_llm_max_tokens: u32,
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_max_rows() -> i64 {
    ROW_LIMIT_CEILING
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    20
}

const fn default_llm_temperature() -> f32 {
    0.1
}

const fn default_llm_max_tokens() -> u32 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse PARCEL_* environment variables")?;

        let listen_addr = resolve_addr(
            raw.parcel_listen_addr,
            raw.parcel_listen_host,
            raw.parcel_listen_port,
        )?;

        let database_url = raw
            .parcel_database_url
            .or(raw.database_url)
            .context("PARCEL_DATABASE_URL or DATABASE_URL must be set")?;

        let pg_ssl_root_cert = raw
            .parcel_pg_ssl_root_cert
            .or_else(|| env::var("PGSSLROOTCERT").ok());
        let pg_ssl_cert = raw.parcel_pg_ssl_cert.or_else(|| env::var("PGSSLCERT").ok());
        let pg_ssl_key = raw.parcel_pg_ssl_key.or_else(|| env::var("PGSSLKEY").ok());

        let api_key = raw
            .parcel_llm_api_key
            .or(raw.openai_api_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            listen_addr,
            database_url,
            max_pool_size: raw.parcel_max_pool_size.max(1),
            pg_ssl_root_cert,
            pg_ssl_cert,
            pg_ssl_key,
            max_rows: raw.parcel_max_rows.clamp(1, ROW_LIMIT_CEILING),
            request_timeout: Duration::from_secs(raw.parcel_request_timeout_secs.max(1)),
            llm: LlmConfig {
                api_key,
                base_url: raw.parcel_llm_base_url,
                model: raw.parcel_llm_model,
                timeout: Duration::from_secs(raw.parcel_llm_timeout_secs.max(1)),
                temperature: raw.parcel_llm_temperature,
                max_tokens: raw.parcel_llm_max_tokens.max(1),
            },
        })
    }

    /// Configuration for running the engine without touching the environment.
    pub fn embedded(database_url: String) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url,
            max_pool_size: 1,
            pg_ssl_root_cert: None,
            pg_ssl_cert: None,
            pg_ssl_key: None,
            max_rows: ROW_LIMIT_CEILING,
            request_timeout: Duration::from_secs(default_timeout_secs()),
            llm: LlmConfig::default(),
        }
    }
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid PARCEL_LISTEN_ADDR value")?
            .next()
            .context("PARCEL_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(8480);
    format!("{host}:{port}")
        .to_socket_addrs()
        .context("invalid listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}
