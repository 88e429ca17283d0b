//! Configuration management for the audit relay.

use std::{
    fs,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use auditrelay_core::NormalizerConfig;
use auditrelay_dispatch::{client::ClientConfig, DispatchConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_FILE: &str = "config.toml";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Everything is fixed at process start; there is no reload.
///
/// # Example
///
/// ```no_run
/// use auditrelay_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Relaying to {}", config.webhook_url);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Listener bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Listener bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// Inbound request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Largest accepted payload in bytes.
    ///
    /// Environment variable: `MAX_PAYLOAD_BYTES`
    #[serde(default = "default_max_payload_bytes", alias = "MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: usize,
    /// Static token required in the `Authorization` header. Unset or empty
    /// disables the check.
    ///
    /// Environment variable: `WEBHOOK_AUTH_TOKEN`
    #[serde(default, alias = "WEBHOOK_AUTH_TOKEN")]
    pub webhook_auth_token: Option<String>,

    // Dispatch
    /// Collector URL receiving event batches.
    ///
    /// Environment variable: `WEBHOOK_URL`
    #[serde(default = "default_webhook_url", alias = "WEBHOOK_URL")]
    pub webhook_url: String,
    /// Maximum concurrent sends to the collector.
    ///
    /// Environment variable: `MAX_CONCURRENT_SENDS`
    #[serde(default = "default_max_concurrent_sends", alias = "MAX_CONCURRENT_SENDS")]
    pub max_concurrent_sends: usize,
    /// Longest wait for a send slot in milliseconds.
    ///
    /// Environment variable: `ADMISSION_TIMEOUT_MS`
    #[serde(default = "default_admission_timeout_ms", alias = "ADMISSION_TIMEOUT_MS")]
    pub admission_timeout_ms: u64,
    /// Budget for slot wait plus the POST in milliseconds.
    ///
    /// Environment variable: `SEND_TIMEOUT_MS`
    #[serde(default = "default_send_timeout_ms", alias = "SEND_TIMEOUT_MS")]
    pub send_timeout_ms: u64,
    /// Skip TLS certificate verification for the collector. Insecure.
    ///
    /// Environment variable: `TLS_INSECURE_SKIP_VERIFY`
    #[serde(default, alias = "TLS_INSECURE_SKIP_VERIFY")]
    pub tls_insecure_skip_verify: bool,

    // Normalization
    /// Origin label stamped on every event.
    ///
    /// Environment variable: `WORKSPACE`
    #[serde(default, alias = "WORKSPACE")]
    pub workspace: String,
    /// Resource kind stamped on every event.
    ///
    /// Environment variable: `RESOURCE`
    #[serde(default = "default_resource", alias = "RESOURCE")]
    pub resource: String,

    // Lifecycle
    /// Seconds to wait for in-flight dispatches on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_SECONDS`
    #[serde(default = "default_shutdown_grace", alias = "SHUTDOWN_GRACE_SECONDS")]
    pub shutdown_grace_seconds: u64,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration using `path` as the configuration file.
    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the dispatch crate's configuration.
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            endpoint_url: self.webhook_url.clone(),
            max_concurrent_sends: self.max_concurrent_sends,
            admission_timeout: Duration::from_millis(self.admission_timeout_ms),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            verify_tls: !self.tls_insecure_skip_verify,
            user_agent: ClientConfig::default().user_agent,
        }
    }

    /// Convert to normalizer labels.
    pub fn to_normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig { workspace: self.workspace_label(), resource: self.resource.clone() }
    }

    /// Origin label for events: `workspace` when set, otherwise
    /// `hostname(ipv4)` of this machine.
    pub fn workspace_label(&self) -> String {
        if !self.workspace.is_empty() {
            return self.workspace.clone();
        }

        match local_hostname() {
            Some(hostname) => host_label(&hostname),
            None => {
                debug!("Host name unavailable, events carry an empty workspace label");
                String::new()
            },
        }
    }

    /// Configured auth token, treating an empty value as unset.
    pub fn auth_token(&self) -> Option<&str> {
        self.webhook_auth_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be greater than 0");
        }

        if !(self.webhook_url.starts_with("http://") || self.webhook_url.starts_with("https://")) {
            anyhow::bail!("webhook_url must be an http or https URL");
        }

        if self.max_concurrent_sends == 0 {
            anyhow::bail!("max_concurrent_sends must be greater than 0");
        }

        if self.admission_timeout_ms == 0 {
            anyhow::bail!("admission_timeout_ms must be greater than 0");
        }

        if self.send_timeout_ms == 0 {
            anyhow::bail!("send_timeout_ms must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_payload_bytes: default_max_payload_bytes(),
            webhook_auth_token: None,
            webhook_url: default_webhook_url(),
            max_concurrent_sends: default_max_concurrent_sends(),
            admission_timeout_ms: default_admission_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            tls_insecure_skip_verify: false,
            workspace: String::new(),
            resource: default_resource(),
            shutdown_grace_seconds: default_shutdown_grace(),
            rust_log: default_log_level(),
        }
    }
}

/// Host name from the environment, then `/etc/hostname`.
fn local_hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Formats `hostname(ip)` using the first IPv4 address the name resolves to.
fn host_label(hostname: &str) -> String {
    let ipv4 = (hostname, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|addr| addr.is_ipv4()))
        .map(|addr| addr.ip());

    match ipv4 {
        Some(IpAddr::V4(ip)) => format!("{hostname}({ip})"),
        _ => hostname.to_string(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024
}

fn default_webhook_url() -> String {
    auditrelay_dispatch::DEFAULT_ENDPOINT_URL.to_string()
}

fn default_max_concurrent_sends() -> usize {
    auditrelay_dispatch::DEFAULT_MAX_CONCURRENT_SENDS
}

fn default_admission_timeout_ms() -> u64 {
    1000
}

fn default_send_timeout_ms() -> u64 {
    3000
}

fn default_resource() -> String {
    NormalizerConfig::default().resource
}

fn default_shutdown_grace() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
