use crate::grounded::PollPolicy;
use crate::openai::{DEFAULT_BASE_URL, OpenAiSettings};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Placeholder keys shipped in sample `.env` files.
const PLACEHOLDER_KEYS: &[&str] = &["sk-...", "your-openai-api-key"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Delay between run status polls, in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Maximum number of run status polls
    #[arg(long, env = "POLL_MAX_ATTEMPTS")]
    pub poll_max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub polling: PollingConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub assistant_id: Option<String>,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("assistant_id", &self.assistant_id)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_file_bytes: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 5001)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("openai.base_url", DEFAULT_BASE_URL)?
            .set_default("polling.interval_ms", 2000)?
            .set_default("polling.max_attempts", 30)?
            .set_default("upload.max_file_bytes", 10 * 1024 * 1024)?;

        // 2. Config file: explicit path must exist, ./config.yaml is optional
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path).required(true));
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        }

        // 3. Prefixed environment, e.g. SAGE_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("SAGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Provider environment variables under their usual names
        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            builder = builder.set_override("openai.api_key", key)?;
        }
        if let Some(id) = non_empty_env("OPENAI_ASSISTANT_ID") {
            builder = builder.set_override("openai.assistant_id", id)?;
        }
        if let Some(url) = non_empty_env("OPENAI_BASE_URL") {
            builder = builder.set_override("openai.base_url", url)?;
        }

        // 5. CLI flags (clap also resolves PORT, HOST, ... here)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(ms) = cli.poll_interval_ms {
            let ms = i64::try_from(ms).unwrap_or(i64::MAX);
            builder = builder.set_override("polling.interval_ms", ms)?;
        }
        if let Some(n) = cli.poll_max_attempts {
            builder = builder.set_override("polling.max_attempts", i64::from(n))?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        url::Url::parse(&self.openai.base_url).map_err(|e| {
            config::ConfigError::Message(format!(
                "openai.base_url `{}` is not a valid URL: {e}",
                self.openai.base_url
            ))
        })?;
        if self.polling.max_attempts == 0 {
            return Err(config::ConfigError::Message(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.polling.interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "polling.interval_ms must be at least 1".to_string(),
            ));
        }
        if self.poll_policy().budget().is_none() {
            return Err(config::ConfigError::Message(format!(
                "polling budget of {} x {} ms overflows",
                self.polling.max_attempts, self.polling.interval_ms
            )));
        }
        Ok(())
    }

    /// Poll policy for grounded runs.
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.polling.interval_ms),
            self.polling.max_attempts,
        )
    }

    /// OpenAI settings, if an API key is configured.
    #[must_use]
    pub fn openai_settings(&self) -> Option<OpenAiSettings> {
        let api_key = self
            .openai
            .api_key
            .as_ref()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && !PLACEHOLDER_KEYS.contains(k))?;

        Some(OpenAiSettings {
            base_url: self.openai.base_url.clone(),
            api_key: api_key.to_string(),
            assistant_id: self
                .openai
                .assistant_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}
