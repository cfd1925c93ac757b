//! Configuration loading with env-var overrides.
//!
//! Reads an optional TOML file (`GIGAPOST_CONFIG`, else
//! `config/default.toml`), then applies `GIGAPOST_LOG_LEVEL` and
//! `GIGACHAT_SCOPE` env overrides. Credentials come from the environment
//! only: `TELEGRAM_BOT_TOKEN` and `GIGACHAT_API_KEY`.

use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// GigaChat endpoint and sampling configuration (`[generator.gigachat]`).
#[derive(Debug, Clone)]
pub struct GigaChatConfig {
    /// OAuth endpoint that issues access tokens.
    pub auth_url: String,
    /// Chat completions endpoint.
    pub api_url: String,
    /// Authorization scope sent with every token request.
    pub scope: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Skip TLS certificate validation. Off unless explicitly enabled.
    pub accept_invalid_certs: bool,
    /// Extra PEM root certificate to trust (e.g. the Russian Trusted Root CA).
    pub ca_cert_path: Option<PathBuf>,
    /// Reuse the access token until shortly before it expires.
    pub cache_token: bool,
}

/// Generator selection (`[generator]`).
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// `"gigachat"` or `"dummy"`. Maps to `default` in the TOML.
    pub provider: String,
    pub gigachat: GigaChatConfig,
}

/// Conversation controller configuration (`[conversation]`).
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// When `true`, `/start` and `/post` sent while a topic is awaited are
    /// handled as commands instead of being consumed as the topic.
    pub commands_interrupt_topic: bool,
    /// Evict sessions idle for longer than this. `None` keeps them forever.
    pub session_ttl_seconds: Option<u64>,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub telegram: TelegramConfig,
    pub pty: PtyConfig,
}

/// Credentials sourced from the environment. Never read from TOML.
#[derive(Clone, Default)]
pub struct Secrets {
    pub telegram_token: Option<String>,
    pub gigachat_api_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &Option<String>| if s.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("telegram_token", &mask(&self.telegram_token))
            .field("gigachat_api_key", &mask(&self.gigachat_api_key))
            .finish()
    }
}

/// Fully-resolved bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub generator: GeneratorConfig,
    pub conversation: ConversationConfig,
    pub comms: CommsConfig,
    pub secrets: Secrets,
}

impl Config {
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }

    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    /// Check that every credential the enabled components need is present.
    ///
    /// A missing credential is fatal: the caller logs it and exits.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.comms_telegram_should_load() && self.secrets.telegram_token.is_none() {
            return Err(AppError::Config(
                "TELEGRAM_BOT_TOKEN is not set in the environment".into(),
            ));
        }
        if self.generator.provider == "gigachat" && self.secrets.gigachat_api_key.is_none() {
            return Err(AppError::Config(
                "GIGACHAT_API_KEY is not set in the environment".into(),
            ));
        }
        if !self.comms_telegram_should_load() && !self.comms_pty_should_load() {
            return Err(AppError::Config("no comms channel enabled".into()));
        }
        Ok(())
    }
}

/// Values normally taken from the process environment.
/// Tests build this directly instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub scope: Option<String>,
    pub secrets: Secrets,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("GIGAPOST_LOG_LEVEL").ok(),
            scope: non_empty_var("GIGACHAT_SCOPE"),
            secrets: Secrets {
                telegram_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
                gigachat_api_key: non_empty_var("GIGACHAT_API_KEY"),
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    generator: RawGenerator,
    #[serde(default)]
    conversation: RawConversation,
    #[serde(default)]
    comms: RawComms,
}

#[derive(Deserialize)]
struct RawBot {
    #[serde(default = "default_bot_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { name: default_bot_name(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawGenerator {
    #[serde(rename = "default", default = "default_provider")]
    provider: String,
    #[serde(default)]
    gigachat: RawGigaChat,
}

impl Default for RawGenerator {
    fn default() -> Self {
        Self { provider: default_provider(), gigachat: RawGigaChat::default() }
    }
}

#[derive(Deserialize)]
struct RawGigaChat {
    #[serde(default = "default_auth_url")]
    auth_url: String,
    #[serde(default = "default_api_url")]
    api_url: String,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    accept_invalid_certs: bool,
    #[serde(default)]
    ca_cert_path: Option<String>,
    #[serde(default)]
    cache_token: bool,
}

impl Default for RawGigaChat {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            api_url: default_api_url(),
            scope: default_scope(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            cache_token: false,
        }
    }
}

#[derive(Deserialize)]
struct RawConversation {
    #[serde(default)]
    commands_interrupt_topic: bool,
    #[serde(default)]
    session_ttl_seconds: Option<u64>,
    #[serde(default = "default_sweep_interval")]
    sweep_interval_seconds: u64,
}

impl Default for RawConversation {
    fn default() -> Self {
        Self {
            commands_interrupt_topic: false,
            session_ttl_seconds: None,
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    telegram: RawTelegram,
    #[serde(default)]
    pty: RawPty,
}

#[derive(Deserialize)]
struct RawTelegram {
    /// Defaults to `true`: Telegram is the primary transport.
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawTelegram {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize, Default)]
struct RawPty {
    #[serde(default)]
    enabled: bool,
}

fn default_bot_name() -> String { "gigapost".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_provider() -> String { "gigachat".to_string() }
fn default_auth_url() -> String { "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string() }
fn default_api_url() -> String { "https://gigachat.devices.sberbank.ru/api/v1/chat/completions".to_string() }
fn default_scope() -> String { "GIGACHAT_API_PERS".to_string() }
fn default_model() -> String { "GigaChat".to_string() }
fn default_temperature() -> f64 { 0.7 }
fn default_max_tokens() -> u32 { 1000 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_sweep_interval() -> u64 { 300 }
fn default_true() -> bool { true }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from the environment-selected file, then apply env overrides.
pub fn load() -> Result<Config, AppError> {
    let path = match env::var("GIGAPOST_CONFIG") {
        Ok(p) => Some(PathBuf::from(p)),
        Err(_) => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            default.exists().then(|| default.to_path_buf())
        }
    };
    load_from(path.as_deref(), EnvOverrides::from_env())
}

/// Internal loader. `path = None` means built-in defaults only.
pub fn load_from(path: Option<&Path>, overrides: EnvOverrides) -> Result<Config, AppError> {
    let parsed: RawConfig = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
            toml::from_str(&raw)
                .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
        }
        None => RawConfig::default(),
    };

    let g = parsed.generator.gigachat;
    let c = parsed.conversation;

    if c.sweep_interval_seconds == 0 {
        return Err(AppError::Config("sweep_interval_seconds must be positive".into()));
    }

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level: overrides.log_level.unwrap_or(parsed.bot.log_level),
        generator: GeneratorConfig {
            provider: parsed.generator.provider,
            gigachat: GigaChatConfig {
                auth_url: g.auth_url,
                api_url: g.api_url,
                scope: overrides.scope.unwrap_or(g.scope),
                model: g.model,
                temperature: g.temperature,
                max_tokens: g.max_tokens,
                timeout_seconds: g.timeout_seconds,
                accept_invalid_certs: g.accept_invalid_certs,
                ca_cert_path: g.ca_cert_path.map(PathBuf::from),
                cache_token: g.cache_token,
            },
        },
        conversation: ConversationConfig {
            commands_interrupt_topic: c.commands_interrupt_topic,
            session_ttl_seconds: c.session_ttl_seconds,
            sweep_interval_seconds: c.sweep_interval_seconds,
        },
        comms: CommsConfig {
            telegram: TelegramConfig { enabled: parsed.comms.telegram.enabled },
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
        },
        secrets: overrides.secrets,
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    /// Dummy generator, console channel only, no credentials.
    pub fn test_default() -> Self {
        let mut cfg = load_from(None, EnvOverrides::default())
            .unwrap_or_else(|e| panic!("defaults must load: {e}"));
        cfg.generator.provider = "dummy".into();
        cfg.comms.telegram.enabled = false;
        cfg.comms.pty.enabled = true;
        cfg
    }
}
