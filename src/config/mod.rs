use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

use crate::inference::GenerationConfig;

pub const DEFAULT_MODEL_ID: &str = "google/flan-t5-base";
pub const DEFAULT_TOPIC_SHORTCUT: f64 = 0.7;

/// Where the generation model comes from and how it samples.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model_id: String,
    pub model_dir: Option<PathBuf>,
    pub device: String,
    pub disabled: bool,
    pub generation: GenerationConfig,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_dir: None,
            device: "cpu".to_string(),
            disabled: false,
            generation: GenerationConfig::default(),
        }
    }
}

impl ModelSettings {
    pub fn describe_source(&self) -> String {
        match &self.model_dir {
            Some(dir) => dir.display().to_string(),
            None => self.model_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub template_dir: PathBuf,
    pub topic_shortcut: f64,
    pub model: ModelSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: true,
            template_dir: PathBuf::from("templates"),
            topic_shortcut: DEFAULT_TOPIC_SHORTCUT,
            model: ModelSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `CHAT_*` variables; `.env` should already be loaded.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model = ModelSettings {
            model_id: read("CHAT_MODEL_ID").unwrap_or(defaults.model.model_id),
            model_dir: read("CHAT_MODEL_DIR").map(PathBuf::from),
            device: read("CHAT_MODEL_DEVICE").unwrap_or(defaults.model.device),
            disabled: parse_or(&read, "CHAT_DISABLE_MODEL", false),
            generation: defaults.model.generation,
        };

        let topic_shortcut: f64 = parse_or(&read, "CHAT_TOPIC_SHORTCUT", defaults.topic_shortcut);

        Self {
            host: read("CHAT_HOST").unwrap_or(defaults.host),
            port: parse_or(&read, "CHAT_PORT", defaults.port),
            debug: parse_or(&read, "CHAT_DEBUG", defaults.debug),
            template_dir: read("CHAT_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_dir),
            topic_shortcut: if topic_shortcut.is_finite() {
                topic_shortcut.clamp(0.0, 1.0)
            } else {
                defaults.topic_shortcut
            },
            model,
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        debug_directive(self.debug)
    }
}

pub fn debug_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// `CHAT_DEBUG` is needed before the subscriber exists, so it is read on
/// its own without logging.
pub fn debug_from_env() -> bool {
    dotenvy::var("CHAT_DEBUG")
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(AppConfig::default().debug)
}

fn parse_or<T, F>(read: &F, key: &str, default: T) -> T
where
    T: ParseFlag,
    F: Fn(&str) -> Option<String>,
{
    match read(key) {
        None => default,
        Some(raw) => match T::parse_flag(raw.trim()) {
            Ok(v) => v,
            Err(err) => {
                warn!("ignoring {key}={raw:?} ({err}), using default");
                default
            }
        },
    }
}

trait ParseFlag: Sized {
    fn parse_flag(raw: &str) -> Result<Self, String>;
}

impl ParseFlag for bool {
    fn parse_flag(raw: &str) -> Result<Self, String> {
        parse_bool(raw).ok_or_else(|| "expected a boolean".to_string())
    }
}

impl ParseFlag for u16 {
    fn parse_flag(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

impl ParseFlag for f64 {
    fn parse_flag(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|e: std::num::ParseFloatError| e.to_string())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
