#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! [`RuntimeConfig`] chooses where delegated listeners are installed, which
//! event types beyond [`STANDARD_EVENTS`](crate::STANDARD_EVENTS) are
//! delegated, which ports exist, and how many scheduler turns a drain may
//! take. Runtimes always work on a [`sanitized`](RuntimeConfig::sanitized)
//! copy.
//!
//! With the `config-file` feature the configuration can be loaded from TOML
//! or JSON:
//!
//! ```toml
//! event_root = { id = "app" }
//! extra_events = ["scroll"]
//! inbound_ports = ["setTheme"]
//! outbound_ports = ["accentColor"]
//! capture = true
//! max_turns_per_drain = 32
//! ```

use std::fmt;

use sprig_runtime::{Ports, Scheduler};

use crate::events::STANDARD_EVENTS;

const DEFAULT_MAX_TURNS: usize = 64;

/// Where delegated listeners are attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum EventRoot {
    /// The page body.
    #[default]
    Body,
    /// The node the app is mounted under.
    Mount,
    /// The element with this `id`.
    Id(String),
}

/// Configuration shared by [`App`](crate::App) and [`Program`](crate::Program).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-file",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct RuntimeConfig {
    pub event_root: EventRoot,
    /// Event types delegated in addition to the standard set.
    pub extra_events: Vec<String>,
    /// Ports the host sends into.
    pub inbound_ports: Vec<String>,
    /// Ports the host listens on.
    pub outbound_ports: Vec<String>,
    /// Install root listeners in the capture phase.
    pub capture: bool,
    /// Turn budget for [`App::run_until_idle`](crate::App::run_until_idle).
    pub max_turns_per_drain: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_root: EventRoot::Body,
            extra_events: Vec::new(),
            inbound_ports: Vec::new(),
            outbound_ports: Vec::new(),
            capture: true,
            max_turns_per_drain: DEFAULT_MAX_TURNS,
        }
    }
}

impl RuntimeConfig {
    /// Copy with names trimmed, empty and duplicate names dropped, standard
    /// events removed from `extra_events`, and a zero turn budget reset.
    ///
    /// A port declared in both directions stays inbound.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();
        config.extra_events = normalize_names(&config.extra_events)
            .into_iter()
            .filter(|kind| !STANDARD_EVENTS.iter().any(|standard| standard == kind))
            .collect();
        config.inbound_ports = normalize_names(&config.inbound_ports);
        config.outbound_ports = normalize_names(&config.outbound_ports)
            .into_iter()
            .filter(|name| {
                let clash = config.inbound_ports.contains(name);
                if clash {
                    tracing::warn!(port = %name, "port declared in both directions; keeping inbound");
                }
                !clash
            })
            .collect();
        if let EventRoot::Id(id) = &config.event_root {
            let id = id.trim();
            config.event_root = if id.is_empty() {
                EventRoot::Body
            } else {
                EventRoot::Id(id.to_owned())
            };
        }
        if config.max_turns_per_drain == 0 {
            config.max_turns_per_drain = DEFAULT_MAX_TURNS;
        }
        config
    }

    /// Strict check: fails where [`sanitized`](Self::sanitized) would have to
    /// guess.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self
            .outbound_ports
            .iter()
            .find(|name| self.inbound_ports.contains(name))
        {
            return Err(ConfigError::Invalid(format!(
                "port `{name}` is declared both inbound and outbound"
            )));
        }
        Ok(())
    }

    /// Declare the configured ports on `scheduler`.
    #[must_use]
    pub fn ports(&self, scheduler: Scheduler) -> Ports {
        let config = self.sanitized();
        Ports::declare(scheduler, config.inbound_ports, config.outbound_ports)
    }

    /// Parse, validate and sanitize a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config.sanitized())
    }

    /// Parse, validate and sanitize a JSON document.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config.sanitized())
    }
}

fn normalize_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_owned());
        }
    }
    out
}

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Malformed TOML.
    Toml(String),
    /// Malformed JSON.
    Json(String),
    /// Well-formed but contradictory settings.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml(message) => write!(f, "invalid TOML config: {message}"),
            Self::Json(message) => write!(f, "invalid JSON config: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
