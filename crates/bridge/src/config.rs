//! Launcher settings for bridge.
//!
//! These are the knobs around the orchestrator (probe targets, service port,
//! poll policy, agent binary), not the user's credential and model choices,
//! which live in the JSON store. Loaded with precedence:
//! 1. Environment variables (BRIDGE_AGENT, BRIDGE_OLLAMA)
//! 2. Settings file (~/.config/bridge-cli/launcher.toml)
//! 3. Default values

use anyhow::{Context, Result};
use bridge_core::OrchestratorSettings;
use bridge_core::dispatch::DEFAULT_AGENT_BINARY;
use bridge_core::probe::{Endpoint, INTERNET_HOST, INTERNET_PORT};
use bridge_core::readiness::{
    DEFAULT_POLL_ATTEMPTS, DEFAULT_SERVICE_BINARY, DEFAULT_SERVICE_PORT, LocalBackend, PollPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connectivity probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Local inference server settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Coding agent settings
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Host checked for internet reachability
    #[serde(default = "default_internet_host")]
    pub internet_host: String,

    #[serde(default = "default_internet_port")]
    pub internet_port: u16,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Inference server binary
    #[serde(default = "default_service_binary")]
    pub binary: String,

    /// Loopback port the server listens on
    #[serde(default = "default_service_port")]
    pub port: u16,

    /// Delay between liveness checks after starting the server
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Liveness checks before giving up
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Coding agent binary, looked up next to bridge and then on PATH
    #[serde(default = "default_agent_binary")]
    pub binary: String,

    /// Extra arguments appended after the built-in flags
    #[serde(default)]
    pub args: Vec<String>,
}

// Default value functions
fn default_internet_host() -> String {
    INTERNET_HOST.to_string()
}

fn default_internet_port() -> u16 {
    INTERNET_PORT
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_service_binary() -> String {
    DEFAULT_SERVICE_BINARY.to_string()
}

fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_poll_attempts() -> u32 {
    DEFAULT_POLL_ATTEMPTS
}

fn default_agent_binary() -> String {
    DEFAULT_AGENT_BINARY.to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            internet_host: default_internet_host(),
            internet_port: default_internet_port(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            binary: default_service_binary(),
            port: default_service_port(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_attempts: default_poll_attempts(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: default_agent_binary(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path())?;
        Ok(config.with_overrides(
            std::env::var("BRIDGE_AGENT").ok(),
            std::env::var("BRIDGE_OLLAMA").ok(),
        ))
    }

    /// Load from a specific file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read settings file")?;
        toml::from_str(&content).context("Failed to parse settings file")
    }

    /// Get the settings file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BRIDGE_SETTINGS") {
            PathBuf::from(path)
        } else {
            bridge_core::store::config_dir().join("launcher.toml")
        }
    }

    /// Apply binary overrides; blank values are ignored.
    pub fn with_overrides(mut self, agent: Option<String>, ollama: Option<String>) -> Self {
        if let Some(agent) = agent.filter(|v| !v.trim().is_empty()) {
            self.agent.binary = agent;
        }
        if let Some(ollama) = ollama.filter(|v| !v.trim().is_empty()) {
            self.service.binary = ollama;
        }
        self
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            internet: Endpoint::new(&self.probe.internet_host, self.probe.internet_port),
            probe_timeout: Duration::from_millis(self.probe.timeout_ms),
            backend: LocalBackend {
                binary: self.service.binary.clone(),
                port: self.service.port,
            },
            poll: PollPolicy::new(
                Duration::from_millis(self.service.poll_interval_ms),
                self.service.poll_attempts,
            ),
            agent_binary: self.agent.binary.clone(),
            agent_args: self.agent.args.clone(),
        }
    }
}
