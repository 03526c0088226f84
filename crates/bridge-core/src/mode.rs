//! Launch modes and their availability.
//!
//! Everything here is pure: the probe results and configuration snapshot go
//! in, the launchable modes and default choice come out.

use crate::store::ConfigSnapshot;

/// Which model-serving target receives the launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendMode {
    Cloud,
    Local,
}

impl BackendMode {
    /// Cloud launches carry the remote credential; Local launches never do.
    pub fn requires_remote_credential(&self) -> bool {
        matches!(self, BackendMode::Cloud)
    }

    /// Model identifier handed to the agent for this mode.
    pub fn model_identifier<'a>(&self, config: &'a ConfigSnapshot) -> &'a str {
        match self {
            BackendMode::Cloud => &config.cloud_model,
            BackendMode::Local => &config.local_model,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendMode::Cloud => "Cloud (Gemini)",
            BackendMode::Local => "Local (Ollama)",
        }
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Cloud => f.write_str("cloud"),
            BackendMode::Local => f.write_str("local"),
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cloud" => Ok(BackendMode::Cloud),
            "local" => Ok(BackendMode::Local),
            other => Err(format!("unknown mode '{}' (expected cloud or local)", other)),
        }
    }
}

/// Which modes can be chosen right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub cloud_available: bool,
    /// Always true: an unready local backend is remediated on selection.
    pub local_selectable: bool,
    /// The local service is currently down and will be started on selection.
    pub local_needs_auto_start: bool,
}

impl Availability {
    /// Cloud when it can launch, otherwise Local.
    pub fn default_mode(&self) -> BackendMode {
        if self.cloud_available {
            BackendMode::Cloud
        } else {
            BackendMode::Local
        }
    }

    pub fn is_selectable(&self, mode: BackendMode) -> bool {
        match mode {
            BackendMode::Cloud => self.cloud_available,
            BackendMode::Local => self.local_selectable,
        }
    }
}

/// Derive mode availability from probe results and the credential.
pub fn compute_availability(
    internet_up: bool,
    credential_present: bool,
    local_service_up: bool,
) -> Availability {
    Availability {
        cloud_available: internet_up && credential_present,
        local_selectable: true,
        local_needs_auto_start: !local_service_up,
    }
}

/// Everything one menu render needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub internet_up: bool,
    pub local_service_up: bool,
    pub config: ConfigSnapshot,
    pub availability: Availability,
}

impl StatusSnapshot {
    pub fn new(internet_up: bool, local_service_up: bool, config: ConfigSnapshot) -> Self {
        let availability =
            compute_availability(internet_up, config.has_credential(), local_service_up);
        Self {
            internet_up,
            local_service_up,
            config,
            availability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_availability_over_all_inputs() {
        for internet in [true, false] {
            for credential in [true, false] {
                for local in [true, false] {
                    let availability = compute_availability(internet, credential, local);
                    assert_eq!(availability.cloud_available, internet && credential);
                    assert!(availability.local_selectable);
                    assert_eq!(availability.local_needs_auto_start, !local);
                    // Same inputs, same answer.
                    assert_eq!(availability, compute_availability(internet, credential, local));
                }
            }
        }
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(
            compute_availability(true, true, false).default_mode(),
            BackendMode::Cloud
        );
        assert_eq!(
            compute_availability(false, true, true).default_mode(),
            BackendMode::Local
        );
        assert_eq!(
            compute_availability(true, false, true).default_mode(),
            BackendMode::Local
        );
    }

    #[test]
    fn test_offline_with_credential_disables_cloud() {
        let config = ConfigSnapshot {
            api_key: "secret".into(),
            ..ConfigSnapshot::default()
        };
        let status = StatusSnapshot::new(false, true, config);

        assert!(!status.availability.is_selectable(BackendMode::Cloud));
        assert!(status.availability.is_selectable(BackendMode::Local));
    }

    #[test]
    fn test_mode_attributes() {
        let config = ConfigSnapshot::default();

        assert!(BackendMode::Cloud.requires_remote_credential());
        assert!(!BackendMode::Local.requires_remote_credential());
        assert_eq!(
            BackendMode::Cloud.model_identifier(&config),
            "gemini/gemini-1.5-pro-latest"
        );
        assert_eq!(
            BackendMode::Local.model_identifier(&config),
            "ollama/qwen2.5-coder:32b"
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("cloud".parse::<BackendMode>(), Ok(BackendMode::Cloud));
        assert_eq!("LOCAL".parse::<BackendMode>(), Ok(BackendMode::Local));
        assert!("both".parse::<BackendMode>().is_err());
    }
}
