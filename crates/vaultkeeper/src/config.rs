//! The configuration file read by the core: backend list, key-rotation
//! cadence, per-secret defaults, and the development-mode executable
//! allowlist.

use serde::{Deserialize, Serialize};

use vaultkeeper_core::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub backend_type: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRotationConfig {
    pub grace_period_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    pub ttl_minutes: u32,
    pub trust_tier: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DevelopmentMode {
    #[serde(default)]
    pub executables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: u32,
    pub backends: Vec<BackendConfig>,
    pub key_rotation: KeyRotationConfig,
    pub defaults: Defaults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_mode: Option<DevelopmentMode>,
}

impl Config {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Config = serde_json::from_slice(bytes).map_err(|e| Error::Setup {
            dependency: format!("config JSON: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Error::Setup {
                dependency: format!("config version {} (expected 1)", self.version),
            });
        }
        if self.backends.is_empty() {
            return Err(Error::Setup {
                dependency: "at least one backend entry".to_string(),
            });
        }
        if !(1..=3).contains(&self.defaults.trust_tier) {
            return Err(Error::Setup {
                dependency: format!("defaults.trustTier {} (must be 1, 2, or 3)", self.defaults.trust_tier),
            });
        }
        if self.defaults.ttl_minutes == 0 {
            return Err(Error::Setup {
                dependency: "defaults.ttlMinutes must be > 0".to_string(),
            });
        }
        if self.key_rotation.grace_period_days == 0 {
            return Err(Error::Setup {
                dependency: "keyRotation.gracePeriodDays must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the configured backend types in declaration order, filtered
    /// to those marked `enabled`.
    pub fn enabled_backend_types(&self) -> Vec<String> {
        self.backends
            .iter()
            .filter(|b| b.enabled)
            .map(|b| b.backend_type.clone())
            .collect()
    }

    pub fn is_dev_allowlisted(&self, exec_path: &str) -> bool {
        exec_path == "dev"
            || self
                .development_mode
                .as_ref()
                .map(|dev| dev.executables.iter().any(|e| e == exec_path))
                .unwrap_or(false)
    }

    /// Mutates the in-memory allowlist. Persistence to disk is a
    /// collaborator concern outside this core.
    pub fn set_development_mode(&mut self, exec_path: &str, enabled: bool) {
        let dev = self.development_mode.get_or_insert_with(DevelopmentMode::default);
        if enabled {
            if !dev.executables.iter().any(|e| e == exec_path) {
                dev.executables.push(exec_path.to_string());
            }
        } else {
            dev.executables.retain(|e| e != exec_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "version": 1,
            "backends": [{"type": "memory", "enabled": true}],
            "keyRotation": {"gracePeriodDays": 7},
            "defaults": {"ttlMinutes": 15, "trustTier": 3}
        }"#
    }

    #[test]
    fn parses_minimal_config() {
        let config = Config::from_json(minimal_json().as_bytes()).unwrap();
        assert_eq!(config.enabled_backend_types(), vec!["memory".to_string()]);
    }

    #[test]
    fn rejects_wrong_version() {
        let json = minimal_json().replace("\"version\": 1", "\"version\": 2");
        let err = Config::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[test]
    fn rejects_empty_backends() {
        let json = minimal_json().replace(
            r#""backends": [{"type": "memory", "enabled": true}]"#,
            r#""backends": []"#,
        );
        let err = Config::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[test]
    fn rejects_bad_trust_tier() {
        let json = minimal_json().replace("\"trustTier\": 3", "\"trustTier\": 9");
        let err = Config::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[test]
    fn set_development_mode_is_in_memory_only() {
        let mut config = Config::from_json(minimal_json().as_bytes()).unwrap();
        assert!(!config.is_dev_allowlisted("/usr/bin/myapp"));
        config.set_development_mode("/usr/bin/myapp", true);
        assert!(config.is_dev_allowlisted("/usr/bin/myapp"));
        config.set_development_mode("/usr/bin/myapp", false);
        assert!(!config.is_dev_allowlisted("/usr/bin/myapp"));
    }
}
