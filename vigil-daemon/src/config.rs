//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vigil_audio::AudioConfig;
use vigil_evidence::{default_snapshot_command, Coordinates};
use vigil_live::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

use crate::controller::ControllerSettings;
use crate::guards::default_inhibit_command;
use crate::state::EmergencyContact;

/// Detection service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub endpoint: String,
    pub model: String,

    /// Inline key; prefer `api_key_env`
    pub api_key: Option<String>,

    /// Environment variable holding the key
    pub api_key_env: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl LiveConfig {
    /// Inline key first, then the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    pub location_timeout_secs: u64,

    /// Bound on grabbing one camera frame
    pub snapshot_timeout_secs: u64,

    /// JPEG quality, 1-100
    pub jpeg_quality: u8,

    /// Fixed position of a stationary install; unset means "Unknown Location"
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub camera_device: String,

    /// Writes one image to stdout; `{device}` is replaced with `camera_device`
    pub snapshot_command: Vec<String>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            location_timeout_secs: 5,
            snapshot_timeout_secs: 5,
            jpeg_quality: 50,
            latitude: None,
            longitude: None,
            camera_device: "/dev/video0".to_string(),
            snapshot_command: default_snapshot_command(),
        }
    }
}

impl EvidenceConfig {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeLockConfig {
    pub enabled: bool,
    pub command: Vec<String>,
}

impl Default for WakeLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_inhibit_command(),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Control socket
    pub socket_path: String,

    /// Status broadcast socket for UI clients
    pub ui_socket_path: String,

    pub silent_mode: bool,

    pub contact: EmergencyContact,
    pub live: LiveConfig,
    pub audio: AudioConfig,
    pub evidence: EvidenceConfig,
    pub wake_lock: WakeLockConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            socket_path: socket_or_tmp(vigil_paths::get_ipc_socket_path(), "vigil.sock"),
            ui_socket_path: socket_or_tmp(vigil_paths::get_ui_socket_path(), "vigil_ui.sock"),
            silent_mode: false,
            contact: EmergencyContact::default(),
            live: LiveConfig::default(),
            audio: AudioConfig::default(),
            evidence: EvidenceConfig::default(),
            wake_lock: WakeLockConfig::default(),
        }
    }
}

fn socket_or_tmp(resolved: Result<PathBuf>, name: &str) -> String {
    resolved
        .unwrap_or_else(|_| std::env::temp_dir().join(name))
        .display()
        .to_string()
}

impl DaemonConfig {
    /// Load from `path` (or the default location), writing defaults out
    /// when the file does not exist yet
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate().context("Invalid [audio] section")?;
        anyhow::ensure!(
            (1..=100).contains(&self.evidence.jpeg_quality),
            "evidence.jpeg_quality must be between 1 and 100, got {}",
            self.evidence.jpeg_quality
        );
        anyhow::ensure!(
            self.evidence.latitude.is_some() == self.evidence.longitude.is_some(),
            "evidence.latitude and evidence.longitude must be set together"
        );
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            session: vigil_live::SessionConfig {
                model: self.live.model.clone(),
                audio: self.audio.clone(),
            },
            location_timeout: Duration::from_secs(self.evidence.location_timeout_secs),
            snapshot_timeout: Duration::from_secs(self.evidence.snapshot_timeout_secs),
            jpeg_quality: self.evidence.jpeg_quality,
            ..ControllerSettings::default()
        }
    }

    fn default_config_path() -> PathBuf {
        vigil_paths::get_config_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.evidence.jpeg_quality, 50);
        assert_eq!(config.evidence.location_timeout_secs, 5);
        assert_eq!(config.evidence.snapshot_timeout_secs, 5);
        assert!(!config.audio.noise_suppression);
        assert_eq!(config.live.api_key_env, "GEMINI_API_KEY");

        let reloaded = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(reloaded.live.model, config.live.model);
        assert_eq!(reloaded.socket_path, config.socket_path);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
silent_mode = true

[contact]
name = "Mom"
phone = "+15550123"

[evidence]
latitude = 52.52
longitude = 13.405
"#,
        )
        .unwrap();

        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert!(config.silent_mode);
        assert!(config.contact.is_complete());
        assert_eq!(config.audio.frame_size, 4096);
        assert!(config.evidence.coordinates().is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_half_coordinates() {
        let mut config = DaemonConfig::default();
        config.evidence.latitude = Some(1.0);
        assert!(config.validate().is_err());

        config.evidence.latitude = None;
        config.evidence.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inline_key_wins() {
        let live = LiveConfig {
            api_key: Some("inline".to_string()),
            api_key_env: "VIGIL_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        assert_eq!(live.resolve_api_key().as_deref(), Some("inline"));

        let blank = LiveConfig {
            api_key: Some("  ".to_string()),
            api_key_env: "VIGIL_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        assert_eq!(blank.resolve_api_key(), None);
    }
}
