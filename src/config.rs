use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::manifest::ManifestProfile;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DepthcapConfig {
    pub capture: CaptureConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Root directory holding one subdirectory per project
    #[serde(default = "default_capture_path")]
    pub path: String,

    /// Lossy quality for color images (0.0 - 1.0)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: f32,

    /// Drop frames arriving closer than this to the last accepted frame (0 disables)
    #[serde(default = "default_min_frame_interval_ms")]
    pub min_frame_interval_ms: u64,

    /// Frames that may wait for the writer before new ones are dropped
    #[serde(default = "default_max_queued_frames")]
    pub max_queued_frames: usize,

    /// IANA timezone used when deriving project names
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,

    /// Manifest schema written at finalize
    #[serde(default)]
    pub manifest_profile: ManifestProfile,

    /// Depth scale written by the depth_scale manifest profile
    #[serde(default = "default_integer_depth_scale")]
    pub integer_depth_scale: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArchiveConfig {
    /// Package the project into a zip archive when a session finalizes
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,

    /// Remove the working directory after a successful archive
    #[serde(default = "default_remove_after_archive")]
    pub remove_after_archive: bool,

    /// Compression applied to archive entries
    #[serde(default)]
    pub compression: ArchiveCompression,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveCompression {
    Stored,
    #[default]
    Deflated,
}

impl DepthcapConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("depthcap.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("capture.path", default_capture_path())?
            .set_default("capture.jpeg_quality", default_jpeg_quality() as f64)?
            .set_default(
                "capture.min_frame_interval_ms",
                default_min_frame_interval_ms(),
            )?
            .set_default(
                "capture.max_queued_frames",
                default_max_queued_frames() as u64,
            )?
            .set_default("capture.timestamp_timezone", default_timestamp_timezone())?
            .set_default("capture.manifest_profile", "nerfcapture")?
            .set_default(
                "capture.integer_depth_scale",
                default_integer_depth_scale() as f64,
            )?
            .set_default("archive.enabled", default_archive_enabled())?
            .set_default(
                "archive.remove_after_archive",
                default_remove_after_archive(),
            )?
            .set_default("archive.compression", "deflated")?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("DEPTHCAP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DepthcapConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Capture path must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.capture.jpeg_quality) {
            return Err(ConfigError::Message(
                "JPEG quality must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.capture.max_queued_frames == 0 {
            return Err(ConfigError::Message(
                "Frame queue capacity must be at least 1".to_string(),
            ));
        }

        if !(self.capture.integer_depth_scale.is_finite() && self.capture.integer_depth_scale > 0.0)
        {
            return Err(ConfigError::Message(
                "Integer depth scale must be a positive finite number".to_string(),
            ));
        }

        if self.capture.timestamp_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown timestamp timezone '{}'",
                self.capture.timestamp_timezone
            )));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for DepthcapConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            path: default_capture_path(),
            jpeg_quality: default_jpeg_quality(),
            min_frame_interval_ms: default_min_frame_interval_ms(),
            max_queued_frames: default_max_queued_frames(),
            timestamp_timezone: default_timestamp_timezone(),
            manifest_profile: ManifestProfile::default(),
            integer_depth_scale: default_integer_depth_scale(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            remove_after_archive: default_remove_after_archive(),
            compression: ArchiveCompression::default(),
        }
    }
}

fn default_capture_path() -> String {
    "./captures".to_string()
}
fn default_jpeg_quality() -> f32 {
    0.9
}
fn default_min_frame_interval_ms() -> u64 {
    100
}
fn default_max_queued_frames() -> usize {
    32
}
fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}
fn default_integer_depth_scale() -> f32 {
    1.0
}

fn default_archive_enabled() -> bool {
    true
}
fn default_remove_after_archive() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = DepthcapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture.min_frame_interval_ms, 100);
        assert_eq!(config.capture.manifest_profile, ManifestProfile::NerfCapture);
        assert!(config.archive.enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = DepthcapConfig::default();
        config.capture.jpeg_quality = 1.5;
        assert!(config.validate().is_err());

        config.capture.jpeg_quality = 0.8;
        config.capture.max_queued_frames = 0;
        assert!(config.validate().is_err());

        config.capture.max_queued_frames = 4;
        config.capture.timestamp_timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());

        config.capture.timestamp_timezone = "Asia/Tokyo".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[capture]\npath = \"/tmp/projects\"\nmanifest_profile = \"depth_scale\"\n\n[archive]\ncompression = \"stored\""
        )
        .unwrap();

        let config = DepthcapConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.capture.path, "/tmp/projects");
        assert_eq!(config.capture.manifest_profile, ManifestProfile::DepthScale);
        assert_eq!(config.archive.compression, ArchiveCompression::Stored);
        assert_eq!(config.capture.jpeg_quality, 0.9);
        assert!(config.archive.remove_after_archive);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DepthcapConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: DepthcapConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.capture.path, config.capture.path);
        assert_eq!(parsed.archive.compression, config.archive.compression);
    }
}
