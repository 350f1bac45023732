use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CastError, Result};

/// Environment variable selecting the directory for generated and temp files.
pub const DATA_DIR_ENV: &str = "VNCAST_DATA_DIR";

/// Directory where the capture output, temp file, cuepoint file and final
/// video are written. Falls back to the platform temp dir.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Encoding preset selection for the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Generic high-quality encode, container codec left to ffmpeg.
    Flv,
    /// Constrained-baseline libx264 for wider player compatibility.
    H264,
}

/// Configuration for one recording session. Immutable once the session
/// starts; `restart()` re-reads the same configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Final output filename (not a path; placed under the data dir).
    pub filename: String,
    /// Working directory for generated files. `None` falls back to the
    /// `VNCAST_DATA_DIR` env var, then the platform temp dir.
    pub data_dir: Option<PathBuf>,
    /// VNC server host.
    pub host: String,
    /// VNC display number (host:display is the capture target).
    pub display: u32,
    /// Capture frame rate (fps).
    pub framerate: u32,
    /// Seconds between navigation cuepoints.
    pub cue_interval: u32,
    /// Optional clipping region, WxH+X+Y.
    pub clipping: Option<String>,
    /// VNC password file, if authentication is needed.
    pub password_file: Option<PathBuf>,
    /// Optional transport port appended to the capture target.
    pub port: Option<u16>,
    /// Encoding preset.
    pub codec: Codec,
    /// Seconds between forced keyframes.
    pub seconds_per_keyframe: u32,
    /// Per-step timeout for the external encode/inject tools.
    pub tool_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            filename: "vncast-video.flv".to_string(),
            data_dir: None,
            host: "localhost".to_string(),
            display: 0,
            framerate: 12,
            cue_interval: 1,
            clipping: None,
            password_file: Self::default_password_file(),
            port: None,
            codec: Codec::Flv,
            seconds_per_keyframe: 5,
            tool_timeout_secs: 600,
        }
    }
}

impl SessionConfig {
    /// `~/.vnc/passwd`, the conventional password file location, if a home
    /// dir is known.
    pub fn default_password_file() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".vnc").join("passwd"))
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(CastError::InvalidConfig(
                "output filename must not be empty".to_string(),
            ));
        }
        if self.framerate == 0 || self.framerate > 120 {
            return Err(CastError::InvalidConfig(
                "frame rate must be between 1 and 120 fps".to_string(),
            ));
        }
        if self.cue_interval == 0 {
            return Err(CastError::InvalidConfig(
                "cuepoint interval must be at least 1 second".to_string(),
            ));
        }
        if self.seconds_per_keyframe == 0 {
            return Err(CastError::InvalidConfig(
                "seconds per keyframe must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory all session files live in.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(data_dir)
    }

    /// Path the final, cuepoint-injected video is written to. The capture
    /// tool also records here; post-processing replaces it in place.
    pub fn output_path(&self) -> PathBuf {
        self.resolved_data_dir().join(&self.filename)
    }

    /// Intermediate encoded video, awaiting metadata injection. The encoder
    /// cannot safely overwrite its own input, so this is always distinct
    /// from the capture output.
    pub fn temp_path(&self) -> PathBuf {
        self.resolved_data_dir().join(format!("temp-{}", self.filename))
    }

    /// Transient navigation-cuepoint document consumed by the injector.
    pub fn cuepoint_path(&self) -> PathBuf {
        self.resolved_data_dir()
            .join(format!("{}-cuepoints.xml", self.filename))
    }

    /// Keyframe interval in frames: framerate x seconds-per-keyframe.
    pub fn keyframe_interval(&self) -> u32 {
        self.framerate * self.seconds_per_keyframe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_framerate() {
        let config = SessionConfig {
            framerate: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_cue_interval() {
        let config = SessionConfig {
            cue_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_filename() {
        let config = SessionConfig {
            filename: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn derived_paths_share_the_data_dir() {
        let config = SessionConfig::default();
        assert!(config
            .temp_path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("temp-"));
        assert!(config
            .cuepoint_path()
            .to_string_lossy()
            .ends_with("-cuepoints.xml"));
        assert_eq!(config.output_path().parent(), config.temp_path().parent());
    }

    #[test]
    fn keyframe_interval_is_rate_times_seconds() {
        let config = SessionConfig {
            framerate: 12,
            seconds_per_keyframe: 5,
            ..Default::default()
        };
        assert_eq!(config.keyframe_interval(), 60);
    }
}
