use crate::device::DevicePrefixes;
use crate::timestamp::{MtimeMode, DEFAULT_TIMEZONE};
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSIONS: &[&str] = &["mov", "mp4", "heic", "jpg", "jpeg"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub iphone_prefix: String,
    pub android_prefix: String,
    pub unknown_label: String,
    pub timezone: String,
    pub extensions: Vec<String>,
    pub exiftool_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub mtime_mode: MtimeMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        let prefixes = DevicePrefixes::default();
        Self {
            iphone_prefix: prefixes.iphone,
            android_prefix: prefixes.android,
            unknown_label: prefixes.unknown,
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|v| v.to_string()).collect(),
            exiftool_path: PathBuf::from("exiftool"),
            ffprobe_path: PathBuf::from("ffprobe"),
            mtime_mode: MtimeMode::default(),
        }
    }
}

impl AppConfig {
    pub fn prefixes(&self) -> DevicePrefixes {
        DevicePrefixes {
            iphone: self.iphone_prefix.clone(),
            android: self.android_prefix.clone(),
            unknown: self.unknown_label.clone(),
        }
    }

    pub fn target_zone(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("unknown timezone {:?}: {}", self.timezone, err))
    }

    /// Lower-cased, dot-free, deduplicated.
    pub fn normalized_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.extensions.len());
        for ext in &self.extensions {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() && !out.contains(&ext) {
                out.push(ext);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "media-renamer", "media-renamer")
        .context("could not determine the OS configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

/// Reads the per-user config file, falling back to defaults when it does not exist.
pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }
    load_config_from(&paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{load_config_from, AppConfig};
    use crate::timestamp::MtimeMode;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_original_labels_and_zone() {
        let config = AppConfig::default();
        assert_eq!(config.iphone_prefix, "iphone");
        assert_eq!(config.android_prefix, "android");
        assert_eq!(config.unknown_label, "unknown");
        assert_eq!(config.timezone, "America/Los_Angeles");
        assert_eq!(config.mtime_mode, MtimeMode::Instant);
        assert_eq!(
            config.normalized_extensions(),
            vec!["mov", "mp4", "heic", "jpg", "jpeg"]
        );
        assert!(config.target_zone().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "android_prefix = \"pixel\"\nmtime_mode = \"local-wall-clock\"\n",
        )
        .expect("write config");

        let config = load_config_from(&path).expect("config should parse");
        assert_eq!(config.android_prefix, "pixel");
        assert_eq!(config.iphone_prefix, "iphone");
        assert_eq!(config.mtime_mode, MtimeMode::LocalWallClock);
        assert_eq!(config.prefixes().android, "pixel");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        assert!(load_config_from(&temp.path().join("nope.toml")).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "extensions = 5\n").expect("write config");
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let config = AppConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..AppConfig::default()
        };
        assert!(config.target_zone().is_err());
    }

    #[test]
    fn extensions_are_normalized() {
        let config = AppConfig {
            extensions: vec![".MOV".into(), "mov".into(), " png ".into(), "".into()],
            ..AppConfig::default()
        };
        assert_eq!(config.normalized_extensions(), vec!["mov", "png"]);
    }
}
