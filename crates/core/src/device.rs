use crate::probe::{MetadataMap, MetadataTool};
use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ANDROID_MAKES: &[&str] = &[
    "google", "samsung", "oneplus", "xiaomi", "motorola", "huawei", "oppo", "vivo", "realme",
    "honor",
];
const ANDROID_MODEL_MARKERS: &[&str] = &["pixel", "galaxy"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Iphone,
    Android,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceSource {
    Metadata,
    Extension,
}

/// Filename labels used for each device kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevicePrefixes {
    pub iphone: String,
    pub android: String,
    pub unknown: String,
}

impl Default for DevicePrefixes {
    fn default() -> Self {
        Self {
            iphone: "iphone".to_string(),
            android: "android".to_string(),
            unknown: "unknown".to_string(),
        }
    }
}

impl DevicePrefixes {
    pub fn label(&self, device: DeviceKind) -> &str {
        match device {
            DeviceKind::Iphone => &self.iphone,
            DeviceKind::Android => &self.android,
            DeviceKind::Unknown => &self.unknown,
        }
    }

    pub fn labels(&self) -> [&str; 3] {
        [&self.iphone, &self.android, &self.unknown]
    }

    /// Labels end up inside file names, so they must be non-empty single path components.
    pub fn validate(&self) -> Result<()> {
        for label in self.labels() {
            if label.trim().is_empty() {
                bail!("device label must not be empty");
            }
            if label
                .chars()
                .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control())
            {
                bail!("device label contains a path separator or control character: {label:?}");
            }
        }
        Ok(())
    }
}

pub fn classify_device(path: &Path, reader: &dyn MetadataTool) -> (DeviceKind, DeviceSource) {
    match reader.read(path) {
        Ok(map) => {
            if let Some(device) = device_from_metadata(&map) {
                return (device, DeviceSource::Metadata);
            }
            debug!("no device markers in metadata: {}", path.display());
        }
        Err(err) => {
            debug!("metadata reader failed for {}: {err}", path.display());
        }
    }

    (device_from_extension(path), DeviceSource::Extension)
}

pub fn device_from_metadata(map: &MetadataMap) -> Option<DeviceKind> {
    let make = field(map, "Make").unwrap_or_default();
    let model = field(map, "Model").unwrap_or_default();
    let android_make = field(map, "AndroidMake").unwrap_or_default();
    let android_model = field(map, "AndroidModel").unwrap_or_default();

    if make == "apple" || model.contains("iphone") {
        return Some(DeviceKind::Iphone);
    }

    if !android_make.is_empty()
        || !android_model.is_empty()
        || ANDROID_MAKES.iter().any(|vendor| make.contains(vendor))
        || ANDROID_MODEL_MARKERS
            .iter()
            .any(|marker| model.contains(marker))
    {
        return Some(DeviceKind::Android);
    }

    None
}

pub fn device_from_extension(path: &Path) -> DeviceKind {
    let ext = path
        .extension()
        .map(|v| v.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mov" | "heic" => DeviceKind::Iphone,
        "mp4" | "jpg" | "jpeg" => DeviceKind::Android,
        _ => DeviceKind::Unknown,
    }
}

/// Case-insensitive key lookup, value trimmed and lower-cased.
fn field(map: &MetadataMap, name: &str) -> Option<String> {
    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}
