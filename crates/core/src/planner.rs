use crate::config::{AppConfig, DEFAULT_EXTENSIONS};
use crate::device::{classify_device, DeviceKind, DevicePrefixes, DeviceSource};
use crate::naming::{build_file_name, build_stem, CanonicalPattern, TargetRegistry};
use crate::probe::MetadataTools;
use crate::timestamp::{
    format_stamp, resolve_timestamp, MtimeMode, TimestampSource, DEFAULT_TIMEZONE,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub root: PathBuf,
    pub prefixes: DevicePrefixes,
    pub extensions: Vec<String>,
    pub timezone: Tz,
    pub mtime_mode: MtimeMode,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            prefixes: DevicePrefixes::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|v| v.to_string()).collect(),
            timezone: DEFAULT_TIMEZONE,
            mtime_mode: MtimeMode::default(),
        }
    }
}

impl PlanOptions {
    pub fn from_config(root: impl Into<PathBuf>, config: &AppConfig) -> Result<Self> {
        let prefixes = config.prefixes();
        prefixes.validate()?;
        Ok(Self {
            root: root.into(),
            prefixes,
            extensions: config.normalized_extensions(),
            timezone: config.target_zone()?,
            mtime_mode: config.mtime_mode,
        })
    }
}

/// One file's rename, decided but not yet performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    pub device: DeviceKind,
    pub device_source: DeviceSource,
    pub timestamp: DateTime<FixedOffset>,
    pub timestamp_source: TimestampSource,
    pub stamp: String,
    /// Target file name before any collision suffix.
    pub base_name: String,
    pub target_path: PathBuf,
    pub changed: bool,
}

impl RenameCandidate {
    pub fn original_name(&self) -> String {
        file_name_of(&self.original_path)
    }

    pub fn target_name(&self) -> String {
        file_name_of(&self.target_path)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyCanonical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub media_files: usize,
    pub skipped_unsupported: usize,
    pub already_canonical: usize,
    pub planned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub timezone: String,
    pub candidates: Vec<RenameCandidate>,
    pub skipped: Vec<SkippedFile>,
    pub stats: RenameStats,
}

pub fn generate_plan(options: &PlanOptions, tools: &MetadataTools) -> Result<RenamePlan> {
    if !options.root.exists() {
        bail!("directory does not exist: {}", options.root.display());
    }
    if !options.root.is_dir() {
        bail!("not a directory: {}", options.root.display());
    }

    let canonical = CanonicalPattern::new(options.prefixes.labels(), &options.extensions)?;
    let mut stats = RenameStats::default();
    let files = collect_media_files(&options.root, &options.extensions, &mut stats)?;

    let mut candidates = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    let mut registry = TargetRegistry::new();

    for path in files {
        if canonical.matches(&file_name_of(&path)) {
            debug!("already renamed: {}", path.display());
            stats.already_canonical += 1;
            skipped.push(SkippedFile {
                path,
                reason: SkipReason::AlreadyCanonical,
            });
            continue;
        }

        let candidate = plan_file(&path, options, tools, &mut registry)?;
        if !candidate.changed {
            stats.unchanged += 1;
        }
        stats.planned += 1;
        candidates.push(candidate);
    }

    Ok(RenamePlan {
        root: options.root.clone(),
        timezone: options.timezone.name().to_string(),
        candidates,
        skipped,
        stats,
    })
}

fn plan_file(
    path: &Path,
    options: &PlanOptions,
    tools: &MetadataTools,
    registry: &mut TargetRegistry,
) -> Result<RenameCandidate> {
    let (device, device_source) = classify_device(path, tools.reader.as_ref());
    let (timestamp, timestamp_source) = resolve_timestamp(
        path,
        tools.prober.as_ref(),
        options.timezone,
        options.mtime_mode,
    );

    let stamp = format_stamp(&timestamp);
    let stem = build_stem(&stamp, options.prefixes.label(device));
    let extension = path
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    let target_path = registry
        .resolve(path, &stem, &extension)
        .with_context(|| format!("could not resolve target for {}", path.display()))?;
    let changed = target_path != path;

    Ok(RenameCandidate {
        original_path: path.to_path_buf(),
        device,
        device_source,
        timestamp: timestamp.fixed_offset(),
        timestamp_source,
        base_name: build_file_name(&stem, &extension),
        stamp,
        target_path,
        changed,
    })
}

/// Regular files directly under `root` with a supported extension, sorted by name.
pub fn collect_media_files(
    root: &Path,
    extensions: &[String],
    stats: &mut RenameStats,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("could not list {}", root.display()))?;
        if !entry.path().is_file() {
            continue;
        }
        stats.scanned_files += 1;

        if has_supported_extension(entry.path(), extensions) {
            stats.media_files += 1;
            out.push(entry.into_path());
        } else {
            stats.skipped_unsupported += 1;
        }
    }

    Ok(out)
}

fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default()
}
