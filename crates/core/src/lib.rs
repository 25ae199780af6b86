mod apply;
mod config;
mod device;
mod naming;
mod planner;
mod probe;
mod timestamp;

pub use apply::{apply_plan, ApplyFailure, ApplyResult, RenameOperation};
pub use config::{app_paths, load_config, load_config_from, AppConfig, AppPaths, DEFAULT_EXTENSIONS};
pub use device::{
    classify_device, device_from_extension, device_from_metadata, DeviceKind, DevicePrefixes,
    DeviceSource,
};
pub use naming::{build_file_name, build_stem, CanonicalPattern, TargetRegistry};
pub use planner::{
    collect_media_files, generate_plan, PlanOptions, RenameCandidate, RenamePlan, RenameStats,
    SkipReason, SkippedFile,
};
pub use probe::{ExifTool, FfProbe, MetadataMap, MetadataTool, MetadataTools, ProbeError};
pub use timestamp::{
    format_stamp, parse_creation_time, resolve_timestamp, to_zone, MtimeMode, TimestampSource,
    DEFAULT_TIMEZONE,
};
