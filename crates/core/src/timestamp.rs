use crate::probe::{MetadataMap, MetadataTool, STREAM_KEY_PREFIX};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const CREATION_TIME_KEY: &str = "creation_time";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimestampSource {
    Metadata,
    FileModified,
}

/// How a file's modification time is turned into a wall-clock time in the target zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MtimeMode {
    /// The mtime is an absolute instant and is converted into the target zone.
    #[default]
    Instant,
    /// The machine-local wall time of the mtime is kept as-is.
    LocalWallClock,
}

pub fn resolve_timestamp(
    path: &Path,
    prober: &dyn MetadataTool,
    tz: Tz,
    mode: MtimeMode,
) -> (DateTime<Tz>, TimestampSource) {
    match prober.read(path) {
        Ok(map) => {
            if let Some(utc) = creation_time_from_metadata(&map) {
                return (to_zone(utc, tz), TimestampSource::Metadata);
            }
            debug!("no usable creation_time: {}", path.display());
        }
        Err(err) => {
            debug!("media prober failed for {}: {err}", path.display());
        }
    }

    let modified = file_modified(path).unwrap_or_else(|| {
        warn!(
            "modification time unavailable, using current time: {}",
            path.display()
        );
        SystemTime::now()
    });
    (
        system_time_in_zone(modified, tz, mode),
        TimestampSource::FileModified,
    )
}

/// First parseable `creation_time`, container tag before stream tags in stream order.
pub fn creation_time_from_metadata(map: &MetadataMap) -> Option<DateTime<Utc>> {
    let mut stream_values: Vec<(usize, &str)> = map
        .iter()
        .filter_map(|(key, value)| {
            let rest = key.strip_prefix(STREAM_KEY_PREFIX)?;
            let (index, tag) = rest.split_once('.')?;
            if tag != CREATION_TIME_KEY {
                return None;
            }
            Some((index.parse().ok()?, value.as_str()))
        })
        .collect();
    stream_values.sort_by_key(|(index, _)| *index);

    map.get(CREATION_TIME_KEY)
        .map(String::as_str)
        .into_iter()
        .chain(stream_values.into_iter().map(|(_, value)| value))
        .find_map(parse_creation_time)
}

/// Values without an offset are taken as UTC.
pub fn parse_creation_time(input: &str) -> Option<DateTime<Utc>> {
    let normalized = input.trim().replacen(' ', "T", 1);
    if normalized.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = normalized
        .strip_suffix(['Z', 'z'])
        .unwrap_or(normalized.as_str());
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }

    None
}

pub fn to_zone(utc: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    utc.with_timezone(&tz)
}

pub fn format_stamp(dt: &DateTime<Tz>) -> String {
    dt.format(STAMP_FORMAT).to_string()
}

pub fn system_time_in_zone(time: SystemTime, tz: Tz, mode: MtimeMode) -> DateTime<Tz> {
    let utc = system_time_to_utc(time).unwrap_or_else(|| {
        warn!("modification time out of range, using current time: {time:?}");
        Utc::now()
    });
    match mode {
        MtimeMode::Instant => to_zone(utc, tz),
        MtimeMode::LocalWallClock => {
            let local_wall = utc.with_timezone(&Local).naive_local();
            wall_clock_or_instant(&local_wall, utc, tz)
        }
    }
}

/// `None` when the time lies outside what chrono can represent.
fn system_time_to_utc(time: SystemTime) -> Option<DateTime<Utc>> {
    let (secs, nanos) = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (i64::try_from(after.as_secs()).ok()?, after.subsec_nanos()),
        Err(err) => {
            let before = err.duration();
            let secs = i64::try_from(before.as_secs()).ok()?;
            match before.subsec_nanos() {
                0 => (-secs, 0),
                n => (-secs - 1, 1_000_000_000 - n),
            }
        }
    };
    DateTime::from_timestamp(secs, nanos)
}

/// Wall time labelled with `tz`, or the instant converted into `tz` when the wall time
/// falls in a DST gap.
fn wall_clock_or_instant(naive: &NaiveDateTime, utc: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    wall_clock_in_zone(naive, tz).unwrap_or_else(|| {
        debug!("{naive} does not exist in {}, converting the instant instead", tz.name());
        to_zone(utc, tz)
    })
}

/// Labels a naive wall time with `tz`. `None` inside a DST gap.
pub fn wall_clock_in_zone(naive: &NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(naive).earliest()
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}
