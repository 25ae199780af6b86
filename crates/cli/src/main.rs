use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{debug, info};
use media_renamer_core::{
    apply_plan, generate_plan, load_config, load_config_from, AppConfig, ApplyResult,
    MetadataTools, MtimeMode, PlanOptions, RenamePlan,
};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "media-renamer")]
#[command(
    about = "Rename videos (.mov, .mp4) and images (.heic, .jpg, .jpeg) to YYYYMMDD-HHMMSS-device.ext from their metadata timestamp"
)]
struct Cli {
    /// Directory containing the videos and images
    folder: PathBuf,
    /// Show what would happen without renaming
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Label for iPhone files (config default: iphone)
    #[arg(long)]
    iphone_prefix: Option<String>,
    /// Label for Android files (config default: android)
    #[arg(long)]
    android_prefix: Option<String>,
    /// Label for files whose device cannot be determined (config default: unknown)
    #[arg(long)]
    unknown_label: Option<String>,
    /// IANA zone the names are written in (config default: America/Los_Angeles)
    #[arg(long)]
    timezone: Option<String>,
    /// Use the machine-local wall time of the modification time as-is
    #[arg(long, default_value_t = false)]
    mtime_as_local: bool,
    /// Config file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    dry_run: bool,
    plan: &'a RenamePlan,
    result: Option<&'a ApplyResult>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    cmd_rename(cli)
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(prefix) = &cli.iphone_prefix {
        config.iphone_prefix = prefix.clone();
    }
    if let Some(prefix) = &cli.android_prefix {
        config.android_prefix = prefix.clone();
    }
    if let Some(label) = &cli.unknown_label {
        config.unknown_label = label.clone();
    }
    if let Some(timezone) = &cli.timezone {
        config.timezone = timezone.clone();
    }
    if cli.mtime_as_local {
        config.mtime_mode = MtimeMode::LocalWallClock;
    }

    Ok(config)
}

fn cmd_rename(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let folder = std::path::absolute(&cli.folder).unwrap_or_else(|_| cli.folder.clone());
    debug!("effective config: {config:?}");
    info!("processing {}", folder.display());
    let options = PlanOptions::from_config(folder, &config)?;
    let tools = MetadataTools::from_config(&config);

    let plan = generate_plan(&options, &tools)?;

    let result = if cli.dry_run {
        None
    } else {
        Some(apply_plan(&plan)?)
    };

    match cli.output {
        OutputFormat::Json => {
            let report = JsonReport {
                dry_run: cli.dry_run,
                plan: &plan,
                result: result.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => match &result {
            None => print_dry_run(&plan),
            Some(result) => print_applied(&plan, result),
        },
    }

    match &result {
        Some(result) => ensure_all_renamed(result),
        None => Ok(()),
    }
}

fn ensure_all_renamed(result: &ApplyResult) -> Result<()> {
    if result.failed > 0 {
        bail!(
            "{} of {} file(s) could not be renamed",
            result.failed,
            result.applied + result.failed
        );
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReportLine {
    Out(String),
    Err(String),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Per-file lines in processing order (sorted by file name), skips included.
fn report_lines(plan: &RenamePlan, result: Option<&ApplyResult>) -> Vec<ReportLine> {
    let mut keyed: Vec<(OsString, ReportLine)> = Vec::new();

    for skipped in &plan.skipped {
        keyed.push((
            skipped.path.file_name().unwrap_or_default().to_os_string(),
            ReportLine::Out(format!(
                "Skip (already renamed): {}",
                file_name(&skipped.path)
            )),
        ));
    }

    for candidate in &plan.candidates {
        let line = if !candidate.changed {
            Some(ReportLine::Out(format!(
                "Skip (already named): {}",
                candidate.original_name()
            )))
        } else {
            match result {
                None => Some(ReportLine::Out(format!(
                    "[DRY] {} -> {} ({:?}, {:?})",
                    candidate.original_name(),
                    candidate.target_name(),
                    candidate.device_source,
                    candidate.timestamp_source
                ))),
                Some(result) => outcome_line(result, &candidate.original_path),
            }
        };
        if let Some(line) = line {
            keyed.push((
                candidate
                    .original_path
                    .file_name()
                    .unwrap_or_default()
                    .to_os_string(),
                line,
            ));
        }
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, line)| line).collect()
}

fn outcome_line(result: &ApplyResult, original: &Path) -> Option<ReportLine> {
    if let Some(op) = result.renamed.iter().find(|op| op.from.as_path() == original) {
        return Some(ReportLine::Out(format!(
            "{} -> {}",
            file_name(&op.from),
            file_name(&op.to)
        )));
    }
    result
        .failures
        .iter()
        .find(|failure| failure.from.as_path() == original)
        .map(|failure| ReportLine::Err(format!("Failed: {}", failure.error)))
}

fn print_lines(lines: Vec<ReportLine>) {
    for line in lines {
        match line {
            ReportLine::Out(text) => println!("{text}"),
            ReportLine::Err(text) => eprintln!("{text}"),
        }
    }
}

fn print_dry_run(plan: &RenamePlan) {
    print_lines(report_lines(plan, None));

    println!(
        "\nDry run complete. Candidates processed: {}.",
        plan.stats.planned + plan.stats.already_canonical
    );
}

fn print_applied(plan: &RenamePlan, result: &ApplyResult) {
    print_lines(report_lines(plan, Some(result)));

    let skipped = plan.stats.already_canonical + result.unchanged;
    if result.failed > 0 {
        println!(
            "\nDone. Renamed: {}, Skipped: {}, Failed: {}.",
            result.applied, skipped, result.failed
        );
    } else {
        println!("\nDone. Renamed: {}, Skipped: {}.", result.applied, skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_all_renamed, report_lines, ReportLine};
    use media_renamer_core::{
        apply_plan, generate_plan, AppConfig, ApplyFailure, ApplyResult, MetadataMap,
        MetadataTool, MetadataTools, PlanOptions, ProbeError, RenameOperation, RenamePlan,
    };
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    struct Missing;

    impl MetadataTool for Missing {
        fn read(&self, _path: &Path) -> Result<MetadataMap, ProbeError> {
            Err(ProbeError::Spawn {
                tool: "missing".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
            })
        }
    }

    fn plan_for(dir: &Path) -> RenamePlan {
        let options =
            PlanOptions::from_config(dir, &AppConfig::default()).expect("default config is valid");
        generate_plan(&options, &MetadataTools::new(Missing, Missing)).expect("plan")
    }

    fn texts(lines: &[ReportLine]) -> Vec<&str> {
        lines
            .iter()
            .map(|line| match line {
                ReportLine::Out(text) | ReportLine::Err(text) => text.as_str(),
            })
            .collect()
    }

    #[test]
    fn skips_and_renames_are_listed_in_file_name_order() {
        let temp = tempdir().expect("tempdir");
        for name in ["IMG_1.MOV", "20240101-000000-iphone.mov", "0001.mov"] {
            fs::write(temp.path().join(name), b"x").expect("write");
        }
        let plan = plan_for(temp.path());

        let dry = report_lines(&plan, None);
        let dry = texts(&dry);
        assert_eq!(dry.len(), 3);
        assert!(dry[0].starts_with("[DRY] 0001.mov -> "));
        assert_eq!(dry[1], "Skip (already renamed): 20240101-000000-iphone.mov");
        assert!(dry[2].starts_with("[DRY] IMG_1.MOV -> "));

        let result = apply_plan(&plan).expect("apply");
        let applied = report_lines(&plan, Some(&result));
        let applied = texts(&applied);
        assert!(applied[0].starts_with("0001.mov -> "));
        assert_eq!(applied[1], "Skip (already renamed): 20240101-000000-iphone.mov");
        assert!(applied[2].starts_with("IMG_1.MOV -> "));
    }

    #[test]
    fn failed_rename_is_reported_in_place() {
        let temp = tempdir().expect("tempdir");
        for name in ["a.mov", "b.mov"] {
            fs::write(temp.path().join(name), b"x").expect("write");
        }
        let plan = plan_for(temp.path());
        let a = plan.candidates[0].clone();
        let b = plan.candidates[1].clone();
        let result = ApplyResult {
            applied: 1,
            failed: 1,
            renamed: vec![RenameOperation {
                from: b.original_path.clone(),
                to: b.target_path.clone(),
            }],
            failures: vec![ApplyFailure {
                from: a.original_path.clone(),
                to: a.target_path.clone(),
                error: "rename failed: a.mov".to_string(),
            }],
            ..ApplyResult::default()
        };

        let lines = report_lines(&plan, Some(&result));
        assert_eq!(
            lines[0],
            ReportLine::Err("Failed: rename failed: a.mov".to_string())
        );
        assert_eq!(
            lines[1],
            ReportLine::Out(format!("b.mov -> {}", b.target_name()))
        );
    }

    #[test]
    fn partial_failure_makes_the_run_fail() {
        assert!(ensure_all_renamed(&ApplyResult::default()).is_ok());

        let result = ApplyResult {
            applied: 2,
            failed: 1,
            failures: vec![ApplyFailure {
                from: PathBuf::from("IMG_1.MOV"),
                to: PathBuf::from("20240820-143022-iphone.mov"),
                error: "rename failed".to_string(),
            }],
            ..ApplyResult::default()
        };
        let err = ensure_all_renamed(&result).expect_err("failures must surface");
        assert!(err.to_string().contains("1 of 3"));
    }
}
