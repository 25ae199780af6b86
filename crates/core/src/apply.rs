use crate::naming::TargetRegistry;
use crate::planner::{RenameCandidate, RenamePlan};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameOperation {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub from: PathBuf,
    pub to: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub renamed: Vec<RenameOperation>,
    pub failures: Vec<ApplyFailure>,
}

/// Renames every changed candidate in plan order. Each rename is committed on its own;
/// a failed file is recorded and the batch moves on.
///
/// A planned target that exists by the time its rename runs is never overwritten: the
/// next free `-N` suffix is taken instead, skipping targets still planned for later files.
pub fn apply_plan(plan: &RenamePlan) -> Result<ApplyResult> {
    let mut result = ApplyResult::default();
    let mut registry = TargetRegistry::new();
    for candidate in &plan.candidates {
        registry.reserve(candidate.target_path.clone());
    }

    for candidate in &plan.candidates {
        if !candidate.changed {
            result.unchanged += 1;
            continue;
        }

        match rename_candidate(candidate, &mut registry) {
            Ok(target) => {
                info!(
                    "renamed {} -> {}",
                    candidate.original_path.display(),
                    target.display()
                );
                result.applied += 1;
                result.renamed.push(RenameOperation {
                    from: candidate.original_path.clone(),
                    to: target,
                });
            }
            Err(err) => {
                warn!("{err:#}");
                result.failed += 1;
                result.failures.push(ApplyFailure {
                    from: candidate.original_path.clone(),
                    to: candidate.target_path.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    Ok(result)
}

fn rename_candidate(candidate: &RenameCandidate, registry: &mut TargetRegistry) -> Result<PathBuf> {
    let target = if candidate.target_path.exists() {
        let adjusted = retarget(candidate, registry)?;
        warn!(
            "{} appeared after planning, renaming {} to {} instead",
            candidate.target_path.display(),
            candidate.original_path.display(),
            adjusted.display()
        );
        adjusted
    } else {
        candidate.target_path.clone()
    };

    fs::rename(&candidate.original_path, &target).with_context(|| {
        format!(
            "rename failed: {} -> {}",
            candidate.original_path.display(),
            target.display()
        )
    })?;
    Ok(target)
}

fn retarget(candidate: &RenameCandidate, registry: &mut TargetRegistry) -> Result<PathBuf> {
    let base = Path::new(&candidate.base_name);
    let stem = base
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = base
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    registry
        .resolve(&candidate.original_path, &stem, &extension)
        .with_context(|| {
            format!(
                "could not find a free target for {}",
                candidate.original_path.display()
            )
        })
}
