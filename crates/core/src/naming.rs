use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// `<stamp>-<label>`, the part of the name before any collision suffix.
pub fn build_stem(stamp: &str, label: &str) -> String {
    format!("{stamp}-{label}")
}

pub fn build_file_name(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        return stem.to_string();
    }
    format!("{}.{}", stem, extension.to_lowercase())
}

/// Matches names already in `YYYYMMDD-HHMMSS-<label>[-N].<ext>` form.
#[derive(Debug, Clone)]
pub struct CanonicalPattern {
    regex: Regex,
}

impl CanonicalPattern {
    pub fn new<L, E>(labels: L, extensions: E) -> Result<Self>
    where
        L: IntoIterator,
        L::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let labels = alternation(labels);
        let extensions = alternation(extensions);
        let pattern = format!(r"^\d{{8}}-\d{{6}}-(?:{labels})(?:-\d+)?\.(?:{extensions})$");
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid canonical name pattern: {pattern}"))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }
}

fn alternation<I>(values: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut escaped: Vec<String> = values
        .into_iter()
        .map(|v| regex::escape(v.as_ref()))
        .collect();
    escaped.sort();
    escaped.dedup();
    escaped.join("|")
}

/// Target paths claimed so far in this run.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    claimed: HashSet<PathBuf>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// First free path among `stem.ext`, `stem-1.ext`, `stem-2.ext`, ... next to
    /// `original_path`. The returned path is claimed.
    pub fn resolve(&mut self, original_path: &Path, stem: &str, extension: &str) -> Result<PathBuf> {
        let parent = original_path
            .parent()
            .context("could not determine parent directory")?;

        let mut candidate = parent.join(build_file_name(stem, extension));
        let mut n = 1usize;
        while !self.is_available(&candidate, original_path) {
            candidate = parent.join(build_file_name(&format!("{stem}-{n}"), extension));
            n += 1;
        }

        self.claimed.insert(candidate.clone());
        Ok(candidate)
    }

    /// Marks `path` as taken without searching, e.g. a target some other file is
    /// already planned to move to.
    pub fn reserve(&mut self, path: impl Into<PathBuf>) {
        self.claimed.insert(path.into());
    }

    fn is_available(&self, candidate: &Path, original_path: &Path) -> bool {
        if self.claimed.contains(candidate) {
            return false;
        }
        if candidate == original_path {
            return true;
        }
        !candidate.exists()
    }
}
