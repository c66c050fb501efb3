use std::path::{Path, PathBuf};

use image::ImageFormat;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::error_chain;
use crate::mapper::ClassificationResult;
use crate::taxonomy::Locale;
use crate::Classifier;

/// Per-file outcome of a batch run. Exactly one of `result`/`error` is set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub const fn is_rejected(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub classified: usize,
    pub rejected: usize,
    pub degraded: usize,
    pub low_confidence: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        outcomes.iter().fold(
            Self {
                total: outcomes.len(),
                ..Self::default()
            },
            |mut summary, outcome| {
                match &outcome.result {
                    Some(result) => {
                        summary.classified += 1;
                        summary.degraded += usize::from(result.is_degraded());
                        summary.low_confidence += usize::from(result.low_confidence);
                    }
                    None => summary.rejected += 1,
                }
                summary
            },
        )
    }
}

/// Expands the given inputs into a sorted list of files.
///
/// Directories are walked and filtered to known image extensions. Files named
/// explicitly are kept as-is so that unsupported ones are reported rather than
/// skipped.
pub fn collect_image_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| ImageFormat::from_path(e.path()).is_ok())
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    debug!(count = files.len(), "collected input files");
    files
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
    ) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

fn classify_one(classifier: &Classifier, path: &Path, locale: Locale) -> FileOutcome {
    match classifier.classify_path(path, locale) {
        Ok(result) => FileOutcome {
            path: path.to_path_buf(),
            result: Some(result),
            error: None,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "image rejected");
            FileOutcome {
                path: path.to_path_buf(),
                result: None,
                error: Some(error_chain(&e)),
            }
        }
    }
}

/// Classifies every file on the current rayon pool, preserving input order.
pub fn classify_files(
    classifier: &Classifier,
    paths: &[PathBuf],
    locale: Locale,
    show_progress: bool,
) -> Vec<FileOutcome> {
    let bar = progress_bar(paths.len(), show_progress);
    let outcomes: Vec<_> = paths
        .par_iter()
        .progress_with(bar.clone())
        .map(|path| classify_one(classifier, path, locale))
        .collect();
    bar.finish();
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_walks_directories() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("b.png"), b"")?;
        fs::write(dir.path().join("nested").join("a.jpg"), b"")?;
        fs::write(dir.path().join("notes.txt"), b"")?;

        let explicit = dir.path().join("notes.txt");
        let files = collect_image_files(&[dir.path().to_path_buf(), explicit.clone()]);

        assert_eq!(files.len(), 3);
        assert!(files.contains(&explicit));
        assert!(files.iter().any(|p| p.ends_with("nested/a.jpg")));
        Ok(())
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![
            FileOutcome {
                path: "a.png".into(),
                result: Some(crate::mapper::fallback_result(Locale::En)),
                error: None,
            },
            FileOutcome {
                path: "b.txt".into(),
                result: None,
                error: Some("unsupported".to_string()),
            },
        ];
        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.classified, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.degraded, 1);
        assert!(outcomes[1].is_rejected());
    }
}
