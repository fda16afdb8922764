//! buildgate-indent - leading-whitespace normalization
//!
//! Converts leading 4-space indentation groups into tab characters across a
//! source tree. The transform itself is a pure function over file content;
//! planning produces [`IndentEdit`] records and writing is a separate,
//! explicit step, so the interesting part is testable without touching the
//! filesystem.
//!
//! The transform is idempotent: once converted, no 4-space-aligned leading
//! run remains for a second pass to match.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

/// Maximal leading run of exactly-4-space groups, per line.
const LEADING_GROUPS: &str = r"(?m)^( {4})+";

/// A planned edit for one file. Produced transiently, discarded after the
/// write; nothing is persisted beyond the file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentEdit {
    pub path: PathBuf,
    pub original: String,
    pub transformed: String,
}

impl IndentEdit {
    /// Write the transformed content back to the file.
    pub fn apply(&self) -> Result<()> {
        std::fs::write(&self.path, &self.transformed)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Counters for one normalization batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    /// Files matched by the extension filter.
    pub scanned: usize,

    /// Files rewritten.
    pub changed: usize,

    /// Files already normalized; not written, so their modification
    /// timestamps are untouched.
    pub unchanged: usize,

    /// Files that could not be read or written. Never aborts the batch.
    pub failed: usize,
}

/// Space-indentation-to-tabs normalizer.
pub struct IndentationNormalizer {
    leading_groups: Regex,
}

impl Default for IndentationNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IndentationNormalizer {
    pub fn new() -> Self {
        Self {
            // Pattern is a compile-time constant.
            leading_groups: Regex::new(LEADING_GROUPS).expect("valid leading-groups pattern"),
        }
    }

    /// Pure transform: one tab per leading 4-space group.
    ///
    /// Partial (non-multiple-of-4) leading runs and non-leading whitespace
    /// are left untouched. Borrows the input unchanged when nothing matches.
    pub fn normalize<'a>(&self, content: &'a str) -> Cow<'a, str> {
        self.leading_groups
            .replace_all(content, |caps: &Captures<'_>| {
                "\t".repeat(caps[0].len() / 4)
            })
    }

    /// Read one file and plan its edit. Returns `None` when the content is
    /// already normalized.
    pub fn plan_file(&self, path: &Path) -> Result<Option<IndentEdit>> {
        let original = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match self.normalize(&original) {
            Cow::Borrowed(_) => Ok(None),
            Cow::Owned(transformed) => Ok(Some(IndentEdit {
                path: path.to_path_buf(),
                original,
                transformed,
            })),
        }
    }

    /// Normalize every file under `root` whose extension is in
    /// `extensions`.
    ///
    /// Writes only files whose content actually changed. Per-file read or
    /// write errors are logged and counted; they do not abort the batch.
    pub fn run(&self, root: &Path, extensions: &[&str]) -> Result<NormalizeSummary> {
        let files = collect_files(root, extensions)?;
        let mut summary = NormalizeSummary {
            scanned: files.len(),
            ..Default::default()
        };

        for path in files {
            match self.plan_file(&path) {
                Ok(None) => {
                    debug!(file = %path.display(), "already normalized");
                    summary.unchanged += 1;
                }
                Ok(Some(edit)) => match edit.apply() {
                    Ok(()) => {
                        info!(file = %path.display(), "fixed indentation");
                        summary.changed += 1;
                    }
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "write failed");
                        summary.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "read failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Recursively collect files under `dir` matching the extension filter.
/// An empty filter matches every file. Paths come back sorted so batches
/// are deterministic.
pub fn collect_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(dir, extensions, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, extensions: &[&str], files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extensions, files)?;
        } else if extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.contains(&e))
                .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(content: &str) -> String {
        IndentationNormalizer::new().normalize(content).into_owned()
    }

    #[test]
    fn test_one_group_becomes_one_tab() {
        assert_eq!(normalize("    x"), "\tx");
    }

    #[test]
    fn test_two_groups_become_two_tabs() {
        assert_eq!(normalize("        x"), "\t\tx");
    }

    #[test]
    fn test_partial_group_is_untouched() {
        assert_eq!(normalize("   x"), "   x");
    }

    #[test]
    fn test_trailing_partial_group_survives() {
        // 6 spaces = one full group + 2 leftover spaces.
        assert_eq!(normalize("      x"), "\t  x");
    }

    #[test]
    fn test_non_leading_whitespace_is_untouched() {
        assert_eq!(normalize("x    y"), "x    y");
        assert_eq!(normalize("    x    y"), "\tx    y");
    }

    #[test]
    fn test_every_line_is_normalized() {
        let input = "class A {\n    void m() {\n        body();\n    }\n}\n";
        let expected = "class A {\n\tvoid m() {\n\t\tbody();\n\t}\n}\n";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_idempotent() {
        let once = normalize("        x\n    y\n   z\n");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_already_normalized_borrows_input() {
        let normalizer = IndentationNormalizer::new();
        let content = "\tx\n\t\ty\n";
        assert!(matches!(
            normalizer.normalize(content),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(normalize(""), "");
    }
}
