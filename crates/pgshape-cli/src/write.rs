//! Syncing generated modules to disk.
//!
//! The generator is rerun against live databases, so writing is
//! content-aware: a file whose on-disk text already matches the freshly
//! generated text is never touched (keeps mtimes stable for incremental
//! builds), and replacement goes through a staging sibling plus rename so a
//! crash never leaves a half-written module behind.

use crate::codegen::GeneratedFile;
use std::path::{Path, PathBuf};

/// What `sync_generated` does with stale files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace stale files on disk.
    Write,
    /// Only report which files would change.
    DryRun,
    /// Fail if any file would change (for CI).
    Check,
}

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files whose on-disk content differed from the generated content
    /// (or did not exist), in path order.
    pub stale: Vec<PathBuf>,
    /// The subset of stale files actually replaced (`WriteMode::Write`).
    pub written: Vec<PathBuf>,
    /// Count of files already matching their generated content.
    pub up_to_date: usize,
}

pub fn sync_generated(files: &[GeneratedFile], mode: WriteMode) -> anyhow::Result<WriteReport> {
    let mut ordered: Vec<&GeneratedFile> = files.iter().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let mut report = WriteReport::default();
    for file in ordered {
        if is_current(file) {
            report.up_to_date += 1;
            continue;
        }
        report.stale.push(file.path.clone());

        match mode {
            WriteMode::Check => {}
            WriteMode::DryRun => println!("would write {}", file.path.display()),
            WriteMode::Write => {
                replace_file(&file.path, &file.content)?;
                report.written.push(file.path.clone());
                println!("wrote {}", file.path.display());
            }
        }
    }

    if mode == WriteMode::Check && !report.stale.is_empty() {
        anyhow::bail!(
            "generated files are out of date: {}",
            report
                .stale
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(report)
}

fn is_current(file: &GeneratedFile) -> bool {
    std::fs::read_to_string(&file.path).is_ok_and(|existing| existing == file.content)
}

fn replace_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
        })?;
    }

    let staging = staging_path(path)?;
    std::fs::write(&staging, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", staging.display()))?;
    std::fs::rename(&staging, path).map_err(|e| {
        anyhow::anyhow!(
            "failed to rename {} -> {}: {e}",
            staging.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// The dot-prefixed sibling a file is staged through before the rename.
fn staging_path(path: &Path) -> anyhow::Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid output path: {}", path.display()))?;
    Ok(path.with_file_name(format!(".{name}.pgshape-tmp")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pgshape-write-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn generated(dir: &Path, name: &str, content: &str) -> GeneratedFile {
        GeneratedFile {
            path: dir.join(name),
            content: content.to_string(),
        }
    }

    #[test]
    fn write_mode_replaces_then_settles() {
        let dir = scratch_dir("write");
        let files = vec![generated(&dir, "public.rs", "pub mod users {}\n")];

        let first = sync_generated(&files, WriteMode::Write).unwrap();
        assert_eq!(first.written, vec![dir.join("public.rs")]);
        assert_eq!(
            std::fs::read_to_string(dir.join("public.rs")).unwrap(),
            "pub mod users {}\n"
        );

        let second = sync_generated(&files, WriteMode::Write).unwrap();
        assert!(second.stale.is_empty());
        assert_eq!(second.up_to_date, 1);
    }

    #[test]
    fn dry_run_reports_without_touching_disk() {
        let dir = scratch_dir("dry-run");
        let files = vec![generated(&dir, "public.rs", "x")];

        let report = sync_generated(&files, WriteMode::DryRun).unwrap();
        assert_eq!(report.stale.len(), 1);
        assert!(report.written.is_empty());
        assert!(!dir.join("public.rs").exists());
    }

    #[test]
    fn check_mode_fails_only_when_stale() {
        let dir = scratch_dir("check");
        let files = vec![generated(&dir, "public.rs", "y")];

        let err = sync_generated(&files, WriteMode::Check).unwrap_err();
        assert!(err.to_string().contains("out of date"));
        assert!(err.to_string().contains("public.rs"));

        sync_generated(&files, WriteMode::Write).unwrap();
        let report = sync_generated(&files, WriteMode::Check).unwrap();
        assert_eq!(report.up_to_date, 1);
    }

    #[test]
    fn staging_sibling_is_hidden_and_adjacent() {
        let staged = staging_path(Path::new("out/public.rs")).unwrap();
        assert_eq!(staged, Path::new("out/.public.rs.pgshape-tmp"));
    }
}
