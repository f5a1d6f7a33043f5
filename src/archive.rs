//! # archive: keep displaced files, drop old generations
//!
//! Every cycle opens a fresh *archive generation*, a directory named after the
//! cycle's start time with one subdirectory per invoice kind. Before the
//! synchroniser writes an XML or PDF over an existing file, the existing file
//! is moved into the current generation, so nothing is ever silently
//! overwritten. At the end of the cycle only the newest generations are kept.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::contract::InvoiceKind;
use crate::error::SyncError;

/// Directory name format of a generation (local start time of the cycle).
pub const GENERATION_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One cycle's archive directory.
#[derive(Debug, Clone)]
pub struct ArchiveGeneration {
    root: PathBuf,
}

impl ArchiveGeneration {
    /// Creates `<archive_root>/<timestamp>/{sales,purchase}`. Existing
    /// directories are reused.
    pub fn create(archive_root: &Path, started_at: NaiveDateTime) -> Result<Self, SyncError> {
        let root = archive_root.join(started_at.format(GENERATION_FORMAT).to_string());
        let generation = Self { root };
        for kind in InvoiceKind::ALL {
            let dir = generation.dir_for(kind);
            fs::create_dir_all(&dir).map_err(SyncError::io("create directory", &dir))?;
        }
        info!(path = %generation.root.display(), "[ARCHIVE] Opened archive generation");
        Ok(generation)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, kind: InvoiceKind) -> PathBuf {
        self.root.join(kind.label())
    }
}

/// Moves `path` into `archive_dir` if it exists.
///
/// The file keeps its name; when that name is already taken in the archive a
/// `(n)` counter is inserted before the extension. Returns the archived
/// location, or `None` when there was nothing to move.
pub fn archive_existing_file(path: &Path, archive_dir: &Path) -> Result<Option<PathBuf>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }
    let Some(file_name) = path.file_name() else {
        return Ok(None);
    };

    let target = free_archive_path(archive_dir, Path::new(file_name));
    move_file(path, &target).map_err(SyncError::io("archive", path))?;
    info!(
        from = %path.display(),
        to = %target.display(),
        "[ARCHIVE] Archived file"
    );
    Ok(Some(target))
}

fn free_archive_path(archive_dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = archive_dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = archive_dir.join(format!("{stem}({counter}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Outcome of a pruning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: usize,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Deletes all but the `max_generations` most recently modified generations.
///
/// A folder that cannot be deleted is logged and skipped. Failing to list the
/// archive root at all is an error.
pub fn clean_old_archives(archive_root: &Path, max_generations: usize) -> Result<PruneReport, SyncError> {
    let entries = fs::read_dir(archive_root).map_err(SyncError::io("list", archive_root))?;

    let mut generations: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(SyncError::io("list", archive_root))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(SyncError::io("read modification time of", &path))?;
        generations.push((path, modified));
    }

    generations.sort_by(|a, b| b.1.cmp(&a.1));

    let mut report = PruneReport {
        kept: generations.len().min(max_generations),
        ..PruneReport::default()
    };
    for (path, _) in generations.into_iter().skip(max_generations) {
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(path = %path.display(), "[ARCHIVE] Removed old archive folder");
                report.removed.push(path);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "[ARCHIVE][ERROR] Failed to remove archive folder");
                report.failed.push(path);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn generation_has_kind_subdirectories() {
        let tmp = tempdir().unwrap();
        let started = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        let generation = ArchiveGeneration::create(tmp.path(), started).unwrap();

        assert_eq!(generation.path(), tmp.path().join("2024-03-09_07-05-01"));
        assert!(generation.dir_for(InvoiceKind::Sales).is_dir());
        assert!(generation.dir_for(InvoiceKind::Purchase).is_dir());
    }

    #[test]
    fn archiving_missing_file_is_noop() {
        let tmp = tempdir().unwrap();
        let archived = archive_existing_file(&tmp.path().join("ghost.pdf"), tmp.path()).unwrap();
        assert_eq!(archived, None);
    }

    #[test]
    fn name_clashes_get_counters() {
        let tmp = tempdir().unwrap();
        let live = tmp.path().join("live");
        let archive = tmp.path().join("archive");
        fs::create_dir_all(&live).unwrap();
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join("invoice.pdf"), "old").unwrap();

        let source = live.join("invoice.pdf");
        fs::write(&source, "first").unwrap();
        let first = archive_existing_file(&source, &archive).unwrap();
        assert_eq!(first, Some(archive.join("invoice(1).pdf")));
        assert!(!source.exists());

        fs::write(&source, "second").unwrap();
        let second = archive_existing_file(&source, &archive).unwrap();
        assert_eq!(second, Some(archive.join("invoice(2).pdf")));

        assert_eq!(fs::read_to_string(archive.join("invoice.pdf")).unwrap(), "old");
        assert_eq!(fs::read_to_string(archive.join("invoice(1).pdf")).unwrap(), "first");
        assert_eq!(fs::read_to_string(archive.join("invoice(2).pdf")).unwrap(), "second");
    }

    #[test]
    fn counter_goes_before_last_extension_only() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("a.b.xml"), "x").unwrap();
        let next = free_archive_path(tmp.path(), Path::new("a.b.xml"));
        assert_eq!(next, tmp.path().join("a.b(1).xml"));
    }

    #[test]
    fn prune_keeps_newest_generations() {
        let tmp = tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(10_000);
        let mut dirs = Vec::new();
        for i in 0..7u64 {
            let dir = tmp.path().join(format!("gen-{i}"));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("f.xml"), "x").unwrap();
            fs::File::open(&dir)
                .unwrap()
                .set_modified(base + Duration::from_secs(i * 100))
                .unwrap();
            dirs.push(dir);
        }
        // Stray files in the archive root are not generations.
        fs::write(tmp.path().join("note.txt"), "x").unwrap();

        let report = clean_old_archives(tmp.path(), 5).unwrap();

        assert_eq!(report.kept, 5);
        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(!dirs[0].exists());
        assert!(!dirs[1].exists());
        for dir in &dirs[2..] {
            assert!(dir.join("f.xml").exists(), "{} should be kept", dir.display());
        }
        assert!(tmp.path().join("note.txt").exists());
    }

    #[test]
    fn prune_with_few_generations_removes_nothing() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("only")).unwrap();
        let report = clean_old_archives(tmp.path(), 5).unwrap();
        assert_eq!(report.kept, 1);
        assert!(report.removed.is_empty());
    }
}
