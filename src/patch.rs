//! Batch removal of content-pack requirements from save files.
//!
//! ```no_run
//! use portia_archive::patch::{patch_directory, PatchOptions};
//!
//! for (path, outcome) in patch_directory("saves", &PatchOptions::default())? {
//!     println!("{}: {:?}", path.display(), outcome);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::Archive;
use crate::error::{ArchiveError, Result};
use crate::summary::Summary;

pub const DEFAULT_BLOCK_KEY: &str = "Summary";
pub const DEFAULT_EXCLUDED_EXTENSION: &str = "txt";

// ── PatchOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`strip_dlc_requirements`] and [`patch_directory`].
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Block holding the [`Summary`] record.
    pub block_key:          String,
    /// Files with this extension are not saves and are skipped.
    pub excluded_extension: String,
    /// Decode and verify, but leave the file on disk untouched.
    pub dry_run:            bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            block_key:          DEFAULT_BLOCK_KEY.to_owned(),
            excluded_extension: DEFAULT_EXCLUDED_EXTENSION.to_owned(),
            dry_run:            false,
        }
    }
}

impl PatchOptions {
    /// Exact, case-sensitive extension match.
    fn is_excluded(&self, path: &Path) -> bool {
        path.extension() == Some(OsStr::new(&self.excluded_extension))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The save had no requirements; nothing was written.
    AlreadyClean,
    /// `removed` lists the requirement ids that were cleared.
    Patched { removed: Vec<i32> },
}

// ── Single file ──────────────────────────────────────────────────────────────

/// Clear the requirement list of one save and write it back.
pub fn strip_dlc_requirements<P: AsRef<Path>>(path: P, opts: &PatchOptions) -> Result<PatchOutcome> {
    let path = path.as_ref();
    let mut archive = Archive::load(path)?;

    let mut summary: Summary = archive.fetch(&opts.block_key)?;
    if summary.dlc_require.is_empty() {
        info!(path = %path.display(), "save does not require any DLCs");
        return Ok(PatchOutcome::AlreadyClean);
    }
    let removed = std::mem::take(&mut summary.dlc_require);
    archive.store(&opts.block_key, &summary)?;

    let check: Summary = archive.fetch(&opts.block_key)?;
    if !check.dlc_require.is_empty() {
        return Err(ArchiveError::invalid("requirements survived re-encoding"));
    }

    if opts.dry_run {
        info!(path = %path.display(), ?removed, "dry run, not saving");
    } else {
        archive.save(path)?;
        info!(path = %path.display(), ?removed, "patched");
    }
    Ok(PatchOutcome::Patched { removed })
}

// ── Directory ────────────────────────────────────────────────────────────────

/// Patch every regular file in `dir` (sorted by name) except excluded ones.
///
/// Only listing the directory can fail the call; per-file failures are
/// reported alongside the path and the batch carries on.
pub fn patch_directory<P: AsRef<Path>>(dir: P, opts: &PatchOptions) -> Result<Vec<(PathBuf, Result<PatchOutcome>)>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        if opts.is_excluded(&path) {
            continue;
        }
        info!(file = %path.file_name().unwrap_or_default().to_string_lossy(), "patching");
        let outcome = strip_dlc_requirements(&path, opts);
        if let Err(e) = &outcome {
            warn!(path = %path.display(), error = %e, "patch failed");
        }
        results.push((path, outcome));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_save(path: &Path, dlc: &[i32]) {
        let mut ar = Archive::new();
        ar.insert_bytes("Weather", vec![1, 2, 3, 4]).unwrap();
        let summary = Summary { dlc_require: dlc.to_vec(), level: 9, ..Summary::default() };
        ar.insert(DEFAULT_BLOCK_KEY, &summary).unwrap();
        ar.save(path).unwrap();
    }

    fn dlc_of(path: &Path) -> Vec<i32> {
        Archive::load(path).unwrap().fetch::<Summary>(DEFAULT_BLOCK_KEY).unwrap().dlc_require
    }

    #[test]
    fn patched_save_loses_requirements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot1");
        write_save(&path, &[4, 7]);

        let out = strip_dlc_requirements(&path, &PatchOptions::default()).unwrap();
        assert_eq!(out, PatchOutcome::Patched { removed: vec![4, 7] });
        assert!(dlc_of(&path).is_empty());

        let ar = Archive::load(&path).unwrap();
        assert_eq!(ar.block("Weather"), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(ar.fetch::<Summary>(DEFAULT_BLOCK_KEY).unwrap().level, 9);
    }

    #[test]
    fn clean_save_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot1");
        write_save(&path, &[]);
        let before = fs::read(&path).unwrap();

        let out = strip_dlc_requirements(&path, &PatchOptions::default()).unwrap();
        assert_eq!(out, PatchOutcome::AlreadyClean);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot1");
        write_save(&path, &[2]);
        let before = fs::read(&path).unwrap();

        let opts = PatchOptions { dry_run: true, ..PatchOptions::default() };
        let out = strip_dlc_requirements(&path, &opts).unwrap();
        assert_eq!(out, PatchOutcome::Patched { removed: vec![2] });
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn missing_summary_block_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot1");
        Archive::new().save(&path).unwrap();
        assert!(matches!(
            strip_dlc_requirements(&path, &PatchOptions::default()),
            Err(ArchiveError::BlockKeyNotFound(k)) if k == "Summary"
        ));
    }

    #[test]
    fn directory_batch_skips_text_and_survives_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_save(&dir.path().join("a_slot"), &[1]);
        fs::write(dir.path().join("b_broken"), b"not a save").unwrap();
        write_save(&dir.path().join("c_slot"), &[]);
        fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let results = patch_directory(dir.path(), &PatchOptions::default()).unwrap();
        let names: Vec<_> = results
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a_slot", "b_broken", "c_slot"]);

        assert_eq!(results[0].1.as_ref().unwrap(), &PatchOutcome::Patched { removed: vec![1] });
        assert!(results[1].1.is_err());
        assert_eq!(results[2].1.as_ref().unwrap(), &PatchOutcome::AlreadyClean);
        assert!(dlc_of(&dir.path().join("a_slot")).is_empty());
    }

    #[test]
    fn excluded_extension_is_case_sensitive() {
        let opts = PatchOptions::default();
        assert!(opts.is_excluded(Path::new("readme.txt")));
        assert!(!opts.is_excluded(Path::new("readme.TXT")));
        assert!(!opts.is_excluded(Path::new("slot1")));
        assert!(!opts.is_excluded(Path::new("slot1.sav")));
    }
}
