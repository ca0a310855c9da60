use std::path::{Path, PathBuf};

use chrono::Utc;
use core::error::EtlError;

///
/// Moves `path` into `destination_dir` (used for the duplicates folder),
/// giving the destination a `YYYYMMDD_HHmmss` suffix if a file of the
/// same name is already there - matching the original's
/// `_move_to_duplicates`, which never overwrites an existing duplicate.
///
pub fn move_with_collision_handling(path: &Path, destination_dir: &Path) -> Result<PathBuf, EtlError> {
    std::fs::create_dir_all(destination_dir).map_err(|source| EtlError::Io { path: destination_dir.to_string_lossy().to_string(), source })?;

    let filename = path.file_name().expect("source path has a filename").to_string_lossy().to_string();
    let mut destination = destination_dir.join(&filename);

    if destination.exists() {
        let suffix = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        destination = destination_dir.join(format!("{filename}.{suffix}"));
    }

    std::fs::rename(path, &destination).map_err(|source| EtlError::Move {
        path: path.to_string_lossy().to_string(),
        destination: destination.to_string_lossy().to_string(),
        source,
    })?;

    Ok(destination)
}

///
/// Copies (rather than moves) `path` into `destination_dir`, used for
/// archiving - the source file must remain in place until intake parsing
/// has finished, since a parse failure still needs the original bytes on
/// disk for manual inspection. Overwrites any file already at the
/// destination: spec.md §5 Cancellation documents re-running the program
/// on the same intake directory as the recovery path, and the re-archive
/// this causes must be a harmless overwrite, not a proliferation of
/// timestamp-suffixed copies.
pub fn copy_to_archive(path: &Path, destination_dir: &Path) -> Result<PathBuf, EtlError> {
    std::fs::create_dir_all(destination_dir).map_err(|source| EtlError::Io { path: destination_dir.to_string_lossy().to_string(), source })?;

    let filename = path.file_name().expect("source path has a filename").to_string_lossy().to_string();
    let destination = destination_dir.join(&filename);

    std::fs::copy(path, &destination).map_err(|source| EtlError::Move {
        path: path.to_string_lossy().to_string(),
        destination: destination.to_string_lossy().to_string(),
        source,
    })?;

    Ok(destination)
}

pub fn remove_file(path: &Path) -> Result<(), EtlError> {
    std::fs::remove_file(path).map_err(|source| EtlError::Io { path: path.to_string_lossy().to_string(), source })
}
