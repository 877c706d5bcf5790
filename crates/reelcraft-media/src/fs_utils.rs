//! Filesystem helpers shared by the directory passes.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Create a directory (and parents) if missing.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
        tracing::info!(dir = %dir.display(), "Created directory");
    }
    Ok(())
}

/// Regular files in `dir` accepted by `filter`, sorted by file name.
///
/// A missing directory is reported as [`MediaError::FileNotFound`].
pub async fn list_files<F>(dir: impl AsRef<Path>, filter: F) -> MediaResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(MediaError::FileNotFound(dir.to_path_buf()));
    }

    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && filter(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name of a path as UTF-8, lossily.
pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
