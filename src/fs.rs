//! Saving payloads to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Abstraction over the few file system operations a save needs.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Checks if a file exists at the given path.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Creates all directories in the given path.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Writes `bytes` to `path`, replacing any existing file.
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;

    /// Renames `from` to `to`.
    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Removes the file at `path`.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, bytes).await
    }

    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Writes payloads into one output directory.
///
/// Data goes to `{name}.part` first and is renamed on success, so a crash
/// never leaves a truncated file under the final name. Existing files are
/// never clobbered: `clip.mp4` becomes `clip (1).mp4`, `clip (2).mp4`, ...
#[derive(Debug, Clone)]
pub struct DiskSaver<F: FileSystem = TokioFileSystem> {
    dir: PathBuf,
    fs: F,
}

impl DiskSaver<TokioFileSystem> {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(dir, TokioFileSystem)
    }
}

impl<F: FileSystem> DiskSaver<F> {
    #[must_use]
    pub fn with_fs(dir: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            dir: dir.into(),
            fs,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First path in the output directory not taken by an existing file.
    async fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !self.fs.file_exists(&candidate).await {
            return candidate;
        }
        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (filename, None),
        };
        let mut n = 1u32;
        loop {
            let name = ext.map_or_else(
                || format!("{stem} ({n})"),
                |ext| format!("{stem} ({n}).{ext}"),
            );
            let path = self.dir.join(name);
            if !self.fs.file_exists(&path).await {
                return path;
            }
            n += 1;
        }
    }

    /// Saves `bytes` as `filename` and returns the final path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        if !self.dir.as_os_str().is_empty() {
            self.fs.create_dir_all(&self.dir).await?;
        }
        let path = self.free_path(filename).await;
        let pp = part_path(&path);

        let written = match self.fs.write_file(&pp, bytes).await {
            Ok(()) => self.fs.rename_file(&pp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = self.fs.remove_file(&pp).await;
            return Err(e);
        }
        log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
