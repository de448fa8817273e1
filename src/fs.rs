//! File system abstraction for testability.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Abstraction over the file system operations used by the on-disk cache.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Checks if a file exists at the given path.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Creates all directories in the given path.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Reads the whole file.
    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Creates or truncates a file and writes `contents` to it.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;

    /// Renames a file, replacing the destination if it exists.
    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Removes a file.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;

    /// Removes a directory and everything below it.
    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Lists the immediate subdirectories of `path`.
    async fn list_dirs(&self, path: &Path) -> std::io::Result<Vec<PathBuf>>;
}

/// Returns the `.part` path used while a file is being written.
#[must_use]
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Writes to `{path}.part` and renames to `{path}` once the write succeeded.
///
/// # Errors
///
/// Returns the underlying I/O error. The destination is never left half-written.
pub async fn write_atomic<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    contents: &[u8],
) -> std::io::Result<()> {
    let pp = part_path(path);
    if let Err(e) = fs.write_file(&pp, contents).await {
        let _ = fs.remove_file(&pp).await;
        return Err(e);
    }
    fs.rename_file(&pp, path).await
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }

    async fn list_dirs(&self, path: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn part_path_appends_extension() {
        assert_eq!(
            part_path(Path::new("cache/manifest.json")),
            PathBuf::from("cache/manifest.json.part")
        );
        assert_eq!(part_path(Path::new("a.body")), PathBuf::from("a.body.part"));
    }

    #[tokio::test]
    async fn tokio_fs_file_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::File::create(&path).unwrap();

        let fs = TokioFileSystem::new();
        assert!(fs.file_exists(&path).await);
        assert!(!fs.file_exists(&dir.path().join("nonexistent.txt")).await);
    }

    #[tokio::test]
    async fn tokio_fs_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.txt");

        let fs = TokioFileSystem::new();
        fs.write_file(&path, b"hello").await.unwrap();
        assert_eq!(fs.read_file(&path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_part_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");

        let fs = TokioFileSystem::new();
        write_atomic(&fs, &path, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn tokio_fs_list_dirs_skips_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::File::create(dir.path().join("file.txt")).unwrap();

        let fs = TokioFileSystem::new();
        let dirs = fs.list_dirs(dir.path()).await.unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);
    }

    #[tokio::test]
    async fn tokio_fs_list_dirs_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let dirs = fs.list_dirs(&dir.path().join("missing")).await.unwrap();
        assert!(dirs.is_empty());
    }

    #[tokio::test]
    async fn tokio_fs_remove_dir_all() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        let fs = TokioFileSystem::new();
        fs.create_dir_all(&nested).await.unwrap();
        assert!(nested.exists());
        fs.remove_dir_all(&dir.path().join("a")).await.unwrap();
        assert!(!dir.path().join("a").exists());
    }
}
