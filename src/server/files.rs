use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServeError {
    #[error("File not found")]
    NotFound,

    /// The request resolves outside the audio directory.
    #[error("Path is outside the audio directory")]
    InvalidPath,
}

/// Resolves a requested download path against the audio directory.
///
/// `root` must be canonical. The request (already percent-decoded) is
/// joined onto it, canonicalized so `..` segments and symlinks are
/// resolved, and accepted only if the result still lies inside `root` and
/// is a regular file.
///
/// # Errors
///
/// - [`ServeError::InvalidPath`] for empty requests and anything resolving
///   outside `root`
/// - [`ServeError::NotFound`] for missing files and non-files
pub async fn resolve_episode_path(root: &Path, requested: &str) -> Result<PathBuf, ServeError> {
    let relative = requested.trim_start_matches('/');
    if relative.is_empty() || relative.contains('\0') {
        return Err(ServeError::InvalidPath);
    }

    let canonical = tokio::fs::canonicalize(root.join(relative))
        .await
        .map_err(|_| ServeError::NotFound)?;

    if !canonical.starts_with(root) {
        tracing::warn!(requested = %requested, "Rejected path outside audio directory");
        return Err(ServeError::InvalidPath);
    }

    match tokio::fs::metadata(&canonical).await {
        Ok(meta) if meta.is_file() => Ok(canonical),
        _ => Err(ServeError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        base: PathBuf,
        root: PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let base = std::env::temp_dir().join(format!("podserve_files_test_{}", name));
            let _ = std::fs::remove_dir_all(&base);
            let root = base.join("audio");
            std::fs::create_dir_all(root.join("nested")).unwrap();
            std::fs::write(root.join("show.mp3"), b"audio").unwrap();
            std::fs::write(root.join("nested").join("deep.mp3"), b"deep").unwrap();
            std::fs::write(base.join("secret.txt"), b"secret").unwrap();
            let root = std::fs::canonicalize(&root).unwrap();
            Self { base, root }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.base).ok();
        }
    }

    #[tokio::test]
    async fn test_resolves_file_in_root() {
        let fx = Fixture::new("plain");
        let path = resolve_episode_path(&fx.root, "show.mp3").await.unwrap();
        assert_eq!(path, fx.root.join("show.mp3"));
    }

    #[tokio::test]
    async fn test_leading_slash_stripped() {
        let fx = Fixture::new("slash");
        assert!(resolve_episode_path(&fx.root, "/show.mp3").await.is_ok());
        assert!(resolve_episode_path(&fx.root, "//show.mp3").await.is_ok());
    }

    #[tokio::test]
    async fn test_nested_file_inside_root() {
        let fx = Fixture::new("nested");
        let path = resolve_episode_path(&fx.root, "nested/deep.mp3").await.unwrap();
        assert_eq!(path, fx.root.join("nested").join("deep.mp3"));
    }

    #[tokio::test]
    async fn test_dotdot_that_stays_inside_is_allowed() {
        let fx = Fixture::new("dotdot_inside");
        assert!(resolve_episode_path(&fx.root, "nested/../show.mp3").await.is_ok());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let fx = Fixture::new("traversal");
        assert_eq!(
            resolve_episode_path(&fx.root, "../secret.txt").await,
            Err(ServeError::InvalidPath)
        );
        assert_eq!(
            resolve_episode_path(&fx.root, "nested/../../secret.txt").await,
            Err(ServeError::InvalidPath)
        );
    }

    #[tokio::test]
    async fn test_absolute_path_rejected() {
        let fx = Fixture::new("absolute");
        let secret = fx.base.join("secret.txt");
        let result = resolve_episode_path(&fx.root, &format!("/{}", secret.display())).await;
        // `/` is stripped, then `join` keeps it relative to root: not found
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let fx = Fixture::new("symlink");
        std::os::unix::fs::symlink(fx.base.join("secret.txt"), fx.root.join("link.mp3")).unwrap();
        assert_eq!(
            resolve_episode_path(&fx.root, "link.mp3").await,
            Err(ServeError::InvalidPath)
        );
    }

    #[tokio::test]
    async fn test_missing_file_not_found() {
        let fx = Fixture::new("missing");
        assert_eq!(
            resolve_episode_path(&fx.root, "nope.mp3").await,
            Err(ServeError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_directory_not_found() {
        let fx = Fixture::new("dir");
        assert_eq!(
            resolve_episode_path(&fx.root, "nested").await,
            Err(ServeError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_empty_request_invalid() {
        let fx = Fixture::new("empty");
        assert_eq!(
            resolve_episode_path(&fx.root, "/").await,
            Err(ServeError::InvalidPath)
        );
    }
}
