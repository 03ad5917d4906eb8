//! Path validation and sandboxing.
//!
//! Every path that reaches the filesystem arrives from untrusted input (file
//! names and backup ids come straight off the wire). This module is the only
//! place that turns them into absolute locations, and it refuses anything
//! that would land outside the storage root.

use exn::ResultExt;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Lexically normalizes a relative storage path.
///
/// Leading separators and `.` components are dropped (so `/etc/passwd` is
/// treated as the relative path `etc/passwd`), and `..` pops the previous
/// component. Popping past the start, Windows path prefixes, NUL bytes and
/// ASCII control characters are all rejected with
/// [`PathEscape`](crate::error::ErrorKind::PathEscape).
///
/// An input that normalizes to nothing (`""`, `"."`, `"a/.."`) yields an
/// empty path, which denotes the storage root itself.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use savesync_storage::normalize_path;
/// // Valid paths
/// assert_eq!(normalize_path("1000/save1.dat").unwrap(), Path::new("1000/save1.dat"));
/// assert_eq!(normalize_path("/1000//./save1.dat").unwrap(), Path::new("1000/save1.dat"));
/// assert_eq!(normalize_path("1000/tmp/../save1.dat").unwrap(), Path::new("1000/save1.dat"));
/// assert_eq!(normalize_path("").unwrap(), Path::new(""));
/// // Invalid paths
/// assert!(normalize_path("../etc/passwd").is_err());
/// assert!(normalize_path("1000/../../etc/passwd").is_err());
/// assert!(normalize_path("1000/a\0b").is_err());
/// ```
pub fn normalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // NUL truncates in C syscalls; control characters have no
                // business in an uploaded file name.
                if s.as_encoded_bytes().iter().any(|b| *b < 0x20 || *b == 0x7f) {
                    exn::bail!(ErrorKind::PathEscape(path.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::PathEscape(path.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::PathEscape(path.to_path_buf()));
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

/// A caller-supplied path after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Normalized path relative to the storage root (empty for the root).
    pub relative: PathBuf,
    /// Absolute location underneath the canonical storage root.
    pub absolute: PathBuf,
}
impl Resolved {
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }
}

/// Confines relative paths to a single storage root.
///
/// Constructed once with a fixed root and handed to whatever needs to touch
/// the filesystem; there is no ambient root anywhere else.
///
/// # Examples
///
/// ```no_run
/// use savesync_storage::PathResolver;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = PathResolver::new("/srv/savesync/storage")?;
/// let target = resolver.resolve_file("1000/save1.dat").await?;
/// assert!(target.absolute.starts_with(resolver.root()));
/// assert!(resolver.resolve("../outside").await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Canonical storage root
    root: PathBuf,
}
impl PathResolver {
    /// Create the resolver, creating the root directory (and its parents) if
    /// it does not exist yet.
    ///
    /// The root is canonicalized once here; every containment check compares
    /// against that canonical form. Fails with
    /// [`StorageInit`](crate::error::ErrorKind::StorageInit) when the root
    /// cannot be created, is not a directory, or cannot be canonicalized.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if root.exists() && !root.is_dir() {
            exn::bail!(ErrorKind::StorageInit(root.to_path_buf()));
        }
        // Use non-async here; it only happens once at startup and it's not
        // worth the hassle of making the constructor async.
        std::fs::create_dir_all(root).or_raise(|| ErrorKind::StorageInit(root.to_path_buf()))?;
        let root = std::fs::canonicalize(root).or_raise(|| ErrorKind::StorageInit(root.to_path_buf()))?;
        tracing::debug!(root = %root.display(), "Storage root ready");
        Ok(Self { root })
    }

    /// The canonical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to a location inside the root.
    ///
    /// The root itself is a valid result (empty relative path) so that
    /// directory-level operations such as deleting a whole backup can use the
    /// same code path. Use [`resolve_file`](Self::resolve_file) for file
    /// targets.
    pub async fn resolve(&self, path: impl AsRef<Path>) -> Result<Resolved> {
        let relative = normalize(path.as_ref())?;
        let absolute = self.root.join(&relative);
        self.ensure_contained(&absolute, path.as_ref()).await?;
        Ok(Resolved { relative, absolute })
    }

    /// Like [`resolve`](Self::resolve), but the storage root is never a
    /// valid file target.
    pub async fn resolve_file(&self, path: impl AsRef<Path>) -> Result<Resolved> {
        let resolved = self.resolve(path.as_ref()).await?;
        if resolved.is_root() {
            exn::bail!(ErrorKind::PathEscape(path.as_ref().to_path_buf()));
        }
        Ok(resolved)
    }

    /// Convert an absolute path back to a relative storage path.
    pub fn relative(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        normalize(relative)
    }

    /// Symlinks are the one thing lexical normalization cannot see. Walk up
    /// to the deepest ancestor that exists, canonicalize it and make sure it
    /// is still underneath the root. A regular file in the middle of the path
    /// (`ENOTDIR`) is walked past like a missing component.
    async fn ensure_contained(&self, absolute: &Path, original: &Path) -> Result<()> {
        let mut probe = absolute;
        loop {
            if !probe.starts_with(&self.root) {
                // Only reachable when the root itself vanished from under us.
                exn::bail!(ErrorKind::StorageInit(self.root.clone()));
            }
            match tokio::fs::canonicalize(probe).await {
                Ok(canonical) if canonical.starts_with(&self.root) => return Ok(()),
                Ok(_) => exn::bail!(ErrorKind::PathEscape(original.to_path_buf())),
                Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory) => {
                    // A dangling symlink would be followed on write, wherever
                    // it points.
                    if tokio::fs::symlink_metadata(probe).await.is_ok() {
                        exn::bail!(ErrorKind::PathEscape(original.to_path_buf()));
                    }
                    probe = match probe.parent() {
                        Some(parent) => parent,
                        None => exn::bail!(ErrorKind::StorageInit(self.root.clone())),
                    };
                },
                Err(e) => exn::bail!(ErrorKind::from_io(e, original)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_valid_paths() {
        assert_eq!(normalize("1000/save1.dat").unwrap(), Path::new("1000/save1.dat"));
        assert_eq!(normalize("1000/sub/dir/save.dat").unwrap(), Path::new("1000/sub/dir/save.dat"));
        assert_eq!(normalize("simple.dat").unwrap(), Path::new("simple.dat"));
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize("a//b//c").unwrap(), Path::new("a/b/c"));
        assert_eq!(normalize("a/./b/./c").unwrap(), Path::new("a/b/c"));
        assert_eq!(normalize("a/b/..").unwrap(), Path::new("a"));
        assert_eq!(normalize("Backup1///").unwrap(), Path::new("Backup1"));
    }

    #[test]
    fn test_leading_separator_is_relative() {
        assert_eq!(normalize("/etc/passwd").unwrap(), Path::new("etc/passwd"));
        assert_eq!(normalize("//1000/a.dat").unwrap(), Path::new("1000/a.dat"));
    }

    #[rstest]
    #[case("..")]
    #[case("../..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("1000/../../../etc/passwd")]
    #[case("./../x")]
    fn test_traversal_attempts(#[case] path: &str) {
        let err = normalize(path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
    }

    #[rstest]
    #[case("a\0b")]
    #[case("\0")]
    #[case("1000/line\nbreak.dat")]
    #[case("1000/bell\x07.dat")]
    #[case("1000/del\x7f.dat")]
    fn test_invalid_characters(#[case] path: &str) {
        assert!(normalize(path).is_err());
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./")]
    #[case("//")]
    #[case("a/..")]
    fn test_empty_paths_denote_root(#[case] path: &str) {
        assert_eq!(normalize(path).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_resolver_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/storage");
        let resolver = PathResolver::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(resolver.root(), std::fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn test_resolver_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = PathResolver::new(&file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::StorageInit(_)));
    }

    #[tokio::test]
    async fn test_resolve_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        let resolved = resolver.resolve("1000/save1.dat").await.unwrap();
        assert_eq!(resolved.relative, Path::new("1000/save1.dat"));
        assert_eq!(resolved.absolute, resolver.root().join("1000/save1.dat"));
        assert!(!resolved.is_root());
    }

    #[tokio::test]
    async fn test_resolve_root_only_for_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        assert!(resolver.resolve("").await.unwrap().is_root());
        let err = resolver.resolve_file("").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
        let err = resolver.resolve_file("1000/..").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
    }

    #[rstest]
    #[case("../escape")]
    #[case("1000/../../escape")]
    #[case("../../../../../../../../etc/passwd")]
    #[tokio::test]
    async fn test_resolve_rejects_escape_for_any_root(#[case] path: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        for root in ["a", "a/b", "a/b/c"] {
            let resolver = PathResolver::new(temp_dir.path().join(root)).unwrap();
            let err = resolver.resolve(path).await.unwrap_err();
            assert!(matches!(&*err, ErrorKind::PathEscape(_)), "{path} escaped {root}");
        }
    }

    #[tokio::test]
    async fn test_resolve_through_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        std::fs::create_dir_all(resolver.root().join("1000")).unwrap();
        std::fs::write(resolver.root().join("1000/save1.dat"), b"x").unwrap();
        let resolved = resolver.resolve_file("1000/save1.dat/x").await.unwrap();
        assert_eq!(resolved.absolute, resolver.root().join("1000/save1.dat/x"));
    }

    #[test]
    fn test_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        let abs = resolver.root().join("1000/save1.dat");
        assert_eq!(resolver.relative(&abs).unwrap(), Path::new("1000/save1.dat"));
        assert!(resolver.relative("/other/file.dat").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let resolver = PathResolver::new(temp_dir.path().join("root")).unwrap();
        std::os::unix::fs::symlink(&outside, resolver.root().join("link")).unwrap();
        let err = resolver.resolve("link/secret.dat").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
        let err = resolver.resolve("link").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(temp_dir.path().join("root")).unwrap();
        let target = temp_dir.path().join("does-not-exist-yet");
        std::os::unix::fs::symlink(&target, resolver.root().join("dangling")).unwrap();
        let err = resolver.resolve_file("dangling").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_within_root_is_allowed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        std::fs::create_dir_all(resolver.root().join("1000")).unwrap();
        std::os::unix::fs::symlink(resolver.root().join("1000"), resolver.root().join("latest")).unwrap();
        assert!(resolver.resolve("latest/save1.dat").await.is_ok());
    }
}
