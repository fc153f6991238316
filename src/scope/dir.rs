//! Temporary directories that are removed when their scope ends.
//!
//! A [`ScopedDir`] is created under a parent directory (the platform temp dir
//! by default) with a unique name, and removed on release:
//! - **force** (the default): the whole tree is removed, whatever it contains.
//! - **no force**: only an empty directory is removed, otherwise the
//!   "directory not empty" error is returned. Use this when the directory may
//!   become a mount point and its content must never be wiped by accident.
//!
//! A directory that is already gone at release time is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::core::{Result, Scoped, utils};
use crate::Error;

/// Options for [`ScopedDir`].
///
/// ### Example:
/// ```
/// use volatile_kit::{DirOptions, ScopedDir};
///
/// let opts = DirOptions::new().prefix("build-").force(false);
/// let dir = ScopedDir::with_options(&opts).unwrap();
/// assert!(dir.path().is_dir());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirOptions {
    #[serde(deserialize_with = "utils::deserialize_affix")]
    pub suffix: String,
    #[serde(deserialize_with = "utils::deserialize_affix")]
    pub prefix: String,
    pub dir: Option<PathBuf>,
    pub force: bool,
}

impl Default for DirOptions {
    fn default() -> Self {
        Self {
            suffix: String::new(),
            prefix: "tmp".to_owned(),
            dir: None,
            force: true,
        }
    }
}

impl DirOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads options from any serde data format.
    /// Any problem is reported as [`Error::Config`].
    pub fn from_config<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self> {
        Self::deserialize(deserializer).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Parent directory of the new directory.
    pub fn dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Recursive removal on release, if true.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// A uniquely named directory, removed on release or drop.
pub struct ScopedDir {
    path: PathBuf, // absolute host path
    force: bool,
    released: bool,
}

impl ScopedDir {
    /// Creates a directory with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(&DirOptions::default())
    }

    /// Creates a new empty directory as described by `opts`.
    /// The returned path is always absolute, even for a relative `opts.dir`.
    pub fn with_options(opts: &DirOptions) -> Result<Self> {
        let parent = utils::parent_dir(opts.dir.as_deref())?;
        let path = tempfile::Builder::new()
            .prefix(&opts.prefix)
            .suffix(&opts.suffix)
            .tempdir_in(&parent)?
            .keep();

        tracing::debug!(path = %path.display(), force = opts.force, "created scoped dir");

        Ok(Self {
            path,
            force: opts.force,
            released: false,
        })
    }

    /// Absolute path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn force(&self) -> bool {
        self.force
    }

    /// Joins `name` onto the directory path.
    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.path.join(name)
    }
}

impl Scoped for ScopedDir {
    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let removed = if self.force {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_dir(&self.path)
        };
        utils::tolerate_missing(removed, true)?;

        tracing::debug!(path = %self.path.display(), "removed scoped dir");
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl AsRef<Path> for ScopedDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!(path = %self.path.display(), error = %e, "failed to remove scoped dir");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use tempdir::TempDir;

    mod creations {
        use super::*;

        #[test]
        fn test_new_creates_empty_dir() {
            let dir = ScopedDir::new().unwrap();
            assert!(dir.path().is_dir());
            assert!(dir.path().is_absolute());
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
            assert!(dir.force());
            assert!(!dir.is_released());
        }

        #[test]
        fn test_prefix_and_suffix_applied() {
            let parent = setup_test_env();
            let opts = DirOptions::new().dir(parent.path()).prefix("pre-").suffix("-post");
            let dir = ScopedDir::with_options(&opts).unwrap();

            let name = dir.path().file_name().unwrap().to_str().unwrap().to_owned();
            assert!(name.starts_with("pre-"));
            assert!(name.ends_with("-post"));
            assert_eq!(dir.path().parent().unwrap(), parent.path());
        }

        #[test]
        fn test_relative_parent_gives_absolute_path() {
            let dir = ScopedDir::with_options(&DirOptions::new().dir(".")).unwrap();
            let cwd = std::env::current_dir().unwrap();
            assert!(dir.path().is_absolute());
            assert!(dir.path().starts_with(&cwd));
            assert!(dir.path().is_dir());
        }

        #[test]
        fn test_missing_parent_fails() {
            let parent = setup_test_env();
            let opts = DirOptions::new().dir(parent.path().join("missing"));
            let err = ScopedDir::with_options(&opts).err().unwrap();
            assert!(err.is_not_found());
        }

        #[test]
        fn test_unique_names() {
            let parent = setup_test_env();
            let opts = DirOptions::new().dir(parent.path());
            let first = ScopedDir::with_options(&opts).unwrap();
            let second = ScopedDir::with_options(&opts).unwrap();
            assert_ne!(first.path(), second.path());
        }
    }

    mod release {
        use super::*;

        #[test]
        fn test_drop_removes_dir() {
            let dir = ScopedDir::new().unwrap();
            let path = dir.path().to_path_buf();
            assert!(path.is_dir());

            drop(dir);
            assert!(!path.exists());
        }

        #[test]
        fn test_force_removes_content() {
            let dir = ScopedDir::new().unwrap();
            let path = dir.path().to_path_buf();
            fs::create_dir_all(dir.join("a/b/c")).unwrap();
            fs::write(dir.join("a/b/c/file.txt"), b"content").unwrap();

            dir.scope(|_| Ok::<_, Error>(())).unwrap();
            assert!(!path.exists());
        }

        #[test]
        fn test_no_force_refuses_non_empty() {
            let opts = DirOptions::new().force(false);
            let dir = ScopedDir::with_options(&opts).unwrap();
            let path = dir.path().to_path_buf();
            fs::write(dir.join("file.txt"), b"content").unwrap();

            let err = dir.scope(|_| Ok::<_, Error>(())).unwrap_err();
            assert!(err.io_kind().is_some());
            assert!(!err.is_not_found());
            assert!(path.join("file.txt").exists());

            fs::remove_dir_all(&path).unwrap();
        }

        #[test]
        fn test_no_force_removes_empty() {
            let dir = ScopedDir::with_options(&DirOptions::new().force(false)).unwrap();
            let path = dir.path().to_path_buf();

            dir.scope(|_| Ok::<_, Error>(())).unwrap();
            assert!(!path.exists());
        }

        #[test]
        fn test_already_removed_is_ok() {
            for force in [true, false] {
                let mut dir = ScopedDir::with_options(&DirOptions::new().force(force)).unwrap();
                fs::remove_dir(dir.path()).unwrap();
                assert!(dir.release().is_ok());
            }
        }

        #[test]
        fn test_release_once() {
            let mut dir = ScopedDir::new().unwrap();
            let path = dir.path().to_path_buf();
            dir.release().unwrap();
            assert!(dir.is_released());

            // A directory appearing at the same path is not ours anymore.
            fs::create_dir(&path).unwrap();
            dir.release().unwrap();
            drop(dir);
            assert!(path.is_dir());
            fs::remove_dir(&path).unwrap();
        }

        #[test]
        fn test_removed_on_body_error() {
            let mut seen = PathBuf::new();
            let result: anyhow::Result<()> = ScopedDir::new().unwrap().scope(|dir| {
                seen = dir.path().to_path_buf();
                fs::write(dir.join("data"), b"x")?;
                Err(anyhow::anyhow!("body failed"))
            });

            assert_eq!(result.unwrap_err().to_string(), "body failed");
            assert!(!seen.as_os_str().is_empty());
            assert!(!seen.exists());
        }

        #[test]
        fn test_removed_on_panic() {
            let parent = setup_test_env();
            let parent_path = parent.path().to_path_buf();
            let outcome = std::panic::catch_unwind(move || {
                let _dir = ScopedDir::with_options(&DirOptions::new().dir(&parent_path)).unwrap();
                panic!("boom");
            });

            assert!(outcome.is_err());
            assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
        }

        #[test]
        fn test_no_force_replaced_by_file_fails() {
            let opts = DirOptions::new().force(false);
            let mut dir = ScopedDir::with_options(&opts).unwrap();
            fs::remove_dir(dir.path()).unwrap();
            fs::write(dir.path(), b"not a dir").unwrap();

            let err = dir.release().unwrap_err();
            assert!(err.io_kind().is_some());
            assert!(!err.is_not_found());
            assert!(dir.path().is_file());

            fs::remove_file(dir.path()).unwrap();
        }

        #[test]
        fn test_permission_error_propagates() {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                // root ignores directory permissions
                if unsafe { libc::geteuid() } == 0 {
                    return;
                }

                let parent = setup_test_env();
                let mut dir =
                    ScopedDir::with_options(&DirOptions::new().dir(parent.path())).unwrap();
                fs::set_permissions(parent.path(), fs::Permissions::from_mode(0o555)).unwrap();

                let err = dir.release().unwrap_err();
                assert_eq!(err.io_kind(), Some(io::ErrorKind::PermissionDenied));

                fs::set_permissions(parent.path(), fs::Permissions::from_mode(0o755)).unwrap();
                fs::remove_dir(dir.path()).unwrap();
            }
        }
    }

    mod config {
        use super::*;
        use serde_json::json;

        #[test]
        fn test_defaults() {
            let opts = DirOptions::from_config(json!({})).unwrap();
            assert_eq!(opts, DirOptions::default());
            assert_eq!(opts.prefix, "tmp");
            assert_eq!(opts.suffix, "");
            assert!(opts.force);
            assert!(opts.dir.is_none());
        }

        #[test]
        fn test_full_config() {
            let opts = DirOptions::from_config(json!({
                "suffix": ".d",
                "prefix": "mnt-",
                "dir": "/var/tmp",
                "force": false,
            }))
            .unwrap();
            let expected = DirOptions::new()
                .suffix(".d")
                .prefix("mnt-")
                .dir("/var/tmp")
                .force(false);
            assert_eq!(opts, expected);
        }

        #[test]
        fn test_numeric_suffix_rejected() {
            let err = DirOptions::from_config(json!({ "suffix": 4096 })).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(err.to_string().contains("4096"));
        }

        #[test]
        fn test_unknown_field_rejected() {
            let err = DirOptions::from_config(json!({ "recursive": true })).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }
    }

    fn setup_test_env() -> TempDir {
        TempDir::new("scoped_dir_test").unwrap()
    }
}
