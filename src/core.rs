use std::io;

/// Errors produced while acquiring or releasing a scoped resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller supplied options that can never work. Raised before touching the OS.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Any OS-level failure, passed through unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the OS error kind, if this is an I/O error.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Io(e) => Some(e.kind()),
            Error::Config(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::NotFound)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A resource that lives until the owning scope releases it.
///
/// Implementors remember whether release already happened, so that the
/// explicit [`Scoped::release`] and the implicit release in `Drop` never run
/// twice for the same resource.
pub trait Scoped: Sized {
    /// Releases the resource. A second call is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Returns true once release has been attempted.
    fn is_released(&self) -> bool;

    /// Runs `body` with the resource and releases it afterwards, whatever `body` returned.
    ///
    /// If both `body` and the release fail, the error of `body` is returned and
    /// the release error is logged. A failed release after a successful `body`
    /// is returned to the caller. A panic in `body` still releases through `Drop`.
    fn scope<T, E, F>(mut self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let outcome = body(&mut self);
        let released = self.release();
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                tracing::warn!(error = %release_err, "release failed while leaving a failed scope");
                Err(e)
            }
        }
    }
}

pub(crate) mod utils {
    use std::io;
    use std::path::{Path, PathBuf};

    use serde::de::{self, Deserializer, Visitor};

    /// Turns `NotFound` into success when `tolerate` is set. Every other error is kept.
    pub fn tolerate_missing(result: io::Result<()>, tolerate: bool) -> io::Result<()> {
        match result {
            Err(e) if tolerate && e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Resolves the parent directory for a new resource into an absolute path.
    pub fn parent_dir(dir: Option<&Path>) -> io::Result<PathBuf> {
        match dir {
            Some(dir) => std::path::absolute(dir),
            None => std::path::absolute(std::env::temp_dir()),
        }
    }

    /// Deserializes a file name affix, refusing numbers.
    ///
    /// A number in place of the suffix almost always means a positional buffer
    /// size ended up in the wrong slot.
    pub fn deserialize_affix<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AffixVisitor;

        impl<'de> Visitor<'de> for AffixVisitor {
            type Value = String;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
                Ok(v.to_owned())
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
                Err(numeric_affix(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
                Err(numeric_affix(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
                Err(numeric_affix(v))
            }
        }

        deserializer.deserialize_any(AffixVisitor)
    }

    fn numeric_affix<E: de::Error>(v: impl std::fmt::Display) -> E {
        E::custom(format!(
            "numeric suffix `{v}` is not allowed (is it a buffer size in the wrong place?)"
        ))
    }
}
