//! Named temporary files whose lifetime is bound to a scope instead of to the open stream.
//!
//! Closing a [`ScopedFile`] only closes the stream: the file stays on disk until
//! the scope releases it. That makes it possible to write a file, close it, hand
//! its path to another process and still have it cleaned up afterwards.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::core::{Result, Scoped, utils};
use crate::Error;

/// How the file stream is opened.
///
/// Parsed from the usual mode strings: `r`, `w`, `x` or `a`, optionally
/// followed by `+` (read and write), `b` or `t`. Text and binary modes are the
/// same thing here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OpenMode {
    Read,
    Write,
    #[default]
    ReadWrite,
    Append,
    ReadAppend,
}

impl OpenMode {
    pub fn is_append(self) -> bool {
        matches!(self, OpenMode::Append | OpenMode::ReadAppend)
    }

    pub fn is_readable(self) -> bool {
        matches!(
            self,
            OpenMode::Read | OpenMode::ReadWrite | OpenMode::ReadAppend
        )
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    /// Options for reopening the created file, when the mode needs less than read+write.
    fn narrowed(self) -> Option<OpenOptions> {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::ReadWrite | OpenMode::ReadAppend => return None,
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true),
            OpenMode::Append => options.append(true),
        };
        Some(options)
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid mode: {s:?}"));

        let mut base = None;
        let mut plus = false;
        for c in s.chars() {
            match c {
                'r' | 'w' | 'x' | 'a' if base.is_none() => base = Some(c),
                '+' if !plus => plus = true,
                'b' | 't' => {}
                _ => return Err(invalid()),
            }
        }

        match (base.ok_or_else(invalid)?, plus) {
            ('r', false) => Ok(OpenMode::Read),
            ('w' | 'x', false) => Ok(OpenMode::Write),
            ('a', false) => Ok(OpenMode::Append),
            ('a', true) => Ok(OpenMode::ReadAppend),
            (_, true) => Ok(OpenMode::ReadWrite),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpenMode::Read => "rb",
            OpenMode::Write => "wb",
            OpenMode::ReadWrite => "w+b",
            OpenMode::Append => "ab",
            OpenMode::ReadAppend => "a+b",
        };
        f.write_str(s)
    }
}

impl<'de> Deserialize<'de> for OpenMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Options for [`ScopedFile`].
///
/// ### Example:
/// ```
/// use volatile_kit::{FileOptions, ScopedFile};
///
/// let opts = FileOptions::new().suffix(".json").ignore_missing(true);
/// let file = ScopedFile::with_options(&opts).unwrap();
/// assert!(file.name().to_string_lossy().ends_with(".json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileOptions {
    pub mode: OpenMode,
    #[serde(deserialize_with = "utils::deserialize_affix")]
    pub suffix: String,
    #[serde(deserialize_with = "utils::deserialize_affix")]
    pub prefix: String,
    pub dir: Option<PathBuf>,
    pub ignore_missing: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            mode: OpenMode::ReadWrite,
            suffix: String::new(),
            prefix: "tmp".to_owned(),
            dir: None,
            ignore_missing: false,
        }
    }
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads options from any serde data format.
    /// Any problem, including a numeric `suffix`, is reported as [`Error::Config`]
    /// before a file is created.
    pub fn from_config<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self> {
        Self::deserialize(deserializer).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Parent directory of the new file.
    pub fn dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Don't fail on release when the file is already gone.
    pub fn ignore_missing(mut self, ignore: bool) -> Self {
        self.ignore_missing = ignore;
        self
    }
}

/// A uniquely named file, deleted on release or drop.
///
/// `ScopedFile` reads, writes and seeks like a [`File`] until [`ScopedFile::close`]
/// is called. After that every I/O call fails, but the file itself is still there.
pub struct ScopedFile {
    path: PathBuf, // absolute host path
    file: Option<File>,
    mode: OpenMode,
    ignore_missing: bool,
    released: bool,
}

impl ScopedFile {
    /// Creates a file with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(&FileOptions::default())
    }

    pub fn with_options(opts: &FileOptions) -> Result<Self> {
        let parent = utils::parent_dir(opts.dir.as_deref())?;
        let (file, path) = tempfile::Builder::new()
            .prefix(&opts.prefix)
            .suffix(&opts.suffix)
            .append(opts.mode.is_append())
            .tempfile_in(&parent)?
            .keep()
            .map_err(|e| e.error)?;

        let file = match opts.mode.narrowed() {
            None => file,
            Some(options) => {
                drop(file);
                match options.open(&path) {
                    Ok(file) => file,
                    Err(e) => {
                        if let Err(rm) = std::fs::remove_file(&path) {
                            tracing::warn!(
                                path = %path.display(),
                                error = %rm,
                                "failed to remove half-created file"
                            );
                        }
                        return Err(e.into());
                    }
                }
            }
        };

        tracing::debug!(path = %path.display(), mode = %opts.mode, "created scoped file");

        Ok(Self {
            path,
            file: Some(file),
            mode: opts.mode,
            ignore_missing: opts.ignore_missing,
            released: false,
        })
    }

    /// Full path of the file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Same as [`ScopedFile::name`].
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn ignore_missing(&self) -> bool {
        self.ignore_missing
    }

    /// Closes the stream. The file stays on disk until release.
    pub fn close(&mut self) {
        self.file = None;
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn as_file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn as_file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    fn stream(&mut self) -> io::Result<&mut File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(io::Error::other(format!(
                "I/O operation on closed file {}",
                self.path.display()
            ))),
        }
    }
}

impl Read for ScopedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }
}

impl Write for ScopedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
}

impl Seek for ScopedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream()?.seek(pos)
    }
}

impl Scoped for ScopedFile {
    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.close();

        utils::tolerate_missing(std::fs::remove_file(&self.path), self.ignore_missing)?;

        tracing::debug!(path = %self.path.display(), "removed scoped file");
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl AsRef<Path> for ScopedFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to remove scoped file"
            );
        }
    }
}
