//! Scoped temporary filesystem resources that remove themselves when their scope ends.
//!
//! ### Overview
//!
//! `volatile-kit` wraps the creation of temporary files, directories and unix domain
//! sockets in values that own the resource and release it exactly once: explicitly via
//! [`Scoped::release`], at the end of [`Scoped::scope`], or on `Drop` when the scope is
//! left any other way (early return, `?`, panic).
//!
//! **Key ideas**:
//! - **Deferred deletion**: a [`ScopedFile`] can be closed and handed to another process by
//!   path; it is deleted only when its scope ends.
//! - **Narrow error tolerance**: only "already gone" is forgiven at release time (always for
//!   directories, on request for files). Every other OS error is returned.
//! - **Composition**: a [`ScopedUnixSocket`] owns the [`ScopedDir`] it is bound in and removes
//!   it after closing the socket.
//! - **Delegation**: unique names come from the `tempfile` crate and the OS.
//!
//! ### Example:
//! ```
//! use std::io::Write;
//! use volatile_kit::Scoped;
//!
//! let content = volatile_kit::file()
//!     .unwrap()
//!     .scope(|tmp| {
//!         tmp.write_all(b"foo")?;
//!         tmp.close();
//!         std::fs::read(tmp.name())
//!     })
//!     .unwrap();
//! assert_eq!(content, b"foo");
//! ```

mod core;
mod scope;

pub use core::{Error, Result, Scoped};
pub use scope::{DirOptions, FileOptions, OpenMode, ScopedDir, ScopedFile};
#[cfg(unix)]
pub use scope::{Mode, ScopedUmask, ScopedUnixSocket, SocketOptions, current_umask};

/// Creates a [`ScopedDir`] with default options.
pub fn dir() -> Result<ScopedDir> {
    ScopedDir::new()
}

/// Creates a [`ScopedFile`] with default options.
pub fn file() -> Result<ScopedFile> {
    ScopedFile::new()
}

/// Creates a bound [`ScopedUnixSocket`] with default options.
#[cfg(unix)]
pub fn unix_socket() -> Result<ScopedUnixSocket> {
    ScopedUnixSocket::new()
}

/// Sets the process umask until the returned guard is released.
#[cfg(unix)]
pub fn umask(mode: Mode) -> ScopedUmask {
    ScopedUmask::set(mode)
}
