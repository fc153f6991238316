//! Unix domain sockets bound inside their own temporary directory.
//!
//! A [`ScopedUnixSocket`] owns a [`ScopedDir`] and binds the socket to a file in
//! it. On release the socket is closed first (unless asked not to), then the
//! directory is removed together with the socket file.

use std::path::{Path, PathBuf};

use socket2::{Domain, SockAddr, Socket, Type};

use crate::core::{Result, Scoped};
use crate::scope::{DirOptions, ScopedDir};

/// Options for [`ScopedUnixSocket`].
#[derive(Debug)]
pub struct SocketOptions {
    /// Socket to bind. A new unix stream socket is created if `None`.
    pub socket: Option<Socket>,
    /// File name of the socket inside the temporary directory.
    pub socket_filename: PathBuf,
    /// Close the socket on release.
    pub close: bool,
    /// Options of the directory holding the socket file.
    pub dir_options: DirOptions,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            socket: None,
            socket_filename: PathBuf::from("tmp.socket"),
            close: true,
            dir_options: DirOptions::default(),
        }
    }
}

impl SocketOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn socket(mut self, socket: Socket) -> Self {
        self.socket = Some(socket);
        self
    }

    pub fn socket_filename<P: AsRef<Path>>(mut self, name: P) -> Self {
        self.socket_filename = name.as_ref().to_path_buf();
        self
    }

    pub fn close(mut self, close: bool) -> Self {
        self.close = close;
        self
    }

    pub fn dir_options(mut self, dir_options: DirOptions) -> Self {
        self.dir_options = dir_options;
        self
    }
}

/// A bound unix socket living in a private temporary directory.
///
/// ### Example:
/// ```
/// use volatile_kit::ScopedUnixSocket;
///
/// let sock = ScopedUnixSocket::new().unwrap();
/// sock.socket().unwrap().listen(1).unwrap();
/// std::os::unix::net::UnixStream::connect(sock.path()).unwrap();
///
/// let path = sock.path().to_path_buf();
/// drop(sock);
/// assert!(!path.exists());
/// ```
pub struct ScopedUnixSocket {
    socket: Option<Socket>,
    path: PathBuf,
    close: bool,
    released: bool,
    dir: ScopedDir, // dropped after the socket
}

impl ScopedUnixSocket {
    /// Creates and binds a unix stream socket with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(SocketOptions::default())
    }

    /// Binds `opts.socket` (or a fresh unix stream socket) inside a new temporary directory.
    ///
    /// If the socket cannot be created or bound, the directory is removed
    /// before the error is returned.
    pub fn with_options(opts: SocketOptions) -> Result<Self> {
        let mut dir = ScopedDir::with_options(&opts.dir_options)?;
        let path = dir.join(&opts.socket_filename);

        let bound = Self::bind(opts.socket, &path);
        let socket = match bound {
            Ok(socket) => socket,
            Err(e) => {
                if let Err(release_err) = dir.release() {
                    tracing::warn!(
                        path = %dir.path().display(),
                        error = %release_err,
                        "failed to remove socket dir after bind error"
                    );
                }
                return Err(e.into());
            }
        };

        tracing::debug!(path = %path.display(), "bound scoped unix socket");

        Ok(Self {
            socket: Some(socket),
            path,
            close: opts.close,
            released: false,
            dir,
        })
    }

    fn bind(socket: Option<Socket>, path: &Path) -> std::io::Result<Socket> {
        let socket = match socket {
            Some(socket) => socket,
            None => Socket::new(Domain::UNIX, Type::STREAM, None)?,
        };
        socket.bind(&SockAddr::unix(path)?)?;
        Ok(socket)
    }

    /// The bound socket, unless it was taken or closed.
    pub fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    pub fn socket_mut(&mut self) -> Option<&mut Socket> {
        self.socket.as_mut()
    }

    /// Takes the socket out of the scope. It will not be closed on release.
    pub fn take_socket(&mut self) -> Option<Socket> {
        self.socket.take()
    }

    /// Absolute path the socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory holding the socket file.
    pub fn dir(&self) -> &ScopedDir {
        &self.dir
    }

    pub fn close(&self) -> bool {
        self.close
    }
}

impl Scoped for ScopedUnixSocket {
    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.close {
            self.socket = None;
        }
        self.dir.release()?;

        tracing::debug!(
            path = %self.path.display(),
            closed = self.close,
            "released scoped unix socket"
        );
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ScopedUnixSocket {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to release scoped unix socket"
            );
        }
    }
}
