mod dir;
mod file;
#[cfg(unix)]
mod umask;
#[cfg(unix)]
mod unix_socket;

pub use dir::{DirOptions, ScopedDir};
pub use file::{FileOptions, OpenMode, ScopedFile};
#[cfg(unix)]
pub use umask::{Mode, ScopedUmask, current_umask};
#[cfg(unix)]
pub use unix_socket::{ScopedUnixSocket, SocketOptions};
