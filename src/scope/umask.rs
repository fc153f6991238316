//! Temporary process umask.
//!
//! The umask is process-global: changing it from several threads at once
//! affects all of them.

use crate::core::{Result, Scoped};

/// File mode bits.
pub type Mode = libc::mode_t;

/// Returns the current umask without changing it.
pub fn current_umask() -> Mode {
    // umask(2) can only be read by setting it, so set it back right away.
    let current = unsafe { libc::umask(0) };
    unsafe { libc::umask(current) };
    current
}

/// Sets the process umask and restores the previous one on release or drop.
#[derive(Debug)]
pub struct ScopedUmask {
    previous: Mode,
    released: bool,
}

impl ScopedUmask {
    /// Sets the umask to `mode`.
    pub fn set(mode: Mode) -> Self {
        // umask(2) always succeeds
        let previous = unsafe { libc::umask(mode) };
        tracing::debug!(
            umask = format_args!("{mode:04o}"),
            previous = format_args!("{previous:04o}"),
            "umask set"
        );
        Self {
            previous,
            released: false,
        }
    }

    /// The umask that was in effect before this scope.
    pub fn previous(&self) -> Mode {
        self.previous
    }
}

impl Scoped for ScopedUmask {
    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        unsafe { libc::umask(self.previous) };
        tracing::debug!(umask = format_args!("{:04o}", self.previous), "umask restored");
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ScopedUmask {
    fn drop(&mut self) {
        // restoring never fails
        let _ = self.release();
    }
}
