//! Interrupt flag for SIGINT/SIGTERM.
//!
//! The default disposition would kill the process with its staging areas
//! still on disk. With the handlers installed the signal only raises a flag;
//! the pipeline notices it at the next step boundary and returns
//! [`Error::Interrupted`](crate::Error::Interrupted), which unwinds every
//! staging scope normally. A builder running in the foreground receives the
//! terminal's SIGINT itself and fails on its own.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT and SIGTERM handlers for this process.
pub fn install_handlers() -> Result<()> {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only performs an atomic store, which is
        // async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            return Err(Error::io(
                format!("installing handler for signal {signal}"),
                std::io::Error::last_os_error(),
            ));
        }
    }
    Ok(())
}

/// Whether an interrupt has been received.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Fail with [`Error::Interrupted`] once an interrupt has been received.
pub fn check() -> Result<()> {
    if is_interrupted() {
        return Err(Error::Interrupted);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
