//! Termination signals are turned into a flag checked between files, so
//! an interrupted run unwinds normally and the key guard still erases
//! the plaintext key.
//!
//! Handlers are installed only once a key file exists. Before that the
//! default disposition applies and a signal simply terminates the process.

use std::sync::atomic::{AtomicBool, Ordering};

static REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(sig: libc::c_int) {
    REQUESTED.store(true, Ordering::SeqCst);
    // A repeated signal terminates immediately.
    // SAFETY: signal(2) is async-signal-safe.
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
    }
}

/// Install handlers for SIGINT, SIGTERM and (on Unix) SIGHUP. Calling
/// it again re-arms them.
pub fn install() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only stores to an atomic, which is
    // async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
        #[cfg(unix)]
        libc::signal(libc::SIGHUP, handler);
    }
}

/// The process-wide flag set by the installed handlers.
pub fn flag() -> &'static AtomicBool {
    &REQUESTED
}
