//! Process termination.
//!
//! The conformance suite kills service processes on purpose (`die`) and a
//! few harness invariants are unrecoverable (a refused shutdown, a failed
//! descriptor write). Neither may surface as an ordinary error.

/// Exit status used by `die`.
pub const DIE_EXIT_STATUS: i32 = 1;

/// Terminate the process.
///
/// With `cleanup`, exit normally so destructors of statics and stdio
/// buffers run. Without it, leave immediately with no teardown at all, the
/// way a crash looks to the peer.
pub fn die(cleanup: bool) -> ! {
    tracing::info!(cleanup, "service process terminating on request");
    if cleanup {
        std::process::exit(DIE_EXIT_STATUS)
    } else {
        exit_immediately(DIE_EXIT_STATUS)
    }
}

#[allow(unsafe_code)]
fn exit_immediately(status: i32) -> ! {
    // SAFETY: `_exit` takes no pointers and does not return.
    unsafe { libc::_exit(status) }
}

/// Log an invariant violation and abort.
pub fn fatal(message: &str) -> ! {
    tracing::error!(reason = message, "fatal harness error");
    std::process::abort()
}
