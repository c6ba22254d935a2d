//! Shutdown signal handling for `biglog serve`.
//!
//! The first SIGINT/SIGTERM sets a flag the serve loop polls between
//! requests; a second one exits immediately with code 1.

use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Install the handlers and return the flag they set.
pub fn setup_shutdown_handlers() -> Result<Arc<AtomicBool>, std::io::Error> {
    let stop = Arc::new(AtomicBool::new(false));

    for sig in TERM_SIGNALS {
        // Registered first so it only fires once `stop` is already set.
        flag::register_conditional_shutdown(*sig, 1, Arc::clone(&stop))?;
        flag::register(*sig, Arc::clone(&stop))?;
    }

    Ok(stop)
}
