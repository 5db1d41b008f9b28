//! Tracing subscriber initialization for development builds.
//!
//! Call [`init_dev_subscriber`] at application startup (not from library
//! code) to get structured logs on stderr.

use tracing::Level;
use tracing_subscriber::fmt;

/// Initialize a simple stderr subscriber for development.
///
/// Shows DEBUG and above with target, file, and line number.
///
/// # Panics
/// Panics if a global subscriber has already been set.
pub fn init_dev_subscriber() {
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("a global tracing subscriber was already set");
}
