//! Optional tracing bootstrap for applications embedding the bus.
//!
//! The bus itself only emits `tracing` spans/events (see
//! [`crate::handler::InternalHandler::handle`]'s `driver.consume` span); it
//! never installs a subscriber, since a library has no business fighting an
//! embedding application over the global default. This mirrors the
//! teacher's own `utils::bootstrap::init_tracing` for binaries that want a
//! one-line, env-filtered `fmt` subscriber without pulling in the rest of
//! that bootstrap module's gRPC-retry helpers.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable consulted for the log filter, analogous to the
/// teacher's `ANGZARR_LOG`. Defaults to `"info"` when unset or invalid.
pub const LOG_ENV_VAR: &str = "BUSLINE_LOG";

/// Install a process-global `tracing` subscriber: an `EnvFilter` read from
/// [`LOG_ENV_VAR`] plus a plain `fmt` layer. Intended for example binaries
/// and tests, not for production embedders that already own their own
/// subscriber setup. Safe to call more than once; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
