//! Bridges the `log`-crate call sites used throughout `keeper-impls`/`keeper-auth-impls` (e.g.
//! `log::error!` on a dropped PostgreSQL connection) into the `tracing` subscriber configured by
//! [`crate::tracing::configure_tracer`], so both logging idioms land in the same structured
//! output and OTLP export.

use log::LevelFilter;

/// Installs the `log` -> `tracing` bridge and sets the maximum `log` level.
///
/// Must run before [`crate::tracing::configure_tracer`] installs the global subscriber, since
/// `tracing_log::LogTracer` only forwards records to whatever subscriber is active when each
/// `log::` call happens.
pub(crate) fn init(level: LevelFilter) {
	log::set_max_level(level);
	if let Err(e) = tracing_log::LogTracer::init() {
		eprintln!("log-to-tracing bridge already installed: {}", e);
	}
}
