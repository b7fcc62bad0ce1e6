//! Logging helpers shared by every crate in the workspace.
//!
//! All output goes through `tracing`; the binary decides how events are rendered.

/// Target used for events that report a positive finding (an alive host,
/// a reachable service). Formatters render these differently from plain `info!`.
pub const SUCCESS_TARGET: &str = "shoal::success";

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        ::tracing::info!(target: $crate::log::SUCCESS_TARGET, $($arg)*)
    };
}
