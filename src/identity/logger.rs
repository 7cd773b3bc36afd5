/// Logging capability injected into the mapping store
use std::fmt;
use tracing::{trace, warn};

/// Sink for mapping store diagnostics
///
/// Messages arrive unformatted so a sink that drops them pays nothing.
pub trait MappingLogger: Send + Sync {
    fn warn(&self, message: fmt::Arguments<'_>);
    fn trace(&self, message: fmt::Arguments<'_>);
}

/// Forwards to the `tracing` subscriber under the `lid_mapping` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl MappingLogger for TracingLogger {
    fn warn(&self, message: fmt::Arguments<'_>) {
        warn!(target: "lid_mapping", "{}", message);
    }

    fn trace(&self, message: fmt::Arguments<'_>) {
        trace!(target: "lid_mapping", "{}", message);
    }
}
