//! Error types for the bridge runtime

/// Runtime error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The calling OS thread already has a managed thread attached
    #[error("Thread already attached to the runtime")]
    AlreadyAttached,

    /// A local reference handle was decoded outside its segment
    #[error("Stale local reference: index {index} (segment top {segment_state})")]
    StaleLocalRef {
        /// Table index encoded in the handle
        index: u32,
        /// Segment top at the time of decoding
        segment_state: u32,
    },
}
