use std::fmt::Debug;

use super::error::{DriverError, ErrorKind, NativeError};

/// Where the native client was when it failed.
///
/// Transport failures are reported differently while a handle is being
/// established than on a handle that was already open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Connecting,
    Connected,
}

/// Maps a backend's native error signal onto the portable taxonomy.
///
/// Implementations are pure and total: every input yields a kind, and
/// anything without a specific mapping yields `ErrorKind::Driver`.
pub trait ExceptionConverter: Send + Sync + Debug {
    /// Pick the semantic kind for a native error.
    fn classify(&self, error: &NativeError) -> ErrorKind;

    /// Classify and wrap, keeping the native error as the source.
    fn convert(&self, error: NativeError, query: Option<&str>) -> DriverError {
        let kind = self.classify(&error);
        DriverError::new(kind, error, query)
    }
}

/// Emit the diagnostic for a native error that came without a descriptor.
pub(crate) fn warn_missing_info(backend: &str, error: &NativeError) {
    tracing::warn!(
        "{} error has no structured error info, classifying from fallback: {}",
        backend,
        error.message()
    );
}
