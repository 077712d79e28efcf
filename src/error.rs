use thiserror::Error;

/// Failures of a backend exchange, already normalized for display.
///
/// The underlying cause (status code, connection error, bad payload) is logged
/// at the call site, only the user-facing text travels with the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// `/chat` or `/image` could not be reached or answered with a non-2xx status.
    #[error("Neural Link Offline. Check Backend.")]
    Connection,

    /// `/models` could not be listed.
    #[error("Failed to fetch models")]
    ModelsUnavailable,
}
