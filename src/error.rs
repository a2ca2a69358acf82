//! Error types for the Wayland backend
//!
//! Fatal initialization problems and resource exhaustion are surfaced as
//! typed variants; everything transient (an optional global missing, a
//! format we cannot use) is skipped silently by the callers instead.

use thiserror::Error;

/// Errors reported by the Wayland backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The runtime directory variable is mandatory; shared-memory backing
    /// stores live underneath it.
    #[error("XDG_RUNTIME_DIR is not set")]
    MissingRuntimeDir,

    #[error("failed to connect to the Wayland compositor: {0}")]
    Connect(#[from] wayland_client::ConnectError),

    #[error("protocol dispatch failed: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),

    #[error("required global `{0}` was not advertised")]
    MissingGlobal(&'static str),

    #[error("compositor advertised no pixel format usable at this colour depth")]
    NoPixelFormat,

    #[error("no supported shell protocol available (xdg_wm_base or wl_shell)")]
    NoShell,

    #[error("cannot create shared-memory backing store: {0}")]
    BackingStore(#[source] std::io::Error),

    #[error("buffer allocation failed: {0}")]
    Allocation(#[source] std::io::Error),

    #[error("i/o error on the compositor socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("unknown window handle {0}")]
    UnknownWindow(usize),
}
