//! # waybridge
//!
//! A Wayland client backend for embedded GUI libraries that render into
//! plain pixel buffers. It owns the compositor connection and turns it into
//! a small, synchronous surface the host drives from its main loop:
//!
//! - **Windows** — toplevel surfaces with optional client-side decorations
//!   (titlebar, close/maximize/minimize buttons, resize borders)
//! - **Buffers** — per-window growable shared-memory pools; the host's
//!   rendered pixels are packed to the negotiated wl_shm format and blitted
//!   in
//! - **Shells** — xdg-shell preferred, legacy wl_shell as fallback, behind
//!   one uniform move/resize/maximize contract
//! - **Input** — pointer, keyboard (xkb-translated) and touch, routed per
//!   surface and exposed as pollable snapshots
//! - **Cycle** — one bounded read/dispatch iteration the host calls at its
//!   own tick rate; no background threads
//!
//! ```no_run
//! use std::time::Duration;
//! use waybridge::{Backend, Config, Rect, Rgba8, WindowHooks};
//!
//! # fn main() -> Result<(), waybridge::BackendError> {
//! let mut backend = Backend::connect(Config::from_env()?)?;
//! let window = backend.create_window(320, 240, "demo", WindowHooks::default())?;
//!
//! let frame = vec![Rgba8::rgb(0x20, 0x20, 0x20); 320 * 240];
//! backend.flush(window, Rect::new(0, 0, 320, 240), &frame)?;
//!
//! while backend.is_window_open(window) {
//!     backend.cycle(Duration::from_millis(1))?;
//! }
//! backend.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod app;
pub mod config;
pub mod decoration;
pub mod error;
pub mod input;
pub mod object;
pub mod pixel;
pub mod shell;
pub mod window;

pub use app::{Backend, CYCLE_PERIOD};
pub use config::Config;
pub use error::BackendError;
pub use input::keys;
pub use object::{InputState, KeyboardSnapshot, PointerSnapshot, TouchSnapshot};
pub use pixel::{Rect, Rgba8, BYTES_PER_PIXEL};
pub use shell::ResizeEdge;
pub use window::{WindowHooks, WindowId};

/// Crate version, as baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
