//! Window composite: body, chrome, buffer pool and lifecycle
//!
//! A window ties together one body object, its optional decoration objects,
//! the shared-memory pool backing all of their buffers, the shell backend
//! giving it toplevel semantics, and the host-provided hooks. Closing is
//! two-phase: anything may raise `shall_close`, and the read/dispatch cycle
//! reconciles it into a destroyed tombstone exactly once.

use log::{debug, trace};
use wayland_client::protocol::wl_shm::{self, WlShm};
use wayland_client::QueueHandle;

use crate::allocator::BufferPool;
use crate::decoration;
use crate::error::BackendError;
use crate::object::{GraphicObject, ObjectKind, NUM_DECORATIONS};
use crate::pixel::{self, Rect, Rgba8};
use crate::shell::ShellBackend;

/// Opaque handle the host uses to address a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub(crate) usize);

/// Host callbacks attached to one window.
///
/// The close hook may veto a close request by returning `false`; the
/// resolution hook fires after every completed resize once the window is
/// fully displayed.
#[derive(Default)]
pub struct WindowHooks {
    pub on_close_request: Option<Box<dyn FnMut() -> bool>>,
    pub on_resolution_change: Option<Box<dyn FnMut(u32, u32)>>,
}

impl std::fmt::Debug for WindowHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowHooks")
            .field("on_close_request", &self.on_close_request.is_some())
            .field("on_resolution_change", &self.on_resolution_change.is_some())
            .finish()
    }
}

/// Lifecycle state advanced by events and reconciled by the cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleFlags {
    /// A close was requested (button, shell event or host call) and awaits
    /// reconciliation.
    pub shall_close: bool,
    /// The window was torn down; the struct is a tombstone.
    pub closed: bool,
    /// Pixels were committed since the last socket flush.
    pub flush_pending: bool,
    /// Last maximize state we requested or were configured into.
    pub maximized: bool,
}

/// Outcome of consulting a window's close state during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseVerdict {
    /// No close pending, or the window is already a tombstone.
    Idle,
    /// The host vetoed; `shall_close` was reset and must be re-raised.
    Vetoed,
    /// The close stands; the caller tears the window down.
    Destroy,
}

impl LifecycleFlags {
    /// Whether events and host calls should still act on this window.
    pub fn live(&self) -> bool {
        !self.closed
    }

    /// Advance a pending close request by one tick: consult the veto hook
    /// and either clear the request or hand the caller a destroy verdict.
    pub fn reconcile_close(&mut self, hooks: &mut WindowHooks) -> CloseVerdict {
        if !self.shall_close || self.closed {
            return CloseVerdict::Idle;
        }
        let vetoed = match hooks.on_close_request.as_mut() {
            Some(hook) => !hook(),
            None => false,
        };
        if vetoed {
            self.shall_close = false;
            return CloseVerdict::Vetoed;
        }
        CloseVerdict::Destroy
    }
}

/// One toplevel window and everything it owns.
#[derive(Debug)]
pub struct Window {
    pub width: u32,
    pub height: u32,
    pub flags: LifecycleFlags,
    pub shell: Option<Box<dyn ShellBackend>>,
    pub body: GraphicObject,
    pub decorations: [Option<GraphicObject>; NUM_DECORATIONS],
    pub pool: BufferPool,
    pub hooks: WindowHooks,
    /// Set once the initial configure/commit handshake completed; gates the
    /// resolution hook and pointer clamping.
    pub display_bound: bool,
}

impl Window {
    /// Graphic object for `kind`, if the window has it.
    pub fn object_mut(&mut self, kind: ObjectKind) -> Option<&mut GraphicObject> {
        if kind.is_decoration() {
            self.decorations[kind.decoration_slot()?].as_mut()
        } else {
            Some(&mut self.body)
        }
    }

    /// Reallocate all buffers for a new body size and repaint the chrome.
    ///
    /// Old buffers are returned to the pool first so the new ones reuse the
    /// reclaimed tail where possible. With `chrome` the decorations are
    /// repainted and repositioned around the new body.
    pub fn resize<D>(
        &mut self,
        shm: &WlShm,
        format: wl_shm::Format,
        qh: &QueueHandle<D>,
        chrome: bool,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>
    where
        D: wayland_client::Dispatch<wayland_client::protocol::wl_shm_pool::WlShmPool, ()>
            + wayland_client::Dispatch<wayland_client::protocol::wl_buffer::WlBuffer, ()>
            + 'static,
    {
        trace!("resizing window to {}x{}", width, height);

        for slot in self.decorations.iter_mut().flatten() {
            slot.release_buffer(&mut self.pool);
        }
        self.body.release_buffer(&mut self.pool);

        let buffer = self.pool.allocate(shm, format, qh, width, height)?;
        self.body.surface.attach(Some(buffer.wl_buffer()), 0, 0);
        self.body.buffer = Some(buffer);
        self.body.width = width;
        self.body.height = height;
        self.width = width;
        self.height = height;

        if chrome {
            for slot in 0..NUM_DECORATIONS {
                let Some(object) = self.decorations[slot].as_mut() else {
                    continue;
                };
                let Some(p) = decoration::placement(object.kind, width, height) else {
                    continue;
                };
                let mut buffer = self.pool.allocate(shm, format, qh, p.width, p.height)?;
                decoration::paint(object.kind, p.width, p.height, buffer.bytes_mut());
                object.surface.attach(Some(buffer.wl_buffer()), 0, 0);
                object
                    .surface
                    .damage(0, 0, p.width as i32, p.height as i32);
                if let Some(subsurface) = object.subsurface.as_ref() {
                    subsurface.set_position(p.x, p.y);
                }
                object.surface.commit();
                object.buffer = Some(buffer);
                object.width = p.width;
                object.height = p.height;
            }
        }

        if self.display_bound {
            // Keep the polled pointer position inside the new body.
            let pointer = &mut self.body.input.pointer;
            pointer.x = pointer.x.clamp(0, width as i32 - 1);
            pointer.y = pointer.y.clamp(0, height as i32 - 1);

            if let Some(hook) = self.hooks.on_resolution_change.as_mut() {
                hook(width, height);
            }
        }

        Ok(())
    }

    /// Copy rendered pixels into the body buffer and commit the damage.
    ///
    /// The socket flush itself is deferred to the next cycle via the
    /// `flush_pending` flag. Quietly succeeds on a tombstone so a host
    /// render in flight during a close never errors.
    pub fn flush_pixels(&mut self, area: Rect, src: &[Rgba8]) {
        if !self.flags.live() {
            return;
        }
        let (width, height) = (self.width, self.height);
        let Some(buffer) = self.body.buffer.as_mut() else {
            return;
        };

        pixel::blit(buffer.bytes_mut(), width, height, area, src);
        self.body.surface.attach(Some(buffer.wl_buffer()), 0, 0);
        self.body
            .surface
            .damage(area.x, area.y, area.width as i32, area.height as i32);
        self.body.surface.commit();
        self.flags.flush_pending = true;
    }

    /// Tear the window down into a tombstone. Idempotent.
    pub fn destroy(&mut self) {
        if self.flags.closed {
            return;
        }
        debug!("destroying window ({}x{})", self.width, self.height);

        if let Some(shell) = self.shell.take() {
            shell.release();
        }
        for slot in self.decorations.iter_mut().flatten() {
            slot.destroy(&mut self.pool);
        }
        self.body.destroy(&mut self.pool);
        self.pool.release();

        self.body.input.reset();
        self.hooks = WindowHooks::default();
        self.flags.closed = true;
        self.flags.flush_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_are_live() {
        let flags = LifecycleFlags::default();
        assert!(flags.live());
        assert!(!flags.shall_close);
        assert!(!flags.flush_pending);
    }

    #[test]
    fn close_request_does_not_kill_by_itself() {
        // Raising shall_close leaves the window live until reconciled.
        let mut flags = LifecycleFlags::default();
        flags.shall_close = true;
        assert!(flags.live());

        flags.closed = true;
        assert!(!flags.live());
    }

    #[test]
    fn veto_keeps_the_window_and_clears_the_request() {
        let mut flags = LifecycleFlags::default();
        flags.shall_close = true;
        let mut hooks = WindowHooks {
            on_close_request: Some(Box::new(|| false)),
            on_resolution_change: None,
        };

        assert_eq!(flags.reconcile_close(&mut hooks), CloseVerdict::Vetoed);
        assert!(flags.live());
        assert!(!flags.shall_close);

        // Until the close is re-requested, reconciliation is a no-op.
        assert_eq!(flags.reconcile_close(&mut hooks), CloseVerdict::Idle);

        flags.shall_close = true;
        assert_eq!(flags.reconcile_close(&mut hooks), CloseVerdict::Vetoed);
    }

    #[test]
    fn accepted_close_yields_a_destroy_verdict() {
        let mut flags = LifecycleFlags::default();
        flags.shall_close = true;
        let mut hooks = WindowHooks {
            on_close_request: Some(Box::new(|| true)),
            on_resolution_change: None,
        };

        assert_eq!(flags.reconcile_close(&mut hooks), CloseVerdict::Destroy);
        // The flag stays raised; destruction is the caller's step.
        assert!(flags.shall_close);
    }

    #[test]
    fn close_without_a_hook_is_accepted() {
        let mut flags = LifecycleFlags::default();
        flags.shall_close = true;
        let mut hooks = WindowHooks::default();
        assert_eq!(flags.reconcile_close(&mut hooks), CloseVerdict::Destroy);
    }

    #[test]
    fn tombstones_are_not_reconciled() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut flags = LifecycleFlags::default();
        flags.shall_close = true;
        flags.closed = true;

        let called = Rc::new(Cell::new(false));
        let seen = called.clone();
        let mut hooks = WindowHooks {
            on_close_request: Some(Box::new(move || {
                seen.set(true);
                true
            })),
            on_resolution_change: None,
        };

        assert_eq!(flags.reconcile_close(&mut hooks), CloseVerdict::Idle);
        assert!(!called.get());
    }

    #[test]
    fn hooks_debug_does_not_capture_closures() {
        let hooks = WindowHooks {
            on_close_request: Some(Box::new(|| true)),
            on_resolution_change: None,
        };
        let text = format!("{:?}", hooks);
        assert!(text.contains("on_close_request: true"));
    }
}
