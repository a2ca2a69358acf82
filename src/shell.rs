//! Shell adapters: uniform toplevel semantics over two shell protocols
//!
//! The compositor grants toplevel semantics either through xdg-shell or
//! through the legacy wl_shell. A window binds exactly one backend at
//! creation time, preferring xdg-shell; creation fails when neither global
//! was discovered. Keep-alive pings are answered in the event handlers and
//! never surfaced.

use log::debug;
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::protocol::wl_shell::WlShell;
use wayland_client::protocol::wl_shell_surface::{self, WlShellSurface};
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Dispatch, QueueHandle};
use wayland_protocols::xdg::shell::client::xdg_surface::XdgSurface;
use wayland_protocols::xdg::shell::client::xdg_toplevel::{self, XdgToplevel};
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;

use crate::error::BackendError;

/// Window edge or corner grabbed by an interactive resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    fn to_xdg(self) -> xdg_toplevel::ResizeEdge {
        match self {
            ResizeEdge::Top => xdg_toplevel::ResizeEdge::Top,
            ResizeEdge::Bottom => xdg_toplevel::ResizeEdge::Bottom,
            ResizeEdge::Left => xdg_toplevel::ResizeEdge::Left,
            ResizeEdge::Right => xdg_toplevel::ResizeEdge::Right,
            ResizeEdge::TopLeft => xdg_toplevel::ResizeEdge::TopLeft,
            ResizeEdge::TopRight => xdg_toplevel::ResizeEdge::TopRight,
            ResizeEdge::BottomLeft => xdg_toplevel::ResizeEdge::BottomLeft,
            ResizeEdge::BottomRight => xdg_toplevel::ResizeEdge::BottomRight,
        }
    }

    fn to_wl_shell(self) -> wl_shell_surface::Resize {
        match self {
            ResizeEdge::Top => wl_shell_surface::Resize::Top,
            ResizeEdge::Bottom => wl_shell_surface::Resize::Bottom,
            ResizeEdge::Left => wl_shell_surface::Resize::Left,
            ResizeEdge::Right => wl_shell_surface::Resize::Right,
            ResizeEdge::TopLeft => wl_shell_surface::Resize::TopLeft,
            ResizeEdge::TopRight => wl_shell_surface::Resize::TopRight,
            ResizeEdge::BottomLeft => wl_shell_surface::Resize::BottomLeft,
            ResizeEdge::BottomRight => wl_shell_surface::Resize::BottomRight,
        }
    }
}

/// Uniform move/resize/maximize/minimize/close contract over the two
/// toplevel protocols. All requests are fire-and-forget; their effect is
/// observed later through the configure path.
pub trait ShellBackend: std::fmt::Debug {
    fn set_title(&self, title: &str);
    fn request_move(&self, seat: &WlSeat, serial: u32);
    fn request_resize(&self, seat: &WlSeat, serial: u32, edge: ResizeEdge);
    fn set_maximized(&self, maximized: bool);
    fn set_minimized(&self);
    /// Release the toplevel protocol objects.
    fn release(&self);
}

/// xdg-shell backend: xdg_surface plus xdg_toplevel.
#[derive(Debug)]
pub struct XdgShellBackend {
    xdg_surface: XdgSurface,
    toplevel: XdgToplevel,
}

impl ShellBackend for XdgShellBackend {
    fn set_title(&self, title: &str) {
        self.toplevel.set_title(title.to_owned());
        self.toplevel.set_app_id(title.to_owned());
    }

    fn request_move(&self, seat: &WlSeat, serial: u32) {
        self.toplevel._move(seat, serial);
    }

    fn request_resize(&self, seat: &WlSeat, serial: u32, edge: ResizeEdge) {
        self.toplevel.resize(seat, serial, edge.to_xdg());
    }

    fn set_maximized(&self, maximized: bool) {
        if maximized {
            self.toplevel.set_maximized();
        } else {
            self.toplevel.unset_maximized();
        }
    }

    fn set_minimized(&self) {
        self.toplevel.set_minimized();
    }

    fn release(&self) {
        self.toplevel.destroy();
        self.xdg_surface.destroy();
    }
}

/// Legacy wl_shell backend. Minimize does not exist there and degrades to
/// a no-op.
#[derive(Debug)]
pub struct WlShellBackend {
    shell_surface: WlShellSurface,
}

impl ShellBackend for WlShellBackend {
    fn set_title(&self, title: &str) {
        self.shell_surface.set_title(title.to_owned());
    }

    fn request_move(&self, seat: &WlSeat, serial: u32) {
        self.shell_surface._move(seat, serial);
    }

    fn request_resize(&self, seat: &WlSeat, serial: u32, edge: ResizeEdge) {
        self.shell_surface.resize(seat, serial, edge.to_wl_shell());
    }

    fn set_maximized(&self, maximized: bool) {
        if maximized {
            self.shell_surface.set_maximized(None);
        } else {
            self.shell_surface.set_toplevel();
        }
    }

    fn set_minimized(&self) {
        debug!("minimize requested but wl_shell has no minimize; ignoring");
    }

    fn release(&self) {
        // wl_shell_surface has no destructor request; dropping the proxy
        // handle is all a client can do.
    }
}

/// Bind a toplevel for `surface`, preferring xdg-shell. The window index
/// travels as user data so configure/close events find their window.
pub fn bind<D>(
    xdg_wm: Option<&XdgWmBase>,
    wl_shell: Option<&WlShell>,
    surface: &WlSurface,
    window: usize,
    title: &str,
    qh: &QueueHandle<D>,
) -> Result<Box<dyn ShellBackend>, BackendError>
where
    D: Dispatch<XdgSurface, usize>
        + Dispatch<XdgToplevel, usize>
        + Dispatch<WlShellSurface, usize>
        + 'static,
{
    if let Some(xdg_wm) = xdg_wm {
        let xdg_surface = xdg_wm.get_xdg_surface(surface, qh, window);
        let toplevel = xdg_surface.get_toplevel(qh, window);
        let backend = XdgShellBackend {
            xdg_surface,
            toplevel,
        };
        backend.set_title(title);
        debug!("window {} bound to xdg-shell", window);
        return Ok(Box::new(backend));
    }

    if let Some(wl_shell) = wl_shell {
        let shell_surface = wl_shell.get_shell_surface(surface, qh, window);
        shell_surface.set_toplevel();
        let backend = WlShellBackend { shell_surface };
        backend.set_title(title);
        debug!("window {} bound to wl_shell", window);
        return Ok(Box::new(backend));
    }

    Err(BackendError::NoShell)
}

/// Configure filtering is the shell adapter's job: only a size change
/// reaches the resize path, so resizing to the current size through the
/// public API still repaints.
pub fn configure_requires_resize(current: (u32, u32), proposed: (u32, u32)) -> bool {
    current != proposed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_configure_is_filtered() {
        assert!(!configure_requires_resize((320, 240), (320, 240)));
    }

    #[test]
    fn changed_configure_passes() {
        assert!(configure_requires_resize((320, 240), (320, 241)));
        assert!(configure_requires_resize((320, 240), (640, 240)));
    }
}
