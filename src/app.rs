//! Connection lifecycle, event routing and the read/dispatch cycle
//!
//! [`Backend`] is the host-facing entry point: it owns the connection, the
//! event queue and the [`Application`] dispatch state. The host drives it
//! strictly from one thread:
//!
//! - [`Backend::connect`] discovers globals and negotiates a pixel format
//! - [`Backend::create_window`] runs the two-phase window handshake
//! - [`Backend::flush`] pushes rendered pixels
//! - [`Backend::cycle`] runs one bounded read/dispatch iteration
//!
//! All protocol events funnel into `Application`, whose fields are kept
//! disjoint so handlers can update windows, focus and globals without
//! fighting the borrow checker.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use log::{debug, error, info, warn};
use memmap2::MmapOptions;
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_keyboard::{self, WlKeyboard};
use wayland_client::protocol::wl_pointer::{self, WlPointer};
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_client::protocol::wl_shell::WlShell;
use wayland_client::protocol::wl_shell_surface::{self, WlShellSurface};
use wayland_client::protocol::wl_shm::{self, WlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool;
use wayland_client::protocol::wl_subcompositor::WlSubcompositor;
use wayland_client::protocol::wl_subsurface::WlSubsurface;
use wayland_client::protocol::wl_surface::{self, WlSurface};
use wayland_client::protocol::wl_touch::{self, WlTouch};
use wayland_client::{
    delegate_noop, Connection, Dispatch, DispatchError, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_cursor::CursorTheme;
use wayland_protocols::xdg::shell::client::xdg_surface::{self, XdgSurface};
use wayland_protocols::xdg::shell::client::xdg_toplevel::{self, XdgToplevel};
use wayland_protocols::xdg::shell::client::xdg_wm_base::{self, XdgWmBase};

use crate::allocator::BufferPool;
use crate::config::Config;
use crate::decoration;
use crate::error::BackendError;
use crate::input::{FocusState, SeatDevices, XkbState, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use crate::object::{
    GraphicObject, InputState, KeyboardSnapshot, ObjectKind, ObjectRef, PointerSnapshot,
    SurfaceRole, TouchSnapshot,
};
use crate::pixel::{self, Rect, Rgba8};
use crate::shell;
use crate::window::{CloseVerdict, LifecycleFlags, Window, WindowHooks, WindowId};

/// Suggested pacing for the host's cycle loop.
pub const CYCLE_PERIOD: Duration = Duration::from_millis(1);

/// Size (in pixels) at which the cursor theme is loaded.
const CURSOR_SIZE: u32 = 32;

/// Globals discovered through the registry.
#[derive(Debug, Default)]
struct Globals {
    compositor: Option<WlCompositor>,
    subcompositor: Option<WlSubcompositor>,
    shm: Option<WlShm>,
    seat: Option<WlSeat>,
    wl_shell: Option<WlShell>,
    xdg_wm: Option<XdgWmBase>,
    /// Best advertised wl_shm format usable at the active colour depth.
    format: Option<wl_shm::Format>,
}

/// Dispatch state: everything the event handlers read and write.
pub struct Application {
    cfg: Config,
    globals: Globals,
    devices: SeatDevices,
    xkb: XkbState,
    cursor_theme: Option<CursorTheme>,
    cursor_surface: Option<WlSurface>,
    cursor_flush_pending: bool,
    windows: Vec<Window>,
    focus: FocusState,
}

impl Application {
    fn new(cfg: Config) -> Self {
        Self {
            cfg,
            globals: Globals::default(),
            devices: SeatDevices::default(),
            xkb: XkbState::new(),
            cursor_theme: None,
            cursor_surface: None,
            cursor_flush_pending: false,
            windows: Vec::new(),
            focus: FocusState::default(),
        }
    }

    /// Object reference a surface routes to, if it is one of ours.
    fn surface_object(surface: &WlSurface) -> Option<ObjectRef> {
        match surface.data::<SurfaceRole>() {
            Some(SurfaceRole::Object(obj)) => Some(*obj),
            _ => None,
        }
    }

    fn set_cursor(&mut self, pointer: &WlPointer, serial: u32, name: &str) {
        let Some(theme) = self.cursor_theme.as_mut() else {
            return;
        };
        let Some(surface) = self.cursor_surface.clone() else {
            return;
        };
        let Some(cursor) = theme.get_cursor(name) else {
            debug!("cursor \"{}\" missing from theme", name);
            return;
        };
        let image = &cursor[0];
        let (hx, hy) = image.hotspot();
        pointer.set_cursor(serial, Some(&surface), hx as i32, hy as i32);
        surface.attach(Some(&**image), 0, 0);
        let (w, h) = image.dimensions();
        surface.damage(0, 0, w as i32, h as i32);
        surface.commit();
        self.cursor_flush_pending = true;
    }

    /// Apply a shell-proposed toplevel size, minus chrome insets, through
    /// the resize path. Sizes of zero mean "you pick" and keep the current
    /// dimensions.
    fn handle_configure(
        &mut self,
        window_idx: usize,
        qh: &QueueHandle<Self>,
        mut width: i32,
        mut height: i32,
        maximized: Option<bool>,
    ) {
        let Some(shm) = self.globals.shm.clone() else {
            return;
        };
        let Some(format) = self.globals.format else {
            return;
        };
        let chrome = !self.cfg.disable_decorations;
        let Some(window) = self.windows.get_mut(window_idx) else {
            return;
        };
        if !window.flags.live() {
            return;
        }
        if let Some(maximized) = maximized {
            window.flags.maximized = maximized;
        }
        if width <= 0 || height <= 0 {
            return;
        }
        if chrome {
            let (dx, dy) = decoration::frame_insets();
            width -= dx as i32;
            height -= dy as i32;
        }
        let proposed = (width.max(1) as u32, height.max(1) as u32);
        if !shell::configure_requires_resize((window.width, window.height), proposed) {
            return;
        }
        if let Err(e) = window.resize(&shm, format, qh, chrome, proposed.0, proposed.1) {
            error!("configure resize to {}x{} failed: {}", proposed.0, proposed.1, e);
            return;
        }
        window.body.surface.commit();
        window.flags.flush_pending = true;
    }

    fn on_pointer_button(&mut self, serial: u32, button: u32, state: InputState) {
        let Some(obj) = self.focus.pointer else {
            return;
        };
        let Some(seat) = self.globals.seat.clone() else {
            return;
        };
        let Some(window) = self.windows.get_mut(obj.window) else {
            return;
        };
        if !window.flags.live() {
            return;
        }
        let pressed = state == InputState::Pressed;

        match obj.kind {
            ObjectKind::Body => {
                let snapshot = &mut window.body.input.pointer;
                match button {
                    BTN_LEFT => snapshot.left = state,
                    BTN_RIGHT => snapshot.right = state,
                    BTN_MIDDLE => snapshot.wheel = state,
                    _ => {}
                }
            }
            ObjectKind::Titlebar if button == BTN_LEFT && pressed => {
                if let Some(shell) = window.shell.as_ref() {
                    shell.request_move(&seat, serial);
                }
            }
            ObjectKind::ButtonClose if button == BTN_LEFT && !pressed => {
                window.flags.shall_close = true;
            }
            ObjectKind::ButtonMaximize if button == BTN_LEFT && !pressed => {
                // Optimistic: the configure that follows is the source of
                // truth and corrects the flag if the compositor refuses.
                window.flags.maximized = !window.flags.maximized;
                if let Some(shell) = window.shell.as_ref() {
                    shell.set_maximized(window.flags.maximized);
                }
            }
            ObjectKind::ButtonMinimize if button == BTN_LEFT && !pressed => {
                if let Some(shell) = window.shell.as_ref() {
                    shell.set_minimized();
                }
            }
            kind if kind.is_border() && button == BTN_LEFT && pressed => {
                if window.flags.maximized {
                    return;
                }
                let Some((x, y, w, h)) = window
                    .object_mut(kind)
                    .map(|o| (o.input.pointer.x, o.input.pointer.y, o.width, o.height))
                else {
                    return;
                };
                if let Some(edge) = decoration::hit_test(kind, x, y, w, h) {
                    if let Some(shell) = window.shell.as_ref() {
                        shell.request_resize(&seat, serial, edge);
                    }
                }
            }
            _ => {}
        }
    }

    /// Chrome actions shared by touch-up and, indirectly, pointer release.
    fn on_touch_up(&mut self) {
        let Some(obj) = self.focus.touch.take() else {
            return;
        };
        let Some(window) = self.windows.get_mut(obj.window) else {
            return;
        };
        if !window.flags.live() {
            return;
        }
        if let Some(object) = window.object_mut(obj.kind) {
            object.input.touch.state = InputState::Released;
        }
        match obj.kind {
            ObjectKind::ButtonClose => window.flags.shall_close = true,
            ObjectKind::ButtonMaximize => {
                window.flags.maximized = !window.flags.maximized;
                if let Some(shell) = window.shell.as_ref() {
                    shell.set_maximized(window.flags.maximized);
                }
            }
            ObjectKind::ButtonMinimize => {
                if let Some(shell) = window.shell.as_ref() {
                    shell.set_minimized();
                }
            }
            _ => {}
        }
    }

    /// Turn pending close requests into destroyed tombstones. Returns
    /// whether any window was torn down (the socket then needs a flush).
    fn reconcile_closes(&mut self) -> bool {
        let mut any = false;
        for idx in 0..self.windows.len() {
            let window = &mut self.windows[idx];
            match window.flags.reconcile_close(&mut window.hooks) {
                CloseVerdict::Idle => {}
                CloseVerdict::Vetoed => {
                    debug!("close of window {} vetoed by host", idx);
                }
                CloseVerdict::Destroy => {
                    window.destroy();
                    self.focus.clear_window(idx);
                    any = true;
                }
            }
        }
        any
    }
}

impl Dispatch<WlRegistry, ()> for Application {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match interface.as_str() {
                "wl_compositor" => {
                    state.globals.compositor =
                        Some(registry.bind::<WlCompositor, _, _>(name, 1, qh, ()));
                }
                "wl_subcompositor" => {
                    state.globals.subcompositor =
                        Some(registry.bind::<WlSubcompositor, _, _>(name, 1, qh, ()));
                }
                "wl_shm" => {
                    let shm = registry.bind::<WlShm, _, _>(name, 1, qh, ());
                    match CursorTheme::load(conn, shm.clone(), CURSOR_SIZE) {
                        Ok(theme) => state.cursor_theme = Some(theme),
                        Err(e) => warn!("cursor theme unavailable: {}", e),
                    }
                    state.globals.shm = Some(shm);
                }
                "wl_seat" => {
                    state.globals.seat =
                        Some(registry.bind::<WlSeat, _, _>(name, version.min(5), qh, ()));
                }
                "wl_shell" => {
                    state.globals.wl_shell =
                        Some(registry.bind::<WlShell, _, _>(name, 1, qh, ()));
                }
                "xdg_wm_base" => {
                    state.globals.xdg_wm =
                        Some(registry.bind::<XdgWmBase, _, _>(name, 1, qh, ()));
                }
                _ => {}
            },
            wl_registry::Event::GlobalRemove { name } => {
                debug!("global {} removed", name);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlShm, ()> for Application {
    fn event(
        state: &mut Self,
        _: &WlShm,
        event: wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format {
            format: WEnum::Value(format),
        } = event
        {
            // Keep the most preferred format the compositor offers.
            if let Some(rank) = pixel::format_rank(format) {
                let current = state
                    .globals
                    .format
                    .and_then(pixel::format_rank)
                    .unwrap_or(usize::MAX);
                if rank < current {
                    state.globals.format = Some(format);
                }
            }
        }
    }
}

impl Dispatch<WlSeat, ()> for Application {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(caps),
        } = event
        else {
            return;
        };

        let has_pointer = caps.contains(wl_seat::Capability::Pointer);
        if has_pointer && state.devices.pointer.is_none() {
            state.devices.pointer = Some(seat.get_pointer(qh, ()));
            if state.cursor_surface.is_none() {
                if let Some(compositor) = state.globals.compositor.as_ref() {
                    state.cursor_surface =
                        Some(compositor.create_surface(qh, SurfaceRole::Cursor));
                }
            }
            debug!("seat gained pointer");
        } else if !has_pointer {
            if let Some(pointer) = state.devices.pointer.take() {
                if pointer.version() >= 3 {
                    pointer.release();
                }
                debug!("seat lost pointer");
            }
            if let Some(surface) = state.cursor_surface.take() {
                surface.destroy();
            }
            state.focus.pointer = None;
        }

        let has_keyboard = caps.contains(wl_seat::Capability::Keyboard);
        if has_keyboard && state.devices.keyboard.is_none() {
            state.devices.keyboard = Some(seat.get_keyboard(qh, ()));
            debug!("seat gained keyboard");
        } else if !has_keyboard {
            if let Some(keyboard) = state.devices.keyboard.take() {
                if keyboard.version() >= 3 {
                    keyboard.release();
                }
                debug!("seat lost keyboard");
            }
            state.focus.keyboard = None;
        }

        let has_touch = caps.contains(wl_seat::Capability::Touch);
        if has_touch && state.devices.touch.is_none() {
            state.devices.touch = Some(seat.get_touch(qh, ()));
            debug!("seat gained touch");
        } else if !has_touch {
            if let Some(touch) = state.devices.touch.take() {
                if touch.version() >= 3 {
                    touch.release();
                }
                debug!("seat lost touch");
            }
            state.focus.touch = None;
        }
    }
}

impl Dispatch<WlPointer, ()> for Application {
    fn event(
        state: &mut Self,
        pointer: &WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                let Some(obj) = Self::surface_object(&surface) else {
                    return;
                };
                state.focus.pointer = Some(obj);
                let (x, y) = (surface_x as i32, surface_y as i32);

                let mut cursor = "left_ptr";
                if let Some(window) = state.windows.get_mut(obj.window) {
                    let maximized = window.flags.maximized;
                    if let Some(object) = window.object_mut(obj.kind) {
                        object.input.pointer.x = x;
                        object.input.pointer.y = y;
                        cursor = decoration::cursor_name(
                            obj.kind,
                            x,
                            y,
                            object.width,
                            object.height,
                            maximized,
                        );
                    }
                }
                state.set_cursor(pointer, serial, cursor);
            }
            wl_pointer::Event::Leave { .. } => {
                state.focus.pointer = None;
            }
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => {
                let Some(obj) = state.focus.pointer else {
                    return;
                };
                let Some(window) = state.windows.get_mut(obj.window) else {
                    return;
                };
                if let Some(object) = window.object_mut(obj.kind) {
                    let max_x = object.width.max(1) as i32 - 1;
                    let max_y = object.height.max(1) as i32 - 1;
                    object.input.pointer.x = (surface_x as i32).clamp(0, max_x);
                    object.input.pointer.y = (surface_y as i32).clamp(0, max_y);
                }
            }
            wl_pointer::Event::Button {
                serial,
                button,
                state: WEnum::Value(button_state),
                ..
            } => {
                let input_state = match button_state {
                    wl_pointer::ButtonState::Pressed => InputState::Pressed,
                    _ => InputState::Released,
                };
                state.on_pointer_button(serial, button, input_state);
            }
            wl_pointer::Event::Axis {
                axis: WEnum::Value(wl_pointer::Axis::VerticalScroll),
                value,
                ..
            } => {
                let Some(obj) = state.focus.pointer else {
                    return;
                };
                if let Some(window) = state.windows.get_mut(obj.window) {
                    if let Some(object) = window.object_mut(obj.kind) {
                        object.input.accumulate_wheel(value);
                    }
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlKeyboard, ()> for Application {
    fn event(
        state: &mut Self,
        _: &WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap {
                format: WEnum::Value(wl_keyboard::KeymapFormat::XkbV1),
                fd,
                size,
            } => {
                let file = File::from(fd);
                let map = unsafe {
                    MmapOptions::new()
                        .len(size as usize)
                        .map_copy_read_only(&file)
                };
                match map {
                    Ok(map) => {
                        // The keymap text is NUL-terminated inside the mapping.
                        let end = map.iter().position(|&b| b == 0).unwrap_or(map.len());
                        let text = String::from_utf8_lossy(&map[..end]).into_owned();
                        state.xkb.load_keymap(text);
                    }
                    Err(e) => warn!("cannot map keymap fd: {}", e),
                }
            }
            wl_keyboard::Event::Enter { surface, .. } => {
                state.focus.keyboard = Self::surface_object(&surface);
            }
            wl_keyboard::Event::Leave { .. } => {
                if let Some(obj) = state.focus.keyboard.take() {
                    if let Some(window) = state.windows.get_mut(obj.window) {
                        if let Some(object) = window.object_mut(obj.kind) {
                            object.input.keyboard.state = InputState::Released;
                        }
                    }
                }
            }
            wl_keyboard::Event::Key {
                key,
                state: WEnum::Value(key_state),
                ..
            } => {
                let Some(obj) = state.focus.keyboard else {
                    return;
                };
                // Untranslatable keys leave the snapshot untouched.
                let Some(translated) = state.xkb.translate(key) else {
                    return;
                };
                if let Some(window) = state.windows.get_mut(obj.window) {
                    if let Some(object) = window.object_mut(obj.kind) {
                        object.input.keyboard.key = translated;
                        object.input.keyboard.state = match key_state {
                            wl_keyboard::KeyState::Pressed => InputState::Pressed,
                            _ => InputState::Released,
                        };
                    }
                }
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                state
                    .xkb
                    .update_modifiers(mods_depressed, mods_latched, mods_locked, group);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlTouch, ()> for Application {
    fn event(
        state: &mut Self,
        _: &WlTouch,
        event: wl_touch::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_touch::Event::Down {
                serial, surface, x, y, ..
            } => {
                let Some(obj) = Self::surface_object(&surface) else {
                    return;
                };
                state.focus.touch = Some(obj);
                let Some(seat) = state.globals.seat.clone() else {
                    return;
                };
                let Some(window) = state.windows.get_mut(obj.window) else {
                    return;
                };
                if let Some(object) = window.object_mut(obj.kind) {
                    object.input.touch.x = x as i32;
                    object.input.touch.y = y as i32;
                    object.input.touch.state = InputState::Pressed;
                }
                if obj.kind == ObjectKind::Titlebar {
                    if let Some(shell) = window.shell.as_ref() {
                        shell.request_move(&seat, serial);
                    }
                }
            }
            wl_touch::Event::Up { .. } => {
                state.on_touch_up();
            }
            wl_touch::Event::Motion { x, y, .. } => {
                let Some(obj) = state.focus.touch else {
                    return;
                };
                if let Some(window) = state.windows.get_mut(obj.window) {
                    if let Some(object) = window.object_mut(obj.kind) {
                        object.input.touch.x = x as i32;
                        object.input.touch.y = y as i32;
                    }
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<XdgWmBase, ()> for Application {
    fn event(
        _: &mut Self,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, usize> for Application {
    fn event(
        _: &mut Self,
        xdg_surface: &XdgSurface,
        event: xdg_surface::Event,
        _: &usize,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
        }
    }
}

impl Dispatch<XdgToplevel, usize> for Application {
    fn event(
        state: &mut Self,
        _: &XdgToplevel,
        event: xdg_toplevel::Event,
        window: &usize,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure {
                width,
                height,
                states,
            } => {
                let maximized = states_maximized(&states);
                state.handle_configure(*window, qh, width, height, Some(maximized));
            }
            xdg_toplevel::Event::Close => {
                if let Some(window) = state.windows.get_mut(*window) {
                    window.flags.shall_close = true;
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlShellSurface, usize> for Application {
    fn event(
        state: &mut Self,
        shell_surface: &WlShellSurface,
        event: wl_shell_surface::Event,
        window: &usize,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_shell_surface::Event::Ping { serial } => shell_surface.pong(serial),
            wl_shell_surface::Event::Configure { width, height, .. } => {
                state.handle_configure(*window, qh, width, height, None);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlSurface, SurfaceRole> for Application {
    fn event(
        _: &mut Self,
        _: &WlSurface,
        _: wl_surface::Event,
        _: &SurfaceRole,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

delegate_noop!(Application: ignore WlCompositor);
delegate_noop!(Application: ignore WlSubcompositor);
delegate_noop!(Application: ignore WlShell);
delegate_noop!(Application: ignore WlShmPool);
delegate_noop!(Application: ignore WlSubsurface);
delegate_noop!(Application: ignore WlBuffer);

/// Whether an xdg_toplevel configure state array contains a state under
/// which the window cannot be interactively resized.
fn states_maximized(states: &[u8]) -> bool {
    states.chunks_exact(4).any(|chunk| {
        let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        matches!(
            xdg_toplevel::State::try_from(value),
            Ok(xdg_toplevel::State::Maximized | xdg_toplevel::State::Fullscreen)
        )
    })
}

/// Poll the compositor socket for readability, retrying across signal
/// interruptions. Returns false on timeout.
fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> Result<bool, BackendError> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    loop {
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(BackendError::Socket(err));
        }
        return Ok(rc > 0 && (pfd.revents & libc::POLLIN) != 0);
    }
}

/// Host-facing handle over one compositor connection.
pub struct Backend {
    conn: Connection,
    queue: EventQueue<Application>,
    qh: QueueHandle<Application>,
    app: Application,
}

impl Backend {
    /// Connect to the compositor, discover globals and negotiate a pixel
    /// format. Fails when a mandatory global or a usable format is missing.
    pub fn connect(cfg: Config) -> Result<Self, BackendError> {
        let conn = Connection::connect_to_env()?;
        let mut queue = conn.new_event_queue();
        let qh = queue.handle();

        let display = conn.display();
        let _registry = display.get_registry(&qh, ());

        let mut app = Application::new(cfg);
        // First pass binds globals, second collects format and capability
        // events from the bound globals.
        queue.roundtrip(&mut app)?;
        queue.roundtrip(&mut app)?;

        if app.globals.compositor.is_none() {
            return Err(BackendError::MissingGlobal("wl_compositor"));
        }
        if app.globals.shm.is_none() {
            return Err(BackendError::MissingGlobal("wl_shm"));
        }
        if app.globals.format.is_none() {
            return Err(BackendError::NoPixelFormat);
        }
        if app.globals.xdg_wm.is_none() && app.globals.wl_shell.is_none() {
            return Err(BackendError::NoShell);
        }

        info!(
            "🔌 connected: format {:?}, shell {}",
            app.globals.format,
            if app.globals.xdg_wm.is_some() {
                "xdg-shell"
            } else {
                "wl_shell"
            }
        );

        Ok(Self {
            conn,
            queue,
            qh,
            app,
        })
    }

    /// Create and display a new toplevel window.
    ///
    /// Two-phase: the bare surface is committed and round-tripped so the
    /// shell delivers its initial configure, then chrome and buffers are
    /// built and the first frame committed. A failure mid-way tears the
    /// partial window down and reports the cause.
    pub fn create_window(
        &mut self,
        width: u32,
        height: u32,
        title: &str,
        hooks: WindowHooks,
    ) -> Result<WindowId, BackendError> {
        let compositor = self
            .app
            .globals
            .compositor
            .clone()
            .ok_or(BackendError::MissingGlobal("wl_compositor"))?;
        let shm = self
            .app
            .globals
            .shm
            .clone()
            .ok_or(BackendError::MissingGlobal("wl_shm"))?;
        let format = self.app.globals.format.ok_or(BackendError::NoPixelFormat)?;
        let idx = self.app.windows.len();

        let pool = BufferPool::create(&self.app.cfg.runtime_dir)?;
        let body = GraphicObject::create(
            &compositor,
            None,
            &self.qh,
            ObjectRef {
                window: idx,
                kind: ObjectKind::Body,
            },
            None,
        )?;
        let shell = shell::bind(
            self.app.globals.xdg_wm.as_ref(),
            self.app.globals.wl_shell.as_ref(),
            &body.surface,
            idx,
            title,
            &self.qh,
        )?;
        body.surface.commit();

        self.app.windows.push(Window {
            width,
            height,
            flags: LifecycleFlags::default(),
            shell: Some(shell),
            body,
            decorations: std::array::from_fn(|_| None),
            pool,
            hooks,
            display_bound: false,
        });

        if let Err(e) = self.finish_window(idx, &compositor, &shm, format) {
            if let Some(mut window) = self.app.windows.pop() {
                window.destroy();
            }
            let _ = self.conn.flush();
            return Err(e);
        }

        info!("🪟 window {} \"{}\" created at {}x{}", idx, title, width, height);
        Ok(WindowId(idx))
    }

    fn finish_window(
        &mut self,
        idx: usize,
        compositor: &WlCompositor,
        shm: &WlShm,
        format: wl_shm::Format,
    ) -> Result<(), BackendError> {
        // Wait out the initial configure before attaching any buffer.
        self.queue.roundtrip(&mut self.app)?;

        let chrome = !self.app.cfg.disable_decorations;
        let subcompositor = self.app.globals.subcompositor.clone();
        let Some(window) = self.app.windows.get_mut(idx) else {
            return Err(BackendError::UnknownWindow(idx));
        };

        if chrome {
            let parent = window.body.surface.clone();
            for kind in ObjectKind::DECORATIONS {
                let object = GraphicObject::create(
                    compositor,
                    subcompositor.as_ref(),
                    &self.qh,
                    ObjectRef { window: idx, kind },
                    Some(&parent),
                )?;
                if let Some(slot) = kind.decoration_slot() {
                    window.decorations[slot] = Some(object);
                }
            }
        }

        // The initial configure may already have changed the dimensions.
        let (width, height) = (window.width, window.height);
        window.resize(shm, format, &self.qh, chrome, width, height)?;
        window.body.surface.commit();
        window.display_bound = true;

        self.queue.roundtrip(&mut self.app)?;
        Ok(())
    }

    /// Request a window close. The close hook is not consulted; a host
    /// that closes its own window has already decided.
    pub fn close_window(&mut self, id: WindowId) -> Result<(), BackendError> {
        let window = self
            .app
            .windows
            .get_mut(id.0)
            .ok_or(BackendError::UnknownWindow(id.0))?;
        window.hooks.on_close_request = None;
        window.flags.shall_close = true;
        Ok(())
    }

    /// Whether the window is still displayed (not yet reconciled closed).
    pub fn is_window_open(&self, id: WindowId) -> bool {
        self.app
            .windows
            .get(id.0)
            .map(|w| w.flags.live())
            .unwrap_or(false)
    }

    /// Current body size of a window.
    pub fn window_size(&self, id: WindowId) -> Result<(u32, u32), BackendError> {
        let window = self.window(id)?;
        Ok((window.width, window.height))
    }

    pub fn set_title(&mut self, id: WindowId, title: &str) -> Result<(), BackendError> {
        let window = self.window(id)?;
        if let Some(shell) = window.shell.as_ref() {
            shell.set_title(title);
        }
        Ok(())
    }

    pub fn set_maximized(&mut self, id: WindowId, maximized: bool) -> Result<(), BackendError> {
        let window = self
            .app
            .windows
            .get_mut(id.0)
            .ok_or(BackendError::UnknownWindow(id.0))?;
        window.flags.maximized = maximized;
        if let Some(shell) = window.shell.as_ref() {
            shell.set_maximized(maximized);
        }
        Ok(())
    }

    pub fn minimize(&mut self, id: WindowId) -> Result<(), BackendError> {
        let window = self.window(id)?;
        if let Some(shell) = window.shell.as_ref() {
            shell.set_minimized();
        }
        Ok(())
    }

    /// Copy rendered pixels into the window and commit the damaged area.
    pub fn flush(
        &mut self,
        id: WindowId,
        area: Rect,
        src: &[Rgba8],
    ) -> Result<(), BackendError> {
        let window = self
            .app
            .windows
            .get_mut(id.0)
            .ok_or(BackendError::UnknownWindow(id.0))?;
        window.flush_pixels(area, src);
        Ok(())
    }

    /// Pointer snapshot of the window body.
    pub fn pointer_state(&self, id: WindowId) -> Result<PointerSnapshot, BackendError> {
        Ok(self.window(id)?.body.input.pointer)
    }

    /// Wheel button state plus accumulated ticks; draining resets the
    /// accumulator.
    pub fn wheel_state(&mut self, id: WindowId) -> Result<(InputState, i16), BackendError> {
        let window = self
            .app
            .windows
            .get_mut(id.0)
            .ok_or(BackendError::UnknownWindow(id.0))?;
        let pressed = window.body.input.pointer.wheel;
        let ticks = window.body.input.take_wheel();
        Ok((pressed, ticks))
    }

    /// Keyboard snapshot of the window body.
    pub fn keyboard_state(&self, id: WindowId) -> Result<KeyboardSnapshot, BackendError> {
        Ok(self.window(id)?.body.input.keyboard)
    }

    /// Touch snapshot of the window body.
    pub fn touch_state(&self, id: WindowId) -> Result<TouchSnapshot, BackendError> {
        Ok(self.window(id)?.body.input.touch)
    }

    /// One iteration of the read/dispatch cycle, bounded by `timeout`.
    ///
    /// Order: drain already-queued events, reconcile pending closes, flush
    /// the socket if anything is outstanding, then wait for and read new
    /// events. Call this regularly ([`CYCLE_PERIOD`] is a good pace).
    pub fn cycle(&mut self, timeout: Duration) -> Result<(), BackendError> {
        let guard = loop {
            match self.queue.prepare_read() {
                Some(guard) => break guard,
                None => {
                    self.queue.dispatch_pending(&mut self.app)?;
                }
            }
        };

        let mut shall_flush = self.app.reconcile_closes();
        shall_flush |= std::mem::take(&mut self.app.cursor_flush_pending);
        for window in &mut self.app.windows {
            shall_flush |= std::mem::take(&mut window.flags.flush_pending);
        }
        if shall_flush {
            self.conn.flush().map_err(DispatchError::Backend)?;
        }

        if wait_readable(guard.connection_fd(), timeout)? {
            guard.read().map_err(DispatchError::Backend)?;
            self.queue.dispatch_pending(&mut self.app)?;
        } else {
            drop(guard);
        }
        Ok(())
    }

    /// Tear down every window and release the seat devices, then drop the
    /// connection.
    pub fn shutdown(mut self) {
        for window in &mut self.app.windows {
            window.destroy();
        }
        if let Some(pointer) = self.app.devices.pointer.take() {
            if pointer.version() >= 3 {
                pointer.release();
            }
        }
        if let Some(keyboard) = self.app.devices.keyboard.take() {
            if keyboard.version() >= 3 {
                keyboard.release();
            }
        }
        if let Some(touch) = self.app.devices.touch.take() {
            if touch.version() >= 3 {
                touch.release();
            }
        }
        if let Some(surface) = self.app.cursor_surface.take() {
            surface.destroy();
        }
        if let Some(seat) = self.app.globals.seat.take() {
            if seat.version() >= 5 {
                seat.release();
            }
        }
        if let Some(wm_base) = self.app.globals.xdg_wm.take() {
            wm_base.destroy();
        }
        if let Some(subcompositor) = self.app.globals.subcompositor.take() {
            subcompositor.destroy();
        }
        let _ = self.conn.flush();
        info!("👋 backend shut down");
    }

    fn window(&self, id: WindowId) -> Result<&Window, BackendError> {
        self.app
            .windows
            .get(id.0)
            .ok_or(BackendError::UnknownWindow(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_bytes(states: &[xdg_toplevel::State]) -> Vec<u8> {
        states
            .iter()
            .flat_map(|s| (*s as u32).to_ne_bytes())
            .collect()
    }

    #[test]
    fn maximized_and_fullscreen_states_are_detected() {
        assert!(states_maximized(&state_bytes(&[
            xdg_toplevel::State::Activated,
            xdg_toplevel::State::Maximized,
        ])));
        assert!(states_maximized(&state_bytes(&[
            xdg_toplevel::State::Fullscreen
        ])));
        assert!(!states_maximized(&state_bytes(&[
            xdg_toplevel::State::Activated
        ])));
        assert!(!states_maximized(&[]));
    }

    #[test]
    fn unknown_state_values_are_ignored() {
        let mut bytes = state_bytes(&[xdg_toplevel::State::Maximized]);
        bytes.extend(0xdead_beefu32.to_ne_bytes());
        assert!(states_maximized(&bytes));
    }
}
