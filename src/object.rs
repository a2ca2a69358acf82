//! Graphic objects: displayable surfaces with per-surface input state
//!
//! A window is composed of one body object and up to eight decoration
//! objects. Every object owns its surface (decorations additionally a
//! desynchronized subsurface), at most one buffer, and its own input
//! snapshot, so events landing on chrome never leak into the body's
//! polled state.

use log::error;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_subcompositor::WlSubcompositor;
use wayland_client::protocol::wl_subsurface::WlSubsurface;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Dispatch, QueueHandle};

use crate::allocator::{BufferHandle, BufferPool};
use crate::error::BackendError;

/// Number of decoration objects a window can carry.
pub const NUM_DECORATIONS: usize = 8;

/// What a surface displays; fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Body,
    Titlebar,
    ButtonClose,
    ButtonMaximize,
    ButtonMinimize,
    BorderTop,
    BorderBottom,
    BorderLeft,
    BorderRight,
}

impl ObjectKind {
    /// Decoration kinds in creation/attachment order.
    pub const DECORATIONS: [ObjectKind; NUM_DECORATIONS] = [
        ObjectKind::Titlebar,
        ObjectKind::ButtonClose,
        ObjectKind::ButtonMaximize,
        ObjectKind::ButtonMinimize,
        ObjectKind::BorderTop,
        ObjectKind::BorderBottom,
        ObjectKind::BorderLeft,
        ObjectKind::BorderRight,
    ];

    pub fn is_decoration(self) -> bool {
        self != ObjectKind::Body
    }

    pub fn is_border(self) -> bool {
        matches!(
            self,
            ObjectKind::BorderTop
                | ObjectKind::BorderBottom
                | ObjectKind::BorderLeft
                | ObjectKind::BorderRight
        )
    }

    /// Slot of a decoration kind in a window's decoration array.
    pub fn decoration_slot(self) -> Option<usize> {
        Self::DECORATIONS.iter().position(|k| *k == self)
    }
}

/// Identifies one graphic object across the window collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef {
    pub window: usize,
    pub kind: ObjectKind,
}

/// User data attached to every surface we create; fixes the
/// surface-to-object association for event routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    /// The shared cursor surface; never routes input.
    Cursor,
    Object(ObjectRef),
}

/// Pressed/released state of a key, button or touch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Released,
    Pressed,
}

/// Most recent pointer state scoped to one object.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerSnapshot {
    pub x: i32,
    pub y: i32,
    pub left: InputState,
    pub right: InputState,
    pub wheel: InputState,
    /// Accumulated signed wheel ticks; reset only when polled.
    pub wheel_delta: i16,
}

/// Most recent keyboard state scoped to one object.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyboardSnapshot {
    pub key: u32,
    pub state: InputState,
}

/// Most recent touch state scoped to one object.
#[derive(Debug, Clone, Copy, Default)]
pub struct TouchSnapshot {
    pub x: i32,
    pub y: i32,
    pub state: InputState,
}

/// Per-object input snapshot consumed by the host's poll callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub pointer: PointerSnapshot,
    pub keyboard: KeyboardSnapshot,
    pub touch: TouchSnapshot,
}

impl InputSnapshot {
    /// Fold one axis event into the wheel accumulator.
    pub fn accumulate_wheel(&mut self, value: f64) {
        if value > 0.0 {
            self.pointer.wheel_delta += 1;
        } else if value < 0.0 {
            self.pointer.wheel_delta -= 1;
        }
    }

    /// Drain the wheel accumulator (poll semantics).
    pub fn take_wheel(&mut self) -> i16 {
        std::mem::take(&mut self.pointer.wheel_delta)
    }

    /// Zero every exposed value, releasing all buttons and keys.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A displayable surface, optionally subsurface-positioned under a parent.
#[derive(Debug)]
pub struct GraphicObject {
    pub kind: ObjectKind,
    pub width: u32,
    pub height: u32,
    pub surface: WlSurface,
    pub subsurface: Option<WlSubsurface>,
    pub buffer: Option<BufferHandle>,
    pub input: InputSnapshot,
}

impl GraphicObject {
    /// Create a surface for `role`; with a parent, also a desynchronized
    /// subsurface so decorations commit independently of the body.
    pub fn create<D>(
        compositor: &WlCompositor,
        subcompositor: Option<&WlSubcompositor>,
        qh: &QueueHandle<D>,
        reference: ObjectRef,
        parent: Option<&WlSurface>,
    ) -> Result<Self, BackendError>
    where
        D: Dispatch<WlSurface, SurfaceRole> + Dispatch<WlSubsurface, ()> + 'static,
    {
        let surface = compositor.create_surface(qh, SurfaceRole::Object(reference));

        let subsurface = match parent {
            Some(parent_surface) => {
                let Some(subcompositor) = subcompositor else {
                    error!("cannot create subsurface: wl_subcompositor not available");
                    surface.destroy();
                    return Err(BackendError::MissingGlobal("wl_subcompositor"));
                };
                let subsurface = subcompositor.get_subsurface(&surface, parent_surface, qh, ());
                subsurface.set_desync();
                Some(subsurface)
            }
            None => None,
        };

        Ok(Self {
            kind: reference.kind,
            width: 0,
            height: 0,
            surface,
            subsurface,
            buffer: None,
            input: InputSnapshot::default(),
        })
    }

    /// Return the buffer to the pool, if any is attached.
    pub fn release_buffer(&mut self, pool: &mut BufferPool) {
        if let Some(buffer) = self.buffer.take() {
            pool.deallocate(buffer);
        }
    }

    /// Destroy protocol objects. The struct stays behind as a tombstone;
    /// callers gate further operations on the window's closed flag.
    pub fn destroy(&mut self, pool: &mut BufferPool) {
        self.release_buffer(pool);
        if let Some(subsurface) = self.subsurface.take() {
            subsurface.destroy();
        }
        self.surface.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_accumulates_and_resets_on_poll() {
        let mut input = InputSnapshot::default();
        input.accumulate_wheel(1.0);
        input.accumulate_wheel(2.5);
        input.accumulate_wheel(0.1);
        assert_eq!(input.take_wheel(), 3);
        assert_eq!(input.take_wheel(), 0);
    }

    #[test]
    fn wheel_mixes_signs() {
        let mut input = InputSnapshot::default();
        input.accumulate_wheel(1.0);
        input.accumulate_wheel(-1.0);
        input.accumulate_wheel(-1.0);
        assert_eq!(input.take_wheel(), -1);
    }

    #[test]
    fn zero_axis_value_is_ignored() {
        let mut input = InputSnapshot::default();
        input.accumulate_wheel(0.0);
        assert_eq!(input.take_wheel(), 0);
    }

    #[test]
    fn decoration_slots_are_stable() {
        assert_eq!(ObjectKind::Titlebar.decoration_slot(), Some(0));
        assert_eq!(ObjectKind::BorderRight.decoration_slot(), Some(7));
        assert_eq!(ObjectKind::Body.decoration_slot(), None);
    }

    #[test]
    fn reset_releases_everything() {
        let mut input = InputSnapshot::default();
        input.pointer.left = InputState::Pressed;
        input.keyboard.key = 42;
        input.touch.state = InputState::Pressed;
        input.reset();
        assert_eq!(input.pointer.left, InputState::Released);
        assert_eq!(input.keyboard.key, 0);
        assert_eq!(input.touch.state, InputState::Released);
    }
}
