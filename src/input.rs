//! Seat devices, key translation and focus tracking
//!
//! The seat announces its capabilities dynamically; device proxies are
//! acquired and released as capabilities come and go. Keyboard events carry
//! raw scancodes which are translated through the compositor-provided xkb
//! keymap into the control-key space the GUI library consumes. Focus is
//! tracked per input class so each event lands in the snapshot of exactly
//! the object under it.

use log::{debug, warn};
use wayland_client::protocol::wl_keyboard::WlKeyboard;
use wayland_client::protocol::wl_pointer::WlPointer;
use wayland_client::protocol::wl_touch::WlTouch;
use xkbcommon::xkb;

use crate::object::ObjectRef;

/// Linux evdev codes for the pointer buttons we route.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Control-key values expected by the GUI library.
pub mod keys {
    pub const UP: u32 = 17;
    pub const DOWN: u32 = 18;
    pub const RIGHT: u32 = 19;
    pub const LEFT: u32 = 20;
    pub const ESC: u32 = 27;
    pub const DEL: u32 = 127;
    pub const BACKSPACE: u32 = 8;
    pub const ENTER: u32 = 10;
    pub const NEXT: u32 = 9;
    pub const PREV: u32 = 11;
    pub const HOME: u32 = 2;
    pub const END: u32 = 3;
}

/// Translate an xkb keysym into the GUI library's key space.
///
/// Printable ASCII passes through unchanged, keypad digits collapse onto
/// their ASCII digit, and navigation/editing keysyms map onto control-key
/// values. Unmapped keysyms return `None` and leave the previous key state
/// untouched.
pub fn keysym_to_key(sym: u32) -> Option<u32> {
    use xkb::keysyms as ks;

    if (ks::KEY_space..=ks::KEY_asciitilde).contains(&sym) {
        return Some(sym);
    }
    if (ks::KEY_KP_0..=ks::KEY_KP_9).contains(&sym) {
        return Some(sym & 0x003f);
    }

    let key = match sym {
        ks::KEY_BackSpace => keys::BACKSPACE,
        ks::KEY_Return | ks::KEY_KP_Enter => keys::ENTER,
        ks::KEY_Escape => keys::ESC,
        ks::KEY_Delete | ks::KEY_KP_Delete => keys::DEL,
        ks::KEY_Tab | ks::KEY_KP_Tab => keys::NEXT,
        ks::KEY_Next | ks::KEY_KP_Next => keys::NEXT,
        ks::KEY_Prior | ks::KEY_KP_Prior => keys::PREV,
        ks::KEY_Up | ks::KEY_KP_Up => keys::UP,
        ks::KEY_Down | ks::KEY_KP_Down => keys::DOWN,
        ks::KEY_Left | ks::KEY_KP_Left => keys::LEFT,
        ks::KEY_Right | ks::KEY_KP_Right => keys::RIGHT,
        ks::KEY_Home | ks::KEY_KP_Home => keys::HOME,
        ks::KEY_End | ks::KEY_KP_End => keys::END,
        _ => return None,
    };
    Some(key)
}

/// Device proxies currently granted by the seat.
#[derive(Debug, Default)]
pub struct SeatDevices {
    pub pointer: Option<WlPointer>,
    pub keyboard: Option<WlKeyboard>,
    pub touch: Option<WlTouch>,
}

/// Keymap state fed by the compositor.
///
/// Starts empty; the compositor pushes a keymap shortly after the keyboard
/// capability appears, and may replace it at any time (layout switches).
/// Until a keymap arrives, key events cannot be translated and are dropped.
pub struct XkbState {
    context: xkb::Context,
    state: Option<xkb::State>,
}

impl std::fmt::Debug for XkbState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XkbState")
            .field("loaded", &self.state.is_some())
            .finish()
    }
}

impl XkbState {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            state: None,
        }
    }

    /// Compile and atomically swap in a keymap from its text form. The old
    /// keymap stays active if compilation fails.
    pub fn load_keymap(&mut self, text: String) {
        match xkb::Keymap::new_from_string(
            &self.context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        ) {
            Some(keymap) => {
                self.state = Some(xkb::State::new(&keymap));
                debug!("keymap loaded");
            }
            None => warn!("failed to compile keymap; keeping previous one"),
        }
    }

    /// Translate a raw scancode (evdev, offset by 8 per convention) into
    /// the GUI key space. `None` without a keymap or for unmapped keys.
    pub fn translate(&self, scancode: u32) -> Option<u32> {
        let state = self.state.as_ref()?;
        let sym = state.key_get_one_sym((scancode + 8).into());
        keysym_to_key(u32::from(sym))
    }

    /// Feed a modifiers event into the keymap state.
    pub fn update_modifiers(
        &mut self,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    ) {
        if let Some(state) = self.state.as_mut() {
            state.update_mask(depressed, latched, locked, 0, 0, group);
        }
    }
}

impl Default for XkbState {
    fn default() -> Self {
        Self::new()
    }
}

/// The object each input class last entered, if any.
///
/// Enter/leave pairs maintain these; window teardown clears every class
/// still pointing into the destroyed window so stale events cannot reach a
/// tombstone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusState {
    pub pointer: Option<ObjectRef>,
    pub keyboard: Option<ObjectRef>,
    pub touch: Option<ObjectRef>,
}

impl FocusState {
    /// Drop every focus reference into `window`.
    pub fn clear_window(&mut self, window: usize) {
        for slot in [&mut self.pointer, &mut self.keyboard, &mut self.touch] {
            if slot.map(|r| r.window) == Some(window) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;
    use xkb::keysyms as ks;

    #[test]
    fn printable_ascii_passes_through() {
        assert_eq!(keysym_to_key(ks::KEY_space), Some(0x20));
        assert_eq!(keysym_to_key(u32::from(b'a')), Some(u32::from(b'a')));
        assert_eq!(keysym_to_key(ks::KEY_asciitilde), Some(0x7e));
    }

    #[test]
    fn keypad_digits_collapse_to_ascii() {
        assert_eq!(keysym_to_key(ks::KEY_KP_0), Some(u32::from(b'0')));
        assert_eq!(keysym_to_key(ks::KEY_KP_9), Some(u32::from(b'9')));
    }

    #[test]
    fn navigation_keys_map_to_control_values() {
        assert_eq!(keysym_to_key(ks::KEY_Return), Some(keys::ENTER));
        assert_eq!(keysym_to_key(ks::KEY_KP_Enter), Some(keys::ENTER));
        assert_eq!(keysym_to_key(ks::KEY_BackSpace), Some(keys::BACKSPACE));
        assert_eq!(keysym_to_key(ks::KEY_Escape), Some(keys::ESC));
        assert_eq!(keysym_to_key(ks::KEY_Delete), Some(keys::DEL));
        assert_eq!(keysym_to_key(ks::KEY_Tab), Some(keys::NEXT));
        assert_eq!(keysym_to_key(ks::KEY_Prior), Some(keys::PREV));
        assert_eq!(keysym_to_key(ks::KEY_Up), Some(keys::UP));
        assert_eq!(keysym_to_key(ks::KEY_Home), Some(keys::HOME));
        assert_eq!(keysym_to_key(ks::KEY_End), Some(keys::END));
    }

    #[test]
    fn unmapped_keysyms_are_dropped() {
        assert_eq!(keysym_to_key(ks::KEY_Shift_L), None);
        assert_eq!(keysym_to_key(ks::KEY_F1), None);
    }

    #[test]
    fn translation_without_a_keymap_is_none() {
        let state = XkbState::new();
        assert_eq!(state.translate(30), None);
    }

    #[test]
    fn focus_clears_only_the_destroyed_window() {
        let mut focus = FocusState::default();
        focus.pointer = Some(ObjectRef {
            window: 0,
            kind: ObjectKind::Body,
        });
        focus.keyboard = Some(ObjectRef {
            window: 1,
            kind: ObjectKind::Body,
        });
        focus.touch = Some(ObjectRef {
            window: 0,
            kind: ObjectKind::Titlebar,
        });

        focus.clear_window(0);
        assert!(focus.pointer.is_none());
        assert!(focus.touch.is_none());
        assert_eq!(focus.keyboard.map(|r| r.window), Some(1));
    }
}
