//! Client-side window chrome: geometry, painting and hit-testing
//!
//! Active only when decorations are enabled. The chrome is a titlebar strip
//! above the body, three right-aligned square buttons inside it, and four
//! fixed-thickness borders. Layout is recomputed from the body dimensions
//! on every resize; painting goes through the pixel packers so chrome works
//! at every colour depth; hit-testing buckets a border position into a
//! corner or straight-edge resize zone.

use crate::object::ObjectKind;
use crate::pixel::{self, Rgba8};
use crate::shell::ResizeEdge;

/// Height of the titlebar strip above the body.
pub const TITLE_BAR_HEIGHT: u32 = 24;
/// Thickness of the side and bottom borders.
pub const BORDER_SIZE: u32 = 2;
/// Gap between titlebar buttons and around them.
pub const BUTTON_MARGIN: u32 = max(TITLE_BAR_HEIGHT / 6, BORDER_SIZE);
/// Inset of the glyph inside a button face.
pub const BUTTON_PADDING: u32 = max(TITLE_BAR_HEIGHT / 8, BORDER_SIZE);
/// Side length of the square titlebar buttons.
pub const BUTTON_SIZE: u32 = TITLE_BAR_HEIGHT - 2 * BUTTON_MARGIN;

/// Each corner zone covers this fraction (1/20) of the border's length.
pub const CORNER_ZONE_DIVISOR: u32 = 20;

const CHROME: Rgba8 = Rgba8::rgb(0x66, 0x66, 0x66);
const BUTTON_FACE: Rgba8 = Rgba8::rgb(0xCC, 0xCC, 0xCC);
const GLYPH: Rgba8 = Rgba8::rgb(0x33, 0x33, 0x33);
const GLYPH_SHADOW: Rgba8 = Rgba8::rgb(0x66, 0x66, 0x66);

const fn max(a: u32, b: u32) -> u32 {
    if a > b {
        a
    } else {
        b
    }
}

/// Size and subsurface position of one decoration, relative to the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// Compute a decoration's placement from the current body dimensions.
/// Returns `None` for the body itself.
pub fn placement(kind: ObjectKind, body_width: u32, body_height: u32) -> Option<Placement> {
    let button_step = (BUTTON_MARGIN + BUTTON_SIZE) as i32;
    let button_y = -(BUTTON_MARGIN as i32 + BUTTON_SIZE as i32 + BORDER_SIZE as i32 / 2);

    let placement = match kind {
        ObjectKind::Body => return None,
        ObjectKind::Titlebar => Placement {
            width: body_width,
            height: TITLE_BAR_HEIGHT,
            x: 0,
            y: -(TITLE_BAR_HEIGHT as i32),
        },
        ObjectKind::ButtonClose => Placement {
            width: BUTTON_SIZE,
            height: BUTTON_SIZE,
            x: body_width as i32 - button_step,
            y: button_y,
        },
        ObjectKind::ButtonMaximize => Placement {
            width: BUTTON_SIZE,
            height: BUTTON_SIZE,
            x: body_width as i32 - 2 * button_step,
            y: button_y,
        },
        ObjectKind::ButtonMinimize => Placement {
            width: BUTTON_SIZE,
            height: BUTTON_SIZE,
            x: body_width as i32 - 3 * button_step,
            y: button_y,
        },
        ObjectKind::BorderTop => Placement {
            width: body_width + 2 * BORDER_SIZE,
            height: BORDER_SIZE,
            x: -(BORDER_SIZE as i32),
            y: -((BORDER_SIZE + TITLE_BAR_HEIGHT) as i32),
        },
        ObjectKind::BorderBottom => Placement {
            width: body_width + 2 * BORDER_SIZE,
            height: BORDER_SIZE,
            x: -(BORDER_SIZE as i32),
            y: body_height as i32,
        },
        ObjectKind::BorderLeft => Placement {
            width: BORDER_SIZE,
            height: body_height + TITLE_BAR_HEIGHT,
            x: -(BORDER_SIZE as i32),
            y: -(TITLE_BAR_HEIGHT as i32),
        },
        ObjectKind::BorderRight => Placement {
            width: BORDER_SIZE,
            height: body_height + TITLE_BAR_HEIGHT,
            x: body_width as i32,
            y: -(TITLE_BAR_HEIGHT as i32),
        },
    };
    Some(placement)
}

/// Extra size a toplevel configure includes when chrome is enabled:
/// borders left+right, and titlebar plus borders top+bottom.
pub fn frame_insets() -> (u32, u32) {
    (2 * BORDER_SIZE, TITLE_BAR_HEIGHT + 2 * BORDER_SIZE)
}

/// Paint a decoration's pixels into its packed buffer.
pub fn paint(kind: ObjectKind, width: u32, height: u32, buf: &mut [u8]) {
    match kind {
        ObjectKind::Titlebar
        | ObjectKind::BorderTop
        | ObjectKind::BorderBottom
        | ObjectKind::BorderLeft
        | ObjectKind::BorderRight => pixel::fill(buf, CHROME),
        ObjectKind::ButtonClose => paint_close(width, height, buf),
        ObjectKind::ButtonMaximize => paint_maximize(width, height, buf),
        ObjectKind::ButtonMinimize => paint_minimize(width, height, buf),
        ObjectKind::Body => {}
    }
}

/// A diagonal cross with a one-pixel shadow.
fn paint_close(width: u32, height: u32, buf: &mut [u8]) {
    pixel::fill(buf, BUTTON_FACE);
    let pad = BUTTON_PADDING;
    for y in 0..height {
        for x in pad..width.saturating_sub(pad) {
            let idx = (y * width + x) as usize;
            if x == y || x == width - 1 - y {
                pixel::put(buf, idx, GLYPH);
            } else if (y > 0 && x == y - 1) || x == width - y {
                pixel::put(buf, idx, GLYPH_SHADOW);
            }
        }
    }
}

/// A rectangle outline with a doubled top edge.
fn paint_maximize(width: u32, height: u32, buf: &mut [u8]) {
    pixel::fill(buf, BUTTON_FACE);
    let pad = BUTTON_PADDING;
    for y in 0..height {
        for x in 0..width {
            let on_side = (x == pad || x == width - pad) && y >= pad && y <= height - pad;
            let on_top = (y == pad || y == pad + 1) && x >= pad && x < width - pad;
            let on_bottom = y == height - pad && x >= pad && x < width - pad;
            if on_side || on_top || on_bottom {
                pixel::put(buf, (y * width + x) as usize, GLYPH);
            }
        }
    }
}

/// A thick bar along the lower edge.
fn paint_minimize(width: u32, height: u32, buf: &mut [u8]) {
    pixel::fill(buf, BUTTON_FACE);
    let pad = BUTTON_PADDING;
    for y in (height.saturating_sub(2 * pad) + 1)..height.saturating_sub(pad) {
        for x in pad..width.saturating_sub(pad) {
            pixel::put(buf, (y * width + x) as usize, GLYPH);
        }
    }
}

/// Hit-test a position on a border object into a resize edge.
///
/// The position along the border is bucketed: the fraction of the border's
/// length nearest each end selects the diagonal corner, the remainder the
/// straight edge. Non-border objects never resize.
pub fn hit_test(kind: ObjectKind, x: i32, y: i32, width: u32, height: u32) -> Option<ResizeEdge> {
    let (along, length) = match kind {
        ObjectKind::BorderTop | ObjectKind::BorderBottom => (x, width),
        ObjectKind::BorderLeft | ObjectKind::BorderRight => (y, height),
        _ => return None,
    };
    let corner = (length / CORNER_ZONE_DIVISOR) as i32;
    let bucket = if along < corner {
        Zone::Near
    } else if along >= length as i32 - corner {
        Zone::Far
    } else {
        Zone::Middle
    };

    let edge = match (kind, bucket) {
        (ObjectKind::BorderTop, Zone::Near) => ResizeEdge::TopLeft,
        (ObjectKind::BorderTop, Zone::Middle) => ResizeEdge::Top,
        (ObjectKind::BorderTop, Zone::Far) => ResizeEdge::TopRight,
        (ObjectKind::BorderBottom, Zone::Near) => ResizeEdge::BottomLeft,
        (ObjectKind::BorderBottom, Zone::Middle) => ResizeEdge::Bottom,
        (ObjectKind::BorderBottom, Zone::Far) => ResizeEdge::BottomRight,
        (ObjectKind::BorderLeft, Zone::Near) => ResizeEdge::TopLeft,
        (ObjectKind::BorderLeft, Zone::Middle) => ResizeEdge::Left,
        (ObjectKind::BorderLeft, Zone::Far) => ResizeEdge::BottomLeft,
        (ObjectKind::BorderRight, Zone::Near) => ResizeEdge::TopRight,
        (ObjectKind::BorderRight, Zone::Middle) => ResizeEdge::Right,
        (ObjectKind::BorderRight, Zone::Far) => ResizeEdge::BottomRight,
        _ => return None,
    };
    Some(edge)
}

#[derive(Debug, Clone, Copy)]
enum Zone {
    Near,
    Middle,
    Far,
}

/// Cursor theme name for a pointer resting on `kind`. Maximized windows
/// keep the default cursor on borders since they cannot be resized.
pub fn cursor_name(
    kind: ObjectKind,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    maximized: bool,
) -> &'static str {
    if maximized || !kind.is_border() {
        return "left_ptr";
    }
    match hit_test(kind, x, y, width, height) {
        Some(ResizeEdge::Top) => "top_side",
        Some(ResizeEdge::Bottom) => "bottom_side",
        Some(ResizeEdge::Left) => "left_side",
        Some(ResizeEdge::Right) => "right_side",
        Some(ResizeEdge::TopLeft) => "top_left_corner",
        Some(ResizeEdge::TopRight) => "top_right_corner",
        Some(ResizeEdge::BottomLeft) => "bottom_left_corner",
        Some(ResizeEdge::BottomRight) => "bottom_right_corner",
        None => "left_ptr",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::BYTES_PER_PIXEL;

    #[test]
    fn corner_zones_cover_one_twentieth() {
        // Border of length 100: corner zones are the first/last 5 units.
        let top = ObjectKind::BorderTop;
        assert_eq!(hit_test(top, 3, 0, 100, 2), Some(ResizeEdge::TopLeft));
        assert_eq!(hit_test(top, 50, 0, 100, 2), Some(ResizeEdge::Top));
        assert_eq!(hit_test(top, 97, 0, 100, 2), Some(ResizeEdge::TopRight));
        assert_eq!(hit_test(top, 4, 0, 100, 2), Some(ResizeEdge::TopLeft));
        assert_eq!(hit_test(top, 5, 0, 100, 2), Some(ResizeEdge::Top));
        assert_eq!(hit_test(top, 94, 0, 100, 2), Some(ResizeEdge::Top));
        assert_eq!(hit_test(top, 95, 0, 100, 2), Some(ResizeEdge::TopRight));
    }

    #[test]
    fn vertical_borders_bucket_along_y() {
        let left = ObjectKind::BorderLeft;
        assert_eq!(hit_test(left, 0, 2, 2, 200), Some(ResizeEdge::TopLeft));
        assert_eq!(hit_test(left, 0, 100, 2, 200), Some(ResizeEdge::Left));
        assert_eq!(hit_test(left, 0, 195, 2, 200), Some(ResizeEdge::BottomLeft));

        let right = ObjectKind::BorderRight;
        assert_eq!(hit_test(right, 0, 2, 2, 200), Some(ResizeEdge::TopRight));
        assert_eq!(hit_test(right, 0, 198, 2, 200), Some(ResizeEdge::BottomRight));
    }

    #[test]
    fn non_borders_do_not_resize() {
        assert_eq!(hit_test(ObjectKind::Titlebar, 5, 5, 100, 24), None);
        assert_eq!(hit_test(ObjectKind::Body, 5, 5, 100, 100), None);
    }

    #[test]
    fn maximized_windows_keep_the_default_cursor() {
        assert_eq!(
            cursor_name(ObjectKind::BorderTop, 1, 0, 100, 2, true),
            "left_ptr"
        );
        assert_eq!(
            cursor_name(ObjectKind::BorderTop, 1, 0, 100, 2, false),
            "top_left_corner"
        );
    }

    #[test]
    fn placement_tracks_body_dimensions() {
        let titlebar = placement(ObjectKind::Titlebar, 320, 240).unwrap();
        assert_eq!(titlebar.width, 320);
        assert_eq!(titlebar.y, -(TITLE_BAR_HEIGHT as i32));

        let bottom = placement(ObjectKind::BorderBottom, 320, 240).unwrap();
        assert_eq!(bottom.width, 320 + 2 * BORDER_SIZE);
        assert_eq!(bottom.y, 240);

        let close = placement(ObjectKind::ButtonClose, 320, 240).unwrap();
        let maximize = placement(ObjectKind::ButtonMaximize, 320, 240).unwrap();
        assert!(maximize.x < close.x);
        assert_eq!(placement(ObjectKind::Body, 320, 240), None);
    }

    #[test]
    fn insets_match_the_chrome_layout() {
        let (dx, dy) = frame_insets();
        assert_eq!(dx, 2 * BORDER_SIZE);
        assert_eq!(dy, TITLE_BAR_HEIGHT + 2 * BORDER_SIZE);
    }

    #[test]
    fn painting_fills_the_whole_buffer() {
        for kind in ObjectKind::DECORATIONS {
            let p = placement(kind, 320, 240).unwrap();
            let mut buf = vec![0u8; (p.width * p.height) as usize * BYTES_PER_PIXEL];
            paint(kind, p.width, p.height, &mut buf);
            // Chrome never leaves a fully transparent buffer behind.
            assert!(buf.iter().any(|&b| b != 0), "{:?} painted nothing", kind);
        }
    }
}
