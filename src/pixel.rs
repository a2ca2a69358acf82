//! Colour depth, pixel packing and rectangle blits
//!
//! The host GUI library renders at a fixed, build-time colour depth (one of
//! the `depth-*` cargo features). This module owns the translation between
//! the library's RGBA source colours and the byte layout of the negotiated
//! wl_shm format, and the row-major blit into a mapped backing buffer.
//! Everything here is pure over byte slices so it can be tested without a
//! compositor.

use wayland_client::protocol::wl_shm;

/// Bytes occupied by one pixel at the active colour depth.
pub const BYTES_PER_PIXEL: usize = active_bytes_per_pixel();

const fn active_bytes_per_pixel() -> usize {
    if cfg!(feature = "depth-32") {
        4
    } else if cfg!(feature = "depth-16") {
        2
    } else {
        // depth-8 and depth-1 both occupy one byte per pixel on the wire.
        1
    }
}

/// An 8-bit-per-channel source colour, as handed over by the GUI library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }
}

/// A dirty rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// ARGB8888 little-endian byte order.
pub fn pack32(c: Rgba8) -> [u8; 4] {
    [c.b, c.g, c.r, c.a]
}

/// RGB565 little-endian byte order.
pub fn pack16(c: Rgba8) -> [u8; 2] {
    let v: u16 =
        (((c.r as u16) >> 3) << 11) | (((c.g as u16) >> 2) << 5) | ((c.b as u16) >> 3);
    v.to_le_bytes()
}

/// RGB332 in one byte.
pub fn pack8(c: Rgba8) -> u8 {
    (c.r & 0xE0) | ((c.g & 0xE0) >> 3) | (c.b >> 6)
}

/// Monochrome builds still transport one RGB332-style byte per pixel,
/// saturating each 1-bit channel.
pub fn pack1(c: Rgba8) -> u8 {
    let mut v = 0u8;
    if c.r >= 0x80 {
        v |= 0xE0;
    }
    if c.g >= 0x80 {
        v |= 0x1C;
    }
    if c.b >= 0x80 {
        v |= 0x03;
    }
    v
}

/// Pack one colour into `out` (exactly `BYTES_PER_PIXEL` bytes) at the
/// active colour depth.
pub fn pack(c: Rgba8, out: &mut [u8]) {
    if cfg!(feature = "depth-32") {
        out[..4].copy_from_slice(&pack32(c));
    } else if cfg!(feature = "depth-16") {
        out[..2].copy_from_slice(&pack16(c));
    } else if cfg!(feature = "depth-8") {
        out[0] = pack8(c);
    } else {
        out[0] = pack1(c);
    }
}

/// wl_shm formats usable at the active depth, most preferred first.
pub fn preferred_formats() -> &'static [wl_shm::Format] {
    if cfg!(feature = "depth-32") {
        &[wl_shm::Format::Argb8888, wl_shm::Format::Xrgb8888]
    } else if cfg!(feature = "depth-16") {
        &[wl_shm::Format::Rgb565]
    } else {
        &[wl_shm::Format::Rgb332]
    }
}

/// Preference rank of an advertised format; lower is better, `None` means
/// the format is unusable at this depth.
pub fn format_rank(format: wl_shm::Format) -> Option<usize> {
    preferred_formats().iter().position(|f| *f == format)
}

/// Fill a whole packed buffer with one colour.
pub fn fill(dst: &mut [u8], c: Rgba8) {
    let mut packed = [0u8; 4];
    pack(c, &mut packed);
    for px in dst.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.copy_from_slice(&packed[..BYTES_PER_PIXEL]);
    }
}

/// Write one pixel at a row-major index into a packed buffer.
pub fn put(dst: &mut [u8], index: usize, c: Rgba8) {
    let off = index * BYTES_PER_PIXEL;
    pack(c, &mut dst[off..off + BYTES_PER_PIXEL]);
}

/// Copy a rectangle of source pixels into a packed row-major destination.
///
/// `src` is row-major over the rectangle (`area.width * area.height`
/// entries). Pixels falling outside the destination are clipped; the source
/// index keeps following the rectangle pitch so clipping never skews the
/// remaining rows.
pub fn blit(dst: &mut [u8], dst_width: u32, dst_height: u32, area: Rect, src: &[Rgba8]) {
    for row in 0..area.height {
        let y = area.y + row as i32;
        if y < 0 || y >= dst_height as i32 {
            continue;
        }
        for col in 0..area.width {
            let x = area.x + col as i32;
            if x < 0 || x >= dst_width as i32 {
                continue;
            }
            let c = src[(row * area.width + col) as usize];
            put(dst, y as usize * dst_width as usize + x as usize, c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack32_is_little_endian_argb() {
        let c = Rgba8::new(0x11, 0x22, 0x33, 0x44);
        assert_eq!(pack32(c), [0x33, 0x22, 0x11, 0x44]);
    }

    #[test]
    fn pack16_is_rgb565() {
        // Pure red, green, blue map to the respective field masks.
        assert_eq!(pack16(Rgba8::rgb(0xFF, 0, 0)), 0xF800u16.to_le_bytes());
        assert_eq!(pack16(Rgba8::rgb(0, 0xFF, 0)), 0x07E0u16.to_le_bytes());
        assert_eq!(pack16(Rgba8::rgb(0, 0, 0xFF)), 0x001Fu16.to_le_bytes());
    }

    #[test]
    fn pack8_is_rgb332() {
        assert_eq!(pack8(Rgba8::rgb(0xFF, 0, 0)), 0xE0);
        assert_eq!(pack8(Rgba8::rgb(0, 0xFF, 0)), 0x1C);
        assert_eq!(pack8(Rgba8::rgb(0, 0, 0xFF)), 0x03);
        assert_eq!(pack8(Rgba8::rgb(0xFF, 0xFF, 0xFF)), 0xFF);
    }

    #[test]
    fn pack1_saturates_channels() {
        assert_eq!(pack1(Rgba8::rgb(0xFF, 0xFF, 0xFF)), 0xFF);
        assert_eq!(pack1(Rgba8::rgb(0x7F, 0x7F, 0x7F)), 0x00);
        assert_eq!(pack1(Rgba8::rgb(0x80, 0, 0)), 0xE0);
    }

    #[test]
    fn blit_round_trips_a_pattern() {
        // A known pattern written through the flush path must be
        // recoverable byte-exact from the backing bytes.
        let w = 4u32;
        let h = 3u32;
        let mut dst = vec![0u8; (w * h) as usize * BYTES_PER_PIXEL];
        let src: Vec<Rgba8> = (0..4)
            .map(|i| Rgba8::rgb(i * 10, i * 20, i * 30))
            .collect();
        blit(&mut dst, w, h, Rect::new(1, 1, 2, 2), &src);

        for (i, &c) in src.iter().enumerate() {
            let (row, col) = (i as u32 / 2, i as u32 % 2);
            let idx = ((1 + row) * w + 1 + col) as usize;
            let mut expected = [0u8; 4];
            pack(c, &mut expected);
            assert_eq!(
                &dst[idx * BYTES_PER_PIXEL..(idx + 1) * BYTES_PER_PIXEL],
                &expected[..BYTES_PER_PIXEL]
            );
        }
        // Untouched pixels stay zero.
        assert!(dst[..BYTES_PER_PIXEL].iter().all(|&b| b == 0));
    }

    #[test]
    fn blit_clips_without_skewing_rows() {
        let w = 2u32;
        let h = 2u32;
        let mut dst = vec![0u8; (w * h) as usize * BYTES_PER_PIXEL];
        // 3x1 rectangle starting at x=1: the last column is clipped.
        let src = [
            Rgba8::rgb(1, 1, 1),
            Rgba8::rgb(2, 2, 2),
            Rgba8::rgb(3, 3, 3),
        ];
        blit(&mut dst, w, h, Rect::new(1, 0, 3, 1), &src);

        let mut expected = [0u8; 4];
        pack(src[0], &mut expected);
        assert_eq!(
            &dst[BYTES_PER_PIXEL..2 * BYTES_PER_PIXEL],
            &expected[..BYTES_PER_PIXEL]
        );
    }

    #[test]
    fn fill_covers_every_pixel() {
        let mut dst = vec![0u8; 8 * BYTES_PER_PIXEL];
        fill(&mut dst, Rgba8::rgb(0x66, 0x66, 0x66));
        let mut expected = [0u8; 4];
        pack(Rgba8::rgb(0x66, 0x66, 0x66), &mut expected);
        for px in dst.chunks_exact(BYTES_PER_PIXEL) {
            assert_eq!(px, &expected[..BYTES_PER_PIXEL]);
        }
    }
}
