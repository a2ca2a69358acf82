//! Compositor-free checks of the public surface: chrome geometry, pixel
//! packing and pool accounting as a host crate would consume them.

use waybridge::allocator::PoolAccounting;
use waybridge::decoration::{self, BORDER_SIZE, BUTTON_SIZE, TITLE_BAR_HEIGHT};
use waybridge::object::ObjectKind;
use waybridge::pixel::{self, BYTES_PER_PIXEL};
use waybridge::{keys, Rect, ResizeEdge, Rgba8};

#[test]
fn chrome_surrounds_the_body() {
    let (w, h) = (640u32, 480u32);

    let titlebar = decoration::placement(ObjectKind::Titlebar, w, h).unwrap();
    assert_eq!(titlebar.y, -(TITLE_BAR_HEIGHT as i32));
    assert_eq!(titlebar.width, w);

    // Buttons sit inside the titlebar strip, right-aligned in order
    // minimize < maximize < close.
    let close = decoration::placement(ObjectKind::ButtonClose, w, h).unwrap();
    let maximize = decoration::placement(ObjectKind::ButtonMaximize, w, h).unwrap();
    let minimize = decoration::placement(ObjectKind::ButtonMinimize, w, h).unwrap();
    for button in [&close, &maximize, &minimize] {
        assert_eq!(button.width, BUTTON_SIZE);
        assert!(button.y >= titlebar.y);
        assert!(button.y + (button.height as i32) <= 0);
        assert!(button.x + (button.width as i32) <= w as i32);
    }
    assert!(minimize.x < maximize.x && maximize.x < close.x);

    // Borders run the full extent including the titlebar region.
    let left = decoration::placement(ObjectKind::BorderLeft, w, h).unwrap();
    assert_eq!(left.height, h + TITLE_BAR_HEIGHT);
    assert_eq!(left.x, -(BORDER_SIZE as i32));
    let bottom = decoration::placement(ObjectKind::BorderBottom, w, h).unwrap();
    assert_eq!(bottom.width, w + 2 * BORDER_SIZE);
    assert_eq!(bottom.y, h as i32);
}

#[test]
fn every_border_position_resolves_to_an_edge() {
    for kind in [
        ObjectKind::BorderTop,
        ObjectKind::BorderBottom,
        ObjectKind::BorderLeft,
        ObjectKind::BorderRight,
    ] {
        let (w, h) = match kind {
            ObjectKind::BorderTop | ObjectKind::BorderBottom => (300, BORDER_SIZE),
            _ => (BORDER_SIZE, 300),
        };
        for along in 0..300i32 {
            let (x, y) = match kind {
                ObjectKind::BorderTop | ObjectKind::BorderBottom => (along, 0),
                _ => (0, along),
            };
            assert!(
                decoration::hit_test(kind, x, y, w, h).is_some(),
                "{:?} at {} had no edge",
                kind,
                along
            );
        }
    }
}

#[test]
fn corner_edges_agree_between_adjacent_borders() {
    // The top-left corner is reachable from both the top and the left
    // border and must resolve identically.
    let from_top = decoration::hit_test(ObjectKind::BorderTop, 0, 0, 400, BORDER_SIZE);
    let from_left = decoration::hit_test(ObjectKind::BorderLeft, 0, 0, BORDER_SIZE, 400);
    assert_eq!(from_top, Some(ResizeEdge::TopLeft));
    assert_eq!(from_left, Some(ResizeEdge::TopLeft));
}

#[test]
fn flush_area_lands_where_damaged() {
    let (w, h) = (16u32, 8u32);
    let mut backing = vec![0u8; (w * h) as usize * BYTES_PER_PIXEL];
    let area = Rect::new(4, 2, 3, 3);
    let src = vec![Rgba8::rgb(0xAB, 0xCD, 0xEF); 9];

    pixel::blit(&mut backing, w, h, area, &src);

    let mut packed = [0u8; 4];
    pixel::pack(Rgba8::rgb(0xAB, 0xCD, 0xEF), &mut packed);
    let idx = (2 * w + 4) as usize * BYTES_PER_PIXEL;
    assert_eq!(&backing[idx..idx + BYTES_PER_PIXEL], &packed[..BYTES_PER_PIXEL]);
    // One pixel left of the area stays untouched.
    let outside = (2 * w + 3) as usize * BYTES_PER_PIXEL;
    assert!(backing[outside..outside + BYTES_PER_PIXEL]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn control_keys_are_distinct() {
    let all = [
        keys::UP,
        keys::DOWN,
        keys::RIGHT,
        keys::LEFT,
        keys::ESC,
        keys::DEL,
        keys::BACKSPACE,
        keys::ENTER,
        keys::NEXT,
        keys::PREV,
        keys::HOME,
        keys::END,
    ];
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn pool_accounting_round_trip() {
    let mut acct = PoolAccounting::new();
    let first = acct.plan(8192);
    acct.commit(8192, first);
    let second = acct.plan(4096);
    assert_eq!(second.offset, 8192);
    acct.commit(4096, second);

    acct.release(4096);
    acct.release(8192);
    assert_eq!(acct.free(), acct.total());

    // The whole store is reusable without growing.
    let reuse = acct.plan(12288);
    assert_eq!(reuse.grow, 0);
    assert_eq!(reuse.offset, 0);
}
