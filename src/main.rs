//! Demo client: a bouncing square rendered through the backend.
//!
//! Connects to the compositor from the environment, opens one decorated
//! window and animates until the window is closed. Run under any Wayland
//! session; `RUST_LOG=debug` shows the protocol lifecycle.

use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use waybridge::{Backend, Config, Rect, Rgba8, WindowHooks, CYCLE_PERIOD};

const WIDTH: u32 = 480;
const HEIGHT: u32 = 320;
const BOX: u32 = 40;
const FRAME_PERIOD: Duration = Duration::from_millis(15);

fn main() -> Result<()> {
    env_logger::init();

    let cfg = Config::from_env().context("resolving backend configuration")?;
    let mut backend = Backend::connect(cfg).context("connecting to the compositor")?;

    let hooks = WindowHooks {
        on_close_request: Some(Box::new(|| {
            info!("close requested, shutting down");
            true
        })),
        on_resolution_change: Some(Box::new(|w, h| {
            info!("window resized to {}x{}", w, h);
        })),
    };
    let window = backend.create_window(WIDTH, HEIGHT, "waybridge demo", hooks)?;

    let background = Rgba8::rgb(0x10, 0x10, 0x18);
    let square = Rgba8::rgb(0xE0, 0x80, 0x20);
    let mut pos = (0i32, 0i32);
    let mut dir = (2i32, 2i32);

    while backend.is_window_open(window) {
        let (w, h) = backend.window_size(window)?;

        pos.0 += dir.0;
        pos.1 += dir.1;
        let max_x = (w as i32 - BOX as i32).max(0);
        let max_y = (h as i32 - BOX as i32).max(0);
        if pos.0 <= 0 || pos.0 >= max_x {
            dir.0 = -dir.0;
            pos.0 = pos.0.clamp(0, max_x);
        }
        if pos.1 <= 0 || pos.1 >= max_y {
            dir.1 = -dir.1;
            pos.1 = pos.1.clamp(0, max_y);
        }

        let mut frame = vec![background; (w * h) as usize];
        for dy in 0..BOX {
            for dx in 0..BOX {
                let (x, y) = (pos.0 as u32 + dx, pos.1 as u32 + dy);
                if x < w && y < h {
                    frame[(y * w + x) as usize] = square;
                }
            }
        }

        backend.flush(window, Rect::new(0, 0, w, h), &frame)?;
        backend.cycle(CYCLE_PERIOD)?;
        std::thread::sleep(FRAME_PERIOD);
    }

    backend.shutdown();
    Ok(())
}
