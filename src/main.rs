// What you SEE now:
// • The live camera (or a dark backdrop without a camera) is the base image.
// • 1 toggles snow: flakes pile up along the bottom; M shakes it off, C clears it.
// • 2 toggles frost: hold Left Mouse to wipe it, R fogs it back in.
// • 3 toggles fireworks: hold Right Mouse to aim the bursts.
// • S saves a PNG snapshot. ESC quits.

use overlay_fx::config::OverlayConfig;
use overlay_fx::draw::{draw_crosshair, draw_ring, draw_text_5x7};
use overlay_fx::error::Error;
use overlay_fx::gamma::GammaLut;
use overlay_fx::raster::Canvas;
use overlay_fx::scheduler::{FrameInput, FrameScheduler, FrameStats};
use overlay_fx::types::FrameBuffer;
use overlay_fx::window::Drawer;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Where base frames come from.
enum Source {
    #[cfg(feature = "camera")]
    Camera(overlay_fx::camera::CameraCapture),
    Backdrop(FrameBuffer),
}

impl Source {
    fn open() -> Self {
        #[cfg(feature = "camera")]
        match overlay_fx::camera::CameraCapture::new(0, WIDTH, HEIGHT) {
            Ok(cam) => return Source::Camera(cam),
            Err(e) => warn!(error = %e, "no camera; using a backdrop"),
        }
        Source::Backdrop(backdrop(WIDTH as usize, HEIGHT as usize))
    }

    /// Frame size the source settled on, known before the first grab.
    fn size(&self) -> (usize, usize) {
        match self {
            #[cfg(feature = "camera")]
            Source::Camera(cam) => {
                let (w, h) = cam.resolution();
                (w as usize, h as usize)
            }
            Source::Backdrop(fb) => (fb.width, fb.height),
        }
    }

    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        match self {
            #[cfg(feature = "camera")]
            Source::Camera(cam) => cam.next_frame(),
            Source::Backdrop(fb) => Ok(fb.clone()),
        }
    }
}

/// Night-sky gradient so the effects have something dark to sit on.
fn backdrop(width: usize, height: usize) -> FrameBuffer {
    let mut fb = FrameBuffer::new(width, height);
    for y in 0..height {
        let t = y as f32 / height.max(1) as f32;
        let r = (10.0 + 20.0 * t) as u32;
        let g = (14.0 + 30.0 * t) as u32;
        let b = (40.0 + 50.0 * t) as u32;
        fb.pixels[y * width..(y + 1) * width].fill((r << 16) | (g << 8) | b);
    }
    fb
}

fn hud_line(input: &FrameInput, stats: &FrameStats, fps: &str) -> String {
    let on = |b: bool| if b { "ON" } else { "OFF" };
    format!(
        "SNOW:{} FROST:{} FIREWORKS:{} | P:{} | {}",
        on(input.snow_active),
        on(input.frost_active),
        on(input.fireworks_active),
        stats.particles(),
        fps
    )
}

fn load_config() -> Result<OverlayConfig, Error> {
    match std::env::args().nth(1) {
        Some(path) => Ok(OverlayConfig::from_toml_file(&path)?),
        None => Ok(OverlayConfig::default()),
    }
}

fn main() -> Result<(), Error> {
    /* --- Config + logging ---
       RUST_LOG wins over the level in the config file. */
    let config = load_config()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    /* --- Camera + window ---
       Visual: window opens with the live feed (or the backdrop). */
    let mut source = Source::open();
    let (width, height) = source.size();
    let mut drawer = Drawer::new("Overlay FX", width, height)?;

    let lut = GammaLut::new();
    let seed = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos() as u64);
    let mut scheduler: FrameScheduler<Canvas> = FrameScheduler::new(config, seed);
    scheduler.start();

    let mut input = FrameInput { snow_active: true, ..FrameInput::default() };
    let mut stats = FrameStats::default();

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");
    let mut snapshots: u32 = 0;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        /* 1) Fresh base frame. */
        let mut screen = source.next_frame()?;

        /* 2) Inputs -> this frame's snapshot. */
        let controls = drawer.poll();
        if controls.toggle_snow { input.snow_active = !input.snow_active; }
        if controls.toggle_frost { input.frost_active = !input.frost_active; }
        if controls.toggle_fireworks { input.fireworks_active = !input.fireworks_active; }
        if controls.reset_frost { scheduler.reset_frost(); }
        if controls.reset_snow { scheduler.reset_snow(); }
        input.width = screen.width;
        input.height = screen.height;
        input.motion_score = if controls.motion_spike { 1.0 } else { 0.0 };
        input.drawing_point = controls.mouse.filter(|_| controls.drawing);
        input.target_point = controls.mouse.filter(|_| controls.aiming);

        /* 3) Simulate, then blend the layers over the base. */
        if let Some(s) = scheduler.frame(&input) {
            stats = s;
        }
        scheduler.composite(&mut screen, &lut);

        /* 4) Crosshair + HUD on top. */
        if let Some(m) = controls.mouse {
            let (mx, my) = (m.x as i32, m.y as i32);
            draw_crosshair(&mut screen, mx, my, 12, 0x00_FF_CC_33);
            if controls.aiming {
                draw_ring(&mut screen, mx, my, 16, 0x00_FF_80_40);
            }
        }
        draw_text_5x7(&mut screen, 8, 8, &hud_line(&input, &stats, &hud_fps_text), 0x00_FF_FF_FF);

        if controls.snapshot {
            snapshots += 1;
            let path = format!("overlay-{snapshots:03}.png");
            match screen.save_png(&path) {
                Ok(()) => info!(%path, "snapshot saved"),
                Err(e) => warn!(error = %e, "snapshot failed"),
            }
        }

        /* 5) Present. */
        drawer.present(&screen)?;

        /* 6) FPS once per second. */
        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            info!("FPS: {:.1} ({} particles)", fps, stats.particles());
            hud_fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    scheduler.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_matches_the_frames() {
        let mut source = Source::Backdrop(backdrop(WIDTH as usize, HEIGHT as usize));
        let (width, height) = source.size();
        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width, frame.height), (width, height));
        assert_eq!(frame.pixels.len(), width * height);
    }
}
