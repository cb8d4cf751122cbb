// The on-screen window and everything read from the keyboard/mouse.
// Visual effects provided here:
// 1) A window that shows the camera (or backdrop) with the overlays on top.
// 2) One `Controls` snapshot per frame so the main loop never polls twice.

use crate::error::Error;
use crate::types::FrameBuffer;
use glam::Vec2;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

/// Input for one frame. "Pressed" fields fire once per key press.
#[derive(Clone, Copy, Debug, Default)]
pub struct Controls {
    pub mouse: Option<Vec2>,
    /// LMB held: wiping the frost.
    pub drawing: bool,
    /// RMB held: aiming fireworks.
    pub aiming: bool,
    pub toggle_snow: bool,
    pub toggle_frost: bool,
    pub toggle_fireworks: bool,
    pub motion_spike: bool,
    pub reset_frost: bool,
    pub reset_snow: bool,
    pub snapshot: bool,
}

pub struct Drawer {
    window: Window,
}

impl Drawer {
    /// Create a window sized to the camera feed.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self { window })
    }

    /// Push this frame's pixels to the screen.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// False once the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    fn pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    /// Mouse position in window pixels, clamped to the window.
    pub fn mouse_pos(&self) -> Option<Vec2> {
        self.window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| Vec2::new(x.max(0.0), y.max(0.0)))
    }

    pub fn poll(&self) -> Controls {
        Controls {
            mouse: self.mouse_pos(),
            drawing: self.window.get_mouse_down(MouseButton::Left),
            aiming: self.window.get_mouse_down(MouseButton::Right),
            toggle_snow: self.pressed(Key::Key1),
            toggle_frost: self.pressed(Key::Key2),
            toggle_fireworks: self.pressed(Key::Key3),
            motion_spike: self.pressed(Key::M),
            reset_frost: self.pressed(Key::R),
            reset_snow: self.pressed(Key::C),
            snapshot: self.pressed(Key::S),
        }
    }
}
