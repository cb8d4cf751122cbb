// Software HUD drawing straight onto the composited frame.
// Visual effects provided here:
// 1) A crosshair at the mouse (and a ring where bursts are aimed).
// 2) A tiny 5x7 bitmap font for the effect toggles, particle count and FPS.

use crate::types::FrameBuffer;

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Bresenham line, 1 px wide.
fn draw_line(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(fb, x0, y0, color);
        if x0 == x1 && y0 == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x0 += sx; }
        if e2 <= dx { err += dx; y0 += sy; }
    }
}

/// Draw a small crosshair centered at (cx,cy).
/// Visual: a "+" with a tiny gap at the center follows your mouse.
pub fn draw_crosshair(fb: &mut FrameBuffer, cx: i32, cy: i32, size: i32, color: u32) {
    draw_line(fb, cx - size, cy, cx - 2, cy, color);
    draw_line(fb, cx + 2, cy, cx + size, cy, color);
    draw_line(fb, cx, cy - size, cx, cy - 2, color);
    draw_line(fb, cx, cy + 2, cx, cy + size, color);
    put_pixel(fb, cx, cy, color);
}

/// 1 px circle outline (midpoint algorithm).
/// Visual: a thin ring marks where fireworks are being aimed.
pub fn draw_ring(fb: &mut FrameBuffer, cx: i32, cy: i32, r: i32, color: u32) {
    let (mut x, mut y, mut err) = (r, 0, 1 - r);
    while x >= y {
        for (dx, dy) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
            put_pixel(fb, cx + dx, cy + dy, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/* ---------- 5x7 bitmap font (just the characters the HUD prints) ---------- */

/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b11001,0b10101,0b10011,0b10001,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b11011,0b10001),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),

        _ => None,
    }
}

/// Draw a single 5x7 character at (x,y) with a 1-pixel black shadow.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    let Some(rows) = glyph5x7(ch) else { return };
    for (offset, c) in [(1, 0x00000000), (0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    put_pixel(fb, x + rx + offset, y + ry as i32 + offset, c);
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs, 1 px apart.
/// Characters without a glyph leave a blank cell.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: u32 = 0x00FF_FFFF;

    #[test]
    fn crosshair_leaves_a_gap() {
        let mut fb = FrameBuffer::new(21, 21);
        draw_crosshair(&mut fb, 10, 10, 6, WHITE);
        assert_eq!(fb.pixels[10 * 21 + 10], WHITE);
        assert_eq!(fb.pixels[10 * 21 + 11], 0);
        assert_eq!(fb.pixels[10 * 21 + 16], WHITE);
        assert_eq!(fb.pixels[4 * 21 + 10], WHITE);
    }

    #[test]
    fn drawing_off_screen_is_clipped() {
        let mut fb = FrameBuffer::new(8, 8);
        draw_crosshair(&mut fb, -20, -20, 5, WHITE);
        draw_ring(&mut fb, 100, 4, 3, WHITE);
        assert!(fb.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn ring_hits_its_compass_points() {
        let mut fb = FrameBuffer::new(20, 20);
        draw_ring(&mut fb, 10, 10, 5, WHITE);
        for (x, y) in [(15, 10), (5, 10), (10, 15), (10, 5)] {
            assert_eq!(fb.pixels[y * 20 + x], WHITE);
        }
        assert_eq!(fb.pixels[10 * 20 + 10], 0);
    }

    #[test]
    fn hud_text_has_every_glyph_it_needs() {
        for ch in "SNOW FROST FIREWORKS ON OFF | P: 123 FPS: 59.8 MOTION".chars() {
            assert!(glyph5x7(ch).is_some(), "missing glyph {ch:?}");
        }
    }

    #[test]
    fn text_advances_six_pixels_per_char() {
        let mut fb = FrameBuffer::new(20, 10);
        draw_text_5x7(&mut fb, 0, 0, "II", WHITE);
        // Top bar of each 'I' spans columns 1..=3 of its cell.
        assert_eq!(fb.pixels[1], WHITE);
        assert_eq!(fb.pixels[7], WHITE);
        assert_eq!(fb.pixels[0], 0);
    }
}
