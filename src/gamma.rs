// sRGB <-> linear lookup tables for compositing effect layers over video.
// Visual: gamma-correct edges on glows and fog, without per-pixel powf.

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1) as f32
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255) via 4096-step quantization
    // (index = (linear * 4095).round())
    linear_to_srgb: [u8; 4096],
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaLut {
    /// Build both tables once at startup.
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, out) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *out = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, out) in l2s.iter_mut().enumerate() {
            let l = (i as f32) / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *out = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    /// sRGB in [0,1] (e.g. an un-premultiplied layer colour) to linear.
    #[inline]
    pub fn srgb_unit_to_linear(&self, v: f32) -> f32 {
        self.srgb_to_linear[(v.clamp(0.0, 1.0) * 255.0).round() as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// 0x00RRGGBB -> linear [r, g, b].
    #[inline]
    pub fn decode(&self, px: u32) -> [f32; 3] {
        [
            self.srgb_u8_to_linear((px >> 16) as u8),
            self.srgb_u8_to_linear((px >> 8) as u8),
            self.srgb_u8_to_linear(px as u8),
        ]
    }

    /// Linear [r, g, b] -> 0x00RRGGBB.
    #[inline]
    pub fn encode(&self, lin: [f32; 3]) -> u32 {
        let r = self.linear_to_srgb_u8(lin[0]) as u32;
        let g = self.linear_to_srgb_u8(lin[1]) as u32;
        let b = self.linear_to_srgb_u8(lin[2]) as u32;
        (r << 16) | (g << 8) | b
    }
}
