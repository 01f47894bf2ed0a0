// float_bm.rs — RGBA float bitmap and the Gaussian half-size filter

use rayon::prelude::*;

/// 5-tap separable Gaussian used for every 2x downsample.
pub const GAUSSIAN_KERNEL: [f32; 5] = [0.05, 0.25, 0.40, 0.25, 0.05];

/// Rectangular RGBA image of 32-bit floats, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatBitMap {
    width: usize,
    height: usize,
    rgba: Vec<f32>,
}

impl FloatBitMap {
    /// Allocate a zero-filled bitmap. Both dimensions must be at least 1.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width >= 1 && height >= 1, "FloatBitMap must be at least 1x1");
        Self {
            width,
            height,
            rgba: vec![0.0; width * height * 4],
        }
    }

    /// Allocate a bitmap with every texel set to `value`.
    pub fn filled(width: usize, height: usize, value: [f32; 4]) -> Self {
        let mut bm = Self::new(width, height);
        bm.clear(value);
        bm
    }

    /// Expand an RGBA8 buffer into [0, 1] floats.
    pub fn from_rgba8(width: usize, height: usize, rgba8: &[u8]) -> Self {
        assert_eq!(rgba8.len(), width * height * 4, "RGBA8 buffer size mismatch");
        let mut bm = Self::new(width, height);
        for (dst, &src) in bm.rgba.iter_mut().zip(rgba8) {
            *dst = src as f32 * (1.0 / 255.0);
        }
        bm
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize, c: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && c < 4);
        (y * self.width + x) * 4 + c
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize, c: usize) -> f32 {
        self.rgba[self.index(x, y, c)]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize, c: usize) -> &mut f32 {
        let idx = self.index(x, y, c);
        &mut self.rgba[idx]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, c: usize, value: f32) {
        *self.pixel_mut(x, y, c) = value;
    }

    pub fn texel(&self, x: usize, y: usize) -> [f32; 4] {
        let i = self.index(x, y, 0);
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    pub fn set_texel(&mut self, x: usize, y: usize, value: [f32; 4]) {
        let i = self.index(x, y, 0);
        self.rgba[i..i + 4].copy_from_slice(&value);
    }

    /// Raw RGBA floats, row-major.
    pub fn data(&self) -> &[f32] {
        &self.rgba
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.rgba
    }

    pub fn clear(&mut self, value: [f32; 4]) {
        for texel in self.rgba.chunks_exact_mut(4) {
            texel.copy_from_slice(&value);
        }
    }

    /// In-place `v = v^p` on RGB. Alpha is untouched.
    pub fn raise_to_power(&mut self, p: f32) {
        for texel in self.rgba.chunks_exact_mut(4) {
            for v in &mut texel[..3] {
                *v = v.max(0.0).powf(p);
            }
        }
    }

    /// Largest RGB component over the whole image.
    pub fn max_rgb(&self) -> f32 {
        self.rgba
            .chunks_exact(4)
            .flat_map(|t| t[..3].iter().copied())
            .fold(0.0f32, f32::max)
    }

    /// Quantise to RGBA8, clamping to [0, 1].
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.rgba
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
            .collect()
    }

    /// Half-size copy filtered with the 5x5 separable Gaussian centred on
    /// `(2x, 2y)`. Taps are clamped to the image and the result is divided
    /// by the sum of the applied weights. Both dimensions must be at least 2.
    pub fn downsample_half_gaussian(&self) -> FloatBitMap {
        assert!(self.width >= 2 && self.height >= 2, "downsample needs at least 2x2");
        let mut dst = FloatBitMap::new(self.width / 2, self.height / 2);
        let dst_width = dst.width;
        let src_w = self.width as isize;
        let src_h = self.height as isize;

        dst.rgba
            .par_chunks_mut(dst_width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..dst_width {
                    let mut sum = [0.0f32; 4];
                    let mut weight = 0.0f32;
                    for (ky, &wy) in GAUSSIAN_KERNEL.iter().enumerate() {
                        let sy = (2 * y as isize + ky as isize - 2).clamp(0, src_h - 1) as usize;
                        for (kx, &wx) in GAUSSIAN_KERNEL.iter().enumerate() {
                            let sx = (2 * x as isize + kx as isize - 2).clamp(0, src_w - 1) as usize;
                            let w = wx * wy;
                            let texel = self.texel(sx, sy);
                            for c in 0..4 {
                                sum[c] += w * texel[c];
                            }
                            weight += w;
                        }
                    }
                    for c in 0..4 {
                        row[x * 4 + c] = sum[c] / weight;
                    }
                }
            });
        dst
    }
}
