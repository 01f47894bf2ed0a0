// resample.rs — RGBA8 box resampling and mip reduction

use rayon::prelude::*;

/// Box-filter an RGBA8 image to a new size.
///
/// Each destination texel averages the source texels its footprint covers.
/// Texels are linearised with `src_gamma` before averaging and re-encoded
/// with `1 / dst_gamma`; with both at 1.0 the average is taken directly on
/// the stored values.
pub fn resample_rgba8(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    src_gamma: f32,
    dst_gamma: f32,
) -> Vec<u8> {
    assert_eq!(src.len(), src_width * src_height * 4, "RGBA8 buffer size mismatch");
    assert!(dst_width >= 1 && dst_height >= 1);

    let linear = src_gamma == 1.0 && dst_gamma == 1.0;
    let mut dst = vec![0u8; dst_width * dst_height * 4];

    dst.par_chunks_mut(dst_width * 4).enumerate().for_each(|(y, row)| {
        let y0 = y * src_height / dst_height;
        let y1 = ((y + 1) * src_height / dst_height).max(y0 + 1);
        for x in 0..dst_width {
            let x0 = x * src_width / dst_width;
            let x1 = ((x + 1) * src_width / dst_width).max(x0 + 1);
            let count = ((y1 - y0) * (x1 - x0)) as u32;

            for c in 0..4 {
                // alpha is never gamma-encoded
                if linear || c == 3 {
                    let mut sum = 0u32;
                    for sy in y0..y1 {
                        for sx in x0..x1 {
                            sum += src[(sy * src_width + sx) * 4 + c] as u32;
                        }
                    }
                    row[x * 4 + c] = ((sum + count / 2) / count) as u8;
                } else {
                    let mut sum = 0.0f32;
                    for sy in y0..y1 {
                        for sx in x0..x1 {
                            sum += (src[(sy * src_width + sx) * 4 + c] as f32 / 255.0).powf(src_gamma);
                        }
                    }
                    let v = (sum / count as f32).powf(1.0 / dst_gamma);
                    row[x * 4 + c] = (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
                }
            }
        }
    });
    dst
}

/// Halve an RGBA8 image with a 2x2 box. Odd or unit dimensions clamp.
/// Returns the new image and its size.
pub fn mip_map_rgba8(src: &[u8], width: usize, height: usize) -> (Vec<u8>, usize, usize) {
    let out_w = (width / 2).max(1);
    let out_h = (height / 2).max(1);
    let mut out = vec![0u8; out_w * out_h * 4];

    for y in 0..out_h {
        let sy0 = (y * 2).min(height - 1);
        let sy1 = (y * 2 + 1).min(height - 1);
        for x in 0..out_w {
            let sx0 = (x * 2).min(width - 1);
            let sx1 = (x * 2 + 1).min(width - 1);
            for c in 0..4 {
                let sum = src[(sy0 * width + sx0) * 4 + c] as u32
                    + src[(sy0 * width + sx1) * 4 + c] as u32
                    + src[(sy1 * width + sx0) * 4 + c] as u32
                    + src[(sy1 * width + sx1) * 4 + c] as u32;
                out[(y * out_w + x) * 4 + c] = (sum >> 2) as u8;
            }
        }
    }
    (out, out_w, out_h)
}

/// Number of mip levels down to 1x1, halving each dimension (clamped to 1).
pub fn mipmap_level_count(width: usize, height: usize) -> usize {
    let mut levels = 1;
    let (mut w, mut h) = (width, height);
    while w > 1 || h > 1 {
        w = (w >> 1).max(1);
        h = (h >> 1).max(1);
        levels += 1;
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_4x_box() {
        // 8x8 source, left half 0, right half 200 in red
        let mut src = vec![0u8; 8 * 8 * 4];
        for y in 0..8 {
            for x in 4..8 {
                src[(y * 8 + x) * 4] = 200;
            }
            for x in 0..8 {
                src[(y * 8 + x) * 4 + 3] = 255;
            }
        }
        let dst = resample_rgba8(&src, 8, 8, 2, 2, 1.0, 1.0);
        assert_eq!(dst.len(), 16);
        assert_eq!(dst[0], 0);
        assert_eq!(dst[4], 200);
        assert_eq!(dst[3], 255);
    }

    #[test]
    fn test_resample_averages_block() {
        let src = [10u8, 0, 0, 0, 20, 0, 0, 0, 30, 0, 0, 0, 41, 0, 0, 0];
        let dst = resample_rgba8(&src, 2, 2, 1, 1, 1.0, 1.0);
        // (10 + 20 + 30 + 41 + 2) / 4
        assert_eq!(dst[0], 25);
    }

    #[test]
    fn test_resample_gamma_round_trip_constant() {
        let src = vec![128u8; 4 * 4 * 4];
        let dst = resample_rgba8(&src, 4, 4, 1, 1, 2.2, 2.2);
        assert_eq!(dst, vec![128u8; 4]);
    }

    #[test]
    fn test_mip_map() {
        let src = [0u8, 0, 0, 0, 4, 4, 4, 4, 8, 8, 8, 8, 12, 12, 12, 12];
        let (out, w, h) = mip_map_rgba8(&src, 2, 2);
        assert_eq!((w, h), (1, 1));
        assert_eq!(out, vec![6, 6, 6, 6]);

        let (out, w, h) = mip_map_rgba8(&[9, 9, 9, 9], 1, 1);
        assert_eq!((w, h), (1, 1));
        assert_eq!(out, vec![9, 9, 9, 9]);
    }

    #[test]
    fn test_mipmap_level_count() {
        assert_eq!(mipmap_level_count(1, 1), 1);
        assert_eq!(mipmap_level_count(32, 32), 6);
        assert_eq!(mipmap_level_count(256, 64), 9);
    }
}
