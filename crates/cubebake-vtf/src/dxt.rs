// dxt.rs — DXT1/DXT5 block compression

pub const DXT1_BLOCK_BYTES: usize = 8;
pub const DXT5_BLOCK_BYTES: usize = 16;

/// Bytes needed for a `width x height` image in 4x4 blocks.
pub fn compressed_size(width: usize, height: usize, block_bytes: usize) -> usize {
    width.div_ceil(4).max(1) * height.div_ceil(4).max(1) * block_bytes
}

#[inline]
fn unpack_565(c: u16) -> [u8; 3] {
    let r = ((c >> 11) & 0x1f) as u32;
    let g = ((c >> 5) & 0x3f) as u32;
    let b = (c & 0x1f) as u32;
    [
        ((r << 3) | (r >> 2)) as u8,
        ((g << 2) | (g >> 4)) as u8,
        ((b << 3) | (b >> 2)) as u8,
    ]
}

#[inline]
fn pack_565(rgb: [u8; 3]) -> u16 {
    let r = (rgb[0] as u16 * 31 + 127) / 255;
    let g = (rgb[1] as u16 * 63 + 127) / 255;
    let b = (rgb[2] as u16 * 31 + 127) / 255;
    (r << 11) | (g << 5) | b
}

/// Four RGBA palette entries for a colour block. `four_colour` forces the
/// opaque four-entry mode used inside DXT5 blocks.
fn colour_palette(c0: u16, c1: u16, four_colour: bool) -> [[u8; 4]; 4] {
    let a = unpack_565(c0);
    let b = unpack_565(c1);
    let mix = |wa: u32, wb: u32, div: u32| -> [u8; 4] {
        [
            ((a[0] as u32 * wa + b[0] as u32 * wb) / div) as u8,
            ((a[1] as u32 * wa + b[1] as u32 * wb) / div) as u8,
            ((a[2] as u32 * wa + b[2] as u32 * wb) / div) as u8,
            255,
        ]
    };
    if four_colour || c0 > c1 {
        [[a[0], a[1], a[2], 255], [b[0], b[1], b[2], 255], mix(2, 1, 3), mix(1, 2, 3)]
    } else {
        [[a[0], a[1], a[2], 255], [b[0], b[1], b[2], 255], mix(1, 1, 2), [0, 0, 0, 0]]
    }
}

fn alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (a0w, a1w) = (a0 as u32, a1 as u32);
    let mut p = [a0, a1, 0, 0, 0, 0, 0, 0];
    if a0 > a1 {
        for i in 1..7u32 {
            p[i as usize + 1] = (((7 - i) * a0w + i * a1w) / 7) as u8;
        }
    } else {
        for i in 1..5u32 {
            p[i as usize + 1] = (((5 - i) * a0w + i * a1w) / 5) as u8;
        }
        p[6] = 0;
        p[7] = 255;
    }
    p
}

/// Iterate over the 4x4 blocks of an image, yielding block coordinates.
fn blocks(width: usize, height: usize) -> impl Iterator<Item = (usize, usize)> {
    let bw = width.div_ceil(4).max(1);
    let bh = height.div_ceil(4).max(1);
    (0..bh).flat_map(move |by| (0..bw).map(move |bx| (bx, by)))
}

fn write_block_texels(out: &mut [u8], width: usize, height: usize, bx: usize, by: usize, texels: &[[u8; 4]; 16]) {
    for ty in 0..4 {
        for tx in 0..4 {
            let x = bx * 4 + tx;
            let y = by * 4 + ty;
            if x < width && y < height {
                out[(y * width + x) * 4..(y * width + x) * 4 + 4].copy_from_slice(&texels[ty * 4 + tx]);
            }
        }
    }
}

fn read_block_texels(rgba: &[u8], width: usize, height: usize, bx: usize, by: usize) -> [[u8; 4]; 16] {
    let mut texels = [[0u8; 4]; 16];
    for ty in 0..4 {
        for tx in 0..4 {
            // clamp at the image edge so partial blocks repeat border texels
            let x = (bx * 4 + tx).min(width - 1);
            let y = (by * 4 + ty).min(height - 1);
            let i = (y * width + x) * 4;
            texels[ty * 4 + tx] = [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]];
        }
    }
    texels
}

fn decode_colour_block(block: &[u8], four_colour: bool, texels: &mut [[u8; 4]; 16]) {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let palette = colour_palette(c0, c1, four_colour);
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[((indices >> (2 * i)) & 3) as usize];
    }
}

pub fn decompress_dxt1(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height * 4];
    for (i, (bx, by)) in blocks(width, height).enumerate() {
        let Some(block) = data.get(i * DXT1_BLOCK_BYTES..(i + 1) * DXT1_BLOCK_BYTES) else {
            break;
        };
        let mut texels = [[0u8; 4]; 16];
        decode_colour_block(block, false, &mut texels);
        write_block_texels(&mut out, width, height, bx, by, &texels);
    }
    out
}

pub fn decompress_dxt5(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height * 4];
    for (i, (bx, by)) in blocks(width, height).enumerate() {
        let Some(block) = data.get(i * DXT5_BLOCK_BYTES..(i + 1) * DXT5_BLOCK_BYTES) else {
            break;
        };
        let mut texels = [[0u8; 4]; 16];
        decode_colour_block(&block[8..], true, &mut texels);

        let alphas = alpha_palette(block[0], block[1]);
        let mut bits = 0u64;
        for (k, &b) in block[2..8].iter().enumerate() {
            bits |= (b as u64) << (8 * k);
        }
        for (t, texel) in texels.iter_mut().enumerate() {
            texel[3] = alphas[((bits >> (3 * t)) & 7) as usize];
        }
        write_block_texels(&mut out, width, height, bx, by, &texels);
    }
    out
}

#[inline]
fn colour_distance(a: &[u8; 4], b: &[u8; 4]) -> u32 {
    (0..3).map(|c| (a[c] as i32 - b[c] as i32).pow(2) as u32).sum()
}

/// Bounding-box endpoints, four-colour mode, nearest palette entry.
fn encode_colour_block(texels: &[[u8; 4]; 16], out: &mut [u8]) {
    let mut lo = [255u8; 3];
    let mut hi = [0u8; 3];
    for t in texels {
        for c in 0..3 {
            lo[c] = lo[c].min(t[c]);
            hi[c] = hi[c].max(t[c]);
        }
    }
    let mut c0 = pack_565(hi);
    let mut c1 = pack_565(lo);
    if c0 < c1 {
        std::mem::swap(&mut c0, &mut c1);
    }

    let mut indices = 0u32;
    if c0 != c1 {
        let palette = colour_palette(c0, c1, true);
        for (i, t) in texels.iter().enumerate() {
            let best = (0..4)
                .min_by_key(|&p| colour_distance(t, &palette[p]))
                .unwrap_or(0) as u32;
            indices |= best << (2 * i);
        }
    }

    out[0..2].copy_from_slice(&c0.to_le_bytes());
    out[2..4].copy_from_slice(&c1.to_le_bytes());
    out[4..8].copy_from_slice(&indices.to_le_bytes());
}

fn encode_alpha_block(texels: &[[u8; 4]; 16], out: &mut [u8]) {
    let a0 = texels.iter().map(|t| t[3]).max().unwrap_or(255);
    let a1 = texels.iter().map(|t| t[3]).min().unwrap_or(255);
    out[0] = a0;
    out[1] = a1;

    let mut bits = 0u64;
    if a0 != a1 {
        let palette = alpha_palette(a0, a1);
        for (i, t) in texels.iter().enumerate() {
            let best = (0..8)
                .min_by_key(|&p| (palette[p] as i32 - t[3] as i32).unsigned_abs())
                .unwrap_or(0) as u64;
            bits |= best << (3 * i);
        }
    }
    for k in 0..6 {
        out[2 + k] = (bits >> (8 * k)) as u8;
    }
}

/// Compress opaque RGBA8 to DXT1. Alpha is ignored.
pub fn compress_dxt1(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; compressed_size(width, height, DXT1_BLOCK_BYTES)];
    for (i, (bx, by)) in blocks(width, height).enumerate() {
        let texels = read_block_texels(rgba, width, height, bx, by);
        encode_colour_block(&texels, &mut out[i * DXT1_BLOCK_BYTES..(i + 1) * DXT1_BLOCK_BYTES]);
    }
    out
}

pub fn compress_dxt5(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; compressed_size(width, height, DXT5_BLOCK_BYTES)];
    for (i, (bx, by)) in blocks(width, height).enumerate() {
        let texels = read_block_texels(rgba, width, height, bx, by);
        let block = &mut out[i * DXT5_BLOCK_BYTES..(i + 1) * DXT5_BLOCK_BYTES];
        encode_alpha_block(&texels, &mut block[..8]);
        encode_colour_block(&texels, &mut block[8..]);
    }
    out
}
