// tga.rs — TGA face intermediates through the `image` crate

use std::fs;
use std::path::Path;

use image::codecs::tga::TgaEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use crate::BitmapError;

/// Encode an RGBA8 image as a 32-bit TGA.
pub fn encode_tga_rgba8(width: usize, height: usize, rgba: &[u8]) -> Result<Vec<u8>, BitmapError> {
    let expected = width * height * 4;
    if rgba.len() != expected {
        return Err(BitmapError::SizeMismatch { expected, actual: rgba.len() });
    }
    let mut out = Vec::with_capacity(expected + 18);
    TgaEncoder::new(&mut out).write_image(
        rgba,
        width as u32,
        height as u32,
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

pub fn write_tga_rgba8(path: &Path, width: usize, height: usize, rgba: &[u8]) -> Result<(), BitmapError> {
    fs::write(path, encode_tga_rgba8(width, height, rgba)?)?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Decode any TGA into RGBA8. Returns (pixels, width, height).
pub fn decode_tga(raw: &[u8]) -> Result<(Vec<u8>, usize, usize), BitmapError> {
    let img = image::load_from_memory_with_format(raw, ImageFormat::Tga)?;
    let rgba = img.to_rgba8();
    let width = rgba.width() as usize;
    let height = rgba.height() as usize;
    Ok((rgba.into_raw(), width, height))
}

pub fn read_tga(path: &Path) -> Result<(Vec<u8>, usize, usize), BitmapError> {
    decode_tga(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tga_round_trip() {
        let pixels: Vec<u8> = (0..3 * 2 * 4).map(|i| (i * 7) as u8).collect();
        let bytes = encode_tga_rgba8(3, 2, &pixels).unwrap();
        let (back, w, h) = decode_tga(&bytes).unwrap();
        assert_eq!((w, h), (3, 2));
        assert_eq!(back, pixels);
    }

    #[test]
    fn test_tga_size_mismatch() {
        assert!(matches!(
            encode_tga_rgba8(2, 2, &[0u8; 4]),
            Err(BitmapError::SizeMismatch { expected: 16, actual: 4 })
        ));
    }
}
