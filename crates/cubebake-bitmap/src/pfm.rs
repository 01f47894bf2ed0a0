// pfm.rs — Portable Float Map reader/writer
//
// Header: "PF\n<width> <height>\n<scale>\n", then width*height RGB f32
// triples, bottom row first. A negative scale means little-endian data.

use std::fs;
use std::path::Path;

use crate::float_bm::FloatBitMap;
use crate::BitmapError;

impl FloatBitMap {
    /// Serialize RGB as a little-endian PFM. Alpha is not stored.
    pub fn encode_pfm(&self) -> Vec<u8> {
        let header = format!("PF\n{} {}\n-1.0\n", self.width(), self.height());
        let mut out = Vec::with_capacity(header.len() + self.width() * self.height() * 12);
        out.extend_from_slice(header.as_bytes());
        for y in (0..self.height()).rev() {
            for x in 0..self.width() {
                for c in 0..3 {
                    out.extend_from_slice(&self.pixel(x, y, c).to_le_bytes());
                }
            }
        }
        out
    }

    pub fn write_pfm(&self, path: &Path) -> Result<(), BitmapError> {
        fs::write(path, self.encode_pfm())?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Parse a PFM. Colour ("PF") and greyscale ("Pf") files are accepted;
    /// alpha is set to 1.
    pub fn decode_pfm(data: &[u8]) -> Result<FloatBitMap, BitmapError> {
        let mut pos = 0;
        let mut next_token = || -> Result<String, BitmapError> {
            while pos < data.len() && data[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let start = pos;
            while pos < data.len() && !data[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if start == pos {
                return Err(BitmapError::InvalidPfm("truncated header".into()));
            }
            let token = String::from_utf8_lossy(&data[start..pos]).into_owned();
            // exactly one whitespace byte separates each header field
            pos += 1;
            Ok(token)
        };

        let channels = match next_token()?.as_str() {
            "PF" => 3,
            "Pf" => 1,
            other => return Err(BitmapError::InvalidPfm(format!("bad magic {:?}", other))),
        };
        let width: usize = parse_field(&next_token()?, "width")?;
        let height: usize = parse_field(&next_token()?, "height")?;
        let scale: f32 = parse_field(&next_token()?, "scale")?;
        if width == 0 || height == 0 {
            return Err(BitmapError::InvalidPfm(format!("empty image {}x{}", width, height)));
        }
        let little_endian = scale < 0.0;

        let body = &data[pos.min(data.len())..];
        let expected = width * height * channels * 4;
        if body.len() < expected {
            return Err(BitmapError::SizeMismatch { expected, actual: body.len() });
        }

        let mut bm = FloatBitMap::new(width, height);
        let mut words = body.chunks_exact(4).map(|b| {
            let bytes = [b[0], b[1], b[2], b[3]];
            if little_endian {
                f32::from_le_bytes(bytes)
            } else {
                f32::from_be_bytes(bytes)
            }
        });
        for y in (0..height).rev() {
            for x in 0..width {
                let mut texel = [0.0, 0.0, 0.0, 1.0];
                for c in 0..channels {
                    texel[c] = words.next().unwrap_or(0.0);
                }
                if channels == 1 {
                    texel[1] = texel[0];
                    texel[2] = texel[0];
                }
                bm.set_texel(x, y, texel);
            }
        }
        Ok(bm)
    }

    pub fn read_pfm(path: &Path) -> Result<FloatBitMap, BitmapError> {
        Self::decode_pfm(&fs::read(path)?)
    }
}

fn parse_field<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, BitmapError> {
    token
        .parse()
        .map_err(|_| BitmapError::InvalidPfm(format!("bad {} {:?}", what, token)))
}
