// format.rs — VTF image formats and texture flags

use bitflags::bitflags;

use crate::dxt::{compressed_size, DXT1_BLOCK_BYTES, DXT5_BLOCK_BYTES};

/// Storage formats understood by the container. Values match the on-disk
/// `image_format` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Rgba8888,
    Rgb888,
    Bgr888,
    Bgra8888,
    Dxt1,
    Dxt5,
    Bgrx8888,
    Rgba16161616F,
    Rgba32323232F,
}

impl ImageFormat {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Rgba8888,
            2 => Self::Rgb888,
            3 => Self::Bgr888,
            12 => Self::Bgra8888,
            13 => Self::Dxt1,
            15 => Self::Dxt5,
            16 => Self::Bgrx8888,
            24 => Self::Rgba16161616F,
            29 => Self::Rgba32323232F,
            _ => return None,
        })
    }

    pub fn to_i32(self) -> i32 {
        match self {
            Self::Rgba8888 => 0,
            Self::Rgb888 => 2,
            Self::Bgr888 => 3,
            Self::Bgra8888 => 12,
            Self::Dxt1 => 13,
            Self::Dxt5 => 15,
            Self::Bgrx8888 => 16,
            Self::Rgba16161616F => 24,
            Self::Rgba32323232F => 29,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rgba8888 => "RGBA8888",
            Self::Rgb888 => "RGB888",
            Self::Bgr888 => "BGR888",
            Self::Bgra8888 => "BGRA8888",
            Self::Dxt1 => "DXT1",
            Self::Dxt5 => "DXT5",
            Self::Bgrx8888 => "BGRX8888",
            Self::Rgba16161616F => "RGBA16161616F",
            Self::Rgba32323232F => "RGBA32323232F",
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt5)
    }

    /// Texels decode to f32 rather than RGBA8.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Rgba16161616F | Self::Rgba32323232F)
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Rgba8888 | Self::Bgra8888 | Self::Dxt5 | Self::Rgba16161616F | Self::Rgba32323232F
        )
    }

    /// Bytes per texel for uncompressed formats.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb888 | Self::Bgr888 => 3,
            Self::Rgba8888 | Self::Bgra8888 | Self::Bgrx8888 => 4,
            Self::Rgba16161616F => 8,
            Self::Rgba32323232F => 16,
            Self::Dxt1 | Self::Dxt5 => 0,
        }
    }

    /// Encoded size of one `width x height` image.
    pub fn image_size(self, width: usize, height: usize) -> usize {
        match self {
            Self::Dxt1 => compressed_size(width, height, DXT1_BLOCK_BYTES),
            Self::Dxt5 => compressed_size(width, height, DXT5_BLOCK_BYTES),
            _ => width * height * self.bytes_per_pixel(),
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Texture flags stored in the VTF header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompiledVtfFlags: u32 {
        const POINTSAMPLE       = 0x0000_0001;
        const TRILINEAR         = 0x0000_0002;
        const CLAMPS            = 0x0000_0004;
        const CLAMPT            = 0x0000_0008;
        const ANISOTROPIC       = 0x0000_0010;
        const HINT_DXT5         = 0x0000_0020;
        const NOCOMPRESS        = 0x0000_0040;
        const NORMAL            = 0x0000_0080;
        const NOMIP             = 0x0000_0100;
        const NOLOD             = 0x0000_0200;
        const MINMIP            = 0x0000_0400;
        const PROCEDURAL        = 0x0000_0800;
        const ONEBITALPHA       = 0x0000_1000;
        const EIGHTBITALPHA     = 0x0000_2000;
        const ENVMAP            = 0x0000_4000;
        const RENDERTARGET      = 0x0000_8000;
        const DEPTHRENDERTARGET = 0x0001_0000;
        const NODEBUGOVERRIDE   = 0x0002_0000;
        const SINGLECOPY        = 0x0004_0000;
    }
}
