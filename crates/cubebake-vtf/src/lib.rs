//! VTF textures: the 7.2 container, DXT and half-float codecs, cube face
//! orientation, spheremaps and the built-in cube texture compiler.

#![allow(clippy::needless_range_loop)]

pub mod compiler;
pub mod dxt;
pub mod format;
pub mod orient;
pub mod vtf;

pub use compiler::{TextureCompiler, VtexCompiler};
pub use format::{CompiledVtfFlags, ImageFormat};
pub use orient::{fix_cubemap_face_orientation, generate_spheremap, CUBEMAP_FACE_ANGLES};
pub use vtf::{TexelBuffer, VtfHeaderInfo, VtfTexture};

use cubebake_bitmap::BitmapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VtfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Bitmap(#[from] BitmapError),

    #[error("not a VTF file")]
    BadSignature,

    #[error("unsupported VTF version {0}.{1}")]
    UnsupportedVersion(u32, u32),

    #[error("unsupported image format {0}")]
    UnsupportedFormat(i32),

    #[error("VTF data truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid texture dimensions {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("volume textures are not supported (depth {0})")]
    VolumeTexture(usize),

    #[error("texture compile failed: {0}")]
    Compile(String),
}
