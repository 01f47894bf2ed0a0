//! Float images for cubemap baking: RGBA f32 bitmaps, six-face cubes,
//! Gaussian pyramids, PFM and TGA intermediates, RGBA8 resampling.

#![allow(clippy::needless_range_loop)]

pub mod float_bm;
pub mod float_cube;
pub mod pfm;
pub mod pyramid;
pub mod resample;
pub mod tga;

pub use float_bm::FloatBitMap;
pub use float_cube::{FloatCubeMap, CUBE_FACES, ENGINE_CUBEMAP_IDX_TO_FBM_IDX, FACE_SUFFIXES};
pub use pyramid::FloatImagePyramid;

use thiserror::Error;

/// Errors from bitmap file I/O.
#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid PFM: {0}")]
    InvalidPfm(String),

    #[error("pixel buffer is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}
