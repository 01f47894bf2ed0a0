//! The cubemap bake: renderer and host seams, per-face snapshots, HDR
//! exposure bracketing, cube assembly, the default cubemap, the bake
//! orchestrator and the `envmap` / `lightprobe` commands, plus a BSP-backed
//! host and a ray-traced renderer to drive them.

#![allow(clippy::needless_range_loop)]

pub mod assembler;
pub mod bake;
pub mod config;
pub mod default_cubemap;
pub mod envmap;
pub mod hdr;
pub mod host;
pub mod level_host;
pub mod lightprobe;
pub mod snapshot;
pub mod soft_renderer;
pub mod toolchain;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{assemble_cubemap, bake_cubemap_at, CubeFaces};
pub use bake::{bake_cubemaps, BakeContext, BakeReport};
pub use host::EngineHost;
pub use level_host::BspLevelHost;
pub use soft_renderer::{SharedScene, SoftRenderer};
pub use toolchain::{BuiltinToolchain, DllToolchain, Toolchain, ToolchainProvider};
pub use view::{RenderFlags, ViewRenderer, ViewSetup};

use std::path::PathBuf;

use cubebake_bitmap::BitmapError;
use cubebake_bsp::BspError;
use cubebake_vtf::VtfError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Bitmap(#[from] BitmapError),

    #[error("{0}")]
    Vtf(#[from] VtfError),

    #[error("{0}")]
    Bsp(#[from] BspError),

    #[error("no map loaded")]
    NoMapLoaded,

    #[error("{} is not writable", .0.display())]
    NotWritable(PathBuf),

    #[error(
        "cubemap face size {face_size} needs a {required}x{required} buffer, \
         screen is {screen_width}x{screen_height}"
    )]
    BufferTooSmall {
        face_size: usize,
        required: usize,
        screen_width: usize,
        screen_height: usize,
    },

    #[error("can't load {0}")]
    ToolLoad(String),

    #[error("readback failed: {0}")]
    Readback(String),
}
