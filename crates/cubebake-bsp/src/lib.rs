//! Source BSP access for the cubemap bake: the VBSP container, its pakfile
//! archive, entities, level extraction and the packer used to store baked
//! textures.

pub mod bsp;
pub mod entities;
pub mod level;
pub mod pack;
pub mod pakfile;

pub use bsp::BspFile;
pub use entities::{parse_entities, Entity};
pub use level::{CubemapSample, Level, LevelLight, LevelLightKind, LevelTriangle};
pub use pack::{BspPack, VbspPack};
pub use pakfile::PakFile;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BspError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("BSP truncated reading {0}")]
    Truncated(&'static str),

    #[error("not a VBSP file (ident {0:#x})")]
    BadIdent(i32),

    #[error("unsupported BSP version {0}")]
    UnsupportedVersion(i32),

    #[error("lump {0} is out of range")]
    BadLump(usize),

    #[error("pakfile: {0}")]
    Zip(String),

    #[error("entity lump: {0}")]
    Entity(String),

    #[error("no BSP loaded")]
    NotLoaded,
}
