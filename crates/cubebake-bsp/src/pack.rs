// pack.rs — adding files to a BSP's pakfile lump

use std::fs;
use std::path::Path;

use crate::bsp::BspFile;
use crate::pakfile::PakFile;
use crate::BspError;

/// The packer interface the bake drives: load a BSP, add entries to its
/// pakfile, write it back.
pub trait BspPack {
    fn load_bsp_file(&mut self, path: &Path) -> Result<(), BspError>;
    /// Add or replace `name` (a `/`-separated pak path).
    fn add_buffer_to_pack(&mut self, name: &str, data: &[u8]) -> Result<(), BspError>;
    fn add_file_to_pack(&mut self, name: &str, path: &Path) -> Result<(), BspError>;
    fn write_bsp_file(&mut self, path: &Path) -> Result<(), BspError>;
}

/// Built-in packer working on an in-memory `BspFile`.
#[derive(Debug, Default)]
pub struct VbspPack {
    bsp: Option<BspFile>,
    pak: PakFile,
}

impl VbspPack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pak(&self) -> &PakFile {
        &self.pak
    }
}

impl BspPack for VbspPack {
    fn load_bsp_file(&mut self, path: &Path) -> Result<(), BspError> {
        let bsp = BspFile::load(path)?;
        self.pak = bsp.pak_file()?;
        log::debug!("loaded {} ({} packed files)", path.display(), self.pak.len());
        self.bsp = Some(bsp);
        Ok(())
    }

    fn add_buffer_to_pack(&mut self, name: &str, data: &[u8]) -> Result<(), BspError> {
        if self.bsp.is_none() {
            return Err(BspError::NotLoaded);
        }
        self.pak.add_buffer(name, data.to_vec());
        Ok(())
    }

    fn add_file_to_pack(&mut self, name: &str, path: &Path) -> Result<(), BspError> {
        let data = fs::read(path)?;
        self.add_buffer_to_pack(name, &data)
    }

    fn write_bsp_file(&mut self, path: &Path) -> Result<(), BspError> {
        let bsp = self.bsp.as_mut().ok_or(BspError::NotLoaded)?;
        bsp.set_pak_file(&self.pak);
        bsp.write(path)?;
        log::info!("wrote {} ({} packed files)", path.display(), self.pak.len());
        Ok(())
    }
}
