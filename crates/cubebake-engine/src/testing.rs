// testing.rs — in-memory stand-ins for the renderer, host and tools

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cubebake_bitmap::FACE_SUFFIXES;
use cubebake_bsp::{BspError, BspPack, CubemapSample, Level};
use cubebake_common::cvar::CvarContext;
use cubebake_common::files::FsContext;
use cubebake_common::q_shared::Vec3;
use cubebake_vtf::compiler::with_extension;
use cubebake_vtf::{CompiledVtfFlags, ImageFormat, TextureCompiler, VtexCompiler, VtfError, VtfTexture};

use crate::config::MAT_FASTSPECULAR;
use crate::default_cubemap::skybox_face_name;
use crate::host::EngineHost;
use crate::toolchain::{Toolchain, ToolchainProvider};
use crate::view::{ViewRenderer, ViewSetup};
use crate::BakeError;

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cubebake_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn test_level(gamedir: &Path, samples: Vec<CubemapSample>) -> Level {
    Level {
        world_model_path: "maps/test.bsp".into(),
        path: gamedir.join("maps/test.bsp"),
        cubemap_samples: samples,
        sky_name: "sky_test".into(),
        world_mins: [-128.0, -128.0, 0.0],
        world_maxs: [128.0, 128.0, 256.0],
        player_start: None,
        lights: Vec::new(),
        triangles: Vec::new(),
    }
}

/// Six RGBA8888 skybox faces of the given sizes.
pub fn write_skybox(fs: &FsContext, sky_name: &str, sizes: [(usize, usize); 6], flags: CompiledVtfFlags) {
    for (suffix, (w, h)) in FACE_SUFFIXES.iter().zip(sizes) {
        let tex = VtfTexture::init(w, h, ImageFormat::Rgba8888, flags, 1).unwrap();
        fs.write_file(&skybox_face_name(sky_name, suffix), &tex.serialize()).unwrap();
    }
}

// ============================================================
// Renderer
// ============================================================

/// Draws every view as one flat colour.
pub struct FakeRenderer {
    pub width: usize,
    pub height: usize,
    pub color: [u8; 3],
    pub views: Vec<ViewSetup>,
    pub exposures: Vec<f32>,
    pub swaps: usize,
    pub short_readback: bool,
}

impl FakeRenderer {
    pub fn new(width: usize, height: usize, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            color,
            views: Vec::new(),
            exposures: Vec::new(),
            swaps: 0,
            short_readback: false,
        }
    }
}

impl ViewRenderer for FakeRenderer {
    fn render_view(&mut self, view: &ViewSetup) {
        self.views.push(*view);
    }

    fn read_pixels(&mut self, _x: usize, _y: usize, width: usize, height: usize) -> Result<Vec<u8>, BakeError> {
        let texels = if self.short_readback { width * height / 2 } else { width * height };
        let [r, g, b] = self.color;
        Ok([r, g, b, 255].repeat(texels))
    }

    fn set_tone_mapping_scale(&mut self, scale: f32) {
        self.exposures.push(scale);
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
    }

    fn screen_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

// ============================================================
// Host
// ============================================================

pub struct FakeHost {
    pub level: Option<Level>,
    pub fs: FsContext,
    pub origin: Vec3,
    pub restarts: usize,
    pub material_reloads: usize,
    /// `mat_fastspecular` at each material config rebuild.
    pub fast_specular: Vec<String>,
}

impl FakeHost {
    pub fn new(gamedir: &Path, level: Level) -> Self {
        Self {
            level: Some(level),
            fs: FsContext::new(gamedir),
            origin: [0.0; 3],
            restarts: 0,
            material_reloads: 0,
            fast_specular: Vec::new(),
        }
    }
}

impl EngineHost for FakeHost {
    fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    fn view_origin(&self) -> Vec3 {
        self.origin
    }

    fn fs(&self) -> &FsContext {
        &self.fs
    }

    fn rebuild_material_system_config(&mut self, cvars: &CvarContext) {
        self.fast_specular.push(cvars.variable_string(MAT_FASTSPECULAR).to_string());
    }

    fn restart_level(&mut self) -> Result<(), BakeError> {
        self.restarts += 1;
        Ok(())
    }

    fn reload_materials(&mut self) {
        self.material_reloads += 1;
    }
}

// ============================================================
// Tools
// ============================================================

pub struct FailingCompiler;

impl TextureCompiler for FailingCompiler {
    fn compile_cubemap(&self, base: &Path) -> Result<(), VtfError> {
        Err(VtfError::Compile(format!("{}: rejected", base.display())))
    }
}

/// Writes a plain 2D texture where a cube map is expected.
pub struct FlatCompiler {
    pub width: usize,
    pub height: usize,
}

impl TextureCompiler for FlatCompiler {
    fn compile_cubemap(&self, base: &Path) -> Result<(), VtfError> {
        let tex = VtfTexture::init(self.width, self.height, ImageFormat::Rgba8888, CompiledVtfFlags::empty(), 1)?;
        std::fs::write(with_extension(base, "vtf"), tex.serialize())?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PackLog {
    pub loads: Vec<PathBuf>,
    pub added: Vec<String>,
    pub writes: usize,
}

pub struct RecordingPacker {
    log: Rc<RefCell<PackLog>>,
}

impl BspPack for RecordingPacker {
    fn load_bsp_file(&mut self, path: &Path) -> Result<(), BspError> {
        self.log.borrow_mut().loads.push(path.to_path_buf());
        Ok(())
    }

    fn add_buffer_to_pack(&mut self, name: &str, _data: &[u8]) -> Result<(), BspError> {
        self.log.borrow_mut().added.push(name.to_string());
        Ok(())
    }

    fn add_file_to_pack(&mut self, name: &str, path: &Path) -> Result<(), BspError> {
        let data = std::fs::read(path)?;
        self.add_buffer_to_pack(name, &data)
    }

    fn write_bsp_file(&mut self, _path: &Path) -> Result<(), BspError> {
        self.log.borrow_mut().writes += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeToolchain {
    pub log: Rc<RefCell<PackLog>>,
    pub failing_compiler: bool,
    pub fail_acquire: bool,
}

impl ToolchainProvider for FakeToolchain {
    fn acquire(&self) -> Result<Toolchain, BakeError> {
        if self.fail_acquire {
            return Err(BakeError::ToolLoad("vtex".into()));
        }
        let compiler: Box<dyn TextureCompiler> = if self.failing_compiler {
            Box::new(FailingCompiler)
        } else {
            Box::new(VtexCompiler::new())
        };
        Ok(Toolchain {
            compiler,
            packer: Box::new(RecordingPacker { log: self.log.clone() }),
        })
    }
}
