// toolchain.rs — texture compiler and BSP packer acquisition
// A toolchain lives for one bake; dropping it releases any loaded library.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use cubebake_bsp::{BspPack, VbspPack};
use cubebake_vtf::{TextureCompiler, VtexCompiler, VtfError};

use crate::BakeError;

pub struct Toolchain {
    pub compiler: Box<dyn TextureCompiler>,
    pub packer: Box<dyn BspPack>,
}

pub trait ToolchainProvider {
    fn acquire(&self) -> Result<Toolchain, BakeError>;
}

// ============================================================
// Built-in tools
// ============================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinToolchain;

impl ToolchainProvider for BuiltinToolchain {
    fn acquire(&self) -> Result<Toolchain, BakeError> {
        Ok(Toolchain {
            compiler: Box::new(VtexCompiler::new()),
            packer: Box::new(VbspPack::new()),
        })
    }
}

// ============================================================
// External texture compiler library
// ============================================================

/// `int VTex_CompileCubemap(const char *base)`, 0 on success.
type CompileCubemapFn = unsafe extern "C" fn(*const c_char) -> c_int;

const COMPILE_CUBEMAP_SYMBOL: &[u8] = b"VTex_CompileCubemap\0";

/// A texture compiler in a shared library. The packer stays built in.
pub struct DllCompiler {
    compile: CompileCubemapFn,
    /// Keeps `compile` valid.
    _library: Library,
}

impl DllCompiler {
    /// # Safety
    /// `path` must name a library whose `VTex_CompileCubemap` has the
    /// signature above and whose initialisers are safe to run.
    pub unsafe fn load(path: &Path) -> Result<Self, BakeError> {
        if !path.exists() {
            return Err(BakeError::ToolLoad(format!("{} (not found)", path.display())));
        }

        let library = Library::new(path).map_err(|e| BakeError::ToolLoad(format!("{}: {}", path.display(), e)))?;
        let compile = {
            let symbol: Symbol<CompileCubemapFn> = library
                .get(COMPILE_CUBEMAP_SYMBOL)
                .map_err(|e| BakeError::ToolLoad(format!("VTex_CompileCubemap in {}: {}", path.display(), e)))?;
            *symbol
        };

        log::info!("loaded texture compiler {}", path.display());
        Ok(Self {
            compile,
            _library: library,
        })
    }
}

impl TextureCompiler for DllCompiler {
    fn compile_cubemap(&self, base: &Path) -> Result<(), VtfError> {
        let name = CString::new(base.to_string_lossy().as_bytes())
            .map_err(|_| VtfError::Compile(format!("{}: path contains NUL", base.display())))?;
        let status = unsafe { (self.compile)(name.as_ptr()) };
        if status != 0 {
            return Err(VtfError::Compile(format!("{}: compiler returned {}", base.display(), status)));
        }
        Ok(())
    }
}

/// Loads the compiler library afresh for every bake.
#[derive(Debug, Clone)]
pub struct DllToolchain {
    compiler_path: PathBuf,
}

impl DllToolchain {
    pub fn new(compiler_path: impl Into<PathBuf>) -> Self {
        Self {
            compiler_path: compiler_path.into(),
        }
    }

    pub fn compiler_path(&self) -> &Path {
        &self.compiler_path
    }
}

impl ToolchainProvider for DllToolchain {
    fn acquire(&self) -> Result<Toolchain, BakeError> {
        let compiler = unsafe { DllCompiler::load(&self.compiler_path)? };
        Ok(Toolchain {
            compiler: Box::new(compiler),
            packer: Box::new(VbspPack::new()),
        })
    }
}
