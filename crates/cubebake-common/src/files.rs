// files.rs — game-directory file system

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Config file executed at start-up when present.
pub const AUTOEXEC_CFG: &str = "cubebake.cfg";

/// Root of intermediate (source) material files.
pub const MATERIALSRC_DIR: &str = "materialsrc";
/// Root of compiled material files.
pub const MATERIALS_DIR: &str = "materials";

/// File-system state: the writable game directory plus read-only fallbacks.
///
/// Relative names always use `/`. Lookups try the game directory first,
/// then each extra search path in the order it was added.
#[derive(Debug, Clone)]
pub struct FsContext {
    gamedir: PathBuf,
    search_paths: Vec<PathBuf>,
}

impl FsContext {
    pub fn new(gamedir: impl Into<PathBuf>) -> Self {
        Self {
            gamedir: gamedir.into(),
            search_paths: Vec::new(),
        }
    }

    pub fn gamedir(&self) -> &Path {
        &self.gamedir
    }

    /// Add a read-only directory searched after the game directory.
    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.search_paths.contains(&dir) {
            log::debug!("Added search path {}", dir.display());
            self.search_paths.push(dir);
        }
    }

    /// Where a relative name lives (or will live) inside the game directory.
    pub fn full_path(&self, name: &str) -> PathBuf {
        let mut path = self.gamedir.clone();
        for part in name.split(['/', '\\']).filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }

    /// Locate an existing file along the search path.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        std::iter::once(&self.gamedir)
            .chain(self.search_paths.iter())
            .map(|dir| {
                let mut path = dir.clone();
                path.extend(name.split(['/', '\\']).filter(|p| !p.is_empty()));
                path
            })
            .find(|path| path.is_file())
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.find_file(name).is_some()
    }

    /// Load a whole file. Returns None if it is not on the search path or
    /// cannot be read.
    pub fn load_file(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.find_file(name)?;
        match fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("FS_LoadFile: couldn't read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load a text file, replacing invalid UTF-8.
    pub fn load_text(&self, name: &str) -> Option<String> {
        self.load_file(name).map(|data| String::from_utf8_lossy(&data).into_owned())
    }

    /// Write a file into the game directory, creating parent directories.
    pub fn write_file(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.full_path(name);
        create_path(&path)?;
        fs::write(&path, data)?;
        log::debug!("wrote {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    /// Remove a file from the game directory. Missing files are not an error.
    pub fn remove_file(&self, name: &str) -> io::Result<()> {
        remove_if_exists(&self.full_path(name))
    }

    /// Contents of the start-up config, if it exists.
    pub fn exec_autoexec(&self) -> Option<String> {
        self.load_text(AUTOEXEC_CFG)
    }
}

/// Creates any intermediate directories needed to store the given file.
pub fn create_path(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// True if the existing file at `path` can be opened for writing.
/// The file is not truncated or modified.
pub fn is_writable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.permissions().readonly() => false,
        Ok(meta) if meta.is_file() => OpenOptions::new().append(true).open(path).is_ok(),
        _ => false,
    }
}

// ============================================================
// Unit tests
// ============================================================
