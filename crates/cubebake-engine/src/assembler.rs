// assembler.rs — six faces -> intermediates -> compiled, oriented cube VTF

use std::fs;
use std::path::{Path, PathBuf};

use cubebake_bitmap::float_cube::face_path;
use cubebake_bitmap::{tga, FloatBitMap, FloatCubeMap, FACE_SUFFIXES};
use cubebake_common::files::{create_path, remove_if_exists};
use cubebake_common::q_shared::Vec3;
use cubebake_vtf::compiler::with_extension;
use cubebake_vtf::{fix_cubemap_face_orientation, generate_spheremap, TextureCompiler, VtfError, VtfTexture};

use crate::hdr::bracket_hdr_cube;
use crate::snapshot::take_cube_snapshot;
use crate::view::ViewRenderer;
use crate::BakeError;

/// Rendered faces in engine order (rt, lf, bk, ft, up, dn).
#[derive(Debug, Clone)]
pub enum CubeFaces {
    Ldr([Vec<u8>; 6]),
    Hdr([FloatBitMap; 6]),
}

impl CubeFaces {
    pub fn is_hdr(&self) -> bool {
        matches!(self, CubeFaces::Hdr(_))
    }

    /// Face edge in texels.
    pub fn edge(&self) -> usize {
        match self {
            CubeFaces::Ldr(faces) => ((faces[0].len() / 4) as f64).sqrt() as usize,
            CubeFaces::Hdr(faces) => faces[0].width(),
        }
    }
}

/// Keys written next to the intermediates.
pub fn material_keys(hdr: bool) -> String {
    let mut keys = String::new();
    if hdr {
        keys.push_str("\"pfm\" \"1\"\n");
    }
    keys.push_str("\"stripalphachannel\" \"1\"\n");
    keys
}

fn intermediate_paths(base: &Path, hdr: bool) -> Vec<PathBuf> {
    let ext = if hdr { "pfm" } else { "tga" };
    let mut paths: Vec<PathBuf> = FACE_SUFFIXES.iter().map(|s| face_path(base, s, ext)).collect();
    paths.push(with_extension(base, "txt"));
    paths
}

fn write_intermediates(faces: &CubeFaces, base: &Path) -> Result<(), BakeError> {
    let edge = faces.edge();
    match faces {
        CubeFaces::Ldr(rgba) => {
            for (face, suffix) in rgba.iter().zip(FACE_SUFFIXES) {
                tga::write_tga_rgba8(&face_path(base, suffix, "tga"), edge, edge, face)?;
            }
        }
        CubeFaces::Hdr(maps) => {
            FloatCubeMap::from_engine_faces(maps.clone()).write_pfm_faces(base)?;
        }
    }
    fs::write(with_extension(base, "txt"), material_keys(faces.is_hdr()))?;
    Ok(())
}

/// Compile `faces` into `<base>.vtf`, orient the faces, add the spheremap
/// and return the final file contents. Intermediates are removed whether
/// or not the compile succeeds.
pub fn assemble_cubemap(compiler: &dyn TextureCompiler, faces: &CubeFaces, base: &Path) -> Result<Vec<u8>, BakeError> {
    create_path(base)?;

    let compiled = write_intermediates(faces, base).and_then(|()| compiler.compile_cubemap(base).map_err(BakeError::from));
    for path in intermediate_paths(base, faces.is_hdr()) {
        if let Err(e) = remove_if_exists(&path) {
            log::warn!("can't remove {}: {}", path.display(), e);
        }
    }
    compiled?;

    let vtf_path = with_extension(base, "vtf");
    let mut tex = VtfTexture::unserialize(&fs::read(&vtf_path)?)?;
    if !tex.is_cube_map() || tex.width() != tex.height() {
        return Err(VtfError::Compile(format!(
            "{} is not a square cube map ({}x{}, {} faces)",
            vtf_path.display(),
            tex.width(),
            tex.height(),
            tex.face_count()
        ))
        .into());
    }
    fix_cubemap_face_orientation(&mut tex);
    generate_spheremap(&mut tex);
    let data = tex.serialize();
    fs::write(&vtf_path, &data)?;
    log::debug!("assembled {} ({}x{} {})", vtf_path.display(), tex.width(), tex.height(), tex.format());
    Ok(data)
}

/// Render and assemble one cube at `origin`.
pub fn bake_cubemap_at(
    renderer: &mut dyn ViewRenderer,
    compiler: &dyn TextureCompiler,
    origin: Vec3,
    face_size: usize,
    hdr: bool,
    base: &Path,
) -> Result<Vec<u8>, BakeError> {
    let faces = if hdr {
        CubeFaces::Hdr(bracket_hdr_cube(renderer, origin, face_size)?)
    } else {
        CubeFaces::Ldr(take_cube_snapshot(renderer, origin, face_size)?)
    };
    assemble_cubemap(compiler, &faces, base)
}
