// envmap.rs — the `envmap` command: one cube at the view origin, not packed

use std::path::PathBuf;

use cubebake_common::cvar::CvarContext;
use cubebake_common::files::MATERIALSRC_DIR;
use cubebake_vtf::compiler::with_extension;

use crate::assembler::bake_cubemap_at;
use crate::bake::{check_face_buffer, sample_texture_name};
use crate::config::{default_face_size, hdr_enabled};
use crate::host::EngineHost;
use crate::toolchain::ToolchainProvider;
use crate::view::ViewRenderer;
use crate::BakeError;

pub fn envmap_source_name(origin: [i32; 3], hdr: bool) -> String {
    format!("{}/envmap/{}", MATERIALSRC_DIR, sample_texture_name(origin, hdr))
}

/// Bake a cube of edge `mat_envmaptgasize` where the view stands. Returns
/// the written `.vtf`.
pub fn take_envmap(
    cvars: &CvarContext,
    host: &dyn EngineHost,
    renderer: &mut dyn ViewRenderer,
    toolchain: &dyn ToolchainProvider,
) -> Result<PathBuf, BakeError> {
    let face_size = default_face_size(cvars);
    check_face_buffer(face_size, renderer.screen_size())?;

    let origin = host.view_origin();
    let hdr = hdr_enabled(cvars);
    let int_origin = origin.map(|v| v as i32);
    let base = host.fs().full_path(&envmap_source_name(int_origin, hdr));

    let tools = toolchain.acquire()?;
    bake_cubemap_at(renderer, tools.compiler.as_ref(), origin, face_size, hdr, &base)?;
    let path = with_extension(&base, "vtf");
    log::info!("wrote {}", path.display());
    Ok(path)
}
