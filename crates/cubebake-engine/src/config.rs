// config.rs — console variables read and written by the bake

use cubebake_common::cvar::{CvarContext, CvarFlags};

pub const MAT_ENVMAPTGASIZE: &str = "mat_envmaptgasize";
pub const MAT_HDR_LEVEL: &str = "mat_hdr_level";
pub const MAT_FASTSPECULAR: &str = "mat_fastspecular";
pub const CL_MOUSEENABLE: &str = "cl_mouseenable";
pub const R_SHADOWS: &str = "r_shadows";
pub const R_DRAWWATER: &str = "r_drawwater";
pub const R_LIGHTSTYLE: &str = "r_lightstyle";
pub const R_DRAWBEAMS: &str = "r_drawbeams";
pub const R_PORTALSOPENALL: &str = "r_portalsopenall";
pub const R_OCCLUSION: &str = "r_occlusion";
pub const MAT_DISABLE_BLOOM: &str = "mat_disable_bloom";
pub const R_DRAWPROPS: &str = "r_drawprops";
pub const R_DRAWLIGHTSPRITES: &str = "r_drawlightsprites";
pub const BUILDING_CUBEMAPS: &str = "building_cubemaps";
pub const DEVELOPER: &str = "developer";

/// Everything `bake_cubemaps` changes. Captured before the first change,
/// restored on every exit.
pub const BAKE_SAVED_CVARS: [&str; 12] = [
    CL_MOUSEENABLE,
    R_SHADOWS,
    R_DRAWWATER,
    R_LIGHTSTYLE,
    R_DRAWBEAMS,
    MAT_FASTSPECULAR,
    R_PORTALSOPENALL,
    R_OCCLUSION,
    MAT_DISABLE_BLOOM,
    R_DRAWPROPS,
    R_DRAWLIGHTSPRITES,
    BUILDING_CUBEMAPS,
];

/// Values forced for the whole bake.
pub const BAKE_OVERRIDES: [(&str, &str); 9] = [
    (CL_MOUSEENABLE, "0"),
    (R_SHADOWS, "0"),
    (R_DRAWWATER, "0"),
    (R_LIGHTSTYLE, "0"),
    (R_DRAWBEAMS, "0"),
    (R_PORTALSOPENALL, "1"),
    (R_OCCLUSION, "0"),
    (MAT_DISABLE_BLOOM, "1"),
    (BUILDING_CUBEMAPS, "1"),
];

pub fn register_cvars(cvars: &mut CvarContext) {
    cvars.get(MAT_ENVMAPTGASIZE, "32", CvarFlags::ARCHIVE);
    cvars.get(MAT_HDR_LEVEL, "0", CvarFlags::ARCHIVE);
    cvars.get(MAT_FASTSPECULAR, "1", CvarFlags::empty());
    cvars.get(CL_MOUSEENABLE, "1", CvarFlags::ARCHIVE);
    cvars.get(R_SHADOWS, "1", CvarFlags::empty());
    cvars.get(R_DRAWWATER, "1", CvarFlags::empty());
    cvars.get(R_LIGHTSTYLE, "-1", CvarFlags::empty());
    cvars.get(R_DRAWBEAMS, "1", CvarFlags::empty());
    cvars.get(R_PORTALSOPENALL, "0", CvarFlags::empty());
    cvars.get(R_OCCLUSION, "1", CvarFlags::empty());
    cvars.get(MAT_DISABLE_BLOOM, "0", CvarFlags::empty());
    cvars.get(R_DRAWPROPS, "1", CvarFlags::empty());
    cvars.get(R_DRAWLIGHTSPRITES, "0", CvarFlags::empty());
    cvars.get(BUILDING_CUBEMAPS, "0", CvarFlags::empty());
    cvars.get(DEVELOPER, "0", CvarFlags::empty());
}

/// Default face edge for samples of size 0; never below 1.
pub fn default_face_size(cvars: &CvarContext) -> usize {
    cvars.variable_int(MAT_ENVMAPTGASIZE).max(1) as usize
}

pub fn hdr_enabled(cvars: &CvarContext) -> bool {
    cvars.variable_int(MAT_HDR_LEVEL) >= 2
}
