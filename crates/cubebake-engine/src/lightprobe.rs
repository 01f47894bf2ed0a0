// lightprobe.rs — the `lightprobe` command: a cube plus an ambient cube file

use std::fmt::Write as _;

use cubebake_bitmap::FloatBitMap;
use cubebake_common::cvar::CvarContext;
use cubebake_common::files::{MATERIALSRC_DIR, MATERIALS_DIR};
use cubebake_common::q_shared::{angle_vectors_tuple, dot_product, vector_add, vector_ma, vector_normalize, Vec3};
use cubebake_raytrace::RayTracingEnvironment;
use cubebake_vtf::CUBEMAP_FACE_ANGLES;

use crate::assembler::{assemble_cubemap, CubeFaces};
use crate::bake::check_face_buffer;
use crate::config::hdr_enabled;
use crate::hdr::{bracket_hdr_cube, HDR_GAMMA};
use crate::host::EngineHost;
use crate::snapshot::take_cube_snapshot;
use crate::toolchain::ToolchainProvider;
use crate::view::ViewRenderer;
use crate::BakeError;

pub const DEFAULT_PROBE_EDGE: usize = 32;

/// +X, -X, +Y, -Y, +Z, -Z
pub const AMBIENT_CUBE_AXES: [Vec3; 6] = [
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

#[derive(Debug, Clone, PartialEq)]
pub struct LightProbe {
    pub name: String,
    /// Texture name relative to `materials/`.
    pub cubemap: String,
    pub origin: Vec3,
    pub edge: usize,
    pub ambient_cube: [Vec3; 6],
    /// Indices of the level lights that reach the origin.
    pub visible_lights: Vec<usize>,
}

/// Cosine-weighted average radiance around each axis, from six linear faces
/// in engine order.
pub fn ambient_cube_from_faces(faces: &[FloatBitMap; 6]) -> [Vec3; 6] {
    let mut sums = [[0.0f32; 3]; 6];
    let mut weights = [0.0f32; 6];

    for (face, bm) in faces.iter().enumerate() {
        let (forward, right, up) = angle_vectors_tuple(&CUBEMAP_FACE_ANGLES[face]);
        let n = bm.width();
        for y in 0..n {
            let t = 1.0 - 2.0 * (y as f32 + 0.5) / n as f32;
            for x in 0..n {
                let s = 2.0 * (x as f32 + 0.5) / n as f32 - 1.0;
                // texel solid angle, up to a constant
                let solid_angle = (1.0 + s * s + t * t).powf(-1.5);
                let mut dir = vector_ma(&vector_ma(&forward, s, &right), t, &up);
                vector_normalize(&mut dir);
                let texel = bm.texel(x, y);
                for (axis, normal) in AMBIENT_CUBE_AXES.iter().enumerate() {
                    let w = dot_product(&dir, normal).max(0.0) * solid_angle;
                    if w > 0.0 {
                        sums[axis] = vector_ma(&sums[axis], w, &[texel[0], texel[1], texel[2]]);
                        weights[axis] += w;
                    }
                }
            }
        }
    }

    std::array::from_fn(|axis| {
        if weights[axis] > 0.0 {
            sums[axis].map(|v| v / weights[axis])
        } else {
            [0.0; 3]
        }
    })
}

/// Add the unoccluded direct light at `origin` to `cube`; returns the
/// indices of the lights that contributed.
pub fn add_direct_lighting(tracer: &RayTracingEnvironment, origin: &Vec3, cube: &mut [Vec3; 6]) -> Vec<usize> {
    let visible = tracer.compute_visible_lights(origin);
    for &index in &visible {
        let light = &tracer.light_list[index];
        for (axis, normal) in AMBIENT_CUBE_AXES.iter().enumerate() {
            cube[axis] = vector_add(&cube[axis], &light.intensity_at(origin, Some(normal)));
        }
    }
    visible
}

/// KeyValues text of a `.prb` file.
pub fn probe_keyvalues(probe: &LightProbe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\"lightprobe\"\n{{");
    let _ = writeln!(out, "\t\"cubemap\"\t\"{}\"", probe.cubemap);
    let [x, y, z] = probe.origin;
    let _ = writeln!(out, "\t\"origin\"\t\"{} {} {}\"", x, y, z);
    let _ = writeln!(out, "\t\"edge\"\t\"{}\"", probe.edge);
    let _ = writeln!(out, "\t\"ambientcube\"\n\t{{");
    for (axis, [r, g, b]) in probe.ambient_cube.iter().enumerate() {
        let _ = writeln!(out, "\t\t\"{}\"\t\"{:.6} {:.6} {:.6}\"", axis, r, g, b);
    }
    let _ = writeln!(out, "\t}}");
    let lights: Vec<String> = probe.visible_lights.iter().map(|i| i.to_string()).collect();
    let _ = writeln!(out, "\t\"visiblelights\"\t\"{}\"", lights.join(" "));
    let _ = writeln!(out, "}}");
    out
}

/// Bake a probe named `name` at the view origin.
pub fn take_light_probe(
    cvars: &CvarContext,
    host: &dyn EngineHost,
    renderer: &mut dyn ViewRenderer,
    toolchain: &dyn ToolchainProvider,
    name: &str,
    edge: Option<usize>,
) -> Result<LightProbe, BakeError> {
    let edge = edge.unwrap_or(DEFAULT_PROBE_EDGE).max(1);
    check_face_buffer(edge, renderer.screen_size())?;

    let origin = host.view_origin();
    let hdr = hdr_enabled(cvars);
    let texture = format!("lightprobes/{}{}", name, if hdr { "_hdr" } else { "" });

    let faces = if hdr {
        CubeFaces::Hdr(bracket_hdr_cube(renderer, origin, edge)?)
    } else {
        CubeFaces::Ldr(take_cube_snapshot(renderer, origin, edge)?)
    };
    let linear: [FloatBitMap; 6] = match &faces {
        CubeFaces::Hdr(maps) => maps.clone(),
        CubeFaces::Ldr(rgba) => std::array::from_fn(|i| {
            let mut bm = FloatBitMap::from_rgba8(edge, edge, &rgba[i]);
            bm.raise_to_power(HDR_GAMMA);
            bm
        }),
    };
    let mut ambient_cube = ambient_cube_from_faces(&linear);
    let visible_lights = match host.tracer() {
        Some(tracer) => add_direct_lighting(&tracer, &origin, &mut ambient_cube),
        None => {
            log::debug!("lightprobe {}: no tracer, direct light skipped", name);
            Vec::new()
        }
    };

    let tools = toolchain.acquire()?;
    let base = host.fs().full_path(&format!("{}/{}", MATERIALSRC_DIR, texture));
    let vtf = assemble_cubemap(tools.compiler.as_ref(), &faces, &base)?;
    host.fs().write_file(&format!("{}/{}.vtf", MATERIALS_DIR, texture), &vtf)?;

    let probe = LightProbe {
        name: name.to_string(),
        cubemap: texture,
        origin,
        edge,
        ambient_cube,
        visible_lights,
    };
    let prb = format!("{}/lightprobes/{}.prb", MATERIALS_DIR, name);
    let path = host.fs().write_file(&prb, probe_keyvalues(&probe).as_bytes())?;
    log::info!("wrote {}", path.display());
    Ok(probe)
}
