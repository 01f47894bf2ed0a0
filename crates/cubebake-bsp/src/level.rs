// level.rs — what the cubemap bake needs to know about a map

use std::path::{Path, PathBuf};

use cubebake_common::q_shared::{angle_vectors_tuple, vector_max, vector_min, Vec3};
use cubebake_common::qfiles::{
    DCubemapSample, DEdge, DFace, DModel, DTexData, DVertex, TexInfo, LUMP_CUBEMAPS, LUMP_EDGES, LUMP_ENTITIES,
    LUMP_FACES, LUMP_MODELS, LUMP_SURFEDGES, LUMP_TEXDATA, LUMP_TEXINFO, LUMP_VERTEXES, SURF_HINT, SURF_NODRAW,
    SURF_SKIP, SURF_SKY, SURF_SKY2D, SURF_TRIGGER,
};

use crate::bsp::BspFile;
use crate::entities::{parse_entities, Entity};
use crate::BspError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubemapSample {
    pub origin: [i32; 3],
    /// 0 selects the default edge, otherwise the edge is `1 << (size - 1)`.
    pub size: u8,
}

impl CubemapSample {
    /// Saturates at `usize::MAX` for sizes too large to represent.
    pub fn face_size(&self, default_size: usize) -> usize {
        if self.size == 0 {
            default_size
        } else {
            1usize.checked_shl(u32::from(self.size - 1)).unwrap_or(usize::MAX)
        }
    }

    pub fn origin_vec3(&self) -> Vec3 {
        self.origin.map(|v| v as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelLightKind {
    Point,
    Spot,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelLight {
    pub kind: LevelLightKind,
    pub origin: Vec3,
    /// Linear colour scaled by brightness.
    pub intensity: Vec3,
    /// Direction the light travels (spot and environment).
    pub direction: Vec3,
    /// Half angles in degrees.
    pub inner_cone: f32,
    pub outer_cone: f32,
    pub constant_attn: f32,
    pub linear_attn: f32,
    pub quadratic_attn: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTriangle {
    pub vertices: [Vec3; 3],
    pub reflectivity: Vec3,
    pub sky: bool,
}

/// A map as seen by the bake.
#[derive(Debug, Clone)]
pub struct Level {
    /// Game-relative world model name, e.g. `maps/foo.bsp`.
    pub world_model_path: String,
    /// The BSP on disk.
    pub path: PathBuf,
    pub cubemap_samples: Vec<CubemapSample>,
    pub sky_name: String,
    pub world_mins: Vec3,
    pub world_maxs: Vec3,
    pub player_start: Option<Vec3>,
    pub lights: Vec<LevelLight>,
    pub triangles: Vec<LevelTriangle>,
}

impl Level {
    pub fn load(path: &Path, world_model_path: &str) -> Result<Self, BspError> {
        let bsp = BspFile::load(path)?;
        let mut level = Self::from_bsp(&bsp, world_model_path)?;
        level.path = path.to_path_buf();
        Ok(level)
    }

    pub fn from_bsp(bsp: &BspFile, world_model_path: &str) -> Result<Self, BspError> {
        let cubemap_samples = bsp
            .records::<DCubemapSample>(LUMP_CUBEMAPS)
            .into_iter()
            .map(|s| CubemapSample { origin: s.origin, size: s.size })
            .collect();

        let models = bsp.records::<DModel>(LUMP_MODELS);
        let (world_mins, world_maxs) = models.first().map_or(([0.0; 3], [0.0; 3]), |m| (m.mins, m.maxs));

        let text = String::from_utf8_lossy(bsp.lump(LUMP_ENTITIES));
        let entities = parse_entities(&text)?;

        let sky_name = entities
            .iter()
            .find(|e| e.classname() == "worldspawn")
            .and_then(|e| e.value("skyname"))
            .unwrap_or("")
            .to_string();
        let player_start = entities
            .iter()
            .find(|e| e.classname() == "info_player_start")
            .and_then(|e| e.vec3("origin"));
        let lights = entities.iter().filter_map(parse_light).collect();

        let triangles = match models.first() {
            Some(world) => world_triangles(bsp, world)?,
            None => Vec::new(),
        };

        Ok(Self {
            world_model_path: world_model_path.to_string(),
            path: PathBuf::new(),
            cubemap_samples,
            sky_name,
            world_mins,
            world_maxs,
            player_start,
            lights,
            triangles,
        })
    }

    /// Where to stand by default: the player start, else the world centre.
    pub fn default_view_origin(&self) -> Vec3 {
        self.player_start.unwrap_or_else(|| {
            let mut c = [0.0; 3];
            for i in 0..3 {
                c[i] = 0.5 * (self.world_mins[i] + self.world_maxs[i]);
            }
            c
        })
    }
}

/// `_light` is "r g b brightness" with gamma-space 0..255 colour.
fn light_intensity(entity: &Entity) -> Vec3 {
    let parts: Vec<f32> = entity
        .value("_light")
        .unwrap_or("255 255 255 200")
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    let (rgb, brightness) = match parts.as_slice() {
        [r, g, b, i, ..] => ([*r, *g, *b], *i),
        [r, g, b] => ([*r, *g, *b], 200.0),
        [v] => ([255.0; 3], *v),
        _ => ([255.0; 3], 200.0),
    };
    rgb.map(|c| (c / 255.0).max(0.0).powf(2.2) * brightness)
}

fn light_direction(entity: &Entity) -> Vec3 {
    let mut angles = entity.vec3("angles").unwrap_or([0.0; 3]);
    if let Some(pitch) = entity.float("pitch") {
        angles[0] = pitch;
    }
    angle_vectors_tuple(&angles).0
}

fn parse_light(entity: &Entity) -> Option<LevelLight> {
    let kind = match entity.classname() {
        "light" => LevelLightKind::Point,
        "light_spot" => LevelLightKind::Spot,
        "light_environment" => LevelLightKind::Environment,
        _ => return None,
    };

    let mut constant_attn = entity.float("_constant_attn").unwrap_or(0.0);
    let linear_attn = entity.float("_linear_attn").unwrap_or(0.0);
    let mut quadratic_attn = entity.float("_quadratic_attn").unwrap_or(0.0);
    if constant_attn == 0.0 && linear_attn == 0.0 && quadratic_attn == 0.0 {
        if kind == LevelLightKind::Environment {
            constant_attn = 1.0;
        } else {
            quadratic_attn = 1.0;
        }
    }

    let outer_cone = entity.float("_cone").unwrap_or(45.0);
    Some(LevelLight {
        kind,
        origin: entity.vec3("origin").unwrap_or([0.0; 3]),
        intensity: light_intensity(entity),
        direction: light_direction(entity),
        inner_cone: entity.float("_inner_cone").unwrap_or(outer_cone * 0.5).min(outer_cone),
        outer_cone,
        constant_attn,
        linear_attn,
        quadratic_attn,
    })
}

/// Fan-triangulate the faces of the world model.
fn world_triangles(bsp: &BspFile, world: &DModel) -> Result<Vec<LevelTriangle>, BspError> {
    let faces = bsp.records::<DFace>(LUMP_FACES);
    let texinfo = bsp.records::<TexInfo>(LUMP_TEXINFO);
    let texdata = bsp.records::<DTexData>(LUMP_TEXDATA);
    let vertexes = bsp.records::<DVertex>(LUMP_VERTEXES);
    let edges = bsp.records::<DEdge>(LUMP_EDGES);
    let surfedges: Vec<i32> = bsp.records::<i32>(LUMP_SURFEDGES);

    let first = world.firstface.max(0) as usize;
    let count = world.numfaces.max(0) as usize;
    let world_faces = faces.get(first..first + count).ok_or(BspError::BadLump(LUMP_FACES))?;

    let mut triangles = Vec::new();
    for face in world_faces {
        let (flags, reflectivity) = match texinfo.get(face.texinfo as usize) {
            Some(ti) if face.texinfo >= 0 => {
                let refl = texdata
                    .get(ti.texdata as usize)
                    .filter(|_| ti.texdata >= 0)
                    .map_or([0.5; 3], |td| td.reflectivity);
                (ti.flags, refl)
            }
            _ => (0, [0.5; 3]),
        };
        if flags & (SURF_NODRAW | SURF_SKIP | SURF_HINT | SURF_TRIGGER) != 0 {
            continue;
        }

        let mut points = Vec::with_capacity(face.numedges.max(0) as usize);
        for i in 0..face.numedges.max(0) as usize {
            let se = *surfedges
                .get(face.firstedge as usize + i)
                .ok_or(BspError::BadLump(LUMP_SURFEDGES))?;
            let edge = edges.get(se.unsigned_abs() as usize).ok_or(BspError::BadLump(LUMP_EDGES))?;
            let v = if se >= 0 { edge.v[0] } else { edge.v[1] };
            let vertex = vertexes.get(v as usize).ok_or(BspError::BadLump(LUMP_VERTEXES))?;
            points.push(vertex.point);
        }

        let sky = flags & (SURF_SKY | SURF_SKY2D) != 0;
        for i in 1..points.len().saturating_sub(1) {
            triangles.push(LevelTriangle {
                vertices: [points[0], points[i], points[i + 1]],
                reflectivity,
                sky,
            });
        }
    }
    Ok(triangles)
}

/// Bounds of a triangle soup; `None` when empty.
pub fn triangle_bounds(triangles: &[LevelTriangle]) -> Option<(Vec3, Vec3)> {
    let first = triangles.first()?.vertices[0];
    let mut bounds = (first, first);
    for v in triangles.iter().flat_map(|t| t.vertices.iter()) {
        bounds = (vector_min(&bounds.0, v), vector_max(&bounds.1, v));
    }
    Some(bounds)
}
