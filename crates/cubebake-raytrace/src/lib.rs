//! KD-tree ray tracing environment used for light-probe visibility and the
//! CPU view renderer.

#![allow(clippy::needless_range_loop)]

pub mod kdtree;
pub mod light;
pub mod trace;
pub mod triangle;
pub mod vectors;

pub use kdtree::{Aabb, CacheOptimizedKDNode};
pub use light::{LightDesc, LightType};
pub use trace::{RayTracingResult, RayTracingSingleResult, MISS_DISTANCE, RAY_MISS};
pub use triangle::{CacheOptimizedTriangle, TriGeometryData, TriIntersectData, TriangleFlags};
pub use vectors::{FourRays, FourVectors, Ray};

use cubebake_common::q_shared::Vec3;

/// Triangles, their KD-tree and the lights of a scene.
///
/// Triangles and lights are added first, then `setup_acceleration_structure`
/// builds the tree and converts every triangle to the intersect layout. The
/// environment is frozen after that; only queries are allowed.
#[derive(Debug, Default)]
pub struct RayTracingEnvironment {
    pub triangles: Vec<CacheOptimizedTriangle>,
    pub triangle_colors: Vec<Vec3>,
    pub triangle_materials: Vec<i32>,
    vertex_normals: Vec<Option<[Vec3; 3]>>,
    pub optimized_kd_tree: Vec<CacheOptimizedKDNode>,
    pub tri_index_list: Vec<i32>,
    pub light_list: Vec<LightDesc>,
    world: Option<Aabb>,
    frozen: bool,
}

impl RayTracingEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_triangle(&mut self, id: i32, v1: Vec3, v2: Vec3, v3: Vec3, color: Vec3) {
        self.add_triangle_ex(id, [v1, v2, v3], color, TriangleFlags::empty(), 0, None);
    }

    /// Add a triangle with flags, a material index and optional per-vertex
    /// normals used to interpolate the reported hit normal.
    pub fn add_triangle_ex(
        &mut self,
        id: i32,
        vertices: [Vec3; 3],
        color: Vec3,
        flags: TriangleFlags,
        material_index: i32,
        normals: Option<[Vec3; 3]>,
    ) {
        assert!(!self.frozen, "triangles cannot be added after the tree is built");
        self.triangles.push(CacheOptimizedTriangle::Geometry(TriGeometryData {
            triangle_id: id,
            vertices,
            flags,
        }));
        self.triangle_colors.push(color);
        self.triangle_materials.push(material_index);
        self.vertex_normals.push(normals);
    }

    /// Add the twelve triangles of a box.
    pub fn add_axis_aligned_rectangular_solid(&mut self, id: i32, mins: Vec3, maxs: Vec3, color: Vec3) {
        let corner = |x: bool, y: bool, z: bool| -> Vec3 {
            [
                if x { maxs[0] } else { mins[0] },
                if y { maxs[1] } else { mins[1] },
                if z { maxs[2] } else { mins[2] },
            ]
        };
        // each face as a quad, counter-clockwise seen from outside
        let quads = [
            [corner(false, false, false), corner(false, true, false), corner(true, true, false), corner(true, false, false)],
            [corner(false, false, true), corner(true, false, true), corner(true, true, true), corner(false, true, true)],
            [corner(false, false, false), corner(true, false, false), corner(true, false, true), corner(false, false, true)],
            [corner(false, true, false), corner(false, true, true), corner(true, true, true), corner(true, true, false)],
            [corner(false, false, false), corner(false, false, true), corner(false, true, true), corner(false, true, false)],
            [corner(true, false, false), corner(true, true, false), corner(true, true, true), corner(true, false, true)],
        ];
        for q in quads {
            self.add_triangle(id, q[0], q[1], q[2], color);
            self.add_triangle(id, q[0], q[2], q[3], color);
        }
    }

    pub fn add_light(&mut self, light: LightDesc) {
        self.light_list.push(light);
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Bounds of all triangles; None before the tree is built or when empty.
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.world
    }

    pub fn triangle_color(&self, index: usize) -> Vec3 {
        self.triangle_colors[index]
    }

    pub fn triangle_material(&self, index: usize) -> i32 {
        self.triangle_materials[index]
    }

    pub fn triangle_flags(&self, index: usize) -> TriangleFlags {
        self.triangles[index].flags()
    }

    pub(crate) fn vertex_normals(&self, index: usize) -> Option<&[Vec3; 3]> {
        self.vertex_normals[index].as_ref()
    }

    /// Build the KD-tree and freeze the environment.
    pub fn setup_acceleration_structure(&mut self) {
        if self.frozen {
            return;
        }

        let bounds: Vec<(Vec3, Vec3)> = self
            .triangles
            .iter()
            .map(|t| match t {
                CacheOptimizedTriangle::Geometry(g) => g.bounds(),
                CacheOptimizedTriangle::Intersect(_) => ([0.0; 3], [0.0; 3]),
            })
            .collect();

        let mut world = Aabb::EMPTY;
        for (mins, maxs) in &bounds {
            world.grow(mins, maxs);
        }
        if bounds.is_empty() {
            world = Aabb { mins: [0.0; 3], maxs: [0.0; 3] };
        }
        // pad so rays grazing the outer faces still enter the tree
        for a in 0..3 {
            world.mins[a] -= 1.0e-3;
            world.maxs[a] += 1.0e-3;
        }

        let tree = kdtree::build_kd_tree(&bounds, world);
        self.optimized_kd_tree = tree.nodes;
        self.tri_index_list = tree.tri_index_list;

        for tri in &mut self.triangles {
            let intersect = match tri {
                CacheOptimizedTriangle::Geometry(g) => g.to_intersect(),
                CacheOptimizedTriangle::Intersect(i) => *i,
            };
            *tri = CacheOptimizedTriangle::Intersect(intersect);
        }

        self.world = (!bounds.is_empty()).then_some(world);
        self.frozen = true;
        log::debug!(
            "ray tracing environment: {} triangles, {} lights",
            self.triangles.len(),
            self.light_list.len()
        );
    }
}
