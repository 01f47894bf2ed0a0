// trace.rs — packet traversal of the KD-tree

use rayon::prelude::*;

use cubebake_common::q_shared::{vector_length, vector_normalize, vector_subtract, Vec3};

use crate::triangle::{CacheOptimizedTriangle, TriangleFlags};
use crate::vectors::{FourRays, FourVectors, Ray};
use crate::{LightType, RayTracingEnvironment};

/// Hit id reported for rays that hit nothing.
pub const RAY_MISS: i32 = -1;
/// Hit distance reported for rays that hit nothing.
pub const MISS_DISTANCE: f32 = 1.0e23;

/// Per-lane results of a four-ray trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayTracingResult {
    /// Caller-supplied triangle id, or RAY_MISS.
    pub hit_ids: [i32; 4],
    /// Index into the triangle pool, or RAY_MISS.
    pub hit_triangle_index: [i32; 4],
    pub hit_distance: [f32; 4],
    pub surface_normal: FourVectors,
}

impl Default for RayTracingResult {
    fn default() -> Self {
        Self {
            hit_ids: [RAY_MISS; 4],
            hit_triangle_index: [RAY_MISS; 4],
            hit_distance: [MISS_DISTANCE; 4],
            surface_normal: FourVectors::default(),
        }
    }
}

impl RayTracingResult {
    pub fn lane(&self, i: usize) -> RayTracingSingleResult {
        RayTracingSingleResult {
            hit_id: self.hit_ids[i],
            triangle_index: self.hit_triangle_index[i],
            hit_distance: self.hit_distance[i],
            surface_normal: self.surface_normal.lane(i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayTracingSingleResult {
    pub hit_id: i32,
    pub triangle_index: i32,
    pub hit_distance: f32,
    pub surface_normal: Vec3,
}

impl RayTracingSingleResult {
    pub fn is_hit(&self) -> bool {
        self.triangle_index != RAY_MISS
    }
}

#[derive(Clone, Copy)]
struct TraceOptions {
    skip_id: Option<i32>,
    skip_transparent: bool,
}

impl RayTracingEnvironment {
    /// Trace four rays. Lanes must share direction signs to be traversed as
    /// one packet; incoherent packets are traced one ray at a time.
    /// Triangles with id `skip_id` are ignored.
    pub fn trace4(
        &self,
        rays: &FourRays,
        tmin: [f32; 4],
        tmax: [f32; 4],
        skip_id: Option<i32>,
    ) -> RayTracingResult {
        let opts = TraceOptions { skip_id, skip_transparent: false };
        self.trace4_with_options(rays, tmin, tmax, opts)
    }

    fn trace4_with_options(&self, rays: &FourRays, tmin: [f32; 4], tmax: [f32; 4], opts: TraceOptions) -> RayTracingResult {
        assert!(self.is_frozen(), "setup_acceleration_structure must run before tracing");
        let mut result = RayTracingResult::default();

        match rays.calculate_direction_sign_mask() {
            Some(mask) => self.traverse(rays, mask, tmin, tmax, [true; 4], opts, &mut result),
            None => {
                for lane in 0..4 {
                    let single = FourRays {
                        origin: FourVectors::replicate(rays.origin.lane(lane)),
                        direction: FourVectors::replicate(rays.direction.lane(lane)),
                    };
                    let mask = single.calculate_direction_sign_mask().unwrap_or(0);
                    let mut lane_result = RayTracingResult::default();
                    let mut active = [false; 4];
                    active[0] = true;
                    self.traverse(&single, mask, [tmin[lane]; 4], [tmax[lane]; 4], active, opts, &mut lane_result);
                    result.hit_ids[lane] = lane_result.hit_ids[0];
                    result.hit_triangle_index[lane] = lane_result.hit_triangle_index[0];
                    result.hit_distance[lane] = lane_result.hit_distance[0];
                    result.surface_normal.set_lane(lane, lane_result.surface_normal.lane(0));
                }
            }
        }
        result
    }

    /// Trace a single ray.
    pub fn trace_ray(&self, ray: &Ray) -> RayTracingSingleResult {
        let rays = FourRays {
            origin: FourVectors::replicate(ray.origin),
            direction: FourVectors::replicate(ray.direction),
        };
        self.trace4(&rays, [ray.tmin; 4], [ray.tmax; 4], None).lane(0)
    }

    /// Trace many rays on the rayon pool, four at a time.
    pub fn trace_rays(&self, rays: &[Ray]) -> Vec<RayTracingSingleResult> {
        rays.par_chunks(4)
            .flat_map_iter(|chunk| {
                let mut lanes = [Ray::default(); 4];
                for (i, ray) in chunk.iter().enumerate() {
                    lanes[i] = *ray;
                }
                // pad short chunks by repeating the first ray
                for i in chunk.len()..4 {
                    lanes[i] = chunk[0];
                }
                let packet = FourRays {
                    origin: FourVectors::from_lanes(lanes.map(|r| r.origin)),
                    direction: FourVectors::from_lanes(lanes.map(|r| r.direction)),
                };
                let result = self.trace4(&packet, lanes.map(|r| r.tmin), lanes.map(|r| r.tmax), None);
                (0..chunk.len()).map(move |i| result.lane(i))
            })
            .collect()
    }

    /// True if an opaque triangle lies strictly between `from` and `to`.
    pub fn is_occluded(&self, from: &Vec3, to: &Vec3) -> bool {
        let mut dir = vector_subtract(to, from);
        let dist = vector_normalize(&mut dir);
        if dist <= 0.0 {
            return false;
        }
        self.occluded_along(from, &dir, dist * 0.999)
    }

    fn occluded_along(&self, from: &Vec3, dir: &Vec3, max_dist: f32) -> bool {
        let rays = FourRays {
            origin: FourVectors::replicate(*from),
            direction: FourVectors::replicate(*dir),
        };
        let opts = TraceOptions { skip_id: None, skip_transparent: true };
        let result = self.trace4_with_options(&rays, [1.0e-3; 4], [max_dist; 4], opts);
        result.hit_triangle_index[0] != RAY_MISS
    }

    /// Indices into `light_list` of the lights that reach `point`.
    /// Directional lights count as visible when the ray towards them escapes
    /// the level or ends on a sky surface.
    pub fn compute_visible_lights(&self, point: &Vec3) -> Vec<usize> {
        let mut visible = Vec::new();
        for (index, light) in self.light_list.iter().enumerate() {
            let (to_light, dist) = light.direction_from(point);
            match light.light_type {
                LightType::Directional => {
                    let ray = Ray {
                        origin: *point,
                        direction: to_light,
                        tmin: 1.0e-3,
                        tmax: MISS_DISTANCE,
                    };
                    let hit = self.trace_ray(&ray);
                    let escaped = !hit.is_hit()
                        || self.triangle_flags(hit.triangle_index as usize).contains(TriangleFlags::SKY);
                    if escaped {
                        visible.push(index);
                    }
                }
                _ => {
                    if light.range > 0.0 && dist > light.range {
                        continue;
                    }
                    if vector_length(&light.intensity_at(point, None)) <= 0.0 {
                        continue;
                    }
                    if !self.occluded_along(point, &to_light, dist * 0.999) {
                        visible.push(index);
                    }
                }
            }
        }
        visible
    }

    #[allow(clippy::too_many_arguments)]
    fn traverse(
        &self,
        rays: &FourRays,
        sign_mask: u32,
        tmin: [f32; 4],
        tmax: [f32; 4],
        active: [bool; 4],
        opts: TraceOptions,
        result: &mut RayTracingResult,
    ) {
        let Some(world) = self.world_bounds() else {
            return;
        };

        // clip each lane against the world box
        let mut lo = tmin;
        let mut hi = tmax;
        let mut live = active;
        for lane in 0..4 {
            if !live[lane] {
                continue;
            }
            for axis in 0..3 {
                let o = rays.origin.axis(axis)[lane];
                let d = rays.direction.axis(axis)[lane];
                if d == 0.0 {
                    if o < world.mins[axis] || o > world.maxs[axis] {
                        live[lane] = false;
                    }
                    continue;
                }
                let inv = 1.0 / d;
                let ta = (world.mins[axis] - o) * inv;
                let tb = (world.maxs[axis] - o) * inv;
                lo[lane] = lo[lane].max(ta.min(tb));
                hi[lane] = hi[lane].min(ta.max(tb));
            }
            if lo[lane] > hi[lane] {
                live[lane] = false;
            }
        }
        if !live.iter().any(|&l| l) {
            return;
        }

        let mut closest = tmax;
        let mut stack: Vec<(usize, [f32; 4], [f32; 4])> = Vec::with_capacity(64);
        stack.push((0, lo, hi));

        while let Some((node_idx, node_lo, mut node_hi)) = stack.pop() {
            let mut any = false;
            for lane in 0..4 {
                node_hi[lane] = node_hi[lane].min(closest[lane]);
                if live[lane] && node_lo[lane] <= node_hi[lane] {
                    any = true;
                }
            }
            if !any {
                continue;
            }

            let node = &self.optimized_kd_tree[node_idx];
            if node.is_leaf() {
                let start = node.triangle_index_start();
                let end = start + node.number_of_triangles_in_leaf();
                for &tri_index in &self.tri_index_list[start..end] {
                    self.intersect_leaf_triangle(tri_index as usize, rays, &tmin, &mut closest, &live, opts, result);
                }
                continue;
            }

            let axis = node.node_type() as usize;
            let split = node.split_value;
            let mut t_split = [0.0f32; 4];
            for lane in 0..4 {
                let o = rays.origin.axis(axis)[lane];
                let d = rays.direction.axis(axis)[lane];
                t_split[lane] = if d == 0.0 {
                    if o < split {
                        f32::INFINITY
                    } else {
                        f32::NEG_INFINITY
                    }
                } else {
                    (split - o) / d
                };
            }

            let (near, far) = if sign_mask & (1 << axis) != 0 {
                (node.right_child(), node.left_child())
            } else {
                (node.left_child(), node.right_child())
            };

            // near child covers [lo, t_split], far child [t_split, hi]
            let near_lo = node_lo;
            let far_hi = node_hi;
            let mut near_hi = node_hi;
            let mut far_lo = node_lo;
            let mut need_near = false;
            let mut need_far = false;
            for lane in 0..4 {
                near_hi[lane] = node_hi[lane].min(t_split[lane]);
                far_lo[lane] = node_lo[lane].max(t_split[lane]);
                if live[lane] {
                    need_near |= near_lo[lane] <= near_hi[lane];
                    need_far |= far_lo[lane] <= far_hi[lane];
                }
            }

            if need_far {
                stack.push((far, far_lo, far_hi));
            }
            if need_near {
                stack.push((near, near_lo, near_hi));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn intersect_leaf_triangle(
        &self,
        tri_index: usize,
        rays: &FourRays,
        tmin: &[f32; 4],
        closest: &mut [f32; 4],
        live: &[bool; 4],
        opts: TraceOptions,
        result: &mut RayTracingResult,
    ) {
        let CacheOptimizedTriangle::Intersect(tri) = &self.triangles[tri_index] else {
            return;
        };
        if opts.skip_id == Some(tri.triangle_id) {
            return;
        }
        if opts.skip_transparent && tri.flags.contains(TriangleFlags::TRANSPARENT) {
            return;
        }

        for lane in 0..4 {
            if !live[lane] {
                continue;
            }
            let origin = rays.origin.lane(lane);
            let direction = rays.direction.lane(lane);
            let Some((t, b1, b2)) = tri.intersect(&origin, &direction, tmin[lane], closest[lane]) else {
                continue;
            };
            closest[lane] = t;
            result.hit_ids[lane] = tri.triangle_id;
            result.hit_triangle_index[lane] = tri_index as i32;
            result.hit_distance[lane] = t;

            let mut normal = match self.vertex_normals(tri_index) {
                Some(n) => {
                    let b0 = 1.0 - b1 - b2;
                    let mut v = [0.0f32; 3];
                    for a in 0..3 {
                        v[a] = b0 * n[0][a] + b1 * n[1][a] + b2 * n[2][a];
                    }
                    vector_normalize(&mut v);
                    v
                }
                None => tri.normal,
            };
            if tri.flags.contains(TriangleFlags::NEGATIVE_NORMAL) {
                normal = [-normal[0], -normal[1], -normal[2]];
            }
            result.surface_normal.set_lane(lane, normal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::LightDesc;

    /// A closed 200-unit room with a floor tile inside, ids by purpose.
    fn room() -> RayTracingEnvironment {
        let mut env = RayTracingEnvironment::new();
        // walls: six thin slabs
        env.add_axis_aligned_rectangular_solid(1, [-100.0, -100.0, -101.0], [100.0, 100.0, -100.0], [0.5; 3]);
        env.add_axis_aligned_rectangular_solid(2, [-100.0, -100.0, 100.0], [100.0, 100.0, 101.0], [0.5; 3]);
        env.add_axis_aligned_rectangular_solid(3, [-101.0, -100.0, -100.0], [-100.0, 100.0, 100.0], [0.5; 3]);
        env.add_axis_aligned_rectangular_solid(4, [100.0, -100.0, -100.0], [101.0, 100.0, 100.0], [0.5; 3]);
        env.add_axis_aligned_rectangular_solid(5, [-100.0, -101.0, -100.0], [100.0, -100.0, 100.0], [0.5; 3]);
        env.add_axis_aligned_rectangular_solid(6, [-100.0, 100.0, -100.0], [100.0, 101.0, 100.0], [0.5; 3]);
        // a pillar in the middle
        env.add_axis_aligned_rectangular_solid(10, [-10.0, -10.0, -100.0], [10.0, 10.0, 50.0], [0.9, 0.1, 0.1]);
        env.setup_acceleration_structure();
        env
    }

    /// Reference answer by testing every triangle.
    fn brute_force(env: &RayTracingEnvironment, ray: &Ray) -> f32 {
        let mut best = MISS_DISTANCE;
        for tri in &env.triangles {
            if let CacheOptimizedTriangle::Intersect(t) = tri {
                if let Some((d, _, _)) = t.intersect(&ray.origin, &ray.direction, ray.tmin, best.min(ray.tmax)) {
                    best = d;
                }
            }
        }
        best
    }

    #[test]
    fn test_trace_hits_pillar() {
        let env = room();
        let hit = env.trace_ray(&Ray::new([-50.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0e6));
        assert!(hit.is_hit());
        assert_eq!(hit.hit_id, 10);
        assert!((hit.hit_distance - 40.0).abs() < 1e-3);
        assert!((hit.surface_normal[0].abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_trace_hits_far_wall() {
        let env = room();
        let hit = env.trace_ray(&Ray::new([-50.0, 50.0, 0.0], [1.0, 0.0, 0.0], 1.0e6));
        assert_eq!(hit.hit_id, 4);
        assert!((hit.hit_distance - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_trace_miss_outside() {
        let env = room();
        let hit = env.trace_ray(&Ray::new([500.0, 500.0, 500.0], [1.0, 0.0, 0.0], 1.0e6));
        assert!(!hit.is_hit());
        assert_eq!(hit.hit_id, RAY_MISS);
        assert_eq!(hit.hit_distance, MISS_DISTANCE);
    }

    #[test]
    fn test_trace_respects_tmax() {
        let env = room();
        let hit = env.trace_ray(&Ray::new([-50.0, 0.0, 0.0], [1.0, 0.0, 0.0], 30.0));
        assert!(!hit.is_hit());
    }

    #[test]
    fn test_skip_id() {
        let env = room();
        let rays = FourRays {
            origin: FourVectors::replicate([-50.0, 0.0, 0.0]),
            direction: FourVectors::replicate([1.0, 0.0, 0.0]),
        };
        let result = env.trace4(&rays, [0.0; 4], [1.0e6; 4], Some(10));
        assert_eq!(result.hit_ids, [4; 4]);
    }

    #[test]
    fn test_packet_matches_brute_force() {
        let env = room();
        let dirs = [
            [0.3, 0.2, 0.1],
            [0.5, -0.7, 0.2],
            [-0.2, 0.4, -0.9],
            [-0.8, -0.1, 0.3],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
        ];
        let mut rays = Vec::new();
        for (i, d) in dirs.iter().enumerate() {
            let mut dir = *d;
            vector_normalize(&mut dir);
            rays.push(Ray::new([-40.0 + i as f32, 30.0, -20.0], dir, 1.0e6));
        }
        let results = env.trace_rays(&rays);
        assert_eq!(results.len(), rays.len());
        for (ray, hit) in rays.iter().zip(&results) {
            let expected = brute_force(&env, ray);
            assert!(hit.is_hit());
            assert!((hit.hit_distance - expected).abs() < 1e-2, "{} vs {}", hit.hit_distance, expected);
        }
    }

    proptest::proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn test_tree_agrees_with_brute_force(
            ox in -90.0f32..90.0, oy in -90.0f32..90.0, oz in -90.0f32..90.0,
            dx in -1.0f32..1.0, dy in -1.0f32..1.0, dz in 0.1f32..1.0,
        ) {
            let env = room();
            let mut dir = [dx, dy, dz];
            vector_normalize(&mut dir);
            let ray = Ray::new([ox, oy, oz], dir, 1.0e6);
            let hit = env.trace_ray(&ray);
            let expected = brute_force(&env, &ray);
            proptest::prop_assert!(hit.is_hit());
            proptest::prop_assert!((hit.hit_distance - expected).abs() < 1e-2);
        }
    }

    #[test]
    fn test_coherent_packet() {
        let env = room();
        let rays = FourRays {
            origin: FourVectors::from_lanes([[-50.0, 0.0, 0.0], [-50.0, 50.0, 0.0], [-50.0, -50.0, 0.0], [-50.0, 0.0, 70.0]]),
            direction: FourVectors::replicate([1.0, 0.0, 0.0]),
        };
        let result = env.trace4(&rays, [0.0; 4], [1.0e6; 4], None);
        assert_eq!(result.hit_ids, [10, 4, 4, 4]);
    }

    #[test]
    fn test_is_occluded() {
        let env = room();
        assert!(env.is_occluded(&[-50.0, 0.0, 0.0], &[50.0, 0.0, 0.0]));
        assert!(!env.is_occluded(&[-50.0, 50.0, 0.0], &[50.0, 50.0, 0.0]));
    }

    #[test]
    fn test_transparent_ignored_by_occlusion() {
        let mut env = RayTracingEnvironment::new();
        env.add_triangle_ex(
            1,
            [[0.0, -10.0, -10.0], [0.0, 10.0, -10.0], [0.0, 0.0, 10.0]],
            [1.0; 3],
            TriangleFlags::TRANSPARENT,
            0,
            None,
        );
        env.setup_acceleration_structure();
        assert!(!env.is_occluded(&[-5.0, 0.0, 0.0], &[5.0, 0.0, 0.0]));
        assert!(env.trace_ray(&Ray::new([-5.0, 0.0, 0.0], [1.0, 0.0, 0.0], 100.0)).is_hit());
    }

    #[test]
    fn test_negative_normal_and_interpolated_normals() {
        let mut env = RayTracingEnvironment::new();
        let up = [0.0, 0.0, 1.0];
        env.add_triangle_ex(
            1,
            [[-10.0, -10.0, 0.0], [10.0, -10.0, 0.0], [0.0, 10.0, 0.0]],
            [1.0; 3],
            TriangleFlags::NEGATIVE_NORMAL,
            3,
            Some([up, up, up]),
        );
        env.setup_acceleration_structure();
        let hit = env.trace_ray(&Ray::new([0.0, 0.0, 5.0], [0.0, 0.0, -1.0], 100.0));
        assert!(hit.is_hit());
        assert!((hit.surface_normal[2] + 1.0).abs() < 1e-5);
        assert_eq!(env.triangle_material(hit.triangle_index as usize), 3);
    }

    #[test]
    fn test_visible_lights() {
        let mut env = RayTracingEnvironment::new();
        env.add_axis_aligned_rectangular_solid(1, [-10.0, -10.0, -10.0], [10.0, 10.0, 10.0], [1.0; 3]);
        env.add_light(LightDesc::point([0.0, 0.0, 50.0], [1000.0; 3]));
        env.add_light(LightDesc::point([0.0, 0.0, -50.0], [1000.0; 3]));
        env.add_light(LightDesc::directional([0.0, 0.0, -1.0], [1.0; 3]));
        env.setup_acceleration_structure();
        // above the box: the light below is blocked, the sun is not
        assert_eq!(env.compute_visible_lights(&[0.0, 0.0, 20.0]), vec![0, 2]);
    }

    #[test]
    fn test_empty_environment_misses() {
        let mut env = RayTracingEnvironment::new();
        env.setup_acceleration_structure();
        assert!(!env.trace_ray(&Ray::new([0.0; 3], [1.0, 0.0, 0.0], 10.0)).is_hit());
    }
}
