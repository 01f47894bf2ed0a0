// triangle.rs — triangle pool entries in geometry or intersect layout

use bitflags::bitflags;

use cubebake_common::q_shared::{cross_product, dot_product, vector_normalize, vector_subtract, Vec3};

bitflags! {
    /// Per-triangle flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TriangleFlags: u32 {
        /// Ignored by occlusion queries.
        const TRANSPARENT = 0x01;
        /// Reported normal is flipped.
        const NEGATIVE_NORMAL = 0x02;
        /// Surface opens onto the sky.
        const SKY = 0x04;
    }
}

/// Triangle as added by the caller, before the tree is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriGeometryData {
    pub triangle_id: i32,
    pub vertices: [Vec3; 3],
    pub flags: TriangleFlags,
}

/// Triangle prepared for intersection tests.
///
/// The hit point is projected onto the two coordinates selected by
/// `coord_select`; `projected_edge_equations` give the barycentric weights
/// of vertices 1 and 2 as `a*u + b*v + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriIntersectData {
    pub normal: Vec3,
    /// Plane distance: `dot(normal, p) == d` on the triangle.
    pub d: f32,
    pub triangle_id: i32,
    pub projected_edge_equations: [f32; 6],
    pub coord_select: [u8; 2],
    pub flags: TriangleFlags,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheOptimizedTriangle {
    Geometry(TriGeometryData),
    Intersect(TriIntersectData),
}

impl CacheOptimizedTriangle {
    pub fn triangle_id(&self) -> i32 {
        match self {
            Self::Geometry(g) => g.triangle_id,
            Self::Intersect(i) => i.triangle_id,
        }
    }

    pub fn flags(&self) -> TriangleFlags {
        match self {
            Self::Geometry(g) => g.flags,
            Self::Intersect(i) => i.flags,
        }
    }
}

impl TriGeometryData {
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut mins = self.vertices[0];
        let mut maxs = self.vertices[0];
        for v in &self.vertices[1..] {
            for a in 0..3 {
                mins[a] = mins[a].min(v[a]);
                maxs[a] = maxs[a].max(v[a]);
            }
        }
        (mins, maxs)
    }

    /// Convert to the intersect layout. Degenerate triangles get a zero
    /// normal and never report hits.
    pub fn to_intersect(&self) -> TriIntersectData {
        let [p0, p1, p2] = self.vertices;
        let mut normal = cross_product(&vector_subtract(&p1, &p0), &vector_subtract(&p2, &p0));
        let area = vector_normalize(&mut normal);

        // drop the dominant axis of the normal
        let dominant = if normal[0].abs() >= normal[1].abs() && normal[0].abs() >= normal[2].abs() {
            0
        } else if normal[1].abs() >= normal[2].abs() {
            1
        } else {
            2
        };
        let coord_select = match dominant {
            0 => [1u8, 2u8],
            1 => [0, 2],
            _ => [0, 1],
        };
        let (cu, cv) = (coord_select[0] as usize, coord_select[1] as usize);

        let mut degenerate = area <= 0.0;
        let mut eqs = [0.0f32; 6];
        if !degenerate {
            // weight of p1: zero on edge p0-p2, one at p1
            match edge_equation(&p0, &p2, &p1, cu, cv) {
                Some(e) => eqs[..3].copy_from_slice(&e),
                None => degenerate = true,
            }
            // weight of p2: zero on edge p0-p1, one at p2
            match edge_equation(&p0, &p1, &p2, cu, cv) {
                Some(e) => eqs[3..].copy_from_slice(&e),
                None => degenerate = true,
            }
        }

        if degenerate {
            return TriIntersectData {
                normal: [0.0; 3],
                d: 0.0,
                triangle_id: self.triangle_id,
                projected_edge_equations: [0.0; 6],
                coord_select,
                flags: self.flags,
            };
        }

        TriIntersectData {
            normal,
            d: dot_product(&normal, &p0),
            triangle_id: self.triangle_id,
            projected_edge_equations: eqs,
            coord_select,
            flags: self.flags,
        }
    }
}

/// Linear function of the projected point that is 0 along `a`-`b` and 1 at `apex`.
fn edge_equation(a: &Vec3, b: &Vec3, apex: &Vec3, cu: usize, cv: usize) -> Option<[f32; 3]> {
    let eu = b[cu] - a[cu];
    let ev = b[cv] - a[cv];
    let denom = eu * (apex[cv] - a[cv]) - ev * (apex[cu] - a[cu]);
    if denom.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / denom;
    Some([-ev * inv, eu * inv, (ev * a[cu] - eu * a[cv]) * inv])
}

impl TriIntersectData {
    pub fn is_degenerate(&self) -> bool {
        self.normal == [0.0; 3]
    }

    /// Distance along the ray to the triangle, with the barycentric weights
    /// of vertices 1 and 2, or None on a miss. Both faces are hit.
    #[inline]
    pub fn intersect(&self, origin: &Vec3, direction: &Vec3, tmin: f32, tmax: f32) -> Option<(f32, f32, f32)> {
        let denom = dot_product(&self.normal, direction);
        if denom == 0.0 {
            return None;
        }
        let t = (self.d - dot_product(&self.normal, origin)) / denom;
        if !(t > tmin && t < tmax) {
            return None;
        }
        let (cu, cv) = (self.coord_select[0] as usize, self.coord_select[1] as usize);
        let u = origin[cu] + t * direction[cu];
        let v = origin[cv] + t * direction[cv];
        let e = &self.projected_edge_equations;
        let b1 = e[0] * u + e[1] * v + e[2];
        let b2 = e[3] * u + e[4] * v + e[5];
        const EPS: f32 = -1e-5;
        if b1 < EPS || b2 < EPS || b1 + b2 > 1.0 - EPS {
            return None;
        }
        Some((t, b1, b2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(vertices: [Vec3; 3]) -> TriIntersectData {
        TriGeometryData { triangle_id: 7, vertices, flags: TriangleFlags::empty() }.to_intersect()
    }

    #[test]
    fn test_bounds() {
        let g = TriGeometryData {
            triangle_id: 0,
            vertices: [[0.0, 5.0, -1.0], [2.0, 1.0, 3.0], [-4.0, 2.0, 0.0]],
            flags: TriangleFlags::empty(),
        };
        assert_eq!(g.bounds(), ([-4.0, 1.0, -1.0], [2.0, 5.0, 3.0]));
    }

    #[test]
    fn test_intersect_hit_and_barycentrics() {
        let t = tri([[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        assert_eq!(t.coord_select, [0, 1]);
        let (dist, b1, b2) = t.intersect(&[2.0, 3.0, 5.0], &[0.0, 0.0, -1.0], 0.0, 100.0).unwrap();
        assert!((dist - 5.0).abs() < 1e-5);
        assert!((b1 - 0.2).abs() < 1e-5);
        assert!((b2 - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_intersect_miss_outside_edges() {
        let t = tri([[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        assert!(t.intersect(&[8.0, 8.0, 5.0], &[0.0, 0.0, -1.0], 0.0, 100.0).is_none());
        assert!(t.intersect(&[-1.0, 1.0, 5.0], &[0.0, 0.0, -1.0], 0.0, 100.0).is_none());
        // behind the ray
        assert!(t.intersect(&[1.0, 1.0, -5.0], &[0.0, 0.0, -1.0], 0.0, 100.0).is_none());
        // beyond tmax
        assert!(t.intersect(&[1.0, 1.0, 5.0], &[0.0, 0.0, -1.0], 0.0, 4.0).is_none());
    }

    #[test]
    fn test_intersect_back_face_and_other_axes() {
        let t = tri([[0.0, 0.0, 0.0], [0.0, 0.0, 10.0], [0.0, 10.0, 0.0]]);
        assert_eq!(t.coord_select, [1, 2]);
        assert!(t.intersect(&[5.0, 1.0, 1.0], &[-1.0, 0.0, 0.0], 0.0, 100.0).is_some());
        assert!(t.intersect(&[-5.0, 1.0, 1.0], &[1.0, 0.0, 0.0], 0.0, 100.0).is_some());
    }

    #[test]
    fn test_degenerate_never_hits() {
        let t = tri([[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]);
        assert!(t.is_degenerate());
        assert!(t.intersect(&[0.0, 0.0, 5.0], &[0.0, 0.0, -1.0], 0.0, 100.0).is_none());
    }
}
