// orient.rs — cube face orientation fixup and spheremap generation

use cubebake_common::q_shared::{angle_vectors_tuple, dot_product, Vec3};

use crate::vtf::{TexelBuffer, VtfTexture};

/// View angles (pitch, yaw, roll) of each cube face, in engine face order
/// (RIGHT, LEFT, BACK, FRONT, UP, DOWN).
pub const CUBEMAP_FACE_ANGLES: [Vec3; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, 180.0, 0.0],
    [0.0, 90.0, 0.0],
    [0.0, 270.0, 0.0],
    [-90.0, 0.0, 0.0],
    [90.0, 0.0, 0.0],
];

/// Index of the spheremap face in an environment map.
pub const SPHEREMAP_FACE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceOp {
    FlipH,
    FlipV,
    RotateLeft,
    Rotate180,
}

impl FaceOp {
    /// Where texel (x, y) of an `n x n` image lands.
    pub fn map_texel(self, n: usize, x: usize, y: usize) -> (usize, usize) {
        match self {
            FaceOp::FlipH => (n - 1 - x, y),
            FaceOp::FlipV => (x, n - 1 - y),
            FaceOp::RotateLeft => (y, n - 1 - x),
            FaceOp::Rotate180 => (n - 1 - x, n - 1 - y),
        }
    }

    /// Same mapping for normalised coordinates (s right, t down).
    pub fn map_st(self, s: f32, t: f32) -> (f32, f32) {
        match self {
            FaceOp::FlipH => (1.0 - s, t),
            FaceOp::FlipV => (s, 1.0 - t),
            FaceOp::RotateLeft => (t, 1.0 - s),
            FaceOp::Rotate180 => (1.0 - s, 1.0 - t),
        }
    }
}

/// Operations taking a rendered face to the engine's cube layout.
pub const FACE_FIXUPS: [&[FaceOp]; 6] = [
    &[FaceOp::RotateLeft, FaceOp::FlipV],
    &[FaceOp::RotateLeft, FaceOp::FlipH],
    &[FaceOp::Rotate180],
    &[],
    &[FaceOp::RotateLeft],
    &[FaceOp::FlipH],
];

fn apply_op<T: Copy>(src: &[T], n: usize, op: FaceOp) -> Vec<T> {
    let mut dst = src.to_vec();
    for y in 0..n {
        for x in 0..n {
            let (dx, dy) = op.map_texel(n, x, y);
            let s = (y * n + x) * 4;
            let d = (dy * n + dx) * 4;
            dst[d..d + 4].copy_from_slice(&src[s..s + 4]);
        }
    }
    dst
}

fn apply_ops(image: &mut TexelBuffer, n: usize, ops: &[FaceOp]) {
    for &op in ops {
        match image {
            TexelBuffer::Rgba8(v) => *v = apply_op(v, n, op),
            TexelBuffer::RgbaF32(v) => *v = apply_op(v, n, op),
        }
    }
}

/// Rotate and flip the six cube faces of every mip and frame from the
/// rendered view orientation into the engine's cube layout.
pub fn fix_cubemap_face_orientation(tex: &mut VtfTexture) {
    assert!(tex.is_cube_map(), "orientation fixup needs an environment map");
    assert_eq!(tex.width(), tex.height(), "cube faces must be square");

    for mip in 0..tex.mip_count() {
        let (n, _) = tex.mip_size(mip);
        for frame in 0..tex.num_frames() {
            for (face, ops) in FACE_FIXUPS.iter().enumerate() {
                apply_ops(tex.image_mut(mip, frame, face), n, ops);
            }
        }
    }
}

struct FaceBasis {
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

fn face_bases() -> [FaceBasis; 6] {
    CUBEMAP_FACE_ANGLES.map(|angles| {
        let (forward, right, up) = angle_vectors_tuple(&angles);
        FaceBasis { forward, right, up }
    })
}

/// Face and fixed-layout texel coordinates (s, t in [0, 1]) seen along `dir`.
fn lookup_cube(bases: &[FaceBasis; 6], dir: &Vec3) -> (usize, f32, f32) {
    let mut face = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, b) in bases.iter().enumerate() {
        let d = dot_product(dir, &b.forward);
        if d > best {
            best = d;
            face = i;
        }
    }

    // dir ~ forward + (2s - 1) * right + (1 - 2t) * up in the rendered view
    let b = &bases[face];
    let sc = dot_product(dir, &b.right) / best;
    let tc = dot_product(dir, &b.up) / best;
    let (mut s, mut t) = ((sc + 1.0) * 0.5, (1.0 - tc) * 0.5);
    for &op in FACE_FIXUPS[face] {
        (s, t) = op.map_st(s, t);
    }
    (face, s.clamp(0.0, 1.0), t.clamp(0.0, 1.0))
}

/// World direction reflected towards a viewer looking down +X from the
/// sphere texel at (u, v), both in [-1, 1] with v up.
fn sphere_direction(u: f32, v: f32) -> Vec3 {
    let r2 = u * u + v * v;
    let (nx, ny) = if r2 > 1.0 {
        let r = r2.sqrt();
        (u / r, v / r)
    } else {
        (u, v)
    };
    let nz = (1.0 - nx * nx - ny * ny).max(0.0).sqrt();
    let rx = 2.0 * nz * nx;
    let ry = 2.0 * nz * ny;
    let rz = 2.0 * nz * nz - 1.0;
    // sphere x -> world right (0,-1,0), y -> up (0,0,1), z -> towards the viewer (-1,0,0)
    [-rz, -rx, ry]
}

/// Fill the spheremap face of every mip and frame by sampling the
/// (already oriented) cube faces.
pub fn generate_spheremap(tex: &mut VtfTexture) {
    assert!(tex.is_cube_map(), "spheremap needs an environment map");
    if tex.face_count() <= SPHEREMAP_FACE {
        return;
    }
    let bases = face_bases();

    for mip in 0..tex.mip_count() {
        let (n, _) = tex.mip_size(mip);
        for frame in 0..tex.num_frames() {
            let mut sphere = tex.image(mip, frame, SPHEREMAP_FACE).clone();
            for y in 0..n {
                for x in 0..n {
                    let u = 2.0 * (x as f32 + 0.5) / n as f32 - 1.0;
                    let v = 1.0 - 2.0 * (y as f32 + 0.5) / n as f32;
                    let dir = sphere_direction(u, v);
                    let (face, s, t) = lookup_cube(&bases, &dir);
                    let sx = ((s * n as f32) as usize).min(n - 1);
                    let sy = ((t * n as f32) as usize).min(n - 1);
                    let texel = tex.image(mip, frame, face).texel_f32(sy * n + sx);
                    sphere.set_texel_f32(y * n + x, texel);
                }
            }
            *tex.image_mut(mip, frame, SPHEREMAP_FACE) = sphere;
        }
    }
}
