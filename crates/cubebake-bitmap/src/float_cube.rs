// float_cube.rs — six-face float cube and the engine face-order remap

use std::path::Path;

use crate::float_bm::FloatBitMap;
use crate::BitmapError;

pub const CUBE_FACES: usize = 6;

/// On-disk face suffixes, in engine face order (RIGHT, LEFT, BACK, FRONT, UP, DOWN).
pub const FACE_SUFFIXES: [&str; CUBE_FACES] = ["rt", "lf", "bk", "ft", "up", "dn"];

/// Engine face index -> FloatCubeMap slot.
pub const ENGINE_CUBEMAP_IDX_TO_FBM_IDX: [usize; CUBE_FACES] = [4, 3, 0, 2, 5, 1];

/// FloatCubeMap slot -> engine face index.
pub const FBM_IDX_TO_ENGINE_CUBEMAP_IDX: [usize; CUBE_FACES] = {
    let mut inverse = [0usize; CUBE_FACES];
    let mut i = 0;
    while i < CUBE_FACES {
        inverse[ENGINE_CUBEMAP_IDX_TO_FBM_IDX[i]] = i;
        i += 1;
    }
    inverse
};

/// Six square float faces of identical size, stored in float-cube slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatCubeMap {
    pub face_maps: [FloatBitMap; CUBE_FACES],
}

impl FloatCubeMap {
    pub fn new(edge: usize) -> Self {
        Self {
            face_maps: std::array::from_fn(|_| FloatBitMap::new(edge, edge)),
        }
    }

    /// Build a cube from faces given in engine order.
    pub fn from_engine_faces(faces: [FloatBitMap; CUBE_FACES]) -> Self {
        let edge = faces[0].width();
        assert!(
            faces.iter().all(|f| f.width() == edge && f.height() == edge),
            "cube faces must be square and equal-sized"
        );
        let mut slots: [Option<FloatBitMap>; CUBE_FACES] = Default::default();
        for (engine_idx, face) in faces.into_iter().enumerate() {
            slots[ENGINE_CUBEMAP_IDX_TO_FBM_IDX[engine_idx]] = Some(face);
        }
        Self {
            face_maps: slots.map(|slot| slot.unwrap_or_else(|| FloatBitMap::new(edge, edge))),
        }
    }

    pub fn edge(&self) -> usize {
        self.face_maps[0].width()
    }

    /// Face by engine index.
    pub fn engine_face(&self, engine_idx: usize) -> &FloatBitMap {
        &self.face_maps[ENGINE_CUBEMAP_IDX_TO_FBM_IDX[engine_idx]]
    }

    /// Write `<base><suffix>.pfm` for each face, in engine order.
    pub fn write_pfm_faces(&self, base: &Path) -> Result<(), BitmapError> {
        for (engine_idx, suffix) in FACE_SUFFIXES.iter().enumerate() {
            let path = face_path(base, suffix, "pfm");
            self.engine_face(engine_idx).write_pfm(&path)?;
        }
        Ok(())
    }
}

/// `<base><suffix>.<ext>`; `base` is a path without extension.
pub fn face_path(base: &Path, suffix: &str, ext: &str) -> std::path::PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    name.push(".");
    name.push(ext);
    name.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_is_permutation() {
        let mut seen = [false; CUBE_FACES];
        for &slot in &ENGINE_CUBEMAP_IDX_TO_FBM_IDX {
            assert!(!seen[slot]);
            seen[slot] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_remap_inverse_composes_to_identity() {
        for i in 0..CUBE_FACES {
            assert_eq!(FBM_IDX_TO_ENGINE_CUBEMAP_IDX[ENGINE_CUBEMAP_IDX_TO_FBM_IDX[i]], i);
            assert_eq!(ENGINE_CUBEMAP_IDX_TO_FBM_IDX[FBM_IDX_TO_ENGINE_CUBEMAP_IDX[i]], i);
        }
    }

    #[test]
    fn test_from_engine_faces_uses_remap() {
        let faces = std::array::from_fn(|i| FloatBitMap::filled(2, 2, [i as f32, 0.0, 0.0, 1.0]));
        let cube = FloatCubeMap::from_engine_faces(faces);
        // engine RIGHT lands in slot 4, engine BACK in slot 0
        assert_eq!(cube.face_maps[4].pixel(0, 0, 0), 0.0);
        assert_eq!(cube.face_maps[0].pixel(0, 0, 0), 2.0);
        for i in 0..CUBE_FACES {
            assert_eq!(cube.engine_face(i).pixel(1, 1, 0), i as f32);
        }
    }

    #[test]
    fn test_face_path() {
        let p = face_path(Path::new("materialsrc/maps/test/c0_0_0"), "rt", "tga");
        assert_eq!(p, Path::new("materialsrc/maps/test/c0_0_0rt.tga"));
    }
}
