// hdr.rs — float radiance from a bracket of LDR exposures

use cubebake_bitmap::FloatBitMap;
use cubebake_common::q_shared::Vec3;

use crate::snapshot::{take_face_snapshot, HDR_FIRST_PASS_CLEAR};
use crate::view::ViewRenderer;
use crate::BakeError;

pub const HDR_START_EXPOSURE: f32 = 16.0;
pub const HDR_EXPOSURE_RATIO: f32 = 0.75;
pub const HDR_MIN_EXPOSURE: f32 = 0.05;
/// A linear channel above this counts as clipped.
pub const HDR_CLIP_THRESHOLD: f32 = 0.98;
pub const HDR_GAMMA: f32 = 2.2;
/// Exposures from 16 down to the floor.
pub const HDR_MAX_ITERATIONS: usize = 21;

#[derive(Debug, Clone)]
pub struct BracketedFace {
    pub image: FloatBitMap,
    pub iterations: usize,
    pub last_exposure: f32,
}

/// Fold one linear LDR exposure into the accumulator. Returns true if any
/// channel of `ldr` was clipped.
pub fn accumulate_exposure(acc: &mut FloatBitMap, ldr: &FloatBitMap, exposure: f32) -> bool {
    assert_eq!(
        (acc.width(), acc.height()),
        (ldr.width(), ldr.height()),
        "exposure size mismatch"
    );
    let scale = 1.0 / exposure;
    let mut overexposed = false;
    for (dst, src) in acc.data_mut().chunks_exact_mut(4).zip(ldr.data().chunks_exact(4)) {
        for c in 0..3 {
            let v = src[c];
            if v > HDR_CLIP_THRESHOLD {
                overexposed = true;
            }
            dst[c] = dst[c].max(v * scale);
        }
    }
    overexposed
}

/// Shoot `face` at falling exposures until nothing clips or the floor is
/// reached, keeping the largest unscaled value seen per channel.
pub fn bracket_hdr_face(
    renderer: &mut dyn ViewRenderer,
    origin: Vec3,
    face: usize,
    face_size: usize,
) -> Result<BracketedFace, BakeError> {
    let mut acc = FloatBitMap::filled(face_size, face_size, [0.0, 0.0, 0.0, 1.0]);
    let mut exposure = HDR_START_EXPOSURE;
    let mut iterations = 0;

    loop {
        renderer.set_tone_mapping_scale(exposure);
        let clear = if iterations == 0 { HDR_FIRST_PASS_CLEAR } else { [0, 0, 0] };
        let ldr8 = take_face_snapshot(renderer, origin, face, face_size, clear)?;
        let mut ldr = FloatBitMap::from_rgba8(face_size, face_size, &ldr8);
        ldr.raise_to_power(HDR_GAMMA);

        let overexposed = accumulate_exposure(&mut acc, &ldr, exposure);
        iterations += 1;
        let used = exposure;
        exposure *= HDR_EXPOSURE_RATIO;
        renderer.swap_buffers();

        if !overexposed || exposure <= HDR_MIN_EXPOSURE {
            log::debug!("face {}: {} exposures, last {:.3}", face, iterations, used);
            return Ok(BracketedFace {
                image: acc,
                iterations,
                last_exposure: used,
            });
        }
    }
}

/// All six faces in engine order.
pub fn bracket_hdr_cube(
    renderer: &mut dyn ViewRenderer,
    origin: Vec3,
    face_size: usize,
) -> Result<[FloatBitMap; 6], BakeError> {
    let mut faces: [FloatBitMap; 6] = std::array::from_fn(|_| FloatBitMap::new(face_size, face_size));
    for (face, out) in faces.iter_mut().enumerate() {
        *out = bracket_hdr_face(renderer, origin, face, face_size)?.image;
    }
    Ok(faces)
}
