// snapshot.rs — render one cube face and reduce it to the face size

use cubebake_common::q_shared::Vec3;
use cubebake_vtf::CUBEMAP_FACE_ANGLES;

use crate::view::{RenderFlags, ViewRenderer, ViewSetup};
use crate::BakeError;

/// Faces are rendered at this multiple of the face edge, then box-filtered down.
pub const SUPERSAMPLE: usize = 4;

pub const CUBE_FOV: f32 = 90.0;
pub const CUBE_ZNEAR: f32 = 8.0;
pub const CUBE_ZFAR: f32 = 28400.0;

/// Grey clear for the first HDR exposure.
pub const HDR_FIRST_PASS_CLEAR: [u8; 3] = [128, 128, 128];

pub fn cube_face_view(origin: Vec3, face: usize, face_size: usize, clear_color: [u8; 3]) -> ViewSetup {
    let size = SUPERSAMPLE * face_size;
    ViewSetup {
        origin,
        angles: CUBEMAP_FACE_ANGLES[face],
        fov_x: CUBE_FOV,
        fov_y: CUBE_FOV,
        aspect: 1.0,
        znear: CUBE_ZNEAR,
        zfar: CUBE_ZFAR,
        x: 0,
        y: 0,
        width: size,
        height: size,
        clear_color,
        flags: RenderFlags::DRAW_WORLD
            | RenderFlags::DRAW_ENTITIES
            | RenderFlags::CLEAR_COLOR
            | RenderFlags::CLEAR_DEPTH
            | RenderFlags::NO_VIEWMODEL
            | RenderFlags::NO_HUD,
    }
}

/// Render `face` (engine order) at `origin` and return `face_size`^2
/// RGBA8 texels.
pub fn take_face_snapshot(
    renderer: &mut dyn ViewRenderer,
    origin: Vec3,
    face: usize,
    face_size: usize,
    clear_color: [u8; 3],
) -> Result<Vec<u8>, BakeError> {
    let view = cube_face_view(origin, face, face_size, clear_color);
    renderer.render_view(&view);
    let pixels = renderer.read_pixels(view.x, view.y, view.width, view.height)?;
    let expected = view.width * view.height * 4;
    if pixels.len() != expected {
        return Err(BakeError::Readback(format!(
            "read {} bytes for a {}x{} view, expected {}",
            pixels.len(),
            view.width,
            view.height,
            expected
        )));
    }
    Ok(renderer.resample_rgba8(&pixels, view.width, view.height, face_size, face_size, 1.0, 1.0))
}

/// All six LDR faces in engine order.
pub fn take_cube_snapshot(
    renderer: &mut dyn ViewRenderer,
    origin: Vec3,
    face_size: usize,
) -> Result<[Vec<u8>; 6], BakeError> {
    let mut faces: [Vec<u8>; 6] = Default::default();
    for (face, out) in faces.iter_mut().enumerate() {
        *out = take_face_snapshot(renderer, origin, face, face_size, [0, 0, 0])?;
    }
    Ok(faces)
}
