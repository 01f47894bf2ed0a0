// view.rs — the renderer surface the bake drives

use bitflags::bitflags;

use cubebake_bitmap::resample;
use cubebake_common::q_shared::Vec3;

use crate::BakeError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderFlags: u32 {
        const DRAW_WORLD       = 0x01;
        const DRAW_ENTITIES    = 0x02;
        const CLEAR_COLOR      = 0x04;
        const CLEAR_DEPTH      = 0x08;
        const NO_VIEWMODEL     = 0x10;
        const NO_HUD           = 0x20;
    }
}

/// One 3D view to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSetup {
    pub origin: Vec3,
    /// pitch, yaw, roll in degrees
    pub angles: Vec3,
    pub fov_x: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub clear_color: [u8; 3],
    pub flags: RenderFlags,
}

/// Renderer collaborator. `render_view` is synchronous with respect to the
/// following `read_pixels`.
pub trait ViewRenderer {
    fn render_view(&mut self, view: &ViewSetup);

    /// RGBA8 texels of a screen rectangle, top row first.
    fn read_pixels(&mut self, x: usize, y: usize, width: usize, height: usize) -> Result<Vec<u8>, BakeError>;

    fn set_tone_mapping_scale(&mut self, scale: f32);

    fn swap_buffers(&mut self);

    fn screen_size(&self) -> (usize, usize);

    #[allow(clippy::too_many_arguments)]
    fn resample_rgba8(
        &self,
        src: &[u8],
        src_width: usize,
        src_height: usize,
        dst_width: usize,
        dst_height: usize,
        src_gamma: f32,
        dst_gamma: f32,
    ) -> Vec<u8> {
        resample::resample_rgba8(src, src_width, src_height, dst_width, dst_height, src_gamma, dst_gamma)
    }
}
