// soft_renderer.rs — CPU view renderer: ray casts the level through the KD-tree

use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;

use cubebake_common::q_shared::{angle_vectors_tuple, dot_product, vector_ma, vector_multiply, vector_normalize, vector_scale, Vec3};
use cubebake_raytrace::{Ray, RayTracingEnvironment, TriangleFlags};

use crate::view::{RenderFlags, ViewRenderer, ViewSetup};
use crate::BakeError;

/// What the renderer draws.
#[derive(Debug)]
pub struct Scene {
    pub tracer: Arc<RayTracingEnvironment>,
    /// Linear radiance returned by sky surfaces.
    pub sky_radiance: Vec3,
}

/// Published by the host on every level load, read by the renderer on
/// every view.
pub type SharedScene = Arc<RwLock<Option<Arc<Scene>>>>;

pub const DISPLAY_GAMMA: f32 = 2.2;

struct Frame {
    /// The view with its clear colour zeroed; identical keys share radiance.
    key: ViewSetup,
    scene: Arc<Scene>,
    width: usize,
    height: usize,
    /// `None` where the ray left the world.
    radiance: Vec<Option<Vec3>>,
}

pub struct SoftRenderer {
    scene: SharedScene,
    width: usize,
    height: usize,
    tone_mapping_scale: f32,
    clear_color: [u8; 3],
    frame: Option<Frame>,
    frames_presented: usize,
}

impl SoftRenderer {
    pub fn new(scene: SharedScene, width: usize, height: usize) -> Self {
        Self {
            scene,
            width,
            height,
            tone_mapping_scale: 1.0,
            clear_color: [0; 3],
            frame: None,
            frames_presented: 0,
        }
    }

    pub fn tone_mapping_scale(&self) -> f32 {
        self.tone_mapping_scale
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    fn cached(&self, key: &ViewSetup, scene: &Arc<Scene>) -> bool {
        self.frame
            .as_ref()
            .is_some_and(|f| f.key == *key && Arc::ptr_eq(&f.scene, scene))
    }
}

/// Radiance seen along one primary ray: sky, or the surface reflectivity lit
/// by a light at the eye.
fn shade(scene: &Scene, ray: &Ray) -> Option<Vec3> {
    let hit = scene.tracer.trace_ray(ray);
    if !hit.is_hit() {
        return None;
    }
    let index = hit.triangle_index as usize;
    if scene.tracer.triangle_flags(index).contains(TriangleFlags::SKY) {
        return Some(scene.sky_radiance);
    }
    let lambert = dot_product(&ray.direction, &hit.surface_normal).abs();
    Some(vector_scale(&scene.tracer.triangle_color(index), lambert))
}

fn trace_view(scene: &Scene, view: &ViewSetup) -> Vec<Option<Vec3>> {
    let (forward, right, up) = angle_vectors_tuple(&view.angles);
    let half_x = (view.fov_x.to_radians() * 0.5).tan();
    let half_y = (view.fov_y.to_radians() * 0.5).tan();
    let (w, h) = (view.width, view.height);

    let mut radiance = vec![None; w * h];
    radiance.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let sy = 1.0 - 2.0 * (y as f32 + 0.5) / h as f32;
        for (x, out) in row.iter_mut().enumerate() {
            let sx = 2.0 * (x as f32 + 0.5) / w as f32 - 1.0;
            let mut dir = vector_ma(&vector_ma(&forward, sx * half_x, &right), sy * half_y, &up);
            vector_normalize(&mut dir);
            // clip planes are depths along forward, not distances along the ray
            let along = dot_product(&dir, &forward);
            let mut ray = Ray::new(view.origin, dir, view.zfar / along);
            ray.tmin = view.znear / along;
            *out = shade(scene, &ray);
        }
    });
    radiance
}

impl ViewRenderer for SoftRenderer {
    fn render_view(&mut self, view: &ViewSetup) {
        self.clear_color = if view.flags.contains(RenderFlags::CLEAR_COLOR) {
            view.clear_color
        } else {
            [0; 3]
        };
        let Some(scene) = self.scene.read().clone() else {
            log::warn!("render_view: no level loaded");
            self.frame = None;
            return;
        };

        let key = ViewSetup { clear_color: [0; 3], ..*view };
        if self.cached(&key, &scene) {
            return;
        }
        let radiance = if view.flags.contains(RenderFlags::DRAW_WORLD) {
            trace_view(&scene, view)
        } else {
            vec![None; view.width * view.height]
        };
        self.frame = Some(Frame {
            key,
            scene,
            width: view.width,
            height: view.height,
            radiance,
        });
    }

    fn read_pixels(&mut self, x: usize, y: usize, width: usize, height: usize) -> Result<Vec<u8>, BakeError> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| BakeError::Readback("nothing rendered".into()))?;
        if x + width > frame.width || y + height > frame.height {
            return Err(BakeError::Readback(format!(
                "{}x{} at ({}, {}) is outside the {}x{} view",
                width, height, x, y, frame.width, frame.height
            )));
        }

        let scale = [self.tone_mapping_scale; 3];
        let [cr, cg, cb] = self.clear_color;
        let mut pixels = Vec::with_capacity(width * height * 4);
        for row in y..y + height {
            for texel in &frame.radiance[row * frame.width + x..row * frame.width + x + width] {
                match texel {
                    Some(radiance) => {
                        let exposed = vector_multiply(radiance, &scale);
                        for c in exposed {
                            let v = c.clamp(0.0, 1.0).powf(1.0 / DISPLAY_GAMMA);
                            pixels.push((v * 255.0 + 0.5) as u8);
                        }
                        pixels.push(255);
                    }
                    None => pixels.extend_from_slice(&[cr, cg, cb, 255]),
                }
            }
        }
        Ok(pixels)
    }

    fn set_tone_mapping_scale(&mut self, scale: f32) {
        self.tone_mapping_scale = scale;
    }

    fn swap_buffers(&mut self) {
        self.frames_presented += 1;
    }

    fn screen_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{cube_face_view, CUBE_ZNEAR};

    /// A closed box around the origin: grey floor, red walls, sky ceiling.
    fn box_scene() -> SharedScene {
        let mut env = RayTracingEnvironment::new();
        let (lo, hi) = (-100.0f32, 100.0f32);
        let floor = [[lo, lo, lo], [hi, lo, lo], [hi, hi, lo], [lo, hi, lo]];
        let ceiling = [[lo, lo, hi], [hi, lo, hi], [hi, hi, hi], [lo, hi, hi]];
        let quad = |env: &mut RayTracingEnvironment, id: i32, q: [Vec3; 4], color: Vec3, flags: TriangleFlags| {
            env.add_triangle_ex(id, [q[0], q[1], q[2]], color, flags, 0, None);
            env.add_triangle_ex(id, [q[0], q[2], q[3]], color, flags, 0, None);
        };
        quad(&mut env, 0, floor, [0.5, 0.5, 0.5], TriangleFlags::empty());
        quad(&mut env, 1, ceiling, [0.0; 3], TriangleFlags::SKY);
        let walls = [
            [[lo, lo, lo], [lo, hi, lo], [lo, hi, hi], [lo, lo, hi]],
            [[hi, lo, lo], [hi, hi, lo], [hi, hi, hi], [hi, lo, hi]],
            [[lo, lo, lo], [hi, lo, lo], [hi, lo, hi], [lo, lo, hi]],
            [[lo, hi, lo], [hi, hi, lo], [hi, hi, hi], [lo, hi, hi]],
        ];
        for (i, wall) in walls.into_iter().enumerate() {
            quad(&mut env, 2 + i as i32, wall, [1.0, 0.0, 0.0], TriangleFlags::empty());
        }
        env.setup_acceleration_structure();
        Arc::new(RwLock::new(Some(Arc::new(Scene {
            tracer: Arc::new(env),
            sky_radiance: [4.0, 4.0, 4.0],
        }))))
    }

    fn center(pixels: &[u8], size: usize) -> [u8; 4] {
        let i = ((size / 2) * size + size / 2) * 4;
        [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
    }

    #[test]
    fn test_faces_see_walls_floor_and_sky() {
        let mut renderer = SoftRenderer::new(box_scene(), 64, 64);
        // down: lit floor, head-on
        renderer.render_view(&cube_face_view([0.0; 3], 5, 8, [0; 3]));
        let down = renderer.read_pixels(0, 0, 32, 32).unwrap();
        let expected = (0.5f32.powf(1.0 / 2.2) * 255.0 + 0.5) as u8;
        assert_eq!(center(&down, 32), [expected, expected, expected, 255]);

        // up: sky, clipped at unit exposure
        renderer.render_view(&cube_face_view([0.0; 3], 4, 8, [0; 3]));
        let up = renderer.read_pixels(0, 0, 32, 32).unwrap();
        assert_eq!(center(&up, 32), [255, 255, 255, 255]);

        // right: a red wall
        renderer.render_view(&cube_face_view([0.0; 3], 0, 8, [0; 3]));
        let rt = renderer.read_pixels(0, 0, 32, 32).unwrap();
        assert_eq!(center(&rt, 32), [255, 0, 0, 255]);
    }

    #[test]
    fn test_tone_mapping_reuses_radiance() {
        let mut renderer = SoftRenderer::new(box_scene(), 64, 64);
        let view = cube_face_view([0.0; 3], 4, 8, [128, 128, 128]);
        renderer.set_tone_mapping_scale(0.125);
        renderer.render_view(&view);
        let dim = renderer.read_pixels(0, 0, 32, 32).unwrap();
        let expected = (0.5f32.powf(1.0 / 2.2) * 255.0 + 0.5) as u8;
        assert_eq!(center(&dim, 32)[0], expected);

        // same view, black clear: served from the cached radiance
        renderer.set_tone_mapping_scale(0.0625);
        renderer.render_view(&ViewSetup { clear_color: [0; 3], ..view });
        let dimmer = renderer.read_pixels(0, 0, 32, 32).unwrap();
        assert!(center(&dimmer, 32)[0] < expected);
        renderer.swap_buffers();
        assert_eq!(renderer.frames_presented(), 1);
    }

    #[test]
    fn test_misses_use_clear_colour() {
        let scene: SharedScene = Arc::new(RwLock::new(Some(Arc::new(Scene {
            tracer: Arc::new({
                let mut env = RayTracingEnvironment::new();
                env.setup_acceleration_structure();
                env
            }),
            sky_radiance: [1.0; 3],
        }))));
        let mut renderer = SoftRenderer::new(scene, 16, 16);
        renderer.render_view(&cube_face_view([0.0; 3], 0, 2, [128, 128, 128]));
        let pixels = renderer.read_pixels(0, 0, 8, 8).unwrap();
        assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
    }

    /// A red wall facing the +X view at depth `x`.
    fn wall_scene(x: f32) -> SharedScene {
        let mut env = RayTracingEnvironment::new();
        let (lo, hi) = (-100.0f32, 100.0f32);
        let q = [[x, lo, lo], [x, hi, lo], [x, hi, hi], [x, lo, hi]];
        env.add_triangle_ex(0, [q[0], q[1], q[2]], [1.0, 0.0, 0.0], TriangleFlags::empty(), 0, None);
        env.add_triangle_ex(0, [q[0], q[2], q[3]], [1.0, 0.0, 0.0], TriangleFlags::empty(), 0, None);
        env.setup_acceleration_structure();
        Arc::new(RwLock::new(Some(Arc::new(Scene {
            tracer: Arc::new(env),
            sky_radiance: [0.0; 3],
        }))))
    }

    #[test]
    fn test_near_plane_clips_by_depth() {
        // closer than znear: clipped across the whole face, corners included
        let mut renderer = SoftRenderer::new(wall_scene(CUBE_ZNEAR * 0.9), 16, 16);
        renderer.render_view(&cube_face_view([0.0; 3], 0, 2, [128, 128, 128]));
        let pixels = renderer.read_pixels(0, 0, 8, 8).unwrap();
        assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));

        // just beyond znear: drawn everywhere
        let mut renderer = SoftRenderer::new(wall_scene(CUBE_ZNEAR * 1.1), 16, 16);
        renderer.render_view(&cube_face_view([0.0; 3], 0, 2, [128, 128, 128]));
        let pixels = renderer.read_pixels(0, 0, 8, 8).unwrap();
        assert!(pixels.chunks_exact(4).all(|p| p[0] > 0 && p[1] == 0 && p[2] == 0));
    }

    #[test]
    fn test_readback_errors() {
        let scene: SharedScene = Arc::new(RwLock::new(None));
        let mut renderer = SoftRenderer::new(scene, 16, 16);
        assert_eq!(renderer.screen_size(), (16, 16));
        renderer.render_view(&cube_face_view([0.0; 3], 0, 2, [0; 3]));
        assert!(renderer.read_pixels(0, 0, 8, 8).is_err());

        let mut renderer = SoftRenderer::new(box_scene(), 16, 16);
        renderer.render_view(&cube_face_view([0.0; 3], 0, 2, [0; 3]));
        assert!(renderer.read_pixels(4, 4, 8, 8).is_err());
    }
}
