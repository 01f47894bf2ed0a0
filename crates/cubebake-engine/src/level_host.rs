// level_host.rs — host backed by a BSP in the game directory

use std::io;
use std::sync::Arc;

use cubebake_bsp::{Level, LevelLight, LevelLightKind};
use cubebake_common::cvar::CvarContext;
use cubebake_common::files::FsContext;
use cubebake_common::q_shared::Vec3;
use cubebake_raytrace::{LightDesc, RayTracingEnvironment, TriangleFlags};

use crate::config::MAT_FASTSPECULAR;
use crate::host::EngineHost;
use crate::soft_renderer::{Scene, SharedScene};
use crate::BakeError;

pub const DEFAULT_SKY_RADIANCE: Vec3 = [2.0, 2.0, 2.0];

pub fn level_light_desc(light: &LevelLight) -> LightDesc {
    let mut desc = match light.kind {
        LevelLightKind::Point => LightDesc::point(light.origin, light.intensity),
        LevelLightKind::Spot => LightDesc::spot(
            light.origin,
            light.direction,
            light.intensity,
            light.inner_cone * 2.0,
            light.outer_cone * 2.0,
        ),
        LevelLightKind::Environment => return LightDesc::directional(light.direction, light.intensity),
    };
    desc.attenuation0 = light.constant_attn;
    desc.attenuation1 = light.linear_attn;
    desc.attenuation2 = light.quadratic_attn;
    desc
}

/// World triangles and lights of `level`, ready to trace.
pub fn build_tracer(level: &Level) -> RayTracingEnvironment {
    let mut env = RayTracingEnvironment::new();
    for (id, tri) in level.triangles.iter().enumerate() {
        let flags = if tri.sky { TriangleFlags::SKY } else { TriangleFlags::empty() };
        env.add_triangle_ex(id as i32, tri.vertices, tri.reflectivity, flags, 0, None);
    }
    for light in &level.lights {
        env.add_light(level_light_desc(light));
    }
    env.setup_acceleration_structure();
    env
}

pub struct BspLevelHost {
    fs: FsContext,
    level: Option<Level>,
    tracer: Option<Arc<RayTracingEnvironment>>,
    scene: SharedScene,
    sky_radiance: Vec3,
    view_origin: Vec3,
    fast_specular: bool,
    material_reloads: usize,
}

impl BspLevelHost {
    pub fn new(fs: FsContext, scene: SharedScene) -> Self {
        Self {
            fs,
            level: None,
            tracer: None,
            scene,
            sky_radiance: DEFAULT_SKY_RADIANCE,
            view_origin: [0.0; 3],
            fast_specular: true,
            material_reloads: 0,
        }
    }

    pub fn set_sky_radiance(&mut self, radiance: Vec3) {
        self.sky_radiance = radiance;
    }

    pub fn set_view_origin(&mut self, origin: Vec3) {
        self.view_origin = origin;
    }

    pub fn fast_specular(&self) -> bool {
        self.fast_specular
    }

    pub fn material_reloads(&self) -> usize {
        self.material_reloads
    }

    /// Load `maps/<name>.bsp` and stand at its player start.
    pub fn load_map(&mut self, name: &str) -> Result<(), BakeError> {
        let world_model_path = if name.ends_with(".bsp") {
            name.to_string()
        } else {
            format!("maps/{}.bsp", name)
        };
        self.load_world(&world_model_path)?;
        if let Some(level) = &self.level {
            self.view_origin = level.default_view_origin();
        }
        Ok(())
    }

    fn load_world(&mut self, world_model_path: &str) -> Result<(), BakeError> {
        let path = self.fs.find_file(world_model_path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("can't find {}", world_model_path))
        })?;
        let level = Level::load(&path, world_model_path)?;
        let tracer = Arc::new(build_tracer(&level));
        log::info!(
            "loaded {}: {} cubemap samples, {} triangles, {} lights",
            world_model_path,
            level.cubemap_samples.len(),
            level.triangles.len(),
            level.lights.len()
        );

        *self.scene.write() = Some(Arc::new(Scene {
            tracer: tracer.clone(),
            sky_radiance: self.sky_radiance,
        }));
        self.tracer = Some(tracer);
        self.level = Some(level);
        Ok(())
    }
}

impl EngineHost for BspLevelHost {
    fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    fn view_origin(&self) -> Vec3 {
        self.view_origin
    }

    fn fs(&self) -> &FsContext {
        &self.fs
    }

    fn rebuild_material_system_config(&mut self, cvars: &CvarContext) {
        self.fast_specular = cvars.variable_int(MAT_FASTSPECULAR) != 0;
        log::debug!("material config: fast specular {}", self.fast_specular);
    }

    fn restart_level(&mut self) -> Result<(), BakeError> {
        let world_model_path = self.world_model_path().ok_or(BakeError::NoMapLoaded)?;
        self.load_world(&world_model_path)
    }

    fn reload_materials(&mut self) {
        self.material_reloads += 1;
        log::debug!("reloading materials");
    }

    fn tracer(&self) -> Option<Arc<RayTracingEnvironment>> {
        self.tracer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_dir;
    use cubebake_bsp::BspFile;
    use cubebake_common::qfiles::{DCubemapSample, LUMP_CUBEMAPS, LUMP_ENTITIES};
    use parking_lot::RwLock;

    fn write_map(fs: &FsContext, samples: &[[i32; 3]]) {
        let mut bsp = BspFile::new(20);
        bsp.set_lump(
            LUMP_ENTITIES,
            b"{\n\"classname\" \"worldspawn\"\n\"skyname\" \"sky_test\"\n}\n\
              {\n\"classname\" \"info_player_start\"\n\"origin\" \"16 32 48\"\n}\n\
              {\n\"classname\" \"light\"\n\"origin\" \"0 0 100\"\n}\n\0"
                .to_vec(),
        );
        let records: Vec<DCubemapSample> = samples
            .iter()
            .map(|&origin| DCubemapSample { origin, size: 0, _pad: [0; 3] })
            .collect();
        bsp.set_lump_records(LUMP_CUBEMAPS, &records);
        bsp.write(&fs.full_path("maps/box.bsp")).unwrap();
    }

    #[test]
    fn test_load_and_restart() {
        let dir = temp_dir("level_host");
        std::fs::create_dir_all(dir.join("maps")).unwrap();
        let fs = FsContext::new(&dir);
        write_map(&fs, &[[0, 0, 0]]);

        let scene: SharedScene = Arc::new(RwLock::new(None));
        let mut host = BspLevelHost::new(fs, scene.clone());
        assert!(matches!(host.restart_level(), Err(BakeError::NoMapLoaded)));
        assert!(host.load_map("missing").is_err());

        host.load_map("box").unwrap();
        assert_eq!(host.world_model_path().as_deref(), Some("maps/box.bsp"));
        assert_eq!(host.view_origin(), [16.0, 32.0, 48.0]);
        assert_eq!(host.level().unwrap().cubemap_samples.len(), 1);
        assert_eq!(host.tracer().unwrap().light_list.len(), 1);
        assert!(scene.read().is_some());

        // restart picks up what was written to disk and keeps the view
        host.set_view_origin([1.0, 2.0, 3.0]);
        write_map(host.fs(), &[[0, 0, 0], [64, 0, 0]]);
        host.restart_level().unwrap();
        assert_eq!(host.level().unwrap().cubemap_samples.len(), 2);
        assert_eq!(host.view_origin(), [1.0, 2.0, 3.0]);

        let mut cvars = CvarContext::new();
        cvars.set(MAT_FASTSPECULAR, "0");
        host.rebuild_material_system_config(&cvars);
        assert!(!host.fast_specular());
        host.reload_materials();
        assert_eq!(host.material_reloads(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_light_conversion() {
        let light = LevelLight {
            kind: LevelLightKind::Spot,
            origin: [0.0, 0.0, 100.0],
            intensity: [100.0; 3],
            direction: [0.0, 0.0, -1.0],
            inner_cone: 10.0,
            outer_cone: 20.0,
            constant_attn: 0.0,
            linear_attn: 0.0,
            quadratic_attn: 1.0,
        };
        let desc = level_light_desc(&light);
        assert!((desc.theta_dot - 10.0f32.to_radians().cos()).abs() < 1e-6);
        assert!((desc.phi_dot - 20.0f32.to_radians().cos()).abs() < 1e-6);
        let below = desc.intensity_at(&[0.0; 3], None);
        assert!((below[0] - 0.01).abs() < 1e-6);

        let sun = LevelLight {
            kind: LevelLightKind::Environment,
            constant_attn: 1.0,
            quadratic_attn: 0.0,
            ..light
        };
        assert_eq!(level_light_desc(&sun).intensity_at(&[0.0; 3], None), [100.0; 3]);
    }
}
