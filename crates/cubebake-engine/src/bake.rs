// bake.rs — buildcubemaps: bake every cubemap sample and pack it into the map

use std::path::{Path, PathBuf};

use cubebake_bsp::CubemapSample;
use cubebake_common::common::{com_file_base, com_strip_extension};
use cubebake_common::cvar::{CvarContext, SavedCvars};
use cubebake_common::files::{is_writable, MATERIALSRC_DIR, MATERIALS_DIR};
use cubebake_vtf::compiler::with_extension;

use crate::assembler::bake_cubemap_at;
use crate::config::{
    default_face_size, hdr_enabled, BAKE_OVERRIDES, BAKE_SAVED_CVARS, MAT_FASTSPECULAR, R_DRAWLIGHTSPRITES,
    R_DRAWPROPS,
};
use crate::default_cubemap::{build_default_cubemap, default_cubemap_pak_name};
use crate::host::EngineHost;
use crate::snapshot::SUPERSAMPLE;
use crate::toolchain::{Toolchain, ToolchainProvider};
use crate::view::ViewRenderer;
use crate::BakeError;

/// Everything a bake touches.
pub struct BakeContext<'a> {
    pub cvars: &'a mut CvarContext,
    pub host: &'a mut dyn EngineHost,
    pub renderer: &'a mut dyn ViewRenderer,
    pub toolchain: &'a dyn ToolchainProvider,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BakeReport {
    pub bounces_completed: usize,
    pub samples_baked: usize,
    pub samples_skipped: usize,
    /// Pak entries written, in order, over all bounces.
    pub packed: Vec<String>,
    pub default_cubemap_packed: bool,
    /// `bounce: k/N sample: i/M` lines.
    pub progress: Vec<String>,
}

/// `maps/foo.bsp` -> `foo`; anything else -> its file base.
pub fn map_name_from_world_path(world_model_path: &str) -> String {
    let path = world_model_path.replace('\\', "/");
    match path.strip_prefix("maps/") {
        Some(rest) => com_strip_extension(rest).to_string(),
        None => com_file_base(&path).to_string(),
    }
}

/// `c<x>_<y>_<z>` plus `_hdr` in HDR mode.
pub fn sample_texture_name(origin: [i32; 3], hdr: bool) -> String {
    format!("c{}_{}_{}{}", origin[0], origin[1], origin[2], if hdr { "_hdr" } else { "" })
}

pub fn sample_source_name(map_name: &str, origin: [i32; 3], hdr: bool) -> String {
    format!("{}/maps/{}/{}", MATERIALSRC_DIR, map_name, sample_texture_name(origin, hdr))
}

pub fn sample_pak_name(map_name: &str, origin: [i32; 3], hdr: bool) -> String {
    format!("{}/maps/{}/{}.vtf", MATERIALS_DIR, map_name, sample_texture_name(origin, hdr))
}

/// The supersampled buffer for `face_size` must fit on screen.
pub fn check_face_buffer(face_size: usize, screen: (usize, usize)) -> Result<(), BakeError> {
    let (screen_width, screen_height) = screen;
    let required = SUPERSAMPLE.checked_mul(face_size).unwrap_or(usize::MAX);
    if required > screen_width || required > screen_height {
        return Err(BakeError::BufferTooSmall {
            face_size,
            required,
            screen_width,
            screen_height,
        });
    }
    Ok(())
}

pub fn check_sample_buffers(
    samples: &[CubemapSample],
    default_size: usize,
    screen: (usize, usize),
) -> Result<(), BakeError> {
    samples
        .iter()
        .try_for_each(|sample| check_face_buffer(sample.face_size(default_size), screen))
}

/// Bake all cubemap samples of the loaded level `bounces` times, packing
/// the results into its BSP after each pass. Cvars are restored on every
/// exit path; per-sample failures are counted, not returned.
pub fn bake_cubemaps(ctx: BakeContext<'_>, bounces: usize) -> Result<BakeReport, BakeError> {
    let BakeContext {
        cvars,
        host,
        renderer,
        toolchain,
    } = ctx;
    let bounces = bounces.max(1);

    let world_model_path = host.world_model_path().ok_or(BakeError::NoMapLoaded)?;
    let bsp_path = resolve_world_path(host, &world_model_path);
    if !is_writable(&bsp_path) {
        log::error!("{} is not writable, can't build cubemaps", bsp_path.display());
        return Err(BakeError::NotWritable(bsp_path));
    }

    let mut tools = toolchain.acquire().map_err(|e| {
        log::error!("buildcubemaps: {}", e);
        e
    })?;

    let mut cvars = SavedCvars::capture(cvars, &BAKE_SAVED_CVARS);
    for (name, value) in BAKE_OVERRIDES {
        cvars.set(name, value);
    }

    let mut report = BakeReport::default();
    for bounce in 0..bounces {
        cvars.set(MAT_FASTSPECULAR, if bounce == 0 { "0" } else { "1" });
        host.rebuild_material_system_config(&cvars);

        bake_bounce(&mut cvars, host, renderer, &mut tools, &world_model_path, bounce, bounces, &mut report)?;
        report.bounces_completed += 1;
    }

    drop(cvars);
    host.reload_materials();
    log::info!(
        "buildcubemaps: {} bounce(s), {} sample(s) baked, {} skipped",
        report.bounces_completed,
        report.samples_baked,
        report.samples_skipped
    );
    Ok(report)
}

fn resolve_world_path(host: &dyn EngineHost, world_model_path: &str) -> PathBuf {
    if let Some(level) = host.level() {
        if !level.path.as_os_str().is_empty() {
            return level.path.clone();
        }
    }
    host.fs()
        .find_file(world_model_path)
        .unwrap_or_else(|| host.fs().full_path(world_model_path))
}

#[allow(clippy::too_many_arguments)]
fn bake_bounce(
    cvars: &mut SavedCvars<'_>,
    host: &mut dyn EngineHost,
    renderer: &mut dyn ViewRenderer,
    tools: &mut Toolchain,
    world_model_path: &str,
    bounce: usize,
    bounces: usize,
    report: &mut BakeReport,
) -> Result<(), BakeError> {
    let map_name = map_name_from_world_path(world_model_path);
    cvars.set(R_DRAWPROPS, "0");
    cvars.set(R_DRAWLIGHTSPRITES, "1");

    let level = host.level().ok_or(BakeError::NoMapLoaded)?;
    let samples = level.cubemap_samples.clone();
    let sky_name = level.sky_name.clone();
    let bsp_path = resolve_world_path(host, world_model_path);

    let default_size = default_face_size(cvars);
    check_sample_buffers(&samples, default_size, renderer.screen_size()).map_err(|e| {
        log::error!("buildcubemaps: {}", e);
        e
    })?;

    let hdr = hdr_enabled(cvars);
    let mut baked = Vec::with_capacity(samples.len());
    for (i, sample) in samples.iter().enumerate() {
        let line = format!("bounce: {}/{} sample: {}/{}", bounce + 1, bounces, i + 1, samples.len());
        log::info!("{}", line);
        report.progress.push(line);

        let source = host.fs().full_path(&sample_source_name(&map_name, sample.origin, hdr));
        let face_size = sample.face_size(default_size);
        match bake_cubemap_at(renderer, tools.compiler.as_ref(), sample.origin_vec3(), face_size, hdr, &source) {
            Ok(_) => {
                report.samples_baked += 1;
                baked.push((sample_pak_name(&map_name, sample.origin, hdr), with_extension(&source, "vtf")));
            }
            Err(e) => {
                log::warn!("cubemap {}: {}", sample_texture_name(sample.origin, hdr), e);
                report.samples_skipped += 1;
            }
        }
    }

    pack_bounce(tools, host, &bsp_path, &map_name, &sky_name, &baked, report)?;
    host.restart_level()
}

fn pack_bounce(
    tools: &mut Toolchain,
    host: &dyn EngineHost,
    bsp_path: &Path,
    map_name: &str,
    sky_name: &str,
    baked: &[(String, PathBuf)],
    report: &mut BakeReport,
) -> Result<(), BakeError> {
    let packer = tools.packer.as_mut();
    packer.load_bsp_file(bsp_path)?;
    for (pak_name, path) in baked {
        match packer.add_file_to_pack(pak_name, path) {
            Ok(()) => report.packed.push(pak_name.clone()),
            Err(e) => log::warn!("can't pack {}: {}", pak_name, e),
        }
    }

    match build_default_cubemap(host.fs(), sky_name) {
        Ok(Some(data)) => {
            let pak_name = default_cubemap_pak_name(map_name);
            packer.add_buffer_to_pack(&pak_name, &data)?;
            report.packed.push(pak_name);
            report.default_cubemap_packed = true;
        }
        Ok(None) => {}
        Err(e) => log::warn!("default cubemap: {}", e),
    }

    packer.write_bsp_file(bsp_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{temp_dir, test_level, write_skybox, FakeHost, FakeRenderer, FakeToolchain};
    use cubebake_vtf::CompiledVtfFlags;

    struct Fixture {
        dir: PathBuf,
        cvars: CvarContext,
        host: FakeHost,
        renderer: FakeRenderer,
        tools: FakeToolchain,
    }

    impl Fixture {
        fn new(name: &str, samples: Vec<CubemapSample>) -> Self {
            let dir = temp_dir(name);
            let mut host = FakeHost::new(&dir, test_level(&dir, samples));
            std::fs::create_dir_all(dir.join("maps")).unwrap();
            std::fs::write(dir.join("maps/test.bsp"), b"VBSP").unwrap();
            write_skybox(&host.fs, "sky_test", [(32, 32); 6], CompiledVtfFlags::empty());
            host.origin = [0.0, 0.0, 64.0];
            let mut cvars = CvarContext::new();
            crate::config::register_cvars(&mut cvars);
            Self {
                dir,
                cvars,
                host,
                renderer: FakeRenderer::new(1024, 1024, [90, 90, 90]),
                tools: FakeToolchain::default(),
            }
        }

        fn bake(&mut self, bounces: usize) -> Result<BakeReport, BakeError> {
            bake_cubemaps(
                BakeContext {
                    cvars: &mut self.cvars,
                    host: &mut self.host,
                    renderer: &mut self.renderer,
                    toolchain: &self.tools,
                },
                bounces,
            )
        }

        fn saved(&self) -> Vec<String> {
            BAKE_SAVED_CVARS
                .iter()
                .map(|name| self.cvars.variable_string(name).to_string())
                .collect()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn sample(origin: [i32; 3], size: u8) -> CubemapSample {
        CubemapSample { origin, size }
    }

    #[test]
    fn test_map_name() {
        assert_eq!(map_name_from_world_path("maps/test.bsp"), "test");
        assert_eq!(map_name_from_world_path("maps\\de_dust.bsp"), "de_dust");
        assert_eq!(map_name_from_world_path("custom/levels/foo.bsp"), "foo");
        assert_eq!(sample_source_name("test", [1, -2, 3], true), "materialsrc/maps/test/c1_-2_3_hdr");
        assert_eq!(sample_pak_name("test", [0, 0, 0], false), "materials/maps/test/c0_0_0.vtf");
    }

    #[test]
    fn test_buffer_size_check() {
        let screen = (1024, 1024);
        assert!(check_sample_buffers(&[sample([0; 3], 0)], 32, screen).is_ok());
        assert!(check_sample_buffers(&[sample([0; 3], 9)], 32, screen).is_ok());
        match check_sample_buffers(&[sample([0; 3], 0), sample([0; 3], 10)], 32, screen) {
            Err(BakeError::BufferTooSmall { face_size, required, .. }) => {
                assert_eq!((face_size, required), (512, 2048));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_sample_buffers(&[sample([0; 3], 9)], 32, (1024, 768)).is_err());
    }

    #[test]
    fn test_oversized_sample_sizes_rejected() {
        let screen = (1024, 1024);
        for size in [63u8, 66, 255] {
            match check_sample_buffers(&[sample([0; 3], size)], 32, screen) {
                Err(BakeError::BufferTooSmall { required, .. }) => assert!(required > 1024),
                other => panic!("size {}: unexpected {:?}", size, other),
            }
        }
    }

    #[test]
    fn test_zero_samples() {
        let mut fx = Fixture::new("bake_zero", Vec::new());
        let before = fx.saved();
        let report = fx.bake(1).unwrap();
        assert_eq!(report.bounces_completed, 1);
        assert_eq!((report.samples_baked, report.samples_skipped), (0, 0));
        assert!(report.progress.is_empty());
        assert!(report.default_cubemap_packed);
        assert_eq!(fx.tools.log.borrow().added, vec!["materials/maps/test/cubemapdefault.vtf".to_string()]);
        assert_eq!(fx.tools.log.borrow().writes, 1);
        assert_eq!(fx.saved(), before);
        assert_eq!(fx.host.restarts, 1);
        assert_eq!(fx.host.material_reloads, 1);
    }

    #[test]
    fn test_one_ldr_sample() {
        let mut fx = Fixture::new("bake_ldr", vec![sample([0, 0, 0], 0)]);
        let report = fx.bake(1).unwrap();
        assert_eq!(report.samples_baked, 1);
        assert_eq!(
            report.packed,
            vec![
                "materials/maps/test/c0_0_0.vtf".to_string(),
                "materials/maps/test/cubemapdefault.vtf".to_string()
            ]
        );
        let src = fx.dir.join("materialsrc/maps/test");
        for suffix in cubebake_bitmap::FACE_SUFFIXES {
            assert!(!src.join(format!("c0_0_0{}.tga", suffix)).exists());
        }
        assert!(!src.join("c0_0_0.txt").exists());
        assert!(src.join("c0_0_0.vtf").exists());
        // six faces at 4x supersampling
        assert_eq!(fx.renderer.views.len(), 6);
        assert!(fx.renderer.views.iter().all(|v| v.width == 128));
    }

    #[test]
    fn test_hdr_sample() {
        let mut fx = Fixture::new("bake_hdr", vec![sample([8, 16, 24], 3)]);
        fx.cvars.set("mat_hdr_level", "2");
        fx.renderer.color = [10, 10, 10];
        let report = fx.bake(1).unwrap();
        assert_eq!(report.samples_baked, 1);
        assert_eq!(report.packed[0], "materials/maps/test/c8_16_24_hdr.vtf");
        // dark faces need one exposure each
        assert_eq!(fx.renderer.exposures, vec![16.0; 6]);
        assert!(fx.dir.join("materialsrc/maps/test/c8_16_24_hdr.vtf").exists());
    }

    #[test]
    fn test_buffer_too_small_aborts() {
        let mut fx = Fixture::new("bake_too_small", vec![sample([0; 3], 0), sample([64, 0, 0], 10)]);
        let before = fx.saved();
        assert!(matches!(fx.bake(1), Err(BakeError::BufferTooSmall { .. })));
        assert!(fx.renderer.views.is_empty());
        assert_eq!(fx.tools.log.borrow().writes, 0);
        assert_eq!(fx.saved(), before);
        assert_eq!(fx.host.restarts, 0);
    }

    #[test]
    fn test_three_bounces() {
        let mut fx = Fixture::new("bake_bounces", vec![sample([0; 3], 1), sample([32, 0, 0], 1)]);
        let report = fx.bake(3).unwrap();
        assert_eq!(report.bounces_completed, 3);
        assert_eq!(fx.host.fast_specular, vec!["0", "1", "1"]);
        assert_eq!(fx.host.restarts, 3);
        assert_eq!(report.progress.len(), 6);
        assert_eq!(report.progress[0], "bounce: 1/3 sample: 1/2");
        assert_eq!(report.progress[5], "bounce: 3/3 sample: 2/2");
        assert_eq!(fx.tools.log.borrow().writes, 3);
        assert_eq!(fx.cvars.variable_string(MAT_FASTSPECULAR), "1");
        assert_eq!(fx.cvars.variable_string("building_cubemaps"), "0");
    }

    #[test]
    fn test_missing_skybox() {
        let mut fx = Fixture::new("bake_no_sky", vec![sample([0; 3], 1)]);
        fx.host.level.as_mut().unwrap().sky_name = "sky_missing".into();
        let report = fx.bake(1).unwrap();
        assert!(!report.default_cubemap_packed);
        assert_eq!(report.samples_baked, 1);
        assert_eq!(report.packed, vec!["materials/maps/test/c0_0_0.vtf".to_string()]);
    }

    #[test]
    fn test_compile_failure_is_per_sample() {
        let mut fx = Fixture::new("bake_compile_fail", vec![sample([0; 3], 1), sample([16, 0, 0], 1)]);
        fx.tools.failing_compiler = true;
        let before = fx.saved();
        let report = fx.bake(1).unwrap();
        assert_eq!((report.samples_baked, report.samples_skipped), (0, 2));
        assert!(report.default_cubemap_packed);
        assert_eq!(fx.saved(), before);
    }

    #[test]
    fn test_preconditions() {
        let mut fx = Fixture::new("bake_readonly", vec![sample([0; 3], 1)]);
        std::fs::remove_file(fx.dir.join("maps/test.bsp")).unwrap();
        assert!(matches!(fx.bake(1), Err(BakeError::NotWritable(_))));

        let mut fx = Fixture::new("bake_no_tools", vec![sample([0; 3], 1)]);
        fx.tools.fail_acquire = true;
        let before = fx.saved();
        assert!(matches!(fx.bake(1), Err(BakeError::ToolLoad(_))));
        assert_eq!(fx.saved(), before);

        let mut fx = Fixture::new("bake_no_map", Vec::new());
        fx.host.level = None;
        assert!(matches!(fx.bake(1), Err(BakeError::NoMapLoaded)));
    }

    #[test]
    fn test_cvars_restored_with_custom_values() {
        let mut fx = Fixture::new("bake_restore", vec![sample([0; 3], 1)]);
        fx.cvars.set("r_shadows", "0");
        fx.cvars.set("r_lightstyle", "3");
        fx.cvars.set("mat_fastspecular", "0");
        let before = fx.saved();
        fx.bake(2).unwrap();
        assert_eq!(fx.saved(), before);
        assert_eq!(fx.cvars.variable_string("r_drawprops"), "1");
    }
}
