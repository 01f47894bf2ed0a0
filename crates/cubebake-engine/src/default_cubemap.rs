// default_cubemap.rs — the black fallback cube packed with every map

use cubebake_bitmap::FACE_SUFFIXES;
use cubebake_common::files::FsContext;
use cubebake_vtf::{
    fix_cubemap_face_orientation, generate_spheremap, CompiledVtfFlags, ImageFormat, VtfHeaderInfo, VtfTexture,
};

use crate::BakeError;

pub const DEFAULT_CUBEMAP_SIZE: usize = 32;
/// Old skyboxes ship 4x4 placeholder faces.
const LEGACY_MINI_FACE: usize = 4;

pub fn skybox_face_name(sky_name: &str, suffix: &str) -> String {
    format!("materials/skybox/{}{}.vtf", sky_name, suffix)
}

pub fn default_cubemap_pak_name(map_name: &str) -> String {
    format!("materials/maps/{}/cubemapdefault.vtf", map_name)
}

/// Why a skybox can't seed the default cubemap.
fn validate_skybox(headers: &[VtfHeaderInfo]) -> Result<(), String> {
    let first = &headers[0];
    for (header, suffix) in headers.iter().zip(FACE_SUFFIXES).skip(1) {
        if header.flags != first.flags {
            return Err(format!("face {} flags {:?} differ from {:?}", suffix, header.flags, first.flags));
        }
        let width_ok = header.width == first.width || header.width == LEGACY_MINI_FACE;
        let height_ok = header.height == first.height
            || header.height == first.height * 2
            || header.height == LEGACY_MINI_FACE;
        if !width_ok || !height_ok {
            return Err(format!(
                "face {} is {}x{}, face {} is {}x{}",
                suffix, header.width, header.height, FACE_SUFFIXES[0], first.width, first.height
            ));
        }
    }
    Ok(())
}

/// Build `cubemapdefault.vtf` from the skybox's layout. `Ok(None)` means
/// the skybox was missing or inconsistent and has been reported.
pub fn build_default_cubemap(fs: &FsContext, sky_name: &str) -> Result<Option<Vec<u8>>, BakeError> {
    let mut headers = Vec::with_capacity(FACE_SUFFIXES.len());
    for suffix in FACE_SUFFIXES {
        let name = skybox_face_name(sky_name, suffix);
        let Some(data) = fs.load_file(&name) else {
            log::warn!("default cubemap: can't load {}", name);
            return Ok(None);
        };
        match VtfTexture::read_header(&data) {
            Ok(header) => headers.push(header),
            Err(e) => {
                log::warn!("default cubemap: {}: {}", name, e);
                return Ok(None);
            }
        }
    }
    if let Err(reason) = validate_skybox(&headers) {
        log::warn!("default cubemap: skybox {} is inconsistent: {}", sky_name, reason);
        return Ok(None);
    }

    let first = &headers[0];
    let Some(format) = first.format() else {
        log::warn!("default cubemap: skybox {} has unknown format {}", sky_name, first.image_format);
        return Ok(None);
    };
    let alpha_flags = CompiledVtfFlags::ONEBITALPHA | CompiledVtfFlags::EIGHTBITALPHA;
    let has_alpha = headers.iter().any(|h| h.flags.intersects(alpha_flags));

    let mut flags = first.flags | CompiledVtfFlags::ENVMAP;
    if !has_alpha {
        flags.remove(alpha_flags);
    }
    let mut tex = VtfTexture::init(
        DEFAULT_CUBEMAP_SIZE,
        DEFAULT_CUBEMAP_SIZE,
        format,
        flags,
        first.num_frames.max(1),
    )?;
    // Black, not a sky sample: shaders re-gamma the lookup. Alpha is 0 too.
    for image in tex.images_mut() {
        image.fill_zero();
    }
    fix_cubemap_face_orientation(&mut tex);
    generate_spheremap(&mut tex);
    tex.convert_image_format(ImageFormat::Dxt5);
    Ok(Some(tex.serialize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{temp_dir, write_skybox};

    #[test]
    fn test_default_cubemap() {
        let dir = temp_dir("default_cubemap");
        let fs = FsContext::new(&dir);
        write_skybox(&fs, "sky_day", [(64, 64); 6], CompiledVtfFlags::CLAMPS);
        let data = build_default_cubemap(&fs, "sky_day").unwrap().unwrap();
        let tex = VtfTexture::unserialize(&data).unwrap();
        assert_eq!((tex.width(), tex.height()), (32, 32));
        assert_eq!(tex.format(), ImageFormat::Dxt5);
        assert!(tex.flags().contains(CompiledVtfFlags::ENVMAP | CompiledVtfFlags::CLAMPS));
        assert_eq!(tex.face_count(), 7);
        for face in 0..7 {
            assert!(tex.image(0, 0, face).to_rgba8().iter().all(|&b| b == 0));
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_legacy_faces_accepted() {
        let dir = temp_dir("default_cubemap_legacy");
        let fs = FsContext::new(&dir);
        // tall side faces and a 4x4 bottom
        write_skybox(
            &fs,
            "sky_old",
            [(128, 128), (128, 256), (128, 128), (128, 128), (128, 128), (4, 4)],
            CompiledVtfFlags::empty(),
        );
        assert!(build_default_cubemap(&fs, "sky_old").unwrap().is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_skybox_is_skipped() {
        let dir = temp_dir("default_cubemap_bad");
        let fs = FsContext::new(&dir);
        assert!(build_default_cubemap(&fs, "sky_missing").unwrap().is_none());

        write_skybox(&fs, "sky_odd", [(64, 64), (64, 64), (32, 64), (64, 64), (64, 64), (64, 64)], CompiledVtfFlags::empty());
        assert!(build_default_cubemap(&fs, "sky_odd").unwrap().is_none());

        fs.write_file(&skybox_face_name("sky_junk", "rt"), b"not a texture").unwrap();
        assert!(build_default_cubemap(&fs, "sky_junk").unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_mismatched_flags_rejected() {
        let headers: Vec<VtfHeaderInfo> = (0..6)
            .map(|i| {
                let flags = if i == 3 { CompiledVtfFlags::CLAMPS } else { CompiledVtfFlags::empty() };
                let tex = VtfTexture::init(16, 16, ImageFormat::Rgba8888, flags, 1).unwrap();
                VtfTexture::read_header(&tex.serialize()).unwrap()
            })
            .collect();
        assert!(validate_skybox(&headers).unwrap_err().contains("ft"));
    }
}
