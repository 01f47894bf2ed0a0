// compiler.rs — cube texture compiler: intermediate faces -> .vtf

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use cubebake_bitmap::float_cube::face_path;
use cubebake_bitmap::{tga, FloatBitMap, FACE_SUFFIXES};
use cubebake_common::cmd::CmdArgs;

use crate::format::{CompiledVtfFlags, ImageFormat};
use crate::vtf::{TexelBuffer, VtfTexture};
use crate::VtfError;

/// Turns the intermediates at `<base>` (six faces plus `<base>.txt`) into
/// `<base>.vtf`.
pub trait TextureCompiler {
    fn compile_cubemap(&self, base: &Path) -> Result<(), VtfError>;
}

/// `<base>.<ext>` for an extensionless base path.
pub fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    name.into()
}

/// Parse `"key" "value"` lines. Keys are lower-cased.
pub fn parse_material_keys(text: &str) -> HashMap<String, String> {
    let mut keys = HashMap::new();
    for line in text.lines() {
        let args = CmdArgs::tokenize(line);
        if args.argc() >= 2 {
            keys.insert(args.argv(0).to_ascii_lowercase(), args.argv(1).to_string());
        }
    }
    keys
}

fn key_enabled(keys: &HashMap<String, String>, key: &str) -> bool {
    keys.get(key)
        .and_then(|v| v.trim().parse::<i32>().ok())
        .is_some_and(|v| v != 0)
}

/// Built-in compiler. LDR faces (TGA) become DXT5 with box-filtered mips;
/// HDR faces (`"pfm" "1"`) become RGBA16161616F with Gaussian mips.
#[derive(Debug, Default, Clone, Copy)]
pub struct VtexCompiler;

impl VtexCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Build the texture without writing it.
    pub fn build_cubemap(&self, base: &Path) -> Result<VtfTexture, VtfError> {
        let keys_path = with_extension(base, "txt");
        let keys = match fs::read_to_string(&keys_path) {
            Ok(text) => parse_material_keys(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        let hdr = key_enabled(&keys, "pfm");
        let strip_alpha = key_enabled(&keys, "stripalphachannel");

        let mut faces = Vec::with_capacity(FACE_SUFFIXES.len());
        let mut edge = 0;
        for suffix in FACE_SUFFIXES {
            let (buffer, w, h) = if hdr {
                let bm = FloatBitMap::read_pfm(&face_path(base, suffix, "pfm"))?;
                let (w, h) = (bm.width(), bm.height());
                (TexelBuffer::RgbaF32(bm.data().to_vec()), w, h)
            } else {
                let (rgba, w, h) = tga::read_tga(&face_path(base, suffix, "tga"))?;
                (TexelBuffer::Rgba8(rgba), w, h)
            };
            if w != h || (edge != 0 && w != edge) {
                return Err(VtfError::Compile(format!(
                    "face {}{} is {}x{}, expected square faces of one size",
                    base.display(),
                    suffix,
                    w,
                    h
                )));
            }
            edge = w;
            faces.push(buffer);
        }

        let mut flags = CompiledVtfFlags::ENVMAP;
        if key_enabled(&keys, "nomip") {
            flags |= CompiledVtfFlags::NOMIP;
        }
        let format = if hdr {
            ImageFormat::Rgba16161616F
        } else if key_enabled(&keys, "nocompress") {
            ImageFormat::Rgba8888
        } else {
            ImageFormat::Dxt5
        };
        if !strip_alpha && !hdr {
            flags |= CompiledVtfFlags::EIGHTBITALPHA;
        }

        let mut tex = VtfTexture::init(edge, edge, format, flags, 1)?;
        for (face, mut buffer) in faces.into_iter().enumerate() {
            if strip_alpha {
                buffer.fill_alpha(1.0);
            }
            *tex.image_mut(0, 0, face) = buffer;
        }
        tex.generate_mipmaps();
        tex.compute_reflectivity();
        Ok(tex)
    }
}

impl TextureCompiler for VtexCompiler {
    fn compile_cubemap(&self, base: &Path) -> Result<(), VtfError> {
        let tex = self.build_cubemap(base)?;
        let out = with_extension(base, "vtf");
        fs::write(&out, tex.serialize())?;
        log::debug!("compiled {} ({}, {}x{})", out.display(), tex.format(), tex.width(), tex.height());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cubebake_vtex_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("c0_0_0")
    }

    #[test]
    fn test_parse_material_keys() {
        let keys = parse_material_keys("\"pfm\" \"1\"\n\"StripAlphaChannel\" \"1\"\n");
        assert_eq!(keys.get("pfm").map(String::as_str), Some("1"));
        assert!(key_enabled(&keys, "stripalphachannel"));
        assert!(!key_enabled(&keys, "nomip"));
    }

    #[test]
    fn test_compile_ldr_faces() {
        let base = temp_base("ldr");
        for (i, suffix) in FACE_SUFFIXES.iter().enumerate() {
            let rgba: Vec<u8> = [i as u8 * 40, 10, 20, 7].repeat(8 * 8);
            tga::write_tga_rgba8(&face_path(&base, suffix, "tga"), 8, 8, &rgba).unwrap();
        }
        fs::write(with_extension(&base, "txt"), "\"stripalphachannel\" \"1\"\n").unwrap();

        VtexCompiler::new().compile_cubemap(&base).unwrap();
        let tex = VtfTexture::unserialize(&fs::read(with_extension(&base, "vtf")).unwrap()).unwrap();
        assert_eq!(tex.format(), ImageFormat::Dxt5);
        assert!(tex.is_cube_map());
        assert_eq!((tex.width(), tex.mip_count(), tex.face_count()), (8, 4, 7));
        // alpha stripped to opaque
        assert!(tex.image(0, 0, 2).as_rgba8().unwrap().chunks(4).all(|t| t[3] == 255));

        let _ = fs::remove_dir_all(base.parent().unwrap());
    }

    #[test]
    fn test_compile_hdr_faces() {
        let base = temp_base("hdr");
        for suffix in FACE_SUFFIXES {
            FloatBitMap::filled(4, 4, [3.0, 0.5, 0.25, 1.0])
                .write_pfm(&face_path(&base, suffix, "pfm"))
                .unwrap();
        }
        fs::write(with_extension(&base, "txt"), "\"pfm\" \"1\"\n\"stripalphachannel\" \"1\"\n").unwrap();

        let tex = VtexCompiler::new().build_cubemap(&base).unwrap();
        assert_eq!(tex.format(), ImageFormat::Rgba16161616F);
        assert_eq!(tex.image(0, 0, 0).texel_f32(5), [3.0, 0.5, 0.25, 1.0]);
        let r = tex.reflectivity();
        assert!((r[0] - 3.0).abs() < 1e-5);

        let _ = fs::remove_dir_all(base.parent().unwrap());
    }

    #[test]
    fn test_missing_face_fails() {
        let base = temp_base("missing");
        fs::write(with_extension(&base, "txt"), "\"stripalphachannel\" \"1\"\n").unwrap();
        assert!(VtexCompiler::new().compile_cubemap(&base).is_err());
        let _ = fs::remove_dir_all(base.parent().unwrap());
    }
}
