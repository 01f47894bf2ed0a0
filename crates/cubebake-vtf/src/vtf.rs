// vtf.rs — VTF 7.2 texture container

use cubebake_bitmap::resample::{mip_map_rgba8, mipmap_level_count};
use cubebake_bitmap::{FloatBitMap, FloatImagePyramid};
use cubebake_common::qfiles::{
    read_record, VtfHeader, VTF_HEADER_SIZE, VTF_MAJOR_VERSION, VTF_MINOR_VERSION, VTF_SIGNATURE,
};

use half::f16;

use crate::dxt;
use crate::format::{CompiledVtfFlags, ImageFormat};
use crate::VtfError;

/// Six cube faces plus the spheremap.
pub const CUBEMAP_FACE_COUNT: usize = 7;

/// Decoded texels of one image. Float formats decode to RGBA f32, all
/// others to RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub enum TexelBuffer {
    Rgba8(Vec<u8>),
    RgbaF32(Vec<f32>),
}

impl TexelBuffer {
    fn zeroed(float: bool, texels: usize) -> Self {
        if float {
            TexelBuffer::RgbaF32(vec![0.0; texels * 4])
        } else {
            TexelBuffer::Rgba8(vec![0; texels * 4])
        }
    }

    pub fn texel_count(&self) -> usize {
        match self {
            TexelBuffer::Rgba8(v) => v.len() / 4,
            TexelBuffer::RgbaF32(v) => v.len() / 4,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TexelBuffer::RgbaF32(_))
    }

    pub fn as_rgba8(&self) -> Option<&[u8]> {
        match self {
            TexelBuffer::Rgba8(v) => Some(v),
            TexelBuffer::RgbaF32(_) => None,
        }
    }

    pub fn as_rgba_f32(&self) -> Option<&[f32]> {
        match self {
            TexelBuffer::RgbaF32(v) => Some(v),
            TexelBuffer::Rgba8(_) => None,
        }
    }

    /// RGBA8 copy; floats are clamped to [0, 1].
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self {
            TexelBuffer::Rgba8(v) => v.clone(),
            TexelBuffer::RgbaF32(v) => v.iter().map(|&f| (f.clamp(0.0, 1.0) * 255.0 + 0.5) as u8).collect(),
        }
    }

    pub fn to_rgba_f32(&self) -> Vec<f32> {
        match self {
            TexelBuffer::RgbaF32(v) => v.clone(),
            TexelBuffer::Rgba8(v) => v.iter().map(|&b| b as f32 * (1.0 / 255.0)).collect(),
        }
    }

    /// Texel `i` as linear-ish floats (8-bit values scaled to [0, 1]).
    pub fn texel_f32(&self, i: usize) -> [f32; 4] {
        match self {
            TexelBuffer::Rgba8(v) => {
                let t = &v[i * 4..i * 4 + 4];
                [t[0] as f32 / 255.0, t[1] as f32 / 255.0, t[2] as f32 / 255.0, t[3] as f32 / 255.0]
            }
            TexelBuffer::RgbaF32(v) => [v[i * 4], v[i * 4 + 1], v[i * 4 + 2], v[i * 4 + 3]],
        }
    }

    pub fn set_texel_f32(&mut self, i: usize, value: [f32; 4]) {
        match self {
            TexelBuffer::Rgba8(v) => {
                for c in 0..4 {
                    v[i * 4 + c] = (value[c].clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
                }
            }
            TexelBuffer::RgbaF32(v) => v[i * 4..i * 4 + 4].copy_from_slice(&value),
        }
    }

    pub fn fill_zero(&mut self) {
        match self {
            TexelBuffer::Rgba8(v) => v.fill(0),
            TexelBuffer::RgbaF32(v) => v.fill(0.0),
        }
    }

    pub fn fill_alpha(&mut self, alpha: f32) {
        match self {
            TexelBuffer::Rgba8(v) => {
                let a = (alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
                v.chunks_exact_mut(4).for_each(|t| t[3] = a);
            }
            TexelBuffer::RgbaF32(v) => v.chunks_exact_mut(4).for_each(|t| t[3] = alpha),
        }
    }
}

/// Header fields of a VTF file, parsed without touching image data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VtfHeaderInfo {
    pub version: [u32; 2],
    pub width: usize,
    pub height: usize,
    pub flags: CompiledVtfFlags,
    pub num_frames: usize,
    pub start_frame: usize,
    pub reflectivity: [f32; 3],
    pub bumpmap_scale: f32,
    pub image_format: i32,
    pub num_mip_levels: usize,
    pub low_res_image_format: i32,
    pub low_res_image_width: usize,
    pub low_res_image_height: usize,
    pub depth: usize,
    pub header_size: usize,
}

impl VtfHeaderInfo {
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_i32(self.image_format)
    }

    pub fn is_cube_map(&self) -> bool {
        self.flags.contains(CompiledVtfFlags::ENVMAP)
    }

    /// Faces stored per frame. 7.0 cube maps carry no spheremap.
    pub fn face_count(&self) -> usize {
        match (self.is_cube_map(), self.version[1]) {
            (false, _) => 1,
            (true, 0) => 6,
            (true, _) => CUBEMAP_FACE_COUNT,
        }
    }
}

/// Decoded VTF texture. Images are kept per (mip, frame, face); mip 0 is
/// the full-size level.
#[derive(Debug, Clone, PartialEq)]
pub struct VtfTexture {
    width: usize,
    height: usize,
    format: ImageFormat,
    flags: CompiledVtfFlags,
    num_frames: usize,
    start_frame: usize,
    face_count: usize,
    mip_count: usize,
    reflectivity: [f32; 3],
    bumpmap_scale: f32,
    images: Vec<TexelBuffer>,
}

impl VtfTexture {
    /// Allocate a zeroed texture. A full mip chain is allocated unless
    /// `NOMIP` is set; `ENVMAP` allocates seven faces per frame.
    pub fn init(
        width: usize,
        height: usize,
        format: ImageFormat,
        flags: CompiledVtfFlags,
        num_frames: usize,
    ) -> Result<Self, VtfError> {
        if width == 0 || height == 0 || width > u16::MAX as usize || height > u16::MAX as usize {
            return Err(VtfError::InvalidDimensions(width, height));
        }
        if num_frames == 0 {
            return Err(VtfError::InvalidDimensions(width, height));
        }
        let face_count = if flags.contains(CompiledVtfFlags::ENVMAP) {
            CUBEMAP_FACE_COUNT
        } else {
            1
        };
        let mip_count = if flags.contains(CompiledVtfFlags::NOMIP) {
            1
        } else {
            mipmap_level_count(width, height)
        };

        let mut tex = Self {
            width,
            height,
            format,
            flags,
            num_frames,
            start_frame: 0,
            face_count,
            mip_count,
            reflectivity: [0.0; 3],
            bumpmap_scale: 1.0,
            images: Vec::with_capacity(mip_count * num_frames * face_count),
        };
        for mip in 0..mip_count {
            let (w, h) = tex.mip_size(mip);
            for _ in 0..num_frames * face_count {
                tex.images.push(TexelBuffer::zeroed(format.is_float(), w * h));
            }
        }
        Ok(tex)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn flags(&self) -> CompiledVtfFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: CompiledVtfFlags) {
        self.flags = flags;
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn mip_count(&self) -> usize {
        self.mip_count
    }

    pub fn is_cube_map(&self) -> bool {
        self.flags.contains(CompiledVtfFlags::ENVMAP)
    }

    pub fn reflectivity(&self) -> [f32; 3] {
        self.reflectivity
    }

    pub fn set_reflectivity(&mut self, reflectivity: [f32; 3]) {
        self.reflectivity = reflectivity;
    }

    pub fn mip_size(&self, mip: usize) -> (usize, usize) {
        ((self.width >> mip).max(1), (self.height >> mip).max(1))
    }

    fn image_index(&self, mip: usize, frame: usize, face: usize) -> usize {
        assert!(mip < self.mip_count && frame < self.num_frames && face < self.face_count);
        (mip * self.num_frames + frame) * self.face_count + face
    }

    pub fn image(&self, mip: usize, frame: usize, face: usize) -> &TexelBuffer {
        &self.images[self.image_index(mip, frame, face)]
    }

    pub fn image_mut(&mut self, mip: usize, frame: usize, face: usize) -> &mut TexelBuffer {
        let i = self.image_index(mip, frame, face);
        &mut self.images[i]
    }

    pub fn images_mut(&mut self) -> impl Iterator<Item = &mut TexelBuffer> {
        self.images.iter_mut()
    }

    /// Change the storage format. Texel data is converted when the format
    /// crosses between 8-bit and float storage.
    pub fn convert_image_format(&mut self, format: ImageFormat) {
        if format.is_float() != self.format.is_float() {
            for image in &mut self.images {
                *image = if format.is_float() {
                    TexelBuffer::RgbaF32(image.to_rgba_f32())
                } else {
                    TexelBuffer::Rgba8(image.to_rgba8())
                };
            }
        }
        if !format.has_alpha() {
            for image in &mut self.images {
                image.fill_alpha(1.0);
            }
        }
        self.format = format;
    }

    /// Rebuild every mip below level 0. 8-bit images use a 2x2 box;
    /// float images take the Gaussian pyramid of level 0, with a box
    /// filter for the tail of non-square chains.
    pub fn generate_mipmaps(&mut self) {
        for frame in 0..self.num_frames {
            for face in 0..self.face_count {
                if self.image(0, frame, face).is_float() {
                    self.generate_float_mipmaps(frame, face);
                    continue;
                }
                for mip in 1..self.mip_count {
                    let (pw, ph) = self.mip_size(mip - 1);
                    let (out, _, _) = mip_map_rgba8(&self.image(mip - 1, frame, face).to_rgba8(), pw, ph);
                    *self.image_mut(mip, frame, face) = TexelBuffer::Rgba8(out);
                }
            }
        }
    }

    fn generate_float_mipmaps(&mut self, frame: usize, face: usize) {
        let (w, h) = self.mip_size(0);
        let mut top = FloatBitMap::new(w, h);
        top.data_mut().copy_from_slice(&self.image(0, frame, face).to_rgba_f32());
        let mut levels = FloatImagePyramid::build(top).into_levels().into_iter().skip(1);

        for mip in 1..self.mip_count {
            let next = match levels.next() {
                Some(level) => level.data().to_vec(),
                None => {
                    let (pw, ph) = self.mip_size(mip - 1);
                    let (w, h) = self.mip_size(mip);
                    box_reduce_f32(&self.image(mip - 1, frame, face).to_rgba_f32(), pw, ph, w, h)
                }
            };
            *self.image_mut(mip, frame, face) = TexelBuffer::RgbaF32(next);
        }
    }

    /// Average linear colour of the top mip over all frames and cube faces.
    pub fn compute_reflectivity(&mut self) {
        let faces = self.face_count.min(6);
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;
        for frame in 0..self.num_frames {
            for face in 0..faces {
                let image = self.image(0, frame, face);
                for i in 0..image.texel_count() {
                    let t = image.texel_f32(i);
                    for c in 0..3 {
                        let v = if image.is_float() { t[c] } else { t[c].powf(2.2) };
                        sum[c] += v as f64;
                    }
                }
                count += image.texel_count();
            }
        }
        if count > 0 {
            self.reflectivity = sum.map(|s| (s / count as f64) as f32);
        }
    }

    /// Parse only the header.
    pub fn read_header(data: &[u8]) -> Result<VtfHeaderInfo, VtfError> {
        if data.len() < 16 {
            return Err(VtfError::Truncated { expected: 16, actual: data.len() });
        }
        if data[0..4] != VTF_SIGNATURE {
            return Err(VtfError::BadSignature);
        }
        let major = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let minor = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        if major != VTF_MAJOR_VERSION || minor > VTF_MINOR_VERSION {
            return Err(VtfError::UnsupportedVersion(major, minor));
        }
        let header_size = u32::from_le_bytes([data[12], data[13], data[14], data[15]]) as usize;
        if data.len() < header_size || header_size < 64 {
            return Err(VtfError::Truncated { expected: header_size.max(64), actual: data.len() });
        }

        // 7.0 and 7.1 headers stop before the depth field
        let mut raw = [0u8; VTF_HEADER_SIZE];
        let n = header_size.min(VTF_HEADER_SIZE);
        raw[..n].copy_from_slice(&data[..n]);
        let hdr: VtfHeader = read_record(&raw).ok_or(VtfError::Truncated {
            expected: VTF_HEADER_SIZE,
            actual: n,
        })?;

        let reflectivity = hdr.reflectivity;
        let depth_field = hdr.depth;
        let depth = if minor >= 2 { depth_field.max(1) as usize } else { 1 };
        Ok(VtfHeaderInfo {
            version: [major, minor],
            width: hdr.width as usize,
            height: hdr.height as usize,
            flags: CompiledVtfFlags::from_bits_retain(hdr.flags),
            num_frames: (hdr.num_frames as usize).max(1),
            start_frame: hdr.start_frame as usize,
            reflectivity,
            bumpmap_scale: hdr.bumpmap_scale,
            image_format: hdr.image_format,
            num_mip_levels: (hdr.num_mip_levels as usize).max(1),
            low_res_image_format: hdr.low_res_image_format,
            low_res_image_width: hdr.low_res_image_width as usize,
            low_res_image_height: hdr.low_res_image_height as usize,
            depth,
            header_size,
        })
    }

    pub fn unserialize(data: &[u8]) -> Result<Self, VtfError> {
        let info = Self::read_header(data)?;
        let format = info.format().ok_or(VtfError::UnsupportedFormat(info.image_format))?;
        if info.width == 0 || info.height == 0 {
            return Err(VtfError::InvalidDimensions(info.width, info.height));
        }
        if info.depth != 1 {
            return Err(VtfError::VolumeTexture(info.depth));
        }

        let mut offset = info.header_size;
        if info.low_res_image_format != -1 && info.low_res_image_width > 0 && info.low_res_image_height > 0 {
            let low = ImageFormat::from_i32(info.low_res_image_format)
                .ok_or(VtfError::UnsupportedFormat(info.low_res_image_format))?;
            offset += low.image_size(info.low_res_image_width, info.low_res_image_height);
        }

        let face_count = info.face_count();
        let mip_count = info.num_mip_levels.min(mipmap_level_count(info.width, info.height));
        let mut tex = Self {
            width: info.width,
            height: info.height,
            format,
            flags: info.flags,
            num_frames: info.num_frames,
            start_frame: info.start_frame,
            face_count,
            mip_count,
            reflectivity: info.reflectivity,
            bumpmap_scale: info.bumpmap_scale,
            images: vec![TexelBuffer::Rgba8(Vec::new()); mip_count * info.num_frames * face_count],
        };

        for mip in (0..mip_count).rev() {
            let (w, h) = tex.mip_size(mip);
            let size = format.image_size(w, h);
            for frame in 0..tex.num_frames {
                for face in 0..face_count {
                    let Some(bytes) = data.get(offset..offset + size) else {
                        return Err(VtfError::Truncated { expected: offset + size, actual: data.len() });
                    };
                    *tex.image_mut(mip, frame, face) = decode_image(format, bytes, w, h);
                    offset += size;
                }
            }
        }

        // 7.0 cube maps have no spheremap; carry an empty one so the
        // texture always writes back as 7.2
        if tex.is_cube_map() && face_count == 6 {
            tex.add_empty_spheremap();
        }
        Ok(tex)
    }

    fn add_empty_spheremap(&mut self) {
        let old_faces = self.face_count;
        let mut images = Vec::with_capacity(self.mip_count * self.num_frames * CUBEMAP_FACE_COUNT);
        let mut old = std::mem::take(&mut self.images).into_iter();
        for mip in 0..self.mip_count {
            let (w, h) = self.mip_size(mip);
            for _ in 0..self.num_frames {
                images.extend(old.by_ref().take(old_faces));
                images.push(TexelBuffer::zeroed(self.format.is_float(), w * h));
            }
        }
        self.images = images;
        self.face_count = CUBEMAP_FACE_COUNT;
    }

    pub fn serialize(&self) -> Vec<u8> {
        let header = VtfHeader {
            signature: VTF_SIGNATURE,
            version: [VTF_MAJOR_VERSION, VTF_MINOR_VERSION],
            header_size: VTF_HEADER_SIZE as u32,
            width: self.width as u16,
            height: self.height as u16,
            flags: self.flags.bits(),
            num_frames: self.num_frames as u16,
            start_frame: self.start_frame as u16,
            _pad0: [0; 4],
            reflectivity: self.reflectivity,
            _pad1: [0; 4],
            bumpmap_scale: self.bumpmap_scale,
            image_format: self.format.to_i32(),
            num_mip_levels: self.mip_count as u8,
            low_res_image_format: -1,
            low_res_image_width: 0,
            low_res_image_height: 0,
            depth: 1,
            _pad2: [0; 15],
        };

        let mut out = Vec::new();
        out.extend_from_slice(bytemuck::bytes_of(&header));
        for mip in (0..self.mip_count).rev() {
            let (w, h) = self.mip_size(mip);
            for frame in 0..self.num_frames {
                for face in 0..self.face_count {
                    out.extend_from_slice(&encode_image(self.format, self.image(mip, frame, face), w, h));
                }
            }
        }
        out
    }
}

fn box_reduce_f32(src: &[f32], sw: usize, sh: usize, dw: usize, dh: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dw * dh * 4];
    for y in 0..dh {
        let y0 = (y * 2).min(sh - 1);
        let y1 = (y * 2 + 1).min(sh - 1);
        for x in 0..dw {
            let x0 = (x * 2).min(sw - 1);
            let x1 = (x * 2 + 1).min(sw - 1);
            for c in 0..4 {
                out[(y * dw + x) * 4 + c] = 0.25
                    * (src[(y0 * sw + x0) * 4 + c]
                        + src[(y0 * sw + x1) * 4 + c]
                        + src[(y1 * sw + x0) * 4 + c]
                        + src[(y1 * sw + x1) * 4 + c]);
            }
        }
    }
    out
}

fn decode_image(format: ImageFormat, data: &[u8], width: usize, height: usize) -> TexelBuffer {
    let texels = width * height;
    match format {
        ImageFormat::Rgba8888 => TexelBuffer::Rgba8(data.to_vec()),
        ImageFormat::Bgra8888 => {
            TexelBuffer::Rgba8(data.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0], p[3]]).collect())
        }
        ImageFormat::Bgrx8888 => {
            TexelBuffer::Rgba8(data.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0], 255]).collect())
        }
        ImageFormat::Rgb888 => TexelBuffer::Rgba8(data.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect()),
        ImageFormat::Bgr888 => TexelBuffer::Rgba8(data.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0], 255]).collect()),
        ImageFormat::Dxt1 => TexelBuffer::Rgba8(dxt::decompress_dxt1(data, width, height)),
        ImageFormat::Dxt5 => TexelBuffer::Rgba8(dxt::decompress_dxt5(data, width, height)),
        ImageFormat::Rgba16161616F => TexelBuffer::RgbaF32(
            data.chunks_exact(2)
                .take(texels * 4)
                .map(|h| f16::from_le_bytes([h[0], h[1]]).to_f32())
                .collect(),
        ),
        ImageFormat::Rgba32323232F => TexelBuffer::RgbaF32(
            data.chunks_exact(4)
                .take(texels * 4)
                .map(|f| f32::from_le_bytes([f[0], f[1], f[2], f[3]]))
                .collect(),
        ),
    }
}

fn encode_image(format: ImageFormat, image: &TexelBuffer, width: usize, height: usize) -> Vec<u8> {
    if format.is_float() {
        let texels = match image {
            TexelBuffer::RgbaF32(v) => std::borrow::Cow::Borrowed(v.as_slice()),
            TexelBuffer::Rgba8(_) => std::borrow::Cow::Owned(image.to_rgba_f32()),
        };
        return match format {
            ImageFormat::Rgba16161616F => texels.iter().flat_map(|&f| f16::from_f32(f).to_le_bytes()).collect(),
            _ => texels.iter().flat_map(|&f| f.to_le_bytes()).collect(),
        };
    }

    let rgba = match image {
        TexelBuffer::Rgba8(v) => std::borrow::Cow::Borrowed(v.as_slice()),
        TexelBuffer::RgbaF32(_) => std::borrow::Cow::Owned(image.to_rgba8()),
    };
    match format {
        ImageFormat::Rgba8888 => rgba.into_owned(),
        ImageFormat::Bgra8888 => rgba.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0], p[3]]).collect(),
        ImageFormat::Bgrx8888 => rgba.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0], 255]).collect(),
        ImageFormat::Rgb888 => rgba.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        ImageFormat::Bgr888 => rgba.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0]]).collect(),
        ImageFormat::Dxt1 => dxt::compress_dxt1(&rgba, width, height),
        ImageFormat::Dxt5 => dxt::compress_dxt5(&rgba, width, height),
        ImageFormat::Rgba16161616F | ImageFormat::Rgba32323232F => unreachable!("float formats handled above"),
    }
}
