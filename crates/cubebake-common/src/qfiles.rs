// qfiles.rs — on-disk structures: Source BSP, VTF header, zip archive records

use bytemuck::{Pod, Zeroable};

// ============================================================
// BSP files
// ============================================================

/// "VBSP" in little-endian
pub const IDBSPHEADER: i32 = (b'P' as i32) << 24 | (b'S' as i32) << 16 | (b'B' as i32) << 8 | b'V' as i32;
pub const BSPVERSION_MIN: i32 = 19;
pub const BSPVERSION_MAX: i32 = 21;

pub const HEADER_LUMPS: usize = 64;

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_TEXDATA: usize = 2;
pub const LUMP_VERTEXES: usize = 3;
pub const LUMP_TEXINFO: usize = 6;
pub const LUMP_FACES: usize = 7;
pub const LUMP_EDGES: usize = 12;
pub const LUMP_SURFEDGES: usize = 13;
pub const LUMP_MODELS: usize = 14;
pub const LUMP_GAME_LUMP: usize = 35;
pub const LUMP_PAKFILE: usize = 40;
pub const LUMP_CUBEMAPS: usize = 42;
pub const LUMP_TEXDATA_STRING_DATA: usize = 43;
pub const LUMP_TEXDATA_STRING_TABLE: usize = 44;

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
    pub version: i32,
    pub four_cc: [u8; 4],
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct DHeader {
    pub ident: i32,
    pub version: i32,
    pub lumps: [Lump; HEADER_LUMPS],
    pub map_revision: i32,
}

pub const DHEADER_SIZE: usize = std::mem::size_of::<DHeader>();

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DVertex {
    pub point: [f32; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DFace {
    pub planenum: u16,
    pub side: u8,
    pub on_node: u8,
    pub firstedge: i32,
    pub numedges: i16,
    pub texinfo: i16,
    pub dispinfo: i16,
    pub surface_fog_volume_id: i16,
    pub styles: [u8; 4],
    pub lightofs: i32,
    pub area: f32,
    pub lightmap_texture_mins_in_luxels: [i32; 2],
    pub lightmap_texture_size_in_luxels: [i32; 2],
    pub orig_face: i32,
    pub num_prims: u16,
    pub first_prim_id: u16,
    pub smoothing_groups: u32,
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct TexInfo {
    pub texture_vecs: [[f32; 4]; 2],
    pub lightmap_vecs: [[f32; 4]; 2],
    pub flags: i32,
    pub texdata: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DTexData {
    pub reflectivity: [f32; 3],
    pub name_string_table_id: i32,
    pub width: i32,
    pub height: i32,
    pub view_width: i32,
    pub view_height: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    pub headnode: i32,
    pub firstface: i32,
    pub numfaces: i32,
}

/// A designer-placed cubemap sample. `size` is 0 for the default edge,
/// otherwise the edge is `1 << (size - 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DCubemapSample {
    pub origin: [i32; 3],
    pub size: u8,
    pub _pad: [u8; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DGameLump {
    pub id: i32,
    pub flags: u16,
    pub version: u16,
    /// Absolute offset in the BSP file.
    pub fileofs: i32,
    pub filelen: i32,
}

// texinfo flags
pub const SURF_LIGHT: i32 = 0x0001;
pub const SURF_SKY2D: i32 = 0x0002;
pub const SURF_SKY: i32 = 0x0004;
pub const SURF_WARP: i32 = 0x0008;
pub const SURF_TRANS: i32 = 0x0010;
pub const SURF_NOPORTAL: i32 = 0x0020;
pub const SURF_TRIGGER: i32 = 0x0040;
pub const SURF_NODRAW: i32 = 0x0080;
pub const SURF_HINT: i32 = 0x0100;
pub const SURF_SKIP: i32 = 0x0200;

// ============================================================
// VTF files
// ============================================================

pub const VTF_SIGNATURE: [u8; 4] = *b"VTF\0";
pub const VTF_MAJOR_VERSION: u32 = 7;
pub const VTF_MINOR_VERSION: u32 = 2;

/// VTF 7.2 header. Several fields are unaligned on disk, hence `packed`.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct VtfHeader {
    pub signature: [u8; 4],
    pub version: [u32; 2],
    pub header_size: u32,
    pub width: u16,
    pub height: u16,
    pub flags: u32,
    pub num_frames: u16,
    pub start_frame: u16,
    pub _pad0: [u8; 4],
    pub reflectivity: [f32; 3],
    pub _pad1: [u8; 4],
    pub bumpmap_scale: f32,
    pub image_format: i32,
    pub num_mip_levels: u8,
    pub low_res_image_format: i32,
    pub low_res_image_width: u8,
    pub low_res_image_height: u8,
    pub depth: u16,
    pub _pad2: [u8; 15],
}

pub const VTF_HEADER_SIZE: usize = std::mem::size_of::<VtfHeader>();

// ============================================================
// Zip archives (BSP pakfile lump)
// ============================================================

pub const ZIP_LOCAL_HEADER_SIG: u32 = 0x04034b50;
pub const ZIP_CENTRAL_HEADER_SIG: u32 = 0x02014b50;
pub const ZIP_END_OF_CENTRAL_SIG: u32 = 0x06054b50;

pub const ZIP_METHOD_STORED: u16 = 0;
pub const ZIP_METHOD_DEFLATED: u16 = 8;

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ZipLocalFileHeader {
    pub signature: u32,
    pub version_needed: u16,
    pub flags: u16,
    pub compression: u16,
    pub modtime: u16,
    pub moddate: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ZipFileHeader {
    pub signature: u32,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression: u16,
    pub modtime: u16,
    pub moddate: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
    pub comment_length: u16,
    pub disk_number_start: u16,
    pub internal_file_attribs: u16,
    pub external_file_attribs: u32,
    pub relative_offset_of_local_header: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ZipEndOfCentralDirRecord {
    pub signature: u32,
    pub number_of_this_disk: u16,
    pub number_of_the_disk_with_start_of_central_directory: u16,
    pub n_central_directory_entries_this_disk: u16,
    pub n_central_directory_entries_total: u16,
    pub central_directory_size: u32,
    pub start_of_central_dir_offset: u32,
    pub comment_length: u16,
}

/// Read a Pod record from the front of `data`, tolerating any alignment.
pub fn read_record<T: Pod>(data: &[u8]) -> Option<T> {
    let size = std::mem::size_of::<T>();
    if data.len() < size {
        return None;
    }
    Some(bytemuck::pod_read_unaligned(&data[..size]))
}

/// Read a packed array of Pod records. Trailing partial records are ignored.
pub fn read_records<T: Pod>(data: &[u8]) -> Vec<T> {
    let size = std::mem::size_of::<T>();
    data.chunks_exact(size).map(bytemuck::pod_read_unaligned).collect()
}
