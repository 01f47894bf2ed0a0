// pakfile.rs — the zip archive embedded in the BSP pakfile lump

use std::collections::HashMap;
use std::io::Read;

use crc::{Crc, CRC_32_ISO_HDLC};
use flate2::read::DeflateDecoder;
use rayon::prelude::*;

use cubebake_common::qfiles::{
    read_record, ZipEndOfCentralDirRecord, ZipFileHeader, ZipLocalFileHeader, ZIP_CENTRAL_HEADER_SIG,
    ZIP_END_OF_CENTRAL_SIG, ZIP_LOCAL_HEADER_SIG, ZIP_METHOD_DEFLATED, ZIP_METHOD_STORED,
};

use crate::BspError;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const LOCAL_HEADER_SIZE: usize = std::mem::size_of::<ZipLocalFileHeader>();
const CENTRAL_HEADER_SIZE: usize = std::mem::size_of::<ZipFileHeader>();
const END_RECORD_SIZE: usize = std::mem::size_of::<ZipEndOfCentralDirRecord>();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// In-memory pak archive. Names are `/`-separated and matched without
/// regard to case.
#[derive(Debug, Clone, Default)]
pub struct PakFile {
    entries: Vec<PakEntry>,
    index: HashMap<String, usize>,
}

fn pak_key(name: &str) -> String {
    name.replace('\\', "/").to_ascii_lowercase()
}

struct RawEntry<'a> {
    name: String,
    method: u16,
    uncompressed_size: usize,
    data: &'a [u8],
}

impl PakFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an archive. An empty lump is an empty archive.
    pub fn parse(data: &[u8]) -> Result<Self, BspError> {
        let mut pak = Self::new();
        if data.is_empty() {
            return Ok(pak);
        }

        let end_pos = find_end_record(data).ok_or_else(|| BspError::Zip("no end of central directory".into()))?;
        let end: ZipEndOfCentralDirRecord =
            read_record(&data[end_pos..]).ok_or_else(|| BspError::Zip("truncated end record".into()))?;

        let mut raw = Vec::with_capacity(end.n_central_directory_entries_total as usize);
        let mut pos = end.start_of_central_dir_offset as usize;
        for _ in 0..end.n_central_directory_entries_total {
            let header: ZipFileHeader = data
                .get(pos..)
                .and_then(read_record)
                .ok_or_else(|| BspError::Zip("truncated central directory".into()))?;
            let signature = header.signature;
            if signature != ZIP_CENTRAL_HEADER_SIG {
                return Err(BspError::Zip(format!("bad central header at {}", pos)));
            }
            let name_start = pos + CENTRAL_HEADER_SIZE;
            let name_bytes = data
                .get(name_start..name_start + header.filename_length as usize)
                .ok_or_else(|| BspError::Zip("truncated file name".into()))?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();

            let local_pos = header.relative_offset_of_local_header as usize;
            let local: ZipLocalFileHeader = data
                .get(local_pos..)
                .and_then(read_record)
                .ok_or_else(|| BspError::Zip(format!("truncated local header for {}", name)))?;
            let local_signature = local.signature;
            if local_signature != ZIP_LOCAL_HEADER_SIG {
                return Err(BspError::Zip(format!("bad local header for {}", name)));
            }
            let data_start = local_pos
                + LOCAL_HEADER_SIZE
                + local.filename_length as usize
                + local.extra_field_length as usize;
            let compressed_size = header.compressed_size as usize;
            let payload = data
                .get(data_start..data_start + compressed_size)
                .ok_or_else(|| BspError::Zip(format!("truncated data for {}", name)))?;

            raw.push(RawEntry {
                name,
                method: header.compression,
                uncompressed_size: header.uncompressed_size as usize,
                data: payload,
            });
            pos = name_start
                + header.filename_length as usize
                + header.extra_field_length as usize
                + header.comment_length as usize;
        }

        let decoded: Vec<Result<PakEntry, BspError>> = raw.par_iter().map(decode_entry).collect();
        for entry in decoded {
            let entry = entry?;
            if entry.name.ends_with('/') {
                continue;
            }
            pak.add_buffer(&entry.name, entry.data);
        }
        Ok(pak)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.index.get(&pak_key(name)).map(|&i| self.entries[i].data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&pak_key(name))
    }

    /// Add or replace an entry.
    pub fn add_buffer(&mut self, name: &str, data: Vec<u8>) {
        let name = name.replace('\\', "/");
        let key = pak_key(&name);
        match self.index.get(&key) {
            Some(&i) => {
                self.entries[i] = PakEntry { name, data };
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(PakEntry { name, data });
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let Some(i) = self.index.remove(&pak_key(name)) else {
            return false;
        };
        self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        true
    }

    /// Write every entry stored (uncompressed).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let crc32 = CRC32.checksum(&entry.data);
            let offset = out.len() as u32;
            let local = ZipLocalFileHeader {
                signature: ZIP_LOCAL_HEADER_SIG,
                version_needed: 10,
                flags: 0,
                compression: ZIP_METHOD_STORED,
                modtime: 0,
                moddate: 0,
                crc32,
                compressed_size: entry.data.len() as u32,
                uncompressed_size: entry.data.len() as u32,
                filename_length: entry.name.len() as u16,
                extra_field_length: 0,
            };
            out.extend_from_slice(bytemuck::bytes_of(&local));
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.data);

            let header = ZipFileHeader {
                signature: ZIP_CENTRAL_HEADER_SIG,
                version_made_by: 20,
                version_needed: 10,
                flags: 0,
                compression: ZIP_METHOD_STORED,
                modtime: 0,
                moddate: 0,
                crc32,
                compressed_size: entry.data.len() as u32,
                uncompressed_size: entry.data.len() as u32,
                filename_length: entry.name.len() as u16,
                extra_field_length: 0,
                comment_length: 0,
                disk_number_start: 0,
                internal_file_attribs: 0,
                external_file_attribs: 0,
                relative_offset_of_local_header: offset,
            };
            central.extend_from_slice(bytemuck::bytes_of(&header));
            central.extend_from_slice(entry.name.as_bytes());
        }

        let end = ZipEndOfCentralDirRecord {
            signature: ZIP_END_OF_CENTRAL_SIG,
            number_of_this_disk: 0,
            number_of_the_disk_with_start_of_central_directory: 0,
            n_central_directory_entries_this_disk: self.entries.len() as u16,
            n_central_directory_entries_total: self.entries.len() as u16,
            central_directory_size: central.len() as u32,
            start_of_central_dir_offset: out.len() as u32,
            comment_length: 0,
        };
        out.extend_from_slice(&central);
        out.extend_from_slice(bytemuck::bytes_of(&end));
        out
    }
}

fn find_end_record(data: &[u8]) -> Option<usize> {
    if data.len() < END_RECORD_SIZE {
        return None;
    }
    let sig = ZIP_END_OF_CENTRAL_SIG.to_le_bytes();
    let lowest = data.len().saturating_sub(END_RECORD_SIZE + u16::MAX as usize);
    (lowest..=data.len() - END_RECORD_SIZE).rev().find(|&p| data[p..p + 4] == sig)
}

fn decode_entry(raw: &RawEntry) -> Result<PakEntry, BspError> {
    let data = match raw.method {
        ZIP_METHOD_STORED => raw.data.to_vec(),
        ZIP_METHOD_DEFLATED => {
            let mut out = Vec::with_capacity(raw.uncompressed_size);
            DeflateDecoder::new(raw.data).read_to_end(&mut out)?;
            out
        }
        other => {
            return Err(BspError::Zip(format!("{} uses unsupported compression {}", raw.name, other)));
        }
    };
    if data.len() != raw.uncompressed_size {
        return Err(BspError::Zip(format!(
            "{} decoded to {} bytes, expected {}",
            raw.name,
            data.len(),
            raw.uncompressed_size
        )));
    }
    Ok(PakEntry {
        name: raw.name.clone(),
        data,
    })
}
