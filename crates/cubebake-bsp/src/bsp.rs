// bsp.rs — VBSP file reader/writer

use std::fs;
use std::path::Path;

use bytemuck::Pod;
use cubebake_common::qfiles::{
    read_record, read_records, DGameLump, DHeader, Lump, BSPVERSION_MAX, BSPVERSION_MIN, DHEADER_SIZE,
    HEADER_LUMPS, IDBSPHEADER, LUMP_GAME_LUMP, LUMP_PAKFILE,
};

use crate::pakfile::PakFile;
use crate::BspError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LumpData {
    pub version: i32,
    pub four_cc: [u8; 4],
    pub data: Vec<u8>,
}

/// A whole BSP held in memory. Lump contents are kept verbatim; only the
/// layout is recomputed on write.
#[derive(Debug, Clone, PartialEq)]
pub struct BspFile {
    pub version: i32,
    pub map_revision: i32,
    lumps: Vec<LumpData>,
    // file offset the game lump had when read; its directory holds absolute offsets
    game_lump_ofs: i32,
}

impl BspFile {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            map_revision: 0,
            lumps: vec![LumpData::default(); HEADER_LUMPS],
            game_lump_ofs: 0,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, BspError> {
        let header: DHeader = read_record(data).ok_or(BspError::Truncated("header"))?;
        let ident = header.ident;
        if ident != IDBSPHEADER {
            return Err(BspError::BadIdent(ident));
        }
        let version = header.version;
        if !(BSPVERSION_MIN..=BSPVERSION_MAX).contains(&version) {
            return Err(BspError::UnsupportedVersion(version));
        }

        let lump_table = header.lumps;
        let mut lumps = Vec::with_capacity(HEADER_LUMPS);
        for (i, lump) in lump_table.iter().enumerate() {
            let (ofs, len) = (lump.fileofs, lump.filelen);
            if ofs < 0 || len < 0 {
                return Err(BspError::BadLump(i));
            }
            let (ofs, len) = (ofs as usize, len as usize);
            let bytes = data.get(ofs..ofs + len).ok_or(BspError::BadLump(i))?;
            lumps.push(LumpData {
                version: lump.version,
                four_cc: lump.four_cc,
                data: bytes.to_vec(),
            });
        }

        Ok(Self {
            version,
            map_revision: header.map_revision,
            lumps,
            game_lump_ofs: lump_table[LUMP_GAME_LUMP].fileofs,
        })
    }

    pub fn load(path: &Path) -> Result<Self, BspError> {
        let data = fs::read(path)?;
        Self::parse(&data)
    }

    pub fn lump(&self, index: usize) -> &[u8] {
        &self.lumps[index].data
    }

    pub fn lump_data(&self, index: usize) -> &LumpData {
        &self.lumps[index]
    }

    pub fn set_lump(&mut self, index: usize, data: Vec<u8>) {
        self.lumps[index].data = data;
    }

    /// Decode a lump as an array of fixed-size records.
    pub fn records<T: Pod>(&self, index: usize) -> Vec<T> {
        read_records(self.lump(index))
    }

    pub fn set_lump_records<T: Pod>(&mut self, index: usize, records: &[T]) {
        self.set_lump(index, bytemuck::cast_slice(records).to_vec());
    }

    pub fn pak_file(&self) -> Result<PakFile, BspError> {
        PakFile::parse(self.lump(LUMP_PAKFILE))
    }

    pub fn set_pak_file(&mut self, pak: &PakFile) {
        self.set_lump(LUMP_PAKFILE, pak.to_bytes());
    }

    /// Serialize with every lump 4-byte aligned, in lump order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut table = [Lump::default(); HEADER_LUMPS];
        let mut body: Vec<u8> = Vec::new();
        let mut ofs = DHEADER_SIZE;

        for (i, lump) in self.lumps.iter().enumerate() {
            table[i] = Lump {
                fileofs: ofs as i32,
                filelen: lump.data.len() as i32,
                version: lump.version,
                four_cc: lump.four_cc,
            };
            if i == LUMP_GAME_LUMP {
                body.extend_from_slice(&self.relocated_game_lump(ofs as i32));
            } else {
                body.extend_from_slice(&lump.data);
            }
            ofs += lump.data.len();
            while ofs % 4 != 0 {
                body.push(0);
                ofs += 1;
            }
        }

        let header = DHeader {
            ident: IDBSPHEADER,
            version: self.version,
            lumps: table,
            map_revision: self.map_revision,
        };
        let mut out = Vec::with_capacity(DHEADER_SIZE + body.len());
        out.extend_from_slice(bytemuck::bytes_of(&header));
        out.extend_from_slice(&body);
        out
    }

    /// Game lump directory with absolute offsets moved to `new_ofs`.
    fn relocated_game_lump(&self, new_ofs: i32) -> Vec<u8> {
        let mut data = self.lumps[LUMP_GAME_LUMP].data.clone();
        if data.len() < 4 {
            return data;
        }
        let count = i32::from_le_bytes([data[0], data[1], data[2], data[3]]).max(0) as usize;
        let delta = new_ofs - self.game_lump_ofs;
        let entry_size = std::mem::size_of::<DGameLump>();
        for i in 0..count {
            let start = 4 + i * entry_size;
            let Some(mut entry) = data.get(start..).and_then(read_record::<DGameLump>) else {
                break;
            };
            if entry.fileofs != 0 {
                entry.fileofs += delta;
            }
            data[start..start + entry_size].copy_from_slice(bytemuck::bytes_of(&entry));
        }
        data
    }

    pub fn write(&self, path: &Path) -> Result<(), BspError> {
        fs::write(path, self.to_bytes())?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}
