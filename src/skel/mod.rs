use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use binrw::helpers::until_eof;
use binrw::{binrw, BinRead, BinWrite};

use crate::error::Result;

/// One (child, parent) pair of the bone hierarchy, in file order.
/// A parent of -1 marks a root bone.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BoneRelation {
    pub child: u32,
    pub parent: i32,
}

/// The skeleton file: a small header, the hierarchy pairs, and an
/// undocumented tail that is carried verbatim so write-back stays
/// byte-identical.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkelFile {
    #[br(temp)]
    #[bw(calc = relations.len() as u32)]
    bone_count: u32,

    pub unknown_0x04: u32,
    pub unknown_0x08: u32,
    pub unknown_0x0c: u32,

    #[br(count = bone_count)]
    pub relations: Vec<BoneRelation>,

    #[br(parse_with = until_eof)]
    pub reserved: Vec<u8>,
}

impl SkelFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let skel: SkelFile = BinRead::read_options(&mut reader, binrw::Endian::Little, ())?;
        Ok(skel)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        BinWrite::write_options(self, &mut cursor, binrw::Endian::Little, ())?;
        Ok(cursor.into_inner())
    }

    pub fn bone_count(&self) -> usize {
        self.relations.len()
    }
}
