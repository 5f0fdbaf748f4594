use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};

use crate::error::Result;

/// One length-prefixed entry in the name table. Entries must be valid
/// UTF-8; anything else would not survive a re-encode unchanged.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableString {
    #[br(temp)]
    #[bw(calc = value.len() as u16)]
    len: u16,

    #[br(count = len, try_map = String::from_utf8)]
    #[bw(map = |s: &String| s.as_bytes().to_vec())]
    pub value: String,
}

impl TableString {
    pub fn new(value: &str) -> Self {
        TableString {
            value: value.to_string(),
        }
    }
}

/// The name table file: an ordered string list split by a header-declared
/// index into bone names followed by material names.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFile {
    #[br(temp)]
    #[bw(calc = (bone_names.len() + material_names.len()) as u32)]
    string_count: u32,

    #[br(temp, assert(bone_name_count <= string_count,
        "bone name split index {} exceeds string count {}", bone_name_count, string_count))]
    #[bw(calc = bone_names.len() as u32)]
    bone_name_count: u32,

    #[br(count = bone_name_count)]
    pub bone_names: Vec<TableString>,

    #[br(count = string_count - bone_name_count)]
    pub material_names: Vec<TableString>,
}

impl NameFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let name: NameFile = BinRead::read_options(&mut reader, binrw::Endian::Little, ())?;
        Ok(name)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        BinWrite::write_options(self, &mut cursor, binrw::Endian::Little, ())?;
        Ok(cursor.into_inner())
    }

    pub fn bone_name(&self, bone_id: usize) -> Option<&str> {
        self.bone_names.get(bone_id).map(|s| s.value.as_str())
    }
}
