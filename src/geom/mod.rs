pub mod material;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};
use serde::Serialize;

use crate::error::Result;
use crate::math::{f16_bits_to_f32, f32_to_f16_bits, DsVector3};
use material::MaterialBlock;

pub const ATTR_POSITION: u16 = 1;
pub const ATTR_NORMAL: u16 = 2;
pub const ATTR_UV: u16 = 3;
pub const ATTR_UV2: u16 = 4;
pub const ATTR_UV3: u16 = 5;
pub const ATTR_COLOUR: u16 = 6;
pub const ATTR_WEIGHTED_BONE_ID: u16 = 7;
pub const ATTR_BONE_WEIGHT: u16 = 8;

pub const SCALAR_F32: u8 = 1;
pub const SCALAR_F16: u8 = 6;
pub const SCALAR_U8: u8 = 8;

fn scalar_size(scalar_type: u8) -> Option<usize> {
    match scalar_type {
        SCALAR_F32 => Some(4),
        SCALAR_F16 => Some(2),
        SCALAR_U8 => Some(1),
        _ => None,
    }
}

/// Source platform of a geometry file. Reading is driven entirely by the
/// stored attribute descriptors; the platform only decides which scalar
/// types newly built descriptors use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Pc,
    Ps4,
}

impl Platform {
    /// Scalar type a freshly built descriptor uses for the given attribute.
    pub fn vertex_scalar_type(&self, attribute_id: u16) -> u8 {
        match self {
            Platform::Pc => SCALAR_F32,
            Platform::Ps4 => match attribute_id {
                ATTR_POSITION | ATTR_NORMAL | ATTR_UV | ATTR_UV2 | ATTR_UV3 => SCALAR_F16,
                _ => SCALAR_F32,
            },
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VertexAttributeDescriptor {
    pub attribute_id: u16,
    pub element_count: u8,
    pub scalar_type: u8,
    pub offset: u16,
}

impl VertexAttributeDescriptor {
    pub fn byte_size(&self) -> Option<usize> {
        scalar_size(self.scalar_type).map(|s| s * self.element_count as usize)
    }
}

/// One attribute's values for every vertex, flattened in vertex order.
/// `values.len() == vertex_count * element_count`. Scalars are widened to
/// f32 on read; u8 and f16 widen exactly, so narrowing on write restores
/// the original bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexChannel {
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimitiveType {
    TriangleList,
    TriangleStrip,
}

impl PrimitiveType {
    fn from_raw(raw: u16, pos: u64) -> binrw::BinResult<Self> {
        match raw {
            4 => Ok(PrimitiveType::TriangleList),
            5 => Ok(PrimitiveType::TriangleStrip),
            other => Err(binrw::Error::AssertFail {
                pos,
                message: format!("unrecognized primitive type {}", other),
            }),
        }
    }

    fn to_raw(self) -> u16 {
        match self {
            PrimitiveType::TriangleList => 4,
            PrimitiveType::TriangleStrip => 5,
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq)]
struct MeshHeader {
    vertex_count: u32,
    index_count: u32,
    primitive_type: u16,
    weight_mode: u16,
    material_id: u32,
    weighted_bone_count: u32,
    attribute_count: u16,
    bytes_per_vertex: u16,
    unknown_0x31: u32,
    unknown_0x34: u16,
    unknown_0x36: u16,
    unknown_0x4c: u32,
    mesh_centre: DsVector3,
    bounding_box_lengths: DsVector3,
}

/// One mesh of the geometry file: header fields, its bone palette, the
/// attribute descriptors, and the decoded vertex/index buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRecord {
    pub primitive_type: PrimitiveType,
    pub weight_mode: u16,
    pub material_id: u32,
    pub unknown_0x31: u32,
    pub unknown_0x34: u16,
    pub unknown_0x36: u16,
    pub unknown_0x4c: u32,
    pub mesh_centre: DsVector3,
    pub bounding_box_lengths: DsVector3,
    pub vertex_count: u32,
    pub bytes_per_vertex: u16,
    pub bone_palette: Vec<u32>,
    pub descriptors: Vec<VertexAttributeDescriptor>,
    /// Parallel to `descriptors`.
    pub channels: Vec<VertexChannel>,
    pub indices: Vec<u16>,
}

impl MeshRecord {
    /// The descriptor and flattened values for one attribute id, if present.
    pub fn attribute(&self, attribute_id: u16) -> Option<(&VertexAttributeDescriptor, &[f32])> {
        self.descriptors
            .iter()
            .position(|d| d.attribute_id == attribute_id)
            .map(|i| (&self.descriptors[i], self.channels[i].values.as_slice()))
    }
}

impl BinRead for MeshRecord {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let header_pos = reader.stream_position()?;
        let header = MeshHeader::read_options(reader, endian, ())?;
        let primitive_type = PrimitiveType::from_raw(header.primitive_type, header_pos)?;

        let mut bone_palette = Vec::with_capacity(header.weighted_bone_count as usize);
        for _ in 0..header.weighted_bone_count {
            bone_palette.push(u32::read_options(reader, endian, ())?);
        }

        let descriptor_pos = reader.stream_position()?;
        let mut descriptors = Vec::with_capacity(header.attribute_count as usize);
        for _ in 0..header.attribute_count {
            descriptors.push(VertexAttributeDescriptor::read_options(reader, endian, ())?);
        }

        let stride = header.bytes_per_vertex as usize;
        for d in &descriptors {
            let size = d.byte_size().ok_or_else(|| binrw::Error::AssertFail {
                pos: descriptor_pos,
                message: format!(
                    "unrecognized vertex scalar type {} on attribute {}",
                    d.scalar_type, d.attribute_id
                ),
            })?;
            if d.offset as usize + size > stride {
                return Err(binrw::Error::AssertFail {
                    pos: descriptor_pos,
                    message: format!(
                        "attribute {} overruns the vertex stride ({} + {} > {})",
                        d.attribute_id, d.offset, size, stride
                    ),
                });
            }
        }

        let mut buffer = vec![0u8; header.vertex_count as usize * stride];
        reader.read_exact(&mut buffer).map_err(binrw::Error::Io)?;

        let mut channels = Vec::with_capacity(descriptors.len());
        for d in &descriptors {
            let elem = d.element_count as usize;
            let size = scalar_size(d.scalar_type).unwrap_or(4);
            let mut values = Vec::with_capacity(header.vertex_count as usize * elem);
            for v in 0..header.vertex_count as usize {
                let base = v * stride + d.offset as usize;
                for e in 0..elem {
                    let at = base + e * size;
                    let value = match d.scalar_type {
                        SCALAR_F32 => f32::from_le_bytes([
                            buffer[at],
                            buffer[at + 1],
                            buffer[at + 2],
                            buffer[at + 3],
                        ]),
                        SCALAR_F16 => {
                            f16_bits_to_f32(u16::from_le_bytes([buffer[at], buffer[at + 1]]))
                        }
                        _ => buffer[at] as f32,
                    };
                    values.push(value);
                }
            }
            channels.push(VertexChannel { values });
        }

        let mut indices = Vec::with_capacity(header.index_count as usize);
        for _ in 0..header.index_count {
            indices.push(u16::read_options(reader, endian, ())?);
        }

        Ok(MeshRecord {
            primitive_type,
            weight_mode: header.weight_mode,
            material_id: header.material_id,
            unknown_0x31: header.unknown_0x31,
            unknown_0x34: header.unknown_0x34,
            unknown_0x36: header.unknown_0x36,
            unknown_0x4c: header.unknown_0x4c,
            mesh_centre: header.mesh_centre,
            bounding_box_lengths: header.bounding_box_lengths,
            vertex_count: header.vertex_count,
            bytes_per_vertex: header.bytes_per_vertex,
            bone_palette,
            descriptors,
            channels,
            indices,
        })
    }
}

impl BinWrite for MeshRecord {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let pos = writer.stream_position()?;
        if self.channels.len() != self.descriptors.len() {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!(
                    "mesh has {} channels for {} descriptors",
                    self.channels.len(),
                    self.descriptors.len()
                ),
            });
        }

        let header = MeshHeader {
            vertex_count: self.vertex_count,
            index_count: self.indices.len() as u32,
            primitive_type: self.primitive_type.to_raw(),
            weight_mode: self.weight_mode,
            material_id: self.material_id,
            weighted_bone_count: self.bone_palette.len() as u32,
            attribute_count: self.descriptors.len() as u16,
            bytes_per_vertex: self.bytes_per_vertex,
            unknown_0x31: self.unknown_0x31,
            unknown_0x34: self.unknown_0x34,
            unknown_0x36: self.unknown_0x36,
            unknown_0x4c: self.unknown_0x4c,
            mesh_centre: self.mesh_centre,
            bounding_box_lengths: self.bounding_box_lengths,
        };
        header.write_options(writer, endian, ())?;

        for bone in &self.bone_palette {
            bone.write_options(writer, endian, ())?;
        }
        for d in &self.descriptors {
            d.write_options(writer, endian, ())?;
        }

        let stride = self.bytes_per_vertex as usize;
        let mut buffer = vec![0u8; self.vertex_count as usize * stride];
        for (d, channel) in self.descriptors.iter().zip(&self.channels) {
            let elem = d.element_count as usize;
            let size = scalar_size(d.scalar_type).ok_or_else(|| binrw::Error::AssertFail {
                pos,
                message: format!("unrecognized vertex scalar type {}", d.scalar_type),
            })?;
            if channel.values.len() != self.vertex_count as usize * elem {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!(
                        "attribute {} has {} values for {} vertices of {} elements",
                        d.attribute_id,
                        channel.values.len(),
                        self.vertex_count,
                        elem
                    ),
                });
            }
            if d.offset as usize + elem * size > stride {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("attribute {} overruns the vertex stride", d.attribute_id),
                });
            }
            for v in 0..self.vertex_count as usize {
                let base = v * stride + d.offset as usize;
                for e in 0..elem {
                    let at = base + e * size;
                    let value = channel.values[v * elem + e];
                    match d.scalar_type {
                        SCALAR_F32 => buffer[at..at + 4].copy_from_slice(&value.to_le_bytes()),
                        SCALAR_F16 => {
                            buffer[at..at + 2].copy_from_slice(&f32_to_f16_bits(value).to_le_bytes())
                        }
                        _ => buffer[at] = value as u8,
                    }
                }
            }
        }
        writer.write_all(&buffer).map_err(binrw::Error::Io)?;

        for index in &self.indices {
            index.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

/// Raw bone transform of the geometry file: the rest position followed by
/// the three axis vectors of the bind rotation.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoneTransform {
    pub position: DsVector3,
    pub x_axis: DsVector3,
    pub y_axis: DsVector3,
    pub z_axis: DsVector3,
}

/// A 32-byte texture name slot. The raw bytes are kept verbatim so slots
/// without a NUL terminator, or with data past the terminator, re-encode
/// byte-identical; the name view stops at the first NUL.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextureName {
    pub raw: [u8; 32],
}

impl TextureName {
    pub fn new(name: &str) -> Self {
        let mut raw = [0u8; 32];
        let bytes = name.as_bytes();
        let n = bytes.len().min(31);
        raw[..n].copy_from_slice(&bytes[..n]);
        TextureName { raw }
    }

    pub fn name(&self) -> String {
        let end = self.raw.iter().position(|&b| b == 0).unwrap_or(self.raw.len());
        String::from_utf8_lossy(&self.raw[..end]).to_string()
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct GeomHeader {
    mesh_count: u16,
    material_count: u16,
    texture_count: u16,
    unknown_0x06: u16,
    bone_count: u32,
    cam1_count: u32,
    cam2_count: u32,
    footer_length: u32,
    geom_centre: DsVector3,
    geom_bbox_lengths: DsVector3,
}

/// The geometry file. Counts in the header are derived from the vectors on
/// write; reserved blocks round-trip verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomFile {
    pub unknown_0x06: u16,
    pub geom_centre: DsVector3,
    pub geom_bbox_lengths: DsVector3,
    pub bone_transforms: Vec<BoneTransform>,
    pub meshes: Vec<MeshRecord>,
    pub materials: Vec<MaterialBlock>,
    pub texture_names: Vec<TextureName>,
    pub cam1_blocks: Vec<[u8; 64]>,
    pub cam2_blocks: Vec<[u8; 64]>,
    pub footer: Vec<u8>,
}

impl BinRead for GeomFile {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let header = GeomHeader::read_options(reader, endian, ())?;

        let mut bone_transforms = Vec::with_capacity(header.bone_count as usize);
        for _ in 0..header.bone_count {
            bone_transforms.push(BoneTransform::read_options(reader, endian, ())?);
        }

        let mut meshes = Vec::with_capacity(header.mesh_count as usize);
        for _ in 0..header.mesh_count {
            meshes.push(MeshRecord::read_options(reader, endian, ())?);
        }

        let mut materials = Vec::with_capacity(header.material_count as usize);
        for _ in 0..header.material_count {
            materials.push(MaterialBlock::read_options(reader, endian, ())?);
        }

        let mut texture_names = Vec::with_capacity(header.texture_count as usize);
        for _ in 0..header.texture_count {
            texture_names.push(TextureName::read_options(reader, endian, ())?);
        }

        let mut cam1_blocks = Vec::with_capacity(header.cam1_count as usize);
        for _ in 0..header.cam1_count {
            cam1_blocks.push(<[u8; 64]>::read_options(reader, endian, ())?);
        }
        let mut cam2_blocks = Vec::with_capacity(header.cam2_count as usize);
        for _ in 0..header.cam2_count {
            cam2_blocks.push(<[u8; 64]>::read_options(reader, endian, ())?);
        }

        let mut footer = vec![0u8; header.footer_length as usize];
        reader.read_exact(&mut footer).map_err(binrw::Error::Io)?;

        Ok(GeomFile {
            unknown_0x06: header.unknown_0x06,
            geom_centre: header.geom_centre,
            geom_bbox_lengths: header.geom_bbox_lengths,
            bone_transforms,
            meshes,
            materials,
            texture_names,
            cam1_blocks,
            cam2_blocks,
            footer,
        })
    }
}

impl BinWrite for GeomFile {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let header = GeomHeader {
            mesh_count: self.meshes.len() as u16,
            material_count: self.materials.len() as u16,
            texture_count: self.texture_names.len() as u16,
            unknown_0x06: self.unknown_0x06,
            bone_count: self.bone_transforms.len() as u32,
            cam1_count: self.cam1_blocks.len() as u32,
            cam2_count: self.cam2_blocks.len() as u32,
            footer_length: self.footer.len() as u32,
            geom_centre: self.geom_centre,
            geom_bbox_lengths: self.geom_bbox_lengths,
        };
        header.write_options(writer, endian, ())?;

        for transform in &self.bone_transforms {
            transform.write_options(writer, endian, ())?;
        }
        for mesh in &self.meshes {
            mesh.write_options(writer, endian, ())?;
        }
        for mat in &self.materials {
            mat.write_options(writer, endian, ())?;
        }
        for name in &self.texture_names {
            name.write_options(writer, endian, ())?;
        }
        for block in &self.cam1_blocks {
            block.write_options(writer, endian, ())?;
        }
        for block in &self.cam2_blocks {
            block.write_options(writer, endian, ())?;
        }
        writer.write_all(&self.footer).map_err(binrw::Error::Io)?;
        Ok(())
    }
}

impl GeomFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let geom: GeomFile = BinRead::read_options(&mut reader, binrw::Endian::Little, ())?;
        Ok(geom)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = std::io::Cursor::new(data);
        let geom: GeomFile = BinRead::read_options(&mut reader, binrw::Endian::Little, ())?;
        Ok(geom)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        BinWrite::write_options(self, &mut cursor, binrw::Endian::Little, ())?;
        Ok(cursor.into_inner())
    }
}
