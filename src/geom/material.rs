use std::collections::HashMap;
use std::sync::OnceLock;

use binrw::{BinRead, BinWrite};
use serde::Serialize;

use crate::error::{ModelError, Result};

pub const UNIFORM_SENTINEL: u16 = 65280;
pub const COMPONENT_SENTINEL: u8 = 100;

/// One row of the fixed shader-uniform vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct UniformSpec {
    pub id: u8,
    pub name: &'static str,
    pub float_count: u8,
}

/// Shader uniform ids the engine is known to emit. Anything outside this
/// table is treated as corrupt input rather than silently carried.
pub const UNIFORM_TABLE: &[UniformSpec] = &[
    UniformSpec { id: 50, name: "DiffuseTextureID", float_count: 0 },
    UniformSpec { id: 51, name: "DiffuseColour", float_count: 4 },
    UniformSpec { id: 53, name: "NormalMapTextureID", float_count: 0 },
    UniformSpec { id: 54, name: "Bumpiness", float_count: 1 },
    UniformSpec { id: 56, name: "SpecularStrength", float_count: 1 },
    UniformSpec { id: 57, name: "SpecularPower", float_count: 1 },
    UniformSpec { id: 58, name: "CubeMapTextureID", float_count: 0 },
    UniformSpec { id: 59, name: "ReflectionStrength", float_count: 1 },
    UniformSpec { id: 60, name: "FresnelExp", float_count: 1 },
    UniformSpec { id: 61, name: "FresnelMin", float_count: 1 },
    UniformSpec { id: 62, name: "FuzzySpecColor", float_count: 3 },
    UniformSpec { id: 63, name: "SubColor", float_count: 3 },
    UniformSpec { id: 64, name: "SurfaceColor", float_count: 3 },
    UniformSpec { id: 65, name: "Rolloff", float_count: 1 },
    UniformSpec { id: 66, name: "VelvetStrength", float_count: 1 },
    UniformSpec { id: 67, name: "UnknownTextureSlot1", float_count: 0 },
    UniformSpec { id: 68, name: "OverlayTextureID", float_count: 0 },
    UniformSpec { id: 69, name: "UnknownTextureSlot2", float_count: 0 },
    UniformSpec { id: 70, name: "OverlayBumpiness", float_count: 1 },
    UniformSpec { id: 71, name: "OverlayStrength", float_count: 1 },
    UniformSpec { id: 72, name: "ToonTextureID", float_count: 0 },
    UniformSpec { id: 75, name: "Curvature", float_count: 1 },
    UniformSpec { id: 76, name: "GlassStrength", float_count: 1 },
    UniformSpec { id: 77, name: "UpsideDown", float_count: 1 },
    UniformSpec { id: 79, name: "ParallaxBiasX", float_count: 1 },
    UniformSpec { id: 80, name: "ParallaxBiasY", float_count: 1 },
    UniformSpec { id: 84, name: "Time", float_count: 1 },
    UniformSpec { id: 85, name: "ScrollSpeedSet1", float_count: 2 },
    UniformSpec { id: 88, name: "ScrollSpeedSet2", float_count: 2 },
    UniformSpec { id: 91, name: "ScrollSpeedSet3", float_count: 2 },
    UniformSpec { id: 94, name: "OffsetSet1", float_count: 2 },
    UniformSpec { id: 97, name: "OffsetSet2", float_count: 2 },
    UniformSpec { id: 100, name: "DistortionStrength", float_count: 1 },
    UniformSpec { id: 113, name: "LightMapStrength", float_count: 1 },
    UniformSpec { id: 114, name: "LightMapPower", float_count: 1 },
    UniformSpec { id: 116, name: "OffsetSet3", float_count: 2 },
    UniformSpec { id: 119, name: "Fat", float_count: 1 },
    UniformSpec { id: 120, name: "RotationSet1", float_count: 1 },
    UniformSpec { id: 123, name: "RotationSet2", float_count: 1 },
    UniformSpec { id: 129, name: "ScaleSet1", float_count: 2 },
    UniformSpec { id: 141, name: "ZBias", float_count: 1 },
    UniformSpec { id: 142, name: "UnknownTextureSlot3", float_count: 0 },
];

fn uniform_by_id() -> &'static HashMap<u8, &'static UniformSpec> {
    static MAP: OnceLock<HashMap<u8, &'static UniformSpec>> = OnceLock::new();
    MAP.get_or_init(|| UNIFORM_TABLE.iter().map(|s| (s.id, s)).collect())
}

fn uniform_by_name() -> &'static HashMap<&'static str, &'static UniformSpec> {
    static MAP: OnceLock<HashMap<&'static str, &'static UniformSpec>> = OnceLock::new();
    MAP.get_or_init(|| UNIFORM_TABLE.iter().map(|s| (s.name, s)).collect())
}

pub fn uniform_name(type_id: u8) -> Option<&'static str> {
    uniform_by_id().get(&type_id).map(|s| s.name)
}

pub fn uniform_id(name: &str) -> Option<u8> {
    uniform_by_name().get(name).map(|s| s.id)
}

/// Payload shapes of the trailing unknown-component records, keyed by tag.
fn component_kind(type_tag: u8) -> Option<ComponentKind> {
    match type_tag {
        160 => Some(ComponentKind::IntFloat),
        161 | 162 | 164 | 166 | 167 | 168 | 169 | 172 => Some(ComponentKind::IntInt),
        163 => Some(ComponentKind::ShortShortInt),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKind {
    IntFloat,
    IntInt,
    ShortShortInt,
}

/// Decoded payload of a shader uniform record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UniformValue {
    /// float_count 0: a texture binding, [slot id, two trailing shorts]
    TextureId([u16; 3]),
    /// float_count N: N floats, zero-padded to 16 bytes on disk
    Floats(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderUniform {
    pub type_id: u8,
    pub value: UniformValue,
}

impl ShaderUniform {
    pub fn name(&self) -> Option<&'static str> {
        uniform_name(self.type_id)
    }
}

impl BinRead for ShaderUniform {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let pos = reader.stream_position()?;
        let payload = <[u8; 16]>::read_options(reader, endian, ())?;
        let type_id = u8::read_options(reader, endian, ())?;
        let float_count = u8::read_options(reader, endian, ())?;
        let sentinel = u16::read_options(reader, endian, ())?;
        let reserved = u32::read_options(reader, endian, ())?;

        if sentinel != UNIFORM_SENTINEL || reserved != 0 {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!(
                    "shader uniform trailer mismatch (sentinel {}, reserved {})",
                    sentinel, reserved
                ),
            });
        }
        if uniform_name(type_id).is_none() {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!("unrecognized shader uniform type id {}", type_id),
            });
        }

        let value = if float_count == 0 {
            let mut shorts = [0u16; 8];
            for (i, chunk) in payload.chunks_exact(2).enumerate() {
                shorts[i] = u16::from_le_bytes([chunk[0], chunk[1]]);
            }
            if shorts[1..6].iter().any(|&s| s != 0) {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: "texture uniform payload has nonzero middle shorts".to_string(),
                });
            }
            UniformValue::TextureId([shorts[0], shorts[6], shorts[7]])
        } else {
            if float_count > 4 {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("shader uniform float count {} exceeds payload", float_count),
                });
            }
            let n = float_count as usize;
            if payload[n * 4..].iter().any(|&b| b != 0) {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: "shader uniform payload has nonzero bytes past float count"
                        .to_string(),
                });
            }
            let floats = payload[..n * 4]
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            UniformValue::Floats(floats)
        };

        Ok(ShaderUniform { type_id, value })
    }
}

impl BinWrite for ShaderUniform {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let pos = writer.stream_position()?;
        let mut payload = [0u8; 16];
        let float_count: u8 = match &self.value {
            UniformValue::TextureId([id, a, b]) => {
                payload[0..2].copy_from_slice(&id.to_le_bytes());
                payload[12..14].copy_from_slice(&a.to_le_bytes());
                payload[14..16].copy_from_slice(&b.to_le_bytes());
                0
            }
            UniformValue::Floats(floats) => {
                if floats.is_empty() || floats.len() > 4 {
                    return Err(binrw::Error::AssertFail {
                        pos,
                        message: format!(
                            "shader uniform {} has {} floats, expected 1..=4",
                            self.type_id,
                            floats.len()
                        ),
                    });
                }
                for (i, f) in floats.iter().enumerate() {
                    payload[i * 4..i * 4 + 4].copy_from_slice(&f.to_le_bytes());
                }
                floats.len() as u8
            }
        };

        payload.write_options(writer, endian, ())?;
        self.type_id.write_options(writer, endian, ())?;
        float_count.write_options(writer, endian, ())?;
        UNIFORM_SENTINEL.write_options(writer, endian, ())?;
        0u32.write_options(writer, endian, ())?;
        Ok(())
    }
}

/// Decoded payload of an unknown-component record, shaped per its tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ComponentValue {
    IntFloat(i32, f32),
    IntInt(i32, i32),
    ShortShortInt(u16, u16, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownComponent {
    pub type_tag: u8,
    pub value: ComponentValue,
}

impl BinRead for UnknownComponent {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let pos = reader.stream_position()?;
        let payload = <[u8; 8]>::read_options(reader, endian, ())?;
        let padding = <[u8; 8]>::read_options(reader, endian, ())?;
        let type_tag = u8::read_options(reader, endian, ())?;
        let sentinel_a = u8::read_options(reader, endian, ())?;
        let sentinel_b = u16::read_options(reader, endian, ())?;
        let reserved = u32::read_options(reader, endian, ())?;

        if padding != [0u8; 8] {
            return Err(binrw::Error::AssertFail {
                pos,
                message: "component record padding is nonzero".to_string(),
            });
        }
        if sentinel_a != COMPONENT_SENTINEL || sentinel_b != UNIFORM_SENTINEL || reserved != 0 {
            return Err(binrw::Error::AssertFail {
                pos,
                message: format!(
                    "component record trailer mismatch (tag {}, sentinels {}/{}, reserved {})",
                    type_tag, sentinel_a, sentinel_b, reserved
                ),
            });
        }

        let kind = component_kind(type_tag).ok_or_else(|| binrw::Error::AssertFail {
            pos,
            message: format!("unrecognized component type tag {}", type_tag),
        })?;

        let value = match kind {
            ComponentKind::IntFloat => ComponentValue::IntFloat(
                i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                f32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            ),
            ComponentKind::IntInt => ComponentValue::IntInt(
                i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            ),
            ComponentKind::ShortShortInt => ComponentValue::ShortShortInt(
                u16::from_le_bytes([payload[0], payload[1]]),
                u16::from_le_bytes([payload[2], payload[3]]),
                u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            ),
        };

        Ok(UnknownComponent { type_tag, value })
    }
}

impl BinWrite for UnknownComponent {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let pos = writer.stream_position()?;
        let expected = component_kind(self.type_tag).ok_or_else(|| binrw::Error::AssertFail {
            pos,
            message: format!("unrecognized component type tag {}", self.type_tag),
        })?;

        let mut payload = [0u8; 8];
        match (&self.value, expected) {
            (ComponentValue::IntFloat(a, b), ComponentKind::IntFloat) => {
                payload[0..4].copy_from_slice(&a.to_le_bytes());
                payload[4..8].copy_from_slice(&b.to_le_bytes());
            }
            (ComponentValue::IntInt(a, b), ComponentKind::IntInt) => {
                payload[0..4].copy_from_slice(&a.to_le_bytes());
                payload[4..8].copy_from_slice(&b.to_le_bytes());
            }
            (ComponentValue::ShortShortInt(a, b, c), ComponentKind::ShortShortInt) => {
                payload[0..2].copy_from_slice(&a.to_le_bytes());
                payload[2..4].copy_from_slice(&b.to_le_bytes());
                payload[4..8].copy_from_slice(&c.to_le_bytes());
            }
            _ => {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!(
                        "component value shape does not match type tag {}",
                        self.type_tag
                    ),
                });
            }
        }

        payload.write_options(writer, endian, ())?;
        [0u8; 8].write_options(writer, endian, ())?;
        self.type_tag.write_options(writer, endian, ())?;
        COMPONENT_SENTINEL.write_options(writer, endian, ())?;
        UNIFORM_SENTINEL.write_options(writer, endian, ())?;
        0u32.write_options(writer, endian, ())?;
        Ok(())
    }
}

/// One material block of the geometry file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialBlock {
    pub unknown_0x00: u16,
    pub unknown_0x02: u16,
    pub shader_hex: [u8; 16],
    pub unknown_0x16: u16,
    pub uniforms: Vec<ShaderUniform>,
    pub components: Vec<UnknownComponent>,
}

impl MaterialBlock {
    pub fn shader_name(&self) -> String {
        shader_hex_to_string(&self.shader_hex)
    }
}

impl BinRead for MaterialBlock {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let unknown_0x00 = u16::read_options(reader, endian, ())?;
        let unknown_0x02 = u16::read_options(reader, endian, ())?;
        let shader_hex = <[u8; 16]>::read_options(reader, endian, ())?;
        let uniform_count = u8::read_options(reader, endian, ())?;
        let component_count = u8::read_options(reader, endian, ())?;
        let unknown_0x16 = u16::read_options(reader, endian, ())?;

        let mut uniforms = Vec::with_capacity(uniform_count as usize);
        for _ in 0..uniform_count {
            uniforms.push(ShaderUniform::read_options(reader, endian, ())?);
        }
        let mut components = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            components.push(UnknownComponent::read_options(reader, endian, ())?);
        }

        Ok(MaterialBlock {
            unknown_0x00,
            unknown_0x02,
            shader_hex,
            unknown_0x16,
            uniforms,
            components,
        })
    }
}

impl BinWrite for MaterialBlock {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        self.unknown_0x00.write_options(writer, endian, ())?;
        self.unknown_0x02.write_options(writer, endian, ())?;
        self.shader_hex.write_options(writer, endian, ())?;
        (self.uniforms.len() as u8).write_options(writer, endian, ())?;
        (self.components.len() as u8).write_options(writer, endian, ())?;
        self.unknown_0x16.write_options(writer, endian, ())?;
        for uniform in &self.uniforms {
            uniform.write_options(writer, endian, ())?;
        }
        for component in &self.components {
            component.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

/// Render the 16 shader id bytes in the engine's text form: four 4-byte
/// groups, each reversed and hex-encoded, joined by underscores.
pub fn shader_hex_to_string(bytes: &[u8; 16]) -> String {
    bytes
        .chunks_exact(4)
        .map(|group| {
            group
                .iter()
                .rev()
                .map(|b| format!("{:02x}", b))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse the text form back into the 16 raw bytes.
pub fn shader_hex_from_string(text: &str) -> Result<[u8; 16]> {
    let malformed = || ModelError::Invariant {
        position: 0,
        message: format!("malformed shader id text {:?}", text),
    };

    let groups: Vec<&str> = text.split('_').collect();
    if groups.len() != 4 || groups.iter().any(|g| g.len() != 8) {
        return Err(malformed());
    }

    let mut bytes = [0u8; 16];
    for (gi, group) in groups.iter().enumerate() {
        for bi in 0..4 {
            let hex = &group[bi * 2..bi * 2 + 2];
            let value = u8::from_str_radix(hex, 16).map_err(|_| malformed())?;
            // text is byte-reversed within the group
            bytes[gi * 4 + (3 - bi)] = value;
        }
    }
    Ok(bytes)
}
