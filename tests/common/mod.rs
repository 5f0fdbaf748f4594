// Shared fixture builders for the integration tests. The files are
// synthesized in memory and written to a temp directory, then read back
// through the public file entry points.
#![allow(dead_code)]

use std::path::Path;

use cgmath::Vector3;

use dscs_tools_lib::anim::{AnimFile, ChannelTrack, InitialRotation, InitialVector, KeyframeBlock};
use dscs_tools_lib::geom::material::{
    shader_hex_from_string, MaterialBlock, ShaderUniform, UniformValue,
};
use dscs_tools_lib::geom::{
    BoneTransform, GeomFile, MeshRecord, PrimitiveType, TextureName, VertexAttributeDescriptor,
    VertexChannel, ATTR_BONE_WEIGHT, ATTR_POSITION, ATTR_UV, ATTR_WEIGHTED_BONE_ID, SCALAR_F32,
    SCALAR_U8,
};
use dscs_tools_lib::math::{DsQuaternion, DsVector3};
use dscs_tools_lib::name::{NameFile, TableString};
use dscs_tools_lib::skel::{BoneRelation, SkelFile};

pub fn ds(x: f32, y: f32, z: f32) -> DsVector3 {
    DsVector3(Vector3::new(x, y, z))
}

pub fn sample_name_file() -> NameFile {
    NameFile {
        bone_names: vec![
            TableString::new("root"),
            TableString::new("spine"),
            TableString::new("head"),
        ],
        material_names: vec![TableString::new("body_mat")],
    }
}

pub fn sample_skel_file() -> SkelFile {
    SkelFile {
        unknown_0x04: 0,
        unknown_0x08: 0,
        unknown_0x0c: 0,
        relations: vec![
            BoneRelation { child: 0, parent: -1 },
            BoneRelation { child: 1, parent: 0 },
            BoneRelation { child: 2, parent: 1 },
        ],
        reserved: vec![0xAA, 0xBB],
    }
}

fn identity_transform(x: f32, y: f32, z: f32) -> BoneTransform {
    BoneTransform {
        position: ds(x, y, z),
        x_axis: ds(1.0, 0.0, 0.0),
        y_axis: ds(0.0, 1.0, 0.0),
        z_axis: ds(0.0, 0.0, 1.0),
    }
}

/// A quad as a triangle strip, skinned with explicit per-vertex weights.
/// Every byte of the vertex stride is covered by a descriptor.
pub fn sample_mesh() -> MeshRecord {
    MeshRecord {
        primitive_type: PrimitiveType::TriangleStrip,
        weight_mode: 2,
        material_id: 0,
        unknown_0x31: 0,
        unknown_0x34: 0,
        unknown_0x36: 0,
        unknown_0x4c: 0,
        mesh_centre: ds(0.5, 0.5, 0.0),
        bounding_box_lengths: ds(1.0, 1.0, 0.0),
        vertex_count: 4,
        bytes_per_vertex: 30,
        bone_palette: vec![0, 2],
        descriptors: vec![
            VertexAttributeDescriptor {
                attribute_id: ATTR_POSITION,
                element_count: 3,
                scalar_type: SCALAR_F32,
                offset: 0,
            },
            VertexAttributeDescriptor {
                attribute_id: ATTR_UV,
                element_count: 2,
                scalar_type: SCALAR_F32,
                offset: 12,
            },
            VertexAttributeDescriptor {
                attribute_id: ATTR_WEIGHTED_BONE_ID,
                element_count: 2,
                scalar_type: SCALAR_U8,
                offset: 20,
            },
            VertexAttributeDescriptor {
                attribute_id: ATTR_BONE_WEIGHT,
                element_count: 2,
                scalar_type: SCALAR_F32,
                offset: 22,
            },
        ],
        channels: vec![
            VertexChannel {
                values: vec![
                    0.0, 0.0, 0.0, //
                    1.0, 0.0, 0.0, //
                    0.0, 1.0, 0.0, //
                    1.0, 1.0, 0.0,
                ],
            },
            VertexChannel {
                values: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            },
            // ids are 3x the palette slot
            VertexChannel {
                values: vec![0.0, 3.0, 0.0, 3.0, 0.0, 3.0, 0.0, 3.0],
            },
            VertexChannel {
                values: vec![1.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.0, 1.0],
            },
        ],
        indices: vec![0, 1, 2, 3],
    }
}

pub fn sample_material() -> MaterialBlock {
    MaterialBlock {
        unknown_0x00: 1,
        unknown_0x02: 0,
        shader_hex: shader_hex_from_string("08bda97e_64c40d41_84da3bd1_7bac9e42").unwrap(),
        unknown_0x16: 0,
        uniforms: vec![
            ShaderUniform {
                type_id: 50,
                value: UniformValue::TextureId([0, 0, 0]),
            },
            ShaderUniform {
                type_id: 51,
                value: UniformValue::Floats(vec![1.0, 1.0, 1.0, 1.0]),
            },
            ShaderUniform {
                type_id: 56,
                value: UniformValue::Floats(vec![0.6]),
            },
        ],
        components: vec![],
    }
}

pub fn sample_geom_file() -> GeomFile {
    GeomFile {
        unknown_0x06: 0,
        geom_centre: ds(0.5, 0.5, 0.0),
        geom_bbox_lengths: ds(1.0, 1.0, 0.0),
        bone_transforms: vec![
            identity_transform(0.0, 0.0, 0.0),
            identity_transform(0.0, -1.0, 0.0),
            identity_transform(0.0, -2.0, 0.0),
        ],
        meshes: vec![sample_mesh()],
        materials: vec![sample_material(), sample_material()],
        texture_names: vec![TextureName::new("body_tex")],
        cam1_blocks: vec![[0u8; 64]],
        cam2_blocks: vec![],
        footer: vec![1, 2, 3, 4, 5],
    }
}

pub fn sample_anim_file() -> AnimFile {
    AnimFile {
        bone_count: 3,
        playback_rate: 24.0,
        initial_rotations: vec![InitialRotation {
            bone_id: 2,
            rotation: DsQuaternion::from_slice([0.0, 0.0, 0.0, 1.0]),
        }],
        initial_locations: vec![InitialVector {
            bone_id: 2,
            value: DsVector3::from_slice([0.0, 2.0, 0.0]),
        }],
        initial_scales: vec![],
        blocks: vec![KeyframeBlock {
            cumulative_frame: 0,
            frame_span: 4,
            rotations: vec![ChannelTrack {
                bone_id: 1,
                boundary: DsQuaternion::from_slice([0.0, 0.0, 0.0, 1.0]),
                mask: vec![true, false, true, false],
                extras: vec![
                    DsQuaternion::from_slice([0.1, 0.0, 0.0, 0.9]),
                    DsQuaternion::from_slice([0.2, 0.0, 0.0, 0.8]),
                ],
            }],
            locations: vec![ChannelTrack {
                bone_id: 0,
                boundary: DsVector3::from_slice([0.0, 0.0, 0.0]),
                mask: vec![false, false, false, true],
                extras: vec![DsVector3::from_slice([0.0, 0.5, 0.0])],
            }],
            scales: vec![],
        }],
    }
}

/// Write a full `{stem}.name/.skel/.geom` set plus one `{stem}_idle.anim`
/// into `dir`.
pub fn write_model_set(dir: &Path, stem: &str) {
    std::fs::write(
        dir.join(format!("{}.name", stem)),
        sample_name_file().to_bytes().unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join(format!("{}.skel", stem)),
        sample_skel_file().to_bytes().unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join(format!("{}.geom", stem)),
        sample_geom_file().to_bytes().unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join(format!("{}_idle.anim", stem)),
        sample_anim_file().to_bytes().unwrap(),
    )
    .unwrap();
}
