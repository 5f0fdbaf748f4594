use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::anim::AnimFile;
use crate::error::{ModelError, Result};
use crate::geom::material::{ShaderUniform, UniformValue, UnknownComponent};
use crate::geom::{
    GeomFile, MeshRecord, PrimitiveType, ATTR_BONE_WEIGHT, ATTR_COLOUR, ATTR_NORMAL,
    ATTR_POSITION, ATTR_UV, ATTR_UV2, ATTR_UV3, ATTR_WEIGHTED_BONE_ID,
};
use crate::math::{corrected_bone_position, inverse_bind_matrix, DsMatrix44};
use crate::name::NameFile;
use crate::skel::SkelFile;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    /// Skeleton index, also the id animation and palette entries refer to.
    pub id: u32,
    pub name: String,
    /// -1 marks a root bone.
    pub parent: i32,
    pub head_position: [f32; 3],
    pub inverse_bind_matrix: DsMatrix44,
    pub rest_pose_matrix: DsMatrix44,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }
}

/// Vertices a bone influences within one mesh, in mesh palette order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexGroup {
    /// Skeleton bone index, resolved through the mesh palette.
    pub bone_id: u32,
    pub vertex_indices: Vec<usize>,
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mesh {
    pub material_id: usize,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub uvs2: Option<Vec<[f32; 2]>>,
    pub uvs3: Option<Vec<[f32; 2]>>,
    pub colours: Option<Vec<[f32; 4]>>,
    pub polygons: Vec<[usize; 3]>,
    /// Empty groups are retained so the palette order survives.
    pub vertex_groups: Vec<VertexGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub shader_name: String,
    pub texture_id: Option<u16>,
    pub toon_texture_id: Option<u16>,
    pub base_colour: Option<[f32; 4]>,
    pub specular_strength: Option<f32>,
    /// Full ordered record lists, kept for re-encoding.
    pub uniforms: Vec<ShaderUniform>,
    pub components: Vec<UnknownComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Texture {
    pub name: String,
    pub path: PathBuf,
}

/// A sampled curve with strictly increasing frame numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FCurve<T> {
    pub frames: Vec<u32>,
    pub values: Vec<T>,
}

impl<T> Default for FCurve<T> {
    fn default() -> Self {
        FCurve {
            frames: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> FCurve<T> {
    pub fn push(&mut self, frame: u32, value: T) -> Result<()> {
        if let Some(&last) = self.frames.last() {
            if frame <= last {
                return Err(ModelError::Invariant {
                    position: 0,
                    message: format!(
                        "keyframe at frame {} does not advance past frame {}",
                        frame, last
                    ),
                });
            }
        }
        self.frames.push(frame);
        self.values.push(value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnimationClip {
    pub playback_rate: f32,
    pub rotations: BTreeMap<u32, FCurve<[f32; 4]>>,
    pub locations: BTreeMap<u32, FCurve<[f32; 3]>>,
    pub scales: BTreeMap<u32, FCurve<[f32; 3]>>,
}

/// The assembled in-memory model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    pub skeleton: Skeleton,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub animations: BTreeMap<String, AnimationClip>,
}

/// Decode a triangle list: consecutive index triples.
pub fn triangles_to_polys(indices: &[u16]) -> Vec<[usize; 3]> {
    indices
        .chunks_exact(3)
        .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
        .collect()
}

/// Decode a triangle strip. Triangle k is (i_k, i_k+1, i_k+2) with the
/// first two indices swapped on odd k to keep the winding consistent.
/// Degenerate triangles and repeats of an already emitted vertex set are
/// dropped.
pub fn triangle_strips_to_polys(indices: &[u16]) -> Vec<[usize; 3]> {
    let mut polys = Vec::new();
    let mut seen: HashSet<[usize; 3]> = HashSet::new();
    if indices.len() < 3 {
        return polys;
    }
    for k in 0..indices.len() - 2 {
        let mut a = indices[k] as usize;
        let mut b = indices[k + 1] as usize;
        let c = indices[k + 2] as usize;
        if k % 2 == 1 {
            std::mem::swap(&mut a, &mut b);
        }
        if a == b || b == c || a == c {
            continue;
        }
        let mut key = [a, b, c];
        key.sort_unstable();
        if seen.insert(key) {
            polys.push([a, b, c]);
        }
    }
    polys
}

fn channel_rows<const N: usize>(mesh: &MeshRecord, attribute_id: u16) -> Option<Vec<[f32; N]>> {
    let (desc, values) = mesh.attribute(attribute_id)?;
    if desc.element_count as usize != N {
        return None;
    }
    Some(
        values
            .chunks_exact(N)
            .map(|row| {
                let mut out = [0.0f32; N];
                out.copy_from_slice(row);
                out
            })
            .collect(),
    )
}

fn flip_v(rows: Vec<[f32; 2]>) -> Vec<[f32; 2]> {
    rows.into_iter().map(|[u, v]| [u, 1.0 - v]).collect()
}

fn build_skeleton(name_file: &NameFile, skel_file: &SkelFile, geom_file: &GeomFile) -> Result<Skeleton> {
    let bone_name_count = name_file.bone_names.len();
    let mut seen = HashSet::new();
    let mut bones = Vec::new();

    for relation in &skel_file.relations {
        if !seen.insert(relation.child) {
            continue;
        }
        if relation.child as usize >= bone_name_count {
            return Err(ModelError::CrossReference(format!(
                "skeleton bone {} has no name table entry ({} bone names)",
                relation.child, bone_name_count
            )));
        }
        if relation.parent >= 0 && relation.parent as usize >= bone_name_count {
            return Err(ModelError::CrossReference(format!(
                "skeleton bone {} has out-of-range parent {}",
                relation.child, relation.parent
            )));
        }

        let (head_position, inverse_bind) = match geom_file.bone_transforms.get(bones.len()) {
            Some(t) => {
                let position = t.position.to_slice();
                let x = t.x_axis.to_slice();
                let y = t.y_axis.to_slice();
                let z = t.z_axis.to_slice();
                (
                    corrected_bone_position(position, x, y, z),
                    inverse_bind_matrix(position, x, y, z),
                )
            }
            None => ([0.0, 0.0, 0.0], DsMatrix44::identity()),
        };
        let rest_pose = inverse_bind.invert().ok_or_else(|| ModelError::Invariant {
            position: 0,
            message: format!("bone {} has a singular inverse bind matrix", relation.child),
        })?;

        bones.push(Bone {
            id: relation.child,
            name: name_file
                .bone_name(relation.child as usize)
                .unwrap_or_default()
                .to_string(),
            parent: relation.parent,
            head_position,
            inverse_bind_matrix: inverse_bind,
            rest_pose_matrix: rest_pose,
        });
    }

    Ok(Skeleton { bones })
}

fn build_vertex_groups(mesh: &MeshRecord, vertex_count: usize) -> Result<Vec<VertexGroup>> {
    let palette = &mesh.bone_palette;
    let mut groups: Vec<VertexGroup> = palette
        .iter()
        .map(|&bone_id| VertexGroup {
            bone_id,
            vertex_indices: Vec::new(),
            weights: Vec::new(),
        })
        .collect();

    let mut assign = |slot: usize, vertex: usize, weight: f32| -> Result<()> {
        if weight == 0.0 {
            return Ok(());
        }
        let group = groups.get_mut(slot).ok_or_else(|| {
            ModelError::CrossReference(format!(
                "vertex {} references palette slot {} of {}",
                vertex,
                slot,
                palette.len()
            ))
        })?;
        group.vertex_indices.push(vertex);
        group.weights.push(weight);
        Ok(())
    };

    match mesh.weight_mode {
        0 => {
            for vertex in 0..vertex_count {
                assign(0, vertex, 1.0)?;
            }
        }
        1 => {
            let (desc, values) = mesh.attribute(ATTR_POSITION).ok_or_else(|| {
                ModelError::Invariant {
                    position: 0,
                    message: "weight mode 1 mesh has no position attribute".to_string(),
                }
            })?;
            if desc.element_count != 4 {
                return Err(ModelError::Invariant {
                    position: 0,
                    message: format!(
                        "weight mode 1 needs 4-element positions, found {}",
                        desc.element_count
                    ),
                });
            }
            for vertex in 0..vertex_count {
                let slot = (values[vertex * 4 + 3] / 3.0).floor() as usize;
                assign(slot, vertex, 1.0)?;
            }
        }
        2 => {
            let (id_desc, ids) = mesh.attribute(ATTR_WEIGHTED_BONE_ID).ok_or_else(|| {
                ModelError::Invariant {
                    position: 0,
                    message: "weight mode 2 mesh has no bone id attribute".to_string(),
                }
            })?;
            let (w_desc, weights) = mesh.attribute(ATTR_BONE_WEIGHT).ok_or_else(|| {
                ModelError::Invariant {
                    position: 0,
                    message: "weight mode 2 mesh has no bone weight attribute".to_string(),
                }
            })?;
            if id_desc.element_count != w_desc.element_count {
                return Err(ModelError::Invariant {
                    position: 0,
                    message: format!(
                        "bone id and weight attributes disagree on element count ({} vs {})",
                        id_desc.element_count, w_desc.element_count
                    ),
                });
            }
            let elem = id_desc.element_count as usize;
            for vertex in 0..vertex_count {
                for e in 0..elem {
                    let slot = (ids[vertex * elem + e] / 3.0).floor() as usize;
                    assign(slot, vertex, weights[vertex * elem + e])?;
                }
            }
        }
        other => {
            return Err(ModelError::Invariant {
                position: 0,
                message: format!("unrecognized weight mode {}", other),
            });
        }
    }

    Ok(groups)
}

fn build_mesh(mesh: &MeshRecord) -> Result<Mesh> {
    let positions: Vec<[f32; 3]> = {
        let (desc, values) = mesh.attribute(ATTR_POSITION).ok_or_else(|| {
            ModelError::Invariant {
                position: 0,
                message: "mesh has no position attribute".to_string(),
            }
        })?;
        let elem = desc.element_count as usize;
        if elem < 3 {
            return Err(ModelError::Invariant {
                position: 0,
                message: format!("position attribute has {} elements", elem),
            });
        }
        values
            .chunks_exact(elem)
            .map(|row| [row[0], row[1], row[2]])
            .collect()
    };

    let polygons = match mesh.primitive_type {
        PrimitiveType::TriangleList => {
            if mesh.indices.len() % 3 != 0 {
                return Err(ModelError::CrossReference(format!(
                    "triangle list index count {} is not a multiple of 3",
                    mesh.indices.len()
                )));
            }
            triangles_to_polys(&mesh.indices)
        }
        PrimitiveType::TriangleStrip => triangle_strips_to_polys(&mesh.indices),
    };

    let vertex_groups = build_vertex_groups(mesh, positions.len())?;

    Ok(Mesh {
        material_id: mesh.material_id as usize,
        positions,
        normals: channel_rows::<3>(mesh, ATTR_NORMAL),
        uvs: channel_rows::<2>(mesh, ATTR_UV).map(flip_v),
        uvs2: channel_rows::<2>(mesh, ATTR_UV2).map(flip_v),
        uvs3: channel_rows::<2>(mesh, ATTR_UV3).map(flip_v),
        colours: channel_rows::<4>(mesh, ATTR_COLOUR),
        polygons,
        vertex_groups,
    })
}

fn build_material(model_name: &str, index: usize, name_file: &NameFile, block: &crate::geom::material::MaterialBlock) -> Material {
    let name = name_file
        .material_names
        .get(index)
        .map(|s| s.value.clone())
        .unwrap_or_else(|| format!("{}_mat_{:03}", model_name, index));

    let mut texture_id = None;
    let mut toon_texture_id = None;
    let mut base_colour = None;
    let mut specular_strength = None;
    for uniform in &block.uniforms {
        match (uniform.type_id, &uniform.value) {
            (50, UniformValue::TextureId(v)) => texture_id = Some(v[0]),
            (72, UniformValue::TextureId(v)) => toon_texture_id = Some(v[0]),
            (51, UniformValue::Floats(f)) if f.len() == 4 => {
                base_colour = Some([f[0], f[1], f[2], f[3]])
            }
            (56, UniformValue::Floats(f)) if f.len() == 1 => specular_strength = Some(f[0]),
            _ => {}
        }
    }

    Material {
        name,
        shader_name: block.shader_name(),
        texture_id,
        toon_texture_id,
        base_colour,
        specular_strength,
        uniforms: block.uniforms.clone(),
        components: block.components.clone(),
    }
}

fn build_clip(anim: &AnimFile) -> Result<AnimationClip> {
    let mut clip = AnimationClip {
        playback_rate: anim.playback_rate,
        ..Default::default()
    };

    for initial in &anim.initial_rotations {
        clip.rotations
            .entry(initial.bone_id)
            .or_default()
            .push(0, initial.rotation.to_slice())?;
    }
    for initial in &anim.initial_locations {
        clip.locations
            .entry(initial.bone_id)
            .or_default()
            .push(0, initial.value.to_slice())?;
    }
    for initial in &anim.initial_scales {
        clip.scales
            .entry(initial.bone_id)
            .or_default()
            .push(0, initial.value.to_slice())?;
    }

    for block in &anim.blocks {
        for track in &block.rotations {
            let curve = clip.rotations.entry(track.bone_id).or_default();
            for (frame, value) in track.explicit_frames(block.cumulative_frame) {
                curve.push(frame, value.to_slice())?;
            }
        }
        for track in &block.locations {
            let curve = clip.locations.entry(track.bone_id).or_default();
            for (frame, value) in track.explicit_frames(block.cumulative_frame) {
                curve.push(frame, value.to_slice())?;
            }
        }
        for track in &block.scales {
            let curve = clip.scales.entry(track.bone_id).or_default();
            for (frame, value) in track.explicit_frames(block.cumulative_frame) {
                curve.push(frame, value.to_slice())?;
            }
        }
    }

    Ok(clip)
}

fn validate(model: &Model) -> Result<()> {
    let bone_count = model.skeleton.bone_count() as u32;
    for (mi, mesh) in model.meshes.iter().enumerate() {
        for poly in &mesh.polygons {
            for &index in poly {
                if index >= mesh.positions.len() {
                    return Err(ModelError::CrossReference(format!(
                        "mesh {} polygon index {} exceeds {} vertices",
                        mi,
                        index,
                        mesh.positions.len()
                    )));
                }
            }
        }
        if mesh.material_id >= model.materials.len() && !model.materials.is_empty() {
            return Err(ModelError::CrossReference(format!(
                "mesh {} references material {} of {}",
                mi,
                mesh.material_id,
                model.materials.len()
            )));
        }
        for group in &mesh.vertex_groups {
            if group.bone_id >= bone_count {
                return Err(ModelError::CrossReference(format!(
                    "mesh {} vertex group bone {} exceeds {} skeleton bones",
                    mi, group.bone_id, bone_count
                )));
            }
        }
    }
    for (clip_name, clip) in &model.animations {
        let out_of_range = clip
            .rotations
            .keys()
            .chain(clip.locations.keys())
            .chain(clip.scales.keys())
            .find(|&&id| id >= bone_count);
        if let Some(&id) = out_of_range {
            return Err(ModelError::CrossReference(format!(
                "animation {} drives bone {} but the skeleton has {} bones",
                clip_name, id, bone_count
            )));
        }
    }
    Ok(())
}

/// Assemble the collated model from the decoded files. `base_dir` is where
/// the files live; texture paths resolve into its `images` subdirectory.
pub fn assemble(
    model_name: &str,
    base_dir: &Path,
    name_file: &NameFile,
    skel_file: &SkelFile,
    geom_file: &GeomFile,
    anims: &BTreeMap<String, AnimFile>,
) -> Result<Model> {
    let skeleton = build_skeleton(name_file, skel_file, geom_file)?;

    let mut meshes = Vec::with_capacity(geom_file.meshes.len());
    for mesh in &geom_file.meshes {
        meshes.push(build_mesh(mesh)?);
    }

    let materials = geom_file
        .materials
        .iter()
        .enumerate()
        .map(|(i, block)| build_material(model_name, i, name_file, block))
        .collect();

    let textures = geom_file
        .texture_names
        .iter()
        .map(|t| {
            let name = t.name();
            Texture {
                path: base_dir.join("images").join(format!("{}.img", name)),
                name,
            }
        })
        .collect();

    let mut animations = BTreeMap::new();
    for (clip_name, anim) in anims {
        animations.insert(clip_name.clone(), build_clip(anim)?);
    }

    let model = Model {
        name: model_name.to_string(),
        skeleton,
        meshes,
        materials,
        textures,
        animations,
    };
    validate(&model)?;
    Ok(model)
}

impl Model {
    /// Load `{stem}.name`, `{stem}.skel`, `{stem}.geom` and every sibling
    /// `*.anim` whose stem starts with the model stem, then assemble.
    pub fn from_files(path_stem: &Path) -> Result<Self> {
        let model_name = path_stem
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let base_dir = path_stem.parent().unwrap_or_else(|| Path::new("."));

        let name_file = NameFile::from_file(&path_stem.with_extension("name"))?;
        let skel_file = SkelFile::from_file(&path_stem.with_extension("skel"))?;
        let geom_file = GeomFile::from_file(&path_stem.with_extension("geom"))?;

        let mut anims = BTreeMap::new();
        for entry in std::fs::read_dir(base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "anim") != Some(true) {
                continue;
            }
            let stem = match path.file_stem() {
                Some(s) => s.to_string_lossy().to_string(),
                None => continue,
            };
            if !stem.starts_with(&model_name) {
                continue;
            }
            anims.insert(stem, AnimFile::from_file(&path)?);
        }

        assemble(&model_name, base_dir, &name_file, &skel_file, &geom_file, &anims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{
        BoneTransform, MeshRecord, VertexAttributeDescriptor, VertexChannel, ATTR_POSITION,
        SCALAR_F32,
    };
    use crate::math::DsVector3;
    use crate::name::TableString;
    use crate::skel::BoneRelation;
    use cgmath::Vector3;

    fn ds(x: f32, y: f32, z: f32) -> DsVector3 {
        DsVector3(Vector3::new(x, y, z))
    }

    fn identity_transform(x: f32, y: f32, z: f32) -> BoneTransform {
        BoneTransform {
            position: ds(x, y, z),
            x_axis: ds(1.0, 0.0, 0.0),
            y_axis: ds(0.0, 1.0, 0.0),
            z_axis: ds(0.0, 0.0, 1.0),
        }
    }

    fn basic_name_file() -> NameFile {
        NameFile {
            bone_names: vec![
                TableString::new("root"),
                TableString::new("spine"),
                TableString::new("head"),
            ],
            material_names: vec![TableString::new("body_mat")],
        }
    }

    fn basic_skel_file() -> SkelFile {
        SkelFile {
            unknown_0x04: 0,
            unknown_0x08: 0,
            unknown_0x0c: 0,
            relations: vec![
                BoneRelation { child: 0, parent: -1 },
                BoneRelation { child: 1, parent: 0 },
                BoneRelation { child: 2, parent: 1 },
            ],
            reserved: vec![],
        }
    }

    fn empty_geom() -> GeomFile {
        GeomFile {
            unknown_0x06: 0,
            geom_centre: ds(0.0, 0.0, 0.0),
            geom_bbox_lengths: ds(0.0, 0.0, 0.0),
            bone_transforms: vec![
                identity_transform(0.0, 0.0, 0.0),
                identity_transform(0.0, -1.0, 0.0),
                identity_transform(0.0, -2.0, 0.0),
            ],
            meshes: vec![],
            materials: vec![],
            texture_names: vec![],
            cam1_blocks: vec![],
            cam2_blocks: vec![],
            footer: vec![],
        }
    }

    fn position_mesh(weight_mode: u16, elem: u8, values: Vec<f32>, palette: Vec<u32>) -> MeshRecord {
        let vertex_count = (values.len() / elem as usize) as u32;
        MeshRecord {
            primitive_type: PrimitiveType::TriangleList,
            weight_mode,
            material_id: 0,
            unknown_0x31: 0,
            unknown_0x34: 0,
            unknown_0x36: 0,
            unknown_0x4c: 0,
            mesh_centre: ds(0.0, 0.0, 0.0),
            bounding_box_lengths: ds(1.0, 1.0, 1.0),
            vertex_count,
            bytes_per_vertex: elem as u16 * 4,
            bone_palette: palette,
            descriptors: vec![VertexAttributeDescriptor {
                attribute_id: ATTR_POSITION,
                element_count: elem,
                scalar_type: SCALAR_F32,
                offset: 0,
            }],
            channels: vec![VertexChannel { values }],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_strip_decoding_alternates_winding() {
        let polys = triangle_strips_to_polys(&[0, 1, 2, 3, 4]);
        assert_eq!(polys, vec![[0, 1, 2], [2, 1, 3], [2, 3, 4]]);
    }

    #[test]
    fn test_strip_decoding_drops_degenerates_and_repeats() {
        // every later window is degenerate or re-covers {0,1,2}
        let polys = triangle_strips_to_polys(&[0, 1, 2, 2, 1, 0]);
        assert_eq!(polys, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_skeleton_dedup_keeps_first_relation() {
        let name_file = basic_name_file();
        let mut skel_file = basic_skel_file();
        skel_file.relations.push(BoneRelation { child: 1, parent: 2 });
        let geom = empty_geom();

        let skeleton = build_skeleton(&name_file, &skel_file, &geom).unwrap();
        assert_eq!(skeleton.bone_count(), 3);
        assert_eq!(skeleton.bones[1].parent, 0);
    }

    #[test]
    fn test_skeleton_rejects_unnamed_bone() {
        let name_file = basic_name_file();
        let mut skel_file = basic_skel_file();
        skel_file.relations.push(BoneRelation { child: 9, parent: 0 });
        let geom = empty_geom();

        let result = build_skeleton(&name_file, &skel_file, &geom);
        assert!(matches!(result, Err(ModelError::CrossReference(_))));
    }

    #[test]
    fn test_bone_head_position_correction() {
        let name_file = basic_name_file();
        let skel_file = basic_skel_file();
        let geom = empty_geom();

        let skeleton = build_skeleton(&name_file, &skel_file, &geom).unwrap();
        // identity axes negate the raw position
        assert_eq!(skeleton.bones[1].head_position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_weight_mode_one_uses_position_w() {
        // position.w 7.0 lands in palette slot 2
        let mesh = position_mesh(
            1,
            4,
            vec![
                0.0, 0.0, 0.0, 7.0, //
                1.0, 0.0, 0.0, 7.0, //
                0.0, 1.0, 0.0, 0.0,
            ],
            vec![0, 1, 2],
        );
        let groups = build_vertex_groups(&mesh, 3).unwrap();
        assert_eq!(groups[2].vertex_indices, vec![0, 1]);
        assert_eq!(groups[2].weights, vec![1.0, 1.0]);
        assert_eq!(groups[0].vertex_indices, vec![2]);
        assert!(groups[1].vertex_indices.is_empty());
    }

    #[test]
    fn test_weight_mode_zero_binds_everything_to_slot_zero() {
        let mesh = position_mesh(
            0,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![1],
        );
        let groups = build_vertex_groups(&mesh, 3).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].bone_id, 1);
        assert_eq!(groups[0].vertex_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_weight_mode_two_drops_zero_weights() {
        let mut mesh = position_mesh(
            2,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0, 2],
        );
        mesh.descriptors.push(VertexAttributeDescriptor {
            attribute_id: ATTR_WEIGHTED_BONE_ID,
            element_count: 2,
            scalar_type: SCALAR_F32,
            offset: 12,
        });
        // ids are 3x the palette slot
        mesh.channels.push(VertexChannel {
            values: vec![0.0, 3.0, 0.0, 3.0, 0.0, 3.0],
        });
        mesh.descriptors.push(VertexAttributeDescriptor {
            attribute_id: ATTR_BONE_WEIGHT,
            element_count: 2,
            scalar_type: SCALAR_F32,
            offset: 20,
        });
        mesh.channels.push(VertexChannel {
            values: vec![0.75, 0.25, 1.0, 0.0, 0.5, 0.5],
        });
        mesh.bytes_per_vertex = 28;

        let groups = build_vertex_groups(&mesh, 3).unwrap();
        assert_eq!(groups[0].vertex_indices, vec![0, 1, 2]);
        assert_eq!(groups[0].weights, vec![0.75, 1.0, 0.5]);
        // vertex 1's zero weight for slot 1 is dropped
        assert_eq!(groups[1].vertex_indices, vec![0, 2]);
        assert_eq!(groups[1].weights, vec![0.25, 0.5]);
    }

    #[test]
    fn test_uv_v_flip() {
        let mut mesh = position_mesh(
            0,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0],
        );
        mesh.descriptors.push(VertexAttributeDescriptor {
            attribute_id: ATTR_UV,
            element_count: 2,
            scalar_type: SCALAR_F32,
            offset: 12,
        });
        mesh.channels.push(VertexChannel {
            values: vec![0.0, 0.25, 0.5, 0.5, 1.0, 1.0],
        });
        mesh.bytes_per_vertex = 20;

        let built = build_mesh(&mesh).unwrap();
        assert_eq!(built.uvs, Some(vec![[0.0, 0.75], [0.5, 0.5], [1.0, 0.0]]));
    }

    #[test]
    fn test_material_name_fallback_is_synthesized() {
        let name_file = basic_name_file();
        let block = crate::geom::material::MaterialBlock {
            unknown_0x00: 0,
            unknown_0x02: 0,
            shader_hex: [0; 16],
            unknown_0x16: 0,
            uniforms: vec![ShaderUniform {
                type_id: 50,
                value: UniformValue::TextureId([4, 0, 0]),
            }],
            components: vec![],
        };

        let named = build_material("chr001", 0, &name_file, &block);
        assert_eq!(named.name, "body_mat");
        assert_eq!(named.texture_id, Some(4));

        let synthesized = build_material("chr001", 1, &name_file, &block);
        assert_eq!(synthesized.name, "chr001_mat_001");
    }

    #[test]
    fn test_assemble_validates_polygon_indices() {
        let name_file = basic_name_file();
        let skel_file = basic_skel_file();
        let mut geom = empty_geom();
        let mut mesh = position_mesh(
            0,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0],
        );
        mesh.indices = vec![0, 1, 7];
        geom.meshes.push(mesh);

        let result = assemble(
            "chr001",
            Path::new("."),
            &name_file,
            &skel_file,
            &geom,
            &BTreeMap::new(),
        );
        assert!(matches!(result, Err(ModelError::CrossReference(_))));
    }

    #[test]
    fn test_assemble_validates_palette_bone_range() {
        let name_file = basic_name_file();
        let skel_file = basic_skel_file();
        let mut geom = empty_geom();
        geom.meshes.push(position_mesh(
            0,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![5],
        ));

        let result = assemble(
            "chr001",
            Path::new("."),
            &name_file,
            &skel_file,
            &geom,
            &BTreeMap::new(),
        );
        assert!(matches!(result, Err(ModelError::CrossReference(_))));
    }

    #[test]
    fn test_texture_paths_resolve_under_images() {
        let name_file = basic_name_file();
        let skel_file = basic_skel_file();
        let mut geom = empty_geom();
        geom.texture_names
            .push(crate::geom::TextureName::new("body_tex"));

        let model = assemble(
            "chr001",
            Path::new("data/models"),
            &name_file,
            &skel_file,
            &geom,
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(
            model.textures[0].path,
            Path::new("data/models/images/body_tex.img")
        );
    }

    #[test]
    fn test_clip_curves_from_blocks() {
        use crate::anim::{ChannelTrack, InitialVector, KeyframeBlock};
        use crate::math::DsVector3;

        let anim = AnimFile {
            bone_count: 3,
            playback_rate: 24.0,
            initial_rotations: vec![],
            initial_locations: vec![InitialVector {
                bone_id: 2,
                value: DsVector3::from_slice([0.0, 1.0, 0.0]),
            }],
            initial_scales: vec![],
            blocks: vec![KeyframeBlock {
                cumulative_frame: 10,
                frame_span: 4,
                rotations: vec![],
                locations: vec![ChannelTrack {
                    bone_id: 1,
                    boundary: DsVector3::from_slice([1.0, 0.0, 0.0]),
                    mask: vec![true, false, true, false],
                    extras: vec![
                        DsVector3::from_slice([2.0, 0.0, 0.0]),
                        DsVector3::from_slice([3.0, 0.0, 0.0]),
                    ],
                }],
                scales: vec![],
            }],
        };

        let clip = build_clip(&anim).unwrap();
        assert_eq!(clip.locations[&2].frames, vec![0]);
        assert_eq!(clip.locations[&1].frames, vec![10, 11, 13]);
        assert_eq!(clip.locations[&1].values[2], [3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clip_rejects_non_increasing_frames() {
        use crate::anim::{ChannelTrack, InitialVector, KeyframeBlock};
        use crate::math::DsVector3;

        let anim = AnimFile {
            bone_count: 1,
            playback_rate: 24.0,
            initial_rotations: vec![],
            initial_locations: vec![InitialVector {
                bone_id: 0,
                value: DsVector3::from_slice([0.0, 0.0, 0.0]),
            }],
            initial_scales: vec![],
            blocks: vec![KeyframeBlock {
                cumulative_frame: 0,
                frame_span: 0,
                rotations: vec![],
                locations: vec![ChannelTrack {
                    bone_id: 0,
                    boundary: DsVector3::from_slice([1.0, 0.0, 0.0]),
                    mask: vec![],
                    extras: vec![],
                }],
                scales: vec![],
            }],
        };

        assert!(matches!(
            build_clip(&anim),
            Err(ModelError::Invariant { .. })
        ));
    }
}
