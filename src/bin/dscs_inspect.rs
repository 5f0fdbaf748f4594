use std::path::PathBuf;

use ptree::{print_tree, TreeBuilder};

use dscs_tools_lib::collated::{Bone, Model};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  dscs_inspect <model_path_stem> [--json <out.json>]");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  dscs_inspect ./data/models/chr001");
        eprintln!("  dscs_inspect ./data/models/chr001 --json chr001.json");
        std::process::exit(1);
    }

    let path_stem = PathBuf::from(&args[1]);

    let mut json_out: Option<PathBuf> = None;
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--json" {
            if let Some(val) = args.get(i + 1) {
                json_out = Some(PathBuf::from(val));
                i += 2;
            } else {
                eprintln!("--json requires an output path");
                std::process::exit(1);
            }
        } else {
            eprintln!("Unknown argument '{}'", args[i]);
            std::process::exit(1);
        }
    }

    eprintln!("Loading model '{}' ...", path_stem.display());
    let model = match Model::from_files(&path_stem) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Load failed: {}", e);
            std::process::exit(1);
        }
    };

    print_summary(&model);
    print_bone_tree(&model);

    if let Some(out) = json_out {
        if let Err(e) = dump_json(&model, &out) {
            eprintln!("JSON dump failed: {}", e);
            std::process::exit(1);
        }
        eprintln!("Wrote {}", out.display());
    }
}

fn print_summary(model: &Model) {
    println!("model: {}", model.name);
    println!("  bones: {}", model.skeleton.bone_count());
    println!("  meshes: {}", model.meshes.len());
    for (i, mesh) in model.meshes.iter().enumerate() {
        println!(
            "    mesh {}: {} vertices, {} polygons, material {}",
            i,
            mesh.positions.len(),
            mesh.polygons.len(),
            mesh.material_id
        );
    }
    println!("  materials: {}", model.materials.len());
    for material in &model.materials {
        println!("    {} (shader {})", material.name, material.shader_name);
    }
    println!("  textures: {}", model.textures.len());
    for texture in &model.textures {
        println!("    {} -> {}", texture.name, texture.path.display());
    }
    println!("  animations: {}", model.animations.len());
    for (name, clip) in &model.animations {
        println!(
            "    {}: {} rot / {} loc / {} scl curves at {} fps",
            name,
            clip.rotations.len(),
            clip.locations.len(),
            clip.scales.len(),
            clip.playback_rate
        );
    }
}

fn add_bone_to_tree(bone: &Bone, bones: &[Bone], tree: &mut TreeBuilder) {
    let children: Vec<&Bone> = bones
        .iter()
        .filter(|b| b.parent == bone.id as i32)
        .collect();
    if children.is_empty() {
        tree.add_empty_child(bone.name.clone());
    } else {
        tree.begin_child(bone.name.clone());
        for child in children {
            add_bone_to_tree(child, bones, tree);
        }
        tree.end_child();
    }
}

fn print_bone_tree(model: &Model) {
    let bones = &model.skeleton.bones;
    if bones.is_empty() {
        return;
    }
    let mut tree = TreeBuilder::new("bones".to_string());
    for bone in bones.iter().filter(|b| b.parent < 0) {
        add_bone_to_tree(bone, bones, &mut tree);
    }
    if let Err(e) = print_tree(&tree.build()) {
        eprintln!("Bone tree print failed: {}", e);
    }
}

fn dump_json(model: &Model, out: &PathBuf) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(model)?;
    std::fs::write(out, json)?;
    Ok(())
}
