use std::{error::Error, path::PathBuf};

use clap::Parser;

use hlstudio_mdl::{activity, sorting};

use crate::read_asset;

#[derive(Parser)]
pub struct Inspect {
    /// Path of the model file
    path: PathBuf,
    /// List the events of every sequence
    #[clap(short, long)]
    events: bool,
    /// Skin family used for the draw order
    #[clap(short, long, default_value = "0")]
    skin: usize,
    /// Packed body value used for the draw order
    #[clap(short, long, default_value = "0")]
    body: usize,
}

pub fn inspect(opts: &Inspect) -> Result<(), Box<dyn Error>> {
    let asset = read_asset(&opts.path)?;

    println!("name: {}", asset.name());
    println!("flags: {:?}", asset.flags());
    println!("eye position: {}", asset.eye_position());
    println!("hull: {} {}", asset.hull().mins, asset.hull().maxs);

    println!("bones: {}", asset.bones().len());
    for (i, bone) in asset.bones().iter().enumerate() {
        match bone.parent {
            Some(parent) => println!("  {i}: {} (parent {parent})", bone.name),
            None => println!("  {i}: {}", bone.name),
        }
    }

    println!("bone controllers: {}", asset.bone_controllers().len());
    for controller in asset.bone_controllers() {
        println!(
            "  slot {}: {:?} {} to {}, rest {}",
            controller.index, controller.kind, controller.start, controller.end, controller.rest
        );
    }

    println!("sequences: {}", asset.sequences().len());
    for (i, sequence) in asset.sequences().iter().enumerate() {
        println!(
            "  {i}: {} ({} frames at {} fps{}), activity {} ({}), {} events",
            sequence.name,
            sequence.frame_count,
            sequence.frame_rate,
            if sequence.is_looping() { ", looping" } else { "" },
            activity::describe(sequence.activity),
            sequence.activity,
            sequence.events.len(),
        );

        for err in &sequence.malformed_events {
            println!("    skipped: {err}");
        }

        for (axis, blend) in sequence.blends.iter().enumerate() {
            if blend.is_used() {
                println!(
                    "    blend {axis}: {:?} {} to {}",
                    blend.kind, blend.start, blend.end
                );
            }
        }

        if opts.events {
            for event in &sequence.events {
                println!(
                    "    frame {}: event {}{} `{}`",
                    event.frame,
                    event.code,
                    if event.is_client() { " (client)" } else { "" },
                    event.options
                );
            }
        }
    }

    println!("body parts: {}", asset.body_parts().len());
    for body_part in asset.body_parts() {
        println!("  {} (base {})", body_part.name, body_part.base);
        for (i, model) in body_part.models.iter().enumerate() {
            println!("    {i}: {} ({} meshes)", model.name, model.meshes.len());
        }
    }

    println!("textures: {}", asset.textures().len());
    for (i, texture) in asset.textures().iter().enumerate() {
        println!(
            "  {i}: {} {}x{} {:?}",
            texture.name, texture.width, texture.height, texture.flags
        );
    }

    println!("skin families: {}", asset.skin_families().len());
    for (i, family) in asset.skin_families().iter().enumerate() {
        println!("  {i}: {family:?}");
    }

    println!("draw order (body {}, skin {}):", opts.body, opts.skin);
    for fragment in sorting::sorted(&asset, opts.body, opts.skin) {
        let texture = fragment
            .texture
            .and_then(|texture| asset.textures().get(texture))
            .map_or("?", |texture| texture.name.as_str());

        println!(
            "  body part {} model {} mesh {}: {texture} ({:?})",
            fragment.body_part, fragment.model, fragment.mesh, fragment.class
        );
    }

    Ok(())
}
