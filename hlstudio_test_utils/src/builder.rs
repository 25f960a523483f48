//! Writes studio model buffers in the on-disk layout, for tests.

use byteorder::{NativeEndian, WriteBytesExt};

pub const HEADER_SIZE: usize = 244;

/// Byte positions of header fields, for tests that corrupt a built buffer.
pub mod header_field {
    pub const VERSION: usize = 4;
    pub const BONE_COUNT: usize = 140;
    pub const BONE_OFFSET: usize = 144;
    pub const BONE_CONTROLLER_COUNT: usize = 148;
    pub const BONE_CONTROLLER_OFFSET: usize = 152;
    pub const SEQUENCE_COUNT: usize = 164;
    pub const SEQUENCE_OFFSET: usize = 168;
    pub const TEXTURE_COUNT: usize = 180;
    pub const TEXTURE_OFFSET: usize = 184;
    pub const SKIN_OFFSET: usize = 200;
    pub const BODY_PART_COUNT: usize = 204;
    pub const BODY_PART_OFFSET: usize = 208;
}

/// Byte positions of sequence record fields, relative to the record.
pub mod sequence_field {
    pub const SIZE: usize = 176;
    pub const EVENT_COUNT: usize = 48;
    pub const EVENT_OFFSET: usize = 52;
    pub const ANIM_OFFSET: usize = 124;
}

pub fn patch_i32(bytes: &mut [u8], offset: usize, value: i32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

pub fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[derive(Debug, Clone)]
pub struct BoneDef {
    pub name: String,
    pub parent: i32,
    pub controllers: [i32; 6],
    pub value: [f32; 6],
    pub scale: [f32; 6],
}

impl BoneDef {
    pub fn new(name: &str, parent: i32) -> Self {
        Self {
            name: name.to_owned(),
            parent,
            controllers: [-1; 6],
            value: [0.0; 6],
            scale: [1.0; 6],
        }
    }

    pub fn position(mut self, position: [f32; 3]) -> Self {
        self.value[..3].copy_from_slice(&position);
        self
    }

    pub fn rotation(mut self, rotation: [f32; 3]) -> Self {
        self.value[3..].copy_from_slice(&rotation);
        self
    }

    pub fn scale(mut self, scale: [f32; 6]) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ControllerDef {
    pub bone: i32,
    pub kind: i32,
    pub start: f32,
    pub end: f32,
    pub rest: i32,
    pub index: i32,
}

impl ControllerDef {
    pub fn new(index: i32, kind: i32, start: f32, end: f32) -> Self {
        Self {
            bone: 0,
            kind,
            start,
            end,
            rest: 0,
            index,
        }
    }

    pub fn rest(mut self, rest: i32) -> Self {
        self.rest = rest;
        self
    }

    pub fn bone(mut self, bone: i32) -> Self {
        self.bone = bone;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EventDef {
    pub frame: i32,
    pub event: i32,
    pub kind: i32,
    pub options: [u8; 64],
}

impl EventDef {
    pub fn new(frame: i32, event: i32) -> Self {
        Self {
            frame,
            event,
            kind: 0,
            options: [0; 64],
        }
    }

    pub fn options(mut self, options: &str) -> Self {
        self.options = [0; 64];
        self.options[..options.len()].copy_from_slice(options.as_bytes());
        self
    }

    pub fn raw_options(mut self, options: [u8; 64]) -> Self {
        self.options = options;
        self
    }

    pub fn kind(mut self, kind: i32) -> Self {
        self.kind = kind;
        self
    }
}

/// One run of an animation value stream: `values` are stored, the last one repeats
/// until `total` frames are covered.
#[derive(Debug, Clone)]
pub struct AnimRun {
    pub values: Vec<i16>,
    pub total: u8,
}

/// Encodes every value explicitly, in runs of at most 255 frames.
pub fn runs_from_values(values: &[i16]) -> Vec<AnimRun> {
    values
        .chunks(255)
        .map(|chunk| AnimRun {
            values: chunk.to_vec(),
            total: chunk.len() as u8,
        })
        .collect()
}

/// Animation channels of one bone: x, y, z position then x, y, z rotation.
pub type BoneChannels = [Option<Vec<AnimRun>>; 6];

#[derive(Debug, Clone)]
pub struct SequenceDef {
    pub name: String,
    pub fps: f32,
    pub flags: i32,
    pub activity: i32,
    pub activity_weight: i32,
    pub frame_count: i32,
    pub events: Vec<EventDef>,
    pub linear_movement: [f32; 3],
    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],
    pub blend_type: [i32; 2],
    pub blend_start: [f32; 2],
    pub blend_end: [f32; 2],
    pub sequence_group: i32,
    pub animation: Option<Vec<BoneChannels>>,
}

impl SequenceDef {
    pub fn new(name: &str, fps: f32, frame_count: i32) -> Self {
        Self {
            name: name.to_owned(),
            fps,
            flags: 0,
            activity: 0,
            activity_weight: 0,
            frame_count,
            events: Vec::new(),
            linear_movement: [0.0; 3],
            bb_min: [0.0; 3],
            bb_max: [0.0; 3],
            blend_type: [0; 2],
            blend_start: [0.0; 2],
            blend_end: [0.0; 2],
            sequence_group: 0,
            animation: None,
        }
    }

    pub fn looping(mut self) -> Self {
        self.flags |= 1;
        self
    }

    pub fn activity(mut self, activity: i32, weight: i32) -> Self {
        self.activity = activity;
        self.activity_weight = weight;
        self
    }

    pub fn event(mut self, event: EventDef) -> Self {
        self.events.push(event);
        self
    }

    pub fn bounds(mut self, min: [f32; 3], max: [f32; 3]) -> Self {
        self.bb_min = min;
        self.bb_max = max;
        self
    }

    pub fn linear_movement(mut self, movement: [f32; 3]) -> Self {
        self.linear_movement = movement;
        self
    }

    pub fn blend(mut self, axis: usize, kind: i32, start: f32, end: f32) -> Self {
        self.blend_type[axis] = kind;
        self.blend_start[axis] = start;
        self.blend_end[axis] = end;
        self
    }

    pub fn animation(mut self, bones: Vec<BoneChannels>) -> Self {
        self.animation = Some(bones);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TextureDef {
    pub name: String,
    pub flags: i32,
    pub width: i32,
    pub height: i32,
}

impl TextureDef {
    pub fn new(name: &str, flags: i32) -> Self {
        Self {
            name: name.to_owned(),
            flags,
            width: 64,
            height: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub mesh_skin_refs: Vec<i32>,
}

impl ModelDef {
    pub fn new(name: &str, mesh_skin_refs: &[i32]) -> Self {
        Self {
            name: name.to_owned(),
            mesh_skin_refs: mesh_skin_refs.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyPartDef {
    pub name: String,
    pub base: i32,
    pub models: Vec<ModelDef>,
}

impl BodyPartDef {
    pub fn new(name: &str, base: i32, models: Vec<ModelDef>) -> Self {
        Self {
            name: name.to_owned(),
            base,
            models,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelBuilder {
    pub magic: [u8; 4],
    pub version: i32,
    pub name: String,
    pub flags: i32,
    pub eye_position: [f32; 3],
    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],
    pub bones: Vec<BoneDef>,
    pub controllers: Vec<ControllerDef>,
    pub sequences: Vec<SequenceDef>,
    pub textures: Vec<TextureDef>,
    pub skin_ref_count: i32,
    pub skins: Vec<Vec<i16>>,
    pub body_parts: Vec<BodyPartDef>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self {
            magic: *b"IDST",
            version: 10,
            name: "test.mdl".to_owned(),
            flags: 0,
            eye_position: [0.0; 3],
            bb_min: [0.0; 3],
            bb_max: [0.0; 3],
            bones: Vec::new(),
            controllers: Vec::new(),
            sequences: Vec::new(),
            textures: Vec::new(),
            skin_ref_count: 0,
            skins: Vec::new(),
            body_parts: Vec::new(),
        }
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bone(mut self, bone: BoneDef) -> Self {
        self.bones.push(bone);
        self
    }

    pub fn controller(mut self, controller: ControllerDef) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn sequence(mut self, sequence: SequenceDef) -> Self {
        self.sequences.push(sequence);
        self
    }

    pub fn texture(mut self, texture: TextureDef) -> Self {
        self.textures.push(texture);
        self
    }

    /// Adds a skin family; every family must have the same length.
    pub fn skin_family(mut self, family: &[i16]) -> Self {
        self.skin_ref_count = family.len() as i32;
        self.skins.push(family.to_vec());
        self
    }

    pub fn body_part(mut self, body_part: BodyPartDef) -> Self {
        self.body_parts.push(body_part);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0; HEADER_SIZE];

        align(&mut out);
        let bone_offset = out.len();
        for bone in &self.bones {
            write_name(&mut out, &bone.name, 32);
            write_i32(&mut out, bone.parent);
            write_i32(&mut out, 0);
            bone.controllers.iter().for_each(|&c| write_i32(&mut out, c));
            bone.value.iter().for_each(|&v| write_f32(&mut out, v));
            bone.scale.iter().for_each(|&v| write_f32(&mut out, v));
        }

        align(&mut out);
        let controller_offset = out.len();
        for controller in &self.controllers {
            write_i32(&mut out, controller.bone);
            write_i32(&mut out, controller.kind);
            write_f32(&mut out, controller.start);
            write_f32(&mut out, controller.end);
            write_i32(&mut out, controller.rest);
            write_i32(&mut out, controller.index);
        }

        align(&mut out);
        let sequence_offset = out.len();
        for sequence in &self.sequences {
            write_sequence(&mut out, sequence);
        }

        for (i, sequence) in self.sequences.iter().enumerate() {
            let record = sequence_offset + i * sequence_field::SIZE;

            if !sequence.events.is_empty() {
                align(&mut out);
                let events_offset = out.len() as i32;
                patch_i32(&mut out, record + sequence_field::EVENT_OFFSET, events_offset);

                for event in &sequence.events {
                    write_i32(&mut out, event.frame);
                    write_i32(&mut out, event.event);
                    write_i32(&mut out, event.kind);
                    out.extend_from_slice(&event.options);
                }
            }

            if let Some(animation) = &sequence.animation {
                align(&mut out);
                let anim_offset = out.len();
                patch_i32(&mut out, record + sequence_field::ANIM_OFFSET, anim_offset as i32);
                write_animation(&mut out, anim_offset, animation);
            }
        }

        align(&mut out);
        let texture_offset = out.len();
        for texture in &self.textures {
            write_name(&mut out, &texture.name, 64);
            write_i32(&mut out, texture.flags);
            write_i32(&mut out, texture.width);
            write_i32(&mut out, texture.height);
            write_i32(&mut out, 0);
        }

        align(&mut out);
        let skin_offset = out.len();
        for family in &self.skins {
            for &texture in family {
                out.write_i16::<NativeEndian>(texture).unwrap();
            }
        }

        align(&mut out);
        let body_part_offset = out.len();
        for body_part in &self.body_parts {
            write_name(&mut out, &body_part.name, 64);
            write_i32(&mut out, body_part.models.len() as i32);
            write_i32(&mut out, body_part.base);
            write_i32(&mut out, 0);
        }

        for (i, body_part) in self.body_parts.iter().enumerate() {
            align(&mut out);
            let model_offset = out.len();
            patch_i32(&mut out, body_part_offset + i * 76 + 72, model_offset as i32);

            for model in &body_part.models {
                write_name(&mut out, &model.name, 64);
                write_i32(&mut out, 0);
                write_f32(&mut out, 0.0);
                write_i32(&mut out, model.mesh_skin_refs.len() as i32);
                // mesh offset, patched below, then vertex and normal tables
                for _ in 0..9 {
                    write_i32(&mut out, 0);
                }
            }

            for (j, model) in body_part.models.iter().enumerate() {
                align(&mut out);
                let mesh_offset = out.len();
                patch_i32(&mut out, model_offset + j * 112 + 76, mesh_offset as i32);

                for &skin_ref in &model.mesh_skin_refs {
                    write_i32(&mut out, 1);
                    write_i32(&mut out, 0);
                    write_i32(&mut out, skin_ref);
                    write_i32(&mut out, 0);
                    write_i32(&mut out, 0);
                }
            }
        }

        let length = out.len() as i32;

        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(&self.magic);
        write_i32(&mut header, self.version);
        write_name(&mut header, &self.name, 64);
        write_i32(&mut header, length);
        write_vec3(&mut header, self.eye_position);
        write_vec3(&mut header, [0.0; 3]);
        write_vec3(&mut header, [0.0; 3]);
        write_vec3(&mut header, self.bb_min);
        write_vec3(&mut header, self.bb_max);
        write_i32(&mut header, self.flags);

        let tables = [
            (self.bones.len(), bone_offset),
            (self.controllers.len(), controller_offset),
            (0, 0),
            (self.sequences.len(), sequence_offset),
            (0, 0),
        ];
        for (count, offset) in tables {
            write_i32(&mut header, count as i32);
            write_i32(&mut header, offset as i32);
        }

        write_i32(&mut header, self.textures.len() as i32);
        write_i32(&mut header, texture_offset as i32);
        write_i32(&mut header, 0);

        write_i32(&mut header, self.skin_ref_count);
        write_i32(&mut header, self.skins.len() as i32);
        write_i32(&mut header, skin_offset as i32);

        write_i32(&mut header, self.body_parts.len() as i32);
        write_i32(&mut header, body_part_offset as i32);

        // attachments, sounds, sound groups, transitions
        for _ in 0..8 {
            write_i32(&mut header, 0);
        }

        assert_eq!(header.len(), HEADER_SIZE);
        out[..HEADER_SIZE].copy_from_slice(&header);

        out
    }
}

fn write_sequence(out: &mut Vec<u8>, sequence: &SequenceDef) {
    write_name(out, &sequence.name, 32);
    write_f32(out, sequence.fps);
    write_i32(out, sequence.flags);
    write_i32(out, sequence.activity);
    write_i32(out, sequence.activity_weight);
    write_i32(out, sequence.events.len() as i32);
    write_i32(out, 0);
    write_i32(out, sequence.frame_count);
    // pivots, motion type, motion bone
    for _ in 0..4 {
        write_i32(out, 0);
    }
    write_vec3(out, sequence.linear_movement);
    write_i32(out, 0);
    write_i32(out, 0);
    write_vec3(out, sequence.bb_min);
    write_vec3(out, sequence.bb_max);
    write_i32(out, 1);
    write_i32(out, 0);
    sequence.blend_type.iter().for_each(|&t| write_i32(out, t));
    sequence.blend_start.iter().for_each(|&v| write_f32(out, v));
    sequence.blend_end.iter().for_each(|&v| write_f32(out, v));
    write_i32(out, 0);
    write_i32(out, sequence.sequence_group);
    // entry node, exit node, node flags, next sequence
    for _ in 0..4 {
        write_i32(out, 0);
    }
}

fn write_animation(out: &mut Vec<u8>, anim_offset: usize, bones: &[BoneChannels]) {
    let records_len = bones.len() * 12;
    out.resize(anim_offset + records_len, 0);

    for (bone, channels) in bones.iter().enumerate() {
        let record = anim_offset + bone * 12;

        for (channel, runs) in channels.iter().enumerate() {
            let Some(runs) = runs else {
                continue;
            };

            let relative = u16::try_from(out.len() - record).expect("animation too large");
            let field = record + channel * 2;
            out[field..field + 2].copy_from_slice(&relative.to_ne_bytes());

            for run in runs {
                out.push(run.values.len() as u8);
                out.push(run.total);
                for &value in &run.values {
                    out.write_i16::<NativeEndian>(value).unwrap();
                }
            }
        }
    }
}

fn align(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.write_i32::<NativeEndian>(value).unwrap();
}

fn write_f32(out: &mut Vec<u8>, value: f32) {
    out.write_f32::<NativeEndian>(value).unwrap();
}

fn write_vec3(out: &mut Vec<u8>, value: [f32; 3]) {
    value.iter().for_each(|&v| write_f32(out, v));
}

fn write_name(out: &mut Vec<u8>, name: &str, len: usize) {
    let start = out.len();
    out.extend_from_slice(name.as_bytes());
    out.resize(start + len, 0);
}
