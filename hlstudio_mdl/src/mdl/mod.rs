//! On-disk records of a studio model and borrowed, bounds-checked views over them.
//!
//! Every table is addressed by an absolute byte offset and an element count stored in the
//! header or in a parent record. Views validate the whole table before handing out elements.

use std::mem::size_of;

use zerocopy::FromBytes;

use crate::binary_utils::{parse, parse_slice};
use crate::{Error, Result};

pub const SIGNATURE: &[u8; 4] = b"IDST";
pub const VERSION: i32 = 10;

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct Header {
    id: [u8; 4],
    version: i32,
    pub name: [u8; 64],
    length: i32,

    pub eye_position: [f32; 3],
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],

    pub flags: i32,

    bone_count: i32,
    bone_offset: i32,

    bone_controller_count: i32,
    bone_controller_offset: i32,

    hit_box_count: i32,
    hit_box_offset: i32,

    sequence_count: i32,
    sequence_offset: i32,

    sequence_group_count: i32,
    sequence_group_offset: i32,

    texture_count: i32,
    texture_offset: i32,
    texture_data_offset: i32,

    skin_reference_count: i32,
    skin_family_count: i32,
    skin_offset: i32,

    body_part_count: i32,
    body_part_offset: i32,

    attachment_count: i32,
    attachment_offset: i32,

    sound_table: i32,
    sound_offset: i32,
    sound_group_count: i32,
    sound_group_offset: i32,

    transition_count: i32,
    transition_offset: i32,
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct Bone {
    pub name: [u8; 32],
    pub parent_bone_index: i32,
    flags: i32,
    pub bone_controller_indexes: [i32; 6],
    pub value: [f32; 6],
    pub scale: [f32; 6],
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct BoneController {
    pub bone_index: i32,
    pub kind: i32,
    pub start: f32,
    pub end: f32,
    pub rest: i32,
    pub index: i32,
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct SequenceDesc {
    pub label: [u8; 32],
    pub fps: f32,
    pub flags: i32,
    pub activity: i32,
    pub activity_weight: i32,
    event_count: i32,
    event_offset: i32,
    pub frame_count: i32,

    pivot_count: i32,
    pivot_offset: i32,

    motion_type: i32,
    motion_bone: i32,
    pub linear_movement: [f32; 3],
    automove_position_offset: i32,
    automove_angle_offset: i32,

    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],

    pub blend_count: i32,
    anim_offset: i32,

    pub blend_type: [i32; 2],
    pub blend_start: [f32; 2],
    pub blend_end: [f32; 2],
    blend_parent: i32,

    pub sequence_group: i32,

    entry_node: i32,
    exit_node: i32,
    node_flags: i32,

    pub next_sequence: i32,
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct Event {
    pub frame: i32,
    pub event: i32,
    pub kind: i32,
    pub options: [u8; 64],
}

/// Per-bone offsets into the run-length encoded value streams, relative to this record.
#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
struct Animation {
    offsets: [u16; 6],
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct BodyPart {
    pub name: [u8; 64],
    model_count: i32,
    pub base: i32,
    model_offset: i32,
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct Model {
    pub name: [u8; 64],
    pub kind: i32,
    pub bounding_radius: f32,

    mesh_count: i32,
    mesh_offset: i32,

    pub vertex_count: i32,
    vertex_info_offset: i32,
    vertex_offset: i32,
    pub normal_count: i32,
    normal_info_offset: i32,
    normal_offset: i32,

    group_count: i32,
    group_offset: i32,
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct Mesh {
    pub triangle_count: i32,
    triangle_offset: i32,
    pub skin_reference: i32,
    pub normal_count: i32,
    normal_offset: i32,
}

#[derive(Debug, PartialEq, FromBytes)]
#[repr(C)]
pub struct Texture {
    pub name: [u8; 64],
    pub flags: i32,
    pub width: i32,
    pub height: i32,
    index: i32,
}

/// Error messages of one table kind.
struct Table {
    negative: &'static str,
    out_of_bounds: &'static str,
}

const BONES: Table = Table {
    negative: "bone offset or count is negative",
    out_of_bounds: "bones out of bounds or misaligned",
};

const BONE_CONTROLLERS: Table = Table {
    negative: "bone controller offset or count is negative",
    out_of_bounds: "bone controllers out of bounds or misaligned",
};

const SEQUENCES: Table = Table {
    negative: "sequence offset or count is negative",
    out_of_bounds: "sequences out of bounds or misaligned",
};

const EVENTS: Table = Table {
    negative: "sequence event offset or count is negative",
    out_of_bounds: "sequence events out of bounds or misaligned",
};

const ANIMATIONS: Table = Table {
    negative: "sequence animation offset or blend count is negative",
    out_of_bounds: "sequence animations out of bounds or misaligned",
};

const TEXTURES: Table = Table {
    negative: "texture offset or count is negative",
    out_of_bounds: "textures out of bounds or misaligned",
};

const SKINS: Table = Table {
    negative: "skin offset or count is negative",
    out_of_bounds: "skin table out of bounds or misaligned",
};

const BODY_PARTS: Table = Table {
    negative: "body part offset or count is negative",
    out_of_bounds: "body parts out of bounds or misaligned",
};

const MODELS: Table = Table {
    negative: "body part model offset or count is negative",
    out_of_bounds: "body part models out of bounds or misaligned",
};

const MESHES: Table = Table {
    negative: "model mesh offset or count is negative",
    out_of_bounds: "model meshes out of bounds or misaligned",
};

fn corrupted(error: &'static str) -> Error {
    Error::Corrupted { error }
}

/// Validates `offset..offset + count * size_of::<T>()` against the buffer and returns it typed.
fn table<'a, T: FromBytes>(
    bytes: &'a [u8],
    offset: i32,
    count: i32,
    errors: &Table,
) -> Result<(&'a [T], usize)> {
    let offset: usize = offset.try_into().map_err(|_| corrupted(errors.negative))?;
    let count: usize = count.try_into().map_err(|_| corrupted(errors.negative))?;

    let end = count
        .checked_mul(size_of::<T>())
        .and_then(|len| len.checked_add(offset))
        .ok_or_else(|| corrupted(errors.out_of_bounds))?;

    if count > 0 && end > bytes.len() {
        return Err(corrupted(errors.out_of_bounds));
    }

    let items =
        parse_slice(bytes, offset, count).ok_or_else(|| corrupted(errors.out_of_bounds))?;

    Ok((items, offset))
}

pub fn check_signature(bytes: &[u8]) -> Result<()> {
    let signature = bytes.get(0..4).ok_or(Error::Corrupted {
        error: "eof reading signature",
    })?;

    if signature == SIGNATURE {
        Ok(())
    } else {
        Err(Error::InvalidSignature {
            signature: String::from_utf8_lossy(signature).into_owned(),
        })
    }
}

pub fn version(bytes: &[u8]) -> Result<i32> {
    let version = bytes.get(4..8).ok_or(Error::Corrupted {
        error: "eof reading version",
    })?;

    let mut buf = [0; 4];
    buf.copy_from_slice(version);

    Ok(i32::from_ne_bytes(buf))
}

pub fn check_version(bytes: &[u8]) -> Result<i32> {
    let version = version(bytes)?;

    if version == VERSION {
        Ok(version)
    } else {
        Err(Error::UnsupportedVersion { version })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderRef<'a> {
    header: &'a Header,
    bytes: &'a [u8],
}

impl<'a> HeaderRef<'a> {
    /// Expects an aligned buffer with a checked signature and version.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let header = parse::<Header>(bytes, 0).ok_or(Error::Corrupted {
            error: "eof reading header",
        })?;

        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &'a Header {
        self.header
    }

    pub fn bones(&self) -> Result<&'a [Bone]> {
        table(
            self.bytes,
            self.header.bone_offset,
            self.header.bone_count,
            &BONES,
        )
        .map(|(bones, _)| bones)
    }

    pub fn bone_controllers(&self) -> Result<&'a [BoneController]> {
        table(
            self.bytes,
            self.header.bone_controller_offset,
            self.header.bone_controller_count,
            &BONE_CONTROLLERS,
        )
        .map(|(controllers, _)| controllers)
    }

    pub fn iter_sequences(
        &self,
    ) -> Result<impl Iterator<Item = SequenceRef<'a>> + ExactSizeIterator> {
        let bytes = self.bytes;
        let (sequences, _) = table::<SequenceDesc>(
            bytes,
            self.header.sequence_offset,
            self.header.sequence_count,
            &SEQUENCES,
        )?;

        Ok(sequences
            .iter()
            .map(move |sequence| SequenceRef { sequence, bytes }))
    }

    pub fn textures(&self) -> Result<&'a [Texture]> {
        table(
            self.bytes,
            self.header.texture_offset,
            self.header.texture_count,
            &TEXTURES,
        )
        .map(|(textures, _)| textures)
    }

    pub fn skin_reference_count(&self) -> Result<usize> {
        self.header
            .skin_reference_count
            .try_into()
            .map_err(|_| corrupted(SKINS.negative))
    }

    /// Skin families, each `skin_reference_count` texture indices long.
    pub fn skin_families(&self) -> Result<impl Iterator<Item = &'a [i16]>> {
        let reference_count = self.skin_reference_count()?;
        let count = self
            .header
            .skin_family_count
            .checked_mul(self.header.skin_reference_count)
            .ok_or_else(|| corrupted(SKINS.out_of_bounds))?;

        let (skins, _) = table::<i16>(self.bytes, self.header.skin_offset, count, &SKINS)?;

        Ok(skins.chunks(reference_count.max(1)))
    }

    pub fn iter_body_parts(
        &self,
    ) -> Result<impl Iterator<Item = BodyPartRef<'a>> + ExactSizeIterator> {
        let bytes = self.bytes;
        let (body_parts, _) = table::<BodyPart>(
            bytes,
            self.header.body_part_offset,
            self.header.body_part_count,
            &BODY_PARTS,
        )?;

        Ok(body_parts
            .iter()
            .map(move |body_part| BodyPartRef { body_part, bytes }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceRef<'a> {
    sequence: &'a SequenceDesc,
    bytes: &'a [u8],
}

impl<'a> SequenceRef<'a> {
    pub fn desc(&self) -> &'a SequenceDesc {
        self.sequence
    }

    pub fn events(&self) -> Result<&'a [Event]> {
        table(
            self.bytes,
            self.sequence.event_offset,
            self.sequence.event_count,
            &EVENTS,
        )
        .map(|(events, _)| events)
    }

    /// Animation value channels of the first blend, or `None` if they live in an external
    /// sequence group file.
    pub fn animation(&self, bone_count: usize) -> Result<Option<AnimationRef<'a>>> {
        if self.sequence.sequence_group != 0 || self.sequence.anim_offset == 0 {
            return Ok(None);
        }

        let count = i32::try_from(bone_count).map_err(|_| corrupted(ANIMATIONS.out_of_bounds))?;
        let (records, offset) =
            table::<Animation>(self.bytes, self.sequence.anim_offset, count, &ANIMATIONS)?;

        Ok(Some(AnimationRef {
            records,
            offset,
            bytes: self.bytes,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnimationRef<'a> {
    records: &'a [Animation],
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> AnimationRef<'a> {
    /// Decodes channel `channel` (0..6) of `bone` into one raw value per frame.
    /// Returns `None` if the channel holds no data and the bone stays at rest.
    pub fn channel(
        &self,
        bone: usize,
        channel: usize,
        frame_count: usize,
    ) -> Result<Option<Vec<i16>>> {
        let record = self.records.get(bone).ok_or(Error::Corrupted {
            error: "animation bone index out of bounds",
        })?;
        let relative = *record.offsets.get(channel).ok_or(Error::Corrupted {
            error: "animation channel index out of bounds",
        })?;

        if relative == 0 {
            return Ok(None);
        }

        let start = self.offset + bone * size_of::<Animation>() + usize::from(relative);
        decode_runs(self.bytes, start, frame_count).map(Some)
    }
}

/// Expands a run-length encoded value stream. Each run starts with a `valid`, `total` byte pair
/// followed by `valid` values; frames past `valid` repeat the last stored value.
fn decode_runs(bytes: &[u8], mut offset: usize, frame_count: usize) -> Result<Vec<i16>> {
    let mut values = Vec::with_capacity(frame_count);

    while values.len() < frame_count {
        let header = bytes.get(offset..offset + 2).ok_or(Error::Corrupted {
            error: "animation value run out of bounds",
        })?;
        let valid = usize::from(header[0]);
        let total = usize::from(header[1]);

        if valid == 0 || total == 0 {
            return Err(Error::Corrupted {
                error: "animation value run is empty",
            });
        }

        let run = bytes
            .get(offset + 2..offset + 2 + valid * 2)
            .ok_or(Error::Corrupted {
                error: "animation values out of bounds",
            })?;

        for k in 0..total {
            if values.len() == frame_count {
                break;
            }

            let index = k.min(valid - 1) * 2;
            values.push(i16::from_ne_bytes([run[index], run[index + 1]]));
        }

        offset += 2 + valid * 2;
    }

    Ok(values)
}

#[derive(Debug, Clone, Copy)]
pub struct BodyPartRef<'a> {
    body_part: &'a BodyPart,
    bytes: &'a [u8],
}

impl<'a> BodyPartRef<'a> {
    pub fn body_part(&self) -> &'a BodyPart {
        self.body_part
    }

    pub fn iter_models(&self) -> Result<impl Iterator<Item = ModelRef<'a>> + ExactSizeIterator> {
        let bytes = self.bytes;
        let (models, _) = table::<Model>(
            bytes,
            self.body_part.model_offset,
            self.body_part.model_count,
            &MODELS,
        )?;

        Ok(models.iter().map(move |model| ModelRef { model, bytes }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRef<'a> {
    model: &'a Model,
    bytes: &'a [u8],
}

impl<'a> ModelRef<'a> {
    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn meshes(&self) -> Result<&'a [Mesh]> {
        table(
            self.bytes,
            self.model.mesh_offset,
            self.model.mesh_count,
            &MESHES,
        )
        .map(|(meshes, _)| meshes)
    }
}
