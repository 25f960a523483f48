use std::{io::Read, str};

use bitflags::bitflags;
use glam::Vec3;
use itertools::Itertools;
use maligned::A4;

use crate::{
    activity,
    binary_utils::{copy_aligned, fixed_name, null_terminated_prefix, read_aligned},
    bounds::Bounds,
    controller::MOUTH_CONTROLLER,
    events::CLIENT_EVENT_START,
    frame::Playback,
    mdl::{self, HeaderRef, SequenceRef},
    Error, Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModelFlags: i32 {
        const ROCKET = 1 << 0;
        const GRENADE = 1 << 1;
        const GIB = 1 << 2;
        const ROTATE = 1 << 3;
        const TRACER = 1 << 4;
        const ZOMBIE_GIB = 1 << 5;
        const TRACER_2 = 1 << 6;
        const TRACER_3 = 1 << 7;
        const NO_SHADE_LIGHT = 1 << 8;
        const HITBOX_COLLISIONS = 1 << 9;
        const FORCE_SKYLIGHT = 1 << 10;
    }
}

bitflags! {
    /// Motion type of a bone controller or blend axis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MotionFlags: i32 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const XR = 1 << 3;
        const YR = 1 << 4;
        const ZR = 1 << 5;
        const LX = 1 << 6;
        const LY = 1 << 7;
        const LZ = 1 << 8;
        const AX = 1 << 9;
        const AY = 1 << 10;
        const AZ = 1 << 11;
        const AXR = 1 << 12;
        const AYR = 1 << 13;
        const AZR = 1 << 14;
        const RLOOP = 1 << 15;
    }
}

impl MotionFlags {
    #[must_use]
    pub fn is_rotation(self) -> bool {
        self.intersects(Self::XR | Self::YR | Self::ZR)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SequenceFlags: i32 {
        const LOOPING = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: i32 {
        const FLAT_SHADE = 1 << 0;
        const CHROME = 1 << 1;
        const FULLBRIGHT = 1 << 2;
        const NO_MIPS = 1 << 3;
        const ALPHA = 1 << 4;
        const ADDITIVE = 1 << 5;
        const MASKED = 1 << 6;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    /// Bone controller driving each of the six channels, if any.
    pub controllers: [Option<usize>; 6],
    /// Rest position followed by rest rotation (euler angles, radians).
    pub value: [f32; 6],
    pub scale: [f32; 6],
}

impl Bone {
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.value[0], self.value[1], self.value[2])
    }

    #[must_use]
    pub fn rotation(&self) -> Vec3 {
        Vec3::new(self.value[3], self.value[4], self.value[5])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneController {
    pub bone: Option<usize>,
    pub kind: MotionFlags,
    pub start: f32,
    pub end: f32,
    pub rest: u8,
    /// Controller slot; `0..4` are regular controllers, `4` is the mouth.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub frame: i32,
    pub code: i32,
    pub kind: i32,
    pub options: String,
}

impl Event {
    /// Client events only affect presentation (sounds, muzzle flashes, ...).
    #[must_use]
    pub fn is_client(&self) -> bool {
        self.code >= CLIENT_EVENT_START
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendAxis {
    pub kind: MotionFlags,
    pub start: f32,
    pub end: f32,
}

impl BlendAxis {
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.kind.bits() != 0
    }
}

/// Animated values of one bone, indexed by frame. Channels without data keep the rest value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    pub channels: [Option<Vec<f32>>; 6],
}

impl BoneTrack {
    #[must_use]
    pub fn value(&self, bone: &Bone, channel: usize, frame: usize) -> f32 {
        self.channels
            .get(channel)
            .and_then(Option::as_ref)
            .and_then(|values| values.get(frame))
            .copied()
            .or_else(|| bone.value.get(channel).copied())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceAnimation {
    pub bones: Vec<BoneTrack>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: String,
    pub frame_rate: f32,
    pub flags: SequenceFlags,
    pub activity: i32,
    pub activity_weight: i32,
    pub frame_count: usize,
    /// Sorted by frame, stable with respect to file order.
    pub events: Vec<Event>,
    /// Event records dropped while decoding because they could not be read.
    pub malformed_events: Vec<Error>,
    pub linear_movement: Vec3,
    pub bounds: Bounds,
    pub blend_count: usize,
    pub blends: [BlendAxis; 2],
    pub group: usize,
    pub next_sequence: usize,
    /// First blend of the animation, when stored in the model itself.
    pub animation: Option<SequenceAnimation>,
}

impl Sequence {
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.flags.contains(SequenceFlags::LOOPING)
    }

    #[must_use]
    pub fn playback(&self, looping: bool) -> Playback {
        Playback {
            frame_rate: self.frame_rate,
            frame_count: self.frame_count,
            looping,
        }
    }

    #[must_use]
    pub fn activity_name(&self) -> Option<&'static str> {
        activity::name(self.activity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    pub skin_reference: usize,
    pub triangle_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    pub name: String,
    /// Stride of this body part's digit in the packed body value.
    pub base: usize,
    pub models: Vec<Model>,
}

impl BodyPart {
    /// Index of the submodel selected by the packed `body` value.
    #[must_use]
    pub fn model_index(&self, body: usize) -> usize {
        if self.models.is_empty() || self.base == 0 {
            return 0;
        }

        (body / self.base) % self.models.len()
    }

    /// `body` with this body part's digit replaced by `model`, other body parts unchanged.
    #[must_use]
    pub fn with_model(&self, body: usize, model: usize) -> usize {
        body - self.model_index(body) * self.base + model * self.base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub name: String,
    pub flags: TextureFlags,
    pub width: u32,
    pub height: u32,
}

/// A decoded studio model. Immutable once decoded; share it with `Arc` between states.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    name: String,
    flags: ModelFlags,
    eye_position: Vec3,
    hull: Bounds,
    clipping: Bounds,
    bones: Vec<Bone>,
    bone_controllers: Vec<BoneController>,
    sequences: Vec<Sequence>,
    body_parts: Vec<BodyPart>,
    textures: Vec<Texture>,
    skin_families: Vec<Vec<usize>>,
}

impl Asset {
    /// # Errors
    ///
    /// Returns `Err` if the buffer is not a version 10 studio model or if any table is out of
    /// bounds or inconsistent.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        mdl::check_signature(bytes)?;
        mdl::check_version(bytes)?;

        let bytes = copy_aligned::<A4>(bytes);
        Self::decode_aligned(&bytes)
    }

    /// # Errors
    ///
    /// Returns `Err` if reading fails or the data can't be decoded, see [`Asset::decode`].
    pub fn read(reader: impl Read) -> Result<Self> {
        let bytes = read_aligned::<A4>(reader)?;

        mdl::check_signature(&bytes)?;
        mdl::check_version(&bytes)?;

        Self::decode_aligned(&bytes)
    }

    fn decode_aligned(bytes: &[u8]) -> Result<Self> {
        let header_ref = HeaderRef::new(bytes)?;
        let header = header_ref.header();

        let bone_controllers: Vec<_> = header_ref
            .bone_controllers()?
            .iter()
            .map(decode_bone_controller)
            .try_collect()?;

        let bones = decode_bones(header_ref.bones()?, bone_controllers.len())?;

        for controller in &bone_controllers {
            if controller.bone.map_or(false, |bone| bone >= bones.len()) {
                return Err(Error::Corrupted {
                    error: "bone controller bone index out of bounds",
                });
            }
        }

        let textures: Vec<_> = header_ref
            .textures()?
            .iter()
            .map(|texture| Texture {
                name: fixed_name(&texture.name).into_owned(),
                flags: TextureFlags::from_bits_retain(texture.flags),
                width: texture.width.max(0) as u32,
                height: texture.height.max(0) as u32,
            })
            .collect();

        let skin_families: Vec<Vec<usize>> = header_ref
            .skin_families()?
            .map(|family| {
                family
                    .iter()
                    .map(|&texture| decode_skin_entry(texture, textures.len()))
                    .try_collect::<_, Vec<_>, _>()
            })
            .try_collect()?;

        let sequences: Vec<_> = header_ref
            .iter_sequences()?
            .map(|sequence| decode_sequence(sequence, &bones))
            .try_collect()?;

        let body_parts: Vec<_> = header_ref
            .iter_body_parts()?
            .map(decode_body_part)
            .try_collect()?;

        Ok(Self {
            name: fixed_name(&header.name).into_owned(),
            flags: ModelFlags::from_bits_retain(header.flags),
            eye_position: Vec3::from(header.eye_position),
            hull: Bounds::new(Vec3::from(header.min), Vec3::from(header.max)),
            clipping: Bounds::new(Vec3::from(header.bb_min), Vec3::from(header.bb_max)),
            bones,
            bone_controllers,
            sequences,
            body_parts,
            textures,
            skin_families,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn flags(&self) -> ModelFlags {
        self.flags
    }

    #[must_use]
    pub fn eye_position(&self) -> Vec3 {
        self.eye_position
    }

    /// Movement hull stored in the header.
    #[must_use]
    pub fn hull(&self) -> Bounds {
        self.hull
    }

    /// Clipping box stored in the header.
    #[must_use]
    pub fn clipping_bounds(&self) -> Bounds {
        self.clipping
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[must_use]
    pub fn bone_controllers(&self) -> &[BoneController] {
        &self.bone_controllers
    }

    /// The bone controller assigned to controller slot `index`.
    #[must_use]
    pub fn bone_controller(&self, index: usize) -> Option<&BoneController> {
        self.bone_controllers
            .iter()
            .find(|controller| controller.index == index)
    }

    #[must_use]
    pub fn mouth_controller(&self) -> Option<&BoneController> {
        self.bone_controller(MOUTH_CONTROLLER)
    }

    #[must_use]
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    #[must_use]
    pub fn sequence(&self, index: usize) -> Option<&Sequence> {
        self.sequences.get(index)
    }

    #[must_use]
    pub fn find_sequence(&self, name: &str) -> Option<usize> {
        self.sequences
            .iter()
            .position(|sequence| sequence.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn body_parts(&self) -> &[BodyPart] {
        &self.body_parts
    }

    #[must_use]
    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    #[must_use]
    pub fn skin_families(&self) -> &[Vec<usize>] {
        &self.skin_families
    }

    /// Texture used by a mesh's skin reference in skin family `skin`.
    #[must_use]
    pub fn texture_index(&self, skin: usize, skin_reference: usize) -> Option<usize> {
        self.skin_families
            .get(skin)
            .and_then(|family| family.get(skin_reference))
            .copied()
    }
}

fn decode_bone_controller(controller: &mdl::BoneController) -> Result<BoneController> {
    let index: usize = controller
        .index
        .try_into()
        .ok()
        .filter(|&index| index <= MOUTH_CONTROLLER)
        .ok_or(Error::Corrupted {
            error: "bone controller index out of range",
        })?;

    Ok(BoneController {
        bone: controller.bone_index.try_into().ok(),
        kind: MotionFlags::from_bits_retain(controller.kind),
        start: controller.start,
        end: controller.end,
        rest: controller.rest.clamp(0, 255) as u8,
        index,
    })
}

fn decode_bones(bones: &[mdl::Bone], controller_count: usize) -> Result<Vec<Bone>> {
    bones
        .iter()
        .enumerate()
        .map(|(i, bone)| {
            let parent = match usize::try_from(bone.parent_bone_index) {
                // parents always precede their children
                Ok(parent) if parent < i => Some(parent),
                Ok(_) => {
                    return Err(Error::Corrupted {
                        error: "bone parent index out of bounds",
                    })
                }
                Err(_) => None,
            };

            let mut controllers = [None; 6];
            for (slot, &index) in controllers.iter_mut().zip(&bone.bone_controller_indexes) {
                *slot = match usize::try_from(index) {
                    Ok(index) if index < controller_count => Some(index),
                    Ok(_) => {
                        return Err(Error::Corrupted {
                            error: "bone controller reference out of bounds",
                        })
                    }
                    Err(_) => None,
                };
            }

            Ok(Bone {
                name: fixed_name(&bone.name).into_owned(),
                parent,
                controllers,
                value: bone.value,
                scale: bone.scale,
            })
        })
        .try_collect()
}

fn decode_skin_entry(texture: i16, texture_count: usize) -> Result<usize> {
    let texture = usize::try_from(texture).map_err(|_| Error::Corrupted {
        error: "skin texture index is negative",
    })?;

    // textures may live in a separate texture model, in which case the table is empty
    if texture_count > 0 && texture >= texture_count {
        return Err(Error::Corrupted {
            error: "skin texture index out of bounds",
        });
    }

    Ok(texture)
}

fn decode_sequence(sequence: SequenceRef, bones: &[Bone]) -> Result<Sequence> {
    let desc = sequence.desc();
    let name = fixed_name(&desc.label).into_owned();

    let frame_count = usize::try_from(desc.frame_count).map_err(|_| Error::Corrupted {
        error: "sequence frame count is negative",
    })?;

    if !desc.fps.is_finite() {
        return Err(Error::Corrupted {
            error: "sequence frame rate is not finite",
        });
    }

    let records = sequence.events()?;
    let mut events = Vec::with_capacity(records.len());
    let mut malformed_events = Vec::new();
    for (index, record) in records.iter().enumerate() {
        // unreadable events are dropped, the rest of the sequence stays usable
        match decode_event(&name, index, record) {
            Ok(event) => events.push(event),
            Err(err) => malformed_events.push(err),
        }
    }
    events.sort_by_key(|event| event.frame);

    let animation = if frame_count > 0 {
        decode_animation(sequence, bones, frame_count)?
    } else {
        None
    };

    let blend = |axis: usize| BlendAxis {
        kind: MotionFlags::from_bits_retain(desc.blend_type[axis]),
        start: desc.blend_start[axis],
        end: desc.blend_end[axis],
    };

    Ok(Sequence {
        frame_rate: desc.fps,
        flags: SequenceFlags::from_bits_retain(desc.flags),
        activity: desc.activity,
        activity_weight: desc.activity_weight,
        frame_count,
        events,
        malformed_events,
        linear_movement: Vec3::from(desc.linear_movement),
        bounds: Bounds::new(Vec3::from(desc.bb_min), Vec3::from(desc.bb_max)),
        blend_count: desc.blend_count.max(1) as usize,
        blends: [blend(0), blend(1)],
        group: desc.sequence_group.max(0) as usize,
        next_sequence: desc.next_sequence.max(0) as usize,
        animation,
        name,
    })
}

fn decode_event(sequence: &str, index: usize, event: &mdl::Event) -> Result<Event> {
    let malformed = |error| Error::MalformedEvent {
        sequence: sequence.to_owned(),
        index,
        error,
    };

    if event.frame < 0 {
        return Err(malformed("frame is negative"));
    }

    let options = null_terminated_prefix(&event.options)
        .ok_or_else(|| malformed("options are not nul terminated"))?;
    let options = str::from_utf8(options).map_err(|_| malformed("options are not utf-8"))?;

    Ok(Event {
        frame: event.frame,
        code: event.event,
        kind: event.kind,
        options: options.to_owned(),
    })
}

fn decode_animation(
    sequence: SequenceRef,
    bones: &[Bone],
    frame_count: usize,
) -> Result<Option<SequenceAnimation>> {
    let Some(animation) = sequence.animation(bones.len())? else {
        return Ok(None);
    };

    let tracks = bones
        .iter()
        .enumerate()
        .map(|(i, bone)| {
            let mut channels: [Option<Vec<f32>>; 6] = Default::default();

            for (channel, slot) in channels.iter_mut().enumerate() {
                *slot = animation.channel(i, channel, frame_count)?.map(|raw| {
                    raw.into_iter()
                        .map(|value| bone.value[channel] + f32::from(value) * bone.scale[channel])
                        .collect()
                });
            }

            Ok::<_, Error>(BoneTrack { channels })
        })
        .try_collect()?;

    Ok(Some(SequenceAnimation { bones: tracks }))
}

fn decode_body_part(body_part: mdl::BodyPartRef) -> Result<BodyPart> {
    let raw = body_part.body_part();

    let base = usize::try_from(raw.base)
        .ok()
        .filter(|&base| base > 0)
        .ok_or(Error::Corrupted {
            error: "body part base is not positive",
        })?;

    let models = body_part
        .iter_models()?
        .map(|model| {
            let meshes = model
                .meshes()?
                .iter()
                .map(|mesh| {
                    Ok::<_, Error>(Mesh {
                        skin_reference: usize::try_from(mesh.skin_reference).map_err(|_| {
                            Error::Corrupted {
                                error: "mesh skin reference is negative",
                            }
                        })?,
                        triangle_count: mesh.triangle_count.max(0) as usize,
                    })
                })
                .try_collect()?;

            Ok::<_, Error>(Model {
                name: fixed_name(&model.model().name).into_owned(),
                meshes,
            })
        })
        .try_collect()?;

    Ok(BodyPart {
        name: fixed_name(&raw.name).into_owned(),
        base,
        models,
    })
}
