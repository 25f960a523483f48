use std::{fs::File, io::Cursor, sync::Arc};

use approx::assert_relative_eq;
use glam::Vec3;
use serde::Deserialize;

use hlstudio_mdl::{
    activity, AnimationState, Asset, Error, Event, LoopingMode, MotionFlags, RenderClass,
    Settings, TextureFlags,
};
use hlstudio_test_utils::{
    header_field, patch_i32, read_i32, AnimRun, BodyPartDef, BoneDef, ControllerDef, EventDef,
    FileSpec, ModelBuilder, ModelDef, SequenceDef, TextureDef,
};

fn walk_channels() -> [Option<Vec<AnimRun>>; 6] {
    [
        Some(vec![
            AnimRun {
                values: vec![0, 10],
                total: 2,
            },
            AnimRun {
                values: vec![20],
                total: 3,
            },
        ]),
        None,
        None,
        None,
        None,
        None,
    ]
}

fn scientist() -> ModelBuilder {
    let mut no_terminator = [b'x'; 64];
    no_terminator[0] = b'a';

    ModelBuilder::new()
        .bone(
            BoneDef::new("Bip01", -1)
                .position([1.0, 0.0, 0.0])
                .scale([0.5, 1.0, 1.0, 1.0, 1.0, 1.0]),
        )
        .bone(BoneDef::new("Bip01 Head", 0).position([0.0, 0.0, 4.0]))
        .controller(ControllerDef::new(0, MotionFlags::ZR.bits(), -60.0, 60.0).bone(1))
        .controller(ControllerDef::new(4, MotionFlags::XR.bits(), 0.0, 20.0).bone(1))
        .sequence(
            SequenceDef::new("idle1", 15.0, 40)
                .looping()
                .activity(activity::id("idle").unwrap(), 1)
                .bounds([-16.0, -16.0, 0.0], [16.0, 16.0, 72.0]),
        )
        .sequence(
            SequenceDef::new("walk", 10.0, 5)
                .looping()
                .activity(activity::id("walk").unwrap(), 1)
                .linear_movement([40.0, 0.0, 0.0])
                .event(EventDef::new(3, 1004).options("common/npc_step2.wav"))
                .event(EventDef::new(-1, 1004))
                .event(EventDef::new(1, 1004).options("common/npc_step1.wav"))
                .event(EventDef::new(2, 1004).raw_options(no_terminator))
                .animation(vec![walk_channels(), Default::default()]),
        )
        .texture(TextureDef::new("face.bmp", 0))
        .texture(TextureDef::new("glasses.bmp", TextureFlags::ADDITIVE.bits()))
        .skin_family(&[0, 1])
        .body_part(BodyPartDef::new(
            "body",
            1,
            vec![ModelDef::new("scientist", &[1, 0])],
        ))
}

#[test]
fn decode_and_play() {
    let bytes = scientist().build();
    let asset = Arc::new(Asset::read(Cursor::new(&bytes)).unwrap());

    assert_eq!(asset.name(), "test.mdl");
    assert_eq!(asset.bones().len(), 2);
    assert_eq!(asset.bones()[1].parent, Some(0));
    assert_eq!(asset.sequences().len(), 2);
    assert_eq!(asset.find_sequence("WALK"), Some(1));

    let walk = &asset.sequences()[1];
    assert_eq!(walk.activity_name(), Some("walk"));
    let malformed: Vec<_> = walk
        .malformed_events
        .iter()
        .map(|err| match err {
            Error::MalformedEvent {
                sequence, index, ..
            } => (sequence.as_str(), *index),
            _ => panic!("unexpected error {err}"),
        })
        .collect();
    assert_eq!(malformed, [("walk", 1), ("walk", 3)]);
    let frames: Vec<_> = walk.events.iter().map(|event| event.frame).collect();
    assert_eq!(frames, [1, 3]);

    let mut state = AnimationState::new(Arc::clone(&asset), Settings::default()).unwrap();
    state.set_sequence(1).unwrap();

    let mut sounds = Vec::new();
    state.advance(0.35, None).unwrap();
    state.dispatch(&mut |event: &Event| sounds.push(event.options.clone()));
    assert_eq!(sounds, ["common/npc_step1.wav", "common/npc_step2.wav"]);

    // 3.5 -> 1.5 crosses the loop, only the event at frame 3 was already played
    state.advance(0.3, None).unwrap();
    sounds.clear();
    state.dispatch(&mut |event: &Event| sounds.push(event.options.clone()));
    assert_eq!(sounds, ["common/npc_step1.wav"]);

    let bounds = state.extract_bounds();
    assert_eq!(bounds.mins, Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(bounds.maxs, Vec3::new(11.0, 0.0, 4.0));

    let info = state.sequence_info();
    assert_relative_eq!(info.ground_speed, 100.0);

    state.set_sequence(0).unwrap();
    assert_eq!(state.extract_bounds().maxs, Vec3::new(16.0, 16.0, 72.0));

    let classes: Vec<_> = state
        .sorted_meshes()
        .iter()
        .map(|fragment| fragment.class)
        .collect();
    assert_eq!(classes, [RenderClass::Opaque, RenderClass::Translucent]);
}

#[test]
fn animation_values_are_scaled() {
    let asset = Asset::decode(&scientist().build()).unwrap();
    let walk = &asset.sequences()[1];
    let animation = walk.animation.as_ref().unwrap();

    assert_eq!(
        animation.bones[0].channels[0].as_deref(),
        Some(&[1.0, 6.0, 11.0, 11.0, 11.0][..])
    );
    assert!(animation.bones[1].channels.iter().all(Option::is_none));
    assert!(asset.sequences()[0].animation.is_none());
}

#[test]
fn never_loop_stops_at_end() {
    let asset = Arc::new(Asset::decode(&scientist().build()).unwrap());
    let mut settings = Settings::default();
    settings.looping_mode(LoopingMode::NeverLoop);

    let mut state = AnimationState::new(asset, settings).unwrap();
    state.set_sequence(1).unwrap();

    let consumed = state.advance(10.0, None).unwrap();
    assert_relative_eq!(state.frame(), 4.0);
    assert_relative_eq!(consumed, 0.4);
}

#[test]
fn format_errors() {
    let mut builder = scientist();
    builder.magic = *b"IDSQ";
    let err = Asset::decode(&builder.build()).unwrap_err();
    assert!(err.is_format_error());

    let mut builder = scientist();
    builder.version = 6;
    let err = Asset::decode(&builder.build()).unwrap_err();
    assert_eq!(err, Error::UnsupportedVersion { version: 6 });
    assert!(err.is_format_error());

    let err = Asset::decode(b"IDST").unwrap_err();
    assert!(matches!(err, Error::Corrupted { .. }));
    assert!(!err.is_format_error());
}

#[test]
fn truncated_buffer_is_corrupted() {
    let bytes = scientist().build();
    let body_parts = read_i32(&bytes, header_field::BODY_PART_OFFSET) as usize;

    let err = Asset::decode(&bytes[..body_parts]).unwrap_err();
    assert!(matches!(err, Error::Corrupted { .. }));
}

#[test]
fn offsets_past_end_are_corrupted() {
    for field in [
        header_field::BONE_OFFSET,
        header_field::BONE_CONTROLLER_OFFSET,
        header_field::SEQUENCE_OFFSET,
        header_field::TEXTURE_OFFSET,
        header_field::SKIN_OFFSET,
        header_field::BODY_PART_OFFSET,
    ] {
        let mut bytes = scientist().build();
        let len = bytes.len() as i32;
        patch_i32(&mut bytes, field, len);

        assert!(
            matches!(Asset::decode(&bytes), Err(Error::Corrupted { .. })),
            "field at {field}"
        );
    }

    let mut bytes = scientist().build();
    patch_i32(&mut bytes, header_field::TEXTURE_COUNT, i32::MAX);
    assert!(matches!(Asset::decode(&bytes), Err(Error::Corrupted { .. })));
}

#[test]
fn inconsistent_tables_are_corrupted() {
    let bytes = ModelBuilder::new()
        .bone(BoneDef::new("root", 0))
        .build();
    assert!(matches!(Asset::decode(&bytes), Err(Error::Corrupted { .. })));

    let bytes = ModelBuilder::new()
        .bone(BoneDef::new("root", -1))
        .controller(ControllerDef::new(7, MotionFlags::XR.bits(), 0.0, 1.0))
        .build();
    assert!(matches!(Asset::decode(&bytes), Err(Error::Corrupted { .. })));

    let bytes = ModelBuilder::new()
        .texture(TextureDef::new("a.bmp", 0))
        .skin_family(&[0, 3])
        .build();
    assert!(matches!(Asset::decode(&bytes), Err(Error::Corrupted { .. })));
}

#[derive(Debug, Deserialize)]
pub struct SequenceSpec {
    pub name: String,
    pub frame_count: usize,
    pub event_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct MdlSpec {
    pub name: String,
    pub bones: Vec<String>,
    pub sequences: Vec<SequenceSpec>,
    pub textures: Vec<String>,
}

impl FileSpec for MdlSpec {
    type Type = Asset;

    fn extension() -> &'static str {
        ".mdl"
    }

    fn read(file: File) -> Self::Type {
        Asset::read(file).unwrap()
    }

    fn verify(&self, data: Asset) {
        assert_eq!(data.name(), self.name);
        eprintln!("  Name ok");

        let bones: Vec<_> = data.bones().iter().map(|bone| bone.name.as_str()).collect();
        assert_eq!(bones, self.bones);
        eprintln!("  Bones ok");

        assert_eq!(data.sequences().len(), self.sequences.len());
        for (sequence, spec) in data.sequences().iter().zip(&self.sequences) {
            assert_eq!(sequence.name, spec.name);
            assert_eq!(sequence.frame_count, spec.frame_count);
            assert_eq!(sequence.events.len() + sequence.malformed_events.len(), spec.event_count);
        }
        eprintln!("  Sequences ok");

        let textures: Vec<_> = data
            .textures()
            .iter()
            .map(|texture| texture.name.as_str())
            .collect();
        assert_eq!(textures, self.textures);
        eprintln!("  Textures ok");

        let state = AnimationState::new(Arc::new(data), Settings::default()).unwrap();
        assert_eq!(state.extract_bounds(), state.extract_bounds());
    }
}

/// Needs model files with `.json` specs in the directory named by `HLSTUDIO_TEST_DATA`
#[test]
#[ignore]
fn verify_real_models() {
    let path = hlstudio_test_utils::test_data_dir().expect("HLSTUDIO_TEST_DATA is not set");
    MdlSpec::verify_from_path(&path);
}
