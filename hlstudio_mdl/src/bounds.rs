use glam::{Affine3A, EulerRot, Quat, Vec3};

use crate::asset::{Bone, Sequence};

/// Axis aligned box in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Bounds {
    #[must_use]
    pub const fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;

        Some(points.fold(Self::new(first, first), |bounds, point| Self {
            mins: bounds.mins.min(point),
            maxs: bounds.maxs.max(point),
        }))
    }

    /// A box with no extent, as stored for sequences without precomputed bounds.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.mins == self.maxs
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            mins: self.mins.min(other.mins),
            maxs: self.maxs.max(other.maxs),
        }
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.maxs - self.mins
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) / 2.0
    }

    /// Height to look at and distance to view the box from when centering a camera on it.
    /// Mins and maxs are clamped separately so huge boxes don't center on the origin.
    #[must_use]
    pub fn centering(&self) -> (f32, f32) {
        let mins = self.mins.clamp(Vec3::splat(-2000.0), Vec3::splat(2000.0));
        let maxs = self.maxs.clamp(Vec3::splat(-1000.0), Vec3::splat(1000.0));
        let size = maxs - mins;

        (mins.z + size.z / 2.0, size.max_element())
    }
}

/// Model space transform of every bone at `frame`, from the sequence's animation or the rest pose.
#[must_use]
pub fn bone_transforms(bones: &[Bone], sequence: &Sequence, frame: usize) -> Vec<Affine3A> {
    let tracks = sequence.animation.as_ref().map(|animation| &animation.bones);
    let mut transforms: Vec<Affine3A> = Vec::with_capacity(bones.len());

    for (i, bone) in bones.iter().enumerate() {
        let mut value = bone.value;
        if let Some(track) = tracks.and_then(|tracks| tracks.get(i)) {
            for (channel, slot) in value.iter_mut().enumerate() {
                *slot = track.value(bone, channel, frame);
            }
        }

        let rotation = Quat::from_euler(EulerRot::ZYX, value[5], value[4], value[3]);
        let local = Affine3A::from_rotation_translation(
            rotation,
            Vec3::new(value[0], value[1], value[2]),
        );

        // parents always precede their children
        let transform = match bone.parent.and_then(|parent| transforms.get(parent)) {
            Some(parent) => *parent * local,
            None => local,
        };
        transforms.push(transform);
    }

    transforms
}

/// Bounds of `sequence`. Uses the box stored with the sequence, or the union of all bone
/// positions over every frame when it's degenerate.
#[must_use]
pub fn extract(bones: &[Bone], sequence: &Sequence) -> Bounds {
    if !sequence.bounds.is_degenerate() {
        return sequence.bounds;
    }

    // without animation every frame is the rest pose
    let frame_count = if sequence.animation.is_some() {
        sequence.frame_count.max(1)
    } else {
        1
    };

    let points = (0..frame_count).flat_map(|frame| {
        bone_transforms(bones, sequence, frame)
            .into_iter()
            .map(|transform| Vec3::from(transform.translation))
    });

    Bounds::from_points(points).unwrap_or(sequence.bounds)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;
    use crate::asset::{BlendAxis, BoneTrack, MotionFlags, SequenceAnimation, SequenceFlags};

    fn bone(parent: Option<usize>, position: [f32; 3], rotation: [f32; 3]) -> Bone {
        Bone {
            name: "bone".to_owned(),
            parent,
            controllers: [None; 6],
            value: [
                position[0],
                position[1],
                position[2],
                rotation[0],
                rotation[1],
                rotation[2],
            ],
            scale: [1.0; 6],
        }
    }

    fn sequence(bounds: Bounds, animation: Option<SequenceAnimation>) -> Sequence {
        let blend = BlendAxis {
            kind: MotionFlags::empty(),
            start: 0.0,
            end: 0.0,
        };

        Sequence {
            name: "test".to_owned(),
            frame_rate: 10.0,
            flags: SequenceFlags::empty(),
            activity: 0,
            activity_weight: 0,
            frame_count: 3,
            events: Vec::new(),
            malformed_events: Vec::new(),
            linear_movement: Vec3::ZERO,
            bounds,
            blend_count: 1,
            blends: [blend; 2],
            group: 0,
            next_sequence: 0,
            animation,
        }
    }

    #[test]
    fn stored_bounds_win() {
        let stored = Bounds::new(Vec3::new(-1.0, -2.0, 0.0), Vec3::new(1.0, 2.0, 70.0));
        let sequence = sequence(stored, None);

        assert_eq!(extract(&[bone(None, [100.0; 3], [0.0; 3])], &sequence), stored);
    }

    #[test]
    fn hierarchy_is_applied() {
        // child sits 10 units along the parent's x axis, parent turned 90 degrees around z
        let bones = [
            bone(None, [0.0, 0.0, 5.0], [0.0, 0.0, FRAC_PI_2]),
            bone(Some(0), [10.0, 0.0, 0.0], [0.0; 3]),
        ];
        let transforms = bone_transforms(&bones, &sequence(Bounds::default(), None), 0);

        assert_relative_eq!(
            Vec3::from(transforms[1].translation),
            Vec3::new(0.0, 10.0, 5.0),
            epsilon = 1e-4
        );

        let bounds = extract(&bones, &sequence(Bounds::default(), None));
        assert_relative_eq!(bounds.mins, Vec3::new(0.0, 0.0, 5.0), epsilon = 1e-4);
        assert_relative_eq!(bounds.maxs, Vec3::new(0.0, 10.0, 5.0), epsilon = 1e-4);
    }

    #[test]
    fn animation_frames_are_unioned() {
        let bones = [bone(None, [0.0; 3], [0.0; 3])];
        let animation = SequenceAnimation {
            bones: vec![BoneTrack {
                channels: [
                    Some(vec![-4.0, 0.0, 8.0]),
                    None,
                    Some(vec![1.0, 2.0, 3.0]),
                    None,
                    None,
                    None,
                ],
            }],
        };
        let sequence = sequence(Bounds::default(), Some(animation));

        let bounds = extract(&bones, &sequence);
        assert_eq!(bounds.mins, Vec3::new(-4.0, 0.0, 1.0));
        assert_eq!(bounds.maxs, Vec3::new(8.0, 0.0, 3.0));

        // repeated extraction is bit-identical
        let again = extract(&bones, &sequence);
        let bits = |v: Vec3| v.to_array().map(f32::to_bits);
        assert_eq!(bits(bounds.mins), bits(again.mins));
        assert_eq!(bits(bounds.maxs), bits(again.maxs));
    }

    #[test]
    fn no_bones_keeps_stored_box() {
        assert_eq!(
            extract(&[], &sequence(Bounds::default(), None)),
            Bounds::default()
        );
    }

    #[test]
    fn centering_clamps() {
        let bounds = Bounds::new(Vec3::new(-10.0, -20.0, 0.0), Vec3::new(10.0, 20.0, 72.0));
        assert_eq!(bounds.centering(), (36.0, 72.0));

        let huge = Bounds::new(Vec3::splat(-5000.0), Vec3::splat(5000.0));
        assert_eq!(huge.centering(), (-500.0, 3000.0));
    }

    #[test]
    fn union_and_points() {
        let a = Bounds::new(Vec3::ZERO, Vec3::ONE);
        let b = Bounds::new(Vec3::splat(-1.0), Vec3::splat(0.5));

        assert_eq!(a.union(&b), Bounds::new(Vec3::splat(-1.0), Vec3::ONE));
        assert_eq!(Bounds::from_points([]), None);
        assert!(Bounds::from_points([Vec3::ONE]).unwrap().is_degenerate());
        assert_eq!(a.center(), Vec3::splat(0.5));
        assert_eq!(a.size(), Vec3::ONE);
    }
}
