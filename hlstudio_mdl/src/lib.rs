#![warn(clippy::all, clippy::pedantic)]
// this is intentional
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

//! Decoder and animation runtime for GoldSource studio models (`.mdl`, version 10).
//!
//! An [`Asset`] is decoded once from a byte buffer and then shared read-only, usually behind an
//! [`Arc`](std::sync::Arc), by any number of [`AnimationState`]s. Each state owns the mutable
//! playback of one renderable instance: the active sequence and frame, bone controllers,
//! blending, skin and body group selection.

mod binary_utils;
mod mdl;

pub mod activity;
pub mod asset;
pub mod bounds;
pub mod controller;
pub mod entity;
pub mod events;
pub mod frame;
pub mod sorting;

use std::{io, result};

use thiserror::Error;

pub use asset::{
    Asset, BlendAxis, BodyPart, Bone, BoneController, BoneTrack, Event, Mesh, Model, ModelFlags,
    MotionFlags, Sequence, SequenceAnimation, SequenceFlags, Texture, TextureFlags,
};
pub use bounds::Bounds;
pub use entity::{AnimationState, LoopingMode, SequenceInfo, Settings};
pub use events::{EventHandler, EventWindow};
pub use frame::{Advance, Playback, PlaybackState};
pub use sorting::{MeshFragment, RenderClass};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("io error: {0}")]
    Io(String),
    #[error("not a studio model: invalid signature `{signature}`")]
    InvalidSignature { signature: String },
    #[error("unsupported studio model version {version}")]
    UnsupportedVersion { version: i32 },
    #[error("mdl corrupted: {error}")]
    Corrupted { error: &'static str },
    #[error("invalid {argument} {value}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
    #[error("sequence `{sequence}` event {index} is malformed: {error}")]
    MalformedEvent {
        sequence: String,
        index: usize,
        error: &'static str,
    },
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// Whether this error means the buffer is not a supported studio model at all.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSignature { .. } | Error::UnsupportedVersion { .. }
        )
    }

    fn invalid_argument(argument: &'static str, value: impl ToString) -> Self {
        Self::InvalidArgument {
            argument,
            value: value.to_string(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
