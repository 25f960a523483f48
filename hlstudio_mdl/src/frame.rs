//! Frame advancement of a single sequence.

/// How a sequence is played back by an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    pub frame_rate: f32,
    pub frame_count: usize,
    pub looping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Wraps around at the frame count.
    Looping,
    /// Stops at the last frame.
    Clamped,
    /// Zero frame rate or a single frame, never moves.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    pub frame: f32,
    /// Seconds of the requested delta actually played.
    pub consumed: f32,
    /// Whether the frame crossed the loop boundary.
    pub wrapped: bool,
}

impl Playback {
    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        if self.frame_rate == 0.0 || !self.frame_rate.is_finite() || self.frame_count <= 1 {
            PlaybackState::Idle
        } else if self.looping {
            PlaybackState::Looping
        } else {
            PlaybackState::Clamped
        }
    }

    #[must_use]
    pub fn last_frame(&self) -> f32 {
        self.frame_count.saturating_sub(1) as f32
    }

    /// Brings `frame` into the playable range: wrapped when looping, clamped otherwise.
    #[must_use]
    pub fn normalize(&self, frame: f32) -> f32 {
        match self.state() {
            PlaybackState::Looping => self.wrap(frame),
            PlaybackState::Clamped | PlaybackState::Idle => frame.clamp(0.0, self.last_frame()),
        }
    }

    fn wrap(&self, frame: f32) -> f32 {
        let count = self.frame_count as f32;
        let frame = frame.rem_euclid(count);

        // rem_euclid may round up to the modulus itself
        if frame >= count {
            0.0
        } else {
            frame
        }
    }

    /// Advances `frame` by `delta` seconds, capped to `max` seconds when given.
    /// `delta` must not be negative.
    #[must_use]
    pub fn advance(&self, frame: f32, delta: f32, max: Option<f32>) -> Advance {
        let state = self.state();

        if state == PlaybackState::Idle {
            return Advance {
                frame,
                consumed: 0.0,
                wrapped: false,
            };
        }

        let delta = match max {
            Some(max) if max >= 0.0 => delta.min(max),
            _ => delta,
        };
        let raw = frame + delta * self.frame_rate;

        if state == PlaybackState::Looping {
            Advance {
                frame: self.wrap(raw),
                consumed: delta,
                wrapped: raw < 0.0 || raw >= self.frame_count as f32,
            }
        } else {
            let clamped = raw.clamp(0.0, self.last_frame());

            Advance {
                frame: clamped,
                consumed: ((clamped - frame) / self.frame_rate).clamp(0.0, delta),
                wrapped: false,
            }
        }
    }
}
