use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{
    asset::{Asset, Event, Model, Sequence},
    bounds::{self, Bounds},
    controller::{MAX_BLENDERS, MAX_CONTROLLERS},
    events::{self, EventHandler, EventWindow},
    frame::Playback,
    sorting::{self, MeshFragment},
    Error, Result,
};

/// Below this many seconds [`AnimationState::advance_to`] only resynchronizes the clock.
const MIN_ADVANCE: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopingMode {
    AlwaysLoop,
    NeverLoop,
    UseSequenceSetting,
}

impl Default for LoopingMode {
    fn default() -> Self {
        Self::AlwaysLoop
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    frame_rate: f32,
    max_advance: Option<f32>,
    looping_mode: LoopingMode,
    client_events: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_rate: 1.0,
            max_advance: None,
            looping_mode: LoopingMode::default(),
            client_events: true,
        }
    }
}

impl Settings {
    /// Multiplier applied to every sequence's frame rate.
    pub fn frame_rate(&mut self, frame_rate: f32) {
        self.frame_rate = frame_rate;
    }

    /// Cap on the time a single advance may play when the caller doesn't pass one.
    pub fn max_advance(&mut self, max_advance: Option<f32>) {
        self.max_advance = max_advance;
    }

    /// Looping mode of newly created states.
    pub fn looping_mode(&mut self, looping_mode: LoopingMode) {
        self.looping_mode = looping_mode;
    }

    /// Whether [`AnimationState::dispatch`] includes client events.
    pub fn client_events(&mut self, client_events: bool) {
        self.client_events = client_events;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceInfo {
    /// Frames per second, including the playback rate multiplier.
    pub frame_rate: f32,
    /// Rate in 1/256ths of the sequence per second.
    pub cycle_rate: f32,
    /// Units per second the entity should move while playing.
    pub ground_speed: f32,
}

/// Playback state of one instance of an [`Asset`].
#[derive(Debug, Clone)]
pub struct AnimationState {
    asset: Arc<Asset>,
    settings: Settings,
    sequence: usize,
    frame: f32,
    body: usize,
    skin: usize,
    controllers: [u8; MAX_CONTROLLERS],
    mouth: u8,
    blending: [u8; MAX_BLENDERS],
    last_event_check: f32,
    looped_since_event_check: bool,
    anim_time: f32,
    looping_mode: LoopingMode,
}

impl AnimationState {
    /// Starts at the first sequence with every controller at rest.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the asset has no sequences.
    pub fn new(asset: Arc<Asset>, settings: Settings) -> Result<Self> {
        if asset.sequences().is_empty() {
            return Err(Error::invalid_argument("asset sequence count", 0));
        }

        let mut controllers = [0; MAX_CONTROLLERS];
        for (index, controller) in controllers.iter_mut().enumerate() {
            if let Some(bone_controller) = asset.bone_controller(index) {
                *controller = bone_controller.rest;
            }
        }
        let mouth = asset.mouth_controller().map_or(0, |mouth| mouth.rest);

        let mut state = Self {
            asset,
            settings,
            sequence: 0,
            frame: 0.0,
            body: 0,
            skin: 0,
            controllers,
            mouth,
            blending: [0; MAX_BLENDERS],
            last_event_check: 0.0,
            looped_since_event_check: false,
            anim_time: 0.0,
            looping_mode: settings.looping_mode,
        };
        state.set_sequence(0)?;

        let blends = state.current_sequence().blends;
        for (axis, blend) in blends.iter().enumerate() {
            if blend.is_used() {
                state.blending[axis] = blend.to_byte(0.0);
            }
        }

        Ok(state)
    }

    #[must_use]
    pub fn asset(&self) -> &Arc<Asset> {
        &self.asset
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    #[must_use]
    pub fn current_sequence(&self) -> &Sequence {
        // the index is validated by every setter
        &self.asset.sequences()[self.sequence]
    }

    /// # Errors
    ///
    /// Returns `Err` if `sequence` is out of range; the state is left unchanged.
    pub fn set_sequence(&mut self, sequence: usize) -> Result<()> {
        let Some(desc) = self.asset.sequence(sequence) else {
            return Err(Error::invalid_argument("sequence", sequence));
        };

        debug!(sequence, name = %desc.name, "setting sequence");

        for err in &desc.malformed_events {
            warn!(sequence, "skipping event: {}", err);
        }

        self.sequence = sequence;
        self.frame = 0.0;
        self.last_event_check = 0.0;
        self.looped_since_event_check = false;

        Ok(())
    }

    #[must_use]
    pub fn frame(&self) -> f32 {
        self.frame
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.current_sequence().frame_count
    }

    /// Jumps to `frame`, wrapped or clamped into the sequence. Events before it are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `frame` is not finite.
    pub fn set_frame(&mut self, frame: f32) -> Result<()> {
        if !frame.is_finite() {
            return Err(Error::invalid_argument("frame", frame));
        }

        self.frame = self.playback().normalize(frame);
        self.last_event_check = self.frame;
        self.looped_since_event_check = false;

        Ok(())
    }

    #[must_use]
    pub fn looping_mode(&self) -> LoopingMode {
        self.looping_mode
    }

    pub fn set_looping_mode(&mut self, looping_mode: LoopingMode) {
        self.looping_mode = looping_mode;
    }

    /// Whether the current sequence wraps, after applying the looping mode.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        match self.looping_mode {
            LoopingMode::AlwaysLoop => true,
            LoopingMode::NeverLoop => false,
            LoopingMode::UseSequenceSetting => self.current_sequence().is_looping(),
        }
    }

    #[must_use]
    pub fn playback(&self) -> Playback {
        let mut playback = self.current_sequence().playback(self.is_looping());
        playback.frame_rate *= self.settings.frame_rate;
        playback
    }

    /// Time of the last advance, on the clock passed to [`AnimationState::advance_to`].
    #[must_use]
    pub fn anim_time(&self) -> f32 {
        self.anim_time
    }

    pub fn set_anim_time(&mut self, anim_time: f32) {
        self.anim_time = anim_time;
    }

    /// Advances by `delta` seconds, at most `max` (or the configured cap). Returns the seconds
    /// actually played, which is less than `delta` when a non looping sequence reaches its end.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `delta` is negative or not finite.
    pub fn advance(&mut self, delta: f32, max: Option<f32>) -> Result<f32> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(Error::invalid_argument("delta time", delta));
        }

        let delta = match max.or(self.settings.max_advance) {
            Some(max) if max >= 0.0 => delta.min(max),
            _ => delta,
        };

        let advance = self.playback().advance(self.frame, delta, None);

        self.frame = advance.frame;
        self.looped_since_event_check |= advance.wrapped;
        self.anim_time += delta;

        trace!(
            sequence = self.sequence,
            frame = self.frame,
            consumed = advance.consumed,
            wrapped = advance.wrapped,
            "advanced frame"
        );

        Ok(advance.consumed)
    }

    /// Advances to `time` on the host clock, from the time of the last advance.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `time` is not finite.
    pub fn advance_to(&mut self, time: f32, max: Option<f32>) -> Result<f32> {
        if !time.is_finite() {
            return Err(Error::invalid_argument("time", time));
        }

        let delta = time - self.anim_time;
        if delta <= MIN_ADVANCE {
            self.anim_time = time;
            return Ok(0.0);
        }

        let consumed = self.advance(delta, max)?;
        self.anim_time = time;

        Ok(consumed)
    }

    #[must_use]
    pub fn last_event_check(&self) -> f32 {
        self.last_event_check
    }

    /// Dispatches the events between the previous dispatch and the current frame.
    /// Returns how many were dispatched.
    pub fn dispatch_events(
        &mut self,
        handler: &mut impl EventHandler,
        include_client: bool,
    ) -> usize {
        let start = self.last_event_check;
        let end = self.frame;

        let window = if self.looped_since_event_check {
            Some(EventWindow::wrapped(start, end))
        } else if end >= start {
            Some(EventWindow::new(start, end))
        } else {
            // moved backwards without wrapping, nothing was played forward
            None
        };

        let asset = Arc::clone(&self.asset);
        let sequence = &asset.sequences()[self.sequence];

        let dispatched = window.map_or(0, |window| {
            events::dispatch(sequence, window, include_client, &mut |event: &Event| {
                debug!(
                    sequence = %sequence.name,
                    frame = event.frame,
                    code = event.code,
                    options = %event.options,
                    "dispatching event"
                );
                handler.handle_event(event);
            })
        });

        self.last_event_check = end;
        self.looped_since_event_check = false;

        dispatched
    }

    /// [`AnimationState::dispatch_events`] with client events included per the settings.
    pub fn dispatch(&mut self, handler: &mut impl EventHandler) -> usize {
        let include_client = self.settings.client_events;
        self.dispatch_events(handler, include_client)
    }

    /// Stored byte of controller `index`.
    #[must_use]
    pub fn controller(&self, index: usize) -> Option<u8> {
        self.controllers.get(index).copied()
    }

    /// Real value of controller `index`, if the asset has it.
    #[must_use]
    pub fn controller_value(&self, index: usize) -> Option<f32> {
        let byte = self.controller(index)?;
        self.asset
            .bone_controller(index)
            .map(|controller| controller.to_real(byte))
    }

    /// # Errors
    ///
    /// Returns `Err` if `index` is not a controller of the asset or `value` is not finite.
    pub fn set_controller(&mut self, index: usize, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::invalid_argument("controller value", value));
        }

        let controller = self
            .asset
            .bone_controller(index)
            .filter(|_| index < MAX_CONTROLLERS)
            .ok_or_else(|| Error::invalid_argument("controller", index))?;

        self.controllers[index] = controller.to_byte(value);

        Ok(())
    }

    #[must_use]
    pub fn mouth(&self) -> u8 {
        self.mouth
    }

    #[must_use]
    pub fn mouth_value(&self) -> Option<f32> {
        self.asset
            .mouth_controller()
            .map(|controller| controller.to_real(self.mouth))
    }

    /// # Errors
    ///
    /// Returns `Err` if the asset has no mouth controller or `value` is not finite.
    pub fn set_mouth(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::invalid_argument("mouth value", value));
        }

        let controller = self
            .asset
            .mouth_controller()
            .ok_or_else(|| Error::invalid_argument("mouth controller", "none"))?;

        self.mouth = controller.to_byte(value);

        Ok(())
    }

    #[must_use]
    pub fn blending(&self, axis: usize) -> Option<u8> {
        self.blending.get(axis).copied()
    }

    /// Real value of blend `axis` on the current sequence.
    #[must_use]
    pub fn blending_value(&self, axis: usize) -> Option<f32> {
        let byte = self.blending(axis)?;
        let blend = self.current_sequence().blends.get(axis)?;

        blend.is_used().then(|| blend.to_real(byte))
    }

    /// # Errors
    ///
    /// Returns `Err` if the current sequence doesn't blend on `axis` or `value` is not finite.
    pub fn set_blending(&mut self, axis: usize, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::invalid_argument("blend value", value));
        }

        let byte = self
            .current_sequence()
            .blends
            .get(axis)
            .filter(|blend| blend.is_used())
            .map(|blend| blend.to_byte(value))
            .ok_or_else(|| Error::invalid_argument("blend axis", axis))?;

        self.blending[axis] = byte;

        Ok(())
    }

    #[must_use]
    pub fn skin(&self) -> usize {
        self.skin
    }

    /// # Errors
    ///
    /// Returns `Err` if `skin` is not a skin family of the asset.
    pub fn set_skin(&mut self, skin: usize) -> Result<()> {
        if skin >= self.asset.skin_families().len().max(1) {
            return Err(Error::invalid_argument("skin", skin));
        }

        self.skin = skin;

        Ok(())
    }

    /// Packed submodel selection of every body part.
    #[must_use]
    pub fn body(&self) -> usize {
        self.body
    }

    /// Submodel index selected for body part `group`.
    #[must_use]
    pub fn body_value_for_group(&self, group: usize) -> Option<usize> {
        self.asset
            .body_parts()
            .get(group)
            .map(|body_part| body_part.model_index(self.body))
    }

    /// # Errors
    ///
    /// Returns `Err` if `group` or `value` is out of range.
    pub fn set_body_group(&mut self, group: usize, value: usize) -> Result<()> {
        let body_part = self
            .asset
            .body_parts()
            .get(group)
            .ok_or_else(|| Error::invalid_argument("body part", group))?;

        if value >= body_part.models.len() {
            return Err(Error::invalid_argument("body group value", value));
        }

        self.body = body_part.with_model(self.body, value);

        Ok(())
    }

    #[must_use]
    pub fn model_for_body_part(&self, group: usize) -> Option<&Model> {
        let body_part = self.asset.body_parts().get(group)?;
        body_part.models.get(body_part.model_index(self.body))
    }

    #[must_use]
    pub fn sequence_info(&self) -> SequenceInfo {
        let sequence = self.current_sequence();
        let frame_rate = sequence.frame_rate * self.settings.frame_rate;

        if sequence.frame_count > 1 {
            let per_frame = frame_rate / (sequence.frame_count - 1) as f32;

            SequenceInfo {
                frame_rate,
                cycle_rate: 256.0 * per_frame,
                ground_speed: sequence.linear_movement.length() * per_frame,
            }
        } else {
            SequenceInfo {
                frame_rate,
                cycle_rate: 256.0,
                ground_speed: 0.0,
            }
        }
    }

    #[must_use]
    pub fn extract_bounds(&self) -> Bounds {
        bounds::extract(self.asset.bones(), self.current_sequence())
    }

    /// Meshes of the selected submodels and skin, in draw order.
    #[must_use]
    pub fn sorted_meshes(&self) -> Vec<MeshFragment> {
        sorting::sorted(&self.asset, self.body, self.skin)
    }

    #[must_use]
    pub fn meshes_using_texture(&self, texture: usize) -> Vec<MeshFragment> {
        sorting::using_texture(&self.asset, self.body, self.skin, texture)
    }
}
