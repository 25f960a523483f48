use crate::asset::{Event, Sequence};

/// Event codes at or above this value are client-side only.
pub const CLIENT_EVENT_START: i32 = 5000;

pub trait EventHandler {
    fn handle_event(&mut self, event: &Event);
}

impl<F> EventHandler for F
where
    F: FnMut(&Event),
{
    fn handle_event(&mut self, event: &Event) {
        self(event);
    }
}

/// Half-open range of frames `[start, end)`. A wrapped window covers `[start, frame_count)`
/// followed by `[0, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventWindow {
    pub start: f32,
    pub end: f32,
    pub wrapped: bool,
}

impl EventWindow {
    #[must_use]
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start,
            end,
            wrapped: end < start,
        }
    }

    /// A window that crossed the loop boundary, even if `end` is not before `start`.
    #[must_use]
    pub fn wrapped(start: f32, end: f32) -> Self {
        Self {
            start,
            end,
            wrapped: true,
        }
    }

    #[must_use]
    pub fn contains(&self, frame: f32) -> bool {
        if self.wrapped {
            frame >= self.start || frame < self.end
        } else {
            frame >= self.start && frame < self.end
        }
    }
}

/// Finds the next event in `window`, scanning from event index `cursor`.
///
/// Returns the index of the event plus one, which is also the cursor to resume from, or `0` when
/// no events are left.
#[must_use]
pub fn next_event(
    sequence: &Sequence,
    window: EventWindow,
    cursor: usize,
    include_client: bool,
) -> usize {
    let events = &sequence.events;
    let frame_count = sequence.frame_count as f32;

    let mut start = cursor;
    if !window.wrapped {
        let first = events.partition_point(|event| (event.frame as f32) < window.start);
        start = start.max(first);
    }

    for (index, event) in events.iter().enumerate().skip(start) {
        let frame = event.frame as f32;

        // events are sorted, nothing past this one can match
        if frame >= frame_count || (!window.wrapped && frame >= window.end) {
            break;
        }

        if !include_client && event.is_client() {
            continue;
        }

        if window.contains(frame) {
            return index + 1;
        }
    }

    0
}

/// Hands every event in `window` to `handler`, returns how many were dispatched.
pub fn dispatch(
    sequence: &Sequence,
    window: EventWindow,
    include_client: bool,
    handler: &mut impl EventHandler,
) -> usize {
    let mut cursor = 0;
    let mut dispatched = 0;

    loop {
        cursor = next_event(sequence, window, cursor, include_client);

        let Some(event) = cursor.checked_sub(1).and_then(|i| sequence.events.get(i)) else {
            break;
        };

        handler.handle_event(event);
        dispatched += 1;
    }

    dispatched
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::asset::{BlendAxis, MotionFlags, SequenceFlags};
    use crate::bounds::Bounds;

    fn event(frame: i32, code: i32) -> Event {
        Event {
            frame,
            code,
            kind: 0,
            options: String::new(),
        }
    }

    fn sequence(frame_count: usize, events: Vec<Event>) -> Sequence {
        let blend = BlendAxis {
            kind: MotionFlags::empty(),
            start: 0.0,
            end: 0.0,
        };

        Sequence {
            name: "test".to_owned(),
            frame_rate: 30.0,
            flags: SequenceFlags::LOOPING,
            activity: 0,
            activity_weight: 0,
            frame_count,
            events,
            malformed_events: Vec::new(),
            linear_movement: Vec3::ZERO,
            bounds: Bounds::default(),
            blend_count: 1,
            blends: [blend; 2],
            group: 0,
            next_sequence: 0,
            animation: None,
        }
    }

    fn collect(sequence: &Sequence, window: EventWindow, include_client: bool) -> Vec<i32> {
        let mut frames = Vec::new();
        dispatch(sequence, window, include_client, &mut |event: &Event| {
            frames.push(event.frame);
        });
        frames
    }

    #[test]
    fn events_are_exhausted() {
        let sequence = sequence(30, vec![event(5, 1), event(10, 2), event(20, 3)]);
        let window = EventWindow::new(0.0, 30.0);

        let mut cursor = 0;
        let mut found = Vec::new();
        for _ in 0..3 {
            cursor = next_event(&sequence, window, cursor, true);
            assert_ne!(cursor, 0);
            found.push(sequence.events[cursor - 1].code);
        }

        assert_eq!(found, [1, 2, 3]);
        assert_eq!(next_event(&sequence, window, cursor, true), 0);
    }

    #[test]
    fn window_is_half_open() {
        let sequence = sequence(30, vec![event(5, 1), event(10, 2), event(20, 3)]);

        assert_eq!(collect(&sequence, EventWindow::new(5.0, 10.0), true), [5]);
        assert_eq!(collect(&sequence, EventWindow::new(6.0, 20.0), true), [10]);
        assert!(collect(&sequence, EventWindow::new(10.5, 10.5), true).is_empty());
    }

    #[test]
    fn wrapped_window_covers_both_ends() {
        let sequence = sequence(
            30,
            vec![event(5, 1), event(10, 2), event(20, 3), event(27, 4)],
        );

        let window = EventWindow::new(25.0, 6.0);
        assert!(window.wrapped);
        assert_eq!(collect(&sequence, window, true), [5, 27]);

        assert_eq!(collect(&sequence, EventWindow::new(25.0, 3.0), true), [27]);
    }

    #[test]
    fn forced_wrap_covers_full_loop() {
        let sequence = sequence(30, vec![event(5, 1), event(10, 2), event(20, 3)]);

        let window = EventWindow::wrapped(10.0, 12.0);
        assert_eq!(collect(&sequence, window, true), [5, 10, 20]);
    }

    #[test]
    fn client_events_are_optional() {
        let sequence = sequence(
            30,
            vec![event(1, 5004), event(2, 1000), event(3, CLIENT_EVENT_START)],
        );
        let window = EventWindow::new(0.0, 30.0);

        assert!(sequence.events[0].is_client());
        assert_eq!(collect(&sequence, window, true), [1, 2, 3]);
        assert_eq!(collect(&sequence, window, false), [2]);
    }

    #[test]
    fn cursor_resumes_scan() {
        let sequence = sequence(30, vec![event(5, 1), event(10, 2), event(20, 3)]);
        let window = EventWindow::new(0.0, 30.0);

        assert_eq!(next_event(&sequence, window, 2, true), 3);
        assert_eq!(next_event(&sequence, window, 3, true), 0);
    }

    #[test]
    fn events_past_last_frame_never_fire() {
        let sequence = sequence(10, vec![event(3, 1), event(12, 2)]);

        assert_eq!(
            collect(&sequence, EventWindow::wrapped(5.0, 5.0), true),
            [3]
        );
    }
}
