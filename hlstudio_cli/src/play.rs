use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use tracing::info;

use hlstudio_mdl::{AnimationState, Event, LoopingMode, Settings};

use crate::read_asset;

#[derive(Parser)]
pub struct Play {
    /// Path of the model file
    path: PathBuf,
    /// Index of the sequence to play
    #[clap(short, long, default_value = "0")]
    sequence: usize,
    /// Simulated time in seconds
    #[clap(long, default_value = "1.0")]
    seconds: f32,
    /// Seconds between ticks
    #[clap(short, long, default_value = "0.05")]
    tick: f32,
    /// Playback rate multiplier
    #[clap(short, long, default_value = "1.0")]
    rate: f32,
    /// Follow the sequence's looping flag instead of always looping
    #[clap(long)]
    sequence_looping: bool,
    /// Don't dispatch client events
    #[clap(long)]
    server_only: bool,
}

pub fn play(opts: &Play) -> Result<(), Box<dyn Error>> {
    if opts.tick.is_nan() || opts.tick <= 0.0 {
        return Err(format!("tick must be positive, got {}", opts.tick).into());
    }

    let asset = Arc::new(read_asset(&opts.path)?);

    let mut settings = Settings::default();
    settings.frame_rate(opts.rate);
    settings.client_events(!opts.server_only);
    if opts.sequence_looping {
        settings.looping_mode(LoopingMode::UseSequenceSetting);
    }

    let mut state = AnimationState::new(asset, settings)?;
    state.set_sequence(opts.sequence)?;

    let sequence = state.current_sequence();
    info!(name = %sequence.name, frames = sequence.frame_count, "playing sequence");

    let info = state.sequence_info();
    println!(
        "{}: {} fps, ground speed {}",
        state.current_sequence().name,
        info.frame_rate,
        info.ground_speed
    );

    let ticks = (opts.seconds / opts.tick).ceil() as usize;
    for i in 1..=ticks {
        let time = i as f32 * opts.tick;
        state.advance_to(time, None)?;

        println!("{time:.3}s: frame {:.2}", state.frame());
        state.dispatch(&mut |event: &Event| {
            println!(
                "  event {} at frame {} `{}`",
                event.code, event.frame, event.options
            );
        });
    }

    let bounds = state.extract_bounds();
    let (height, distance) = bounds.centering();
    println!("bounds: {} {}", bounds.mins, bounds.maxs);
    println!("camera: height {height}, distance {distance}");

    Ok(())
}
