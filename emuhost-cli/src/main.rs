mod capture;

use anyhow::{Context, Result};
use clap::Parser;
use emuhost_core::runtime::synced_sample_rate;
use emuhost_core::{DEFAULT_AUDIO_RESERVE, JoypadButton, Session, SessionConfig};
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(version, about = "Run a libretro core headless for a fixed number of frames")]
struct Args {
    /// Path to the core shared library
    core: PathBuf,

    /// Path to the game to load
    game: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Joypad button to hold for the whole run (b, y, select, start, up, down,
    /// left, right, a, x, l1, r1, l2, r2, l3, r3); may be repeated
    #[arg(long)]
    hold: Vec<JoypadButton>,

    /// Audio samples accepted per frame; the rest are dropped
    #[arg(long, default_value_t = DEFAULT_AUDIO_RESERVE)]
    audio_capacity: usize,

    /// Refresh rate of the display audio would be synced to
    #[arg(long, default_value_t = 60.0)]
    display_hz: f64,

    /// Save the last frame as a PNG
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Record all audio to a WAV file
    #[arg(long)]
    wav: Option<PathBuf>,
}

/// Counts frames and reports the rate once per interval.
struct FpsMeter {
    interval: Duration,
    window_start: Instant,
    frames: u32,
}

impl FpsMeter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            frames: 0,
        }
    }

    /// Count one frame at `now`; returns the rate when an interval has elapsed.
    fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        let fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut session = Session::with_config(SessionConfig {
        audio_reserve: args.audio_capacity,
        ..SessionConfig::default()
    });
    session
        .try_load(&args.core)
        .with_context(|| format!("loading core {}", args.core.display()))?;
    session.check_abi()?;
    session
        .try_load_game(&args.game)
        .with_context(|| format!("loading game {}", args.game.display()))?;

    let core_rate = session.sample_rate();
    match session.av_info() {
        Some(av) => {
            let synced = synced_sample_rate(core_rate, av.timing.fps, args.display_hz);
            info!(
                "core: {}x{} at {:.4} fps, audio {core_rate} Hz ({synced:.1} Hz on a {} Hz display)",
                av.geometry.base_width, av.geometry.base_height, av.timing.fps, args.display_hz
            );
        }
        None => info!("core reports no AV info; assuming {core_rate} Hz audio"),
    }

    let input = session.input_mask();
    for button in &args.hold {
        input.set_button(*button, true);
        info!("holding {button}");
    }

    let mut video = Vec::new();
    let mut audio = vec![0i16; args.audio_capacity];
    let mut recorded = Vec::new();
    let mut meter = FpsMeter::new(Duration::from_secs(1));
    let mut peak = 0u16;

    for _ in 0..args.frames {
        let written = session.run_frame(&mut video, &mut audio);
        let samples = &audio[..written];
        peak = peak.max(capture::peak_level(samples));
        if args.wav.is_some() {
            recorded.extend_from_slice(samples);
        }

        // Cores may change resolution at any time; resize the sink and catch it up.
        let frame = session.frame();
        if video.len() != frame.pixels().len() {
            video.resize(frame.pixels().len(), 0);
            frame.copy_into(&mut video);
        }

        if let Some(fps) = meter.tick(Instant::now()) {
            info!("{fps:.1} fps, audio peak {peak}");
            peak = 0;
        }
    }
    info!("ran {} frames", session.frames_run());

    if let Some(path) = &args.screenshot {
        let (width, height) = session.frame().dimensions();
        match capture::write_png(path, &video, width, height) {
            Ok(()) => info!("wrote {}", path.display()),
            Err(err) => warn!("no screenshot: {err:#}"),
        }
    }
    if let Some(path) = &args.wav {
        capture::write_wav(path, &recorded, core_rate.round() as u32)?;
        info!("wrote {} ({} samples)", path.display(), recorded.len());
    }

    session.unload();
    Ok(())
}
