//! Head tracker running against a simulated scene and robot.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use head_tracker::{
    allocation::TrackingMode,
    app::{DirectionTrackingApp, TrackingApp},
    config::{TrackerConfig, EXAMPLE_CONFIG},
    session::SessionStatus,
    simulation::{SceneConfig, SimulatedRobot, SimulatedScene, SimulatedSpeaker, SpeakerConfig},
};
use log::info;
use std::time::Duration;

/// Observation source driving the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Camera detections
    Vision,
    /// Sound direction of arrival
    Sound,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Observation source
    #[arg(short, long, value_enum, default_value = "vision")]
    source: Source,

    /// Tracking mode (head, body, hybrid), overrides the configuration
    #[arg(short, long)]
    mode: Option<TrackingMode>,

    /// Filter spec, e.g. "kalman" or "window:5:30+exponential:0.3"
    #[arg(short, long)]
    filter: Option<String>,

    /// Number of frames or direction samples to simulate
    #[arg(short = 'n', long, default_value = "300")]
    frames: u64,

    /// Random seed for detector and microphone noise
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Pace the loop at the simulated frame rate instead of running flat out
    #[arg(long)]
    realtime: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            TrackerConfig::from_file(path).with_context(|| format!("loading {path}"))?
        }
        None => TrackerConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.tracking.mode = mode;
    }
    if let Some(filter) = &args.filter {
        config.filter.kind = filter.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_vision(args: &Args, config: TrackerConfig) -> Result<SessionStatus> {
    let scene_config = SceneConfig::default();
    let period = Duration::from_secs_f64(1.0 / scene_config.fps);
    let scene = SimulatedScene::new(scene_config).with_max_frames(args.frames);
    let detector = scene.detector(args.seed);
    let robot = scene.robot();

    let mut app = TrackingApp::new(scene, detector, robot, config)?;
    if args.realtime {
        app = app.with_period(period);
    }

    Ok(app.run()?)
}

fn run_sound(args: &Args, config: TrackerConfig) -> Result<SessionStatus> {
    let speaker_config = SpeakerConfig::default();
    let period = Duration::from_secs_f64(speaker_config.poll_interval_secs);
    info!("Simulated speaker at {:.1}°", speaker_config.yaw_deg);
    let speaker = SimulatedSpeaker::new(speaker_config, args.seed).with_max_samples(args.frames);
    let robot = SimulatedRobot::new();

    let mut app = DirectionTrackingApp::new(speaker, robot, config)?;
    if args.realtime {
        app = app.with_period(period);
    }

    Ok(app.run()?)
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Head Tracker - simulated {:?} source", args.source);

    let config = load_config(&args)?;
    let status = match args.source {
        Source::Vision => run_vision(&args, config)?,
        Source::Sound => run_sound(&args, config)?,
    };

    info!(
        "Summary: {} ticks, {} detections, {} activations, {} commands, {} actuator failures, {} timeouts",
        status.stats.ticks,
        status.stats.detections,
        status.stats.activations,
        status.stats.commands_sent,
        status.stats.actuator_failures,
        status.stats.timeouts
    );
    if args.debug {
        info!("Final status: {}", serde_yaml::to_string(&status)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["head-tracker"]).unwrap();
        assert_eq!(args.source, Source::Vision);
        assert_eq!(args.frames, 300);
        assert_eq!(args.seed, 42);
        assert!(args.mode.is_none());
        assert!(!args.realtime);
    }

    #[test]
    fn test_overrides_reach_config() {
        let args = Args::try_parse_from([
            "head-tracker",
            "--source",
            "sound",
            "--mode",
            "hybrid",
            "--filter",
            "window:5:30+ema:0.5",
        ])
        .unwrap();
        assert_eq!(args.source, Source::Sound);

        let config = load_config(&args).unwrap();
        assert_eq!(config.tracking.mode, TrackingMode::Hybrid);
        assert_eq!(config.filter.kind, "window:5:30+ema:0.5");
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Args::try_parse_from(["head-tracker", "--source", "radar"]).is_err());
        assert!(Args::try_parse_from(["head-tracker", "--mode", "sideways"]).is_err());

        let args = Args::try_parse_from(["head-tracker", "--filter", "median"]).unwrap();
        assert!(load_config(&args).is_err());
    }
}
