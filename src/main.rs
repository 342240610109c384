//! Embodied Capture Agent CLI
//!
//! Synchronized screen, audio and input capture gated on window focus.

use chrono::Utc;
use clap::{Parser, Subcommand};
use embodied_capture_agent::{
    action::LogDispatcher,
    agent::RandomAgent,
    collector::{
        AudioSource, FrameSource, InputCapture, InputHook, MicSource, ScreenSource, Silence,
        TestPatternGrabber, ToneRecorder,
    },
    config::{Config, SourceConfig},
    core::{
        Agent, AudioStreamer, BasicPerception, CancelToken, Environment, Features, FocusGate,
        SessionRunner, Sources, Synchronizer,
    },
    focus::{list_windows, AlwaysFocused, FocusProbe, WindowTarget, X11Probe},
    recording::{RawVideoSink, Recorder, WavSink},
    stats::{create_shared_stats_with_persistence, PersistedStats},
    VERSION,
};
use statrs::statistics::Statistics;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "embodied-capture")]
#[command(version = VERSION)]
#[command(about = "Synchronized multi-modal capture gated on window focus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a capture session with the random baseline agent
    Run {
        /// Session length in seconds (runs until Ctrl+C if omitted)
        #[arg(long)]
        duration: Option<f64>,

        /// Capture sources (video, audio, or all)
        #[arg(long)]
        sources: Option<String>,

        /// Record the session to the recording directory
        #[arg(long)]
        record: bool,

        /// Tick interval in milliseconds
        #[arg(long)]
        timestep_ms: Option<u64>,

        /// Gate on this X11 window id
        #[arg(long, conflicts_with = "window_name")]
        window_id: Option<String>,

        /// Gate on the first window whose title contains this text
        #[arg(long)]
        window_name: Option<String>,

        /// Seed for the random agent
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Stream audio chunks without video or input
    Stream {
        /// Stream length in seconds (runs until Ctrl+C if omitted)
        #[arg(long)]
        duration: Option<f64>,

        /// Process chunks on a worker pool
        #[arg(long)]
        parallel: bool,

        /// Worker threads in parallel mode
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Watch a window and print focus changes
    Focus {
        #[arg(long, conflicts_with = "window_name")]
        window_id: Option<String>,

        #[arg(long)]
        window_name: Option<String>,
    },

    /// List open windows
    Windows,

    /// Show cumulative capture statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            duration,
            sources,
            record,
            timestep_ms,
            window_id,
            window_name,
            seed,
        } => {
            let options = RunOptions {
                duration,
                sources,
                record,
                timestep_ms,
                target: target_from_args(window_id, window_name),
                seed,
            };
            cmd_run(options);
        }
        Commands::Stream {
            duration,
            parallel,
            workers,
        } => {
            cmd_stream(duration, parallel, workers);
        }
        Commands::Focus {
            window_id,
            window_name,
        } => {
            cmd_focus(target_from_args(window_id, window_name));
        }
        Commands::Windows => {
            cmd_windows();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

struct RunOptions {
    duration: Option<f64>,
    sources: Option<String>,
    record: bool,
    timestep_ms: Option<u64>,
    target: Option<WindowTarget>,
    seed: Option<u64>,
}

fn target_from_args(window_id: Option<String>, window_name: Option<String>) -> Option<WindowTarget> {
    match (window_id, window_name) {
        (Some(id), _) => Some(WindowTarget::Id(id)),
        (None, Some(name)) => Some(WindowTarget::Title(name)),
        (None, None) => None,
    }
}

fn x11_probe(target: WindowTarget) -> X11Probe {
    match X11Probe::new(target) {
        Ok(probe) => probe,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_duration(secs: Option<f64>) -> Option<Duration> {
    secs.map(|s| match Duration::try_from_secs_f64(s) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: invalid duration {s}: {e}");
            std::process::exit(1);
        }
    })
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    }
}

fn cmd_run(options: RunOptions) {
    println!("Embodied Capture Agent v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(ref csv) = options.sources {
        config.sources = SourceConfig::from_csv(csv);
    }
    if let Some(ms) = options.timestep_ms {
        config.timestep = Duration::from_millis(ms);
    }
    if options.record {
        config.recording.enabled = true;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let target = options.target.or_else(|| config.focus.target());
    let duration = parse_duration(options.duration);

    println!("Starting session...");
    println!(
        "  Video: {}",
        if config.sources.video {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Audio: {}",
        if config.sources.audio {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Timestep: {:.1}ms", config.timestep.as_secs_f64() * 1000.0);
    match target {
        Some(WindowTarget::Id(ref id)) => println!("  Focus target: window {id}"),
        Some(WindowTarget::Title(ref name)) => println!("  Focus target: \"{name}\""),
        None => println!("  Focus target: none (always focused)"),
    }
    println!();
    if duration.is_none() {
        println!("Press Ctrl+C to stop");
        println!();
    }

    match target {
        Some(target) => run_session(&config, x11_probe(target), duration, options.seed),
        None => run_session(&config, AlwaysFocused, duration, options.seed),
    }
}

fn run_session<P: FocusProbe>(config: &Config, probe: P, duration: Option<Duration>, seed: Option<u64>) {
    let stats = create_shared_stats_with_persistence(config.stats_path());

    let mut hook = InputHook::default();
    if let Err(e) = hook.start() {
        eprintln!("Error starting input hook: {e}");
        std::process::exit(1);
    }
    if !hook.has_publisher() {
        tracing::warn!("No OS input listener attached; observations will carry no input events");
    }

    let frame: Option<Box<dyn FrameSource + Send>> =
        if config.sources.video {
            Some(Box::new(ScreenSource::new(
                TestPatternGrabber::default(),
                config.region,
            )))
        } else {
            None
        };
    let audio: Box<dyn AudioSource + Send> = if config.sources.audio {
        Box::new(MicSource::new(
            ToneRecorder::default(),
            config.sample_rate,
            config.channels,
        ))
    } else {
        Box::new(MicSource::new(Silence, config.sample_rate, config.channels))
    };
    let sources = Sources::new(frame, audio, Box::new(InputCapture::new(hook.receiver())));

    let sync = Synchronizer::new(sources, config.sync_config());
    let gate = FocusGate::new(sync, probe, LogDispatcher::new()).with_stats(stats.clone());
    let mut runner = SessionRunner::new(
        gate,
        BasicPerception::new(),
        RandomAgent::new(seed),
        config.runner_config(),
    )
    .with_stats(stats.clone());

    if config.recording.enabled {
        let session_id = Uuid::new_v4();
        let dir = config.recording.output_dir.join(format!(
            "session_{}",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        println!("Recording to {dir:?}");
        let recorder = Recorder::new(
            Box::new(RawVideoSink::new(&dir).with_session_id(session_id)),
            Box::new(WavSink::new(dir.join("audio.wav"))),
            config.timestep,
            config.sample_rate,
            config.channels,
        );
        runner = runner.with_recorder(recorder);
    }

    let cancel = CancelToken::new();
    ctrlc_handler(cancel.clone());

    let result = match duration {
        Some(d) => runner.run(d, &cancel),
        None => runner.run_forever(&cancel),
    };
    hook.stop();

    match result {
        Ok(summary) => {
            println!();
            println!("Session complete: {} ticks in {:.1}s", summary.ticks, summary.elapsed.as_secs_f64());
            println!("  History entries: {}", summary.history_len);
            println!("  Salient episodes: {}", summary.episodic_len);
            if let Some(ref rec) = summary.recording {
                match rec.invalid_reason {
                    Some(ref reason) => println!("  Recording: invalid ({reason})"),
                    None => println!(
                        "  Recording: {} frames, {} audio frames",
                        rec.frames_written, rec.audio_frames
                    ),
                }
            }
        }
        Err(e) => {
            eprintln!("Session failed: {e}");
        }
    }

    export_episodes(config, &runner);

    println!();
    println!("{}", stats.summary());
    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }
}

fn export_episodes<E, G>(config: &Config, runner: &SessionRunner<E, BasicPerception, G>)
where
    E: Environment,
    G: Agent<Features>,
{
    let episodes = runner.episodic().episodes();
    if episodes.is_empty() {
        return;
    }

    let path = config.export_path.join(format!(
        "episodes_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let result = serde_json::to_string_pretty(episodes)
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(&path, json));
    match result {
        Ok(()) => println!("Exported {} episodes to {path:?}", episodes.len()),
        Err(e) => eprintln!("Error writing episodes: {e}"),
    }
}

fn cmd_stream(duration: Option<f64>, parallel: bool, workers: Option<usize>) {
    let config = load_config();
    let mut stream_config = config.stream_config();
    stream_config.parallel |= parallel;
    if let Some(n) = workers {
        stream_config.workers = n;
    }
    if stream_config.workers == 0 {
        eprintln!("Error: --workers must be positive");
        std::process::exit(1);
    }
    if let Some(d) = parse_duration(duration) {
        let chunks = d.as_secs_f64() / stream_config.chunk_duration.as_secs_f64();
        stream_config.max_chunks = Some(chunks.ceil() as u64);
    }

    println!("Embodied Capture Agent v{VERSION}");
    println!(
        "Streaming {:.0}ms audio chunks ({})",
        stream_config.chunk_duration.as_secs_f64() * 1000.0,
        if stream_config.parallel {
            format!("{} workers", stream_config.workers)
        } else {
            "sequential".to_string()
        }
    );

    let source = MicSource::new(ToneRecorder::default(), config.sample_rate, config.channels);
    let mut streamer = AudioStreamer::new(source, stream_config);

    let cancel = CancelToken::new();
    ctrlc_handler(cancel.clone());

    let result = streamer.run(&cancel, |chunk, ts| {
        let rms = chunk
            .samples
            .iter()
            .map(|s| *s as f64 / i16::MAX as f64)
            .quadratic_mean();
        tracing::info!("chunk {} rms={:.4}", ts.format("%H:%M:%S%.3f"), rms);
    });

    match result {
        Ok(summary) => println!(
            "Stream complete: {} chunks captured, {} processed",
            summary.chunks_captured, summary.chunks_processed
        ),
        Err(e) => {
            eprintln!("Stream failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_focus(target: Option<WindowTarget>) {
    let target = match target.or_else(|| load_config().focus.target()) {
        Some(t) => t,
        None => {
            eprintln!("Error: pass --window-id or --window-name");
            std::process::exit(1);
        }
    };

    let mut probe = x11_probe(target);
    let cancel = CancelToken::new();
    ctrlc_handler(cancel.clone());

    println!("Watching focus (Ctrl+C to stop)");
    let mut last: Option<bool> = None;
    while !cancel.is_cancelled() {
        let focused = match probe.is_focused() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Focus probe failed: {}", e);
                false
            }
        };
        if last != Some(focused) {
            println!(
                "{} {}",
                Utc::now().format("%H:%M:%S"),
                if focused { "focused" } else { "not focused" }
            );
            last = Some(focused);
        }
        thread::sleep(Duration::from_millis(500));
    }
}

fn cmd_windows() {
    match list_windows() {
        Ok(windows) if windows.is_empty() => println!("No windows found."),
        Ok(windows) => {
            for w in windows {
                println!("{}  {}", w.id, w.title);
            }
        }
        Err(e) => {
            eprintln!("Error listing windows: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status() {
    let config = load_config();

    println!("Embodied Capture Agent Status");
    println!("=============================");
    println!();
    println!("Version: {VERSION}");
    println!(
        "Sources: video={} audio={}",
        config.sources.video, config.sources.audio
    );
    println!("Timestep: {:.1}ms", config.timestep.as_secs_f64() * 1000.0);
    println!("Recording: {}", config.recording.enabled);
    println!();

    let stats_path = config.stats_path();
    if !stats_path.exists() {
        println!("No previous session data found.");
        return;
    }

    let persisted = std::fs::read_to_string(&stats_path)
        .map_err(|e| e.to_string())
        .and_then(|c| serde_json::from_str::<PersistedStats>(&c).map_err(|e| e.to_string()));
    match persisted {
        Ok(p) => {
            let t = p.totals;
            println!("Cumulative Statistics (updated {}):", p.last_updated.format("%Y-%m-%d %H:%M:%S"));
            println!("  Ticks: {}", t.ticks);
            println!("  Frames captured: {} ({} missing)", t.frames_captured, t.frames_missing);
            println!("  Audio samples: {}", t.audio_samples);
            println!("  Input events: {}", t.input_events);
            println!(
                "  Actions: {} dispatched, {} suppressed",
                t.actions_dispatched, t.actions_suppressed
            );
            println!("  Focus transitions: {} paused, {} resumed", t.pauses, t.resumes);
            println!("  Salient ticks: {}", t.salient_ticks);
        }
        Err(e) => eprintln!("Could not read stats at {stats_path:?}: {e}"),
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(cancel: CancelToken) {
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
