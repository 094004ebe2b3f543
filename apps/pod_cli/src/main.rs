//! pod-cli - 命令行播放器
//!
//! 播放一个本地文件或串流地址，从标准输入读取控制命令：
//!
//! ```text
//! p        暂停 / 继续
//! s <秒>   跳转
//! v <0-1>  音量
//! i        当前位置
//! r        重建引擎
//! q        退出
//! ```

mod resolver;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use crossbeam_channel::{select, unbounded, Receiver};
use log::{debug, error, LevelFilter};
use pod_engine::{EngineConfig, SymphoniaEngineFactory};
use pod_playback::{
    ChannelCallback, ControllerConfig, PlaybackController, PlaybackError, PlayableResolver,
    PlayerEvent, PlayerStatus, VolumeAdaptation,
};

use crate::resolver::CliResolver;

#[derive(Parser, Debug)]
#[command(name = "pod-cli")]
#[command(about = "Play a podcast episode from a file or URL")]
#[command(version)]
struct Args {
    /// Local file path or http(s) URL
    source: String,

    /// Stream even if the source is a local file
    #[arg(long)]
    stream: bool,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0)]
    start_at: f64,

    /// Per-episode volume adaptation
    #[arg(long, value_enum, default_value_t = Adaptation::Off)]
    volume_adaptation: Adaptation,

    /// Controller config (JSON)
    #[arg(short, long, env = "POD_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Adaptation {
    Off,
    LightReduction,
    HeavyReduction,
    LightBoost,
    MediumBoost,
    HeavyBoost,
}

impl From<Adaptation> for VolumeAdaptation {
    fn from(value: Adaptation) -> Self {
        match value {
            Adaptation::Off => VolumeAdaptation::Off,
            Adaptation::LightReduction => VolumeAdaptation::LightReduction,
            Adaptation::HeavyReduction => VolumeAdaptation::HeavyReduction,
            Adaptation::LightBoost => VolumeAdaptation::LightBoost,
            Adaptation::MediumBoost => VolumeAdaptation::MediumBoost,
            Adaptation::HeavyBoost => VolumeAdaptation::HeavyBoost,
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            for target in ["pod_cli", "pod_playback", "pod_engine"] {
                builder.filter(Some(target), level);
            }
        }
    }
    builder.init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), PlaybackError> {
    let config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };

    let resolver = CliResolver {
        start_at: parse_start_at(args.start_at)?,
        volume_adaptation: args.volume_adaptation.into(),
    };
    let playable = Arc::new(resolver.resolve(&args.source)?);
    if args.stream && playable.stream_url.is_none() {
        return Err(PlaybackError::Config(format!(
            "--stream needs an http(s) URL, got {}",
            args.source
        )));
    }
    let streaming = args.stream || !playable.local_file_available();

    let (evt_tx, evt_rx) = unbounded();
    let controller = PlaybackController::new(
        SymphoniaEngineFactory::new(EngineConfig::default()),
        ChannelCallback::new(evt_tx),
        config,
    )?;

    println!("Playing {}", playable.title);
    controller.play_media_object(playable, streaming, true, true)?;

    let lines = spawn_stdin_reader();
    loop {
        let input = select! {
            recv(evt_rx) -> event => Input::Event(event.ok()),
            recv(lines) -> line => Input::Line(line.ok()),
        };

        match input {
            Input::Event(Some(event)) => {
                if !print_event(&event) {
                    break;
                }
            }
            Input::Event(None) => break,
            Input::Line(Some(line)) => {
                if !handle_line(&controller, line.trim())? {
                    break;
                }
            }
            // 标准输入关闭，只等待播放结束
            Input::Line(None) => {
                for event in evt_rx.iter() {
                    if !print_event(&event) {
                        break;
                    }
                }
                break;
            }
        }
    }

    controller.shutdown();
    Ok(())
}

/// 起始位置（秒）
fn parse_start_at(secs: f64) -> Result<Duration, PlaybackError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| PlaybackError::Config(format!("invalid start position {}: {}", secs, e)))
}

enum Input {
    Event(Option<PlayerEvent>),
    Line(Option<String>),
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// 打印事件；返回 false 表示应当退出
fn print_event(event: &PlayerEvent) -> bool {
    match event {
        PlayerEvent::StatusChanged(info) => {
            println!("[{}]", info.status());
            info.status() != PlayerStatus::Error
        }
        PlayerEvent::ShouldStop => {
            debug!("Controller asked to stop");
            false
        }
        PlayerEvent::PlaybackStarted { position, .. } => {
            println!("  playing from {:.1}s", position.as_secs_f64());
            true
        }
        PlayerEvent::PlaybackPaused { position, .. } => {
            println!("  paused at {:.1}s", position.as_secs_f64());
            true
        }
        PlayerEvent::PostPlayback { playable, ended, .. } => {
            if *ended {
                println!("Finished {}", playable.title);
            }
            true
        }
        PlayerEvent::Buffering(percent) => {
            println!("  buffering {}%", percent);
            true
        }
    }
}

/// 处理一行输入；返回 false 表示退出
fn handle_line(controller: &PlaybackController, line: &str) -> Result<bool, PlaybackError> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(true);
    };

    match command {
        "p" => match controller.status() {
            PlayerStatus::Playing => controller.pause(true, false)?,
            _ => controller.resume()?,
        },
        "s" => match parts.next().and_then(|s| s.parse::<f64>().ok()) {
            Some(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(position) => controller.seek_to(position)?,
                Err(_) => println!("usage: s <seconds>"),
            },
            None => println!("usage: s <seconds>"),
        },
        "v" => match parts.next().and_then(|s| s.parse::<f32>().ok()) {
            Some(volume) => controller.set_volume(volume)?,
            None => println!("usage: v <0.0-1.0>"),
        },
        "r" => controller.reinit()?,
        "i" => {
            let position = controller.position().unwrap_or_default();
            match controller.duration() {
                Some(duration) => println!(
                    "{} {:.1}s / {:.1}s",
                    controller.status(),
                    position.as_secs_f64(),
                    duration.as_secs_f64()
                ),
                None => println!("{} {:.1}s", controller.status(), position.as_secs_f64()),
            }
        }
        "q" => return Ok(false),
        other => println!("unknown command: {}", other),
    }
    Ok(true)
}
