//! symphonia + cpal 引擎
//!
//! `open` 打开音源并探测格式，`prepare` 创建输出流并启动解码线程。解码线程把
//! 采样写入输出缓冲区，播完或出错时通过事件通道告知控制器。

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use pod_playback::{
    EngineError, EngineErrorKind, EngineEvent, EngineEventSink, EngineFactory, MediaEngine,
    SourceLocator,
};

use crate::{
    open_source, AudioDecoder, AudioOutput, DecoderError, EngineConfig, OutputConfig,
    SampleWriter,
};

/// 输出缓冲区满时解码线程的等待间隔
const PUMP_IDLE: Duration = Duration::from_millis(5);

enum EngineState {
    Idle,
    Opened(AudioDecoder),
    Prepared(Playback),
    Released,
}

/// 解码线程与引擎共享的音轨
struct Track {
    decoder: AudioDecoder,
    /// 已解码但还没写进输出的采样
    pending: Vec<f32>,
    finished: bool,
}

struct Playback {
    output: AudioOutput,
    track: Arc<Mutex<Track>>,
    stop: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.output.set_playing(false);
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.pump.take() {
            if handle.join().is_err() {
                log::warn!("Decode thread panicked");
            }
        }
    }
}

/// 单个音源的播放引擎
pub struct SymphoniaEngine {
    config: EngineConfig,
    events: EngineEventSink,
    state: EngineState,
    volume: f32,
    /// 最近一次跳转的位置，输出位置从这里开始计
    position_base: Duration,
}

impl SymphoniaEngine {
    pub fn new(config: EngineConfig, events: EngineEventSink) -> Self {
        Self {
            config,
            events,
            state: EngineState::Idle,
            volume: 1.0,
            position_base: Duration::ZERO,
        }
    }

    fn playback(&self) -> Result<&Playback, EngineError> {
        match &self.state {
            EngineState::Prepared(playback) => Ok(playback),
            EngineState::Released => Err(EngineError::Released),
            _ => Err(EngineError::Unsupported("engine is not prepared".to_string())),
        }
    }
}

fn open_error(e: DecoderError) -> EngineError {
    match e {
        DecoderError::NoTrack | DecoderError::UnsupportedCodec(_) => {
            EngineError::Unsupported(e.to_string())
        }
        other => EngineError::Open(other.to_string()),
    }
}

fn runtime_error(e: DecoderError) -> EngineError {
    EngineError::runtime(e.kind(), e.to_string())
}

impl MediaEngine for SymphoniaEngine {
    fn open(&mut self, source: &SourceLocator) -> Result<(), EngineError> {
        match self.state {
            EngineState::Idle => {}
            EngineState::Released => return Err(EngineError::Released),
            _ => return Err(EngineError::Open("engine already opened".to_string())),
        }

        let events = self.events.clone();
        let opened = open_source(
            source,
            &self.config,
            |percent| {
                events.send(EngineEvent::BufferingUpdate(percent));
            },
            || self.events.is_cancelled(),
        )
        .map_err(|e| EngineError::Open(format!("{}: {}", source, e)))?;

        let decoder = AudioDecoder::new(
            opened.media,
            opened.hint.as_deref(),
            self.config.fallback_sample_rate,
        )
        .map_err(open_error)?;

        log::debug!(
            "Opened {} ({}, {} Hz, {} ch)",
            source,
            decoder.info.codec,
            decoder.info.sample_rate,
            decoder.info.channels
        );

        self.state = EngineState::Opened(decoder);
        Ok(())
    }

    fn prepare(&mut self) -> Result<Option<Duration>, EngineError> {
        let decoder = match mem::replace(&mut self.state, EngineState::Idle) {
            EngineState::Opened(decoder) => decoder,
            EngineState::Released => {
                self.state = EngineState::Released;
                return Err(EngineError::Released);
            }
            other => {
                self.state = other;
                return Err(EngineError::Unsupported(
                    "prepare requires an opened source".to_string(),
                ));
            }
        };

        let info = decoder.info.clone();
        let output_config = OutputConfig {
            sample_rate: info.sample_rate,
            channels: info.channels as u16,
            buffer_frames: self.config.output_buffer_frames,
        };

        let error_events = self.events.clone();
        let output = AudioOutput::new(output_config, move |message| {
            error_events.send(EngineEvent::Error(EngineErrorKind::Output, message));
        })
        .map_err(|e| EngineError::Open(e.to_string()))?;
        output.set_volume(self.volume);

        let track = Arc::new(Mutex::new(Track {
            decoder,
            pending: Vec::new(),
            finished: false,
        }));
        let stop = Arc::new(AtomicBool::new(false));

        let pump = {
            let track = track.clone();
            let stop = stop.clone();
            let writer = output.writer();
            let events = self.events.clone();
            thread::Builder::new()
                .name("pod-engine-decode".to_string())
                .spawn(move || run_pump(track, writer, stop, events))
                .map_err(|e| EngineError::Open(e.to_string()))?
        };

        self.state = EngineState::Prepared(Playback {
            output,
            track,
            stop,
            pump: Some(pump),
        });
        Ok(info.duration)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.playback()?.output.set_playing(true);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.playback()?.output.set_playing(false);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        match &mut self.state {
            EngineState::Opened(decoder) => decoder.seek(position).map_err(runtime_error)?,
            EngineState::Prepared(playback) => {
                let mut track = playback.track.lock();
                track.decoder.seek(position).map_err(runtime_error)?;
                track.pending.clear();
                track.finished = false;
                playback.output.reset();
            }
            EngineState::Idle => {
                return Err(EngineError::Unsupported("no source opened".to_string()))
            }
            EngineState::Released => return Err(EngineError::Released),
        }
        self.position_base = position;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let EngineState::Prepared(playback) = &self.state {
            playback.output.set_volume(volume);
        }
    }

    fn position(&self) -> Option<Duration> {
        match &self.state {
            EngineState::Prepared(playback) => {
                Some(self.position_base + playback.output.position())
            }
            EngineState::Opened(_) => Some(self.position_base),
            EngineState::Idle | EngineState::Released => None,
        }
    }

    fn release(&mut self) -> Result<(), EngineError> {
        // Playback 的 Drop 负责停掉解码线程
        self.state = EngineState::Released;
        Ok(())
    }
}

enum PumpStep {
    Wrote,
    OutputFull,
    Drained,
}

fn run_pump(
    track: Arc<Mutex<Track>>,
    writer: SampleWriter,
    stop: Arc<AtomicBool>,
    events: EngineEventSink,
) {
    while !stop.load(Ordering::Acquire) {
        match pump_step(&track, &writer) {
            Ok(PumpStep::Wrote) => {}
            Ok(PumpStep::OutputFull) => thread::sleep(PUMP_IDLE),
            Ok(PumpStep::Drained) => {
                // 等缓冲区里的采样播完再报告结束
                if writer.buffered() == 0 {
                    events.send(EngineEvent::Completed);
                    return;
                }
                thread::sleep(PUMP_IDLE);
            }
            Err(e) => {
                log::error!("Decode failed: {}", e);
                events.send(EngineEvent::Error(e.kind(), e.to_string()));
                return;
            }
        }
    }
}

fn pump_step(track: &Mutex<Track>, writer: &SampleWriter) -> Result<PumpStep, DecoderError> {
    let mut track = track.lock();

    if track.pending.is_empty() {
        if track.finished {
            return Ok(PumpStep::Drained);
        }
        match track.decoder.decode_next()? {
            Some(samples) => track.pending = samples,
            None => {
                track.finished = true;
                return Ok(PumpStep::Drained);
            }
        }
    }

    let written = writer.write(&track.pending);
    track.pending.drain(..written);
    Ok(if written == 0 {
        PumpStep::OutputFull
    } else {
        PumpStep::Wrote
    })
}

/// 为每次初始化创建新的 [`SymphoniaEngine`]
#[derive(Debug, Clone, Default)]
pub struct SymphoniaEngineFactory {
    config: EngineConfig,
}

impl SymphoniaEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for SymphoniaEngineFactory {
    fn create(&mut self, events: EngineEventSink) -> Result<Box<dyn MediaEngine>, EngineError> {
        Ok(Box::new(SymphoniaEngine::new(self.config.clone(), events)))
    }
}
