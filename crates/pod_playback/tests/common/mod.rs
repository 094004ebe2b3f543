//! 控制器测试用的假引擎与事件收集

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use pod_playback::{
    ChannelCallback, ControllerConfig, EngineError, EngineEventSink, EngineFactory, MediaEngine,
    MediaId, PlaybackController, PlaybackInfo, Playable, PlayerEvent, PlayerStatus, SourceLocator,
    StatusCallback,
};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// 假引擎上发生的操作，带引擎代号
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Create(u64),
    Open(u64, SourceLocator),
    Prepare(u64),
    Start(u64),
    Pause(u64),
    Seek(u64, Duration),
    Volume(u64, f32),
    Release(u64),
}

#[derive(Debug, Default)]
struct Script {
    fail_create: bool,
    fail_open: bool,
    fail_prepare: bool,
    /// open 一直阻塞，直到控制器关闭
    block_open: bool,
    prepare_delay: Duration,
    duration: Option<Duration>,
}

#[derive(Default)]
struct ProbeState {
    ops: Vec<Op>,
    sinks: Vec<EngineEventSink>,
    script: Script,
}

/// 观察并操控假引擎
#[derive(Clone, Default)]
pub struct EngineProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl EngineProbe {
    pub fn factory(&self) -> impl EngineFactory {
        let probe = self.clone();
        move |sink: EngineEventSink| -> Result<Box<dyn MediaEngine>, EngineError> {
            let generation = sink.generation();
            let mut state = probe.inner.lock();
            if state.script.fail_create {
                return Err(EngineError::Open("no engine available".to_string()));
            }
            state.ops.push(Op::Create(generation));
            state.sinks.push(sink.clone());
            Ok(Box::new(FakeEngine {
                generation,
                sink,
                probe: probe.clone(),
                position: Duration::ZERO,
            }))
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.inner.lock().ops.clone()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.inner.lock().ops.iter().filter(|op| pred(op)).count()
    }

    pub fn engines_created(&self) -> usize {
        self.count(|op| matches!(op, Op::Create(_)))
    }

    pub fn engines_released(&self) -> usize {
        self.count(|op| matches!(op, Op::Release(_)))
    }

    pub fn latest_sink(&self) -> EngineEventSink {
        self.inner
            .lock()
            .sinks
            .last()
            .cloned()
            .expect("no engine created yet")
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.inner.lock().script.fail_create = fail;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.lock().script.fail_open = fail;
    }

    pub fn set_fail_prepare(&self, fail: bool) {
        self.inner.lock().script.fail_prepare = fail;
    }

    pub fn set_block_open(&self, block: bool) {
        self.inner.lock().script.block_open = block;
    }

    pub fn set_prepare_delay(&self, delay: Duration) {
        self.inner.lock().script.prepare_delay = delay;
    }

    pub fn set_duration(&self, duration: Duration) {
        self.inner.lock().script.duration = Some(duration);
    }

    fn record(&self, op: Op) {
        self.inner.lock().ops.push(op);
    }
}

struct FakeEngine {
    generation: u64,
    sink: EngineEventSink,
    probe: EngineProbe,
    position: Duration,
}

impl MediaEngine for FakeEngine {
    fn open(&mut self, source: &SourceLocator) -> Result<(), EngineError> {
        self.probe.record(Op::Open(self.generation, source.clone()));
        if self.probe.inner.lock().script.block_open {
            while !self.sink.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            return Err(EngineError::Open("cancelled".to_string()));
        }
        if self.probe.inner.lock().script.fail_open {
            return Err(EngineError::Open(format!("cannot open {}", source)));
        }
        Ok(())
    }

    fn prepare(&mut self) -> Result<Option<Duration>, EngineError> {
        self.probe.record(Op::Prepare(self.generation));
        let (delay, fail, duration) = {
            let state = self.probe.inner.lock();
            (
                state.script.prepare_delay,
                state.script.fail_prepare,
                state.script.duration,
            )
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if fail {
            return Err(EngineError::Open("prepare failed".to_string()));
        }
        Ok(duration)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.probe.record(Op::Start(self.generation));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.probe.record(Op::Pause(self.generation));
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        self.probe.record(Op::Seek(self.generation, position));
        self.position = position;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.probe.record(Op::Volume(self.generation, volume));
    }

    fn position(&self) -> Option<Duration> {
        Some(self.position)
    }

    fn release(&mut self) -> Result<(), EngineError> {
        self.probe.record(Op::Release(self.generation));
        Ok(())
    }
}

/// 同时持有 stream 与本地路径的测试条目
pub fn episode(id: u64) -> Arc<Playable> {
    Arc::new(
        Playable::new(MediaId(id), format!("Episode {}", id))
            .with_stream_url(format!("https://feeds.example.com/episodes/{}.mp3", id))
            .with_local_path(format!("/podcasts/episode-{}.mp3", id)),
    )
}

/// 检查快照不变式：只有 STOPPED / ERROR 没有 playable
pub fn check_info(info: &PlaybackInfo) {
    assert_eq!(
        info.status().has_playable(),
        info.playable().is_some(),
        "invariant broken for {}",
        info.status()
    );
}

pub struct Harness {
    pub controller: PlaybackController,
    pub events: Receiver<PlayerEvent>,
    pub probe: EngineProbe,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let probe = EngineProbe::default();
        let (evt_tx, events) = unbounded();
        let controller =
            PlaybackController::new(probe.factory(), ChannelCallback::new(evt_tx), config)
                .unwrap();
        Self {
            controller,
            events,
            probe,
        }
    }

    /// 使用自定义回调；事件通道由回调自己负责
    pub fn with_callback(callback: impl StatusCallback, events: Receiver<PlayerEvent>) -> Self {
        let probe = EngineProbe::default();
        let controller =
            PlaybackController::new(probe.factory(), callback, ControllerConfig::default())
                .unwrap();
        Self {
            controller,
            events,
            probe,
        }
    }

    pub fn next_event(&self) -> PlayerEvent {
        match self.events.recv_timeout(EVENT_TIMEOUT) {
            Ok(event) => {
                if let PlayerEvent::StatusChanged(info) = &event {
                    check_info(info);
                }
                event
            }
            Err(RecvTimeoutError::Timeout) => panic!("timed out waiting for event"),
            Err(RecvTimeoutError::Disconnected) => panic!("event channel closed"),
        }
    }

    /// 下一个信号，跳过开始/暂停/缓冲通知
    pub fn next_signal(&self) -> PlayerEvent {
        loop {
            match self.next_event() {
                PlayerEvent::PlaybackStarted { .. }
                | PlayerEvent::PlaybackPaused { .. }
                | PlayerEvent::Buffering(_) => continue,
                event => return event,
            }
        }
    }

    /// 下一个状态变化，跳过其他事件
    pub fn next_status(&self) -> PlayerStatus {
        loop {
            match self.next_event() {
                PlayerEvent::StatusChanged(info) => return info.status(),
                PlayerEvent::ShouldStop => panic!("unexpected should_stop"),
                _ => continue,
            }
        }
    }

    pub fn expect_statuses(&self, expected: &[PlayerStatus]) {
        let actual: Vec<_> = expected.iter().map(|_| self.next_status()).collect();
        assert_eq!(actual, expected);
    }

    /// 一段时间内不应出现状态变化或 should_stop
    pub fn assert_quiet(&self) {
        let deadline = Instant::now() + QUIET_PERIOD;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(PlayerEvent::StatusChanged(info)) => {
                    panic!("unexpected status change: {}", info.status())
                }
                Ok(PlayerEvent::ShouldStop) => panic!("unexpected should_stop"),
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    }

    /// 播放到指定状态，返回载入的条目
    pub fn reach(&self, target: PlayerStatus, streaming: bool) -> Arc<Playable> {
        let p = episode(1);
        match target {
            PlayerStatus::Stopped => {}
            PlayerStatus::Initialized => {
                self.controller
                    .play_media_object(p.clone(), streaming, false, false)
                    .unwrap();
                self.expect_statuses(&[PlayerStatus::Initializing, PlayerStatus::Initialized]);
            }
            PlayerStatus::Prepared => {
                self.controller
                    .play_media_object(p.clone(), streaming, false, true)
                    .unwrap();
                self.expect_statuses(&[
                    PlayerStatus::Initializing,
                    PlayerStatus::Initialized,
                    PlayerStatus::Preparing,
                    PlayerStatus::Prepared,
                ]);
            }
            PlayerStatus::Playing | PlayerStatus::Paused => {
                self.controller
                    .play_media_object(p.clone(), streaming, true, true)
                    .unwrap();
                self.expect_statuses(&[
                    PlayerStatus::Initializing,
                    PlayerStatus::Initialized,
                    PlayerStatus::Preparing,
                    PlayerStatus::Prepared,
                    PlayerStatus::Playing,
                ]);
                if target == PlayerStatus::Paused {
                    self.controller.pause(false, false).unwrap();
                    self.expect_statuses(&[PlayerStatus::Paused]);
                }
            }
            other => panic!("cannot reach {} directly", other),
        }
        p
    }
}
