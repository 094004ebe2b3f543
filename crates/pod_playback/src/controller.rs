//! 播放控制器
//!
//! 命令方法只负责入队，由独立的工作线程按到达顺序执行；getter 只读取最近一次
//! 发布的快照。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use log::{debug, error};
use parking_lot::Mutex;

use crate::command::{Command, StartFlag};
use crate::info::PositionClock;
use crate::worker::Worker;
use crate::{
    ControllerConfig, EngineFactory, MediaId, PlaybackError, PlaybackInfo, Playable,
    PlayerStatus, StatusCallback,
};

/// 工作线程发布、调用方读取的状态
#[derive(Debug, Default)]
pub(crate) struct Published {
    pub(crate) info: PlaybackInfo,
    pub(crate) start_when_prepared: bool,
    pub(crate) streaming: bool,
    pub(crate) clock: PositionClock,
    pub(crate) duration: Option<Duration>,
    /// 当前引擎实例的代号
    pub(crate) generation: u64,
    /// 队列中最近一次播放请求
    pub(crate) pending_play: Option<(MediaId, StartFlag)>,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<Published>,
    shutting_down: AtomicBool,
}

impl Shared {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// 本地播放控制器
pub struct PlaybackController {
    cmd_tx: Sender<Command>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl PlaybackController {
    /// 创建控制器并启动工作线程
    pub fn new<F, C>(factory: F, callback: C, config: ControllerConfig) -> Result<Self, PlaybackError>
    where
        F: EngineFactory,
        C: StatusCallback,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = unbounded();
        let shared = Arc::new(Shared::default());

        let worker_tx = cmd_tx.clone();
        let worker_shared = shared.clone();
        let worker_config = config.clone();
        let handle = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || {
                let worker = Worker::new(
                    Box::new(factory),
                    Box::new(callback),
                    worker_tx,
                    worker_shared,
                    &worker_config,
                );
                worker.run(cmd_rx);
            })?;

        Ok(Self {
            cmd_tx,
            shared,
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// 入队一个非播放命令；它之后的播放请求不再与之前排队的请求合并
    fn send(&self, cmd: Command) -> Result<(), PlaybackError> {
        if self.shared.is_shutting_down() {
            return Err(PlaybackError::ShutdownInProgress);
        }
        let mut state = self.shared.state.lock();
        state.pending_play = None;
        self.cmd_tx
            .send(cmd)
            .map_err(|_| PlaybackError::ShutdownInProgress)
    }

    /// 加载并（可选）准备、播放一个条目
    ///
    /// 同一条目的请求仍在排队且中间没有其他命令时，`start_when_prepared` 会 OR
    /// 进那个请求；新请求本身仍按自己的参数执行。
    pub fn play_media_object(
        &self,
        playable: Arc<Playable>,
        streaming: bool,
        start_when_prepared: bool,
        prepare_immediately: bool,
    ) -> Result<(), PlaybackError> {
        if self.shared.is_shutting_down() {
            return Err(PlaybackError::ShutdownInProgress);
        }

        let flag = StartFlag::new(start_when_prepared);
        let mut state = self.shared.state.lock();
        match &state.pending_play {
            Some((id, pending)) if *id == playable.id => pending.raise(start_when_prepared),
            _ => state.pending_play = Some((playable.id, flag.clone())),
        }

        self.cmd_tx
            .send(Command::Play {
                playable,
                streaming,
                start_when_prepared: flag,
                prepare_immediately,
            })
            .map_err(|_| PlaybackError::ShutdownInProgress)
    }

    pub fn prepare(&self) -> Result<(), PlaybackError> {
        self.send(Command::Prepare)
    }

    pub fn resume(&self) -> Result<(), PlaybackError> {
        self.send(Command::Resume)
    }

    /// 暂停；`reinit` 只对串流生效
    pub fn pause(&self, abandon_audio_focus: bool, reinit: bool) -> Result<(), PlaybackError> {
        self.send(Command::Pause {
            abandon_audio_focus,
            reinit,
        })
    }

    pub fn seek_to(&self, position: Duration) -> Result<(), PlaybackError> {
        self.send(Command::Seek(position))
    }

    /// 重建引擎并恢复到之前的状态
    pub fn reinit(&self) -> Result<(), PlaybackError> {
        self.send(Command::Reinit)
    }

    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.send(Command::Stop)
    }

    /// 跳过当前条目，播放队列中的下一项
    pub fn skip(&self) -> Result<(), PlaybackError> {
        self.send(Command::Skip)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.send(Command::SetVolume(volume))
    }

    /// 音频焦点指令：是否允许播放
    pub fn set_audio_focus(&self, may_play: bool) -> Result<(), PlaybackError> {
        self.send(Command::AudioFocus(may_play))
    }

    /// 关闭控制器并等待工作线程退出
    ///
    /// 返回后不会再有任何回调。可重复调用。
    pub fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::Release);
        let _ = self.cmd_tx.send(Command::Shutdown);

        // 在回调里调用时不能 join 自己
        if thread::current().id() == self.worker_id {
            debug!("Shutdown requested from worker thread");
            return;
        }

        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                error!("Playback worker panicked");
            }
        }
    }

    pub fn info(&self) -> PlaybackInfo {
        self.shared.state.lock().info.clone()
    }

    pub fn status(&self) -> PlayerStatus {
        self.shared.state.lock().info.status()
    }

    pub fn playable(&self) -> Option<Arc<Playable>> {
        self.shared.state.lock().info.playable().cloned()
    }

    pub fn is_start_when_prepared(&self) -> bool {
        self.shared.state.lock().start_when_prepared
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.state.lock().streaming
    }

    /// 当前播放位置
    pub fn position(&self) -> Option<Duration> {
        let state = self.shared.state.lock();
        state.info.playable().map(|_| state.clock.now())
    }

    pub fn duration(&self) -> Option<Duration> {
        let state = self.shared.state.lock();
        state.info.playable().and(state.duration)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
