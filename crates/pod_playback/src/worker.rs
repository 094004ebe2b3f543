//! 命令工作线程
//!
//! 唯一接触引擎和会话状态的线程。每个命令完整执行后才取下一个，状态变化按顺序
//! 发布到共享快照并同步回调。

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::command::{Command, StartFlag};
use crate::controller::{Published, Shared};
use crate::info::PositionClock;
use crate::{
    ControllerConfig, EngineError, EngineEvent, EngineEventSink, EngineFactory, MediaEngine,
    PlaybackError, PlaybackInfo, Playable, PlayerStatus, SourceLocator, StatusCallback,
};

/// 中止当前状态转换的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    /// 控制器正在关闭
    Shutdown,
    /// 引擎出错，已进入 ERROR
    Failed,
}

type Step = Result<(), Abort>;

/// 会话状态，只由工作线程修改
struct Session {
    status: PlayerStatus,
    playable: Option<Arc<Playable>>,
    engine: Option<Box<dyn MediaEngine>>,
    start_when_prepared: bool,
    streaming: bool,
    paused_by_focus_loss: bool,
    volume: f32,
}

pub(crate) struct Worker {
    factory: Box<dyn EngineFactory>,
    callback: Box<dyn StatusCallback>,
    cmd_tx: Sender<Command>,
    shared: Arc<Shared>,
    session: Session,
    resume_on_focus_regain: bool,
}

impl Worker {
    pub(crate) fn new(
        factory: Box<dyn EngineFactory>,
        callback: Box<dyn StatusCallback>,
        cmd_tx: Sender<Command>,
        shared: Arc<Shared>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            factory,
            callback,
            cmd_tx,
            shared,
            session: Session {
                status: PlayerStatus::Stopped,
                playable: None,
                engine: None,
                start_when_prepared: false,
                streaming: false,
                paused_by_focus_loss: false,
                volume: config.volume,
            },
            resume_on_focus_regain: config.resume_on_focus_regain,
        }
    }

    pub(crate) fn run(mut self, cmd_rx: Receiver<Command>) {
        debug!("Playback worker started");

        for cmd in cmd_rx.iter() {
            if matches!(cmd, Command::Shutdown) || self.shared.is_shutting_down() {
                break;
            }

            let name = cmd.name();
            if let Err(Abort::Shutdown) = self.handle_command(cmd) {
                debug!("Command {} interrupted by shutdown", name);
                break;
            }
        }

        self.teardown();
        debug!("Playback worker exited");
    }

    fn handle_command(&mut self, cmd: Command) -> Step {
        match cmd {
            Command::Play {
                playable,
                streaming,
                start_when_prepared,
                prepare_immediately,
            } => self.play(playable, streaming, start_when_prepared, prepare_immediately),
            Command::Prepare => {
                if self.session.status != PlayerStatus::Initialized {
                    self.ignore("prepare");
                    return Ok(());
                }
                self.prepare()
            }
            Command::Resume => self.resume(),
            Command::Pause {
                abandon_audio_focus,
                reinit,
            } => self.pause(abandon_audio_focus, reinit),
            Command::Seek(position) => self.seek(position),
            Command::Reinit => self.reinit(),
            Command::Stop => {
                let Some(playable) = self.session.playable.clone() else {
                    self.ignore("stop");
                    return Ok(());
                };
                self.notify(|cb| cb.post_playback(&playable, false, false));
                self.stop_sequence();
                Ok(())
            }
            Command::Skip => self.skip(),
            Command::SetVolume(volume) => {
                if !volume.is_finite() {
                    warn!("Ignoring volume {}", volume);
                    return Ok(());
                }
                self.session.volume = volume.clamp(0.0, 1.0);
                self.apply_volume();
                Ok(())
            }
            Command::AudioFocus(may_play) => self.audio_focus(may_play),
            Command::Engine { generation, event } => self.engine_event(generation, event),
            Command::Shutdown => Err(Abort::Shutdown),
        }
    }

    // ------------------------------------------------------------------
    // 状态转换
    // ------------------------------------------------------------------

    fn play(
        &mut self,
        playable: Arc<Playable>,
        streaming: bool,
        flag: StartFlag,
        prepare_immediately: bool,
    ) -> Step {
        let start_when_prepared = {
            let mut state = self.shared.state.lock();
            if matches!(&state.pending_play, Some((_, pending)) if pending.same(&flag)) {
                state.pending_play = None;
            }
            flag.get()
        };

        let same_item = self
            .session
            .playable
            .as_ref()
            .is_some_and(|current| current.id == playable.id);

        if same_item {
            let status = self.session.status;
            if status.is_resumable() {
                debug!("{} already loaded in {}", playable.title, status);
                if start_when_prepared && status != PlayerStatus::Playing {
                    return self.resume();
                }
                return Ok(());
            }
            if status == PlayerStatus::Initialized {
                self.session.start_when_prepared |= start_when_prepared;
                self.publish(|state| state.start_when_prepared |= start_when_prepared);
                if prepare_immediately {
                    return self.prepare();
                }
                return Ok(());
            }
        }

        // 切换条目：静默释放旧引擎
        if let Some(previous) = self.session.playable.take() {
            self.notify(|cb| cb.post_playback(&previous, false, false));
        }
        self.release_engine();

        let source = match playable.source(streaming) {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e)),
        };

        info!("Loading {} ({}) from {}", playable.title, playable.id, source);

        self.session.streaming = streaming;
        self.session.start_when_prepared = start_when_prepared;
        self.session.paused_by_focus_loss = false;
        self.publish(|state| {
            state.clock = PositionClock::at(playable.position);
            state.duration = playable.duration_hint;
        });
        self.session.playable = Some(playable);

        self.open(&source)?;
        if prepare_immediately {
            self.prepare()?;
        }
        Ok(())
    }

    /// INITIALIZING -> INITIALIZED，使用新的引擎实例
    fn open(&mut self, source: &SourceLocator) -> Step {
        self.set_status(PlayerStatus::Initializing);
        self.checkpoint()?;

        self.create_engine()?;
        let opened = match self.session.engine.as_mut() {
            Some(engine) => engine.open(source),
            None => return Err(Abort::Failed),
        };
        // 关闭时被取消的 open 不算失败
        self.checkpoint()?;
        if let Err(e) = opened {
            return Err(self.fail(PlaybackError::EngineOpenFailed(e.to_string())));
        }

        self.apply_volume();
        self.set_status(PlayerStatus::Initialized);
        Ok(())
    }

    /// PREPARING -> PREPARED，之后按 start_when_prepared 开始播放
    fn prepare(&mut self) -> Step {
        self.set_status(PlayerStatus::Preparing);

        let prepared = match self.session.engine.as_mut() {
            Some(engine) => engine.prepare(),
            None => return Err(Abort::Failed),
        };
        self.checkpoint()?;
        let duration = match prepared {
            Ok(duration) => duration,
            Err(e) => return Err(self.fail(PlaybackError::EngineOpenFailed(e.to_string()))),
        };

        let position = {
            let mut state = self.shared.state.lock();
            if duration.is_some() {
                state.duration = duration;
            }
            state.clock.now()
        };

        if position > Duration::ZERO {
            debug!("Restoring position {:?}", position);
            self.engine_call(|engine| engine.seek(position))?;
        }

        self.set_status(PlayerStatus::Prepared);

        if self.session.start_when_prepared {
            self.resume()?;
        }
        Ok(())
    }

    fn resume(&mut self) -> Step {
        let status = self.session.status;
        if !matches!(status, PlayerStatus::Paused | PlayerStatus::Prepared) {
            self.ignore("resume");
            return Ok(());
        }

        self.engine_call(|engine| engine.start())?;
        self.session.paused_by_focus_loss = false;

        let position = self.publish(|state| {
            state.clock.start();
            state.clock.now()
        });
        self.set_status(PlayerStatus::Playing);

        if let Some(playable) = self.session.playable.clone() {
            self.notify(|cb| cb.playback_started(&playable, position));
        }
        Ok(())
    }

    fn pause(&mut self, abandon_audio_focus: bool, reinit: bool) -> Step {
        if self.session.status != PlayerStatus::Playing {
            self.ignore("pause");
            return Ok(());
        }

        self.engine_call(|engine| engine.pause())?;
        let reported = self.session.engine.as_ref().and_then(|e| e.position());
        let position = self.publish(|state| {
            state.clock.stop(reported);
            state.clock.now()
        });

        if abandon_audio_focus {
            self.session.paused_by_focus_loss = false;
        }
        self.session.start_when_prepared = false;
        self.set_status(PlayerStatus::Paused);

        if let Some(playable) = self.session.playable.clone() {
            self.notify(|cb| cb.playback_paused(&playable, position));
        }

        if reinit {
            if self.session.streaming {
                // 串流无法廉价地暂停后继续，重建引擎
                let source = self.current_source()?;
                self.release_engine();
                self.open(&source)?;
            } else {
                debug!("Skipping reinit for local source");
            }
        }
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Step {
        let prior = self.session.status;
        if !prior.is_seekable() {
            self.ignore("seek");
            return Ok(());
        }

        let duration = self.shared.state.lock().duration;
        let position = match duration {
            Some(duration) => position.min(duration),
            None => position,
        };

        self.set_status(PlayerStatus::Seeking);
        self.engine_call(|engine| engine.seek(position))?;
        self.publish(|state| state.clock.rebase(position));
        self.set_status(prior);
        Ok(())
    }

    /// 重建引擎，回到之前到达过的状态
    fn reinit(&mut self) -> Step {
        if self.session.playable.is_none() {
            self.ignore("reinit");
            return Ok(());
        }

        let prior = self.session.status;
        let source = self.current_source()?;
        let reported = self.session.engine.as_ref().and_then(|e| e.position());
        self.publish(|state| state.clock.stop(reported));

        debug!("Reinitializing engine from {}", prior);
        self.release_engine();
        self.open(&source)?;

        if prior.is_prepared() || prior == PlayerStatus::Preparing {
            let start_when_prepared = self.session.start_when_prepared;
            self.session.start_when_prepared = false;
            let prepared = self.prepare();
            self.session.start_when_prepared = start_when_prepared;
            prepared?;

            match prior {
                PlayerStatus::Playing | PlayerStatus::Seeking => self.resume()?,
                PlayerStatus::Paused => self.set_status(PlayerStatus::Paused),
                _ => {}
            }
        }
        Ok(())
    }

    fn skip(&mut self) -> Step {
        let Some(playable) = self.session.playable.clone() else {
            self.ignore("skip");
            return Ok(());
        };
        self.notify(|cb| cb.post_playback(&playable, false, true));
        self.continue_after(&playable, false)
    }

    fn audio_focus(&mut self, may_play: bool) -> Step {
        if !may_play {
            if self.session.status == PlayerStatus::Playing {
                debug!("Audio focus lost, pausing");
                self.pause(false, false)?;
                self.session.paused_by_focus_loss = true;
            }
            return Ok(());
        }

        if self.session.paused_by_focus_loss
            && self.resume_on_focus_regain
            && self.session.status == PlayerStatus::Paused
        {
            debug!("Audio focus regained, resuming");
            return self.resume();
        }
        self.session.paused_by_focus_loss = false;
        Ok(())
    }

    fn engine_event(&mut self, generation: u64, event: EngineEvent) -> Step {
        let current = self.shared.state.lock().generation;
        if generation != current || self.session.engine.is_none() {
            debug!(
                "Dropping stale engine event {:?} (generation {}, current {})",
                event, generation, current
            );
            return Ok(());
        }

        match event {
            EngineEvent::Completed => {
                if !self.session.status.is_prepared() {
                    self.ignore("completion");
                    return Ok(());
                }
                let Some(playable) = self.session.playable.clone() else {
                    return Ok(());
                };
                info!("Finished {} ({})", playable.title, playable.id);
                self.notify(|cb| cb.post_playback(&playable, true, false));
                self.continue_after(&playable, true)
            }
            EngineEvent::Error(kind, message) => {
                let error = PlaybackError::EngineRuntime(format!("{:?}: {}", kind, message));
                self.fail(error);
                self.notify(|cb| cb.should_stop());
                Ok(())
            }
            EngineEvent::BufferingUpdate(percent) => {
                self.notify(|cb| cb.buffering_update(percent.min(100)));
                Ok(())
            }
        }
    }

    /// 离开当前条目后，播放下一项或停止
    fn continue_after(&mut self, current: &Playable, ended_by_engine: bool) -> Step {
        match self.callback.next_in_queue(current) {
            Some(next) => {
                let streaming = !next.local_file_available() && next.stream_url.is_some();
                // 已经通知过 post_playback，避免再报一次
                self.session.playable = None;
                self.play(next, streaming, StartFlag::new(true), true)
            }
            None => {
                if ended_by_engine {
                    self.notify(|cb| cb.should_stop());
                }
                self.stop_sequence();
                Ok(())
            }
        }
    }

    fn stop_sequence(&mut self) {
        self.release_engine();
        self.clear_session();
        self.set_status(PlayerStatus::Stopped);
    }

    /// 引擎出错：释放引擎，进入 ERROR
    fn fail(&mut self, error: PlaybackError) -> Abort {
        error!("Playback failed: {}", error);
        self.release_engine();
        self.clear_session();
        self.set_status(PlayerStatus::Error);
        Abort::Failed
    }

    fn teardown(&mut self) {
        self.release_engine();
        self.clear_session();
        self.session.status = PlayerStatus::Stopped;
        self.publish(|state| {
            state.info = PlaybackInfo::stopped();
            state.pending_play = None;
        });
    }

    // ------------------------------------------------------------------
    // 引擎
    // ------------------------------------------------------------------

    fn create_engine(&mut self) -> Step {
        let generation = self.publish(|state| {
            state.generation += 1;
            state.generation
        });
        let sink = EngineEventSink::new(generation, self.cmd_tx.clone(), self.shared.clone());

        match self.factory.create(sink) {
            Ok(engine) => {
                debug!("Created engine generation {}", generation);
                self.session.engine = Some(engine);
                Ok(())
            }
            Err(e) => Err(self.fail(PlaybackError::EngineOpenFailed(e.to_string()))),
        }
    }

    /// 释放引擎；之后到达的旧引擎事件都会被丢弃
    fn release_engine(&mut self) {
        let Some(mut engine) = self.session.engine.take() else {
            return;
        };
        self.publish(|state| state.generation += 1);
        if let Err(e) = engine.release() {
            warn!("Failed to release engine: {}", e);
        }
    }

    fn engine_call<F>(&mut self, f: F) -> Step
    where
        F: FnOnce(&mut dyn MediaEngine) -> Result<(), EngineError>,
    {
        let result = match self.session.engine.as_deref_mut() {
            Some(engine) => f(engine),
            None => Err(EngineError::Released),
        };
        result.map_err(|e| self.fail(PlaybackError::EngineRuntime(e.to_string())))
    }

    fn apply_volume(&mut self) {
        let factor = self
            .session
            .playable
            .as_ref()
            .map_or(1.0, |p| p.volume_adaptation.factor());
        let volume = self.session.volume * factor;
        if let Some(engine) = self.session.engine.as_mut() {
            engine.set_volume(volume);
        }
    }

    fn current_source(&mut self) -> Result<SourceLocator, Abort> {
        let streaming = self.session.streaming;
        let source = match self.session.playable.as_ref() {
            Some(playable) => playable.source(streaming),
            None => Err(PlaybackError::MissingSource { streaming }),
        };
        source.map_err(|e| self.fail(e))
    }

    // ------------------------------------------------------------------
    // 发布与回调
    // ------------------------------------------------------------------

    fn set_status(&mut self, status: PlayerStatus) {
        self.session.status = status;
        let info = PlaybackInfo::new(status, self.session.playable.clone());
        let start_when_prepared = self.session.start_when_prepared;
        let streaming = self.session.streaming;
        self.publish(|state| {
            state.info = info.clone();
            state.start_when_prepared = start_when_prepared;
            state.streaming = streaming;
        });

        debug!("Status -> {}", status);
        self.notify(|cb| cb.status_changed(&info));
    }

    fn publish<R>(&self, f: impl FnOnce(&mut Published) -> R) -> R {
        let mut state = self.shared.state.lock();
        f(&mut state)
    }

    /// 关闭过程中不再回调
    fn notify(&self, f: impl FnOnce(&dyn StatusCallback)) {
        if !self.shared.is_shutting_down() {
            f(self.callback.as_ref());
        }
    }

    fn checkpoint(&self) -> Step {
        if self.shared.is_shutting_down() {
            Err(Abort::Shutdown)
        } else {
            Ok(())
        }
    }

    fn clear_session(&mut self) {
        self.session.playable = None;
        self.session.start_when_prepared = false;
        self.session.paused_by_focus_loss = false;
        self.publish(|state| {
            state.clock = PositionClock::default();
            state.duration = None;
        });
    }

    fn ignore(&self, command: &'static str) {
        debug!(
            "{}",
            PlaybackError::InvalidTransition {
                command,
                status: self.session.status,
            }
        );
    }
}
