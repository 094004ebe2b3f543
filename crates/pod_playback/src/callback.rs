//! 状态回调（控制器 -> 调用方）

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::{PlaybackInfo, Playable};

/// 状态回调接口
///
/// 所有方法都在工作线程上同步调用，实现不得阻塞。
pub trait StatusCallback: Send + 'static {
    /// 每次提交状态变化后调用
    fn status_changed(&self, info: &PlaybackInfo);

    /// 播放需要结束，且不是由直接命令引起的（播放完毕且无下一项、事后的引擎错误）
    fn should_stop(&self);

    fn playback_started(&self, _playable: &Arc<Playable>, _position: Duration) {}

    fn playback_paused(&self, _playable: &Arc<Playable>, _position: Duration) {}

    /// 离开一个条目：`ended` 表示播完，`skipped` 表示被跳过
    fn post_playback(&self, _playable: &Arc<Playable>, _ended: bool, _skipped: bool) {}

    fn buffering_update(&self, _percent: u8) {}

    /// 播放完毕后要接着播放的条目
    fn next_in_queue(&self, _current: &Playable) -> Option<Arc<Playable>> {
        None
    }
}

/// 播放器事件
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// 状态变更
    StatusChanged(PlaybackInfo),
    /// 应当停止播放
    ShouldStop,
    PlaybackStarted {
        playable: Arc<Playable>,
        position: Duration,
    },
    PlaybackPaused {
        playable: Arc<Playable>,
        position: Duration,
    },
    PostPlayback {
        playable: Arc<Playable>,
        ended: bool,
        skipped: bool,
    },
    /// 缓冲进度
    Buffering(u8),
}

/// 把回调转成 [`PlayerEvent`] 发送到通道
pub struct ChannelCallback {
    evt_tx: Sender<PlayerEvent>,
}

impl ChannelCallback {
    pub fn new(evt_tx: Sender<PlayerEvent>) -> Self {
        Self { evt_tx }
    }

    fn send(&self, event: PlayerEvent) {
        let _ = self.evt_tx.send(event);
    }
}

impl StatusCallback for ChannelCallback {
    fn status_changed(&self, info: &PlaybackInfo) {
        self.send(PlayerEvent::StatusChanged(info.clone()));
    }

    fn should_stop(&self) {
        self.send(PlayerEvent::ShouldStop);
    }

    fn playback_started(&self, playable: &Arc<Playable>, position: Duration) {
        self.send(PlayerEvent::PlaybackStarted {
            playable: Arc::clone(playable),
            position,
        });
    }

    fn playback_paused(&self, playable: &Arc<Playable>, position: Duration) {
        self.send(PlayerEvent::PlaybackPaused {
            playable: Arc::clone(playable),
            position,
        });
    }

    fn post_playback(&self, playable: &Arc<Playable>, ended: bool, skipped: bool) {
        self.send(PlayerEvent::PostPlayback {
            playable: Arc::clone(playable),
            ended,
            skipped,
        });
    }

    fn buffering_update(&self, percent: u8) {
        self.send(PlayerEvent::Buffering(percent));
    }
}
