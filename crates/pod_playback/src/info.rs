//! 状态快照

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Playable, PlayerStatus};

/// 控制器状态快照，每次状态变化时在锁内构造
#[derive(Debug, Clone, Default)]
pub struct PlaybackInfo {
    status: PlayerStatus,
    playable: Option<Arc<Playable>>,
}

impl PlaybackInfo {
    /// STOPPED / ERROR 状态下丢弃 playable
    pub fn new(status: PlayerStatus, playable: Option<Arc<Playable>>) -> Self {
        let playable = if status.has_playable() { playable } else { None };
        debug_assert!(
            !status.has_playable() || playable.is_some(),
            "{status} snapshot without playable"
        );
        Self { status, playable }
    }

    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn playable(&self) -> Option<&Arc<Playable>> {
        self.playable.as_ref()
    }
}

/// 播放位置时钟
///
/// getter 只读取快照，不触碰引擎。
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PositionClock {
    base: Duration,
    started_at: Option<Instant>,
}

impl PositionClock {
    pub(crate) fn at(position: Duration) -> Self {
        Self {
            base: position,
            started_at: None,
        }
    }

    pub(crate) fn now(&self) -> Duration {
        match self.started_at {
            Some(started) => self.base + started.elapsed(),
            None => self.base,
        }
    }

    pub(crate) fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// 停止计时；引擎报告的位置优先
    pub(crate) fn stop(&mut self, reported: Option<Duration>) {
        self.base = reported.unwrap_or_else(|| self.now());
        self.started_at = None;
    }

    pub(crate) fn rebase(&mut self, position: Duration) {
        self.base = position;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}
