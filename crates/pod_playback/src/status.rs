//! 播放状态定义

use std::fmt;

/// 播放器状态
///
/// 声明顺序即生命周期顺序，`Ord` 按此比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PlayerStatus {
    #[default]
    Stopped,
    Indeterminate,
    Error,
    Initialized,
    Initializing,
    Prepared,
    Preparing,
    Paused,
    Playing,
    Seeking,
}

impl PlayerStatus {
    /// 该状态下快照是否必须携带 playable
    pub fn has_playable(self) -> bool {
        !matches!(self, PlayerStatus::Stopped | PlayerStatus::Error)
    }

    /// 可以直接开始/继续播放
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            PlayerStatus::Prepared | PlayerStatus::Paused | PlayerStatus::Playing
        )
    }

    /// 可以跳转
    pub fn is_seekable(self) -> bool {
        self.is_resumable()
    }

    /// 引擎已完成 prepare
    pub fn is_prepared(self) -> bool {
        matches!(
            self,
            PlayerStatus::Prepared
                | PlayerStatus::Paused
                | PlayerStatus::Playing
                | PlayerStatus::Seeking
        )
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerStatus::Stopped => "STOPPED",
            PlayerStatus::Indeterminate => "INDETERMINATE",
            PlayerStatus::Error => "ERROR",
            PlayerStatus::Initialized => "INITIALIZED",
            PlayerStatus::Initializing => "INITIALIZING",
            PlayerStatus::Prepared => "PREPARED",
            PlayerStatus::Preparing => "PREPARING",
            PlayerStatus::Paused => "PAUSED",
            PlayerStatus::Playing => "PLAYING",
            PlayerStatus::Seeking => "SEEKING",
        };
        f.write_str(name)
    }
}
