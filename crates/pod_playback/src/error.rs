//! 控制器错误

use crate::PlayerStatus;

/// 播放控制器错误
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("Failed to open engine: {0}")]
    EngineOpenFailed(String),
    #[error("Engine runtime error: {0}")]
    EngineRuntime(String),
    #[error("Command {command} is not applicable in state {status}")]
    InvalidTransition {
        command: &'static str,
        status: PlayerStatus,
    },
    #[error("Controller is shut down")]
    ShutdownInProgress,
    #[error("Playable has no source for streaming={streaming}")]
    MissingSource { streaming: bool },
    #[error("Unknown media: {0}")]
    UnknownMedia(String),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
