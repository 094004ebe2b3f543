//! pod_playback - 播放控制器
//!
//! 用单个工作线程驱动音频引擎的状态机，并把状态快照按顺序回调给调用方。

mod callback;
mod command;
mod config;
mod controller;
mod engine;
mod error;
mod info;
mod playable;
mod status;
mod worker;

pub use callback::*;
pub use config::*;
pub use controller::PlaybackController;
pub use engine::*;
pub use error::*;
pub use info::PlaybackInfo;
pub use playable::*;
pub use status::*;
