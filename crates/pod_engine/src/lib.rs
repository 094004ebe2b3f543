//! pod_engine - 音频引擎
//!
//! 基于 symphonia 解码、cpal 输出的 [`pod_playback::MediaEngine`] 实现。
//! 默认开启 `http-streaming`，可以直接打开 HTTP 串流地址。

mod config;
mod decoder;
mod engine;
mod output;
mod source;

pub use config::EngineConfig;
pub use decoder::*;
pub use engine::{SymphoniaEngine, SymphoniaEngineFactory};
pub use output::*;
pub use source::*;
