//! 引擎适配接口
//!
//! 控制器只通过这里的 trait 驱动底层音频引擎。引擎实例只在工作线程上创建和使用，
//! 异步事件经由 [`EngineEventSink`] 回到命令队列。

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::command::Command;
use crate::controller::Shared;
use crate::SourceLocator;

/// 引擎错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Io,
    Decode,
    Output,
    Network,
    Unknown,
}

/// 引擎错误
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Open failed: {0}")]
    Open(String),
    #[error("Runtime error ({kind:?}): {message}")]
    Runtime {
        kind: EngineErrorKind,
        message: String,
    },
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Engine already released")]
    Released,
}

impl EngineError {
    pub fn runtime(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        EngineError::Runtime {
            kind,
            message: message.into(),
        }
    }
}

/// 引擎异步事件（引擎 -> 控制器）
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// 播放到末尾
    Completed,
    /// 运行期错误
    Error(EngineErrorKind, String),
    /// 缓冲进度（百分比）
    BufferingUpdate(u8),
}

/// 引擎事件出口，带有所属引擎实例的代号
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    generation: u64,
    tx: Sender<Command>,
    shared: Arc<Shared>,
}

impl EngineEventSink {
    pub(crate) fn new(generation: u64, tx: Sender<Command>, shared: Arc<Shared>) -> Self {
        Self {
            generation,
            tx,
            shared,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 投递事件；控制器已关闭时返回 false
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx
            .send(Command::Engine {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// 控制器正在关闭；阻塞中的 `open` / `prepare` 应尽快放弃
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_shutting_down()
    }
}

/// 一个音频引擎实例
///
/// 所有方法都在控制器工作线程上调用，`open` 与 `prepare` 可以阻塞，但必须在
/// [`EngineEventSink::is_cancelled`] 变为 true 后有限时间内返回。
pub trait MediaEngine {
    fn open(&mut self, source: &SourceLocator) -> Result<(), EngineError>;

    /// 准备播放，返回媒体时长（若已知）
    fn prepare(&mut self) -> Result<Option<Duration>, EngineError>;

    fn start(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    fn seek(&mut self, position: Duration) -> Result<(), EngineError>;

    fn set_volume(&mut self, volume: f32);

    /// 引擎报告的当前位置
    fn position(&self) -> Option<Duration>;

    fn release(&mut self) -> Result<(), EngineError>;
}

/// 引擎工厂，每次初始化/重建时创建新的引擎实例
pub trait EngineFactory: Send + 'static {
    fn create(&mut self, events: EngineEventSink) -> Result<Box<dyn MediaEngine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: FnMut(EngineEventSink) -> Result<Box<dyn MediaEngine>, EngineError> + Send + 'static,
{
    fn create(&mut self, events: EngineEventSink) -> Result<Box<dyn MediaEngine>, EngineError> {
        self(events)
    }
}
