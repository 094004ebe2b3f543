//! 控制器命令定义（调用方 -> 工作线程）

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{EngineEvent, Playable};

/// 排队中的播放请求的 start_when_prepared 标志
///
/// 同一条目的后续请求会把标志 OR 进来，不会降级。
#[derive(Debug, Clone, Default)]
pub(crate) struct StartFlag(Arc<AtomicBool>);

impl StartFlag {
    pub(crate) fn new(value: bool) -> Self {
        Self(Arc::new(AtomicBool::new(value)))
    }

    pub(crate) fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn raise(&self, value: bool) {
        self.0.fetch_or(value, Ordering::AcqRel);
    }

    pub(crate) fn same(&self, other: &StartFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// 工作线程命令
#[derive(Debug)]
pub(crate) enum Command {
    Play {
        playable: Arc<Playable>,
        streaming: bool,
        start_when_prepared: StartFlag,
        prepare_immediately: bool,
    },
    Prepare,
    Resume,
    Pause {
        abandon_audio_focus: bool,
        reinit: bool,
    },
    Seek(Duration),
    Reinit,
    Stop,
    Skip,
    SetVolume(f32),
    AudioFocus(bool),
    /// 引擎回调，带代号
    Engine {
        generation: u64,
        event: EngineEvent,
    },
    Shutdown,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Prepare => "prepare",
            Command::Resume => "resume",
            Command::Pause { .. } => "pause",
            Command::Seek(_) => "seek",
            Command::Reinit => "reinit",
            Command::Stop => "stop",
            Command::Skip => "skip",
            Command::SetVolume(_) => "set_volume",
            Command::AudioFocus(_) => "audio_focus",
            Command::Engine { .. } => "engine_event",
            Command::Shutdown => "shutdown",
        }
    }
}
