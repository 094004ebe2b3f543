//! 可播放条目描述

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::PlaybackError;

/// 媒体文件标识，用于判等和去重
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// 音量适配设置（按订阅源配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeAdaptation {
    #[default]
    Off,
    LightReduction,
    HeavyReduction,
    LightBoost,
    MediumBoost,
    HeavyBoost,
}

impl VolumeAdaptation {
    /// 对应的增益系数
    pub fn factor(self) -> f32 {
        match self {
            VolumeAdaptation::Off => 1.0,
            VolumeAdaptation::LightReduction => 0.5,
            VolumeAdaptation::HeavyReduction => 0.2,
            VolumeAdaptation::LightBoost => 1.5,
            VolumeAdaptation::MediumBoost => 2.0,
            VolumeAdaptation::HeavyBoost => 2.5,
        }
    }
}

/// 引擎打开的音源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    File(PathBuf),
    Stream(String),
}

impl SourceLocator {
    pub fn is_stream(&self) -> bool {
        matches!(self, SourceLocator::Stream(_))
    }

    /// 文件扩展名，作为解码提示
    pub fn extension_hint(&self) -> Option<&str> {
        match self {
            SourceLocator::File(path) => path.extension().and_then(|e| e.to_str()),
            SourceLocator::Stream(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                Path::new(path).extension().and_then(|e| e.to_str())
            }
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::File(path) => write!(f, "file:{}", path.display()),
            SourceLocator::Stream(url) => f.write_str(url),
        }
    }
}

/// 一个可播放的条目
///
/// 由调用方持有，控制器在一次播放会话期间通过 `Arc` 引用它。
#[derive(Debug, Clone)]
pub struct Playable {
    pub id: MediaId,
    pub title: String,
    pub stream_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub duration_hint: Option<Duration>,
    /// 上次播放到的位置
    pub position: Duration,
    pub volume_adaptation: VolumeAdaptation,
}

impl Playable {
    pub fn new(id: MediaId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            stream_url: None,
            local_path: None,
            duration_hint: None,
            position: Duration::ZERO,
            volume_adaptation: VolumeAdaptation::Off,
        }
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_duration_hint(mut self, duration: Duration) -> Self {
        self.duration_hint = Some(duration);
        self
    }

    pub fn with_position(mut self, position: Duration) -> Self {
        self.position = position;
        self
    }

    pub fn with_volume_adaptation(mut self, adaptation: VolumeAdaptation) -> Self {
        self.volume_adaptation = adaptation;
        self
    }

    /// 本地文件是否存在
    pub fn local_file_available(&self) -> bool {
        self.local_path.as_deref().is_some_and(Path::exists)
    }

    /// 按播放方式选择音源
    pub fn source(&self, streaming: bool) -> Result<SourceLocator, PlaybackError> {
        let source = if streaming {
            self.stream_url.clone().map(SourceLocator::Stream)
        } else {
            self.local_path.clone().map(SourceLocator::File)
        };
        source.ok_or(PlaybackError::MissingSource { streaming })
    }
}

impl PartialEq for Playable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Playable {}

/// 根据标识解析出可播放条目（外部协作者）
///
/// 播放位置是否重置由实现方决定，控制器只使用返回的位置。
pub trait PlayableResolver {
    fn resolve(&self, identifier: &str) -> Result<Playable, PlaybackError>;
}
