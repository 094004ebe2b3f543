//! 控制器配置

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::PlaybackError;

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 工作线程名
    pub worker_thread_name: String,
    /// 因短暂失去音频焦点而暂停后，重新获得焦点时自动继续
    pub resume_on_focus_regain: bool,
    /// 初始音量 (0.0 - 1.0)
    pub volume: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: "pod-playback".to_string(),
            resume_on_focus_regain: true,
            volume: 1.0,
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PlaybackError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PlaybackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self, PlaybackError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.worker_thread_name.trim().is_empty() {
            return Err(PlaybackError::Config(
                "worker_thread_name must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(PlaybackError::Config(format!(
                "volume {} out of range 0.0..=1.0",
                self.volume
            )));
        }
        Ok(())
    }
}
