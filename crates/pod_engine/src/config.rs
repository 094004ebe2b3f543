//! 引擎配置

use std::time::Duration;

/// 引擎配置
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// 输出缓冲区大小（帧）
    pub output_buffer_frames: usize,
    /// 音轨未声明采样率时使用
    pub fallback_sample_rate: u32,
    /// HTTP 连接以及每次读取的超时
    pub http_timeout: Duration,
    /// 串流下载到内存的上限（字节）
    pub max_stream_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_buffer_frames: 8192,
            fallback_sample_rate: 44100,
            http_timeout: Duration::from_secs(30),
            max_stream_bytes: 512 * 1024 * 1024,
        }
    }
}
