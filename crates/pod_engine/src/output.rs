//! 音频输出
//!
//! 使用 cpal 进行音频播放。解码线程通过 [`SampleWriter`] 写入环形缓冲区，
//! 音频回调从中读取；缓冲区满时写入方自行等待。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;

/// 音频输出错误
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("No output device available")]
    NoDevice,
    #[error("No supported config for {channels} channels at {sample_rate} Hz")]
    NoConfig { sample_rate: u32, channels: u16 },
    #[error("Stream error: {0}")]
    Stream(String),
}

/// 音频输出配置
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// 缓冲区大小（帧）
    pub buffer_frames: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            buffer_frames: 8192,
        }
    }
}

/// 输出流与写入方共享的状态
struct OutputShared {
    ring: RingBuffer,
    playing: AtomicBool,
    frames_played: AtomicU64,
    /// f32 的位模式
    volume: AtomicU32,
    channels: usize,
}

/// 音频输出流
///
/// cpal 的流不能跨线程移动，`AudioOutput` 留在创建它的线程上。
pub struct AudioOutput {
    _stream: Stream,
    shared: Arc<OutputShared>,
    sample_rate: u32,
}

impl AudioOutput {
    /// 在默认设备上创建音频输出
    pub fn new(
        config: OutputConfig,
        on_error: impl FnMut(String) + Send + 'static,
    ) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;

        Self::with_device(&device, config, on_error)
    }

    /// 使用指定设备创建音频输出
    pub fn with_device(
        device: &Device,
        config: OutputConfig,
        mut on_error: impl FnMut(String) + Send + 'static,
    ) -> Result<Self, OutputError> {
        let supported_config = device
            .supported_output_configs()
            .map_err(|e| OutputError::Stream(e.to_string()))?
            .find(|c| {
                c.channels() == config.channels
                    && c.min_sample_rate().0 <= config.sample_rate
                    && c.max_sample_rate().0 >= config.sample_rate
                    && c.sample_format() == SampleFormat::F32
            })
            .ok_or(OutputError::NoConfig {
                sample_rate: config.sample_rate,
                channels: config.channels,
            })?;

        let stream_config: StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(config.sample_rate))
            .into();

        let channels = config.channels as usize;
        let shared = Arc::new(OutputShared {
            ring: RingBuffer::new(config.buffer_frames * channels),
            playing: AtomicBool::new(false),
            frames_played: AtomicU64::new(0),
            volume: AtomicU32::new(1.0f32.to_bits()),
            channels,
        });

        let callback_shared = shared.clone();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_shared.fill(data);
                },
                move |err| {
                    log::error!("Audio output error: {}", err);
                    on_error(err.to_string());
                },
                None,
            )
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        stream.play().map_err(|e| OutputError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            shared,
            sample_rate: config.sample_rate,
        })
    }

    /// 解码线程使用的写入端
    pub fn writer(&self) -> SampleWriter {
        SampleWriter {
            shared: self.shared.clone(),
        }
    }

    /// 设置播放状态
    pub fn set_playing(&self, playing: bool) {
        self.shared.playing.store(playing, Ordering::Relaxed);
    }

    pub fn set_volume(&self, volume: f32) {
        self.shared.set_volume(volume);
    }

    /// 自上次重置以来实际输出的时长
    pub fn position(&self) -> Duration {
        let frames = self.shared.frames_played.load(Ordering::Relaxed);
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// 丢弃缓冲并把位置归零（跳转后调用）
    pub fn reset(&self) {
        self.shared.ring.clear();
        self.shared.frames_played.store(0, Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl OutputShared {
    fn set_volume(&self, volume: f32) {
        self.volume.store(volume.max(0.0).to_bits(), Ordering::Relaxed);
    }

    fn fill(&self, data: &mut [f32]) {
        if !self.playing.load(Ordering::Relaxed) {
            // 暂停时输出静音
            data.fill(0.0);
            return;
        }

        let read = self.ring.read(data);
        let volume = f32::from_bits(self.volume.load(Ordering::Relaxed));
        for sample in &mut data[..read] {
            *sample *= volume;
        }
        data[read..].fill(0.0);

        self.frames_played
            .fetch_add((read / self.channels) as u64, Ordering::Relaxed);
    }
}

/// 环形缓冲区的写入端，可以移到其他线程
#[derive(Clone)]
pub struct SampleWriter {
    shared: Arc<OutputShared>,
}

impl SampleWriter {
    /// 尽量写入，返回写入的采样数
    pub fn write(&self, samples: &[f32]) -> usize {
        self.shared.ring.write(samples)
    }

    /// 缓冲区中尚未播放的采样数
    pub fn buffered(&self) -> usize {
        self.shared.ring.len()
    }
}

/// 定长环形缓冲区，满时拒绝写入
struct RingBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn write(&self, data: &[f32]) -> usize {
        let mut buf = self.buffer.lock();
        let n = data.len().min(self.capacity - buf.len());
        buf.extend(data[..n].iter().copied());
        n
    }

    fn read(&self, output: &mut [f32]) -> usize {
        let mut buf = self.buffer.lock();
        let to_read = output.len().min(buf.len());
        for (dst, src) in output.iter_mut().zip(buf.drain(..to_read)) {
            *dst = src;
        }
        to_read
    }

    fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    fn clear(&self) {
        self.buffer.lock().clear();
    }
}
