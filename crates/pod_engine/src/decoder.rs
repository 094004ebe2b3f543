//! 音频解码器
//!
//! 使用 symphonia 解码音频流

use std::time::Duration;

use pod_playback::EngineErrorKind;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

/// 解码器错误
#[derive(thiserror::Error, Debug)]
pub enum DecoderError {
    #[error("No supported audio track found")]
    NoTrack,
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SymphoniaError> for DecoderError {
    fn from(e: SymphoniaError) -> Self {
        match e {
            SymphoniaError::IoError(e) => DecoderError::Io(e),
            SymphoniaError::Unsupported(what) => DecoderError::UnsupportedCodec(what.to_string()),
            other => DecoderError::Decode(other.to_string()),
        }
    }
}

impl DecoderError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            DecoderError::Io(_) => EngineErrorKind::Io,
            _ => EngineErrorKind::Decode,
        }
    }
}

/// 音频信息
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub duration: Option<Duration>,
    pub codec: String,
}

/// 音频解码器
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pub info: AudioInfo,
}

impl AudioDecoder {
    /// 探测格式并创建解码器
    pub fn new(
        source: Box<dyn MediaSource>,
        hint: Option<&str>,
        fallback_sample_rate: u32,
    ) -> Result<Self, DecoderError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint {
            probe_hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &probe_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        let format = probed.format;

        // 第一个可解码的音频轨道
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoTrack)?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or(fallback_sample_rate);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);
        let duration = codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        let info = AudioInfo {
            sample_rate,
            channels,
            duration,
            codec: format!("{:?}", codec_params.codec),
        };

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|_| DecoderError::UnsupportedCodec(info.codec.clone()))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_buf: None,
            info,
        })
    }

    /// 解码下一包，返回交错的 f32 采样；到达末尾时返回 `None`
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                // 损坏的包直接跳过
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::debug!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.capacity();

            let too_small = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < frames * spec.channels.count());
            if too_small {
                self.sample_buf = None;
            }
            let sample_buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::new(frames as u64, spec));
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }

    /// 跳转到指定时间
    pub fn seek(&mut self, time: Duration) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: Time::from(time.as_secs_f64()),
            track_id: Some(self.track_id),
        };

        self.format.seek(SeekMode::Accurate, seek_to)?;
        self.decoder.reset();

        Ok(())
    }
}
