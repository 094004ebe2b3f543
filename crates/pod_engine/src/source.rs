//! 音源打开
//!
//! 本地文件直接交给 symphonia；串流地址先整体下载到内存，下载过程中报告缓冲进度。

use std::fs::File;

use pod_playback::{EngineErrorKind, SourceLocator};
use symphonia::core::io::MediaSource;

use crate::EngineConfig;

/// 音源错误
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "http-streaming")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Stream larger than {0} bytes")]
    TooLarge(u64),
    #[error("Cancelled")]
    Cancelled,
    #[error("Streaming support is disabled")]
    StreamingDisabled,
}

impl SourceError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            SourceError::Io(_) => EngineErrorKind::Io,
            _ => EngineErrorKind::Network,
        }
    }
}

/// 打开后的音源
pub struct OpenedSource {
    pub media: Box<dyn MediaSource>,
    /// 扩展名提示，用于格式探测
    pub hint: Option<String>,
}

/// 打开音源
///
/// `progress` 收到 0-100 的下载进度；下载期间 `cancelled` 返回 true 时放弃。
pub fn open_source(
    locator: &SourceLocator,
    config: &EngineConfig,
    progress: impl FnMut(u8),
    cancelled: impl Fn() -> bool,
) -> Result<OpenedSource, SourceError> {
    let hint = locator.extension_hint().map(str::to_string);
    let media: Box<dyn MediaSource> = match locator {
        SourceLocator::File(path) => Box::new(File::open(path)?),
        SourceLocator::Stream(url) => open_stream(url, config, progress, cancelled)?,
    };
    Ok(OpenedSource { media, hint })
}

#[cfg(feature = "http-streaming")]
fn open_stream(
    url: &str,
    config: &EngineConfig,
    mut progress: impl FnMut(u8),
    cancelled: impl Fn() -> bool,
) -> Result<Box<dyn MediaSource>, SourceError> {
    use std::io::{Cursor, Read};

    let limit = config.max_stream_bytes;

    // blocking 客户端的 timeout 作用于每次读写
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(config.http_timeout)
        .timeout(config.http_timeout)
        .build()?;

    let mut response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }

    let total = response.content_length().filter(|len| *len > 0);
    if total.is_some_and(|len| len > limit) {
        return Err(SourceError::TooLarge(limit));
    }

    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    let mut reported = None;

    loop {
        if cancelled() {
            return Err(SourceError::Cancelled);
        }
        let n = response.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        if body.len() as u64 + n as u64 > limit {
            return Err(SourceError::TooLarge(limit));
        }
        body.extend_from_slice(&chunk[..n]);

        if let Some(total) = total {
            let percent = (body.len() as u64 * 100 / total).min(100) as u8;
            if reported != Some(percent) {
                reported = Some(percent);
                progress(percent);
            }
        }
    }

    if reported != Some(100) {
        progress(100);
    }
    log::debug!("Fetched {} bytes from {}", body.len(), url);

    Ok(Box::new(Cursor::new(body)))
}

#[cfg(not(feature = "http-streaming"))]
fn open_stream(
    _url: &str,
    _config: &EngineConfig,
    _progress: impl FnMut(u8),
    _cancelled: impl Fn() -> bool,
) -> Result<Box<dyn MediaSource>, SourceError> {
    Err(SourceError::StreamingDisabled)
}
