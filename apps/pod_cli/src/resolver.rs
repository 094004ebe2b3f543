//! 把命令行参数解析成可播放条目

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Duration;

use pod_playback::{MediaId, PlaybackError, Playable, PlayableResolver, VolumeAdaptation};

/// 本地路径或 http(s) 地址
#[derive(Debug, Clone, Default)]
pub struct CliResolver {
    pub start_at: Duration,
    pub volume_adaptation: VolumeAdaptation,
}

fn media_id(identifier: &str) -> MediaId {
    let mut hasher = DefaultHasher::new();
    identifier.hash(&mut hasher);
    MediaId(hasher.finish())
}

fn is_url(identifier: &str) -> bool {
    identifier.starts_with("http://") || identifier.starts_with("https://")
}

impl PlayableResolver for CliResolver {
    fn resolve(&self, identifier: &str) -> Result<Playable, PlaybackError> {
        let title = identifier
            .rsplit(['/', '\\'])
            .find(|part| !part.is_empty())
            .unwrap_or(identifier)
            .to_string();

        let playable = Playable::new(media_id(identifier), title)
            .with_position(self.start_at)
            .with_volume_adaptation(self.volume_adaptation);

        if is_url(identifier) {
            return Ok(playable.with_stream_url(identifier));
        }

        let path = Path::new(identifier);
        if !path.is_file() {
            return Err(PlaybackError::UnknownMedia(identifier.to_string()));
        }
        Ok(playable.with_local_path(path))
    }
}
