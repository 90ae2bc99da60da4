//! 解码器配置.

use std::path::Path;

use serde::{Deserialize, Serialize};
use yin_core::{YinError, YinResult};
use yin_format::SyncConfig;
use yin_format::sync::DEFAULT_RESYNC_LIMIT;
use yin_resample::OutputRequest;

/// 解码器配置, 可从 JSON 加载, 缺省字段取默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// 失步后最多向后搜索的字节数, `None` 表示不限
    pub resync_limit: Option<u64>,
    /// 按 LAME 信息裁掉编码延迟与尾部填充
    pub gapless: bool,
    /// 索引未覆盖目标时允许估算定位
    pub fuzzy_seek: bool,
    /// 定位索引容量
    pub index_size: usize,
    /// 索引满时的扩容步长, 0 表示稀释索引
    pub index_grow: usize,
    /// 定位目标之前预解码并丢弃的帧数
    pub preframes: u32,
    /// 校验 CRC-16
    pub crc_check: bool,
    /// 跳过 ID3v2/ID3v1/APE 标签
    pub skip_tags: bool,
    /// 合成内核标识, `None` 自动选择
    pub kernel: Option<String>,
    pub output: OutputRequest,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            resync_limit: Some(DEFAULT_RESYNC_LIMIT),
            gapless: true,
            fuzzy_seek: false,
            index_size: 1000,
            index_grow: 0,
            preframes: 4,
            crc_check: false,
            skip_tags: true,
            kernel: None,
            output: OutputRequest::default(),
        }
    }
}

impl DecoderConfig {
    pub fn from_json_str(text: &str) -> YinResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| YinError::InvalidArgument(format!("解码器配置 JSON 无效: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> YinResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub(crate) fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            resync_limit: self.resync_limit,
            skip_tags: self.skip_tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yin_core::EncodingSet;

    #[test]
    fn test_默认配置() {
        let config = DecoderConfig::default();
        assert_eq!(config.resync_limit, Some(1024));
        assert!(config.gapless);
        assert!(!config.fuzzy_seek);
        assert_eq!(config.index_size, 1000);
        assert_eq!(config.preframes, 4);
        assert!(config.skip_tags);
    }

    #[test]
    fn test_json_部分字段() {
        let config = DecoderConfig::from_json_str(
            r#"{"gapless": false, "resync_limit": null, "output": {"rate": 22050}}"#,
        )
        .unwrap();
        assert!(!config.gapless);
        assert_eq!(config.resync_limit, None);
        assert_eq!(config.output.rate, Some(22050));
        assert_eq!(config.output.encodings, EncodingSet::all());
        assert_eq!(config.index_size, 1000);
    }

    #[test]
    fn test_json_无效() {
        assert!(matches!(
            DecoderConfig::from_json_str("{gapless"),
            Err(YinError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_json_文件() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decoder.json");
        std::fs::write(&path, r#"{"fuzzy_seek": true, "index_grow": 64}"#).unwrap();
        let config = DecoderConfig::from_json_file(&path).unwrap();
        assert!(config.fuzzy_seek);
        assert_eq!(config.index_grow, 64);
        assert!(matches!(
            DecoderConfig::from_json_file(dir.path().join("missing.json")),
            Err(YinError::Io(_))
        ));
    }
}
