//! # Yin (音)
//!
//! 纯 Rust 实现的流式 MPEG 音频 Layer I/II/III 解码器.
//!
//! - **帧同步**: 跳过 ID3v2/ID3v1/APE 标签, 失步后有界重同步, 支持自由格式
//! - **解码**: Layer I/II/III, MPEG-1/2/2.5, 可选 CRC 校验
//! - **输出**: 原生/2:1/4:1/任意比例重采样, 单声道混合, s16/s32/f32/u8
//! - **定位**: 样本精确定位, gapless 裁剪, 可选估算定位
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use yin::{DecodeStatus, Decoder, DecoderConfig};
//!
//! let mut decoder = Decoder::open_file("song.mp3", DecoderConfig::default())?;
//! let format = decoder.read_format()?;
//! println!("输出格式: {format}");
//! loop {
//!     match decoder.decode_frame()? {
//!         DecodeStatus::Frame(block) => println!("{} 个样本", block.frames()),
//!         DecodeStatus::NewFormat(format) => println!("格式变化: {format}"),
//!         DecodeStatus::NeedMoreInput | DecodeStatus::Done => break,
//!     }
//! }
//! # Ok::<(), yin::core::YinError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yin-core` | 错误类型、比特流读写、CRC、采样编码 |
//! | `yin-codec` | 帧头解析、各层解码、合成滤波器组 |
//! | `yin-format` | 字节源、标签、VBR 信息帧、帧同步 |
//! | `yin-resample` | 输出格式协商与编码转换 |

pub mod config;
pub mod decoder;
pub mod logging;
pub mod position;
pub mod seek_index;

/// 核心类型与工具
pub use yin_core as core;

/// 帧解码与合成
pub use yin_codec as codec;

/// 输入与帧同步
pub use yin_format as format;

/// 输出协商
pub use yin_resample as resample;

pub use config::DecoderConfig;
pub use decoder::{DecodeStatus, Decoder, NextStatus, OutputFormat, Whence};
pub use seek_index::SeekIndex;
pub use yin_codec::{PcmBlock, Samples};
pub use yin_core::{Encoding, EncodingSet, YinError, YinResult};
pub use yin_format::{TagInfo, TrackInfo};
pub use yin_resample::{MonoMode, OutputRequest};

/// 获取 Yin 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
