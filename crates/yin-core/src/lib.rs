//! # yin-core
//!
//! Yin MPEG 音频解码器的核心库, 提供错误类型、比特流读写、CRC 校验与采样编码定义.

pub mod bitreader;
pub mod bitwriter;
pub mod crc;
pub mod encoding;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use encoding::{Encoding, EncodingSet};
pub use error::{YinError, YinResult};
