//! 输出采样编码定义.
//!
//! 解码器内部以浮点合成, 输出时按协商结果转换为以下编码之一,
//! 交错排列, 小端字节序.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 输出采样编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// 有符号 16 位整数
    S16,
    /// 有符号 32 位整数
    S32,
    /// 32 位浮点
    F32,
    /// 无符号 8 位整数 (偏移 128)
    U8,
}

impl Encoding {
    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
        }
    }

    /// 对应的单元素集合
    pub const fn as_set(&self) -> EncodingSet {
        match self {
            Self::S16 => EncodingSet::S16,
            Self::S32 => EncodingSet::S32,
            Self::F32 => EncodingSet::F32,
            Self::U8 => EncodingSet::U8,
        }
    }

    /// 从名称解析 (s16 / s32 / f32 / u8)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "s16" => Some(Self::S16),
            "s32" => Some(Self::S32),
            "f32" | "flt" => Some(Self::F32),
            "u8" => Some(Self::U8),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "f32",
            Self::U8 => "u8",
        };
        write!(f, "{name}")
    }
}

bitflags! {
    /// 编码能力集合, 调用方与解码器各持有一份, 协商时取交集
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EncodingSet: u8 {
        const S16 = 1 << 0;
        const S32 = 1 << 1;
        const F32 = 1 << 2;
        const U8  = 1 << 3;
    }
}

impl EncodingSet {
    /// 按偏好顺序 (s16, f32, s32, u8) 挑选集合中的第一个编码
    pub fn preferred(&self) -> Option<Encoding> {
        [Encoding::S16, Encoding::F32, Encoding::S32, Encoding::U8]
            .into_iter()
            .find(|e| self.contains(e.as_set()))
    }
}

impl Default for EncodingSet {
    fn default() -> Self {
        Self::all()
    }
}
