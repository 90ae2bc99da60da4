//! 层解码与合成之间的数据结构.

use yin_core::crc::Crc16Mpeg;

use crate::header::FrameHeader;

/// 子带数
pub const SBLIMIT: usize = 32;

/// 一个时隙的子带样本, 每声道 32 个频域系数
///
/// 单声道流只使用第 0 声道.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubbandBlock {
    pub samples: [[f32; SBLIMIT]; 2],
}

impl Default for SubbandBlock {
    fn default() -> Self {
        Self {
            samples: [[0.0; SBLIMIT]; 2],
        }
    }
}

/// 一帧解码后的全部子带样本
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    /// Layer I 为 12 个时隙, Layer II 与 MPEG-1 Layer III 为 36 个, LSF Layer III 为 18 个
    pub blocks: Vec<SubbandBlock>,
}

impl DecodedFrame {
    /// 全零帧 (用于损坏帧的静音替代)
    pub fn silent(header: FrameHeader) -> Self {
        let slots = header.samples_per_frame() / SBLIMIT;
        Self {
            header,
            blocks: vec![SubbandBlock::default(); slots],
        }
    }
}

/// 校验帧内 CRC-16
///
/// 覆盖帧头第 3, 4 字节以及帧体开头 `protected_bits` 个比特, 校验值位于帧头之后.
pub fn crc_matches(frame: &[u8], protected_bits: usize) -> bool {
    if frame.len() < 6 || (frame.len() - 6) * 8 < protected_bits {
        return false;
    }
    let mut crc = Crc16Mpeg::new();
    crc.update_bytes(&frame[2..4]);
    crc.update_leading_bits(&frame[6..], protected_bits);
    crc.value() == u16::from_be_bytes([frame[4], frame[5]])
}
