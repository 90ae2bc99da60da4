//! MPEG 音频 Layer I 解码.
//!
//! 每帧 12 个时隙, 每子带一个 4 位分配码与一个 6 位缩放因子.

use log::warn;
use yin_core::{BitReader, YinError, YinResult};

use crate::context::CodecContext;
use crate::frame::{SBLIMIT, SubbandBlock, crc_matches};
use crate::header::{ChannelMode, FrameHeader};

/// 联合立体声时独立编码的子带数, 其余子带共享分配与样本
pub fn joint_bound(header: &FrameHeader, sblimit: usize) -> usize {
    if header.channel_mode == ChannelMode::JointStereo {
        ((header.mode_extension as usize + 1) * 4).min(sblimit)
    } else {
        sblimit
    }
}

/// 将 `bits` 位码值 c 反量化到 (-1, 1): (2c - (n - 1)) / n
#[inline]
pub(crate) fn dequantize(code: u32, levels: u32) -> f32 {
    (2.0 * code as f32 - (levels - 1) as f32) / levels as f32
}

/// 解码一帧 Layer I, 向 `out` 追加 12 个时隙
///
/// 数据不足时已解码的部分保留, 其余时隙为静音.
pub fn decode(
    ctx: &CodecContext,
    header: &FrameHeader,
    frame: &[u8],
    verify_crc: bool,
    out: &mut Vec<SubbandBlock>,
) -> YinResult<()> {
    let nch = header.channels();
    let jsbound = joint_bound(header, SBLIMIT);
    let base = out.len();
    out.resize(base + 12, SubbandBlock::default());

    if verify_crc && header.has_crc {
        let protected = 4 * (nch * jsbound + (SBLIMIT - jsbound));
        if !crc_matches(frame, protected) {
            warn!("Layer I CRC 校验失败, 输出静音");
            return Ok(());
        }
    }

    let body = frame.get(header.body_offset()..).unwrap_or_default();
    let mut br = BitReader::new(body);
    if let Err(e) = decode_body(ctx, &mut br, nch, jsbound, &mut out[base..]) {
        match e {
            YinError::Eof => warn!("Layer I 帧数据不足, 剩余部分置零"),
            YinError::InvalidData(msg) => {
                warn!("Layer I 帧数据无效, 输出静音: {msg}");
                out[base..].fill(SubbandBlock::default());
            }
            other => return Err(other),
        }
    }
    Ok(())
}

fn decode_body(
    ctx: &CodecContext,
    br: &mut BitReader,
    nch: usize,
    jsbound: usize,
    slots: &mut [SubbandBlock],
) -> YinResult<()> {
    let mut alloc = [[0u32; SBLIMIT]; 2];
    for sb in 0..SBLIMIT {
        if sb < jsbound {
            for ch_alloc in alloc.iter_mut().take(nch) {
                ch_alloc[sb] = br.read_bits(4)?;
            }
        } else {
            let a = br.read_bits(4)?;
            alloc[0][sb] = a;
            alloc[1][sb] = a;
        }
    }
    if alloc.iter().take(nch).flatten().any(|&a| a == 15) {
        return Err(YinError::InvalidData("Layer I 分配码 15 非法".into()));
    }

    let mut scale = [[0f32; SBLIMIT]; 2];
    for sb in 0..SBLIMIT {
        for ch in 0..nch {
            if alloc[ch][sb] != 0 {
                scale[ch][sb] = ctx.scalefactor(br.read_bits(6)?);
            }
        }
    }

    for slot in slots.iter_mut() {
        for sb in 0..SBLIMIT {
            if sb < jsbound {
                for ch in 0..nch {
                    let a = alloc[ch][sb];
                    if a != 0 {
                        let bits = a + 1;
                        let code = br.read_bits(bits)?;
                        slot.samples[ch][sb] = dequantize(code, (1 << bits) - 1) * scale[ch][sb];
                    }
                }
            } else if alloc[0][sb] != 0 {
                let bits = alloc[0][sb] + 1;
                let value = dequantize(br.read_bits(bits)?, (1 << bits) - 1);
                for ch in 0..nch {
                    slot.samples[ch][sb] = value * scale[ch][sb];
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Layer, MpegVersion, build_header};
    use yin_core::BitWriter;

    fn mono_header() -> (u32, FrameHeader) {
        let raw = build_header(MpegVersion::Mpeg1, Layer::I, 4, 0, false, ChannelMode::Mono);
        (raw, FrameHeader::parse(raw).unwrap())
    }

    #[test]
    fn test_反量化公式() {
        // 2 位: n = 3
        assert!((dequantize(0, 3) + 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(dequantize(1, 3), 0.0);
        assert!((dequantize(2, 3) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_单子带解码() {
        let ctx = CodecContext::init();
        let (raw, header) = mono_header();
        let size = header.frame_size_bytes().unwrap();
        let mut bw = BitWriter::new();
        bw.write_bits(raw, 32);
        // 子带 0 分配 1 (2 位样本), 其余为 0
        bw.write_bits(1, 4);
        for _ in 1..32 {
            bw.write_bits(0, 4);
        }
        bw.write_bits(0, 6); // 缩放因子 2.0
        for i in 0..12 {
            bw.write_bits(if i % 2 == 0 { 2 } else { 0 }, 2);
        }
        bw.pad_to(size);
        let frame = bw.finish();

        let mut out = Vec::new();
        decode(&ctx, &header, &frame, false, &mut out).unwrap();
        assert_eq!(out.len(), 12);
        assert!((out[0].samples[0][0] - 4.0 / 3.0).abs() < 1e-5);
        assert!((out[1].samples[0][0] + 4.0 / 3.0).abs() < 1e-5);
        assert_eq!(out[0].samples[0][1], 0.0);
    }

    #[test]
    fn test_非法分配码输出静音() {
        let ctx = CodecContext::init();
        let (raw, header) = mono_header();
        let size = header.frame_size_bytes().unwrap();
        let mut bw = BitWriter::new();
        bw.write_bits(raw, 32);
        bw.write_bits(15, 4);
        bw.pad_to(size);
        let frame = bw.finish();
        let mut out = Vec::new();
        decode(&ctx, &header, &frame, false, &mut out).unwrap();
        assert!(out.iter().all(|b| *b == SubbandBlock::default()));
    }

    #[test]
    fn test_截断帧保留已解码部分() {
        let ctx = CodecContext::init();
        let (raw, header) = mono_header();
        let mut bw = BitWriter::new();
        bw.write_bits(raw, 32);
        bw.write_bits(14, 4); // 15 位样本
        for _ in 1..32 {
            bw.write_bits(0, 4);
        }
        bw.write_bits(0, 6);
        bw.write_bits(0x7FFF, 15);
        bw.write_bits(0x7FFF, 15);
        let frame = bw.finish();
        let mut out = Vec::new();
        decode(&ctx, &header, &frame, false, &mut out).unwrap();
        assert_eq!(out.len(), 12);
        assert!(out[0].samples[0][0] > 0.0);
        assert_eq!(out[11].samples[0][0], 0.0);
    }

    #[test]
    fn test_联合立体声边界() {
        let raw = build_header(MpegVersion::Mpeg1, Layer::I, 4, 0, false, ChannelMode::JointStereo)
            | (2 << 4);
        let header = FrameHeader::parse(raw).unwrap();
        assert_eq!(joint_bound(&header, 32), 12);
        let raw = build_header(MpegVersion::Mpeg1, Layer::I, 4, 0, false, ChannelMode::Stereo);
        assert_eq!(joint_bound(&FrameHeader::parse(raw).unwrap(), 32), 32);
    }
}
