//! 合成样本到输出字节的编码转换.

use yin_codec::{SampleKind, Samples};
use yin_core::Encoding;

/// 为输出编码选择合成器的样本表示
///
/// s16/s32 直接由合成器量化, f32 与 u8 从浮点转换.
pub fn sample_kind_for(encoding: Encoding) -> SampleKind {
    match encoding {
        Encoding::S16 => SampleKind::S16,
        Encoding::S32 => SampleKind::S32,
        Encoding::F32 | Encoding::U8 => SampleKind::Float,
    }
}

fn float_to_u8(x: f32) -> u8 {
    (x * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8
}

fn float_to_s16(x: f32) -> i16 {
    (x * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

fn float_to_s32(x: f32) -> i32 {
    (f64::from(x) * 2_147_483_648.0)
        .round()
        .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// 把交错样本按 `encoding` 以小端字节追加到 `out`, 返回写入的字节数
pub fn write_samples(samples: &Samples, encoding: Encoding, out: &mut Vec<u8>) -> usize {
    let before = out.len();
    out.reserve(samples.len() * encoding.bytes_per_sample());
    match (samples, encoding) {
        (Samples::S16(v), Encoding::S16) => {
            for s in v {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        (Samples::S16(v), Encoding::S32) => {
            for &s in v {
                out.extend_from_slice(&(i32::from(s) << 16).to_le_bytes());
            }
        }
        (Samples::S16(v), Encoding::F32) => {
            for &s in v {
                out.extend_from_slice(&(f32::from(s) / 32768.0).to_le_bytes());
            }
        }
        (Samples::S16(v), Encoding::U8) => {
            out.extend(v.iter().map(|&s| ((s >> 8) + 128) as u8));
        }
        (Samples::S32(v), Encoding::S32) => {
            for s in v {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        (Samples::S32(v), Encoding::S16) => {
            for &s in v {
                out.extend_from_slice(&((s >> 16) as i16).to_le_bytes());
            }
        }
        (Samples::S32(v), Encoding::F32) => {
            for &s in v {
                out.extend_from_slice(&((f64::from(s) / 2_147_483_648.0) as f32).to_le_bytes());
            }
        }
        (Samples::S32(v), Encoding::U8) => {
            out.extend(v.iter().map(|&s| ((s >> 24) + 128) as u8));
        }
        (Samples::Float(v), Encoding::F32) => {
            for s in v {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        (Samples::Float(v), Encoding::U8) => {
            out.extend(v.iter().map(|&s| float_to_u8(s)));
        }
        (Samples::Float(v), Encoding::S16) => {
            for &s in v {
                out.extend_from_slice(&float_to_s16(s).to_le_bytes());
            }
        }
        (Samples::Float(v), Encoding::S32) => {
            for &s in v {
                out.extend_from_slice(&float_to_s32(s).to_le_bytes());
            }
        }
    }
    out.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16_直接写出() {
        let mut out = Vec::new();
        let n = write_samples(&Samples::S16(vec![1, -2]), Encoding::S16, &mut out);
        assert_eq!(n, 4);
        assert_eq!(out, vec![1, 0, 0xFE, 0xFF]);
    }

    #[test]
    fn test_浮点转_u8() {
        let mut out = Vec::new();
        write_samples(&Samples::Float(vec![0.0, 1.0, -1.0, 0.5]), Encoding::U8, &mut out);
        assert_eq!(out, vec![128, 255, 0, 192]);
    }

    #[test]
    fn test_浮点写出_f32() {
        let mut out = Vec::new();
        write_samples(&Samples::Float(vec![0.25]), Encoding::F32, &mut out);
        assert_eq!(f32::from_le_bytes([out[0], out[1], out[2], out[3]]), 0.25);
    }

    #[test]
    fn test_整数宽度互转() {
        let mut out = Vec::new();
        write_samples(&Samples::S16(vec![0x1234]), Encoding::S32, &mut out);
        assert_eq!(i32::from_le_bytes([out[0], out[1], out[2], out[3]]), 0x1234_0000);
        out.clear();
        write_samples(&Samples::S32(vec![0x1234_5678]), Encoding::S16, &mut out);
        assert_eq!(i16::from_le_bytes([out[0], out[1]]), 0x1234);
        out.clear();
        write_samples(&Samples::S16(vec![-32768, 32767]), Encoding::U8, &mut out);
        assert_eq!(out, vec![0, 255]);
    }

    #[test]
    fn test_编码对应样本表示() {
        assert_eq!(sample_kind_for(Encoding::S16), SampleKind::S16);
        assert_eq!(sample_kind_for(Encoding::U8), SampleKind::Float);
        assert_eq!(sample_kind_for(Encoding::F32), SampleKind::Float);
    }
}
