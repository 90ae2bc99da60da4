//! VBR 信息帧解析 (Xing/Info, LAME 扩展, VBRI).
//!
//! 编码器常在第一帧的位置写入一个不含音频的信息帧, 记录总帧数、总字节数、
//! 百分比定位表以及 gapless 所需的编码延迟和尾部填充.

use byteorder::{BigEndian, ByteOrder};
use log::debug;
use yin_codec::{FrameHeader, Layer};

/// 编码延迟/填充的合理上限 (样本)
const MAX_GAPLESS_SAMPLES: u32 = 2880 * 2;

/// 信息帧种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbrKind {
    /// `Xing`: VBR 流
    Xing,
    /// `Info`: CBR 流 (LAME 写法)
    Info,
    /// `VBRI`: Fraunhofer 编码器
    Vbri,
}

/// 信息帧提供的轨道信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub kind: VbrKind,
    /// 音频帧总数 (不含信息帧本身)
    pub frames: Option<u64>,
    /// 音频数据总字节数
    pub bytes: Option<u64>,
    /// 100 项百分比定位表, 每项为 `字节偏移 / 总字节数 * 256`
    pub toc: Option<Vec<u8>>,
    /// VBR 质量指示
    pub quality: Option<u32>,
    /// 编码器版本字符串 (如 `LAME3.100`)
    pub encoder: Option<String>,
    /// 编码延迟 (样本)
    pub encoder_delay: u32,
    /// 尾部填充 (样本)
    pub encoder_padding: u32,
}

impl TrackInfo {
    fn new(kind: VbrKind) -> Self {
        Self {
            kind,
            frames: None,
            bytes: None,
            toc: None,
            quality: None,
            encoder: None,
            encoder_delay: 0,
            encoder_padding: 0,
        }
    }

    /// 是否携带 gapless 信息
    pub fn has_gapless(&self) -> bool {
        self.encoder_delay > 0 || self.encoder_padding > 0
    }

    /// 按百分比定位表估算字节偏移
    ///
    /// `fraction` 为 `[0, 1)` 区间的播放进度, `file_size` 为整个文件的字节数.
    pub fn toc_offset(&self, fraction: f64, file_size: u64) -> Option<u64> {
        let toc = self.toc.as_ref()?;
        if toc.len() < 100 || file_size == 0 {
            return None;
        }
        let idx = ((fraction.clamp(0.0, 1.0) * 100.0) as usize).min(99);
        Some((f64::from(toc[idx]) / 256.0 * file_size as f64) as u64)
    }
}

/// 检查帧是否为信息帧, 是则解析
///
/// `frame` 为包含帧头在内的完整帧数据. 只有 Layer III 帧可能携带信息帧.
pub fn parse(header: &FrameHeader, frame: &[u8]) -> Option<TrackInfo> {
    if header.layer != Layer::III {
        return None;
    }
    let xing_at = header.body_offset() + header.side_info_size();
    if let Some(tag) = frame.get(xing_at..xing_at + 4) {
        if tag == b"Xing" || tag == b"Info" {
            let kind = if tag == b"Xing" {
                VbrKind::Xing
            } else {
                VbrKind::Info
            };
            return parse_xing(kind, &frame[xing_at + 4..]);
        }
    }
    // VBRI 固定在帧头之后 32 字节处
    if frame.get(36..40) == Some(b"VBRI".as_slice()) {
        return parse_vbri(&frame[40..]);
    }
    None
}

/// 逐段读取的游标, 数据不足时返回 `None`
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let out = self.data.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(out)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(BigEndian::read_u32)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(BigEndian::read_u16)
    }
}

fn parse_xing(kind: VbrKind, data: &[u8]) -> Option<TrackInfo> {
    let mut info = TrackInfo::new(kind);
    let mut cur = Cursor { data, pos: 0 };
    let flags = cur.u32()?;
    if flags & 0x1 != 0 {
        info.frames = cur.u32().map(u64::from);
    }
    if flags & 0x2 != 0 {
        info.bytes = cur.u32().map(u64::from);
    }
    if flags & 0x4 != 0 {
        info.toc = cur.take(100).map(<[u8]>::to_vec);
    }
    if flags & 0x8 != 0 {
        info.quality = cur.u32();
    }

    // LAME 扩展: 9 字节版本串, 之后第 21..24 字节为 12+12 位的延迟/填充
    if let Some(lame) = cur.take(24) {
        let version = &lame[..9];
        if version.iter().all(|b| b.is_ascii_graphic() || *b == b' ' || *b == b'.')
            && version[0].is_ascii_alphabetic()
        {
            info.encoder = Some(String::from_utf8_lossy(version).trim().to_string());
            let d = &lame[21..24];
            let delay = (u32::from(d[0]) << 4) | (u32::from(d[1]) >> 4);
            let padding = ((u32::from(d[1]) & 0xF) << 8) | u32::from(d[2]);
            if delay <= MAX_GAPLESS_SAMPLES && padding <= MAX_GAPLESS_SAMPLES {
                info.encoder_delay = delay;
                info.encoder_padding = padding;
            }
        }
    }
    debug!(
        "发现 {:?} 信息帧: frames={:?}, bytes={:?}, encoder={:?}, delay={}, padding={}",
        info.kind, info.frames, info.bytes, info.encoder, info.encoder_delay, info.encoder_padding
    );
    Some(info)
}

fn parse_vbri(data: &[u8]) -> Option<TrackInfo> {
    let mut info = TrackInfo::new(VbrKind::Vbri);
    let mut cur = Cursor { data, pos: 0 };
    let _version = cur.u16()?;
    let _delay = cur.u16()?;
    info.quality = cur.u16().map(u32::from);
    info.bytes = cur.u32().map(u64::from);
    info.frames = cur.u32().map(u64::from);
    debug!("发现 VBRI 信息帧: frames={:?}, bytes={:?}", info.frames, info.bytes);
    Some(info)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use yin_codec::header::build_header;
    use yin_codec::{ChannelMode, MpegVersion};

    /// 构造带 Xing/Info + LAME 扩展的 MPEG-1 立体声 Layer III 信息帧
    pub(crate) fn build_info_frame(tag: &[u8; 4], frames: u32, delay: u32, padding: u32) -> Vec<u8> {
        let raw = build_header(
            MpegVersion::Mpeg1,
            Layer::III,
            9,
            0,
            false,
            ChannelMode::JointStereo,
        );
        let header = FrameHeader::parse(raw).unwrap();
        let size = header.frame_size_bytes().unwrap();
        let mut frame = vec![0u8; size];
        frame[..4].copy_from_slice(&raw.to_be_bytes());
        let mut pos = 4 + 32;
        frame[pos..pos + 4].copy_from_slice(tag);
        pos += 4;
        frame[pos..pos + 4].copy_from_slice(&0x7u32.to_be_bytes());
        pos += 4;
        frame[pos..pos + 4].copy_from_slice(&frames.to_be_bytes());
        pos += 4;
        frame[pos..pos + 4].copy_from_slice(&(frames * size as u32).to_be_bytes());
        pos += 4;
        for i in 0..100 {
            frame[pos + i] = (i * 256 / 100) as u8;
        }
        pos += 100;
        frame[pos..pos + 9].copy_from_slice(b"LAME3.100");
        let d = pos + 21;
        frame[d] = (delay >> 4) as u8;
        frame[d + 1] = (((delay & 0xF) << 4) | (padding >> 8)) as u8;
        frame[d + 2] = (padding & 0xFF) as u8;
        frame
    }

    #[test]
    fn test_xing_lame_解析() {
        let frame = build_info_frame(b"Info", 40, 576, 1000);
        let header = FrameHeader::parse(BigEndian::read_u32(&frame)).unwrap();
        let info = parse(&header, &frame).unwrap();
        assert_eq!(info.kind, VbrKind::Info);
        assert_eq!(info.frames, Some(40));
        assert_eq!(info.bytes, Some(40 * 417));
        assert_eq!(info.encoder.as_deref(), Some("LAME3.100"));
        assert_eq!(info.encoder_delay, 576);
        assert_eq!(info.encoder_padding, 1000);
        assert!(info.has_gapless());
    }

    #[test]
    fn test_普通音频帧_不是信息帧() {
        let raw = build_header(MpegVersion::Mpeg1, Layer::III, 9, 0, false, ChannelMode::Stereo);
        let header = FrameHeader::parse(raw).unwrap();
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&raw.to_be_bytes());
        assert!(parse(&header, &frame).is_none());
    }

    #[test]
    fn test_vbri_解析() {
        let raw = build_header(MpegVersion::Mpeg1, Layer::III, 9, 0, false, ChannelMode::Stereo);
        let header = FrameHeader::parse(raw).unwrap();
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&raw.to_be_bytes());
        frame[36..40].copy_from_slice(b"VBRI");
        frame[40..42].copy_from_slice(&1u16.to_be_bytes());
        frame[46..50].copy_from_slice(&123_456u32.to_be_bytes());
        frame[50..54].copy_from_slice(&300u32.to_be_bytes());
        let info = parse(&header, &frame).unwrap();
        assert_eq!(info.kind, VbrKind::Vbri);
        assert_eq!(info.frames, Some(300));
        assert_eq!(info.bytes, Some(123_456));
        assert!(!info.has_gapless());
    }

    #[test]
    fn test_toc_估算偏移() {
        let frame = build_info_frame(b"Xing", 100, 0, 0);
        let header = FrameHeader::parse(BigEndian::read_u32(&frame)).unwrap();
        let info = parse(&header, &frame).unwrap();
        assert_eq!(info.toc_offset(0.0, 10_000), Some(0));
        // 第 50 项为 128 → 文件一半处
        assert_eq!(info.toc_offset(0.5, 10_000), Some(5000));
        assert_eq!(info.toc_offset(0.5, 0), None);
    }
}
