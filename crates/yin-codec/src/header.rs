//! MPEG 音频帧头解析.
//!
//! 帧头 32 位布局:
//! `AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM`
//! - A: 同步字 (11 位全 1)
//! - B: 版本 (00=2.5, 01=保留, 10=2, 11=1)
//! - C: 层 (01=III, 10=II, 11=I, 00=保留)
//! - D: 保护位 (0 表示帧头后跟 16 位 CRC)
//! - E: 码率索引, F: 采样率索引, G: 填充, H: 私有位
//! - I: 声道模式, J: 模式扩展, K: 版权, L: 原始, M: 加重

use std::fmt;

use yin_core::{YinError, YinResult};

/// 同一条流内保持不变的帧头位: 同步字、版本、层、采样率
pub const FIXED_HEADER_MASK: u32 = 0xFFFE_0C00;

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    /// 是否为低采样率扩展 (MPEG-2 / MPEG-2.5)
    pub fn is_lsf(&self) -> bool {
        !matches!(self, Self::Mpeg1)
    }
}

impl fmt::Display for MpegVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mpeg1 => "1.0",
            Self::Mpeg2 => "2.0",
            Self::Mpeg25 => "2.5",
        };
        write!(f, "{name}")
    }
}

/// 编码层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    I = 1,
    II = 2,
    III = 3,
}

impl Layer {
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// 码率表 (kbps), 按 [MPEG-1 / LSF][层 - 1][索引]
const BITRATES_KBPS: [[[u32; 15]; 3]; 2] = [
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    ],
];

/// 采样率表, 按 [MPEG-1, MPEG-2, MPEG-2.5][索引]
const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000],
    [22050, 24000, 16000],
    [11025, 12000, 8000],
];

/// 解析后的帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// 原始 32 位帧头
    pub raw: u32,
    pub version: MpegVersion,
    pub layer: Layer,
    pub has_crc: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub private_bit: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: u8,
}

/// 解析 4 字节帧头
///
/// 校验同步字、版本、层、码率索引 (≠15)、采样率索引 (≠3).
/// 码率索引为 0 时为自由格式, 帧长需要由同步器探测.
pub fn decode_header(bytes: [u8; 4]) -> YinResult<FrameHeader> {
    FrameHeader::parse(u32::from_be_bytes(bytes))
}

impl FrameHeader {
    /// 解析 32 位帧头
    pub fn parse(raw: u32) -> YinResult<Self> {
        if raw & 0xFFE0_0000 != 0xFFE0_0000 {
            return Err(YinError::InvalidData(format!("无同步字: 0x{raw:08X}")));
        }
        let version = match (raw >> 19) & 0x3 {
            3 => MpegVersion::Mpeg1,
            2 => MpegVersion::Mpeg2,
            0 => MpegVersion::Mpeg25,
            _ => {
                return Err(YinError::InvalidData(format!(
                    "保留的 MPEG 版本: 0x{raw:08X}"
                )));
            }
        };
        let layer = match (raw >> 17) & 0x3 {
            3 => Layer::I,
            2 => Layer::II,
            1 => Layer::III,
            _ => return Err(YinError::InvalidData(format!("保留的层: 0x{raw:08X}"))),
        };
        let bitrate_index = ((raw >> 12) & 0xF) as u8;
        if bitrate_index == 0xF {
            return Err(YinError::InvalidData(format!("无效码率索引: 0x{raw:08X}")));
        }
        let sample_rate_index = ((raw >> 10) & 0x3) as u8;
        if sample_rate_index == 0x3 {
            return Err(YinError::InvalidData(format!(
                "无效采样率索引: 0x{raw:08X}"
            )));
        }
        let channel_mode = match (raw >> 6) & 0x3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Ok(Self {
            raw,
            version,
            layer,
            has_crc: (raw >> 16) & 1 == 0,
            bitrate_index,
            sample_rate_index,
            padding: (raw >> 9) & 1 == 1,
            private_bit: (raw >> 8) & 1 == 1,
            channel_mode,
            mode_extension: ((raw >> 4) & 0x3) as u8,
            copyright: (raw >> 3) & 1 == 1,
            original: (raw >> 2) & 1 == 1,
            emphasis: (raw & 0x3) as u8,
        })
    }

    /// 是否为自由格式 (码率索引 0)
    pub fn is_free_format(&self) -> bool {
        self.bitrate_index == 0
    }

    /// 码率 (bps), 自由格式返回 0
    pub fn bitrate_bps(&self) -> u32 {
        let lsf = usize::from(self.version.is_lsf());
        let layer = self.layer.number() as usize - 1;
        BITRATES_KBPS[lsf][layer][self.bitrate_index as usize] * 1000
    }

    /// 采样率 (Hz)
    pub fn sample_rate_hz(&self) -> u32 {
        let row = match self.version {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            MpegVersion::Mpeg25 => 2,
        };
        SAMPLE_RATES[row][self.sample_rate_index as usize]
    }

    /// 采样率在 9 种速率中的序号 (44.1k, 48k, 32k, 22.05k, 24k, 16k, 11.025k, 12k, 8k)
    pub fn rate_table_index(&self) -> usize {
        let row = match self.version {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            MpegVersion::Mpeg25 => 2,
        };
        row * 3 + self.sample_rate_index as usize
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        if self.channel_mode == ChannelMode::Mono {
            1
        } else {
            2
        }
    }

    /// 每帧每声道的采样数
    pub fn samples_per_frame(&self) -> usize {
        match self.layer {
            Layer::I => 384,
            Layer::II => 1152,
            Layer::III if self.version.is_lsf() => 576,
            Layer::III => 1152,
        }
    }

    /// 填充单位的字节数 (Layer I 以 4 字节为一个 slot)
    fn padding_bytes(&self) -> usize {
        match (self.padding, self.layer) {
            (false, _) => 0,
            (true, Layer::I) => 4,
            (true, _) => 1,
        }
    }

    /// 由码率计算帧长 (含帧头), 自由格式返回 `None`
    pub fn frame_size_bytes(&self) -> Option<usize> {
        if self.is_free_format() {
            return None;
        }
        let br = self.bitrate_bps() as usize;
        let sr = self.sample_rate_hz() as usize;
        let size = match self.layer {
            Layer::I => (12 * br / sr) * 4,
            Layer::II => 144 * br / sr,
            Layer::III if self.version.is_lsf() => 72 * br / sr,
            Layer::III => 144 * br / sr,
        };
        Some(size + self.padding_bytes())
    }

    /// 已知自由格式基准帧长 (不含填充) 时的帧长
    pub fn free_frame_size(&self, base: usize) -> usize {
        base + self.padding_bytes()
    }

    /// 由完整帧长反推自由格式基准帧长
    pub fn free_base_from_frame(&self, frame_size: usize) -> usize {
        frame_size.saturating_sub(self.padding_bytes())
    }

    /// Layer III 边信息字节数
    pub fn side_info_size(&self) -> usize {
        match (self.version.is_lsf(), self.channels()) {
            (false, 1) => 17,
            (false, _) => 32,
            (true, 1) => 9,
            (true, _) => 17,
        }
    }

    /// 帧体起点 (跳过帧头与可选 CRC)
    pub fn body_offset(&self) -> usize {
        if self.has_crc { 6 } else { 4 }
    }

    /// 与另一帧头是否属于同一条流 (固定位一致)
    pub fn same_stream(&self, other: &FrameHeader) -> bool {
        self.raw & FIXED_HEADER_MASK == other.raw & FIXED_HEADER_MASK
    }

    /// 与原始 32 位候选值的固定位是否一致
    pub fn matches_fixed_bits(&self, candidate: u32) -> bool {
        self.raw & FIXED_HEADER_MASK == candidate & FIXED_HEADER_MASK
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MPEG {} Layer {} {} Hz {:?} {} kbps",
            self.version,
            self.layer.number(),
            self.sample_rate_hz(),
            self.channel_mode,
            self.bitrate_bps() / 1000
        )
    }
}

/// 构造帧头原始值 (测试与合成流使用)
pub fn build_header(
    version: MpegVersion,
    layer: Layer,
    bitrate_index: u8,
    sample_rate_index: u8,
    padding: bool,
    mode: ChannelMode,
) -> u32 {
    let ver_bits = match version {
        MpegVersion::Mpeg1 => 3,
        MpegVersion::Mpeg2 => 2,
        MpegVersion::Mpeg25 => 0,
    };
    let layer_bits = match layer {
        Layer::I => 3,
        Layer::II => 2,
        Layer::III => 1,
    };
    let mode_bits = match mode {
        ChannelMode::Stereo => 0,
        ChannelMode::JointStereo => 1,
        ChannelMode::DualChannel => 2,
        ChannelMode::Mono => 3,
    };
    0xFFE0_0000
        | (ver_bits << 19)
        | (layer_bits << 17)
        | (1 << 16)
        | (u32::from(bitrate_index & 0xF) << 12)
        | (u32::from(sample_rate_index & 0x3) << 10)
        | (u32::from(padding) << 9)
        | (mode_bits << 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_帧头解析_mpeg1_layer3_128kbps_44100() {
        let h = FrameHeader::parse(0xFFFB_9064).unwrap();
        assert_eq!(h.version, MpegVersion::Mpeg1);
        assert_eq!(h.layer, Layer::III);
        assert!(!h.has_crc);
        assert_eq!(h.bitrate_bps(), 128_000);
        assert_eq!(h.sample_rate_hz(), 44100);
        assert_eq!(h.channel_mode, ChannelMode::JointStereo);
        assert_eq!(h.mode_extension, 2);
        assert_eq!(h.channels(), 2);
        assert_eq!(h.samples_per_frame(), 1152);
        // 144 * 128000 / 44100 = 417
        assert_eq!(h.frame_size_bytes(), Some(417));
        assert_eq!(h.side_info_size(), 32);
    }

    #[test]
    fn test_帧头解析_填充与各层帧长() {
        let raw = build_header(MpegVersion::Mpeg1, Layer::III, 9, 0, true, ChannelMode::Stereo);
        assert_eq!(FrameHeader::parse(raw).unwrap().frame_size_bytes(), Some(418));

        // Layer I 384 kbps 48000 Hz: 12 * 384000 / 48000 * 4 = 384
        let raw = build_header(MpegVersion::Mpeg1, Layer::I, 12, 1, false, ChannelMode::Stereo);
        let h = FrameHeader::parse(raw).unwrap();
        assert_eq!(h.bitrate_bps(), 384_000);
        assert_eq!(h.frame_size_bytes(), Some(384));
        assert_eq!(h.samples_per_frame(), 384);
        let raw = build_header(MpegVersion::Mpeg1, Layer::I, 12, 1, true, ChannelMode::Stereo);
        assert_eq!(FrameHeader::parse(raw).unwrap().frame_size_bytes(), Some(388));

        // Layer II 192 kbps 48000 Hz: 144 * 192000 / 48000 = 576
        let raw = build_header(MpegVersion::Mpeg1, Layer::II, 10, 1, false, ChannelMode::Stereo);
        assert_eq!(FrameHeader::parse(raw).unwrap().frame_size_bytes(), Some(576));
    }

    #[test]
    fn test_帧头解析_lsf() {
        // MPEG-2 Layer III 64 kbps 22050 Hz: 72 * 64000 / 22050 = 208
        let raw = build_header(MpegVersion::Mpeg2, Layer::III, 8, 0, false, ChannelMode::Mono);
        let h = FrameHeader::parse(raw).unwrap();
        assert_eq!(h.sample_rate_hz(), 22050);
        assert_eq!(h.bitrate_bps(), 64_000);
        assert_eq!(h.samples_per_frame(), 576);
        assert_eq!(h.frame_size_bytes(), Some(208));
        assert_eq!(h.side_info_size(), 9);
        assert_eq!(h.rate_table_index(), 3);

        let raw = build_header(MpegVersion::Mpeg25, Layer::III, 8, 2, false, ChannelMode::Mono);
        let h = FrameHeader::parse(raw).unwrap();
        assert_eq!(h.sample_rate_hz(), 8000);
        assert_eq!(h.rate_table_index(), 8);
    }

    #[test]
    fn test_帧头解析_非法字段() {
        // 码率索引 15
        assert!(FrameHeader::parse(0xFFFB_F064).is_err());
        // 采样率索引 3
        assert!(FrameHeader::parse(0xFFFB_9C64).is_err());
        // 层 00
        assert!(FrameHeader::parse(0xFFF9_9064).is_err());
        // 版本 01
        assert!(FrameHeader::parse(0xFFEB_9064).is_err());
        // 无同步
        assert!(FrameHeader::parse(0x7FFB_9064).is_err());
    }

    #[test]
    fn test_自由格式() {
        let raw = build_header(MpegVersion::Mpeg1, Layer::III, 0, 0, true, ChannelMode::Stereo);
        let h = FrameHeader::parse(raw).unwrap();
        assert!(h.is_free_format());
        assert_eq!(h.frame_size_bytes(), None);
        assert_eq!(h.free_frame_size(600), 601);
        assert_eq!(h.free_base_from_frame(601), 600);
    }

    #[test]
    fn test_帧头往返_全部合法组合() {
        let versions = [MpegVersion::Mpeg1, MpegVersion::Mpeg2, MpegVersion::Mpeg25];
        let layers = [Layer::I, Layer::II, Layer::III];
        let modes = [
            ChannelMode::Stereo,
            ChannelMode::JointStereo,
            ChannelMode::DualChannel,
            ChannelMode::Mono,
        ];
        for v in versions {
            for l in layers {
                for br in 0..15u8 {
                    for sr in 0..3u8 {
                        for m in modes {
                            let raw = build_header(v, l, br, sr, false, m);
                            let h = decode_header(raw.to_be_bytes()).unwrap();
                            assert_eq!(
                                (h.version, h.layer, h.bitrate_index, h.sample_rate_index, h.channel_mode),
                                (v, l, br, sr, m)
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_同流判定() {
        let a = FrameHeader::parse(0xFFFB_9064).unwrap();
        let b = FrameHeader::parse(0xFFFB_A0C4).unwrap();
        assert!(a.same_stream(&b));
        let c = FrameHeader::parse(0xFFFB_9464).unwrap();
        assert!(!a.same_stream(&c));
    }
}
