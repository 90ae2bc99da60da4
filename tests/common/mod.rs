//! 集成测试共用的码流构造工具.
//!
//! 所有码流都在内存中按位拼出, 不依赖外部样例文件.

#![allow(dead_code)]

use yin::codec::header::build_header;
use yin::codec::{ChannelMode, FrameHeader, Layer, MpegVersion};
use yin::core::BitWriter;
use yin::core::crc::Crc16Mpeg;
use yin::{DecodeStatus, Decoder, Samples};

/// 0xFFFB9064: MPEG-1 Layer III, 128 kbps, 44.1 kHz, 联合立体声, 417 字节
pub const L3_HEADER: u32 = 0xFFFB_9064;
pub const L3_FRAME_LEN: usize = 417;

/// Layer I 测试帧使用 256 kbps (276 字节), 低 16 个子带每个样本 4 位
pub const L1_BITRATE_INDEX: u8 = 8;
pub const L1_FRAME_LEN: usize = 276;
const L1_ACTIVE_SUBBANDS: usize = 16;
const L1_ALLOC: u32 = 3;

/// 简单线性同余生成器, 保证每次运行内容一致
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

/// 全零帧体的 Layer III 码流
pub fn zero_layer3(frames: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * L3_FRAME_LEN);
    for _ in 0..frames {
        let mut frame = vec![0u8; L3_FRAME_LEN];
        frame[..4].copy_from_slice(&L3_HEADER.to_be_bytes());
        out.extend_from_slice(&frame);
    }
    out
}

/// 按帧头构造全零帧体的单帧
pub fn zero_frame(raw: u32) -> Option<Vec<u8>> {
    let header = FrameHeader::parse(raw).ok()?;
    let size = header.frame_size_bytes()?;
    let mut frame = vec![0u8; size];
    frame[..4].copy_from_slice(&raw.to_be_bytes());
    Some(frame)
}

/// 一帧立体声 Layer I, 低频子带填入伪随机量化值
pub fn layer1_frame(rng: &mut Lcg, with_crc: bool) -> Vec<u8> {
    let mut raw = build_header(
        MpegVersion::Mpeg1,
        Layer::I,
        L1_BITRATE_INDEX,
        0,
        false,
        ChannelMode::Stereo,
    );
    if with_crc {
        raw &= !(1 << 16);
    }

    let mut w = BitWriter::new();
    w.write_bits(raw, 32);
    if with_crc {
        w.write_bits(0, 16);
    }
    for sb in 0..32 {
        let alloc = if sb < L1_ACTIVE_SUBBANDS { L1_ALLOC } else { 0 };
        w.write_bits(alloc, 4);
        w.write_bits(alloc, 4);
    }
    for _ in 0..L1_ACTIVE_SUBBANDS * 2 {
        // 避开最大的几个比例因子, 防止削波
        w.write_bits(8 + rng.below(40), 6);
    }
    for _ in 0..12 {
        for _ in 0..L1_ACTIVE_SUBBANDS * 2 {
            // 4 位样本码 15 为保留值
            w.write_bits(rng.below(15), L1_ALLOC + 1);
        }
    }
    w.pad_to(L1_FRAME_LEN);
    let mut frame = w.finish();

    if with_crc {
        let protected = 4 * 2 * 32;
        let mut crc = Crc16Mpeg::new();
        crc.update_bytes(&frame[2..4]);
        crc.update_leading_bits(&frame[6..], protected);
        frame[4..6].copy_from_slice(&crc.value().to_be_bytes());
    }
    frame
}

/// 内容确定的 Layer I 码流
pub fn layer1_stream(frames: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut out = Vec::with_capacity(frames * L1_FRAME_LEN);
    for _ in 0..frames {
        out.extend_from_slice(&layer1_frame(&mut rng, false));
    }
    out
}

/// 带 Info + LAME 扩展的 Layer III 信息帧, 与 [`L3_HEADER`] 同格式
pub fn info_frame(frames: u32, delay: u32, padding: u32) -> Vec<u8> {
    let mut frame = vec![0u8; L3_FRAME_LEN];
    frame[..4].copy_from_slice(&L3_HEADER.to_be_bytes());
    // MPEG-1 立体声边信息 32 字节
    let mut pos = 4 + 32;
    frame[pos..pos + 4].copy_from_slice(b"Info");
    pos += 4;
    frame[pos..pos + 4].copy_from_slice(&0x7u32.to_be_bytes());
    pos += 4;
    frame[pos..pos + 4].copy_from_slice(&frames.to_be_bytes());
    pos += 4;
    let bytes = (frames as usize + 1) * L3_FRAME_LEN;
    frame[pos..pos + 4].copy_from_slice(&(bytes as u32).to_be_bytes());
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

/// 信息帧 + `frames` 个全零音频帧
pub fn gapless_layer3(frames: u32, delay: u32, padding: u32) -> Vec<u8> {
    let mut out = info_frame(frames, delay, padding);
    out.extend_from_slice(&zero_layer3(frames as usize));
    out
}

/// ID3v2.3 标签, 只含 TIT2
pub fn id3v2_title(title: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"TIT2");
    body.extend_from_slice(&((title.len() + 1) as u32).to_be_bytes());
    body.extend_from_slice(&[0, 0, 0]);
    body.extend_from_slice(title.as_bytes());
    let size = body.len() as u32;
    let mut tag = b"ID3\x03\x00\x00".to_vec();
    tag.extend_from_slice(&[
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]);
    tag.extend_from_slice(&body);
    tag
}

/// 128 字节 ID3v1 标签
pub fn id3v1(title: &str, artist: &str) -> Vec<u8> {
    let mut tag = vec![0u8; 128];
    tag[..3].copy_from_slice(b"TAG");
    tag[3..3 + title.len()].copy_from_slice(title.as_bytes());
    tag[33..33 + artist.len()].copy_from_slice(artist.as_bytes());
    tag
}

/// 解码到结束, 返回交错 s16 样本
pub fn decode_all_s16(decoder: &mut Decoder) -> Vec<i16> {
    let mut pcm = Vec::new();
    loop {
        match decoder.decode_frame().unwrap() {
            DecodeStatus::Frame(block) => match block.samples {
                Samples::S16(v) => pcm.extend_from_slice(&v),
                other => panic!("期望 s16 样本: {:?}", other.kind()),
            },
            DecodeStatus::NewFormat(_) => {}
            DecodeStatus::NeedMoreInput => panic!("内存源不应缺数据"),
            DecodeStatus::Done => break,
        }
    }
    pcm
}

/// 解码到结束, 只统计每声道样本数
pub fn count_samples(decoder: &mut Decoder) -> u64 {
    let mut total = 0u64;
    loop {
        match decoder.decode_frame().unwrap() {
            DecodeStatus::Frame(block) => total += block.frames() as u64,
            DecodeStatus::NewFormat(_) => {}
            DecodeStatus::NeedMoreInput => panic!("内存源不应缺数据"),
            DecodeStatus::Done => break,
        }
    }
    total
}
