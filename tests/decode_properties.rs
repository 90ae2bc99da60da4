//! 帧头、样本计数与索引的端到端性质测试.

mod common;

use common::*;
use yin::codec::header::build_header;
use yin::codec::synth::ntom::{NTOM_MUL, NtomClock};
use yin::codec::{ChannelMode, FrameHeader, Layer, MpegVersion, decode_header};
use yin::format::MemorySource;
use yin::{DecodeStatus, Decoder, DecoderConfig, Encoding, MonoMode, NextStatus, YinError};

fn no_gapless() -> DecoderConfig {
    DecoderConfig {
        gapless: false,
        ..DecoderConfig::default()
    }
}

fn open(data: Vec<u8>, config: DecoderConfig) -> Decoder {
    Decoder::open(MemorySource::new(data), config).unwrap()
}

// ============================================================
// 帧头
// ============================================================

#[test]
fn test_帧头_与真实帧解码结果一致() {
    let versions = [MpegVersion::Mpeg1, MpegVersion::Mpeg2, MpegVersion::Mpeg25];
    let layers = [Layer::I, Layer::II, Layer::III];
    let modes = [
        ChannelMode::Stereo,
        ChannelMode::JointStereo,
        ChannelMode::DualChannel,
        ChannelMode::Mono,
    ];
    let mut checked = 0;
    for version in versions {
        for layer in layers {
            for br in 1..=14u8 {
                for sr in 0..=2u8 {
                    for mode in modes {
                        let raw = build_header(version, layer, br, sr, false, mode);
                        let Ok(parsed) = decode_header(raw.to_be_bytes()) else {
                            continue;
                        };
                        assert_eq!(parsed.raw, raw);
                        assert_eq!(parsed.version, version);
                        assert_eq!(parsed.layer, layer);
                        assert_eq!(parsed.bitrate_index, br);
                        assert_eq!(parsed.sample_rate_index, sr);
                        assert_eq!(parsed.channel_mode, mode);
                        assert!(!parsed.has_crc);

                        let frame = zero_frame(raw).unwrap();
                        let data: Vec<u8> = (0..3).flat_map(|_| frame.clone()).collect();
                        let mut dec = open(data, no_gapless());
                        let fmt = dec.read_format().unwrap_or_else(|e| {
                            panic!("{parsed}: 无法读取格式: {e}");
                        });
                        assert_eq!(dec.frame_header(), Some(&parsed), "{parsed}");
                        assert_eq!(fmt.rate, parsed.sample_rate_hz());
                        assert_eq!(usize::from(fmt.channels), parsed.channels());
                        checked += 1;
                    }
                }
            }
        }
    }
    assert!(checked > 400, "只检查了 {checked} 个帧头");
}

#[test]
fn test_帧头_0xfffb9064() {
    let header = FrameHeader::parse(L3_HEADER).unwrap();
    assert_eq!(header.version, MpegVersion::Mpeg1);
    assert_eq!(header.layer, Layer::III);
    assert_eq!(header.bitrate_bps(), 128_000);
    assert_eq!(header.sample_rate_hz(), 44100);
    assert_eq!(header.channel_mode, ChannelMode::JointStereo);
    assert_eq!(header.mode_extension, 2);
    assert!(header.original);
    assert!(!header.has_crc);
    assert_eq!(header.frame_size_bytes(), Some(L3_FRAME_LEN));

    let frames = 12;
    let mut dec = open(zero_layer3(frames), no_gapless());
    let DecodeStatus::NewFormat(fmt) = dec.decode_frame().unwrap() else {
        panic!("第一次调用应返回 NewFormat");
    };
    assert_eq!((fmt.rate, fmt.channels), (44100, 2));
    assert_eq!(count_samples(&mut dec), 1152 * frames as u64);
    assert_eq!(dec.tell(), 1152 * frames as u64);
}

#[test]
fn test_mpeg2_layer3_每帧576样本() {
    let raw = build_header(MpegVersion::Mpeg2, Layer::III, 8, 0, false, ChannelMode::Stereo);
    let frame = zero_frame(raw).unwrap();
    let data: Vec<u8> = (0..9).flat_map(|_| frame.clone()).collect();
    let mut dec = open(data, no_gapless());
    assert_eq!(dec.read_format().unwrap().rate, 22050);
    assert_eq!(count_samples(&mut dec), 576 * 9);
}

// ============================================================
// 样本计数
// ============================================================

#[test]
fn test_原生输出_一万帧样本数() {
    let frames = 10_000u64;
    let mut dec = open(zero_layer3(frames as usize), no_gapless());
    assert_eq!(count_samples(&mut dec), frames * 1152);
    assert_eq!(dec.tell(), frames * 1152);
    assert_eq!(dec.length(), Some(frames * 1152));
}

#[test]
fn test_ntom_公式与逐帧累加一致() {
    for (native, out, spf) in [
        (44100, 48000, 1152),
        (48000, 44100, 1152),
        (32000, 44100, 384),
        (22050, 8000, 576),
    ] {
        let clock = NtomClock::new(native, out, spf).unwrap();
        let mut acc = NTOM_MUL / 2;
        let mut total = 0i64;
        for frame in 0..100_000i64 {
            assert_eq!(clock.frame_outs(frame), total, "{native}→{out} 帧 {frame}");
            acc += spf as u64 * clock.step();
            total += (acc / NTOM_MUL) as i64;
            acc %= NTOM_MUL;
        }
    }
}

#[test]
fn test_ntom_解码样本数等于公式() {
    let frames = 50;
    let mut config = no_gapless();
    config.output.rate = Some(48000);
    config.output.force_rate = true;
    let mut dec = open(layer1_stream(frames, 7), config);
    assert_eq!(dec.read_format().unwrap().rate, 48000);
    let clock = NtomClock::new(44100, 48000, 384).unwrap();
    let expected = clock.frame_outs(frames as i64) as u64;
    // 没有信息帧, 扫描之前长度未知
    assert_eq!(dec.length(), None);
    assert_eq!(dec.scan().unwrap(), frames as u64);
    assert_eq!(dec.length(), Some(expected));
    assert_eq!(count_samples(&mut dec), expected);
    assert_eq!(dec.tell(), expected);
}

#[test]
fn test_降采样_2比1与4比1() {
    let frames = 20u64;
    for (rate, per_frame) in [(22050, 192u64), (11025, 96)] {
        let mut config = no_gapless();
        config.output.rate = Some(rate);
        let mut dec = open(layer1_stream(frames as usize, 3), config);
        assert_eq!(dec.read_format().unwrap().rate, rate);
        assert_eq!(count_samples(&mut dec), frames * per_frame);
    }
}

#[test]
fn test_非整数比例未强制时保持原生采样率() {
    let mut config = no_gapless();
    config.output.rate = Some(48000);
    let mut dec = open(layer1_stream(4, 3), config);
    assert_eq!(dec.read_format().unwrap().rate, 44100);
}

// ============================================================
// 输出声道与编码
// ============================================================

#[test]
fn test_单声道输出() {
    let stereo = decode_all_s16(&mut open(layer1_stream(6, 11), no_gapless()));
    for (mode, pick) in [(MonoMode::Left, 0usize), (MonoMode::Right, 1)] {
        let mut config = no_gapless();
        config.output.channels = Some(1);
        config.output.mono_mode = mode;
        let mut dec = open(layer1_stream(6, 11), config);
        assert_eq!(dec.read_format().unwrap().channels, 1);
        let mono = decode_all_s16(&mut dec);
        assert_eq!(mono.len() * 2, stereo.len());
        let expected: Vec<i16> = stereo.iter().skip(pick).step_by(2).copied().collect();
        assert_eq!(mono, expected, "{mode:?}");
    }

    let mut config = no_gapless();
    config.output.channels = Some(1);
    let mut dec = open(layer1_stream(6, 11), config);
    assert_eq!(count_samples(&mut dec), 6 * 384);
}

#[test]
fn test_各输出编码的字节数() {
    for (encoding, width) in [
        (Encoding::S16, 2usize),
        (Encoding::S32, 4),
        (Encoding::F32, 4),
        (Encoding::U8, 1),
    ] {
        let mut config = no_gapless();
        config.output.encodings = encoding.as_set();
        let mut dec = open(layer1_stream(3, 5), config);
        let mut out = Vec::new();
        let NextStatus::NewFormat(fmt) = dec.decode_next(&mut out).unwrap() else {
            panic!("第一次调用应返回 NewFormat");
        };
        assert_eq!(fmt.encoding, encoding);
        let mut total = 0;
        loop {
            match dec.decode_next(&mut out).unwrap() {
                NextStatus::Bytes(n) => total += n,
                NextStatus::Done => break,
                other => panic!("意外状态: {other:?}"),
            }
        }
        assert_eq!(total, 3 * 384 * 2 * width, "{encoding}");
        assert_eq!(out.len(), total);
    }
}

#[test]
fn test_u8_静音为中点() {
    let mut config = no_gapless();
    config.output.encodings = Encoding::U8.as_set();
    let mut dec = open(zero_layer3(2), config);
    let mut out = Vec::new();
    while !matches!(dec.decode_next(&mut out).unwrap(), NextStatus::Done) {}
    assert_eq!(out.len(), 2 * 1152 * 2);
    assert!(out.iter().all(|&b| b == 128));
}

// ============================================================
// 定位索引
// ============================================================

#[test]
fn test_索引满后稀释并保留第0帧() {
    let frames = 100;
    let mut config = no_gapless();
    config.index_size = 8;
    let mut dec = open(layer1_stream(frames, 1), config);
    count_samples(&mut dec);

    let index = dec.seek_index();
    assert!(index.len() <= 8);
    assert!(index.step() > 1);
    assert_eq!(index.entry(0), Some((0, 0)));
    let mut last = None;
    for (frame, offset) in index.entries() {
        assert_eq!(frame % index.step(), 0);
        assert_eq!(offset, frame * L1_FRAME_LEN as u64);
        assert!(last.is_none_or(|prev| prev < frame));
        last = Some(frame);
    }
}

// ============================================================
// 同步与容错
// ============================================================

#[test]
fn test_帧间垃圾数据后重新同步() {
    let frames = 8;
    let stream = layer1_stream(frames, 9);
    let mut data = stream[..3 * L1_FRAME_LEN].to_vec();
    data.extend_from_slice(&[0u8; 300]);
    data.extend_from_slice(&stream[3 * L1_FRAME_LEN..]);
    let mut dec = open(data, no_gapless());
    assert_eq!(count_samples(&mut dec), frames as u64 * 384);
}

#[test]
fn test_超过重同步上限报错() {
    let mut data = vec![0u8; 5000];
    data.extend_from_slice(&zero_layer3(3));
    let mut config = no_gapless();
    config.resync_limit = Some(1024);
    let mut dec = open(data.clone(), config);
    assert!(matches!(dec.decode_frame(), Err(YinError::ResyncFailed { limit: 1024, .. })));

    let mut config = no_gapless();
    config.resync_limit = None;
    let mut dec = open(data, config);
    assert_eq!(count_samples(&mut dec), 3 * 1152);
}

#[test]
fn test_没有音频帧() {
    let mut dec = open(vec![0x55u8; 2000], no_gapless());
    assert!(dec.read_format().is_err());
}

#[test]
fn test_crc_校验失败的帧输出静音() {
    let mut rng = Lcg::new(21);
    let first = layer1_frame(&mut rng, true);
    let mut bad = layer1_frame(&mut rng, true);
    let third = layer1_frame(&mut rng, true);
    bad[4] ^= 0xFF;
    let stream = |middle: &[u8]| {
        let mut data = first.clone();
        data.extend_from_slice(middle);
        data.extend_from_slice(&third);
        data
    };

    // 校验失败的帧与分配全零的帧输出相同
    let silent = zero_frame(build_header(
        MpegVersion::Mpeg1,
        Layer::I,
        L1_BITRATE_INDEX,
        0,
        false,
        ChannelMode::Stereo,
    ))
    .unwrap();
    let reference = decode_all_s16(&mut open(stream(&silent), no_gapless()));

    let mut config = no_gapless();
    config.crc_check = true;
    let checked = decode_all_s16(&mut open(stream(&bad), config));
    assert_eq!(checked.len(), 3 * 384 * 2);
    assert_eq!(checked, reference);

    let unchecked = decode_all_s16(&mut open(stream(&bad), no_gapless()));
    assert_ne!(unchecked, reference);
}

#[test]
fn test_crc_正确时正常解码() {
    let mut rng = Lcg::new(4);
    let data: Vec<u8> = (0..4).flat_map(|_| layer1_frame(&mut rng, true)).collect();
    let mut config = no_gapless();
    config.crc_check = true;
    let checked = decode_all_s16(&mut open(data.clone(), config));
    let unchecked = decode_all_s16(&mut open(data, no_gapless()));
    assert_eq!(checked, unchecked);
    assert!(checked.iter().any(|&s| s != 0));
}
