//! Layer III 真实码流与 symphonia 逐样本对比.
//!
//! 样例:
//! - `data/stereo_44k.mp3`: MPEG-1 44.1 kHz 联合立体声 VBR, 带 ID3v2 与 Xing 信息帧, 60 个音频帧
//! - `data/lsf_22k_mono.mp3`: MPEG-2 22.05 kHz 单声道, 45 帧

mod common;

use common::decode_all_s16;
use yin::format::MemorySource;
use yin::{DecodeStatus, Decoder, DecoderConfig, EncodingSet, Samples, Whence};

const STEREO_44K: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/stereo_44k.mp3");
const LSF_22K_MONO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/lsf_22k_mono.mp3");

/// 与参考解码器允许的最大误差
const TOLERANCE: f32 = 1e-4;

fn float_config(gapless: bool) -> DecoderConfig {
    let mut config = DecoderConfig {
        gapless,
        ..DecoderConfig::default()
    };
    config.output.encodings = EncodingSet::F32;
    config
}

/// 使用 yin 解码, 返回交织 f32 样本与 (采样率, 声道数)
fn decode_yin(path: &str) -> (Vec<f32>, u32, u16) {
    let data = std::fs::read(path).unwrap();
    let mut dec = Decoder::open(MemorySource::new(data), float_config(false)).unwrap();
    let fmt = dec.read_format().unwrap();
    let mut pcm = Vec::new();
    loop {
        match dec.decode_frame().unwrap() {
            DecodeStatus::Frame(block) => match block.samples {
                Samples::Float(v) => pcm.extend_from_slice(&v),
                other => panic!("期望 f32 样本: {:?}", other.kind()),
            },
            DecodeStatus::NewFormat(_) => {}
            DecodeStatus::NeedMoreInput => panic!("内存源不应缺数据"),
            DecodeStatus::Done => break,
        }
    }
    (pcm, fmt.rate, fmt.channels)
}

/// 使用 symphonia 解码, 返回交织 f32 样本与 (采样率, 声道数)
fn decode_symphonia(path: &str) -> (Vec<f32>, u32, u16) {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path).unwrap();
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .unwrap();

    let mut format = probed.format;
    let track = format.default_track().unwrap().clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .unwrap();

    let mut pcm = Vec::new();
    let mut rate = 0;
    let mut channels = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track.id {
            continue;
        }
        let Ok(decoded) = decoder.decode(&packet) else {
            continue;
        };
        let spec = *decoded.spec();
        rate = spec.rate;
        channels = spec.channels.count() as u16;
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        pcm.extend_from_slice(buf.samples());
    }
    (pcm, rate, channels)
}

/// 逐样本比较, 返回 (最大误差, 第一个超限的下标)
fn compare(ours: &[f32], reference: &[f32]) -> (f32, Option<usize>) {
    let mut max_diff = 0.0f32;
    let mut first_bad = None;
    for (i, (a, b)) in ours.iter().zip(reference).enumerate() {
        let diff = (a - b).abs();
        max_diff = max_diff.max(diff);
        if diff > TOLERANCE && first_bad.is_none() {
            first_bad = Some(i);
        }
    }
    (max_diff, first_bad)
}

fn assert_matches_symphonia(path: &str, rate: u32, channels: u16, spf: usize, frames: usize) {
    let (ours, our_rate, our_channels) = decode_yin(path);
    let (reference, ref_rate, ref_channels) = decode_symphonia(path);

    assert_eq!((our_rate, our_channels), (rate, channels));
    assert_eq!((ref_rate, ref_channels), (rate, channels));
    assert_eq!(ours.len(), frames * spf * channels as usize, "yin 样本数");
    assert_eq!(ours.len(), reference.len(), "与 symphonia 样本数不同");

    let (max_diff, first_bad) = compare(&ours, &reference);
    assert!(
        first_bad.is_none(),
        "样本 {first_bad:?} 起与 symphonia 不一致, 最大误差 {max_diff}"
    );
    // 不是全静音
    let peak = ours.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    assert!(peak > 0.01, "峰值 {peak} 过小, 样例应含真实频谱");
}

#[test]
fn test_layer3_mpeg1_立体声与symphonia一致() {
    assert_matches_symphonia(STEREO_44K, 44100, 2, 1152, 60);
}

#[test]
fn test_layer3_mpeg2_单声道与symphonia一致() {
    assert_matches_symphonia(LSF_22K_MONO, 22050, 1, 576, 45);
}

#[test]
fn test_layer3_信息帧与标签() {
    let data = std::fs::read(STEREO_44K).unwrap();
    let mut dec = Decoder::open(MemorySource::new(data), DecoderConfig::default()).unwrap();
    dec.read_format().unwrap();
    let info = dec.track_info().unwrap();
    // 样例截自 390 帧的完整文件, 信息帧保留原值
    assert_eq!(info.frames, Some(390));
    assert!(info.toc.is_some());
    assert_eq!(info.encoder_delay, 576);
    assert_eq!(info.encoder_padding, 984);
    assert!(dec.tags().title.is_some());
}

#[test]
fn test_layer3_gapless_定位后与顺序解码一致() {
    let data = std::fs::read(STEREO_44K).unwrap();
    let open = || Decoder::open(MemorySource::new(data.clone()), DecoderConfig::default()).unwrap();
    let reference = decode_all_s16(&mut open());
    // 首帧丢弃编码延迟与解码器延迟, 其余帧全部输出 (结尾在截断处之后)
    assert_eq!(reference.len(), (60 * 1152 - 576 - 529) * 2);

    for target in [0usize, 1, 1000, 4608, 20_000, 50_000] {
        let mut dec = open();
        assert_eq!(dec.seek(target as i64, Whence::Set).unwrap(), target as u64);
        let tail = decode_all_s16(&mut dec);
        let expected = &reference[target * 2..];
        let mismatched = tail
            .iter()
            .zip(expected)
            .take(8000)
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(tail.len(), expected.len(), "target={target}");
        assert_eq!(mismatched, 0, "定位到 {target} 后前 4000 个样本中有差异");
    }
}

#[test]
fn test_layer3_分块推送与整体解码一致() {
    let data = std::fs::read(LSF_22K_MONO).unwrap();
    let config = DecoderConfig {
        gapless: false,
        ..DecoderConfig::default()
    };
    let reference =
        decode_all_s16(&mut Decoder::open(MemorySource::new(data.clone()), config.clone()).unwrap());

    let mut dec = Decoder::open_feed(config).unwrap();
    let mut chunks = data.chunks(333);
    let mut pcm = Vec::new();
    loop {
        match dec.decode_frame().unwrap() {
            DecodeStatus::Frame(block) => {
                let Samples::S16(v) = block.samples else {
                    panic!("期望 s16");
                };
                pcm.extend_from_slice(&v);
            }
            DecodeStatus::NewFormat(_) => {}
            DecodeStatus::NeedMoreInput => match chunks.next() {
                Some(part) => dec.feed(part).unwrap(),
                None => dec.finish_feed().unwrap(),
            },
            DecodeStatus::Done => break,
        }
    }
    assert_eq!(pcm, reference);
}
