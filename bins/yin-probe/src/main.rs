//! yin-probe - MPEG 音频信息探测工具
//!
//! 打印码流格式、VBR 信息帧、标签文本与时长.

use clap::Parser;
use serde::Serialize;
use std::process;

use anyhow::{Context, Result};
use yin::{Decoder, DecoderConfig, TagInfo, TrackInfo};

/// Yin MPEG 音频信息探测工具
#[derive(Parser, Debug)]
#[command(name = "yin-probe", version, about = "纯 Rust MPEG 音频信息探测工具")]
struct Cli {
    /// 输入文件路径
    input: Option<String>,

    /// 扫描整个码流以得到精确帧数 (无 VBR 信息帧时总是扫描)
    #[arg(long)]
    scan: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================
// JSON 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
struct ProbeOutput {
    stream: StreamInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    vbr: Option<VbrInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<TagSummary>,
}

/// 码流信息
#[derive(Serialize)]
struct StreamInfo {
    filename: String,
    version: String,
    layer: u8,
    sample_rate: u32,
    channels: usize,
    channel_mode: String,
    bit_rate: u32,
    crc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    nb_frames: Option<u64>,
    /// 总帧数的来源: scan / vbr
    #[serde(skip_serializing_if = "Option::is_none")]
    frames_source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    gapless: bool,
}

/// VBR 信息帧
#[derive(Serialize)]
struct VbrInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    has_toc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoder: Option<String>,
    encoder_delay: u32,
    encoder_padding: u32,
}

/// 标签文本
#[derive(Serialize)]
struct TagSummary {
    kinds: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    album: Option<String>,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let Some(input_path) = cli.input.as_deref() else {
        print_banner();
        return;
    };

    if !cli.quiet {
        eprintln!(
            "yin-probe 版本 {} -- 纯 Rust MPEG 音频探测工具",
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("输入文件: {input_path}");
    }

    let output = match probe(input_path, cli.scan) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("错误: {e:#}");
            process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: JSON 序列化失败: {e}");
                process::exit(1);
            }
        }
    } else {
        print_stream_text(&output.stream);
        if let Some(ref vbr) = output.vbr {
            print_vbr_text(vbr);
        }
        if let Some(ref tags) = output.tags {
            print_tags_text(tags);
        }
    }
}

fn probe(path: &str, force_scan: bool) -> Result<ProbeOutput> {
    let mut decoder = Decoder::open_file(path, DecoderConfig::default())
        .with_context(|| format!("无法打开文件 '{path}'"))?;
    let format = decoder.read_format().context("无法识别 MPEG 音频码流")?;
    let header = *decoder
        .frame_header()
        .context("码流中没有音频帧")?;

    let vbr_frames = decoder.track_info().and_then(|info| info.frames);
    let (nb_frames, frames_source) = if force_scan || vbr_frames.is_none() {
        (Some(decoder.scan().context("扫描码流失败")?), Some("scan"))
    } else {
        (vbr_frames, Some("vbr"))
    };
    log::debug!("'{}': 帧数={:?} 来源={:?}", path, nb_frames, frames_source);
    let samples = decoder.length();

    let stream = StreamInfo {
        filename: path.to_string(),
        version: header.version.to_string(),
        layer: header.layer.number(),
        sample_rate: header.sample_rate_hz(),
        channels: header.channels(),
        channel_mode: format!("{:?}", header.channel_mode),
        bit_rate: header.bitrate_bps(),
        crc: header.has_crc,
        nb_frames,
        frames_source,
        samples,
        duration: samples.map(|s| s as f64 / f64::from(format.rate)),
        gapless: decoder.config().gapless
            && decoder.track_info().is_some_and(TrackInfo::has_gapless),
    };

    Ok(ProbeOutput {
        stream,
        vbr: decoder.track_info().map(build_vbr_info),
        tags: Some(decoder.tags())
            .filter(|tags| !tags.is_empty())
            .map(build_tag_summary),
    })
}

fn build_vbr_info(info: &TrackInfo) -> VbrInfo {
    VbrInfo {
        kind: format!("{:?}", info.kind),
        frames: info.frames,
        bytes: info.bytes,
        has_toc: info.toc.is_some(),
        quality: info.quality,
        encoder: info.encoder.clone(),
        encoder_delay: info.encoder_delay,
        encoder_padding: info.encoder_padding,
    }
}

fn build_tag_summary(tags: &TagInfo) -> TagSummary {
    TagSummary {
        kinds: tags.kinds.iter().map(|k| format!("{k:?}")).collect(),
        title: tags.title.clone(),
        artist: tags.artist.clone(),
        album: tags.album.clone(),
    }
}

/// 文本输出: 码流信息
fn print_stream_text(info: &StreamInfo) {
    println!("[STREAM]");
    println!("  文件名       : {}", info.filename);
    println!("  格式         : MPEG {} Layer {}", info.version, info.layer);
    println!("  采样率       : {} Hz", info.sample_rate);
    println!("  声道数       : {} ({})", info.channels, info.channel_mode);
    if info.bit_rate > 0 {
        println!("  码率         : {} kbps", info.bit_rate / 1000);
    } else {
        println!("  码率         : 自由格式");
    }
    println!("  CRC          : {}", if info.crc { "有" } else { "无" });
    if let Some(frames) = info.nb_frames {
        println!(
            "  帧数         : {frames} ({})",
            info.frames_source.unwrap_or("-")
        );
    }
    if let Some(samples) = info.samples {
        println!("  样本数       : {samples}");
    }
    if let Some(dur) = info.duration {
        println!("  时长         : {dur:.3} 秒");
    }
    println!("  gapless      : {}", if info.gapless { "是" } else { "否" });
    println!("[/STREAM]");
    println!();
}

/// 文本输出: VBR 信息帧
fn print_vbr_text(info: &VbrInfo) {
    println!("[VBR]");
    println!("  类型         : {}", info.kind);
    if let Some(frames) = info.frames {
        println!("  帧数         : {frames}");
    }
    if let Some(bytes) = info.bytes {
        println!("  字节数       : {bytes}");
    }
    println!("  定位表       : {}", if info.has_toc { "有" } else { "无" });
    if let Some(quality) = info.quality {
        println!("  质量         : {quality}");
    }
    if let Some(ref encoder) = info.encoder {
        println!("  编码器       : {encoder}");
    }
    println!("  编码延迟     : {}", info.encoder_delay);
    println!("  尾部填充     : {}", info.encoder_padding);
    println!("[/VBR]");
    println!();
}

/// 文本输出: 标签
fn print_tags_text(tags: &TagSummary) {
    println!("[TAGS]");
    println!("  类型         : {}", tags.kinds.join(", "));
    if let Some(ref title) = tags.title {
        println!("  标题         : {title}");
    }
    if let Some(ref artist) = tags.artist {
        println!("  艺术家       : {artist}");
    }
    if let Some(ref album) = tags.album {
        println!("  专辑         : {album}");
    }
    println!("[/TAGS]");
    println!();
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "yin-probe 版本 {} -- 纯 Rust MPEG 音频探测工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: yin-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --scan            扫描整个码流得到精确帧数");
    println!("  --json            以 JSON 格式输出");
    println!("  -q, --quiet       静默模式");
    println!();
    println!("使用 --help 查看完整用法.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_探测_无信息帧时扫描帧数() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.mp3");
        let mut data = Vec::new();
        for _ in 0..6 {
            let mut frame = vec![0u8; 417];
            frame[..4].copy_from_slice(&0xFFFB_9064u32.to_be_bytes());
            data.extend_from_slice(&frame);
        }
        std::fs::write(&path, &data).unwrap();

        let output = probe(path.to_str().unwrap(), false).unwrap();
        assert_eq!(output.stream.layer, 3);
        assert_eq!(output.stream.sample_rate, 44100);
        assert_eq!(output.stream.bit_rate, 128_000);
        assert_eq!(output.stream.nb_frames, Some(6));
        assert_eq!(output.stream.frames_source, Some("scan"));
        assert_eq!(output.stream.samples, Some(6 * 1152));
        assert!(output.vbr.is_none());
        assert!(output.tags.is_none());

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["stream"]["nb_frames"], 6);
        assert!(json.get("vbr").is_none());
    }
}
