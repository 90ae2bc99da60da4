//! yin - MPEG 音频解码命令行工具
//!
//! 把 MPEG 音频 (Layer I/II/III) 解码为 WAV 或原始 PCM.

mod logging;
mod sink;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use yin::{Decoder, DecoderConfig, Encoding, MonoMode, NextStatus, Whence};

use sink::{PcmSink, SinkKind};

#[derive(Parser, Debug)]
#[command(name = "yin", version, about = "纯 Rust MPEG 音频解码工具")]
struct Cli {
    /// 输入文件路径
    input: Option<PathBuf>,

    /// 输出文件路径 (.wav 输出 WAV, 其余输出原始 PCM)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 无论扩展名都输出原始 PCM
    #[arg(long)]
    raw: bool,

    /// 起始位置 (输出样本)
    #[arg(long)]
    start: Option<u64>,

    /// 最多输出的样本数 (每声道)
    #[arg(long)]
    samples: Option<u64>,

    /// 输出采样率 (Hz), 非整数比例时使用 N:M 重采样
    #[arg(long)]
    rate: Option<u32>,

    /// 输出单声道 (mix / left / right)
    #[arg(long, num_args = 0..=1, default_missing_value = "mix")]
    mono: Option<String>,

    /// 输出编码 (s16 / s32 / f32 / u8)
    #[arg(short, long)]
    encoding: Option<String>,

    /// 解码器配置 JSON 文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 关闭 gapless 裁剪
    #[arg(long)]
    no_gapless: bool,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.verbose) {
        eprintln!("警告: 日志初始化失败: {err:#}");
    }

    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        print_banner();
        return;
    };

    if let Err(err) = run(&cli, input, output) {
        eprintln!("错误: {err:#}");
        process::exit(1);
    }
}

/// 把命令行选项叠加到配置上
fn build_config(cli: &Cli) -> Result<DecoderConfig> {
    let mut config = match &cli.config {
        Some(path) => DecoderConfig::from_json_file(path)
            .with_context(|| format!("无法读取配置文件 '{}'", path.display()))?,
        None => DecoderConfig::default(),
    };
    if cli.no_gapless {
        config.gapless = false;
    }
    if let Some(rate) = cli.rate {
        config.output.rate = Some(rate);
        config.output.force_rate = true;
    }
    if let Some(mode) = &cli.mono {
        config.output.channels = Some(1);
        config.output.mono_mode = match mode.to_ascii_lowercase().as_str() {
            "mix" => MonoMode::Mix,
            "left" => MonoMode::Left,
            "right" => MonoMode::Right,
            other => bail!("未知的单声道模式 '{other}' (可选 mix/left/right)"),
        };
    }
    if let Some(name) = &cli.encoding {
        let encoding = Encoding::from_name(name)
            .with_context(|| format!("未知的输出编码 '{name}' (可选 s16/s32/f32/u8)"))?;
        config.output.encodings = encoding.as_set();
    }
    Ok(config)
}

fn run(cli: &Cli, input: &Path, output: &Path) -> Result<()> {
    if !cli.overwrite && output.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", output.display());
    }
    let config = build_config(cli)?;

    eprintln!(
        "yin 版本 {} -- 纯 Rust MPEG 音频解码工具",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("输入: {}", input.display());
    eprintln!("输出: {}", output.display());

    let mut decoder = Decoder::open_file(input, config)
        .with_context(|| format!("无法打开输入文件 '{}'", input.display()))?;
    let format = decoder.read_format().context("无法识别 MPEG 音频码流")?;
    if let Some(header) = decoder.frame_header() {
        eprintln!("码流: {header}");
    }
    eprintln!("输出格式: {format}");

    if let Some(start) = cli.start {
        let offset = i64::try_from(start).context("起始位置过大")?;
        let pos = decoder.seek(offset, Whence::Set).context("定位失败")?;
        info!("定位到样本 {pos}");
    }

    let kind = if cli.raw {
        SinkKind::Raw
    } else {
        SinkKind::from_path(output)
    };
    let mut sink = PcmSink::create(output, kind, format)?;
    let frame_bytes = (format.encoding.bytes_per_sample() * usize::from(format.channels)) as u64;
    let mut budget = cli.samples.map(|n| n * frame_bytes);

    let mut buf = Vec::new();
    loop {
        if budget == Some(0) {
            break;
        }
        buf.clear();
        match decoder.decode_next(&mut buf).context("解码失败")? {
            NextStatus::Bytes(n) => {
                let take = budget.map_or(n, |b| n.min(b as usize));
                sink.write(&buf[..take])?;
                if let Some(b) = budget.as_mut() {
                    *b -= take as u64;
                }
            }
            NextStatus::NewFormat(new_format) => {
                if new_format != format {
                    if kind == SinkKind::Wav {
                        bail!("输出格式在码流中途变化 ({format} → {new_format}), WAV 无法表示");
                    }
                    warn!("输出格式变化: {format} → {new_format}");
                }
            }
            NextStatus::NeedMoreInput => bail!("输入意外中断"),
            NextStatus::Done => break,
        }
    }

    let written = sink.finish()?;
    let samples = written / frame_bytes.max(1);
    eprintln!(
        "完成: {samples} 个样本 ({:.3} 秒), {written} 字节",
        samples as f64 / f64::from(format.rate)
    );
    decoder.close();
    Ok(())
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "yin 版本 {} -- 纯 Rust MPEG 音频解码工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: yin-cli <输入文件> -o <输出文件> [选项]");
    println!();
    println!("选项:");
    println!("  --start <N>       从第 N 个样本开始");
    println!("  --samples <N>     最多输出 N 个样本");
    println!("  --rate <HZ>       输出采样率");
    println!("  --mono [MODE]     单声道输出 (mix/left/right)");
    println!("  -e, --encoding    输出编码 (s16/s32/f32/u8)");
    println!("  --config <FILE>   解码器配置 JSON");
    println!("  --no-gapless      关闭 gapless 裁剪");
    println!("  --raw             输出原始 PCM");
    println!();
    println!("使用 --help 查看完整用法.");
}
