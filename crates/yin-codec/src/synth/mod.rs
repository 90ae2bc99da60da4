//! 合成滤波器组.
//!
//! 把子带时隙转换为交错 PCM. 支持 1:1, 2:1, 4:1 与 N:M 四种重采样方式,
//! 单声道输出可直通, 取左右声道之一或混合, 单声道源可复制为双声道.

pub mod dct64;
pub mod kernel;
pub mod ntom;
pub mod window;

use std::sync::Arc;

use log::trace;

use crate::context::CodecContext;
use crate::frame::{DecodedFrame, SBLIMIT};

use self::kernel::{ChannelHistory, SynthesisKernel};
use self::ntom::NtomClock;

/// 合成输出的样本表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    S16,
    S32,
    Float,
}

/// 交错 PCM 样本
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    S16(Vec<i16>),
    S32(Vec<i32>),
    Float(Vec<f32>),
}

impl Samples {
    pub fn empty(kind: SampleKind) -> Self {
        match kind {
            SampleKind::S16 => Samples::S16(Vec::new()),
            SampleKind::S32 => Samples::S32(Vec::new()),
            SampleKind::Float => Samples::Float(Vec::new()),
        }
    }

    /// 由满幅 ±1.0 的浮点样本转换
    pub fn from_float(kind: SampleKind, pcm: Vec<f32>) -> Self {
        match kind {
            SampleKind::Float => Samples::Float(pcm),
            SampleKind::S16 => Samples::S16(
                pcm.iter()
                    .map(|&x| (x * 32768.0).round().clamp(-32768.0, 32767.0) as i16)
                    .collect(),
            ),
            SampleKind::S32 => Samples::S32(
                pcm.iter()
                    .map(|&x| {
                        (f64::from(x) * 2_147_483_648.0)
                            .round()
                            .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
                    })
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            Samples::S16(_) => SampleKind::S16,
            Samples::S32(_) => SampleKind::S32,
            Samples::Float(_) => SampleKind::Float,
        }
    }

    /// 交错样本总数
    pub fn len(&self) -> usize {
        match self {
            Samples::S16(v) => v.len(),
            Samples::S32(v) => v.len(),
            Samples::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 只保留前 `n` 个交错样本
    pub fn truncate(&mut self, n: usize) {
        match self {
            Samples::S16(v) => v.truncate(n),
            Samples::S32(v) => v.truncate(n),
            Samples::Float(v) => v.truncate(n),
        }
    }

    /// 丢弃前 `n` 个交错样本
    pub fn skip_front(&mut self, n: usize) {
        let n = n.min(self.len());
        match self {
            Samples::S16(v) => {
                v.drain(..n);
            }
            Samples::S32(v) => {
                v.drain(..n);
            }
            Samples::Float(v) => {
                v.drain(..n);
            }
        }
    }
}

/// 一帧合成后的 PCM
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBlock {
    pub samples: Samples,
    pub channels: usize,
    pub rate: u32,
}

impl PcmBlock {
    /// 每声道样本数
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }
}

/// 重采样方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMode {
    Native,
    /// 2:1 降采样
    Half,
    /// 4:1 降采样
    Quarter,
    /// 任意比例
    Ntom(NtomClock),
}

impl ResampleMode {
    /// 整数降采样因子, N:M 返回 `None`
    pub fn decimation(&self) -> Option<usize> {
        match self {
            ResampleMode::Native => Some(1),
            ResampleMode::Half => Some(2),
            ResampleMode::Quarter => Some(4),
            ResampleMode::Ntom(_) => None,
        }
    }

    /// 第 0..frame 帧输出的样本数
    pub fn frame_outs(&self, frame: i64, spf: usize) -> i64 {
        match self {
            ResampleMode::Ntom(clock) => clock.frame_outs(frame),
            other => frame.max(0) * (spf / other.decimation().unwrap_or(1)) as i64,
        }
    }

    /// 输出样本 `outs` 所在的帧
    pub fn frame_offset(&self, outs: i64, spf: usize) -> i64 {
        match self {
            ResampleMode::Ntom(clock) => clock.frame_offset(outs),
            other => {
                let per_frame = (spf / other.decimation().unwrap_or(1)) as i64;
                outs.max(0) / per_frame.max(1)
            }
        }
    }

    /// 原生样本数换算为输出样本数
    pub fn ins2outs(&self, ins: i64) -> i64 {
        match self {
            ResampleMode::Ntom(clock) => clock.ins2outs(ins),
            other => ins.max(0) / other.decimation().unwrap_or(1) as i64,
        }
    }

    /// 输出采样率
    pub fn output_rate(&self, native_rate: u32) -> u32 {
        match self {
            ResampleMode::Ntom(clock) => clock.output_rate(),
            other => native_rate / other.decimation().unwrap_or(1) as u32,
        }
    }
}

/// 原生声道到输出声道的映射
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelPlan {
    /// 输出声道数等于原生声道数
    Passthrough,
    /// 双声道源混合为单声道 (合成前对子带样本取平均)
    MonoMix,
    MonoLeft,
    MonoRight,
    /// 单声道源复制为双声道
    Duplicate,
}

impl ChannelPlan {
    pub fn output_channels(&self, native: usize) -> usize {
        match self {
            ChannelPlan::Passthrough => native,
            ChannelPlan::MonoMix | ChannelPlan::MonoLeft | ChannelPlan::MonoRight => 1,
            ChannelPlan::Duplicate => 2,
        }
    }
}

/// 合成器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthConfig {
    pub mode: ResampleMode,
    pub plan: ChannelPlan,
    pub kind: SampleKind,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            mode: ResampleMode::Native,
            plan: ChannelPlan::Passthrough,
            kind: SampleKind::S16,
        }
    }
}

/// 合成滤波器组, 持有每声道的历史与 N:M 累加器
pub struct Synthesizer {
    ctx: Arc<CodecContext>,
    kernel: Box<dyn SynthesisKernel>,
    history: [ChannelHistory; 2],
    config: SynthConfig,
    ntom_acc: u64,
}

impl Synthesizer {
    pub fn new(ctx: Arc<CodecContext>, kernel: Box<dyn SynthesisKernel>) -> Self {
        Self {
            ctx,
            kernel,
            history: Default::default(),
            config: SynthConfig::default(),
            ntom_acc: ntom::NTOM_MUL / 2,
        }
    }

    pub fn kernel_tag(&self) -> &'static str {
        self.kernel.tag()
    }

    pub fn config(&self) -> SynthConfig {
        self.config
    }

    /// 切换配置并清空历史
    pub fn configure(&mut self, config: SynthConfig) {
        self.config = config;
        self.reset();
    }

    /// 清空合成历史, N:M 累加器回到第 0 帧
    pub fn reset(&mut self) {
        for h in &mut self.history {
            h.reset();
        }
        self.set_ntom_frame(0);
    }

    /// 将 N:M 累加器设为第 `frame` 帧开始时的值
    pub fn set_ntom_frame(&mut self, frame: i64) {
        self.ntom_acc = match self.config.mode {
            ResampleMode::Ntom(clock) => clock.ntom_val(frame),
            _ => ntom::NTOM_MUL / 2,
        };
    }

    /// 合成一帧
    pub fn synthesize(&mut self, frame: &DecodedFrame) -> PcmBlock {
        let native_ch = frame.header.channels();
        let plan = self.config.plan;
        let out_ch = plan.output_channels(native_ch);
        let synth_ch = if plan == ChannelPlan::Passthrough { native_ch } else { 1 };
        let tables = &self.ctx.synth;

        let mut lanes: [Vec<f32>; 2] = Default::default();
        let mut raw = [0f32; SBLIMIT];
        for block in &frame.blocks {
            let slot_acc = self.ntom_acc;
            for (c, lane) in lanes.iter_mut().enumerate().take(synth_ch) {
                let mut bands = match plan {
                    ChannelPlan::Passthrough => block.samples[c],
                    ChannelPlan::MonoMix if native_ch == 2 => {
                        let mut mixed = [0f32; SBLIMIT];
                        for (m, (l, r)) in mixed
                            .iter_mut()
                            .zip(block.samples[0].iter().zip(block.samples[1].iter()))
                        {
                            *m = (l + r) * 0.5;
                        }
                        mixed
                    }
                    ChannelPlan::MonoRight if native_ch == 2 => block.samples[1],
                    _ => block.samples[0],
                };
                // 降采样时只保留输出奈奎斯特频率以下的子带, 避免混叠
                if let Some(d) = self.config.mode.decimation().filter(|&d| d > 1) {
                    bands[SBLIMIT / d..].fill(0.0);
                }
                self.kernel.synth(tables, &bands, &mut self.history[c], &mut raw);

                match self.config.mode {
                    ResampleMode::Ntom(clock) => {
                        self.ntom_acc = slot_acc;
                        for &s in &raw {
                            ntom::advance(&mut self.ntom_acc, clock.step(), || lane.push(s));
                        }
                    }
                    mode => {
                        let d = mode.decimation().unwrap_or(1);
                        lane.extend(raw.iter().step_by(d));
                    }
                }
            }
        }

        let per_channel = lanes[0].len();
        let mut pcm = Vec::with_capacity(per_channel * out_ch);
        for i in 0..per_channel {
            for c in 0..out_ch {
                pcm.push(lanes[c.min(synth_ch - 1)][i]);
            }
        }
        trace!(
            "合成 {} 个时隙 → 每声道 {per_channel} 个样本",
            frame.blocks.len()
        );

        PcmBlock {
            samples: Samples::from_float(self.config.kind, pcm),
            channels: out_ch,
            rate: self.config.mode.output_rate(frame.header.sample_rate_hz()),
        }
    }
}
