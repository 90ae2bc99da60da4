//! 输出格式协商.
//!
//! 采样率依次尝试原生、1/2、1/4, 都不匹配且调用方强制采样率时改用 N:M 重采样;
//! 声道数先尝试请求值, 非严格模式下请求值无法满足时退回原生声道数.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use yin_codec::{ChannelPlan, NtomClock, ResampleMode, SynthConfig};
use yin_core::{Encoding, EncodingSet, YinError, YinResult};

use crate::convert::sample_kind_for;

/// 双声道源输出单声道时的取法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonoMode {
    /// 左右声道取平均
    #[default]
    Mix,
    Left,
    Right,
}

/// 调用方对输出格式的约束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputRequest {
    /// 期望采样率, `None` 表示原生
    pub rate: Option<u32>,
    /// 固定比例都不匹配时是否允许 N:M 重采样
    pub force_rate: bool,
    /// 期望声道数, `None` 表示原生
    pub channels: Option<u16>,
    /// 声道数不可退让
    pub strict_channels: bool,
    pub mono_mode: MonoMode,
    /// 调用方能接受的编码
    pub encodings: EncodingSet,
}

impl Default for OutputRequest {
    fn default() -> Self {
        Self {
            rate: None,
            force_rate: false,
            channels: None,
            strict_channels: false,
            mono_mode: MonoMode::Mix,
            encodings: EncodingSet::all(),
        }
    }
}

/// 解码器自身的输出能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecCapabilities {
    pub encodings: EncodingSet,
    /// 是否支持 N:M 重采样
    pub ntom: bool,
}

impl Default for CodecCapabilities {
    fn default() -> Self {
        Self {
            encodings: EncodingSet::all(),
            ntom: true,
        }
    }
}

/// 协商结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFormat {
    pub rate: u32,
    pub channels: u16,
    pub encoding: Encoding,
    pub mode: ResampleMode,
    pub plan: ChannelPlan,
}

impl ResolvedFormat {
    /// 对应的合成器配置
    pub fn synth_config(&self) -> SynthConfig {
        SynthConfig {
            mode: self.mode,
            plan: self.plan,
            kind: sample_kind_for(self.encoding),
        }
    }
}

impl fmt::Display for ResolvedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} 声道, {} ({:?}, {:?})",
            self.rate, self.channels, self.encoding, self.mode, self.plan
        )
    }
}

/// 协商输出格式
///
/// `samples_per_frame` 用于构造 N:M 计数器.
pub fn negotiate(
    native_rate: u32,
    native_channels: u16,
    samples_per_frame: usize,
    request: &OutputRequest,
    caps: &CodecCapabilities,
) -> YinResult<ResolvedFormat> {
    let common = request.encodings & caps.encodings;
    let encoding = common.preferred().ok_or_else(|| {
        YinError::NoCompatibleFormat(format!(
            "调用方编码 {:?} 与解码器编码 {:?} 没有交集",
            request.encodings, caps.encodings
        ))
    })?;

    let channels = pick_channels(native_channels, request)?;
    let plan = match (native_channels, channels) {
        (2, 1) => match request.mono_mode {
            MonoMode::Mix => ChannelPlan::MonoMix,
            MonoMode::Left => ChannelPlan::MonoLeft,
            MonoMode::Right => ChannelPlan::MonoRight,
        },
        (1, 2) => ChannelPlan::Duplicate,
        _ => ChannelPlan::Passthrough,
    };

    let (rate, mode) = pick_rate(native_rate, samples_per_frame, request, caps)?;
    let resolved = ResolvedFormat {
        rate,
        channels,
        encoding,
        mode,
        plan,
    };
    debug!("输出格式协商: 原生 {native_rate} Hz/{native_channels} 声道 → {resolved}");
    Ok(resolved)
}

fn pick_channels(native: u16, request: &OutputRequest) -> YinResult<u16> {
    let Some(wanted) = request.channels else {
        return Ok(native);
    };
    if wanted == 1 || wanted == 2 {
        return Ok(wanted);
    }
    if request.strict_channels {
        return Err(YinError::NoCompatibleFormat(format!(
            "无法输出 {wanted} 声道 (原生 {native} 声道)"
        )));
    }
    debug!("不支持 {wanted} 声道输出, 退回原生 {native} 声道");
    Ok(native)
}

fn pick_rate(
    native: u32,
    spf: usize,
    request: &OutputRequest,
    caps: &CodecCapabilities,
) -> YinResult<(u32, ResampleMode)> {
    let Some(wanted) = request.rate else {
        return Ok((native, ResampleMode::Native));
    };
    let fixed = [
        (native, ResampleMode::Native),
        (native / 2, ResampleMode::Half),
        (native / 4, ResampleMode::Quarter),
    ];
    for (rate, mode) in fixed {
        let exact = rate * mode.decimation().unwrap_or(1) as u32 == native;
        if exact && rate == wanted {
            return Ok((rate, mode));
        }
    }
    if !request.force_rate {
        debug!("{wanted} Hz 不是 {native} Hz 的整数分之一, 保持原生采样率");
        return Ok((native, ResampleMode::Native));
    }
    if !caps.ntom {
        return Err(YinError::NoCompatibleFormat(format!(
            "无法把 {native} Hz 转换为 {wanted} Hz: 未启用 N:M 重采样"
        )));
    }
    let clock = NtomClock::new(native, wanted, spf).map_err(|e| {
        YinError::NoCompatibleFormat(format!("无法把 {native} Hz 转换为 {wanted} Hz: {e}"))
    })?;
    Ok((wanted, ResampleMode::Ntom(clock)))
}
