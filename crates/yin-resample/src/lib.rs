//! # yin-resample
//!
//! 输出格式协商与采样编码转换.
//!
//! - [`negotiate`]: 由原生采样率/声道数与调用方约束求出输出格式 ([`ResolvedFormat`])
//! - [`write_samples`]: 把合成得到的 [`yin_codec::Samples`] 写成交错小端字节

mod convert;
mod negotiate;

pub use convert::{sample_kind_for, write_samples};
pub use negotiate::{CodecCapabilities, MonoMode, OutputRequest, ResolvedFormat, negotiate};
