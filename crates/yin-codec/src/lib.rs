//! # yin-codec
//!
//! MPEG 音频 Layer I/II/III 帧解码与多相合成滤波器组.
//!
//! 解码分两步: [`FrameDecoder`] 把一帧的字节解码为子带时隙 ([`DecodedFrame`]),
//! [`Synthesizer`] 再把子带时隙合成为交错 PCM ([`PcmBlock`]).
//! 两者共享 [`CodecContext`] 中的只读表.

pub mod context;
pub mod decoder;
pub mod frame;
pub mod header;
pub mod layer1;
pub mod layer2;
pub mod layer3;
pub mod synth;

pub use context::CodecContext;
pub use decoder::FrameDecoder;
pub use frame::{DecodedFrame, SubbandBlock};
pub use header::{ChannelMode, FrameHeader, Layer, MpegVersion, decode_header};
pub use synth::kernel::{GenericKernel, SynthesisKernel, select_kernel};
pub use synth::ntom::NtomClock;
pub use synth::{ChannelPlan, PcmBlock, ResampleMode, SampleKind, Samples, SynthConfig, Synthesizer};
